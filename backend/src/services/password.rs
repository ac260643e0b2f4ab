//! bcrypt hashing off the async runtime threads

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, AppResult};

/// Hash a plaintext password
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a plaintext password against a stored hash
pub async fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hashed = hash_password("harvest-2024").await.unwrap();
        assert_ne!(hashed, "harvest-2024");
        assert!(verify_password("harvest-2024", &hashed).await.unwrap());
        assert!(!verify_password("harvest-2025", &hashed).await.unwrap());
    }
}
