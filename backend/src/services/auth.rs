//! Authentication service for trader registration, login, and token management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::AccountScope;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::{AuthTokens, TokenService};

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    tokens: TokenService,
}

/// Input for registering a new trader account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, max = 72, message = "Password must be 8 to 72 characters"))]
    pub password: String,
    pub phone: Option<String>,
    #[validate(length(max = 200, message = "Business name must be at most 200 characters"))]
    pub business_name: Option<String>,
}

/// Input for updating the trader's own profile
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 200, message = "Business name must be at most 200 characters"))]
    pub business_name: Option<String>,
}

/// Input for changing password
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordInput {
    pub current_password: String,
    #[validate(length(min = 8, max = 72, message = "Password must be 8 to 72 characters"))]
    pub new_password: String,
}

/// Trader profile as returned by the API
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub business_name: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile plus tokens, returned by register and login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

/// Credentials row from database
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    email: String,
    password_hash: String,
    is_active: bool,
}

pub(crate) const USER_PROFILE_COLUMNS: &str =
    "id, name, email, phone, business_name, is_active, last_login_at, created_at, updated_at";

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, tokens: TokenService) -> Self {
        Self { db, tokens }
    }

    /// Register a new trader account and sign it in
    pub async fn register(&self, input: RegisterInput) -> AppResult<AuthResponse> {
        input.validate()?;
        shared::validate_name(&input.name).map_err(|m| AppError::validation("name", m))?;
        shared::validate_email(&input.email).map_err(|m| AppError::validation("email", m))?;
        if let Some(phone) = input.phone.as_deref() {
            shared::validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }

        let email = normalize_email(&input.email);

        let existing = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = $1)",
        )
        .bind(&email)
        .fetch_one(&self.db)
        .await?;

        if existing {
            return Err(AppError::DuplicateEntry("email".to_string()));
        }

        let password_hash = hash_password(&input.password).await?;

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, UserProfile>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, phone, business_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_PROFILE_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&email)
        .bind(&password_hash)
        .bind(trimmed(input.phone))
        .bind(trimmed(input.business_name))
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::on_unique_violation("email"))?;

        let tokens = self
            .tokens
            .issue_tokens(&mut *tx, user.id, &user.email, AccountScope::User)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Registered trader account");

        Ok(AuthResponse { user, tokens })
    }

    /// Authenticate a trader with email and password
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthResponse> {
        let email = normalize_email(email);

        let credentials = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, email, password_hash, is_active FROM users WHERE LOWER(email) = $1",
        )
        .bind(&email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, &credentials.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        // Checked after the password so disabled accounts can't be probed
        if !credentials.is_active {
            return Err(AppError::AccountDisabled);
        }

        let user = sqlx::query_as::<_, UserProfile>(&format!(
            "UPDATE users SET last_login_at = NOW() WHERE id = $1 RETURNING {}",
            USER_PROFILE_COLUMNS
        ))
        .bind(credentials.id)
        .fetch_one(&self.db)
        .await?;

        let tokens = self
            .tokens
            .issue_tokens(&self.db, credentials.id, &credentials.email, AccountScope::User)
            .await?;

        tracing::info!(user_id = %user.id, "Trader logged in");

        Ok(AuthResponse { user, tokens })
    }

    /// Exchange a refresh token for a new token pair
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let mut tx = self.db.begin().await?;

        let user_id = self
            .tokens
            .consume_refresh_token(&mut *tx, refresh_token, AccountScope::User)
            .await?;

        let credentials = sqlx::query_as::<_, (String, bool)>(
            "SELECT email, is_active FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

        if !credentials.1 {
            return Err(AppError::AccountDisabled);
        }

        let tokens = self
            .tokens
            .issue_tokens(&mut *tx, user_id, &credentials.0, AccountScope::User)
            .await?;

        tx.commit().await?;

        Ok(tokens)
    }

    /// Revoke a refresh token belonging to the trader
    pub async fn logout(&self, user_id: Uuid, refresh_token: &str) -> AppResult<()> {
        self.tokens
            .revoke_refresh_token(&self.db, user_id, refresh_token, AccountScope::User)
            .await?;

        tracing::info!(user_id = %user_id, "Trader logged out");
        Ok(())
    }

    /// Get the trader's own profile
    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<UserProfile> {
        sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Update the trader's own profile
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> AppResult<UserProfile> {
        input.validate()?;
        if let Some(name) = input.name.as_deref() {
            shared::validate_name(name).map_err(|m| AppError::validation("name", m))?;
        }
        if let Some(phone) = patch_value(&input.phone) {
            shared::validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }

        sqlx::query_as::<_, UserProfile>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                phone = CASE WHEN $2::text IS NULL THEN phone ELSE NULLIF($2, '') END,
                business_name = CASE WHEN $3::text IS NULL THEN business_name
                                     ELSE NULLIF($3, '') END,
                updated_at = NOW()
            WHERE id = $4
            RETURNING {}
            "#,
            USER_PROFILE_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(patch_text(input.phone))
        .bind(patch_text(input.business_name))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Change password and sign out every other session
    pub async fn change_password(
        &self,
        user_id: Uuid,
        input: ChangePasswordInput,
    ) -> AppResult<()> {
        input.validate()?;

        let current_hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        if !verify_password(&input.current_password, &current_hash).await? {
            return Err(AppError::validation(
                "current_password",
                "Current password is incorrect",
            ));
        }

        let new_hash = hash_password(&input.new_password).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(&new_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let revoked = self
            .tokens
            .revoke_all(&mut *tx, user_id, AccountScope::User)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, revoked_sessions = revoked, "Password changed");
        Ok(())
    }
}

/// Emails are matched case-insensitively
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trim optional text, turning blank strings into `None`
pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim an optional column in a partial update.
///
/// `None` keeps the stored value and `Some("")` clears it; pair with
/// `CASE WHEN $n::text IS NULL THEN col ELSE NULLIF($n, '') END`.
pub(crate) fn patch_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Non-blank patch value, for field checks that a clear must skip
pub(crate) fn patch_value(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Trader@Example.COM "), "trader@example.com");
    }

    #[test]
    fn test_trimmed() {
        assert_eq!(trimmed(Some("  Dhaka ".to_string())), Some("Dhaka".to_string()));
        assert_eq!(trimmed(Some("   ".to_string())), None);
        assert_eq!(trimmed(None), None);
    }

    #[test]
    fn test_patch_text_distinguishes_keep_and_clear() {
        assert_eq!(patch_text(None), None);
        assert_eq!(patch_text(Some("   ".into())), Some(String::new()));
        assert_eq!(patch_text(Some(" 01711 ".into())), Some("01711".to_string()));

        assert_eq!(patch_value(&Some("  ".into())), None);
        assert_eq!(patch_value(&Some(" x ".into())), Some("x"));
    }

    #[test]
    fn test_register_input_validation() {
        let input = RegisterInput {
            name: "Karim".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            phone: None,
            business_name: None,
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
