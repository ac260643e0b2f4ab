//! Access and refresh token issuing
//!
//! Access tokens are HS256 JWTs carrying the account id and the
//! [`AccountScope`] they were issued for, so a trader token can never be
//! replayed against the admin panel or vice versa. Refresh tokens are opaque
//! random strings; only their SHA-256 digest is persisted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::AccountScope;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID (user or admin, depending on `scope`)
    pub sub: String,
    pub email: String,
    pub scope: AccountScope,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn account_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::InvalidToken)
    }
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Token service shared by the trader and admin auth flows
#[derive(Clone)]
pub struct TokenService {
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            jwt_secret: config.secret.clone(),
            access_token_expiry: config.access_token_expiry,
            refresh_token_expiry: config.refresh_token_expiry,
        }
    }

    /// Sign an access token for an account
    pub fn issue_access_token(
        &self,
        account_id: Uuid,
        email: &str,
        scope: AccountScope,
    ) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_string(),
            scope,
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Validate an access token and check it belongs to `scope`
    pub fn validate_access_token(&self, token: &str, scope: AccountScope) -> AppResult<Claims> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })?;

        if claims.scope != scope {
            return Err(AppError::InvalidToken);
        }

        Ok(claims)
    }

    /// Issue an access/refresh pair and persist the refresh token digest
    pub async fn issue_tokens<'e>(
        &self,
        db: impl PgExecutor<'e>,
        account_id: Uuid,
        email: &str,
        scope: AccountScope,
    ) -> AppResult<AuthTokens> {
        let access_token = self.issue_access_token(account_id, email, scope)?;
        let refresh_token = Self::generate_refresh_token();
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (account_scope, account_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(scope.as_str())
        .bind(account_id)
        .bind(Self::hash_token(&refresh_token))
        .bind(expires_at)
        .execute(db)
        .await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    /// Revoke a live refresh token and return the account it belonged to.
    ///
    /// Each refresh token is single use: a second attempt with the same
    /// token finds it revoked and fails.
    pub async fn consume_refresh_token<'e>(
        &self,
        db: impl PgExecutor<'e>,
        token: &str,
        scope: AccountScope,
    ) -> AppResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE token_hash = $1
              AND account_scope = $2
              AND revoked_at IS NULL
              AND expires_at > NOW()
            RETURNING account_id
            "#,
        )
        .bind(Self::hash_token(token))
        .bind(scope.as_str())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))
    }

    /// Revoke one refresh token of an account; unknown tokens are ignored
    pub async fn revoke_refresh_token<'e>(
        &self,
        db: impl PgExecutor<'e>,
        account_id: Uuid,
        token: &str,
        scope: AccountScope,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE token_hash = $1 AND account_id = $2 AND account_scope = $3
              AND revoked_at IS NULL
            "#,
        )
        .bind(Self::hash_token(token))
        .bind(account_id)
        .bind(scope.as_str())
        .execute(db)
        .await?;

        Ok(())
    }

    /// Revoke every live refresh token of an account
    pub async fn revoke_all<'e>(
        &self,
        db: impl PgExecutor<'e>,
        account_id: Uuid,
        scope: AccountScope,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE account_id = $1 AND account_scope = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(account_id)
        .bind(scope.as_str())
        .execute(db)
        .await?;

        Ok(result.rows_affected())
    }

    fn generate_refresh_token() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    /// Digest a refresh token for storage
    pub fn hash_token(token: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(access_token_expiry: i64) -> TokenService {
        TokenService::new(&JwtConfig {
            secret: "test-secret-key-that-is-long-enough".to_string(),
            access_token_expiry,
            refresh_token_expiry: 3600,
        })
    }

    #[test]
    fn test_access_token_round_trip() {
        let tokens = service(3600);
        let id = Uuid::new_v4();
        let token = tokens
            .issue_access_token(id, "trader@example.com", AccountScope::User)
            .unwrap();

        let claims = tokens
            .validate_access_token(&token, AccountScope::User)
            .unwrap();
        assert_eq!(claims.account_id().unwrap(), id);
        assert_eq!(claims.email, "trader@example.com");
    }

    #[test]
    fn test_scope_mismatch_is_rejected() {
        let tokens = service(3600);
        let token = tokens
            .issue_access_token(Uuid::new_v4(), "trader@example.com", AccountScope::User)
            .unwrap();

        assert!(matches!(
            tokens.validate_access_token(&token, AccountScope::Admin),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token() {
        let tokens = service(-3600);
        let token = tokens
            .issue_access_token(Uuid::new_v4(), "a@b.co", AccountScope::Admin)
            .unwrap();

        assert!(matches!(
            tokens.validate_access_token(&token, AccountScope::Admin),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let token = service(3600)
            .issue_access_token(Uuid::new_v4(), "a@b.co", AccountScope::User)
            .unwrap();
        let other = TokenService::new(&JwtConfig {
            secret: "a-completely-different-secret-value".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 3600,
        });

        assert!(matches!(
            other.validate_access_token(&token, AccountScope::User),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_refresh_token_hash_is_stable_and_opaque() {
        let token = TokenService::generate_refresh_token();
        assert_eq!(token.len(), 64);
        assert_eq!(TokenService::hash_token(&token), TokenService::hash_token(&token));
        assert_ne!(TokenService::hash_token(&token), token);
        assert_ne!(
            TokenService::hash_token(&token),
            TokenService::hash_token(&TokenService::generate_refresh_token())
        );
    }
}
