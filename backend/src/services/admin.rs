//! Admin panel service
//!
//! Administrators authenticate against their own table with `admin`-scoped
//! tokens and oversee trader accounts. They never see or edit a trader's
//! books directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{AccountScope, Pagination, PaginatedResponse};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::AdminBootstrapConfig;
use crate::error::{AppError, AppResult};
use crate::services::auth::normalize_email;
use crate::services::contact::search_pattern;
use crate::services::password::{hash_password, verify_password};
use crate::services::token::{AuthTokens, TokenService};

/// Admin account as returned by the API
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdminProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AdminAuthResponse {
    pub admin: AdminProfile,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

/// Trader account with activity counts, as seen from the admin panel
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ManagedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub business_name: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub product_count: i64,
    pub customer_count: i64,
    pub provider_count: i64,
    pub sale_count: i64,
    pub purchase_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetUserStatusInput {
    pub is_active: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct AdminCredentialRow {
    id: Uuid,
    email: String,
    password_hash: String,
    is_active: bool,
}

const ADMIN_COLUMNS: &str = "id, name, email, is_active, last_login_at, created_at";

const MANAGED_USER_SELECT: &str = r#"
    SELECT u.id, u.name, u.email, u.phone, u.business_name, u.is_active,
           u.last_login_at, u.created_at,
           (SELECT COUNT(*) FROM products p WHERE p.user_id = u.id) AS product_count,
           (SELECT COUNT(*) FROM customers c WHERE c.user_id = u.id) AS customer_count,
           (SELECT COUNT(*) FROM providers pr WHERE pr.user_id = u.id) AS provider_count,
           (SELECT COUNT(*) FROM sales s WHERE s.user_id = u.id) AS sale_count,
           (SELECT COUNT(*) FROM purchases pu WHERE pu.user_id = u.id) AS purchase_count
    FROM users u
"#;

/// Admin service
#[derive(Clone)]
pub struct AdminService {
    db: PgPool,
    tokens: TokenService,
}

impl AdminService {
    pub fn new(db: PgPool, tokens: TokenService) -> Self {
        Self { db, tokens }
    }

    /// Authenticate an administrator
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AdminAuthResponse> {
        let email = normalize_email(email);

        let credentials = sqlx::query_as::<_, AdminCredentialRow>(
            "SELECT id, email, password_hash, is_active FROM admins WHERE LOWER(email) = $1",
        )
        .bind(&email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, &credentials.password_hash).await? {
            tracing::warn!(email = %email, "Failed admin login attempt");
            return Err(AppError::InvalidCredentials);
        }

        if !credentials.is_active {
            return Err(AppError::AccountDisabled);
        }

        let admin = sqlx::query_as::<_, AdminProfile>(&format!(
            "UPDATE admins SET last_login_at = NOW() WHERE id = $1 RETURNING {}",
            ADMIN_COLUMNS
        ))
        .bind(credentials.id)
        .fetch_one(&self.db)
        .await?;

        let tokens = self
            .tokens
            .issue_tokens(&self.db, credentials.id, &credentials.email, AccountScope::Admin)
            .await?;

        tracing::info!(admin_id = %admin.id, "Admin logged in");

        Ok(AdminAuthResponse { admin, tokens })
    }

    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let mut tx = self.db.begin().await?;

        let admin_id = self
            .tokens
            .consume_refresh_token(&mut *tx, refresh_token, AccountScope::Admin)
            .await?;

        let (email, is_active) = sqlx::query_as::<_, (String, bool)>(
            "SELECT email, is_active FROM admins WHERE id = $1",
        )
        .bind(admin_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

        if !is_active {
            return Err(AppError::AccountDisabled);
        }

        let tokens = self
            .tokens
            .issue_tokens(&mut *tx, admin_id, &email, AccountScope::Admin)
            .await?;

        tx.commit().await?;

        Ok(tokens)
    }

    pub async fn get_profile(&self, admin_id: Uuid) -> AppResult<AdminProfile> {
        sqlx::query_as::<_, AdminProfile>(&format!(
            "SELECT {} FROM admins WHERE id = $1",
            ADMIN_COLUMNS
        ))
        .bind(admin_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Admin".to_string()))
    }

    /// List trader accounts, newest first
    pub async fn list_users(
        &self,
        search: Option<String>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<ManagedUser>> {
        let pattern = search_pattern(search);
        let filter = r#"
            WHERE ($1::text IS NULL OR u.name ILIKE $1 OR u.email ILIKE $1
                   OR u.business_name ILIKE $1)
        "#;

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users u {}", filter))
                .bind(pattern.as_deref())
                .fetch_one(&self.db)
                .await?;

        let users = sqlx::query_as::<_, ManagedUser>(&format!(
            "{} {} ORDER BY u.created_at DESC LIMIT $2 OFFSET $3",
            MANAGED_USER_SELECT, filter
        ))
        .bind(pattern.as_deref())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(users, &pagination, total))
    }

    pub async fn get_user(&self, user_id: Uuid) -> AppResult<ManagedUser> {
        sqlx::query_as::<_, ManagedUser>(&format!("{} WHERE u.id = $1", MANAGED_USER_SELECT))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Activate or deactivate a trader. Deactivation also ends their sessions.
    pub async fn set_user_status(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        input: SetUserStatusInput,
    ) -> AppResult<ManagedUser> {
        let mut tx = self.db.begin().await?;

        let result =
            sqlx::query("UPDATE users SET is_active = $1, updated_at = NOW() WHERE id = $2")
                .bind(input.is_active)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }

        if !input.is_active {
            self.tokens
                .revoke_all(&mut *tx, user_id, AccountScope::User)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            admin_id = %admin_id,
            user_id = %user_id,
            is_active = input.is_active,
            "Trader account status changed"
        );

        self.get_user(user_id).await
    }

    /// Delete a trader together with all of their books
    pub async fn delete_user(&self, admin_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        // Items reference products without cascading, so headers go first
        for statement in [
            "DELETE FROM sales WHERE user_id = $1",
            "DELETE FROM purchases WHERE user_id = $1",
        ] {
            sqlx::query(statement).bind(user_id).execute(&mut *tx).await?;
        }

        sqlx::query("DELETE FROM refresh_tokens WHERE account_scope = $1 AND account_id = $2")
            .bind(AccountScope::User.as_str())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }

        tx.commit().await?;

        tracing::info!(admin_id = %admin_id, user_id = %user_id, "Trader account deleted");
        Ok(())
    }

    /// Create the configured administrator if it does not exist yet
    pub async fn ensure_bootstrap_admin(&self, config: &AdminBootstrapConfig) -> AppResult<()> {
        let (Some(email), Some(password)) = (
            config.bootstrap_email.as_deref(),
            config.bootstrap_password.as_deref(),
        ) else {
            tracing::debug!("No bootstrap administrator configured");
            return Ok(());
        };

        shared::validate_email(email)
            .map_err(|m| AppError::validation("admin.bootstrap_email", m))?;
        shared::validate_password(password)
            .map_err(|m| AppError::validation("admin.bootstrap_password", m))?;

        let email = normalize_email(email);

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM admins WHERE LOWER(email) = $1)",
        )
        .bind(&email)
        .fetch_one(&self.db)
        .await?;

        if exists {
            return Ok(());
        }

        let password_hash = hash_password(password).await?;
        let name = config.bootstrap_name.as_deref().unwrap_or("Administrator");

        sqlx::query(
            r#"
            INSERT INTO admins (name, email, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(name)
        .bind(&email)
        .bind(&password_hash)
        .execute(&self.db)
        .await?;

        tracing::info!(email = %email, "Bootstrap administrator created");
        Ok(())
    }
}
