//! Customer and provider directory
//!
//! Both are plain contact records owned by a trader and differ only in which
//! table holds them and which transactions reference them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Pagination, PaginatedResponse};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::auth::{patch_text, patch_value, trimmed};

/// Which side of the trade a contact is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    /// Buys from the trader; referenced by sales
    Customer,
    /// Sells to the trader; referenced by purchases
    Provider,
}

impl ContactKind {
    fn table(self) -> &'static str {
        match self {
            ContactKind::Customer => "customers",
            ContactKind::Provider => "providers",
        }
    }

    /// Transactions table and its foreign key column
    fn dependents(self) -> (&'static str, &'static str) {
        match self {
            ContactKind::Customer => ("sales", "customer_id"),
            ContactKind::Provider => ("purchases", "provider_id"),
        }
    }

    /// Whether an owned contact has transactions; no row when not owned
    fn reference_query(self) -> String {
        let (dependents, column) = self.dependents();
        format!(
            "SELECT EXISTS(SELECT 1 FROM {} d WHERE d.{} = c.id) FROM {} c \
             WHERE c.id = $1 AND c.user_id = $2",
            dependents,
            column,
            self.table()
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ContactKind::Customer => "Customer",
            ContactKind::Provider => "Provider",
        }
    }
}

/// Customer or provider record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a contact
#[derive(Debug, Deserialize, Validate)]
pub struct CreateContactInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,
    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,
}

/// Input for updating a contact; omitted fields are kept
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateContactInput {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    /// An empty string clears the phone, likewise for the other optional fields
    pub phone: Option<String>,
    pub email: Option<String>,
    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,
    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,
}

const CONTACT_COLUMNS: &str = "id, name, phone, email, address, note, created_at, updated_at";

/// Contact service for one [`ContactKind`]
#[derive(Clone)]
pub struct ContactService {
    db: PgPool,
    kind: ContactKind,
}

impl ContactService {
    pub fn new(db: PgPool, kind: ContactKind) -> Self {
        Self { db, kind }
    }

    pub fn customers(db: PgPool) -> Self {
        Self::new(db, ContactKind::Customer)
    }

    pub fn providers(db: PgPool) -> Self {
        Self::new(db, ContactKind::Provider)
    }

    /// List contacts by name, optionally matching `search` against name, phone or email
    pub async fn list(
        &self,
        user_id: Uuid,
        search: Option<String>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Contact>> {
        let pattern = search_pattern(search);
        let filter = r#"
            WHERE user_id = $1
              AND ($2::text IS NULL OR name ILIKE $2 OR phone ILIKE $2 OR email ILIKE $2)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {} {}",
            self.kind.table(),
            filter
        ))
        .bind(user_id)
        .bind(pattern.as_deref())
        .fetch_one(&self.db)
        .await?;

        let contacts = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {} FROM {} {} ORDER BY name, created_at LIMIT $3 OFFSET $4",
            CONTACT_COLUMNS,
            self.kind.table(),
            filter
        ))
        .bind(user_id)
        .bind(pattern.as_deref())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(contacts, &pagination, total))
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> AppResult<Contact> {
        sqlx::query_as::<_, Contact>(&format!(
            "SELECT {} FROM {} WHERE id = $1 AND user_id = $2",
            CONTACT_COLUMNS,
            self.kind.table()
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(self.kind.label().to_string()))
    }

    pub async fn create(&self, user_id: Uuid, input: CreateContactInput) -> AppResult<Contact> {
        input.validate()?;
        shared::validate_name(&input.name).map_err(|m| AppError::validation("name", m))?;
        if let Some(phone) = input.phone.as_deref() {
            shared::validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }

        let contact = sqlx::query_as::<_, Contact>(&format!(
            r#"
            INSERT INTO {} (user_id, name, phone, email, address, note)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            self.kind.table(),
            CONTACT_COLUMNS
        ))
        .bind(user_id)
        .bind(input.name.trim())
        .bind(trimmed(input.phone))
        .bind(trimmed(input.email))
        .bind(trimmed(input.address))
        .bind(trimmed(input.note))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            user_id = %user_id,
            contact_id = %contact.id,
            kind = self.kind.label(),
            "Contact created"
        );

        Ok(contact)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: UpdateContactInput,
    ) -> AppResult<Contact> {
        input.validate()?;
        if let Some(name) = input.name.as_deref() {
            shared::validate_name(name).map_err(|m| AppError::validation("name", m))?;
        }
        if let Some(phone) = patch_value(&input.phone) {
            shared::validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }
        if let Some(email) = patch_value(&input.email) {
            shared::validate_email(email).map_err(|m| AppError::validation("email", m))?;
        }

        sqlx::query_as::<_, Contact>(&format!(
            r#"
            UPDATE {}
            SET name = COALESCE($1, name),
                phone = CASE WHEN $2::text IS NULL THEN phone ELSE NULLIF($2, '') END,
                email = CASE WHEN $3::text IS NULL THEN email ELSE NULLIF($3, '') END,
                address = CASE WHEN $4::text IS NULL THEN address ELSE NULLIF($4, '') END,
                note = CASE WHEN $5::text IS NULL THEN note ELSE NULLIF($5, '') END,
                updated_at = NOW()
            WHERE id = $6 AND user_id = $7
            RETURNING {}
            "#,
            self.kind.table(),
            CONTACT_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(patch_text(input.phone))
        .bind(patch_text(input.email))
        .bind(patch_text(input.address))
        .bind(patch_text(input.note))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(self.kind.label().to_string()))
    }

    /// Delete a contact that no transaction refers to
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> AppResult<()> {
        let (dependents, _) = self.kind.dependents();

        let referenced = sqlx::query_scalar::<_, bool>(&self.kind.reference_query())
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(self.kind.label().to_string()))?;

        if referenced {
            return Err(AppError::conflict(
                self.kind.label(),
                format!(
                    "{} has recorded {} and cannot be deleted",
                    self.kind.label(),
                    dependents
                ),
            ));
        }

        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1 AND user_id = $2",
            self.kind.table()
        ))
        .bind(id)
        .bind(user_id)
        .execute(&self.db)
        .await
        // A transaction recorded after the check above still blocks the delete
        .map_err(AppError::on_reference_violation(
            self.kind.label(),
            "Contact is referenced by recorded transactions",
        ))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(self.kind.label().to_string()));
        }

        tracing::info!(
            user_id = %user_id,
            contact_id = %id,
            kind = self.kind.label(),
            "Contact deleted"
        );
        Ok(())
    }
}

/// Wrap a search term for `ILIKE`, escaping its wildcards
pub(crate) fn search_pattern(search: Option<String>) -> Option<String> {
    trimmed(search).map(|term| {
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{}%", escaped)
    })
}
