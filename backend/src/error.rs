//! Error handling for the Crop Trade platform
//!
//! Every handler returns [`AppResult`]; errors render as
//! `{ "error": { "code", "message", "field"? } }` with a matching status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::LedgerError;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ledger errors
    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid payment: {0}")]
    InvalidPayment(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Map a unique-constraint violation to [`AppError::DuplicateEntry`] for `field`
    pub fn on_unique_violation(field: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
        move |err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::DuplicateEntry(field.to_string())
            }
            _ => AppError::DatabaseError(err),
        }
    }

    /// Map a foreign-key violation to [`AppError::Conflict`] on `resource`
    pub fn on_reference_violation(
        resource: &str,
        message: &str,
    ) -> impl FnOnce(sqlx::Error) -> AppError {
        let resource = resource.to_string();
        let message = message.to_string();
        move |err| match &err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::Conflict { resource, message }
            }
            _ => AppError::DatabaseError(err),
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::InvalidToken
            | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::AccountDisabled => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_) | AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientStock { .. } | AppError::InvalidPayment(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn detail(&self) -> ErrorDetail {
        let (code, message, field) = match self {
            AppError::InvalidCredentials => (
                "INVALID_CREDENTIALS",
                "Invalid email or password".to_string(),
                None,
            ),
            AppError::TokenExpired => ("TOKEN_EXPIRED", "Token has expired".to_string(), None),
            AppError::InvalidToken => ("INVALID_TOKEN", "Invalid token".to_string(), None),
            AppError::AccountDisabled => (
                "ACCOUNT_DISABLED",
                "This account has been disabled".to_string(),
                None,
            ),
            AppError::Unauthorized(msg) => ("UNAUTHORIZED", msg.clone(), None),
            AppError::Validation { field, message } => {
                ("VALIDATION_ERROR", message.clone(), Some(field.clone()))
            }
            AppError::ValidationError(msg) => ("VALIDATION_ERROR", msg.clone(), None),
            AppError::DuplicateEntry(field) => (
                "DUPLICATE_ENTRY",
                format!("A record with this {} already exists", field),
                Some(field.clone()),
            ),
            AppError::Conflict { resource, message } => {
                ("CONFLICT", message.clone(), Some(resource.clone()))
            }
            AppError::NotFound(resource) => ("NOT_FOUND", format!("{} not found", resource), None),
            AppError::InsufficientStock { .. } => ("INSUFFICIENT_STOCK", self.to_string(), None),
            AppError::InvalidPayment(msg) => ("INVALID_PAYMENT", msg.clone(), None),
            AppError::DatabaseError(_) => {
                ("DATABASE_ERROR", "A database error occurred".to_string(), None)
            }
            AppError::Internal(_) | AppError::InternalError(_) => (
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                None,
            ),
        };

        ErrorDetail {
            code: code.to_string(),
            message,
            field,
        }
    }
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        (status, Json(ErrorResponse { error: self.detail() })).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NoItems => AppError::validation("items", err.to_string()),
            LedgerError::NonPositiveQuantity { index } => {
                AppError::validation(format!("items[{}].quantity", index), err.to_string())
            }
            LedgerError::NegativePrice { index } => {
                AppError::validation(format!("items[{}]", index), err.to_string())
            }
            LedgerError::NegativePayment => AppError::validation("paid_amount", err.to_string()),
            LedgerError::NonPositivePayment => AppError::validation("amount", err.to_string()),
            LedgerError::Overpayment { .. } => AppError::InvalidPayment(err.to_string()),
            LedgerError::InsufficientStock {
                product_id,
                requested,
                available,
            } => AppError::InsufficientStock {
                product: product_id.to_string(),
                requested,
                available,
            },
            LedgerError::UnknownProduct(_) => AppError::NotFound("Product".to_string()),
            LedgerError::AmountOverflow => AppError::validation("items", err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                AppError::validation(field.to_string(), message)
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Attach a product name to an insufficient-stock error
pub fn name_stock_error(err: LedgerError, name_of: impl Fn(Uuid) -> Option<String>) -> AppError {
    match err {
        LedgerError::InsufficientStock {
            product_id,
            requested,
            available,
        } => AppError::InsufficientStock {
            product: name_of(product_id).unwrap_or_else(|| product_id.to_string()),
            requested,
            available,
        },
        other => other.into(),
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::AccountDisabled.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotFound("Sale".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::DuplicateEntry("email".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidPayment("too much".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_ledger_errors_map_to_client_errors() {
        let id = Uuid::new_v4();
        let err: AppError = LedgerError::InsufficientStock {
            product_id: id,
            requested: Decimal::from(5),
            available: Decimal::from(2),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.detail().code, "INSUFFICIENT_STOCK");

        let err: AppError = LedgerError::NonPositiveQuantity { index: 2 }.into();
        assert_eq!(err.detail().field.as_deref(), Some("items[2].quantity"));

        let err: AppError = LedgerError::UnknownProduct(id).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err: AppError = LedgerError::AmountOverflow.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail().code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_name_stock_error_uses_product_name() {
        let id = Uuid::new_v4();
        let err = name_stock_error(
            LedgerError::InsufficientStock {
                product_id: id,
                requested: Decimal::from(9),
                available: Decimal::from(3),
            },
            |pid| (pid == id).then(|| "Basmati Rice".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Basmati Rice: requested 9, available 3"
        );
    }

    #[test]
    fn test_server_errors_hide_details() {
        let detail = AppError::Internal("secret connection string".into()).detail();
        assert!(!detail.message.contains("secret"));
    }
}
