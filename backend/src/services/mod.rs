//! Business logic services

pub mod admin;
pub mod auth;
pub mod contact;
pub mod password;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod stock;
pub mod token;

use rust_decimal::Decimal;
use serde::Deserialize;

pub use admin::AdminService;
pub use auth::AuthService;
pub use contact::{ContactKind, ContactService};
pub use product::ProductService;
pub use purchase::PurchaseService;
pub use sale::SaleService;
pub use token::TokenService;

/// A further payment against a sale or purchase
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPaymentInput {
    pub amount: Decimal,
}
