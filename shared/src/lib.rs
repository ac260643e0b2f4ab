//! Shared types and ledger rules for the Crop Trade platform
//!
//! This crate contains the pieces shared between the backend and the browser
//! (via WASM): pagination types, the stock/financial ledger arithmetic, and
//! input validation.

pub mod ledger;
pub mod types;
pub mod validation;

pub use ledger::*;
pub use types::*;
pub use validation::*;
