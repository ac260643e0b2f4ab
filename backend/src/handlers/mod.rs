//! HTTP handlers, one module per resource

pub mod admin;
pub mod auth;
pub mod customer;
pub mod health;
pub mod product;
pub mod provider;
pub mod purchase;
pub mod sale;

use serde::Deserialize;
use shared::Pagination;

use crate::AppState;

pub use admin::*;
pub use auth::*;
pub use customer::*;
pub use health::*;
pub use product::*;
pub use provider::*;
pub use purchase::*;
pub use sale::*;

/// Paging and free-text search accepted by list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn pagination(&self, state: &AppState) -> Pagination {
        page_params(state, self.page, self.per_page)
    }
}

/// Clamp raw paging values to the configured page sizes
pub(crate) fn page_params(
    state: &AppState,
    page: Option<u32>,
    per_page: Option<u32>,
) -> Pagination {
    Pagination::from_query(
        page,
        per_page,
        state.config.pagination.default_per_page,
        state.config.pagination.max_per_page,
    )
}
