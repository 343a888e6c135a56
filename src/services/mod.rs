//! Use-case layer. Each service validates its inputs, talks to the store
//! through the repository traits and returns domain values; HTTP concerns
//! stay in `routes`.

pub mod cart_service;
pub mod catalog_service;
pub mod checkout_service;
pub mod order_service;

pub use cart_service::CartService;
pub use catalog_service::CatalogService;
pub use checkout_service::CheckoutService;
pub use order_service::OrderService;

use crate::error::{AppError, AppResult};

/// Identities are assigned by the store starting at 1; zero never names a row.
pub(crate) fn ensure_id(id: i64, what: &str) -> AppResult<()> {
    if id <= 0 {
        return Err(AppError::InvalidInput(format!("invalid {what} id: {id}")));
    }
    Ok(())
}
