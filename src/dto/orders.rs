use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderStatus};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    /// Taken from the `Idempotency-Key` header, never from the body.
    #[serde(skip)]
    pub idempotency_key: Option<Uuid>,
}

/// Result of a checkout; `replayed` is set when an earlier order with the
/// same idempotency key was returned instead of placing a new one.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub replayed: bool,
}

/// Unknown status strings fail deserialization and are rejected as bad input.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
