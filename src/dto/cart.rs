use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{CartId, CartItemId, Product, ProductId, UserId};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A quantity of 0 removes the line.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

/// The cart as shown to its owner, priced at current catalog prices.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartLine>,
    pub item_count: i64,
    #[schema(value_type = String, example = "23.50")]
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: i32,
    /// `null` when the product has been removed from the catalog.
    pub product: Option<Product>,
    #[schema(value_type = Option<String>, example = "20.00")]
    pub line_total: Option<Decimal>,
}
