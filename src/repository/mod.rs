//! Storage capabilities used by the use-case services.
//!
//! Each aggregate sits behind its own trait so the engine can be swapped
//! (`SeaOrmStore` for PostgreSQL, `InMemoryStore` for tests). Every call is a
//! suspension point; services never hold an in-process lock across one.
//!
//! Stock is only ever changed through conditional single-statement updates
//! (`stock = stock - n WHERE stock >= n`), so concurrent callers cannot
//! drive it negative.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        Cart, CartId, NewOrder, NewProduct, Order, OrderId, OrderStatus, Product, ProductChanges,
        ProductId, UserId,
    },
    routes::params::{ProductSortBy, SortOrder},
};

pub use memory::InMemoryStore;
pub use postgres::SeaOrmStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("query error: {0}")]
    Query(#[from] sqlx::Error),

    /// A conditional stock decrement matched no row.
    #[error("insufficient stock for product {product_id}")]
    StockConflict { product_id: ProductId },

    /// An order with the same (user, idempotency key) already exists.
    #[error("duplicate idempotency key")]
    DuplicateKey,

    /// The order's status no longer matches the one the caller read.
    #[error("order status changed concurrently")]
    StatusConflict,

    /// Merging a cart line would push its quantity past `i32::MAX`.
    #[error("cart quantity overflow for product {product_id}")]
    QuantityOverflow { product_id: ProductId },

    #[error("data corruption: {0}")]
    DataCorruption(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub max_stock: Option<i32>,
    pub sort_by: ProductSortBy,
    pub sort_order: SortOrder,
    pub limit: u64,
    pub offset: u64,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            min_price: None,
            max_price: None,
            max_stock: None,
            sort_by: ProductSortBy::default(),
            sort_order: SortOrder::default(),
            limit: 20,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
    pub sort_order: SortOrder,
    pub limit: u64,
    pub offset: u64,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            status: None,
            sort_order: SortOrder::default(),
            limit: 20,
            offset: 0,
        }
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: NewProduct) -> StoreResult<Product>;

    async fn get(&self, id: ProductId) -> StoreResult<Option<Product>>;

    /// Products matching `ids`; missing ids are simply absent from the result.
    async fn get_many(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>>;

    /// One page of matching products plus the total match count.
    async fn list(&self, filter: &ProductFilter) -> StoreResult<(Vec<Product>, u64)>;

    async fn update(&self, id: ProductId, changes: ProductChanges)
    -> StoreResult<Option<Product>>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, id: ProductId) -> StoreResult<bool>;

    /// Atomically applies `stock = stock + delta` unless the result would be
    /// negative, in which case it fails with `StockConflict`.
    async fn adjust_stock(&self, id: ProductId, delta: i32) -> StoreResult<Option<Product>>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Option<Cart>>;

    /// Creates the user's cart if absent and returns the (single) cart.
    async fn create_for_user(&self, user_id: UserId) -> StoreResult<Cart>;

    /// Inserts the line or adds `quantity` to the existing one. Fails with
    /// `QuantityOverflow`, leaving the line as it was, when the sum does not
    /// fit.
    async fn add_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<()>;

    /// Overwrites the quantity of an existing line; `false` if there is none.
    async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<bool>;

    async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> StoreResult<bool>;

    /// Deletes every line, keeping the cart itself. Returns the number removed.
    async fn clear(&self, cart_id: CartId) -> StoreResult<u64>;

    /// Takes checked-out quantities off the cart. A line holding no more than
    /// the ordered quantity is deleted; a line that grew since it was read
    /// keeps the difference. Lines for other products are untouched.
    async fn remove_ordered(&self, cart_id: CartId, lines: &[(ProductId, i32)])
    -> StoreResult<u64>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a checkout in one transaction: a conditional stock decrement
    /// per line, then the order (status `pending`) and its items. Nothing is
    /// written when any decrement fails or the idempotency key is taken.
    async fn place(&self, order: NewOrder) -> StoreResult<Order>;

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: Uuid,
    ) -> StoreResult<Option<Order>>;

    async fn get(&self, id: OrderId) -> StoreResult<Option<Order>>;

    async fn list(&self, filter: &OrderFilter) -> StoreResult<(Vec<Order>, u64)>;

    /// Compare-and-set of the order status. Moving to `cancelled` returns the
    /// ordered quantities to stock in the same transaction.
    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<Order>;
}
