use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{Order, OrderId, OrderStatus, UserId},
    repository::{OrderFilter, OrderRepository},
    services::ensure_id,
};

/// Status lifecycle and read access for orders. Orders are only created by
/// checkout.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }

    /// Parses `new_status` and applies it; see [`OrderService::transition`].
    pub async fn update_status(&self, order_id: OrderId, new_status: &str) -> AppResult<Order> {
        let next: OrderStatus = new_status.trim().parse()?;
        self.transition(order_id, next).await
    }

    pub async fn transition(&self, order_id: OrderId, next: OrderStatus) -> AppResult<Order> {
        ensure_id(order_id, "order")?;

        let current = self.get_by_id(order_id).await?;
        if !current.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        let order = self
            .orders
            .transition_status(order_id, current.status, next)
            .await?;
        tracing::info!(
            order_id,
            from = %current.status,
            to = %next,
            "order status changed"
        );
        Ok(order)
    }

    pub async fn get_by_id(&self, order_id: OrderId) -> AppResult<Order> {
        ensure_id(order_id, "order")?;
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("order not found".into()))
    }

    pub async fn list_for_user(
        &self,
        user_id: UserId,
        filter: OrderFilter,
    ) -> AppResult<(Vec<Order>, u64)> {
        ensure_id(user_id, "user")?;
        let filter = OrderFilter {
            user_id: Some(user_id),
            ..filter
        };
        Ok(self.orders.list(&filter).await?)
    }

    pub async fn list_all(&self, filter: OrderFilter) -> AppResult<(Vec<Order>, u64)> {
        Ok(self.orders.list(&filter).await?)
    }
}
