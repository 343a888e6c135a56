//! PostgreSQL store built on the shared sea-orm connection.
//!
//! Writes go through the sea-orm query builder; a few read paths use `sqlx`
//! directly on the pool sea-orm wraps.

mod carts;
mod orders;
mod products;

use chrono::Utc;
use sea_orm::{DatabaseConnection, DbErr, SqlErr};

use crate::{
    entity::{order_items, orders as order_rows, products as product_rows},
    models::{Order, OrderItem, OrderStatus, Product},
};

use super::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    conn: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn pool(&self) -> &sqlx::PgPool {
        self.conn.get_postgres_connection_pool()
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn product_from_entity(model: product_rows::Model) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock: model.stock,
        category: model.category,
        image_url: model.image_url,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: order_items::Model) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        unit_price: model.unit_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn order_from_entity(model: order_rows::Model, items: Vec<OrderItem>) -> StoreResult<Order> {
    let status = model.status.parse::<OrderStatus>().map_err(|_| {
        StoreError::DataCorruption(format!(
            "order {} has unknown status {:?}",
            model.id, model.status
        ))
    })?;

    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        status,
        total_amount: model.total_amount,
        shipping_address: model.shipping_address,
        idempotency_key: model.idempotency_key,
        items,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
