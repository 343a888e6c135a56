use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    models::{NewOrder, Order, OrderId, OrderItem, OrderStatus, UserId},
    repository::{OrderFilter, OrderRepository, StoreError, StoreResult},
    routes::params::SortOrder,
};

use super::{SeaOrmStore, is_unique_violation, order_from_entity, order_item_from_entity};

async fn load_items<C: ConnectionTrait>(conn: &C, order_id: OrderId) -> StoreResult<Vec<OrderItem>> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();
    Ok(items)
}

async fn with_items<C: ConnectionTrait>(conn: &C, model: OrderModel) -> StoreResult<Order> {
    let items = load_items(conn, model.id).await?;
    order_from_entity(model, items)
}

#[async_trait]
impl OrderRepository for SeaOrmStore {
    async fn place(&self, order: NewOrder) -> StoreResult<Order> {
        let txn = self.conn.begin().await?;

        for item in &order.items {
            let result = Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(item.quantity))
                .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
                .filter(ProdCol::Id.eq(item.product_id))
                .filter(ProdCol::Stock.gte(item.quantity))
                .exec(&txn)
                .await?;
            if result.rows_affected == 0 {
                // Dropping the transaction rolls back the decrements made so far.
                return Err(StoreError::StockConflict {
                    product_id: item.product_id,
                });
            }
        }

        let inserted = OrderActive {
            id: NotSet,
            user_id: Set(order.user_id),
            status: Set(OrderStatus::Pending.as_str().to_string()),
            total_amount: Set(order.total_amount),
            shipping_address: Set(order.shipping_address),
            idempotency_key: Set(order.idempotency_key),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&txn)
        .await;
        let model = match inserted {
            Ok(model) => model,
            Err(err) if is_unique_violation(&err) => return Err(StoreError::DuplicateKey),
            Err(err) => return Err(err.into()),
        };

        let mut items = Vec::with_capacity(order.items.len());
        for item in order.items {
            let row = OrderItemActive {
                id: NotSet,
                order_id: Set(model.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;
            items.push(order_item_from_entity(row));
        }

        txn.commit().await?;
        order_from_entity(model, items)
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: Uuid,
    ) -> StoreResult<Option<Order>> {
        let model = Orders::find()
            .filter(OrderCol::UserId.eq(user_id))
            .filter(OrderCol::IdempotencyKey.eq(key))
            .one(&self.conn)
            .await?;
        match model {
            Some(model) => Ok(Some(with_items(&self.conn, model).await?)),
            None => Ok(None),
        }
    }

    async fn get(&self, id: OrderId) -> StoreResult<Option<Order>> {
        match Orders::find_by_id(id).one(&self.conn).await? {
            Some(model) => Ok(Some(with_items(&self.conn, model).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &OrderFilter) -> StoreResult<(Vec<Order>, u64)> {
        let mut condition = Condition::all();
        if let Some(user_id) = filter.user_id {
            condition = condition.add(OrderCol::UserId.eq(user_id));
        }
        if let Some(status) = filter.status {
            condition = condition.add(OrderCol::Status.eq(status.as_str()));
        }

        let mut finder = Orders::find().filter(condition);
        finder = match filter.sort_order {
            SortOrder::Asc => finder
                .order_by_asc(OrderCol::CreatedAt)
                .order_by_asc(OrderCol::Id),
            SortOrder::Desc => finder
                .order_by_desc(OrderCol::CreatedAt)
                .order_by_desc(OrderCol::Id),
        };

        let total = finder.clone().count(&self.conn).await?;
        let models = finder
            .limit(filter.limit)
            .offset(filter.offset)
            .all(&self.conn)
            .await?;

        let ids: Vec<OrderId> = models.iter().map(|m| m.id).collect();
        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        if !ids.is_empty() {
            let rows = OrderItems::find()
                .filter(OrderItemCol::OrderId.is_in(ids))
                .order_by_asc(OrderItemCol::Id)
                .all(&self.conn)
                .await?;
            for row in rows {
                items_by_order
                    .entry(row.order_id)
                    .or_default()
                    .push(order_item_from_entity(row));
            }
        }

        let orders = models
            .into_iter()
            .map(|model| {
                let items = items_by_order.remove(&model.id).unwrap_or_default();
                order_from_entity(model, items)
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok((orders, total))
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<Order> {
        let txn = self.conn.begin().await?;

        let result = Orders::update_many()
            .col_expr(OrderCol::Status, Expr::value(to.as_str()))
            .col_expr(OrderCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(OrderCol::Id.eq(id))
            .filter(OrderCol::Status.eq(from.as_str()))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::StatusConflict);
        }

        let items = load_items(&txn, id).await?;
        if to == OrderStatus::Cancelled {
            // Deleted products match no row; their units are not restocked.
            for item in &items {
                Products::update_many()
                    .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
                    .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
                    .filter(ProdCol::Id.eq(item.product_id))
                    .exec(&txn)
                    .await?;
            }
        }

        let model = Orders::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| StoreError::DataCorruption(format!("order {id} vanished mid-update")))?;
        let order = order_from_entity(model, items)?;

        txn.commit().await?;
        Ok(order)
    }
}
