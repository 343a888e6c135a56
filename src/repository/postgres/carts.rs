use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter, Set,
    Statement, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use sqlx::FromRow;

use crate::{
    entity::{
        cart_items::{Column as ItemCol, Entity as CartItems},
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts},
    },
    models::{Cart, CartId, CartItem, ProductId, UserId},
    repository::{CartRepository, StoreError, StoreResult},
};

use super::SeaOrmStore;

#[derive(FromRow)]
struct CartRow {
    id: i64,
    user_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CartItemRow {
    id: i64,
    cart_id: i64,
    product_id: i64,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        CartItem {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const MERGE_LINE_SQL: &str = r#"
    INSERT INTO cart_items (cart_id, product_id, quantity)
    VALUES ($1, $2, $3)
    ON CONFLICT (cart_id, product_id)
    DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = now()
    WHERE cart_items.quantity <= 2147483647 - EXCLUDED.quantity
"#;

impl SeaOrmStore {
    async fn touch_cart<C: ConnectionTrait>(conn: &C, cart_id: CartId) -> StoreResult<()> {
        Carts::update_many()
            .col_expr(CartCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(CartCol::Id.eq(cart_id))
            .exec(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CartRepository for SeaOrmStore {
    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        let Some(cart) = cart else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, CartItemRow>(
            r#"
            SELECT id, cart_id, product_id, quantity, created_at, updated_at
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY id
            "#,
        )
        .bind(cart.id)
        .fetch_all(self.pool())
        .await?;

        Ok(Some(Cart {
            id: cart.id,
            user_id: cart.user_id,
            items: items.into_iter().map(CartItem::from).collect(),
            created_at: cart.created_at,
            updated_at: cart.updated_at,
        }))
    }

    async fn create_for_user(&self, user_id: UserId) -> StoreResult<Cart> {
        let active = CartActive {
            id: NotSet,
            user_id: Set(user_id),
            created_at: NotSet,
            updated_at: NotSet,
        };
        Carts::insert(active)
            .on_conflict(OnConflict::column(CartCol::UserId).do_nothing().to_owned())
            .exec_without_returning(&self.conn)
            .await?;

        self.find_by_user(user_id).await?.ok_or_else(|| {
            StoreError::DataCorruption(format!("cart for user {user_id} vanished after insert"))
        })
    }

    async fn add_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<()> {
        let txn = self.conn.begin().await?;
        let result = txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                MERGE_LINE_SQL,
                [cart_id.into(), product_id.into(), quantity.into()],
            ))
            .await?;
        // The conflict branch skipped its update: the sum would overflow.
        if result.rows_affected() == 0 {
            return Err(StoreError::QuantityOverflow { product_id });
        }
        Self::touch_cart(&txn, cart_id).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<bool> {
        let txn = self.conn.begin().await?;
        let result = CartItems::update_many()
            .col_expr(ItemCol::Quantity, Expr::value(quantity))
            .col_expr(ItemCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(ItemCol::CartId.eq(cart_id))
            .filter(ItemCol::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Ok(false);
        }
        Self::touch_cart(&txn, cart_id).await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> StoreResult<bool> {
        let txn = self.conn.begin().await?;
        let result = CartItems::delete_many()
            .filter(ItemCol::CartId.eq(cart_id))
            .filter(ItemCol::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Ok(false);
        }
        Self::touch_cart(&txn, cart_id).await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn clear(&self, cart_id: CartId) -> StoreResult<u64> {
        let txn = self.conn.begin().await?;
        let result = CartItems::delete_many()
            .filter(ItemCol::CartId.eq(cart_id))
            .exec(&txn)
            .await?;
        Self::touch_cart(&txn, cart_id).await?;
        txn.commit().await?;
        Ok(result.rows_affected)
    }

    async fn remove_ordered(
        &self,
        cart_id: CartId,
        lines: &[(ProductId, i32)],
    ) -> StoreResult<u64> {
        let txn = self.conn.begin().await?;
        let mut removed = 0;
        for &(product_id, ordered) in lines {
            let deleted = CartItems::delete_many()
                .filter(ItemCol::CartId.eq(cart_id))
                .filter(ItemCol::ProductId.eq(product_id))
                .filter(ItemCol::Quantity.lte(ordered))
                .exec(&txn)
                .await?;
            removed += deleted.rows_affected;

            CartItems::update_many()
                .col_expr(ItemCol::Quantity, Expr::col(ItemCol::Quantity).sub(ordered))
                .col_expr(ItemCol::UpdatedAt, Expr::current_timestamp().into())
                .filter(ItemCol::CartId.eq(cart_id))
                .filter(ItemCol::ProductId.eq(product_id))
                .filter(ItemCol::Quantity.gt(ordered))
                .exec(&txn)
                .await?;
        }
        Self::touch_cart(&txn, cart_id).await?;
        txn.commit().await?;
        Ok(removed)
    }
}
