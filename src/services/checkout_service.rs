use std::{collections::HashMap, sync::Arc};

use rust_decimal::Decimal;

use crate::{
    dto::orders::{CheckoutOutcome, CheckoutRequest},
    error::{AppError, AppResult},
    models::{NewOrder, NewOrderItem, Order, Product, ProductId, UserId},
    repository::{CartRepository, OrderRepository, ProductRepository, StoreError},
    services::ensure_id,
};

/// Turns a user's cart into a pending order.
#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<dyn CartRepository>,
    products: Arc<dyn ProductRepository>,
    orders: Arc<dyn OrderRepository>,
}

impl CheckoutService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            carts,
            products,
            orders,
        }
    }

    /// Prices the cart at current catalog prices and places the order.
    ///
    /// Stock is decremented in the same storage transaction that inserts the
    /// order, so a failure leaves neither an order nor a stock change behind.
    /// Afterwards the ordered quantities are taken off the cart; anything
    /// added in the meantime stays. If that cleanup fails the order still
    /// stands.
    pub async fn checkout(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> AppResult<CheckoutOutcome> {
        ensure_id(user_id, "user")?;
        let shipping_address = request.shipping_address.trim();
        if shipping_address.is_empty() {
            return Err(AppError::InvalidInput("shipping address is required".into()));
        }

        if let Some(key) = request.idempotency_key {
            if let Some(order) = self.orders.find_by_idempotency_key(user_id, key).await? {
                tracing::info!(user_id, order_id = order.id, "checkout replayed");
                return Ok(CheckoutOutcome {
                    order,
                    replayed: true,
                });
            }
        }

        let cart = self
            .carts
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("cart not found".into()))?;
        if cart.is_empty() {
            return Err(AppError::EmptyCart);
        }

        let ids: Vec<ProductId> = cart.items.iter().map(|item| item.product_id).collect();
        let products: HashMap<ProductId, Product> = self
            .products
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut total = Decimal::ZERO;
        let mut items = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            if line.quantity < 1 {
                return Err(AppError::InvalidInput(format!(
                    "cart line for product {} has invalid quantity {}",
                    line.product_id, line.quantity
                )));
            }
            let product = products.get(&line.product_id).ok_or_else(|| {
                AppError::NotFound(format!("product {} not found", line.product_id))
            })?;
            if product.stock < line.quantity {
                return Err(AppError::InsufficientStock {
                    product: product.name.clone(),
                });
            }
            total += product.price * Decimal::from(line.quantity);
            items.push(NewOrderItem {
                product_id: product.id,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        let new_order = NewOrder {
            user_id,
            shipping_address: shipping_address.to_string(),
            total_amount: total,
            idempotency_key: request.idempotency_key,
            items,
        };

        let order = match self.orders.place(new_order).await {
            Ok(order) => order,
            Err(StoreError::StockConflict { product_id }) => {
                let product = products
                    .get(&product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| format!("#{product_id}"));
                return Err(AppError::InsufficientStock { product });
            }
            Err(StoreError::DuplicateKey) => {
                return self.replay_after_race(user_id, request.idempotency_key).await;
            }
            Err(err) => return Err(err.into()),
        };

        let ordered: Vec<(ProductId, i32)> = cart
            .items
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect();
        if let Err(err) = self.carts.remove_ordered(cart.id, &ordered).await {
            tracing::warn!(error = %err, user_id, order_id = order.id, "cart cleanup after checkout failed");
        }

        tracing::info!(
            user_id,
            order_id = order.id,
            total = %order.total_amount,
            lines = order.items.len(),
            "checkout completed"
        );
        Ok(CheckoutOutcome {
            order,
            replayed: false,
        })
    }

    /// A concurrent submission with the same key committed first.
    async fn replay_after_race(
        &self,
        user_id: UserId,
        key: Option<uuid::Uuid>,
    ) -> AppResult<CheckoutOutcome> {
        let existing: Option<Order> = match key {
            Some(key) => self.orders.find_by_idempotency_key(user_id, key).await?,
            None => None,
        };
        let order = existing.ok_or_else(|| {
            AppError::Conflict("checkout already submitted with this idempotency key".into())
        })?;
        tracing::info!(user_id, order_id = order.id, "checkout replayed after concurrent submit");
        Ok(CheckoutOutcome {
            order,
            replayed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        models::{Cart, CartId, NewProduct},
        repository::{InMemoryStore, StoreResult},
    };

    /// Cart store that slips another line into the cart right before the
    /// post-checkout cleanup runs, as a concurrent request would.
    struct LateAddCarts {
        inner: InMemoryStore,
        late_product: ProductId,
    }

    #[async_trait]
    impl CartRepository for LateAddCarts {
        async fn find_by_user(&self, user_id: UserId) -> StoreResult<Option<Cart>> {
            self.inner.find_by_user(user_id).await
        }

        async fn create_for_user(&self, user_id: UserId) -> StoreResult<Cart> {
            self.inner.create_for_user(user_id).await
        }

        async fn add_quantity(
            &self,
            cart_id: CartId,
            product_id: ProductId,
            quantity: i32,
        ) -> StoreResult<()> {
            self.inner.add_quantity(cart_id, product_id, quantity).await
        }

        async fn set_quantity(
            &self,
            cart_id: CartId,
            product_id: ProductId,
            quantity: i32,
        ) -> StoreResult<bool> {
            self.inner.set_quantity(cart_id, product_id, quantity).await
        }

        async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> StoreResult<bool> {
            self.inner.remove_item(cart_id, product_id).await
        }

        async fn clear(&self, cart_id: CartId) -> StoreResult<u64> {
            self.inner.clear(cart_id).await
        }

        async fn remove_ordered(
            &self,
            cart_id: CartId,
            lines: &[(ProductId, i32)],
        ) -> StoreResult<u64> {
            self.inner.add_quantity(cart_id, self.late_product, 1).await?;
            self.inner.remove_ordered(cart_id, lines).await
        }
    }

    struct Fixture {
        store: InMemoryStore,
        checkout: CheckoutService,
    }

    impl Fixture {
        fn new() -> Self {
            let store = InMemoryStore::new();
            let shared = Arc::new(store.clone());
            let checkout = CheckoutService::new(shared.clone(), shared.clone(), shared);
            Self { store, checkout }
        }

        async fn product(&self, name: &str, price: Decimal, stock: i32) -> anyhow::Result<Product> {
            let product = ProductRepository::create(
                &self.store,
                NewProduct {
                    name: name.into(),
                    description: None,
                    price,
                    stock,
                    category: None,
                    image_url: None,
                },
            )
            .await?;
            Ok(product)
        }

        async fn put_in_cart(
            &self,
            user_id: UserId,
            product_id: ProductId,
            quantity: i32,
        ) -> anyhow::Result<()> {
            let cart = self.store.create_for_user(user_id).await?;
            self.store.add_quantity(cart.id, product_id, quantity).await?;
            Ok(())
        }
    }

    fn request(address: &str) -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: address.into(),
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn rejects_blank_address_and_missing_cart() -> anyhow::Result<()> {
        let fx = Fixture::new();
        assert!(matches!(
            fx.checkout.checkout(1, request("   ")).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            fx.checkout.checkout(0, request("1 Main St")).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            fx.checkout.checkout(1, request("1 Main St")).await,
            Err(AppError::NotFound(_))
        ));

        fx.store.create_for_user(1).await?;
        assert!(matches!(
            fx.checkout.checkout(1, request("1 Main St")).await,
            Err(AppError::EmptyCart)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn captures_prices_and_empties_cart() -> anyhow::Result<()> {
        let fx = Fixture::new();
        let a = fx.product("A", Decimal::new(1000, 2), 5).await?;
        fx.put_in_cart(1, a.id, 2).await?;

        let outcome = fx.checkout.checkout(1, request(" 1 Main St ")).await?;
        assert!(!outcome.replayed);
        assert_eq!(outcome.order.total_amount, Decimal::new(2000, 2));
        assert_eq!(outcome.order.shipping_address, "1 Main St");
        assert_eq!(outcome.order.items[0].unit_price, Decimal::new(1000, 2));

        assert_eq!(fx.store.stock_of(a.id).await, Some(3));
        let cart = fx.store.find_by_user(1).await?.expect("cart kept");
        assert!(cart.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn deleted_product_fails_with_not_found() -> anyhow::Result<()> {
        let fx = Fixture::new();
        let a = fx.product("A", Decimal::ONE, 5).await?;
        fx.put_in_cart(1, a.id, 1).await?;
        ProductRepository::delete(&fx.store, a.id).await?;

        assert!(matches!(
            fx.checkout.checkout(1, request("1 Main St")).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(fx.store.order_count().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn cart_cleanup_failure_does_not_fail_checkout() -> anyhow::Result<()> {
        let fx = Fixture::new();
        let a = fx.product("A", Decimal::ONE, 5).await?;
        fx.put_in_cart(1, a.id, 1).await?;
        fx.store.fail_next_cart_cleanup().await;

        let outcome = fx.checkout.checkout(1, request("1 Main St")).await?;
        assert_eq!(outcome.order.items.len(), 1);

        let cart = fx.store.find_by_user(1).await?.expect("cart kept");
        assert_eq!(cart.items.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn lines_added_during_checkout_stay_in_the_cart() -> anyhow::Result<()> {
        let fx = Fixture::new();
        let a = fx.product("A", Decimal::ONE, 5).await?;
        let b = fx.product("B", Decimal::ONE, 5).await?;
        fx.put_in_cart(1, a.id, 2).await?;

        let shared = Arc::new(fx.store.clone());
        let carts = Arc::new(LateAddCarts {
            inner: fx.store.clone(),
            late_product: b.id,
        });
        let checkout = CheckoutService::new(carts, shared.clone(), shared);

        let outcome = checkout.checkout(1, request("1 Main St")).await?;
        assert_eq!(outcome.order.items.len(), 1);
        assert_eq!(outcome.order.items[0].product_id, a.id);

        let cart = fx.store.find_by_user(1).await?.expect("cart kept");
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_id, b.id);
        assert_eq!(cart.items[0].quantity, 1);
        Ok(())
    }

    #[tokio::test]
    async fn same_key_returns_the_first_order() -> anyhow::Result<()> {
        let fx = Fixture::new();
        let a = fx.product("A", Decimal::ONE, 5).await?;
        fx.put_in_cart(1, a.id, 2).await?;

        let key = uuid::Uuid::new_v4();
        let keyed = CheckoutRequest {
            shipping_address: "1 Main St".into(),
            idempotency_key: Some(key),
        };
        let first = fx.checkout.checkout(1, keyed.clone()).await?;
        let second = fx.checkout.checkout(1, keyed).await?;

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.order.id, second.order.id);
        assert_eq!(fx.store.order_count().await, 1);
        assert_eq!(fx.store.stock_of(a.id).await, Some(3));
        Ok(())
    }
}
