use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::{
        Cart, CartId, CartItem, NewOrder, NewProduct, Order, OrderId, OrderItem, OrderStatus,
        Product, ProductChanges, ProductId, UserId,
    },
    routes::params::{ProductSortBy, SortOrder},
};

use super::{
    CartRepository, OrderFilter, OrderRepository, ProductFilter, ProductRepository, StoreError,
    StoreResult,
};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<CartId, Cart>,
    orders: BTreeMap<OrderId, Order>,
    fail_next_cart_cleanup: bool,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn cart_mut(&mut self, cart_id: CartId) -> StoreResult<&mut Cart> {
        self.carts
            .get_mut(&cart_id)
            .ok_or_else(|| StoreError::DataCorruption(format!("cart {cart_id} does not exist")))
    }
}

/// In-memory store implementing every repository trait.
///
/// All tables sit behind one lock, so each trait method is atomic the same
/// way a single database transaction is. Intended for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `CartRepository::remove_ordered` call fail with a
    /// database error.
    pub async fn fail_next_cart_cleanup(&self) {
        self.tables.write().await.fail_next_cart_cleanup = true;
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    pub async fn stock_of(&self, product_id: ProductId) -> Option<i32> {
        self.tables
            .read()
            .await
            .products
            .get(&product_id)
            .map(|p| p.stock)
    }
}

fn page<T>(items: Vec<T>, limit: u64, offset: u64) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    (items, total)
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn create(&self, product: NewProduct) -> StoreResult<Product> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let product = Product {
            id: tables.next_id(),
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            category: product.category,
            image_url: product.image_url,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn list(&self, filter: &ProductFilter) -> StoreResult<(Vec<Product>, u64)> {
        let tables = self.tables.read().await;
        let search = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut matches: Vec<Product> = tables
            .products
            .values()
            .filter(|p| match &search {
                Some(needle) => {
                    p.name.to_lowercase().contains(needle)
                        || p.description
                            .as_ref()
                            .is_some_and(|d| d.to_lowercase().contains(needle))
                }
                None => true,
            })
            .filter(|p| match &filter.category {
                Some(category) => p.category.as_deref() == Some(category.as_str()),
                None => true,
            })
            .filter(|p| filter.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| filter.max_price.is_none_or(|max| p.price <= max))
            .filter(|p| filter.max_stock.is_none_or(|max| p.stock <= max))
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            let ordering = match filter.sort_by {
                ProductSortBy::CreatedAt => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
                ProductSortBy::Price => a.price.cmp(&b.price),
                ProductSortBy::Name => a.name.cmp(&b.name),
                ProductSortBy::Stock => a.stock.cmp(&b.stock),
            };
            match filter.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        Ok(page(matches, filter.limit, filter.offset))
    }

    async fn update(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> StoreResult<Option<Product>> {
        let mut tables = self.tables.write().await;
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            product.name = name;
        }
        if let Some(description) = changes.description {
            product.description = Some(description);
        }
        if let Some(price) = changes.price {
            product.price = price;
        }
        if let Some(stock) = changes.stock {
            product.stock = stock;
        }
        if let Some(category) = changes.category {
            product.category = Some(category);
        }
        if let Some(image_url) = changes.image_url {
            product.image_url = Some(image_url);
        }
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete(&self, id: ProductId) -> StoreResult<bool> {
        Ok(self.tables.write().await.products.remove(&id).is_some())
    }

    async fn adjust_stock(&self, id: ProductId, delta: i32) -> StoreResult<Option<Product>> {
        let mut tables = self.tables.write().await;
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(None);
        };
        let next = product
            .stock
            .checked_add(delta)
            .filter(|stock| *stock >= 0)
            .ok_or(StoreError::StockConflict { product_id: id })?;
        product.stock = next;
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Option<Cart>> {
        let tables = self.tables.read().await;
        Ok(tables
            .carts
            .values()
            .find(|cart| cart.user_id == user_id)
            .cloned())
    }

    async fn create_for_user(&self, user_id: UserId) -> StoreResult<Cart> {
        let mut tables = self.tables.write().await;
        if let Some(cart) = tables.carts.values().find(|cart| cart.user_id == user_id) {
            return Ok(cart.clone());
        }
        let now = Utc::now();
        let cart = Cart {
            id: tables.next_id(),
            user_id,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tables.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn add_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let item_id = tables.next_id();
        let cart = tables.cart_mut(cart_id)?;
        let now = Utc::now();
        match cart.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = item
                    .quantity
                    .checked_add(quantity)
                    .ok_or(StoreError::QuantityOverflow { product_id })?;
                item.updated_at = now;
            }
            None => cart.items.push(CartItem {
                id: item_id,
                cart_id,
                product_id,
                quantity,
                created_at: now,
                updated_at: now,
            }),
        }
        cart.updated_at = now;
        Ok(())
    }

    async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let cart = tables.cart_mut(cart_id)?;
        let now = Utc::now();
        let Some(item) = cart.items.iter_mut().find(|i| i.product_id == product_id) else {
            return Ok(false);
        };
        item.quantity = quantity;
        item.updated_at = now;
        cart.updated_at = now;
        Ok(true)
    }

    async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let cart = tables.cart_mut(cart_id)?;
        let before = cart.items.len();
        cart.items.retain(|i| i.product_id != product_id);
        let removed = cart.items.len() != before;
        if removed {
            cart.updated_at = Utc::now();
        }
        Ok(removed)
    }

    async fn clear(&self, cart_id: CartId) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let cart = tables.cart_mut(cart_id)?;
        let removed = cart.items.len() as u64;
        cart.items.clear();
        cart.updated_at = Utc::now();
        Ok(removed)
    }

    async fn remove_ordered(
        &self,
        cart_id: CartId,
        lines: &[(ProductId, i32)],
    ) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        if std::mem::take(&mut tables.fail_next_cart_cleanup) {
            return Err(StoreError::Database(sea_orm::DbErr::Custom(
                "injected cart cleanup failure".into(),
            )));
        }
        let cart = tables.cart_mut(cart_id)?;
        let now = Utc::now();
        let mut removed = 0;
        for &(product_id, ordered) in lines {
            let Some(pos) = cart.items.iter().position(|i| i.product_id == product_id) else {
                continue;
            };
            let item = &mut cart.items[pos];
            if item.quantity <= ordered {
                cart.items.remove(pos);
                removed += 1;
            } else {
                item.quantity -= ordered;
                item.updated_at = now;
            }
        }
        cart.updated_at = now;
        Ok(removed)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn place(&self, order: NewOrder) -> StoreResult<Order> {
        let mut tables = self.tables.write().await;

        if let Some(key) = order.idempotency_key {
            let taken = tables
                .orders
                .values()
                .any(|o| o.user_id == order.user_id && o.idempotency_key == Some(key));
            if taken {
                return Err(StoreError::DuplicateKey);
            }
        }

        // Check every line before touching any stock so a failure leaves no trace.
        let mut requested: HashMap<ProductId, i32> = HashMap::new();
        for item in &order.items {
            *requested.entry(item.product_id).or_default() += item.quantity;
        }
        for item in &order.items {
            let available = tables.products.get(&item.product_id).map(|p| p.stock);
            if available.is_none_or(|stock| stock < requested[&item.product_id]) {
                return Err(StoreError::StockConflict {
                    product_id: item.product_id,
                });
            }
        }

        let now = Utc::now();
        for (product_id, quantity) in requested {
            if let Some(product) = tables.products.get_mut(&product_id) {
                product.stock -= quantity;
                product.updated_at = now;
            }
        }

        let order_id = tables.next_id();
        let mut items = Vec::with_capacity(order.items.len());
        for item in order.items {
            items.push(OrderItem {
                id: tables.next_id(),
                order_id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                created_at: now,
            });
        }

        let stored = Order {
            id: order_id,
            user_id: order.user_id,
            status: OrderStatus::Pending,
            total_amount: order.total_amount,
            shipping_address: order.shipping_address,
            idempotency_key: order.idempotency_key,
            items,
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(order_id, stored.clone());
        Ok(stored)
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: Uuid,
    ) -> StoreResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .find(|o| o.user_id == user_id && o.idempotency_key == Some(key))
            .cloned())
    }

    async fn get(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list(&self, filter: &OrderFilter) -> StoreResult<(Vec<Order>, u64)> {
        let tables = self.tables.read().await;
        let mut matches: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| filter.user_id.is_none_or(|user_id| o.user_id == user_id))
            .filter(|o| filter.status.is_none_or(|status| o.status == status))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            let ordering = a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
            match filter.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        Ok(page(matches, filter.limit, filter.offset))
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<Order> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let order = match tables.orders.get_mut(&id) {
            Some(order) if order.status == from => order,
            _ => return Err(StoreError::StatusConflict),
        };
        order.status = to;
        order.updated_at = now;
        let order = order.clone();

        if to == OrderStatus::Cancelled {
            for item in &order.items {
                if let Some(product) = tables.products.get_mut(&item.product_id) {
                    product.stock += item.quantity;
                    product.updated_at = now;
                }
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewOrderItem;

    fn widget(stock: i32) -> NewProduct {
        NewProduct {
            name: "Widget".into(),
            description: None,
            price: Decimal::new(250, 2),
            stock,
            category: Some("tools".into()),
            image_url: None,
        }
    }

    fn order_for(user_id: UserId, product_id: ProductId, quantity: i32) -> NewOrder {
        NewOrder {
            user_id,
            shipping_address: "1 Main St".into(),
            total_amount: Decimal::new(250, 2) * Decimal::from(quantity),
            idempotency_key: None,
            items: vec![NewOrderItem {
                product_id,
                quantity,
                unit_price: Decimal::new(250, 2),
            }],
        }
    }

    #[tokio::test]
    async fn place_decrements_stock_and_stores_pending_order() {
        let store = InMemoryStore::new();
        let product = ProductRepository::create(&store, widget(5)).await.unwrap();

        let order = store.place(order_for(1, product.id, 3)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 1);
        assert_eq!(store.stock_of(product.id).await, Some(2));
    }

    #[tokio::test]
    async fn place_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let plenty = ProductRepository::create(&store, widget(10)).await.unwrap();
        let scarce = ProductRepository::create(&store, widget(1)).await.unwrap();

        let mut order = order_for(1, plenty.id, 2);
        order.items.push(NewOrderItem {
            product_id: scarce.id,
            quantity: 2,
            unit_price: Decimal::ONE,
        });

        let err = store.place(order).await.unwrap_err();
        assert!(matches!(err, StoreError::StockConflict { product_id } if product_id == scarce.id));
        assert_eq!(store.stock_of(plenty.id).await, Some(10));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_rejected() {
        let store = InMemoryStore::new();
        let product = ProductRepository::create(&store, widget(10)).await.unwrap();
        let key = Uuid::new_v4();

        let mut first = order_for(1, product.id, 1);
        first.idempotency_key = Some(key);
        store.place(first.clone()).await.unwrap();

        let err = store.place(first).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));
        assert_eq!(store.stock_of(product.id).await, Some(9));
    }

    #[tokio::test]
    async fn cancelling_restocks_and_stale_transition_conflicts() {
        let store = InMemoryStore::new();
        let product = ProductRepository::create(&store, widget(4)).await.unwrap();
        let order = store.place(order_for(1, product.id, 4)).await.unwrap();
        assert_eq!(store.stock_of(product.id).await, Some(0));

        let cancelled = store
            .transition_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(store.stock_of(product.id).await, Some(4));

        let err = store
            .transition_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StatusConflict));
    }

    #[tokio::test]
    async fn adjust_stock_never_goes_negative() {
        let store = InMemoryStore::new();
        let product = ProductRepository::create(&store, widget(2)).await.unwrap();

        let err = store.adjust_stock(product.id, -3).await.unwrap_err();
        assert!(matches!(err, StoreError::StockConflict { .. }));

        let updated = store.adjust_stock(product.id, -2).await.unwrap().unwrap();
        assert_eq!(updated.stock, 0);
        assert!(store.adjust_stock(999, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cart_lines_merge_per_product() {
        let store = InMemoryStore::new();
        let cart = store.create_for_user(42).await.unwrap();
        let again = store.create_for_user(42).await.unwrap();
        assert_eq!(cart.id, again.id);

        store.add_quantity(cart.id, 7, 1).await.unwrap();
        store.add_quantity(cart.id, 7, 2).await.unwrap();

        let cart = store.find_by_user(42).await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
    }

    #[tokio::test]
    async fn merged_quantity_overflow_leaves_line_unchanged() {
        let store = InMemoryStore::new();
        let cart = store.create_for_user(42).await.unwrap();
        store.add_quantity(cart.id, 7, i32::MAX - 1).await.unwrap();

        let err = store.add_quantity(cart.id, 7, 2).await.unwrap_err();
        assert!(matches!(err, StoreError::QuantityOverflow { product_id: 7 }));

        let cart = store.find_by_user(42).await.unwrap().unwrap();
        assert_eq!(cart.items[0].quantity, i32::MAX - 1);
    }

    #[tokio::test]
    async fn remove_ordered_keeps_lines_added_after_checkout_read() {
        let store = InMemoryStore::new();
        let cart = store.create_for_user(42).await.unwrap();
        store.add_quantity(cart.id, 1, 2).await.unwrap();
        store.add_quantity(cart.id, 2, 5).await.unwrap();
        store.add_quantity(cart.id, 3, 1).await.unwrap();

        // Product 2 grew from 3 to 5 units after the order was priced.
        let removed = store
            .remove_ordered(cart.id, &[(1, 2), (2, 3)])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let cart = store.find_by_user(42).await.unwrap().unwrap();
        let left: Vec<(ProductId, i32)> = cart
            .items
            .iter()
            .map(|i| (i.product_id, i.quantity))
            .collect();
        assert_eq!(left, vec![(2, 2), (3, 1)]);
    }
}
