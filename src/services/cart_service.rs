use std::{collections::HashMap, sync::Arc};

use rust_decimal::Decimal;

use crate::{
    dto::cart::{CartLine, CartView},
    error::{AppError, AppResult},
    models::{Cart, Product, ProductId, UserId},
    repository::{CartRepository, ProductRepository, StoreError},
    services::ensure_id,
};

/// Per-user shopping carts.
///
/// Stock checks made here are advisory: nothing is reserved, and checkout
/// validates again against the stock at that moment.
#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    products: Arc<dyn ProductRepository>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartRepository>, products: Arc<dyn ProductRepository>) -> Self {
        Self { carts, products }
    }

    pub async fn get_or_create_cart(&self, user_id: UserId) -> AppResult<Cart> {
        ensure_id(user_id, "user")?;
        if let Some(cart) = self.carts.find_by_user(user_id).await? {
            return Ok(cart);
        }
        let cart = self.carts.create_for_user(user_id).await?;
        tracing::debug!(user_id, cart_id = cart.id, "cart created");
        Ok(cart)
    }

    /// Adds `quantity` units, summing with an existing line for the product.
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> AppResult<Cart> {
        ensure_id(user_id, "user")?;
        ensure_id(product_id, "product")?;
        if quantity <= 0 {
            return Err(AppError::InvalidInput(
                "quantity must be greater than 0".into(),
            ));
        }

        self.check_stock(product_id, quantity).await?;
        let cart = self.get_or_create_cart(user_id).await?;
        self.carts.add_quantity(cart.id, product_id, quantity).await?;
        tracing::debug!(user_id, product_id, quantity, "cart item added");

        self.reload(user_id).await
    }

    /// Sets the line's quantity outright; 0 removes the line.
    pub async fn update_item_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> AppResult<Cart> {
        ensure_id(user_id, "user")?;
        ensure_id(product_id, "product")?;
        if quantity < 0 {
            return Err(AppError::InvalidInput("quantity must not be negative".into()));
        }
        if quantity == 0 {
            return self.remove_item(user_id, product_id).await;
        }

        self.check_stock(product_id, quantity).await?;
        let cart = self.get_or_create_cart(user_id).await?;
        if !self.carts.set_quantity(cart.id, product_id, quantity).await? {
            return Err(AppError::NotFound("cart item not found".into()));
        }
        tracing::debug!(user_id, product_id, quantity, "cart item updated");

        self.reload(user_id).await
    }

    /// Removing a product that is not in the cart is not an error.
    pub async fn remove_item(&self, user_id: UserId, product_id: ProductId) -> AppResult<Cart> {
        ensure_id(product_id, "product")?;
        let cart = self.get_or_create_cart(user_id).await?;
        if self.carts.remove_item(cart.id, product_id).await? {
            tracing::debug!(user_id, product_id, "cart item removed");
            return self.reload(user_id).await;
        }
        Ok(cart)
    }

    pub async fn clear(&self, user_id: UserId) -> AppResult<Cart> {
        let cart = self.get_or_create_cart(user_id).await?;
        let removed = self.carts.clear(cart.id).await?;
        tracing::debug!(user_id, removed, "cart cleared");
        self.reload(user_id).await
    }

    /// The cart priced at current catalog prices.
    pub async fn view(&self, user_id: UserId) -> AppResult<CartView> {
        let cart = self.get_or_create_cart(user_id).await?;
        let ids: Vec<ProductId> = cart.items.iter().map(|item| item.product_id).collect();
        let products: HashMap<ProductId, Product> = self
            .products
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(build_view(cart, &products))
    }

    async fn check_stock(&self, product_id: ProductId, quantity: i32) -> AppResult<()> {
        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("product not found".into()))?;
        if product.stock < quantity {
            return Err(AppError::InsufficientStock {
                product: product.name,
            });
        }
        Ok(())
    }

    async fn reload(&self, user_id: UserId) -> AppResult<Cart> {
        let cart = self.carts.find_by_user(user_id).await?.ok_or_else(|| {
            StoreError::DataCorruption(format!("cart for user {user_id} disappeared"))
        })?;
        Ok(cart)
    }
}

fn build_view(cart: Cart, products: &HashMap<ProductId, Product>) -> CartView {
    let mut subtotal = Decimal::ZERO;
    let mut item_count = 0_i64;
    let items = cart
        .items
        .into_iter()
        .map(|item| {
            let product = products.get(&item.product_id).cloned();
            let line_total = product
                .as_ref()
                .map(|p| p.price * Decimal::from(item.quantity));
            if let Some(total) = line_total {
                subtotal += total;
            }
            item_count += i64::from(item.quantity);
            CartLine {
                id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                product,
                line_total,
            }
        })
        .collect();

    CartView {
        cart_id: cart.id,
        user_id: cart.user_id,
        items,
        item_count,
        subtotal,
    }
}
