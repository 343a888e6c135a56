use std::sync::Arc;

use crate::{
    repository::{CartRepository, OrderRepository, ProductRepository},
    services::{CartService, CatalogService, CheckoutService, OrderService},
};

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    /// Wires every service to the one store handle.
    pub fn new<S>(store: Arc<S>, jwt_secret: &str) -> Self
    where
        S: ProductRepository + CartRepository + OrderRepository + 'static,
    {
        Self {
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone(), store.clone()),
            checkout: CheckoutService::new(store.clone(), store.clone(), store.clone()),
            orders: OrderService::new(store),
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}
