use std::sync::Arc;

use order_core::{
    dto::orders::CheckoutRequest,
    error::AppError,
    models::{NewProduct, OrderStatus, Product},
    repository::{CartRepository, InMemoryStore},
    state::AppState,
};
use rust_decimal::Decimal;
use uuid::Uuid;

fn state() -> (AppState, InMemoryStore) {
    let store = InMemoryStore::new();
    (AppState::new(Arc::new(store.clone()), "secret"), store)
}

async fn product(state: &AppState, name: &str, price: Decimal, stock: i32) -> anyhow::Result<Product> {
    let product = state
        .catalog
        .create(NewProduct {
            name: name.into(),
            description: None,
            price,
            stock,
            category: None,
            image_url: None,
        })
        .await?;
    Ok(product)
}

fn request(address: &str) -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: address.into(),
        idempotency_key: None,
    }
}

// A at 10.00 x2 plus B at 3.50 x1 totals 23.50 and empties the cart.
#[tokio::test]
async fn checkout_totals_lines_and_clears_cart() -> anyhow::Result<()> {
    let (state, store) = state();
    let a = product(&state, "A", Decimal::new(1000, 2), 5).await?;
    let b = product(&state, "B", Decimal::new(350, 2), 1).await?;

    state.carts.add_item(1, a.id, 2).await?;
    state.carts.add_item(1, b.id, 1).await?;

    let outcome = state.checkout.checkout(1, request("221B Baker St")).await?;
    let order = outcome.order;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, Decimal::new(2350, 2));
    assert_eq!(order.items.len(), 2);
    let sum: Decimal = order.items.iter().map(|i| i.line_total()).sum();
    assert_eq!(sum, order.total_amount);

    assert!(state.carts.get_or_create_cart(1).await?.is_empty());
    assert_eq!(store.stock_of(a.id).await, Some(3));
    assert_eq!(store.stock_of(b.id).await, Some(0));
    Ok(())
}

// Stock that ran out after the item was carted fails the whole checkout.
#[tokio::test]
async fn insufficient_stock_leaves_everything_untouched() -> anyhow::Result<()> {
    let (state, store) = state();
    let a = product(&state, "A", Decimal::new(1000, 2), 5).await?;
    let b = product(&state, "B", Decimal::new(350, 2), 1).await?;

    state.carts.add_item(1, a.id, 2).await?;
    state.carts.add_item(1, b.id, 1).await?;
    state.catalog.adjust_stock(b.id, -1).await?;

    let err = state
        .checkout
        .checkout(1, request("221B Baker St"))
        .await
        .unwrap_err();
    match &err {
        AppError::InsufficientStock { product } => assert_eq!(product, "B"),
        other => panic!("expected insufficient stock, got {other:?}"),
    }
    assert!(err.to_string().contains("B"));

    assert_eq!(store.order_count().await, 0);
    assert_eq!(store.stock_of(a.id).await, Some(5));
    assert_eq!(state.carts.get_or_create_cart(1).await?.items.len(), 2);
    Ok(())
}

#[tokio::test]
async fn price_changes_after_checkout_do_not_touch_the_order() -> anyhow::Result<()> {
    let (state, _) = state();
    let a = product(&state, "A", Decimal::new(1000, 2), 5).await?;
    state.carts.add_item(1, a.id, 1).await?;
    let order = state.checkout.checkout(1, request("Somewhere")).await?.order;

    state
        .catalog
        .update(
            a.id,
            order_core::models::ProductChanges {
                price: Some(Decimal::new(9900, 2)),
                ..Default::default()
            },
        )
        .await?;

    let stored = state.orders.get_by_id(order.id).await?;
    assert_eq!(stored.items[0].unit_price, Decimal::new(1000, 2));
    assert_eq!(stored.total_amount, Decimal::new(1000, 2));
    Ok(())
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() -> anyhow::Result<()> {
    let (state, store) = state();
    let scarce = product(&state, "Last Units", Decimal::ONE, 3).await?;

    for user_id in 1..=5 {
        let cart = store.create_for_user(user_id).await?;
        store.add_quantity(cart.id, scarce.id, 1).await?;
    }

    let mut handles = Vec::new();
    for user_id in 1..=5 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            state.checkout.checkout(user_id, request("Somewhere")).await
        }));
    }

    let mut placed = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => placed += 1,
            Err(AppError::InsufficientStock { .. }) => refused += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, 3);
    assert_eq!(refused, 2);
    assert_eq!(store.stock_of(scarce.id).await, Some(0));
    Ok(())
}

#[tokio::test]
async fn replayed_key_creates_no_second_order() -> anyhow::Result<()> {
    let (state, store) = state();
    let a = product(&state, "A", Decimal::ONE, 10).await?;
    state.carts.add_item(1, a.id, 2).await?;

    let key = Uuid::new_v4();
    let keyed = CheckoutRequest {
        shipping_address: "Somewhere".into(),
        idempotency_key: Some(key),
    };
    let first = state.checkout.checkout(1, keyed.clone()).await?;

    // The replay wins even though the cart is now empty.
    let again = state.checkout.checkout(1, keyed).await?;
    assert!(again.replayed);
    assert_eq!(again.order.id, first.order.id);
    assert_eq!(store.order_count().await, 1);

    // Keys are scoped per user.
    state.carts.add_item(2, a.id, 1).await?;
    let other = state
        .checkout
        .checkout(
            2,
            CheckoutRequest {
                shipping_address: "Elsewhere".into(),
                idempotency_key: Some(key),
            },
        )
        .await?;
    assert!(!other.replayed);
    assert_ne!(other.order.id, first.order.id);
    Ok(())
}

#[tokio::test]
async fn cancel_restores_stock_and_illegal_moves_are_refused() -> anyhow::Result<()> {
    let (state, store) = state();
    let a = product(&state, "A", Decimal::ONE, 4).await?;
    state.carts.add_item(1, a.id, 3).await?;
    let order = state.checkout.checkout(1, request("Somewhere")).await?.order;
    assert_eq!(store.stock_of(a.id).await, Some(1));

    state.orders.update_status(order.id, "confirmed").await?;
    state.orders.update_status(order.id, "shipped").await?;

    let err = state
        .orders
        .update_status(order.id, "pending")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Pending
        }
    ));

    let cancelled = state.orders.update_status(order.id, "cancelled").await?;
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(store.stock_of(a.id).await, Some(4));
    Ok(())
}

#[tokio::test]
async fn low_stock_reflects_checkout() -> anyhow::Result<()> {
    let (state, _) = state();
    let a = product(&state, "A", Decimal::ONE, 10).await?;
    product(&state, "B", Decimal::ONE, 100).await?;

    let (items, _) = state.catalog.low_stock(None, 20, 0).await?;
    assert!(items.is_empty());

    state.carts.add_item(1, a.id, 6).await?;
    state.checkout.checkout(1, request("Somewhere")).await?;

    let (items, total) = state.catalog.low_stock(None, 20, 0).await?;
    assert_eq!(total, 1);
    assert_eq!(items[0].id, a.id);
    Ok(())
}
