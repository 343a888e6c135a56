use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;
use order_core::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    middleware::auth::{ROLE_ADMIN, ROLE_USER, issue_token},
    models::NewProduct,
    repository::{ProductFilter, SeaOrmStore},
    services::CatalogService,
};

const DEMO_ADMIN_ID: i64 = 1;
const DEMO_USER_ID: i64 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url, 2).await?;
    run_migrations(&orm).await?;

    let catalog = CatalogService::new(Arc::new(SeaOrmStore::new(orm.clone())));
    seed_products(&catalog).await?;

    // Tokens for local testing; identities come from the auth service in production.
    let ttl = Duration::days(7);
    let admin = issue_token(&config.jwt_secret, DEMO_ADMIN_ID, ROLE_ADMIN, ttl)?;
    let user = issue_token(&config.jwt_secret, DEMO_USER_ID, ROLE_USER, ttl)?;
    println!("Admin token (user {DEMO_ADMIN_ID}): {admin}");
    println!("User token (user {DEMO_USER_ID}): {user}");

    orm.close().await?;
    Ok(())
}

async fn seed_products(catalog: &CatalogService) -> anyhow::Result<()> {
    let samples = [
        ("Laptop Pro 14", "Lightweight laptop with 16GB RAM", "1299.00", 12, "electronics"),
        ("Wireless Mouse", "Ergonomic mouse with USB receiver", "24.90", 80, "electronics"),
        ("Mechanical Keyboard", "Hot-swappable switches, RGB", "89.50", 3, "electronics"),
        ("Coffee Mug", "Ceramic, 350ml", "8.00", 40, "kitchen"),
        ("Desk Lamp", "LED lamp with dimmer", "34.99", 4, "home"),
    ];

    for (name, description, price, stock, category) in samples {
        let existing = catalog
            .list(&ProductFilter {
                search: Some(name.to_string()),
                ..ProductFilter::default()
            })
            .await?;
        if existing.0.iter().any(|p| p.name == name) {
            println!("Product {name} already present");
            continue;
        }

        catalog
            .create(NewProduct {
                name: name.to_string(),
                description: Some(description.to_string()),
                price: price.parse::<Decimal>()?,
                stock,
                category: Some(category.to_string()),
                image_url: None,
            })
            .await?;
        println!("Seeded product {name}");
    }

    Ok(())
}
