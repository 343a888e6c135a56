use std::sync::Arc;

use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::{NewProduct, Product, ProductChanges, ProductId},
    repository::{ProductFilter, ProductRepository, StoreError},
    routes::params::{ProductSortBy, SortOrder},
    services::ensure_id,
};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Clone)]
pub struct CatalogService {
    products: Arc<dyn ProductRepository>,
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    pub async fn create(&self, product: NewProduct) -> AppResult<Product> {
        let product = NewProduct {
            name: validate_name(&product.name)?,
            price: validate_price(product.price)?,
            stock: validate_stock(product.stock)?,
            ..product
        };
        let created = self.products.create(product).await?;
        tracing::info!(product_id = created.id, name = %created.name, "product created");
        Ok(created)
    }

    pub async fn get(&self, id: ProductId) -> AppResult<Product> {
        ensure_id(id, "product")?;
        self.products
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("product not found".into()))
    }

    pub async fn list(&self, filter: &ProductFilter) -> AppResult<(Vec<Product>, u64)> {
        if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
            if min > max {
                return Err(AppError::InvalidInput(
                    "min_price must not exceed max_price".into(),
                ));
            }
        }
        Ok(self.products.list(filter).await?)
    }

    pub async fn update(&self, id: ProductId, changes: ProductChanges) -> AppResult<Product> {
        ensure_id(id, "product")?;
        let changes = ProductChanges {
            name: changes.name.as_deref().map(validate_name).transpose()?,
            price: changes.price.map(validate_price).transpose()?,
            stock: changes.stock.map(validate_stock).transpose()?,
            ..changes
        };
        let updated = self
            .products
            .update(id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("product not found".into()))?;
        tracing::info!(product_id = id, "product updated");
        Ok(updated)
    }

    /// Cart and order lines that reference the product are left in place.
    pub async fn delete(&self, id: ProductId) -> AppResult<()> {
        ensure_id(id, "product")?;
        if !self.products.delete(id).await? {
            return Err(AppError::NotFound("product not found".into()));
        }
        tracing::info!(product_id = id, "product deleted");
        Ok(())
    }

    pub async fn adjust_stock(&self, id: ProductId, delta: i32) -> AppResult<Product> {
        ensure_id(id, "product")?;
        if delta == 0 {
            return Err(AppError::InvalidInput("delta must not be zero".into()));
        }

        match self.products.adjust_stock(id, delta).await {
            Ok(Some(product)) => {
                tracing::info!(product_id = id, delta, stock = product.stock, "stock adjusted");
                Ok(product)
            }
            Ok(None) => Err(AppError::NotFound("product not found".into())),
            Err(StoreError::StockConflict { .. }) => {
                let product = self.get(id).await?;
                Err(AppError::InsufficientStock {
                    product: product.name,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Products at or below `threshold` units, lowest stock first.
    pub async fn low_stock(
        &self,
        threshold: Option<i32>,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<Product>, u64)> {
        let threshold = threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        if threshold < 0 {
            return Err(AppError::InvalidInput("threshold must not be negative".into()));
        }
        let filter = ProductFilter {
            max_stock: Some(threshold),
            sort_by: ProductSortBy::Stock,
            sort_order: SortOrder::Asc,
            limit,
            offset,
            ..ProductFilter::default()
        };
        Ok(self.products.list(&filter).await?)
    }
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("product name is required".into()));
    }
    Ok(name.to_string())
}

fn validate_price(price: Decimal) -> AppResult<Decimal> {
    if price < Decimal::ZERO {
        return Err(AppError::InvalidInput("price must not be negative".into()));
    }
    if price.normalize().scale() > 2 {
        return Err(AppError::InvalidInput(
            "price must have at most two decimal places".into(),
        ));
    }
    Ok(price)
}

fn validate_stock(stock: i32) -> AppResult<i32> {
    if stock < 0 {
        return Err(AppError::InvalidInput("stock must not be negative".into()));
    }
    Ok(stock)
}
