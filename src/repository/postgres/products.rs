use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, extension::postgres::PgExpr},
};

use crate::{
    entity::products::{ActiveModel, Column, Entity as Products},
    models::{NewProduct, Product, ProductChanges, ProductId},
    repository::{ProductFilter, ProductRepository, StoreError, StoreResult},
    routes::params::{ProductSortBy, SortOrder},
};

use super::{SeaOrmStore, product_from_entity};

#[async_trait]
impl ProductRepository for SeaOrmStore {
    async fn create(&self, product: NewProduct) -> StoreResult<Product> {
        let active = ActiveModel {
            id: NotSet,
            name: Set(product.name),
            description: Set(product.description),
            price: Set(product.price),
            stock: Set(product.stock),
            category: Set(product.category),
            image_url: Set(product.image_url),
            created_at: NotSet,
            updated_at: NotSet,
        };
        let model = active.insert(&self.conn).await?;
        Ok(product_from_entity(model))
    }

    async fn get(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let model = Products::find_by_id(id).one(&self.conn).await?;
        Ok(model.map(product_from_entity))
    }

    async fn get_many(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = Products::find()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .all(&self.conn)
            .await?;
        Ok(models.into_iter().map(product_from_entity).collect())
    }

    async fn list(&self, filter: &ProductFilter) -> StoreResult<(Vec<Product>, u64)> {
        let mut condition = Condition::all();

        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            condition = condition.add(
                Condition::any()
                    .add(Expr::col(Column::Name).ilike(pattern.clone()))
                    .add(Expr::col(Column::Description).ilike(pattern)),
            );
        }
        if let Some(category) = &filter.category {
            condition = condition.add(Column::Category.eq(category.clone()));
        }
        if let Some(min_price) = filter.min_price {
            condition = condition.add(Column::Price.gte(min_price));
        }
        if let Some(max_price) = filter.max_price {
            condition = condition.add(Column::Price.lte(max_price));
        }
        if let Some(max_stock) = filter.max_stock {
            condition = condition.add(Column::Stock.lte(max_stock));
        }

        let sort_col = match filter.sort_by {
            ProductSortBy::CreatedAt => Column::CreatedAt,
            ProductSortBy::Price => Column::Price,
            ProductSortBy::Name => Column::Name,
            ProductSortBy::Stock => Column::Stock,
        };

        let mut finder = Products::find().filter(condition);
        finder = match filter.sort_order {
            SortOrder::Asc => finder.order_by_asc(sort_col).order_by_asc(Column::Id),
            SortOrder::Desc => finder.order_by_desc(sort_col).order_by_desc(Column::Id),
        };

        let total = finder.clone().count(&self.conn).await?;
        let items = finder
            .limit(filter.limit)
            .offset(filter.offset)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect();

        Ok((items, total))
    }

    async fn update(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> StoreResult<Option<Product>> {
        let Some(existing) = Products::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active = existing.into_active_model();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = changes.price {
            active.price = Set(price);
        }
        if let Some(stock) = changes.stock {
            active.stock = Set(stock);
        }
        if let Some(category) = changes.category {
            active.category = Set(Some(category));
        }
        if let Some(image_url) = changes.image_url {
            active.image_url = Set(Some(image_url));
        }
        active.updated_at = Set(chrono::Utc::now().into());

        let model = active.update(&self.conn).await?;
        Ok(Some(product_from_entity(model)))
    }

    async fn delete(&self, id: ProductId) -> StoreResult<bool> {
        let result = Products::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }

    async fn adjust_stock(&self, id: ProductId, delta: i32) -> StoreResult<Option<Product>> {
        let updated = Products::update_many()
            .col_expr(Column::Stock, Expr::col(Column::Stock).add(delta))
            .col_expr(Column::UpdatedAt, Expr::current_timestamp().into())
            .filter(Column::Id.eq(id))
            .filter(Column::Stock.gte(-i64::from(delta)))
            .exec_with_returning(&self.conn)
            .await?;

        if let Some(model) = updated.into_iter().next() {
            return Ok(Some(product_from_entity(model)));
        }

        // Nothing matched: either the product is gone or the guard rejected it.
        match Products::find_by_id(id).one(&self.conn).await? {
            Some(_) => Err(StoreError::StockConflict { product_id: id }),
            None => Ok(None),
        }
    }
}
