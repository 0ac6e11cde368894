use async_trait::async_trait;
use database::BaseRepository;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    entity::{category, product, product_image, review},
    error::{CatalogError, CatalogResult},
    models::{
        Category, CategoryFilter, CreateCategory, CreateProduct, NewProductImage, NewReview,
        Product, ProductFilter, ProductImage, ProductWithImages, Review, ReviewStats,
        UpdateCategory, UpdateProduct,
    },
    repository::CatalogRepository,
};

/// Postgres-backed catalog repository.
///
/// Product writes run in a transaction; updates lock the product row first
/// so concurrent image replaces of the same product serialize.
#[derive(Clone)]
pub struct PgCatalogRepository {
    categories: BaseRepository<category::Entity>,
    products: BaseRepository<product::Entity>,
}

impl PgCatalogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            categories: BaseRepository::new(db.clone()),
            products: BaseRepository::new(db),
        }
    }

    fn db(&self) -> &DatabaseConnection {
        self.products.db()
    }
}

/// `%term%` with LIKE wildcards in `term` escaped
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

async fn insert_images<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    images: Vec<NewProductImage>,
) -> Result<(), DbErr> {
    let models: Vec<product_image::ActiveModel> = images
        .into_iter()
        .enumerate()
        .map(|(position, image)| ProductImage::new(product_id, position as i32, image).into())
        .collect();

    if models.is_empty() {
        return Ok(());
    }
    product_image::Entity::insert_many(models).exec(conn).await?;
    Ok(())
}

async fn load_images<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<Vec<ProductImage>, DbErr> {
    let models = product_image::Entity::find()
        .filter(product_image::Column::ProductId.eq(product_id))
        .order_by_asc(product_image::Column::Position)
        .all(conn)
        .await?;
    Ok(models.into_iter().map(Into::into).collect())
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn create_category(&self, input: CreateCategory) -> CatalogResult<Category> {
        let active_model: category::ActiveModel = Category::new(input).into();
        let model = self.categories.insert(active_model).await?;

        tracing::info!(category_id = %model.id, "Created category");
        Ok(model.into())
    }

    async fn get_category(&self, id: Uuid) -> CatalogResult<Option<Category>> {
        let model = self.categories.find_by_id(id).await?;
        Ok(model.map(Into::into))
    }

    async fn list_categories(&self, filter: CategoryFilter) -> CatalogResult<Vec<Category>> {
        let mut query = category::Entity::find();
        if let Some(is_active) = filter.is_active {
            query = query.filter(category::Column::IsActive.eq(is_active));
        }

        let models = query
            .order_by_asc(category::Column::Name)
            .all(self.db())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update_category(&self, id: Uuid, input: UpdateCategory) -> CatalogResult<Category> {
        let model = self
            .categories
            .find_by_id(id)
            .await?
            .ok_or(CatalogError::CategoryNotFound(id))?;

        let mut category: Category = model.into();
        category.apply_update(input);

        let updated = self.categories.update(category.into()).await?;

        tracing::info!(category_id = %id, "Updated category");
        Ok(updated.into())
    }

    async fn delete_category(&self, id: Uuid) -> CatalogResult<bool> {
        let in_use = product::Entity::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(self.db())
            .await?;
        if in_use > 0 {
            return Err(CatalogError::Conflict(
                "Category still has products assigned".to_string(),
            ));
        }

        // A product inserted since the check trips the RESTRICT foreign key instead
        let rows_affected = self.categories.delete_by_id(id).await?;
        if rows_affected > 0 {
            tracing::info!(category_id = %id, "Deleted category");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn categories_by_ids(&self, ids: Vec<Uuid>) -> CatalogResult<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = category::Entity::find()
            .filter(category::Column::Id.is_in(ids))
            .all(self.db())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn count_active_products(
        &self,
        category_ids: Vec<Uuid>,
    ) -> CatalogResult<HashMap<Uuid, u64>> {
        if category_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = product::Entity::find()
            .select_only()
            .column(product::Column::CategoryId)
            .column_as(product::Column::Id.count(), "products_count")
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::CategoryId.is_in(category_ids))
            .group_by(product::Column::CategoryId)
            .into_tuple::<(Uuid, i64)>()
            .all(self.db())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, count)| (id, count.max(0) as u64))
            .collect())
    }

    async fn create_product(
        &self,
        input: CreateProduct,
        images: Vec<NewProductImage>,
    ) -> CatalogResult<ProductWithImages> {
        let txn = self.db().begin().await?;

        let active_model: product::ActiveModel = Product::new(input).into();
        let model = active_model.insert(&txn).await?;
        insert_images(&txn, model.id, images).await?;
        let images = load_images(&txn, model.id).await?;

        txn.commit().await?;

        tracing::info!(product_id = %model.id, images = images.len(), "Created product");
        Ok(ProductWithImages {
            product: model.into(),
            images,
        })
    }

    async fn get_product(&self, id: Uuid) -> CatalogResult<Option<Product>> {
        let model = self.products.find_by_id(id).await?;
        Ok(model.map(Into::into))
    }

    async fn list_products(&self, filter: ProductFilter) -> CatalogResult<Vec<Product>> {
        let mut query = product::Entity::find();

        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        if let Some(is_active) = filter.is_active {
            query = query.filter(product::Column::IsActive.eq(is_active));
        }
        if let Some(is_featured) = filter.is_featured {
            query = query.filter(product::Column::IsFeatured.eq(is_featured));
        }
        if let Some(stock_status) = filter.stock_status {
            query = query.filter(product::Column::StockStatus.eq(stock_status));
        }
        if let Some(term) = filter.search_term() {
            let pattern = like_pattern(term);
            query = query.filter(Expr::cust_with_values(
                "(\"products\".\"name\" ILIKE ? OR \"products\".\"description\" ILIKE ?)",
                [pattern.clone(), pattern],
            ));
        }

        let models = query
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id)
            .limit(filter.limit)
            .offset(filter.offset)
            .all(self.db())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProduct,
        images: Option<Vec<NewProductImage>>,
    ) -> CatalogResult<ProductWithImages> {
        let txn = self.db().begin().await?;

        // SELECT ... FOR UPDATE
        let model = product::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(CatalogError::ProductNotFound(id))?;

        let mut product: Product = model.into();
        product.apply_update(input);

        let active_model: product::ActiveModel = product.into();
        let updated = active_model.update(&txn).await?;

        if let Some(images) = images.filter(|i| !i.is_empty()) {
            let removed = product_image::Entity::delete_many()
                .filter(product_image::Column::ProductId.eq(id))
                .exec(&txn)
                .await?
                .rows_affected;
            tracing::info!(product_id = %id, removed, added = images.len(), "Replacing product images");
            insert_images(&txn, id, images).await?;
        }
        let images = load_images(&txn, id).await?;

        txn.commit().await?;

        tracing::info!(product_id = %id, "Updated product");
        Ok(ProductWithImages {
            product: updated.into(),
            images,
        })
    }

    async fn delete_product(&self, id: Uuid) -> CatalogResult<bool> {
        // Images and reviews go with it (ON DELETE CASCADE)
        let rows_affected = self.products.delete_by_id(id).await?;

        if rows_affected > 0 {
            tracing::info!(product_id = %id, "Deleted product");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list_images(&self, product_id: Uuid) -> CatalogResult<Vec<ProductImage>> {
        Ok(load_images(self.db(), product_id).await?)
    }

    async fn primary_images(
        &self,
        product_ids: Vec<Uuid>,
    ) -> CatalogResult<HashMap<Uuid, ProductImage>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let models = product_image::Entity::find()
            .filter(product_image::Column::ProductId.is_in(product_ids))
            .filter(product_image::Column::IsPrimary.eq(true))
            .order_by_asc(product_image::Column::Position)
            .all(self.db())
            .await?;

        let mut primaries = HashMap::new();
        for model in models {
            primaries
                .entry(model.product_id)
                .or_insert_with(|| ProductImage::from(model));
        }
        Ok(primaries)
    }

    async fn review_stats(
        &self,
        product_ids: Vec<Uuid>,
    ) -> CatalogResult<HashMap<Uuid, ReviewStats>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = review::Entity::find()
            .select_only()
            .column(review::Column::ProductId)
            .column_as(review::Column::Id.count(), "reviews_count")
            .column_as(review::Column::Rating.sum(), "rating_total")
            .filter(review::Column::ProductId.is_in(product_ids))
            .group_by(review::Column::ProductId)
            .into_tuple::<(Uuid, i64, i64)>()
            .all(self.db())
            .await?;

        Ok(rows
            .into_iter()
            .filter(|(_, count, _)| *count > 0)
            .map(|(id, count, total)| {
                let stats = ReviewStats {
                    count: count as u64,
                    average_rating: Some(total as f64 / count as f64),
                };
                (id, stats)
            })
            .collect())
    }

    async fn list_reviews(&self, product_id: Uuid) -> CatalogResult<Vec<Review>> {
        let models = review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .order_by_desc(review::Column::Id)
            .all(self.db())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn create_review(&self, input: NewReview) -> CatalogResult<Review> {
        if self.products.find_by_id(input.product_id).await?.is_none() {
            return Err(CatalogError::ProductNotFound(input.product_id));
        }

        let active_model: review::ActiveModel = Review::new(input).into();
        let model = active_model.insert(self.db()).await?;

        tracing::info!(review_id = %model.id, product_id = %model.product_id, "Created review");
        Ok(model.into())
    }
}
