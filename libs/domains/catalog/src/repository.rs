use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    Category, CategoryFilter, CreateCategory, CreateProduct, NewProductImage, NewReview, Product,
    ProductFilter, ProductImage, ProductWithImages, Review, ReviewStats, UpdateCategory,
    UpdateProduct,
};

/// Repository trait for catalog persistence
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn create_category(&self, input: CreateCategory) -> CatalogResult<Category>;

    async fn get_category(&self, id: Uuid) -> CatalogResult<Option<Category>>;

    /// Categories ordered by name
    async fn list_categories(&self, filter: CategoryFilter) -> CatalogResult<Vec<Category>>;

    async fn update_category(&self, id: Uuid, input: UpdateCategory) -> CatalogResult<Category>;

    /// Fails with `Conflict` while products still reference the category
    async fn delete_category(&self, id: Uuid) -> CatalogResult<bool>;

    async fn categories_by_ids(&self, ids: Vec<Uuid>) -> CatalogResult<Vec<Category>>;

    /// Active product count per category; categories without any are absent
    async fn count_active_products(
        &self,
        category_ids: Vec<Uuid>,
    ) -> CatalogResult<HashMap<Uuid, u64>>;

    /// Insert a product and its image set atomically
    async fn create_product(
        &self,
        input: CreateProduct,
        images: Vec<NewProductImage>,
    ) -> CatalogResult<ProductWithImages>;

    async fn get_product(&self, id: Uuid) -> CatalogResult<Option<Product>>;

    /// Products matching `filter`, newest first
    async fn list_products(&self, filter: ProductFilter) -> CatalogResult<Vec<Product>>;

    /// Apply `input` and, when `images` is a non-empty list, replace the whole
    /// image set, all in one atomic step.
    async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProduct,
        images: Option<Vec<NewProductImage>>,
    ) -> CatalogResult<ProductWithImages>;

    /// Removes the product with its images and reviews
    async fn delete_product(&self, id: Uuid) -> CatalogResult<bool>;

    /// Images of a product in upload order
    async fn list_images(&self, product_id: Uuid) -> CatalogResult<Vec<ProductImage>>;

    /// First primary image per product; products without one are absent
    async fn primary_images(
        &self,
        product_ids: Vec<Uuid>,
    ) -> CatalogResult<HashMap<Uuid, ProductImage>>;

    /// Review statistics per product; products without reviews are absent
    async fn review_stats(&self, product_ids: Vec<Uuid>)
    -> CatalogResult<HashMap<Uuid, ReviewStats>>;

    /// Reviews of a product, newest first
    async fn list_reviews(&self, product_id: Uuid) -> CatalogResult<Vec<Review>>;

    async fn create_review(&self, input: NewReview) -> CatalogResult<Review>;
}

#[derive(Debug, Default)]
struct Store {
    categories: HashMap<Uuid, Category>,
    products: HashMap<Uuid, Product>,
    images: Vec<ProductImage>,
    reviews: Vec<Review>,
}

fn unknown_category() -> CatalogError {
    CatalogError::invalid_field(
        "category_id",
        "does_not_exist",
        "The selected category does not exist.",
    )
}

fn duplicate(column: &str) -> CatalogError {
    CatalogError::Conflict(format!("A record with this {} already exists", column))
}

impl Store {
    fn ensure_category_slug_free(&self, slug: &str, except: Option<Uuid>) -> CatalogResult<()> {
        let taken = self
            .categories
            .values()
            .any(|c| Some(c.id) != except && c.slug == slug);
        if taken {
            return Err(duplicate("slug"));
        }
        Ok(())
    }

    fn ensure_product_unique(&self, product: &Product) -> CatalogResult<()> {
        for other in self.products.values().filter(|p| p.id != product.id) {
            if other.slug == product.slug {
                return Err(duplicate("slug"));
            }
            if other.sku == product.sku {
                return Err(duplicate("sku"));
            }
        }
        Ok(())
    }

    fn images_of(&self, product_id: Uuid) -> Vec<ProductImage> {
        let mut images: Vec<ProductImage> = self
            .images
            .iter()
            .filter(|i| i.product_id == product_id)
            .cloned()
            .collect();
        images.sort_by_key(|i| i.position);
        images
    }

    fn replace_images(&mut self, product_id: Uuid, images: Vec<NewProductImage>) {
        self.images.retain(|i| i.product_id != product_id);
        self.images.extend(
            images
                .into_iter()
                .enumerate()
                .map(|(position, image)| ProductImage::new(product_id, position as i32, image)),
        );
    }
}

/// In-memory implementation of CatalogRepository (for development/testing)
///
/// Every write holds the store's write lock for its whole duration, so a
/// product update and its image replace are never observed half done.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalogRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn create_category(&self, input: CreateCategory) -> CatalogResult<Category> {
        let mut store = self.store.write().await;
        store.ensure_category_slug_free(&input.slug, None)?;

        let category = Category::new(input);
        store.categories.insert(category.id, category.clone());

        tracing::info!(category_id = %category.id, "Created category");
        Ok(category)
    }

    async fn get_category(&self, id: Uuid) -> CatalogResult<Option<Category>> {
        let store = self.store.read().await;
        Ok(store.categories.get(&id).cloned())
    }

    async fn list_categories(&self, filter: CategoryFilter) -> CatalogResult<Vec<Category>> {
        let store = self.store.read().await;
        let mut result: Vec<Category> = store
            .categories
            .values()
            .filter(|c| filter.is_active.is_none_or(|active| c.is_active == active))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn update_category(&self, id: Uuid, input: UpdateCategory) -> CatalogResult<Category> {
        let mut store = self.store.write().await;
        if let Some(slug) = &input.slug {
            store.ensure_category_slug_free(slug, Some(id))?;
        }

        let category = store
            .categories
            .get_mut(&id)
            .ok_or(CatalogError::CategoryNotFound(id))?;
        category.apply_update(input);
        let updated = category.clone();

        tracing::info!(category_id = %id, "Updated category");
        Ok(updated)
    }

    async fn delete_category(&self, id: Uuid) -> CatalogResult<bool> {
        let mut store = self.store.write().await;
        if store.products.values().any(|p| p.category_id == id) {
            return Err(CatalogError::Conflict(
                "Category still has products assigned".to_string(),
            ));
        }

        if store.categories.remove(&id).is_some() {
            tracing::info!(category_id = %id, "Deleted category");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn categories_by_ids(&self, ids: Vec<Uuid>) -> CatalogResult<Vec<Category>> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.categories.get(id).cloned())
            .collect())
    }

    async fn count_active_products(
        &self,
        category_ids: Vec<Uuid>,
    ) -> CatalogResult<HashMap<Uuid, u64>> {
        let store = self.store.read().await;
        let mut counts = HashMap::new();
        for product in store
            .products
            .values()
            .filter(|p| p.is_active && category_ids.contains(&p.category_id))
        {
            *counts.entry(product.category_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn create_product(
        &self,
        input: CreateProduct,
        images: Vec<NewProductImage>,
    ) -> CatalogResult<ProductWithImages> {
        let mut store = self.store.write().await;
        if !store.categories.contains_key(&input.category_id) {
            return Err(unknown_category());
        }

        let product = Product::new(input);
        store.ensure_product_unique(&product)?;
        store.products.insert(product.id, product.clone());
        store.replace_images(product.id, images);

        tracing::info!(product_id = %product.id, "Created product");
        Ok(ProductWithImages {
            images: store.images_of(product.id),
            product,
        })
    }

    async fn get_product(&self, id: Uuid) -> CatalogResult<Option<Product>> {
        let store = self.store.read().await;
        Ok(store.products.get(&id).cloned())
    }

    async fn list_products(&self, filter: ProductFilter) -> CatalogResult<Vec<Product>> {
        let store = self.store.read().await;

        let mut result: Vec<Product> = store
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();

        // Sort by created_at descending (newest first)
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(result
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProduct,
        images: Option<Vec<NewProductImage>>,
    ) -> CatalogResult<ProductWithImages> {
        let mut store = self.store.write().await;

        let mut product = store
            .products
            .get(&id)
            .cloned()
            .ok_or(CatalogError::ProductNotFound(id))?;
        product.apply_update(input);

        if !store.categories.contains_key(&product.category_id) {
            return Err(unknown_category());
        }
        store.ensure_product_unique(&product)?;
        store.products.insert(id, product.clone());

        if let Some(images) = images.filter(|i| !i.is_empty()) {
            tracing::info!(product_id = %id, count = images.len(), "Replacing product images");
            store.replace_images(id, images);
        }

        tracing::info!(product_id = %id, "Updated product");
        Ok(ProductWithImages {
            images: store.images_of(id),
            product,
        })
    }

    async fn delete_product(&self, id: Uuid) -> CatalogResult<bool> {
        let mut store = self.store.write().await;

        if store.products.remove(&id).is_none() {
            return Ok(false);
        }
        store.images.retain(|i| i.product_id != id);
        store.reviews.retain(|r| r.product_id != id);

        tracing::info!(product_id = %id, "Deleted product");
        Ok(true)
    }

    async fn list_images(&self, product_id: Uuid) -> CatalogResult<Vec<ProductImage>> {
        let store = self.store.read().await;
        Ok(store.images_of(product_id))
    }

    async fn primary_images(
        &self,
        product_ids: Vec<Uuid>,
    ) -> CatalogResult<HashMap<Uuid, ProductImage>> {
        let store = self.store.read().await;
        let mut primaries: HashMap<Uuid, ProductImage> = HashMap::new();

        for image in store
            .images
            .iter()
            .filter(|i| i.is_primary && product_ids.contains(&i.product_id))
        {
            primaries
                .entry(image.product_id)
                .and_modify(|current| {
                    if image.position < current.position {
                        *current = image.clone();
                    }
                })
                .or_insert_with(|| image.clone());
        }
        Ok(primaries)
    }

    async fn review_stats(
        &self,
        product_ids: Vec<Uuid>,
    ) -> CatalogResult<HashMap<Uuid, ReviewStats>> {
        let store = self.store.read().await;
        let mut ratings: HashMap<Uuid, Vec<i16>> = HashMap::new();
        for review in store
            .reviews
            .iter()
            .filter(|r| product_ids.contains(&r.product_id))
        {
            ratings.entry(review.product_id).or_default().push(review.rating);
        }

        Ok(ratings
            .into_iter()
            .map(|(id, r)| (id, ReviewStats::from_ratings(r)))
            .collect())
    }

    async fn list_reviews(&self, product_id: Uuid) -> CatalogResult<Vec<Review>> {
        let store = self.store.read().await;
        let mut reviews: Vec<Review> = store
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(reviews)
    }

    async fn create_review(&self, input: NewReview) -> CatalogResult<Review> {
        let mut store = self.store.write().await;
        if !store.products.contains_key(&input.product_id) {
            return Err(CatalogError::ProductNotFound(input.product_id));
        }

        let review = Review::new(input);
        store.reviews.push(review.clone());

        tracing::info!(review_id = %review.id, product_id = %review.product_id, "Created review");
        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockStatus;
    use rust_decimal::dec;

    fn create_category(slug: &str) -> CreateCategory {
        CreateCategory {
            name: slug.to_uppercase(),
            slug: slug.to_string(),
            description: String::new(),
            image: None,
            is_active: true,
        }
    }

    fn create_product(category_id: Uuid, slug: &str, is_active: bool) -> CreateProduct {
        CreateProduct {
            name: format!("Product {}", slug),
            slug: slug.to_string(),
            description: String::new(),
            price: dec!(10.00),
            category_id,
            stock_quantity: 1,
            stock_status: StockStatus::InStock,
            sku: format!("SKU-{}", slug),
            weight: None,
            dimensions: None,
            is_active,
            is_featured: false,
        }
    }

    fn images(names: &[&str]) -> Vec<NewProductImage> {
        NewProductImage::from_stored_paths(names.iter().map(|n| format!("products/{}", n)).collect())
    }

    #[tokio::test]
    async fn test_active_product_count() {
        let repo = InMemoryCatalogRepository::new();
        let category = repo.create_category(create_category("shoes")).await.unwrap();

        for (slug, active) in [("a", true), ("b", true), ("c", false)] {
            repo.create_product(create_product(category.id, slug, active), vec![])
                .await
                .unwrap();
        }

        let counts = repo.count_active_products(vec![category.id]).await.unwrap();
        assert_eq!(counts.get(&category.id), Some(&2));
    }

    #[tokio::test]
    async fn test_create_marks_first_image_primary() {
        let repo = InMemoryCatalogRepository::new();
        let category = repo.create_category(create_category("shoes")).await.unwrap();

        let saved = repo
            .create_product(create_product(category.id, "a", true), images(&["a.png", "b.png", "c.png"]))
            .await
            .unwrap();

        assert_eq!(saved.images.len(), 3);
        let primaries: Vec<_> = saved.images.iter().filter(|i| i.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].image, "products/a.png");
    }

    #[tokio::test]
    async fn test_update_without_images_keeps_set() {
        let repo = InMemoryCatalogRepository::new();
        let category = repo.create_category(create_category("shoes")).await.unwrap();
        let saved = repo
            .create_product(create_product(category.id, "a", true), images(&["a.png", "b.png"]))
            .await
            .unwrap();

        let update = UpdateProduct {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        let updated = repo
            .update_product(saved.product.id, update.clone(), None)
            .await
            .unwrap();
        assert_eq!(updated.images, saved.images);

        let updated = repo
            .update_product(saved.product.id, update, Some(vec![]))
            .await
            .unwrap();
        assert_eq!(updated.images, saved.images);
        assert_eq!(updated.product.name, "Renamed");
    }

    #[tokio::test]
    async fn test_update_with_images_replaces_set() {
        let repo = InMemoryCatalogRepository::new();
        let category = repo.create_category(create_category("shoes")).await.unwrap();
        let saved = repo
            .create_product(create_product(category.id, "a", true), images(&["a.png", "b.png"]))
            .await
            .unwrap();

        let updated = repo
            .update_product(saved.product.id, UpdateProduct::default(), Some(images(&["d.png"])))
            .await
            .unwrap();

        assert_eq!(updated.images.len(), 1);
        assert_eq!(updated.images[0].image, "products/d.png");
        assert!(updated.images[0].is_primary);
        assert_eq!(repo.list_images(saved.product.id).await.unwrap(), updated.images);
    }

    #[tokio::test]
    async fn test_duplicate_sku_conflict() {
        let repo = InMemoryCatalogRepository::new();
        let category = repo.create_category(create_category("shoes")).await.unwrap();
        repo.create_product(create_product(category.id, "a", true), vec![])
            .await
            .unwrap();

        let mut input = create_product(category.id, "b", true);
        input.sku = "SKU-a".to_string();
        let result = repo.create_product(input, vec![]).await;

        assert!(matches!(result, Err(CatalogError::Conflict(msg)) if msg.contains("sku")));
    }

    #[tokio::test]
    async fn test_unknown_category_rejected() {
        let repo = InMemoryCatalogRepository::new();
        let result = repo
            .create_product(create_product(Uuid::now_v7(), "a", true), vec![])
            .await;

        let Err(CatalogError::Invalid(errors)) = result else {
            panic!("expected validation error");
        };
        assert!(errors.field_errors().contains_key("category_id"));
    }

    #[tokio::test]
    async fn test_delete_category_in_use_conflicts() {
        let repo = InMemoryCatalogRepository::new();
        let category = repo.create_category(create_category("shoes")).await.unwrap();
        let saved = repo
            .create_product(create_product(category.id, "a", true), vec![])
            .await
            .unwrap();

        assert!(matches!(
            repo.delete_category(category.id).await,
            Err(CatalogError::Conflict(_))
        ));

        assert!(repo.delete_product(saved.product.id).await.unwrap());
        assert!(repo.delete_category(category.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_product_cascades() {
        let repo = InMemoryCatalogRepository::new();
        let category = repo.create_category(create_category("shoes")).await.unwrap();
        let saved = repo
            .create_product(create_product(category.id, "a", true), images(&["a.png"]))
            .await
            .unwrap();
        repo.create_review(NewReview {
            product_id: saved.product.id,
            user_id: Uuid::now_v7(),
            user_name: "ann".to_string(),
            rating: 5,
            title: "Great".to_string(),
            comment: String::new(),
        })
        .await
        .unwrap();

        assert!(repo.delete_product(saved.product.id).await.unwrap());
        assert!(repo.list_images(saved.product.id).await.unwrap().is_empty());
        assert!(repo.list_reviews(saved.product.id).await.unwrap().is_empty());
        assert!(!repo.delete_product(saved.product.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_review_stats_absent_without_reviews() {
        let repo = InMemoryCatalogRepository::new();
        let category = repo.create_category(create_category("shoes")).await.unwrap();
        let saved = repo
            .create_product(create_product(category.id, "a", true), vec![])
            .await
            .unwrap();

        let stats = repo.review_stats(vec![saved.product.id]).await.unwrap();
        assert!(stats.get(&saved.product.id).is_none());
    }

    #[tokio::test]
    async fn test_list_products_filters_and_paginates() {
        let repo = InMemoryCatalogRepository::new();
        let shoes = repo.create_category(create_category("shoes")).await.unwrap();
        let hats = repo.create_category(create_category("hats")).await.unwrap();

        for slug in ["a", "b", "c"] {
            repo.create_product(create_product(shoes.id, slug, true), vec![])
                .await
                .unwrap();
        }
        repo.create_product(create_product(hats.id, "d", true), vec![])
            .await
            .unwrap();

        let filter = ProductFilter {
            category_id: Some(shoes.id),
            limit: 2,
            ..Default::default()
        };
        let page = repo.list_products(filter).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|p| p.category_id == shoes.id));
        // Newest first
        assert_eq!(page[0].slug, "c");
    }
}
