//! Catalog Service - Business logic layer

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::context::RequestContext;
use crate::error::{CatalogError, CatalogResult};
use crate::media::{MediaStorage, PRODUCT_IMAGE_DIR};
use crate::models::{
    CategoryFilter, CreateCategory, CreateProduct, CreateReview, MAX_USER_NAME_LENGTH,
    NewProductImage, NewReview, ProductFilter, UpdateCategory, UpdateProduct,
};
use crate::projection::{
    CategoryResponse, ProductDetail, ProductListItem, ProductWriteResponse, Projector,
    ReviewResponse,
};
use crate::repository::CatalogRepository;
use crate::upload::{UPLOADED_IMAGES_FIELD, UploadedImage, validate_uploads};

/// Validate a DTO together with the files sent alongside it, so the client
/// gets every field error in one response.
fn validate_with_uploads<T: Validate>(
    input: &T,
    uploads: &[UploadedImage],
) -> Result<(), ValidationErrors> {
    let mut errors = input.validate().err().unwrap_or_default();

    if let Err(upload_errors) = validate_uploads(uploads) {
        if let Some(file_errors) = upload_errors.field_errors().get(UPLOADED_IMAGES_FIELD) {
            for error in file_errors.iter() {
                errors.add(UPLOADED_IMAGES_FIELD, error.clone());
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn unknown_category() -> CatalogError {
    CatalogError::invalid_field(
        "category_id",
        "does_not_exist",
        "The selected category does not exist.",
    )
}

/// Catalog service providing business logic operations
///
/// Loads the related data each projection needs and keeps stored media in
/// step with product writes.
pub struct CatalogService<R: CatalogRepository> {
    repository: Arc<R>,
    media: Arc<dyn MediaStorage>,
}

impl<R: CatalogRepository> Clone for CatalogService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            media: Arc::clone(&self.media),
        }
    }
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repository: R, media: Arc<dyn MediaStorage>) -> Self {
        Self {
            repository: Arc::new(repository),
            media,
        }
    }

    pub fn media(&self) -> &dyn MediaStorage {
        self.media.as_ref()
    }

    fn projector<'a>(&'a self, ctx: Option<&'a RequestContext>) -> Projector<'a> {
        Projector::new(ctx, self.media.as_ref())
    }

    async fn ensure_category(&self, id: Uuid) -> CatalogResult<()> {
        match self.repository.get_category(id).await? {
            Some(_) => Ok(()),
            None => Err(unknown_category()),
        }
    }

    async fn ensure_product(&self, id: Uuid) -> CatalogResult<()> {
        match self.repository.get_product(id).await? {
            Some(_) => Ok(()),
            None => Err(CatalogError::ProductNotFound(id)),
        }
    }

    /// Store uploads in order. On failure the files stored so far are removed.
    async fn store_uploads(&self, uploads: &[UploadedImage]) -> CatalogResult<Vec<String>> {
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.media.save(PRODUCT_IMAGE_DIR, upload).await {
                Ok(path) => stored.push(path),
                Err(e) => {
                    self.discard_files(&stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    /// Best-effort removal of files whose database write failed
    async fn discard_files(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.media.delete(path).await {
                tracing::warn!(path = %path, error = %e, "Failed to remove orphaned media file");
            }
        }
    }

    // ----- categories -----

    #[instrument(skip(self, ctx))]
    pub async fn list_categories(
        &self,
        filter: CategoryFilter,
        ctx: Option<&RequestContext>,
    ) -> CatalogResult<Vec<CategoryResponse>> {
        let categories = self.repository.list_categories(filter).await?;
        let counts = self
            .repository
            .count_active_products(categories.iter().map(|c| c.id).collect())
            .await?;

        let projector = self.projector(ctx);
        Ok(categories
            .iter()
            .map(|c| projector.category(c, counts.get(&c.id).copied().unwrap_or(0)))
            .collect())
    }

    #[instrument(skip(self, ctx), fields(category_id = %id))]
    pub async fn get_category(
        &self,
        id: Uuid,
        ctx: Option<&RequestContext>,
    ) -> CatalogResult<CategoryResponse> {
        let category = self
            .repository
            .get_category(id)
            .await?
            .ok_or(CatalogError::CategoryNotFound(id))?;
        let counts = self.repository.count_active_products(vec![id]).await?;

        Ok(self
            .projector(ctx)
            .category(&category, counts.get(&id).copied().unwrap_or(0)))
    }

    #[instrument(skip(self, input, ctx), fields(slug = %input.slug))]
    pub async fn create_category(
        &self,
        input: CreateCategory,
        ctx: Option<&RequestContext>,
    ) -> CatalogResult<CategoryResponse> {
        input.validate()?;

        let category = self.repository.create_category(input).await?;
        Ok(self.projector(ctx).category(&category, 0))
    }

    #[instrument(skip(self, input, ctx), fields(category_id = %id))]
    pub async fn update_category(
        &self,
        id: Uuid,
        input: UpdateCategory,
        ctx: Option<&RequestContext>,
    ) -> CatalogResult<CategoryResponse> {
        input.validate()?;

        let category = self.repository.update_category(id, input).await?;
        let counts = self.repository.count_active_products(vec![id]).await?;
        Ok(self
            .projector(ctx)
            .category(&category, counts.get(&id).copied().unwrap_or(0)))
    }

    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete_category(&self, id: Uuid) -> CatalogResult<()> {
        if !self.repository.delete_category(id).await? {
            return Err(CatalogError::CategoryNotFound(id));
        }
        Ok(())
    }

    // ----- products -----

    #[instrument(skip(self, ctx))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        ctx: Option<&RequestContext>,
    ) -> CatalogResult<Vec<ProductListItem>> {
        let products = self.repository.list_products(filter).await?;
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let product_ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let category_ids: Vec<Uuid> = products
            .iter()
            .map(|p| p.category_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let category_names: HashMap<Uuid, String> = self
            .repository
            .categories_by_ids(category_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let stats = self.repository.review_stats(product_ids.clone()).await?;
        let primaries = self.repository.primary_images(product_ids).await?;

        let projector = self.projector(ctx);
        Ok(products
            .iter()
            .map(|p| {
                projector.product_list_item(
                    p,
                    category_names
                        .get(&p.category_id)
                        .map(String::as_str)
                        .unwrap_or_default(),
                    stats.get(&p.id).copied().unwrap_or_default(),
                    primaries.get(&p.id),
                )
            })
            .collect())
    }

    #[instrument(skip(self, ctx), fields(product_id = %id))]
    pub async fn get_product(
        &self,
        id: Uuid,
        ctx: Option<&RequestContext>,
    ) -> CatalogResult<ProductDetail> {
        let product = self
            .repository
            .get_product(id)
            .await?
            .ok_or(CatalogError::ProductNotFound(id))?;

        let category = self
            .repository
            .get_category(product.category_id)
            .await?
            .ok_or_else(|| {
                CatalogError::Internal(format!("Product {} references a missing category", id))
            })?;
        let counts = self
            .repository
            .count_active_products(vec![category.id])
            .await?;
        let images = self.repository.list_images(id).await?;
        let reviews = self.repository.list_reviews(id).await?;
        let stats = self
            .repository
            .review_stats(vec![id])
            .await?
            .remove(&id)
            .unwrap_or_default();

        let projector = self.projector(ctx);
        let category =
            projector.category(&category, counts.get(&category.id).copied().unwrap_or(0));
        Ok(projector.product_detail(&product, category, &images, &reviews, stats))
    }

    /// Create a product and one image per upload; the first upload becomes primary.
    #[instrument(skip(self, input, uploads, ctx), fields(sku = %input.sku, uploads = uploads.len()))]
    pub async fn create_product(
        &self,
        input: CreateProduct,
        uploads: Vec<UploadedImage>,
        ctx: Option<&RequestContext>,
    ) -> CatalogResult<ProductWriteResponse> {
        validate_with_uploads(&input, &uploads)?;
        self.ensure_category(input.category_id).await?;

        let stored = self.store_uploads(&uploads).await?;
        let images = NewProductImage::from_stored_paths(stored.clone());

        let saved = match self.repository.create_product(input, images).await {
            Ok(saved) => saved,
            Err(e) => {
                self.discard_files(&stored).await;
                return Err(e);
            }
        };

        Ok(self.projector(ctx).product_write(&saved))
    }

    /// Partial update. A non-empty `uploads` list replaces the whole image set;
    /// an empty one leaves the current images untouched.
    #[instrument(skip(self, input, uploads, ctx), fields(product_id = %id, uploads = uploads.len()))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProduct,
        uploads: Vec<UploadedImage>,
        ctx: Option<&RequestContext>,
    ) -> CatalogResult<ProductWriteResponse> {
        validate_with_uploads(&input, &uploads)?;
        self.ensure_product(id).await?;
        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
        }

        let stored = self.store_uploads(&uploads).await?;
        let images = (!stored.is_empty()).then(|| NewProductImage::from_stored_paths(stored.clone()));

        let saved = match self.repository.update_product(id, input, images).await {
            Ok(saved) => saved,
            Err(e) => {
                self.discard_files(&stored).await;
                return Err(e);
            }
        };

        Ok(self.projector(ctx).product_write(&saved))
    }

    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: Uuid) -> CatalogResult<()> {
        if !self.repository.delete_product(id).await? {
            return Err(CatalogError::ProductNotFound(id));
        }
        Ok(())
    }

    // ----- reviews -----

    #[instrument(skip(self, ctx), fields(product_id = %product_id))]
    pub async fn list_reviews(
        &self,
        product_id: Uuid,
        ctx: Option<&RequestContext>,
    ) -> CatalogResult<Vec<ReviewResponse>> {
        self.ensure_product(product_id).await?;

        let reviews = self.repository.list_reviews(product_id).await?;
        let projector = self.projector(ctx);
        Ok(reviews.iter().map(|r| projector.review(r)).collect())
    }

    /// Create a review authored by the request's user; any author given in the
    /// payload is ignored.
    #[instrument(skip(self, input, ctx), fields(product_id = %product_id))]
    pub async fn create_review(
        &self,
        product_id: Uuid,
        input: CreateReview,
        ctx: &RequestContext,
    ) -> CatalogResult<ReviewResponse> {
        let user = ctx.user().ok_or(CatalogError::Unauthorized)?;
        input.validate()?;
        self.ensure_product(product_id).await?;

        let review = self
            .repository
            .create_review(NewReview {
                product_id,
                user_id: user.id,
                user_name: user.name.chars().take(MAX_USER_NAME_LENGTH).collect(),
                rating: input.rating,
                title: input.title,
                comment: input.comment,
            })
            .await?;

        Ok(self.projector(Some(ctx)).review(&review))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaStorage;
    use crate::models::{Category, Product, ProductImage, ProductWithImages, Review, StockStatus};
    use crate::repository::MockCatalogRepository;
    use axum_helpers::AuthUser;
    use mockall::predicate::eq;
    use rust_decimal::dec;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn png(name: &str) -> UploadedImage {
        UploadedImage::new(name, Some("image/png".to_string()), PNG.to_vec())
    }

    fn category() -> Category {
        Category::new(CreateCategory {
            name: "Shoes".to_string(),
            slug: "shoes".to_string(),
            description: String::new(),
            image: None,
            is_active: true,
        })
    }

    fn create_input(category_id: Uuid) -> CreateProduct {
        CreateProduct {
            name: "Runner".to_string(),
            slug: "runner".to_string(),
            description: String::new(),
            price: dec!(59.90),
            category_id,
            stock_quantity: 3,
            stock_status: StockStatus::InStock,
            sku: "RUN-1".to_string(),
            weight: None,
            dimensions: None,
            is_active: true,
            is_featured: false,
        }
    }

    fn saved(product: Product, images: Vec<NewProductImage>) -> ProductWithImages {
        let images = images
            .into_iter()
            .enumerate()
            .map(|(i, image)| ProductImage::new(product.id, i as i32, image))
            .collect();
        ProductWithImages { product, images }
    }

    /// Media mock that hands out `products/<n>-<name>` paths
    fn counting_media() -> MockMediaStorage {
        let mut media = MockMediaStorage::new();
        let counter = std::sync::atomic::AtomicUsize::new(0);
        media.expect_save().returning(move |dir, file| {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(format!("{}/{}-{}", dir, n, file.file_name))
        });
        media
            .expect_url()
            .returning(|path| format!("/media/{}", path));
        media
    }

    #[tokio::test]
    async fn test_create_product_first_upload_is_primary() {
        let cat = category();
        let category_id = cat.id;
        let mut repo = MockCatalogRepository::new();
        repo.expect_get_category()
            .with(eq(category_id))
            .returning(move |_| Ok(Some(cat.clone())));
        repo.expect_create_product()
            .withf(|_, images| {
                images.len() == 3
                    && images[0].is_primary
                    && images[0].image == "products/0-a.png"
                    && images.iter().filter(|i| i.is_primary).count() == 1
            })
            .returning(|input, images| Ok(saved(Product::new(input), images)));

        let service = CatalogService::new(repo, Arc::new(counting_media()));
        let response = service
            .create_product(
                create_input(category_id),
                vec![png("a.png"), png("b.png"), png("c.png")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(response.category, category_id);
        assert_eq!(response.images.len(), 3);
        assert!(response.images[0].is_primary);
        assert_eq!(response.images[0].image, "/media/products/0-a.png");
    }

    #[tokio::test]
    async fn test_create_product_rejects_empty_upload_before_any_write() {
        // No expectations: any repository or storage call fails the test
        let repo = MockCatalogRepository::new();
        let media = MockMediaStorage::new();

        let service = CatalogService::new(repo, Arc::new(media));
        let empty = UploadedImage::new("a.png", Some("image/png".to_string()), Vec::new());
        let result = service
            .create_product(create_input(Uuid::now_v7()), vec![empty], None)
            .await;

        let Err(CatalogError::Invalid(errors)) = result else {
            panic!("expected validation error");
        };
        assert!(errors.field_errors().contains_key(UPLOADED_IMAGES_FIELD));
    }

    #[tokio::test]
    async fn test_create_product_merges_field_and_upload_errors() {
        let service = CatalogService::new(MockCatalogRepository::new(), Arc::new(MockMediaStorage::new()));
        let mut input = create_input(Uuid::now_v7());
        input.price = dec!(-5);

        let empty = UploadedImage::new("a.png", None, Vec::new());
        let Err(CatalogError::Invalid(errors)) = service.create_product(input, vec![empty], None).await
        else {
            panic!("expected validation error");
        };

        let fields = errors.field_errors();
        assert!(fields.contains_key("price"));
        assert!(fields.contains_key(UPLOADED_IMAGES_FIELD));
    }

    #[tokio::test]
    async fn test_create_product_unknown_category() {
        let mut repo = MockCatalogRepository::new();
        repo.expect_get_category().returning(|_| Ok(None));

        let service = CatalogService::new(repo, Arc::new(MockMediaStorage::new()));
        let result = service
            .create_product(create_input(Uuid::now_v7()), vec![], None)
            .await;

        let Err(CatalogError::Invalid(errors)) = result else {
            panic!("expected validation error");
        };
        assert!(errors.field_errors().contains_key("category_id"));
    }

    #[tokio::test]
    async fn test_failed_create_removes_stored_files() {
        let cat = category();
        let category_id = cat.id;
        let mut repo = MockCatalogRepository::new();
        repo.expect_get_category()
            .returning(move |_| Ok(Some(cat.clone())));
        repo.expect_create_product()
            .returning(|_, _| Err(CatalogError::Conflict("A record with this sku already exists".into())));

        let mut media = counting_media();
        media.expect_delete().times(2).returning(|_| Ok(()));

        let service = CatalogService::new(repo, Arc::new(media));
        let result = service
            .create_product(create_input(category_id), vec![png("a.png"), png("b.png")], None)
            .await;

        assert!(matches!(result, Err(CatalogError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_without_uploads_keeps_images() {
        let cat = category();
        let product = Product::new(create_input(cat.id));
        let product_id = product.id;

        let mut repo = MockCatalogRepository::new();
        let existing = product.clone();
        repo.expect_get_product()
            .with(eq(product_id))
            .returning(move |_| Ok(Some(existing.clone())));
        repo.expect_update_product()
            .withf(move |id, _, images| *id == product_id && images.is_none())
            .returning(move |_, input, _| {
                let mut product = product.clone();
                product.apply_update(input);
                Ok(ProductWithImages {
                    product,
                    images: vec![],
                })
            });

        let service = CatalogService::new(repo, Arc::new(counting_media()));
        let update = UpdateProduct {
            price: Some(dec!(49.90)),
            ..Default::default()
        };
        let response = service
            .update_product(product_id, update, vec![], None)
            .await
            .unwrap();

        assert_eq!(response.price, dec!(49.90));
    }

    #[tokio::test]
    async fn test_update_with_uploads_replaces_images() {
        let cat = category();
        let product = Product::new(create_input(cat.id));
        let product_id = product.id;

        let mut repo = MockCatalogRepository::new();
        let existing = product.clone();
        repo.expect_get_product()
            .returning(move |_| Ok(Some(existing.clone())));
        repo.expect_update_product()
            .withf(|_, _, images| {
                images
                    .as_ref()
                    .is_some_and(|i| i.len() == 1 && i[0].is_primary && i[0].image == "products/0-d.png")
            })
            .returning(move |_, _, images| Ok(saved(product.clone(), images.unwrap_or_default())));

        let service = CatalogService::new(repo, Arc::new(counting_media()));
        let response = service
            .update_product(product_id, UpdateProduct::default(), vec![png("d.png")], None)
            .await
            .unwrap();

        assert_eq!(response.images.len(), 1);
        assert!(response.images[0].is_primary);
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let mut repo = MockCatalogRepository::new();
        repo.expect_get_product().returning(|_| Ok(None));

        let service = CatalogService::new(repo, Arc::new(MockMediaStorage::new()));
        let id = Uuid::now_v7();
        let result = service
            .update_product(id, UpdateProduct::default(), vec![png("d.png")], None)
            .await;

        assert!(matches!(result, Err(CatalogError::ProductNotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_review_author_comes_from_request() {
        let cat = category();
        let product = Product::new(create_input(cat.id));
        let product_id = product.id;
        let user = AuthUser {
            id: Uuid::now_v7(),
            name: "ann".to_string(),
            email: "ann@example.com".to_string(),
        };
        let user_id = user.id;

        let mut repo = MockCatalogRepository::new();
        repo.expect_get_product()
            .returning(move |_| Ok(Some(product.clone())));
        repo.expect_create_review()
            .withf(move |r| r.user_id == user_id && r.user_name == "ann")
            .returning(|input| Ok(Review::new(input)));

        let service = CatalogService::new(repo, Arc::new(MockMediaStorage::new()));
        let ctx = RequestContext::new("http://localhost", Some(user));
        let review = service
            .create_review(
                product_id,
                CreateReview {
                    rating: 5,
                    title: "Great".to_string(),
                    comment: String::new(),
                },
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(review.user_id, user_id);
        assert_eq!(review.user, "ann");
        assert!(!review.is_verified_purchase);
    }

    #[tokio::test]
    async fn test_review_author_name_fits_column() {
        let cat = category();
        let product = Product::new(create_input(cat.id));
        let product_id = product.id;
        let user = AuthUser {
            id: Uuid::now_v7(),
            name: "é".repeat(MAX_USER_NAME_LENGTH + 40),
            email: "long@example.com".to_string(),
        };

        let mut repo = MockCatalogRepository::new();
        repo.expect_get_product()
            .returning(move |_| Ok(Some(product.clone())));
        repo.expect_create_review()
            .withf(|r| r.user_name.chars().count() == MAX_USER_NAME_LENGTH)
            .returning(|input| Ok(Review::new(input)));

        let service = CatalogService::new(repo, Arc::new(MockMediaStorage::new()));
        let ctx = RequestContext::new("http://localhost", Some(user));
        let review = service
            .create_review(
                product_id,
                CreateReview {
                    rating: 4,
                    title: "Fine".to_string(),
                    comment: String::new(),
                },
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(review.user.chars().count(), MAX_USER_NAME_LENGTH);
    }

    #[tokio::test]
    async fn test_review_requires_user() {
        let service = CatalogService::new(MockCatalogRepository::new(), Arc::new(MockMediaStorage::new()));
        let ctx = RequestContext::new("http://localhost", None);
        let result = service
            .create_review(
                Uuid::now_v7(),
                CreateReview {
                    rating: 5,
                    title: "Great".to_string(),
                    comment: String::new(),
                },
                &ctx,
            )
            .await;

        assert!(matches!(result, Err(CatalogError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_list_products_without_request_has_no_primary_image() {
        let cat = category();
        let product = Product::new(create_input(cat.id));
        let product_id = product.id;
        let primary = ProductImage::new(
            product_id,
            0,
            NewProductImage {
                image: "products/a.png".to_string(),
                alt_text: String::new(),
                is_primary: true,
            },
        );

        let mut repo = MockCatalogRepository::new();
        repo.expect_list_products()
            .returning(move |_| Ok(vec![product.clone()]));
        repo.expect_categories_by_ids()
            .returning(move |_| Ok(vec![cat.clone()]));
        repo.expect_review_stats().returning(|_| Ok(HashMap::new()));
        repo.expect_primary_images()
            .returning(move |_| Ok(HashMap::from([(product_id, primary.clone())])));

        let service = CatalogService::new(repo, Arc::new(counting_media()));

        let items = service
            .list_products(ProductFilter::default(), None)
            .await
            .unwrap();
        assert_eq!(items[0].primary_image, None);
        assert_eq!(items[0].average_rating, None);
        assert_eq!(items[0].category, "Shoes");

        let ctx = RequestContext::new("https://shop.example.com", None);
        let items = service
            .list_products(ProductFilter::default(), Some(&ctx))
            .await
            .unwrap();
        assert_eq!(
            items[0].primary_image.as_deref(),
            Some("https://shop.example.com/media/products/a.png")
        );
    }

    #[tokio::test]
    async fn test_category_counts_only_active_products() {
        let cat = category();
        let category_id = cat.id;

        let mut repo = MockCatalogRepository::new();
        repo.expect_get_category()
            .returning(move |_| Ok(Some(cat.clone())));
        repo.expect_count_active_products()
            .with(eq(vec![category_id]))
            .returning(move |_| Ok(HashMap::from([(category_id, 2)])));

        let service = CatalogService::new(repo, Arc::new(MockMediaStorage::new()));
        let response = service.get_category(category_id, None).await.unwrap();

        assert_eq!(response.products_count, 2);
    }
}
