//! Output representations of catalog records.
//!
//! Projections are pure: the service loads the related data (counts,
//! ratings, images) and the [`Projector`] shapes it for the wire.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::media::MediaStorage;
use crate::models::{
    Category, Product, ProductImage, ProductWithImages, Review, ReviewStats, StockStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    /// Image URL, absolute when rendered for a request
    pub image: Option<String>,
    pub is_active: bool,
    /// Number of active products in the category
    pub products_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductImageResponse {
    pub id: Uuid,
    pub image: String,
    pub alt_text: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReviewResponse {
    pub id: Uuid,
    /// Display name of the author
    pub user: String,
    pub user_id: Uuid,
    pub rating: i16,
    pub title: String,
    pub comment: String,
    pub is_verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact product row for listings
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductListItem {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    /// Category name
    pub category: String,
    pub stock_status: StockStatus,
    pub is_featured: bool,
    /// Mean review rating, `null` without reviews
    pub average_rating: Option<f64>,
    pub reviews_count: u64,
    /// Absolute URL of the primary image, `null` outside a request
    pub primary_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductDetail {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    pub stock_quantity: i32,
    pub stock_status: StockStatus,
    pub sku: String,
    #[schema(value_type = Option<String>)]
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category: CategoryResponse,
    pub images: Vec<ProductImageResponse>,
    pub reviews: Vec<ReviewResponse>,
    pub average_rating: Option<f64>,
}

/// Representation returned by product create and update
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductWriteResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    /// Category id
    pub category: Uuid,
    pub stock_quantity: i32,
    pub stock_status: StockStatus,
    pub sku: String,
    #[schema(value_type = Option<String>)]
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub images: Vec<ProductImageResponse>,
}

/// Shapes records for output, rendering media paths through `media`.
#[derive(Clone, Copy)]
pub struct Projector<'a> {
    ctx: Option<&'a RequestContext>,
    media: &'a dyn MediaStorage,
}

impl<'a> Projector<'a> {
    pub fn new(ctx: Option<&'a RequestContext>, media: &'a dyn MediaStorage) -> Self {
        Self { ctx, media }
    }

    /// Absolute URL with a request, the relative media URL without one
    fn media_url(&self, path: &str) -> String {
        let url = self.media.url(path);
        match self.ctx {
            Some(ctx) => ctx.build_absolute_uri(&url),
            None => url,
        }
    }

    pub fn category(&self, category: &Category, products_count: u64) -> CategoryResponse {
        CategoryResponse {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
            description: category.description.clone(),
            image: category.image.as_deref().map(|p| self.media_url(p)),
            is_active: category.is_active,
            products_count,
        }
    }

    pub fn image(&self, image: &ProductImage) -> ProductImageResponse {
        ProductImageResponse {
            id: image.id,
            image: self.media_url(&image.image),
            alt_text: image.alt_text.clone(),
            is_primary: image.is_primary,
        }
    }

    pub fn review(&self, review: &Review) -> ReviewResponse {
        ReviewResponse {
            id: review.id,
            user: review.user_name.clone(),
            user_id: review.user_id,
            rating: review.rating,
            title: review.title.clone(),
            comment: review.comment.clone(),
            is_verified_purchase: review.is_verified_purchase,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }

    /// `primary` is the product's first image flagged primary, if any.
    pub fn product_list_item(
        &self,
        product: &Product,
        category_name: &str,
        stats: ReviewStats,
        primary: Option<&ProductImage>,
    ) -> ProductListItem {
        // Without a request there is no host to build an absolute URL from
        let primary_image = match (self.ctx, primary) {
            (Some(ctx), Some(image)) => Some(ctx.build_absolute_uri(&self.media.url(&image.image))),
            _ => None,
        };

        ProductListItem {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            price: product.price,
            category: category_name.to_string(),
            stock_status: product.stock_status,
            is_featured: product.is_featured,
            average_rating: stats.average_rating,
            reviews_count: stats.count,
            primary_image,
        }
    }

    pub fn product_detail(
        &self,
        product: &Product,
        category: CategoryResponse,
        images: &[ProductImage],
        reviews: &[Review],
        stats: ReviewStats,
    ) -> ProductDetail {
        ProductDetail {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            description: product.description.clone(),
            price: product.price,
            stock_quantity: product.stock_quantity,
            stock_status: product.stock_status,
            sku: product.sku.clone(),
            weight: product.weight,
            dimensions: product.dimensions.clone(),
            is_active: product.is_active,
            is_featured: product.is_featured,
            created_at: product.created_at,
            updated_at: product.updated_at,
            category,
            images: images.iter().map(|i| self.image(i)).collect(),
            reviews: reviews.iter().map(|r| self.review(r)).collect(),
            average_rating: stats.average_rating,
        }
    }

    pub fn product_write(&self, saved: &ProductWithImages) -> ProductWriteResponse {
        let product = &saved.product;
        ProductWriteResponse {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            description: product.description.clone(),
            price: product.price,
            category: product.category_id,
            stock_quantity: product.stock_quantity,
            stock_status: product.stock_status,
            sku: product.sku.clone(),
            weight: product.weight,
            dimensions: product.dimensions.clone(),
            is_active: product.is_active,
            is_featured: product.is_featured,
            images: saved.images.iter().map(|i| self.image(i)).collect(),
        }
    }
}
