use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::path::{Component, Path};
use std::sync::LazyLock;
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

static SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if !SLUG.is_match(slug) {
        return Err(ValidationError::new("invalid_slug")
            .with_message("Use lowercase letters, numbers and single hyphens.".into()));
    }
    Ok(())
}

/// Total digits of `products.price`, NUMERIC(10,2)
pub const PRICE_DIGITS: u32 = 10;
/// Total digits of `products.weight`, NUMERIC(8,2)
pub const WEIGHT_DIGITS: u32 = 8;
/// Scale shared by every NUMERIC column of the catalog
pub const DECIMAL_PLACES: u32 = 2;

/// Longest author name a review row can hold
pub const MAX_USER_NAME_LENGTH: usize = 255;

fn numeric_error(code: &'static str, message: String, max: u32) -> ValidationError {
    let mut error = ValidationError::new(code).with_message(Cow::Owned(message));
    error.add_param(Cow::Borrowed("max"), &max);
    error
}

/// Non-negative and representable in a NUMERIC(`max_digits`, 2) column.
fn check_numeric(value: &Decimal, max_digits: u32) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("range")
            .with_message("Ensure this value is greater than or equal to 0.".into()));
    }

    let normalized = value.normalize();
    let decimals = normalized.scale();
    let significant = normalized
        .mantissa()
        .unsigned_abs()
        .checked_ilog10()
        .unwrap_or(0)
        + 1;
    let digits = significant.max(decimals);
    let whole_digits = digits - decimals;

    if digits > max_digits {
        return Err(numeric_error(
            "max_digits",
            format!("Ensure that there are no more than {} digits in total.", max_digits),
            max_digits,
        ));
    }
    if decimals > DECIMAL_PLACES {
        return Err(numeric_error(
            "max_decimal_places",
            format!("Ensure that there are no more than {} decimal places.", DECIMAL_PLACES),
            DECIMAL_PLACES,
        ));
    }
    let max_whole = max_digits - DECIMAL_PLACES;
    if whole_digits > max_whole {
        return Err(numeric_error(
            "max_whole_digits",
            format!("Ensure that there are no more than {} digits before the decimal point.", max_whole),
            max_whole,
        ));
    }
    Ok(())
}

fn validate_price(value: &Decimal) -> Result<(), ValidationError> {
    check_numeric(value, PRICE_DIGITS)
}

fn validate_weight(value: &Decimal) -> Result<(), ValidationError> {
    check_numeric(value, WEIGHT_DIGITS)
}

/// Stored values carry the column scale, as Postgres returns them.
fn to_column_scale(mut value: Decimal) -> Decimal {
    value.rescale(DECIMAL_PLACES);
    value
}

/// Relative path inside the media root, e.g. `categories/shoes.png`
fn validate_media_path(path: &str) -> Result<(), ValidationError> {
    let inside_root = !path.is_empty()
        && !path.contains("://")
        && !path.contains('\\')
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !inside_root {
        return Err(ValidationError::new("invalid_path")
            .with_message("Use a relative path inside the media directory.".into()));
    }
    Ok(())
}

/// Keeps an explicit `null` apart from an absent field: absent is `None`,
/// `null` is `Some(None)`. Pair with `#[serde(default)]`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Stock availability shown to shoppers
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "stock_status")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StockStatus {
    #[default]
    #[sea_orm(string_value = "in_stock")]
    InStock,
    #[sea_orm(string_value = "low_stock")]
    LowStock,
    #[sea_orm(string_value = "out_of_stock")]
    OutOfStock,
}

/// Product category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    /// Relative storage path of the category image
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub stock_status: StockStatus,
    pub sku: String,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub category_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    /// Relative storage path
    pub image: String,
    pub alt_text: String,
    pub is_primary: bool,
    /// Upload order within the product's image set
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    /// Display name captured from the token when the review was written
    pub user_name: String,
    pub rating: i16,
    pub title: String,
    pub comment: String,
    pub is_verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product together with its current image set, ordered by position.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductWithImages {
    pub product: Product,
    pub images: Vec<ProductImage>,
}

/// Review count and mean rating for one product.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReviewStats {
    pub count: u64,
    /// `None` when the product has no reviews
    pub average_rating: Option<f64>,
}

impl ReviewStats {
    pub fn from_ratings(ratings: impl IntoIterator<Item = i16>) -> Self {
        let (count, sum) = ratings
            .into_iter()
            .fold((0u64, 0i64), |(count, sum), r| (count + 1, sum + i64::from(r)));

        Self {
            count,
            average_rating: (count > 0).then(|| sum as f64 / count as f64),
        }
    }
}

/// DTO for creating a category
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCategory {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255), custom(function = "validate_slug"))]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    /// Relative storage path of an already uploaded image
    #[validate(length(max = 500), custom(function = "validate_media_path"))]
    pub image: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// DTO for a partial category update
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCategory {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 255), custom(function = "validate_slug"))]
    pub slug: Option<String>,
    pub description: Option<String>,
    /// `null` removes the image
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 500), custom(function = "validate_media_path"))]
    #[schema(value_type = Option<String>, nullable)]
    pub image: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Product attributes accepted on create (the `payload` part of the multipart body)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255), custom(function = "validate_slug"))]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "validate_price"))]
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    /// Write-only reference to the owning category
    pub category_id: Uuid,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock_quantity: i32,
    #[serde(default)]
    pub stock_status: StockStatus,
    #[validate(length(min = 1, max = 100))]
    pub sku: String,
    #[validate(custom(function = "validate_weight"))]
    #[schema(value_type = Option<String>, example = "0.75")]
    pub weight: Option<Decimal>,
    #[validate(length(max = 100))]
    pub dimensions: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

/// Partial product update; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 255), custom(function = "validate_slug"))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(custom(function = "validate_price"))]
    #[schema(value_type = Option<String>, example = "24.50")]
    pub price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub stock_quantity: Option<i32>,
    pub stock_status: Option<StockStatus>,
    #[validate(length(min = 1, max = 100))]
    pub sku: Option<String>,
    /// `null` clears the weight
    #[serde(default, deserialize_with = "double_option")]
    #[validate(custom(function = "validate_weight"))]
    #[schema(value_type = Option<String>, nullable)]
    pub weight: Option<Option<Decimal>>,
    /// `null` clears the dimensions
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100))]
    #[schema(value_type = Option<String>, nullable)]
    pub dimensions: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

/// Review body; the author always comes from the bearer token
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateReview {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub comment: String,
}

/// Review ready to persist, author already resolved
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i16,
    pub title: String,
    pub comment: String,
}

/// Image row to create for a product, file already stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewProductImage {
    pub image: String,
    pub alt_text: String,
    pub is_primary: bool,
}

impl NewProductImage {
    /// Builds the image set for stored paths in upload order; only the first is primary.
    pub fn from_stored_paths(paths: Vec<String>) -> Vec<Self> {
        paths
            .into_iter()
            .enumerate()
            .map(|(i, image)| Self {
                image,
                alt_text: String::new(),
                is_primary: i == 0,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct CategoryFilter {
    pub is_active: Option<bool>,
}

/// Query filters for listing products
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub stock_status: Option<StockStatus>,
    /// Case-insensitive match on name or description
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            category_id: None,
            is_active: None,
            is_featured: None,
            stock_status: None,
            search: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl ProductFilter {
    /// Search term trimmed, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, product: &Product) -> bool {
        if self.category_id.is_some_and(|id| product.category_id != id) {
            return false;
        }
        if self.is_active.is_some_and(|v| product.is_active != v) {
            return false;
        }
        if self.is_featured.is_some_and(|v| product.is_featured != v) {
            return false;
        }
        if self.stock_status.is_some_and(|s| product.stock_status != s) {
            return false;
        }
        if let Some(term) = self.search_term() {
            let term = term.to_lowercase();
            return product.name.to_lowercase().contains(&term)
                || product.description.to_lowercase().contains(&term);
        }
        true
    }
}

impl Category {
    pub fn new(input: CreateCategory) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: input.name,
            slug: input.slug,
            description: input.description,
            image: input.image,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: UpdateCategory) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(slug) = update.slug {
            self.slug = slug;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(image) = update.image {
            self.image = image;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        self.updated_at = Utc::now();
    }
}

impl Product {
    pub fn new(input: CreateProduct) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: input.name,
            slug: input.slug,
            description: input.description,
            price: to_column_scale(input.price),
            stock_quantity: input.stock_quantity,
            stock_status: input.stock_status,
            sku: input.sku,
            weight: input.weight.map(to_column_scale),
            dimensions: input.dimensions,
            is_active: input.is_active,
            is_featured: input.is_featured,
            category_id: input.category_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply updates from UpdateProduct DTO
    pub fn apply_update(&mut self, update: UpdateProduct) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(slug) = update.slug {
            self.slug = slug;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(price) = update.price {
            self.price = to_column_scale(price);
        }
        if let Some(category_id) = update.category_id {
            self.category_id = category_id;
        }
        if let Some(stock_quantity) = update.stock_quantity {
            self.stock_quantity = stock_quantity;
        }
        if let Some(stock_status) = update.stock_status {
            self.stock_status = stock_status;
        }
        if let Some(sku) = update.sku {
            self.sku = sku;
        }
        if let Some(weight) = update.weight {
            self.weight = weight.map(to_column_scale);
        }
        if let Some(dimensions) = update.dimensions {
            self.dimensions = dimensions;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        if let Some(is_featured) = update.is_featured {
            self.is_featured = is_featured;
        }
        self.updated_at = Utc::now();
    }
}

impl ProductImage {
    pub fn new(product_id: Uuid, position: i32, input: NewProductImage) -> Self {
        Self {
            id: Uuid::now_v7(),
            product_id,
            image: input.image,
            alt_text: input.alt_text,
            is_primary: input.is_primary,
            position,
        }
    }
}

impl Review {
    pub fn new(input: NewReview) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            product_id: input.product_id,
            user_id: input.user_id,
            user_name: input.user_name,
            rating: input.rating,
            title: input.title,
            comment: input.comment,
            is_verified_purchase: false,
            created_at: now,
            updated_at: now,
        }
    }
}
