use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_helpers::{
    AppError, AuditEvent, AuditOutcome, AuthUser, JwtAuth, UuidPath, ValidatedJson,
    errors::responses::{
        BadRequestUuidResponse, BadRequestValidationResponse, ConflictResponse,
        InternalServerErrorResponse, NotFoundResponse, UnauthorizedResponse,
    },
    extract_ip_from_headers, extract_user_agent, jwt_auth_middleware,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::borrow::Cow;
use std::sync::Arc;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use validator::{ValidationError, ValidationErrors};

use crate::context::RequestContext;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    CategoryFilter, CreateCategory, CreateProduct, CreateReview, ProductFilter, StockStatus,
    UpdateCategory, UpdateProduct,
};
use crate::projection::{
    CategoryResponse, ProductDetail, ProductImageResponse, ProductListItem, ProductWriteResponse,
    ReviewResponse,
};
use crate::repository::CatalogRepository;
use crate::service::CatalogService;
use crate::upload::{UPLOADED_IMAGES_FIELD, UploadedImage};

const CATEGORIES_TAG: &str = "Categories";
const PRODUCTS_TAG: &str = "Products";
const REVIEWS_TAG: &str = "Reviews";

/// Multipart part carrying the JSON product attributes
pub const PAYLOAD_FIELD: &str = "payload";

/// Request body cap for product writes with images
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Multipart body of product create and update
#[derive(ToSchema)]
#[allow(dead_code)]
struct ProductForm {
    /// JSON-encoded product attributes
    payload: String,
    /// Image files in display order; the first becomes the primary image
    #[schema(value_type = Vec<String>, format = Binary)]
    uploaded_images: Vec<Vec<u8>>,
}

/// OpenAPI documentation for the catalog API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_categories,
        create_category,
        get_category,
        update_category,
        delete_category,
        list_products,
        create_product,
        get_product,
        update_product,
        delete_product,
        list_reviews,
        create_review,
    ),
    components(
        schemas(
            CategoryResponse, CreateCategory, UpdateCategory, CategoryFilter,
            ProductListItem, ProductDetail, ProductWriteResponse, ProductImageResponse,
            CreateProduct, UpdateProduct, ProductFilter, ProductForm, StockStatus,
            ReviewResponse, CreateReview,
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestUuidResponse,
            UnauthorizedResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = CATEGORIES_TAG, description = "Product categories"),
        (name = PRODUCTS_TAG, description = "Products and their images"),
        (name = REVIEWS_TAG, description = "Product reviews")
    )
)]
pub struct ApiDoc;

/// Shared handler state
pub struct CatalogState<R: CatalogRepository> {
    pub service: CatalogService<R>,
    pub jwt: JwtAuth,
    /// Used for absolute URLs when the request carries no host information
    pub public_base_url: String,
    /// Honor `X-Forwarded-Proto`/`X-Forwarded-Host` from a fronting proxy
    pub trust_forwarded_headers: bool,
}

impl<R: CatalogRepository> CatalogState<R> {
    fn context(&self, headers: &HeaderMap, user: Option<AuthUser>) -> RequestContext {
        RequestContext::from_headers(
            headers,
            &self.public_base_url,
            self.trust_forwarded_headers,
            user,
        )
    }
}

type SharedState<R> = State<Arc<CatalogState<R>>>;

/// Create the catalog router. Reads are public; writes need a bearer token.
pub fn router<R: CatalogRepository + 'static>(state: CatalogState<R>) -> Router {
    let jwt = state.jwt.clone();
    let shared_state = Arc::new(state);

    let public = Router::new()
        .route("/categories", get(list_categories::<R>))
        .route("/categories/{id}", get(get_category::<R>))
        .route("/products", get(list_products::<R>))
        .route("/products/{id}", get(get_product::<R>))
        .route("/products/{id}/reviews", get(list_reviews::<R>));

    let protected = Router::new()
        .route("/categories", post(create_category::<R>))
        .route(
            "/categories/{id}",
            put(update_category::<R>).delete(delete_category::<R>),
        )
        .route("/products", post(create_product::<R>))
        .route(
            "/products/{id}",
            put(update_product::<R>).delete(delete_product::<R>),
        )
        .route("/products/{id}/reviews", post(create_review::<R>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .route_layer(middleware::from_fn_with_state(jwt, jwt_auth_middleware));

    public.merge(protected).with_state(shared_state)
}

fn payload_error(code: &'static str, message: impl Into<Cow<'static, str>>) -> CatalogError {
    let mut errors = ValidationErrors::new();
    errors.add(
        PAYLOAD_FIELD,
        ValidationError::new(code).with_message(message.into()),
    );
    CatalogError::Invalid(errors)
}

/// Split a product form into its JSON payload and uploaded files.
///
/// Unknown parts are ignored. Files keep the order they were sent in.
async fn read_product_form<T: DeserializeOwned>(
    mut multipart: Multipart,
) -> Result<(Option<T>, Vec<UploadedImage>), AppError> {
    let mut payload = None;
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(PAYLOAD_FIELD) => {
                let text = field.text().await?;
                let parsed = serde_json::from_str(&text)
                    .map_err(|e| payload_error("invalid_json", e.to_string()))?;
                payload = Some(parsed);
            }
            Some(UPLOADED_IMAGES_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                uploads.push(UploadedImage {
                    file_name,
                    content_type,
                    data,
                });
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok((payload, uploads))
}

/// List categories
#[utoipa::path(
    get,
    path = "/categories",
    tag = CATEGORIES_TAG,
    params(CategoryFilter),
    responses(
        (status = 200, description = "List of categories", body = Vec<CategoryResponse>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_categories<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    Query(filter): Query<CategoryFilter>,
) -> CatalogResult<Json<Vec<CategoryResponse>>> {
    let ctx = state.context(&headers, None);
    let categories = state.service.list_categories(filter, Some(&ctx)).await?;
    Ok(Json(categories))
}

/// Create a category
#[utoipa::path(
    post,
    path = "/categories",
    tag = CATEGORIES_TAG,
    request_body = CreateCategory,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_category<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<CreateCategory>,
) -> CatalogResult<impl IntoResponse> {
    let ctx = state.context(&headers, Some(user.clone()));
    let category = state.service.create_category(input, Some(&ctx)).await?;

    AuditEvent::new(
        Some(user.id.to_string()),
        "category.create",
        Some(format!("category:{}", category.id)),
        AuditOutcome::Success,
    )
    .with_ip(extract_ip_from_headers(&headers))
    .with_user_agent(extract_user_agent(&headers))
    .with_details(json!({ "slug": category.slug }))
    .log();

    Ok((StatusCode::CREATED, Json(category)))
}

/// Get a category by ID
#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = CATEGORIES_TAG,
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category found", body = CategoryResponse),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_category<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
) -> CatalogResult<Json<CategoryResponse>> {
    let ctx = state.context(&headers, None);
    let category = state.service.get_category(id, Some(&ctx)).await?;
    Ok(Json(category))
}

/// Update a category; absent fields are left unchanged
#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = CATEGORIES_TAG,
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategory,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_category<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<UpdateCategory>,
) -> CatalogResult<Json<CategoryResponse>> {
    let ctx = state.context(&headers, Some(user));
    let category = state.service.update_category(id, input, Some(&ctx)).await?;
    Ok(Json(category))
}

/// Delete a category that no product references
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = CATEGORIES_TAG,
    params(("id" = Uuid, Path, description = "Category ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_category<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
    user: AuthUser,
) -> CatalogResult<impl IntoResponse> {
    let result = state.service.delete_category(id).await;

    let outcome = match &result {
        Ok(()) => AuditOutcome::Success,
        Err(_) => AuditOutcome::Failure,
    };
    let mut event = AuditEvent::new(
        Some(user.id.to_string()),
        "category.delete",
        Some(format!("category:{}", id)),
        outcome,
    )
    .with_ip(extract_ip_from_headers(&headers))
    .with_user_agent(extract_user_agent(&headers));
    if let Err(err) = &result {
        event = event.with_details(json!({ "error": err.to_string() }));
    }
    event.log();

    result?;
    Ok(StatusCode::NO_CONTENT)
}

/// List products with optional filters
#[utoipa::path(
    get,
    path = "/products",
    tag = PRODUCTS_TAG,
    params(ProductFilter),
    responses(
        (status = 200, description = "List of products", body = Vec<ProductListItem>),
        (status = 400, description = "Invalid query parameters"),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    Query(filter): Query<ProductFilter>,
) -> CatalogResult<Json<Vec<ProductListItem>>> {
    let ctx = state.context(&headers, None);
    let products = state.service.list_products(filter, Some(&ctx)).await?;
    Ok(Json(products))
}

/// Create a product with its images
///
/// The first uploaded image becomes the primary image.
#[utoipa::path(
    post,
    path = "/products",
    tag = PRODUCTS_TAG,
    request_body(content = ProductForm, content_type = "multipart/form-data"),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Product created", body = ProductWriteResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_product<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    user: AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (payload, uploads) = read_product_form::<CreateProduct>(multipart).await?;
    let input = payload.ok_or_else(|| payload_error("required", "This field is required."))?;

    let ctx = state.context(&headers, Some(user.clone()));
    let product = state
        .service
        .create_product(input, uploads, Some(&ctx))
        .await?;

    AuditEvent::new(
        Some(user.id.to_string()),
        "product.create",
        Some(format!("product:{}", product.id)),
        AuditOutcome::Success,
    )
    .with_ip(extract_ip_from_headers(&headers))
    .with_user_agent(extract_user_agent(&headers))
    .with_details(json!({
        "sku": product.sku,
        "category_id": product.category,
        "images": product.images.len(),
    }))
    .log();

    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product with its category, images and reviews
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = PRODUCTS_TAG,
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product found", body = ProductDetail),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_product<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
) -> CatalogResult<Json<ProductDetail>> {
    let ctx = state.context(&headers, None);
    let product = state.service.get_product(id, Some(&ctx)).await?;
    Ok(Json(product))
}

/// Update a product
///
/// Any uploaded images replace the current set; without uploads the
/// images are kept. The `payload` part may be omitted.
#[utoipa::path(
    put,
    path = "/products/{id}",
    tag = PRODUCTS_TAG,
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body(content = ProductForm, content_type = "multipart/form-data"),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Product updated", body = ProductWriteResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_product<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Json<ProductWriteResponse>, AppError> {
    let (payload, uploads) = read_product_form::<UpdateProduct>(multipart).await?;

    let ctx = state.context(&headers, Some(user));
    let product = state
        .service
        .update_product(id, payload.unwrap_or_default(), uploads, Some(&ctx))
        .await?;
    Ok(Json(product))
}

/// Delete a product together with its images and reviews
#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = PRODUCTS_TAG,
    params(("id" = Uuid, Path, description = "Product ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_product<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
    user: AuthUser,
) -> CatalogResult<impl IntoResponse> {
    let result = state.service.delete_product(id).await;

    let outcome = match &result {
        Ok(()) => AuditOutcome::Success,
        Err(_) => AuditOutcome::Failure,
    };
    let mut event = AuditEvent::new(
        Some(user.id.to_string()),
        "product.delete",
        Some(format!("product:{}", id)),
        outcome,
    )
    .with_ip(extract_ip_from_headers(&headers))
    .with_user_agent(extract_user_agent(&headers));
    if let Err(err) = &result {
        event = event.with_details(json!({ "error": err.to_string() }));
    }
    event.log();

    result?;
    Ok(StatusCode::NO_CONTENT)
}

/// List reviews of a product, newest first
#[utoipa::path(
    get,
    path = "/products/{id}/reviews",
    tag = REVIEWS_TAG,
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Reviews of the product", body = Vec<ReviewResponse>),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_reviews<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
) -> CatalogResult<Json<Vec<ReviewResponse>>> {
    let ctx = state.context(&headers, None);
    let reviews = state.service.list_reviews(id, Some(&ctx)).await?;
    Ok(Json(reviews))
}

/// Review a product as the authenticated user
///
/// `user` and `user_id` in the body are ignored; the author is taken from the token.
#[utoipa::path(
    post,
    path = "/products/{id}/reviews",
    tag = REVIEWS_TAG,
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = CreateReview,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_review<R: CatalogRepository>(
    State(state): SharedState<R>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<CreateReview>,
) -> CatalogResult<impl IntoResponse> {
    let ctx = state.context(&headers, Some(user));
    let review = state.service.create_review(id, input, &ctx).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
