//! Catalog Domain
//!
//! Categories, products with their image sets, and product reviews.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, multipart parsing, auth
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌──────────────┐
//! │   Service   │ ──► │ MediaStorage │  ← uploaded image files
//! └──────┬──────┘     └──────────────┘
//!        │ Projector shapes output with the RequestContext
//! ┌──────▼──────┐
//! │ Repository  │  ← trait + in-memory + Postgres
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← records, DTOs, sea-orm entities
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum_helpers::{JwtAuth, JwtConfig};
//! use domain_catalog::{
//!     handlers::{self, CatalogState},
//!     CatalogService, InMemoryCatalogRepository, LocalMediaStorage,
//! };
//!
//! let media = Arc::new(LocalMediaStorage::new("./media", "/media"));
//! let service = CatalogService::new(InMemoryCatalogRepository::new(), media);
//!
//! let router = handlers::router(CatalogState {
//!     service,
//!     jwt: JwtAuth::new(&JwtConfig::new("a-development-secret-of-32-chars-min")),
//!     public_base_url: "http://localhost:8080".to_string(),
//!     trust_forwarded_headers: false,
//! });
//! ```

pub mod context;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod media;
pub mod models;
pub mod postgres;
pub mod projection;
pub mod repository;
pub mod service;
pub mod upload;

// Re-export commonly used types
pub use context::RequestContext;
pub use error::{CatalogError, CatalogResult};
pub use handlers::{ApiDoc, CatalogState};
pub use media::{LocalMediaStorage, MediaStorage};
pub use models::{
    Category, CategoryFilter, CreateCategory, CreateProduct, CreateReview, NewProductImage,
    NewReview, Product, ProductFilter, ProductImage, ProductWithImages, Review, ReviewStats,
    StockStatus, UpdateCategory, UpdateProduct,
};
pub use postgres::PgCatalogRepository;
pub use projection::{
    CategoryResponse, ProductDetail, ProductListItem, ProductWriteResponse, Projector,
    ReviewResponse,
};
pub use repository::{CatalogRepository, InMemoryCatalogRepository};
pub use service::CatalogService;
pub use upload::UploadedImage;
