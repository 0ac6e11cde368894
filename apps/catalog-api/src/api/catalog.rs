//! Catalog API routes

use axum::Router;
use axum_helpers::JwtAuth;
use domain_catalog::{CatalogService, CatalogState, PgCatalogRepository, handlers};

use crate::state::AppState;

/// Create catalog router
pub fn router(state: &AppState) -> Router {
    let repository = PgCatalogRepository::new(state.db.clone());
    let service = CatalogService::new(repository, state.media.clone());

    handlers::router(CatalogState {
        service,
        jwt: JwtAuth::new(&state.config.jwt),
        public_base_url: state.config.media.public_base_url.clone(),
        trust_forwarded_headers: state.config.media.trust_forwarded_headers,
    })
}
