//! Application state management

use database::postgres::DatabaseConnection;
use domain_catalog::LocalMediaStorage;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// PostgreSQL connection pool
    pub db: DatabaseConnection,
    /// Uploaded image files, shared by every catalog handler
    pub media: Arc<LocalMediaStorage>,
}
