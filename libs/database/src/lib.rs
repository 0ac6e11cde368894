//! PostgreSQL plumbing shared by the catalog service.
//!
//! - [`postgres`]: pool configuration, connection with retry, migrations, health checks
//! - [`repository`]: `BaseRepository`, CRUD over any UUID-keyed SeaORM entity
//! - [`common`]: error type and retry with exponential backoff
//!
//! ```ignore
//! use database::postgres::{PostgresConfig, connect_from_config_with_retry, run_migrations};
//! use migration::Migrator;
//!
//! let db = connect_from_config_with_retry(PostgresConfig::from_env()?, None).await?;
//! run_migrations::<Migrator>(&db, "catalog_api").await?;
//! ```

pub mod common;
pub mod postgres;
pub mod repository;

pub use common::{DatabaseError, DatabaseResult};
pub use repository::BaseRepository;
