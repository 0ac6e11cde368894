use crate::Environment;
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Installs the color-eyre report hook (locations on, env section off).
/// Call first thing in `main`; repeated calls are ignored.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Initialize tracing with environment-aware configuration and error span capture.
///
/// - **Production** (`APP_ENV=production`): flattened JSON lines without module
///   targets, for log aggregation.
/// - **Development** (default): pretty, human-readable output.
///
/// Both variants install `tracing_error::ErrorLayer` so `color-eyre` reports carry
/// the span trace of the failing request.
///
/// `RUST_LOG` overrides the default filter, e.g. `RUST_LOG=catalog_api=trace,sea_orm=debug`.
///
/// Safe to call more than once; later calls are no-ops (common in tests).
///
/// ```ignore
/// use tracing::instrument;
///
/// #[instrument(skip(self), fields(product_id = %id))]
/// async fn get_product(&self, id: Uuid) -> CatalogResult<ProductDetail> {
///     // spans recorded here show up in error reports
/// }
/// ```
pub fn init_tracing(environment: &Environment) {
    let is_production = environment.is_production();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if is_production {
            EnvFilter::new(PRODUCTION_FILTER)
        } else {
            EnvFilter::new(DEVELOPMENT_FILTER)
        }
    });

    let result = if is_production {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    if result.is_ok() {
        info!(?environment, "tracing initialized");
    } else {
        debug!("tracing already initialized");
    }
}

/// Default filter when `RUST_LOG` is unset and `APP_ENV=production`
pub const PRODUCTION_FILTER: &str = "info,sea_orm=warn,sqlx=warn";

/// Default filter for local development
pub const DEVELOPMENT_FILTER: &str = "debug,sea_orm=info,sqlx=warn,hyper=info,tower_http=debug";
