use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Category not found: {0}")]
    CategoryNotFound(Uuid),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Invalid input: {0}")]
    Invalid(ValidationErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    /// Single field-level validation failure.
    pub fn invalid_field(field: &'static str, code: &'static str, message: &'static str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, ValidationError::new(code).with_message(message.into()));
        CatalogError::Invalid(errors)
    }
}

impl From<ValidationErrors> for CatalogError {
    fn from(errors: ValidationErrors) -> Self {
        CatalogError::Invalid(errors)
    }
}

/// Constraint violations become client errors; anything else is a database failure.
impl From<DbErr> for CatalogError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                CatalogError::Conflict(unique_violation_message(&detail))
            }
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                if detail.contains("update or delete on table") {
                    // ON DELETE RESTRICT: rows still reference the parent
                    CatalogError::Conflict("Category still has products assigned".to_string())
                } else {
                    CatalogError::invalid_field(
                        "category_id",
                        "does_not_exist",
                        "The selected category does not exist.",
                    )
                }
            }
            _ => CatalogError::Database(err),
        }
    }
}

fn unique_violation_message(detail: &str) -> String {
    for column in ["slug", "sku"] {
        if detail.contains(&format!("_{}_key", column)) || detail.contains(&format!("({})", column))
        {
            return format!("A record with this {} already exists", column);
        }
    }
    "A record with these values already exists".to_string()
}

/// Convert CatalogError to AppError for standardized error responses
impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::CategoryNotFound(id) => {
                AppError::NotFound(format!("Category {} not found", id))
            }
            CatalogError::ProductNotFound(id) => {
                AppError::NotFound(format!("Product {} not found", id))
            }
            CatalogError::Invalid(errors) => AppError::ValidationError(errors),
            CatalogError::Conflict(msg) => AppError::Conflict(msg),
            CatalogError::Unauthorized => {
                AppError::Unauthorized("Authentication required".to_string())
            }
            CatalogError::Storage(msg) => AppError::Storage(msg),
            CatalogError::Database(err) => AppError::Database(err),
            CatalogError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
