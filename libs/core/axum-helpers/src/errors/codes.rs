//! Error codes carried in the `code`/`error` fields of every error body.
//!
//! ```rust
//! use axum_helpers::errors::ErrorCode;
//!
//! assert_eq!(ErrorCode::ValidationError.as_str(), "VALIDATION_ERROR");
//! assert_eq!(ErrorCode::StorageError.code(), 3001);
//! ```

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Client codes are 1xxx, database 2xxx, media storage 3xxx.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (1000-1999)
    /// Request validation failed
    ValidationError,

    /// Invalid UUID format in path or query parameter
    InvalidUuid,

    /// Requested resource was not found
    NotFound,

    /// Authentication credentials are missing or invalid
    Unauthorized,

    /// Request conflicts with current resource state (e.g., duplicate resource)
    Conflict,

    /// JSON extraction from request body failed
    JsonExtraction,

    /// Malformed multipart/form-data body
    InvalidMultipart,

    /// Generic client error with a caller-supplied message
    BadRequest,

    /// An unexpected internal server error occurred
    InternalError,

    // Database errors (2000-2999)
    /// Database query or execution error
    DatabaseError,

    /// Database connection could not be used
    DatabaseConnection,

    /// Database connection pool timed out
    DatabasePoolTimeout,

    /// A unique constraint rejected the write
    DatabaseUniqueViolation,

    /// A foreign key constraint rejected the write
    DatabaseForeignKeyViolation,

    /// Unhandled database error
    DatabaseUnhandled,

    // Storage errors (3000s)
    /// Uploaded media could not be stored
    StorageError,
}

impl ErrorCode {
    /// SCREAMING_SNAKE_CASE identifier sent as `error`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidUuid => "INVALID_UUID",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Conflict => "CONFLICT",
            Self::JsonExtraction => "JSON_EXTRACTION",
            Self::InvalidMultipart => "INVALID_MULTIPART",
            Self::BadRequest => "BAD_REQUEST",
            Self::InternalError => "INTERNAL_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::DatabaseConnection => "DATABASE_CONNECTION",
            Self::DatabasePoolTimeout => "DATABASE_POOL_TIMEOUT",
            Self::DatabaseUniqueViolation => "DATABASE_UNIQUE_VIOLATION",
            Self::DatabaseForeignKeyViolation => "DATABASE_FOREIGN_KEY_VIOLATION",
            Self::DatabaseUnhandled => "DATABASE_UNHANDLED",
            Self::StorageError => "STORAGE_ERROR",
        }
    }

    /// Numeric code sent as `code` and logged with the failure
    pub fn code(&self) -> i32 {
        match self {
            Self::ValidationError => 1001,
            Self::InvalidUuid => 1002,
            Self::JsonExtraction => 1003,
            Self::NotFound => 1004,
            Self::InternalError => 1005,
            Self::Unauthorized => 1006,
            Self::Conflict => 1008,
            Self::InvalidMultipart => 1012,
            Self::BadRequest => 1013,

            Self::DatabaseConnection => 2002,
            Self::DatabaseError => 2003,
            Self::DatabasePoolTimeout => 2013,
            Self::DatabaseUniqueViolation => 2020,
            Self::DatabaseForeignKeyViolation => 2021,
            Self::DatabaseUnhandled => 2099,

            Self::StorageError => 3001,
        }
    }

    /// Message used when the error carries none of its own
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ValidationError => "Request validation failed",
            Self::InvalidUuid => "Invalid UUID format",
            Self::NotFound => "Resource not found",
            Self::Unauthorized => "Authentication required",
            Self::Conflict => "Resource already exists",
            Self::JsonExtraction => "Failed to parse request body",
            Self::InvalidMultipart => "Failed to parse multipart request body",
            Self::BadRequest => "Bad request",
            Self::InternalError => "An internal server error occurred",
            Self::DatabaseError => "Database error occurred",
            Self::DatabaseConnection => "Database connection error",
            Self::DatabasePoolTimeout => "Database connection pool timed out",
            Self::DatabaseUniqueViolation => "Resource already exists",
            Self::DatabaseForeignKeyViolation => "Referenced resource does not exist",
            Self::DatabaseUnhandled => "Unhandled database error",
            Self::StorageError => "Failed to store uploaded media",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_name_matches_as_str() {
        for code in [
            ErrorCode::ValidationError,
            ErrorCode::InvalidMultipart,
            ErrorCode::DatabaseUniqueViolation,
            ErrorCode::StorageError,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
            assert_eq!(serde_json::from_str::<ErrorCode>(&json).unwrap(), code);
            assert_eq!(code.to_string(), code.as_str());
        }
    }

    #[test]
    fn numeric_codes_follow_ranges() {
        assert_eq!(ErrorCode::ValidationError.code(), 1001);
        assert_eq!(ErrorCode::DatabaseUniqueViolation.code(), 2020);
        assert_eq!(ErrorCode::StorageError.code(), 3001);
        assert_eq!(
            ErrorCode::InvalidMultipart.default_message(),
            "Failed to parse multipart request body"
        );
    }
}
