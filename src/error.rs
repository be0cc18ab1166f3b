//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("unknown resolver strategy: {0} (expected header or domain)")]
    UnknownStrategy(String),
    #[error("resolver strategy listed twice: {0}")]
    DuplicateStrategy(String),
}

/// Data-access layer failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("invalid schema identifier: {0}")]
    InvalidSchema(String),
    #[error("entity already registered: {0}")]
    DuplicateEntity(&'static str),
    #[error("hook already registered for {kind}: {name}")]
    DuplicateHook { kind: &'static str, name: &'static str },
    #[error("statement has no table")]
    NoTable,
    #[error("update statement has no assignments")]
    EmptyUpdate,
}

/// Tenant record store failures. Never surfaced past the directory.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("store: {0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache connection: {0}")]
    Connection(String),
    #[error("cache command: {0}")]
    Command(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Command(e.to_string())
    }
}

/// The only failure the tenant directory reports: store and cache trouble collapse into it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("tenant not found")]
    NotFound,
}

/// Tenant resolution failures, classified soft (chain continues) or hard (chain aborts).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    #[error("tenant header missing")]
    HeaderMissing,
    #[error("invalid tenant")]
    TenantInvalid,
    #[error("tenant not found")]
    TenantNotFound,
    #[error("empty host")]
    HostEmpty,
    #[error("tenant not found by domain")]
    TenantNotFoundHost,
    #[error("invalid schema")]
    SchemaInvalid,
}

impl ResolveError {
    /// Soft errors let the chain try the next strategy.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            ResolveError::HeaderMissing
                | ResolveError::HostEmpty
                | ResolveError::TenantNotFound
                | ResolveError::TenantNotFoundHost
        )
    }

    /// Errors the request gate answers with the main schema instead of rejecting.
    pub fn falls_back_to_main(&self) -> bool {
        matches!(
            self,
            ResolveError::HeaderMissing | ResolveError::HostEmpty | ResolveError::TenantNotFoundHost
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::HeaderMissing => "TENANT_REQUIRED",
            ResolveError::TenantInvalid => "TENANT_INVALID",
            ResolveError::TenantNotFound => "TENANT_NOT_FOUND",
            ResolveError::TenantNotFoundHost => "TENANT_NOT_FOUND_BY_DOMAIN",
            ResolveError::HostEmpty => "HOST_EMPTY",
            ResolveError::SchemaInvalid => "SCHEMA_INVALID",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ResolveError::HeaderMissing | ResolveError::TenantInvalid | ResolveError::HostEmpty => {
                StatusCode::BAD_REQUEST
            }
            ResolveError::TenantNotFound | ResolveError::TenantNotFoundHost => StatusCode::NOT_FOUND,
            ResolveError::SchemaInvalid => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message.
    pub fn public_message(&self) -> &'static str {
        match self {
            ResolveError::HeaderMissing => "Missing tenant/domain",
            ResolveError::TenantInvalid => "Invalid tenant",
            ResolveError::TenantNotFound => "Tenant not found",
            ResolveError::TenantNotFoundHost => "Tenant not found for this host",
            ResolveError::HostEmpty => "Empty host",
            ResolveError::SchemaInvalid => "Invalid database schema",
        }
    }
}

/// Handler-level error. Internal detail is logged, never returned.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("tenant context missing")]
    MissingContext,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

pub(crate) fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        },
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        error_response(self.status(), self.code(), self.public_message())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Resolve(e) => e.into_response(),
            other => {
                tracing::error!(error = %other, "request failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal error")
            }
        }
    }
}
