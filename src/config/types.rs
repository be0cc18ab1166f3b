//! Runtime configuration for the tenancy layer and the demo server.

use crate::middleware::cors::{DEFAULT_CORS_TTL, DEFAULT_MAX_AGE};
use crate::directory::{DEFAULT_KEY_PREFIX, DEFAULT_TTL};
use crate::resolver::{StrategyKind, DEFAULT_TENANT_HEADER};
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/tenancy";
pub const DEFAULT_MAIN_SCHEMA: &str = "main";
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenancyConfig {
    pub database_url: String,
    /// `None` disables the distributed (L2) tenant cache.
    pub redis_url: Option<String>,
    pub main_schema: String,
    pub tenant_header: String,
    pub resolve_order: Vec<StrategyKind>,
    pub cache_ttl: Duration,
    pub cache_key_prefix: String,
    pub cors_ttl: Duration,
    pub cors_max_age: Duration,
    pub address: String,
    pub request_timeout: Duration,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        TenancyConfig {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            redis_url: None,
            main_schema: DEFAULT_MAIN_SCHEMA.to_string(),
            tenant_header: DEFAULT_TENANT_HEADER.to_string(),
            resolve_order: StrategyKind::DEFAULT_ORDER.to_vec(),
            cache_ttl: DEFAULT_TTL,
            cache_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            cors_ttl: DEFAULT_CORS_TTL,
            cors_max_age: DEFAULT_MAX_AGE,
            address: DEFAULT_ADDRESS.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
