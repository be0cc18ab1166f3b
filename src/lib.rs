//! Schema-per-tenant routing for axum services on PostgreSQL.
//!
//! Each request is resolved to a tenant schema (header first, then domain, falling back to the
//! main schema), looked up through a two-tier tenant directory, and every statement issued through
//! [`Database::session`] is rewritten to that schema unless its entity is main-scoped.

pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod directory;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod resolver;
pub mod response;
pub mod routes;
pub mod sql;
pub mod state;
pub mod store;
pub mod tenant;

pub use cache::{DistributedCache, RedisCache};
pub use config::TenancyConfig;
pub use context::{ResolvedBy, ResolvedSchema, TenantContext};
pub use database::{Database, Session};
pub use directory::{DirectoryOptions, TenantDirectory};
pub use error::{AppError, CacheError, ConfigError, DataError, DirectoryError, ResolveError, StoreError};
pub use middleware::{CorsGate, CorsOptions, TenantGate, X_TENANT_RESOLVED_BY};
pub use resolver::{SchemaResolver, StrategyKind};
pub use routes::{health_routes, tenant_routes, with_tenancy};
pub use sql::{EntityDescriptor, EntityRegistry, Statement, StatementKind};
pub use state::TenancyState;
pub use store::{ensure_tenants_table, PgTenantStore, TenantStore, TENANTS_TABLE};
pub use tenant::{Scope, Tenant};
