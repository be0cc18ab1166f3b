//! Shared handles built once at startup and cloned into routes and middleware.

use crate::cache::DistributedCache;
use crate::config::TenancyConfig;
use crate::database::Database;
use crate::directory::{DirectoryOptions, TenantDirectory};
use crate::error::ConfigError;
use crate::middleware::{CorsGate, CorsOptions, TenantGate};
use crate::resolver::SchemaResolver;
use crate::store::{PgTenantStore, TenantStore};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct TenancyState {
    pub db: Database,
    pub directory: Arc<TenantDirectory>,
    pub tenant_gate: Arc<TenantGate>,
    pub cors_gate: Arc<CorsGate>,
}

impl TenancyState {
    /// Directory, resolver chain and gates over the Postgres tenant store.
    /// `db` must have `Tenant` registered as a main-scoped entity.
    pub fn new(
        db: Database,
        cache: Option<Arc<dyn DistributedCache>>,
        config: &TenancyConfig,
    ) -> Result<Self, ConfigError> {
        let store = Arc::new(PgTenantStore::new(db.clone()));
        Self::with_store(db, store, cache, config)
    }

    pub fn with_store(
        db: Database,
        store: Arc<dyn TenantStore>,
        cache: Option<Arc<dyn DistributedCache>>,
        config: &TenancyConfig,
    ) -> Result<Self, ConfigError> {
        let l2 = cache.is_some();
        let directory = Arc::new(TenantDirectory::new(
            store,
            cache,
            DirectoryOptions {
                ttl: config.cache_ttl,
                key_prefix: config.cache_key_prefix.clone(),
            },
        ));
        let resolver = SchemaResolver::new(directory.clone(), &config.tenant_header, &config.resolve_order)?;
        let tenant_gate = TenantGate::new(resolver, db.main_schema(), &config.tenant_header)?;
        let cors_gate = CorsGate::new(
            directory.clone(),
            CorsOptions {
                ttl: config.cors_ttl,
                max_age: config.cors_max_age,
            },
        );
        tracing::info!(
            main_schema = db.main_schema(),
            tenant_header = %config.tenant_header,
            l2,
            "tenancy initialised"
        );
        Ok(TenancyState {
            db,
            directory,
            tenant_gate: Arc::new(tenant_gate),
            cors_gate: Arc::new(cors_gate),
        })
    }
}
