//! Tenant record store: the durable registry in the main schema's `tenants` table. Read-only here.

use crate::database::Database;
use crate::error::{DataError, StoreError};
use crate::sql::{quoted, Statement};
use crate::tenant::Tenant;
use async_trait::async_trait;

pub const TENANTS_TABLE: &str = "tenants";

const TENANT_COLUMNS: &[&str] = &[
    "id",
    "tenant",
    "schema",
    "domain",
    "is_active",
    "active_to",
    "updated_at",
];

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// `Ok(None)` when no row matches.
    async fn get_by_namespace(&self, namespace: &str) -> Result<Option<Tenant>, StoreError>;

    async fn get_by_domain(&self, domain: &str) -> Result<Option<Tenant>, StoreError>;

    /// Domains of active tenants, raw as stored (may carry a `*.` wildcard prefix).
    async fn list_domains(&self) -> Result<Vec<String>, StoreError>;
}

/// Reads tenants through a main-schema session; `Tenant` must be registered as a main-scoped entity.
#[derive(Clone, Debug)]
pub struct PgTenantStore {
    db: Database,
}

impl PgTenantStore {
    pub fn new(db: Database) -> Self {
        PgTenantStore { db }
    }

    fn select_one(column: &str, value: &str) -> Statement {
        Statement::query()
            .model::<Tenant>()
            .columns(TENANT_COLUMNS)
            .filter(column, value)
            .predicate("deleted_at IS NULL")
            .order_by("id")
            .limit(1)
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn get_by_namespace(&self, namespace: &str) -> Result<Option<Tenant>, StoreError> {
        let stmt = Self::select_one("tenant", namespace);
        Ok(self.db.session(None).fetch_optional_as::<Tenant>(stmt).await?)
    }

    async fn get_by_domain(&self, domain: &str) -> Result<Option<Tenant>, StoreError> {
        let stmt = Self::select_one("domain", domain);
        Ok(self.db.session(None).fetch_optional_as::<Tenant>(stmt).await?)
    }

    async fn list_domains(&self) -> Result<Vec<String>, StoreError> {
        let stmt = Statement::query()
            .model::<Tenant>()
            .columns(&["domain"])
            .predicate("is_active = true")
            .predicate("deleted_at IS NULL")
            .predicate("domain IS NOT NULL")
            .predicate("domain <> ''");
        let rows: Vec<(String,)> = self.db.session(None).fetch_all_as(stmt).await?;
        Ok(rows.into_iter().map(|(d,)| d).collect())
    }
}

/// Create the main schema and the tenants registry table if missing. Namespace, schema and domain
/// are stored lowercase and unique among live rows.
pub async fn ensure_tenants_table(db: &Database) -> Result<(), DataError> {
    let schema = quoted(db.main_schema());
    let table = format!("{}.{}", schema, quoted(TENANTS_TABLE));
    let statements = [
        format!("CREATE SCHEMA IF NOT EXISTS {}", schema),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                tenant TEXT NOT NULL,
                schema TEXT,
                domain TEXT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                active_to TIMESTAMPTZ,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMPTZ
            )
            "#,
            table
        ),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS ux_tenants_tenant_alive ON {} (tenant) WHERE deleted_at IS NULL",
            table
        ),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS ux_tenants_schema_alive ON {} (schema) WHERE deleted_at IS NULL AND schema IS NOT NULL",
            table
        ),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS ux_tenants_domain_alive ON {} (domain) WHERE deleted_at IS NULL AND domain IS NOT NULL",
            table
        ),
        format!("CREATE INDEX IF NOT EXISTS ix_tenants_active_to ON {} (active_to)", table),
    ];
    for sql in &statements {
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(sql).execute(db.pool()).await?;
    }
    Ok(())
}
