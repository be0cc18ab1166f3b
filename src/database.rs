//! Shared PostgreSQL handle and per-request sessions. Every statement goes through the
//! registered pre-hooks (the schema router among them) before it is rendered and executed.

use crate::context::TenantContext;
use crate::error::DataError;
use crate::sql::{
    quoted, EntityRegistry, HookContext, HookRegistry, PgBindValue, QueryBuf, SchemaRouter, Statement,
};
use crate::tenant::{is_safe_ident, normalize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
    main_schema: String,
    entities: Arc<EntityRegistry>,
    hooks: Arc<HookRegistry>,
}

impl Database {
    /// Validates the main schema and installs the schema router for every statement kind.
    pub fn new(pool: PgPool, main_schema: &str, entities: EntityRegistry) -> Result<Self, DataError> {
        let mut hooks = HookRegistry::new();
        SchemaRouter::install(&mut hooks)?;
        Self::with_hooks(pool, main_schema, entities, hooks)
    }

    /// Same as `new` but with a caller-built hook registry (the caller installs the router).
    pub fn with_hooks(
        pool: PgPool,
        main_schema: &str,
        entities: EntityRegistry,
        hooks: HookRegistry,
    ) -> Result<Self, DataError> {
        let main_schema = normalize(main_schema);
        if !is_safe_ident(&main_schema) {
            return Err(DataError::InvalidSchema(main_schema));
        }
        Ok(Database {
            pool,
            main_schema,
            entities: Arc::new(entities),
            hooks: Arc::new(hooks),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn main_schema(&self) -> &str {
        &self.main_schema
    }

    /// Session bound to the request's tenant, or to the main schema when `tenant` is None.
    pub fn session<'a>(&'a self, tenant: Option<&'a TenantContext>) -> Session<'a> {
        Session { db: self, tenant }
    }
}

pub struct Session<'a> {
    db: &'a Database,
    tenant: Option<&'a TenantContext>,
}

impl<'a> Session<'a> {
    pub fn tenant(&self) -> Option<&'a TenantContext> {
        self.tenant
    }

    /// `SET LOCAL search_path` for this session: tenant, main, public (or main, public).
    pub fn search_path(&self) -> String {
        let main = quoted(&self.db.main_schema);
        match self.tenant.map(|t| normalize(&t.schema)).filter(|s| !s.is_empty()) {
            Some(tenant) if tenant != self.db.main_schema => {
                format!("SET LOCAL search_path = {}, {}, public", quoted(&tenant), main)
            }
            _ => format!("SET LOCAL search_path = {}, public", main),
        }
    }

    /// Run pre-hooks for the statement's kind and render it.
    pub fn prepare(&self, mut stmt: Statement) -> Result<QueryBuf, DataError> {
        let entity = stmt.model.as_ref().and_then(|m| self.db.entities.get(m));
        let ctx = HookContext {
            tenant: self.tenant,
            entity,
            main_schema: &self.db.main_schema,
        };
        self.db.hooks.run(&ctx, &mut stmt);
        if stmt.table.is_none() && stmt.table_expr.is_none() {
            stmt.table = entity.and_then(|e| e.table_base.clone().or_else(|| e.table.clone()));
        }
        let q = stmt.render()?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        Ok(q)
    }

    pub async fn fetch_all_as<T>(&self, stmt: Statement) -> Result<Vec<T>, DataError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let q = self.prepare(stmt)?;
        let mut tx = self.db.pool.begin().await?;
        sqlx::query(&self.search_path()).execute(&mut *tx).await?;
        let mut query = sqlx::query_as::<_, T>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(rows)
    }

    pub async fn fetch_optional_as<T>(&self, stmt: Statement) -> Result<Option<T>, DataError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let q = self.prepare(stmt)?;
        let mut tx = self.db.pool.begin().await?;
        sqlx::query(&self.search_path()).execute(&mut *tx).await?;
        let mut query = sqlx::query_as::<_, T>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&mut *tx).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Execute without reading rows. Returns rows affected.
    pub async fn execute(&self, stmt: Statement) -> Result<u64, DataError> {
        let q = self.prepare(stmt)?;
        let mut tx = self.db.pool.begin().await?;
        sqlx::query(&self.search_path()).execute(&mut *tx).await?;
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let result = query.execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResolvedBy;
    use crate::sql::EntityDescriptor;
    use crate::tenant::Tenant;
    use sqlx::postgres::PgPoolOptions;

    struct Order;

    fn database() -> Database {
        // Lazy pool: never connects unless a statement is executed.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/tenancy")
            .unwrap();
        let mut entities = EntityRegistry::new();
        entities.register::<Tenant>(EntityDescriptor::main("tenants")).unwrap();
        entities.register::<Order>(EntityDescriptor::tenant("orders")).unwrap();
        Database::new(pool, "Main", entities).unwrap()
    }

    #[tokio::test]
    async fn test_prepare_routes_by_entity_scope() {
        let db = database();
        let acme = TenantContext::new("acme_prod", ResolvedBy::Header);
        let session = db.session(Some(&acme));

        let q = session
            .prepare(Statement::query().model::<Order>().filter("id", 1))
            .unwrap();
        assert_eq!(q.sql, "SELECT * FROM \"acme_prod\".\"orders\" WHERE \"id\" = $1");

        let q = session
            .prepare(Statement::query().model::<Tenant>().filter("tenant", "acme"))
            .unwrap();
        assert_eq!(q.sql, "SELECT * FROM \"main\".\"tenants\" WHERE \"tenant\" = $1");
    }

    #[tokio::test]
    async fn test_search_path() {
        let db = database();
        assert_eq!(db.main_schema(), "main");
        assert_eq!(db.session(None).search_path(), "SET LOCAL search_path = \"main\", public");
        let acme = TenantContext::new("acme_prod", ResolvedBy::Header);
        assert_eq!(
            db.session(Some(&acme)).search_path(),
            "SET LOCAL search_path = \"acme_prod\", \"main\", public"
        );
    }

    #[tokio::test]
    async fn test_rejects_unsafe_main_schema() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/tenancy")
            .unwrap();
        let err = Database::new(pool, "main; drop", EntityRegistry::new()).unwrap_err();
        assert!(matches!(err, DataError::InvalidSchema(_)));
    }
}
