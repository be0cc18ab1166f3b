//! Schema router: rewrites every statement's table to `"<schema>"."<table>"`.

use crate::error::DataError;
use crate::sql::builder::{qualified_table, Statement, StatementKind};
use crate::sql::hooks::{HookContext, HookRegistry, StatementHook};
use crate::tenant::Scope;
use std::sync::Arc;

pub const SCHEMA_ROUTER: &str = "schema-router";

/// Main-scoped entities go to the main schema; tenant-scoped ones to the request's schema,
/// or the main schema when the session carries no tenant.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchemaRouter;

impl SchemaRouter {
    /// Register the router as a pre-hook for every statement kind.
    pub fn install(hooks: &mut HookRegistry) -> Result<(), DataError> {
        let router: Arc<dyn StatementHook> = Arc::new(SchemaRouter);
        for kind in StatementKind::ALL {
            hooks.register(kind, router.clone())?;
        }
        Ok(())
    }
}

impl StatementHook for SchemaRouter {
    fn name(&self) -> &'static str {
        SCHEMA_ROUTER
    }

    fn before(&self, ctx: &HookContext<'_>, stmt: &mut Statement) {
        if stmt.table_expr.is_some() {
            return;
        }

        let scope = ctx.entity.map(|e| e.scope).unwrap_or_default();

        let base = ctx
            .entity
            .and_then(|e| e.table_base.clone())
            .or_else(|| stmt.table.clone().filter(|t| !t.is_empty()))
            .or_else(|| ctx.entity.and_then(|e| e.table.clone()));
        let Some(base) = base.filter(|b| !b.is_empty()) else {
            return;
        };
        if base.contains('.') {
            return;
        }

        let schema = match scope {
            Scope::Main => ctx.main_schema,
            Scope::Tenant => ctx
                .tenant
                .map(|t| t.schema.as_str())
                .filter(|s| !s.is_empty())
                .unwrap_or(ctx.main_schema),
        };

        stmt.table_expr = Some(qualified_table(schema, &base));
    }
}
