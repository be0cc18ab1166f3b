//! Entity descriptors and per-statement-kind pre-hooks run by every session before rendering.

use crate::context::TenantContext;
use crate::error::DataError;
use crate::sql::builder::{ModelRef, Statement, StatementKind};
use crate::tenant::Scope;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// How one entity type maps to a physical table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub scope: Scope,
    /// Explicit base name; wins over the statement's own table name.
    pub table_base: Option<String>,
    /// Table name the entity is modelled on, used when the statement names none.
    pub table: Option<String>,
}

impl EntityDescriptor {
    pub fn main(table: &str) -> Self {
        EntityDescriptor {
            scope: Scope::Main,
            table_base: None,
            table: Some(table.to_string()),
        }
    }

    pub fn tenant(table: &str) -> Self {
        EntityDescriptor {
            scope: Scope::Tenant,
            table_base: None,
            table: Some(table.to_string()),
        }
    }

    pub fn with_table_base(mut self, base: &str) -> Self {
        self.table_base = Some(base.to_string());
        self
    }
}

/// Descriptors keyed by Rust type. Built once at startup.
#[derive(Clone, Debug, Default)]
pub struct EntityRegistry {
    by_type: HashMap<TypeId, (&'static str, EntityDescriptor)>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: 'static>(&mut self, descriptor: EntityDescriptor) -> Result<(), DataError> {
        let model = ModelRef::of::<T>();
        if self.by_type.contains_key(&model.id) {
            return Err(DataError::DuplicateEntity(model.name));
        }
        self.by_type.insert(model.id, (model.name, descriptor));
        Ok(())
    }

    pub fn get(&self, model: &ModelRef) -> Option<&EntityDescriptor> {
        self.by_type.get(&model.id).map(|(_, d)| d)
    }
}

/// What a hook sees besides the statement itself.
#[derive(Clone, Copy, Debug)]
pub struct HookContext<'a> {
    pub tenant: Option<&'a TenantContext>,
    pub entity: Option<&'a EntityDescriptor>,
    pub main_schema: &'a str,
}

pub trait StatementHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn before(&self, ctx: &HookContext<'_>, stmt: &mut Statement);
}

/// Ordered pre-hooks per statement kind.
#[derive(Clone, Default)]
pub struct HookRegistry {
    by_kind: HashMap<StatementKind, Vec<Arc<dyn StatementHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: StatementKind, hook: Arc<dyn StatementHook>) -> Result<(), DataError> {
        let hooks = self.by_kind.entry(kind).or_default();
        if hooks.iter().any(|h| h.name() == hook.name()) {
            return Err(DataError::DuplicateHook {
                kind: kind.as_str(),
                name: hook.name(),
            });
        }
        hooks.push(hook);
        Ok(())
    }

    pub fn run(&self, ctx: &HookContext<'_>, stmt: &mut Statement) {
        if let Some(hooks) = self.by_kind.get(&stmt.kind) {
            for hook in hooks {
                hook.before(ctx, stmt);
            }
        }
    }

    pub fn names(&self, kind: StatementKind) -> Vec<&'static str> {
        self.by_kind
            .get(&kind)
            .map(|hooks| hooks.iter().map(|h| h.name()).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for kind in StatementKind::ALL {
            map.entry(&kind.as_str(), &self.names(kind));
        }
        map.finish()
    }
}
