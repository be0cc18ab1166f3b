//! Resolver chain: strategies tried in configured order until one yields a schema.
//! Soft failures move on to the next strategy; hard failures stop the chain.

mod domain;
mod header;

pub use domain::{host_from_parts, DomainResolver, X_FORWARDED_HOST};
pub use header::{HeaderResolver, DEFAULT_TENANT_HEADER};

use crate::context::ResolvedSchema;
use crate::directory::TenantDirectory;
use crate::error::{ConfigError, ResolveError};
use crate::tenant::{is_safe_ident, Tenant};
use async_trait::async_trait;
use axum::http::request::Parts;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait SchemaStrategy: Send + Sync {
    async fn resolve(&self, parts: &Parts) -> Result<ResolvedSchema, ResolveError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyKind {
    Header,
    Domain,
}

impl StrategyKind {
    pub const DEFAULT_ORDER: [StrategyKind; 2] = [StrategyKind::Header, StrategyKind::Domain];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Header => "header",
            StrategyKind::Domain => "domain",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "header" => Ok(StrategyKind::Header),
            "domain" => Ok(StrategyKind::Domain),
            _ => Err(ConfigError::UnknownStrategy(s.trim().to_string())),
        }
    }
}

/// Parse a comma-separated order such as `header,domain`. Blank means the default order.
pub fn parse_order(s: &str) -> Result<Vec<StrategyKind>, ConfigError> {
    let order = s
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(StrategyKind::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    check_unique(&order)?;
    Ok(order)
}

fn check_unique(order: &[StrategyKind]) -> Result<(), ConfigError> {
    for (i, kind) in order.iter().enumerate() {
        if order[..i].contains(kind) {
            return Err(ConfigError::DuplicateStrategy(kind.as_str().to_string()));
        }
    }
    Ok(())
}

/// Normalized, validated schema of a directory hit.
pub(crate) fn schema_of(tenant: &Tenant) -> Result<String, ResolveError> {
    let schema = tenant.schema_name().ok_or(ResolveError::SchemaInvalid)?;
    if !is_safe_ident(&schema) {
        return Err(ResolveError::SchemaInvalid);
    }
    Ok(schema)
}

pub struct SchemaResolver {
    strategies: Vec<(StrategyKind, Arc<dyn SchemaStrategy>)>,
}

impl SchemaResolver {
    /// Build the chain. An empty `order` means header then domain.
    pub fn new(
        directory: Arc<TenantDirectory>,
        header: &str,
        order: &[StrategyKind],
    ) -> Result<Self, ConfigError> {
        let order = if order.is_empty() {
            &StrategyKind::DEFAULT_ORDER[..]
        } else {
            order
        };
        check_unique(order)?;
        let strategies = order
            .iter()
            .map(|kind| {
                let strategy: Arc<dyn SchemaStrategy> = match kind {
                    StrategyKind::Header => Arc::new(HeaderResolver::new(directory.clone(), header)),
                    StrategyKind::Domain => Arc::new(DomainResolver::new(directory.clone())),
                };
                (*kind, strategy)
            })
            .collect();
        Ok(SchemaResolver { strategies })
    }

    pub fn order(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|(k, _)| *k).collect()
    }

    pub async fn resolve(&self, parts: &Parts) -> Result<ResolvedSchema, ResolveError> {
        let mut last = None;
        for (kind, strategy) in &self.strategies {
            match strategy.resolve(parts).await {
                Ok(resolved) => return Ok(resolved),
                Err(e) if e.is_soft() => {
                    tracing::debug!(strategy = kind.as_str(), error = %e, "resolver miss");
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or(ResolveError::TenantNotFound))
    }
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver").field("order", &self.order()).finish()
    }
}
