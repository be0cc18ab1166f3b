//! Request-scoped tenant context: the resolved schema and which strategy produced it.

use serde::Serialize;
use std::fmt;

/// Strategy that produced the request's schema. Sent back as `X-Tenant-Resolved-By`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedBy {
    Header,
    Domain,
    Default,
}

impl ResolvedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedBy::Header => "header",
            ResolvedBy::Domain => "domain",
            ResolvedBy::Default => "default",
        }
    }
}

impl fmt::Display for ResolvedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one successful resolver strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSchema {
    pub schema: String,
    pub resolved_by: ResolvedBy,
}

/// Inserted into request extensions by the tenant gate; passed to `Database::session`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    pub schema: String,
    pub resolved_by: ResolvedBy,
}

impl TenantContext {
    pub fn new(schema: impl Into<String>, resolved_by: ResolvedBy) -> Self {
        TenantContext {
            schema: schema.into(),
            resolved_by,
        }
    }
}

impl From<ResolvedSchema> for TenantContext {
    fn from(r: ResolvedSchema) -> Self {
        TenantContext {
            schema: r.schema,
            resolved_by: r.resolved_by,
        }
    }
}
