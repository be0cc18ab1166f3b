//! Tenant record and identifier rules shared by the directory, resolvers and SQL layer.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Safe PostgreSQL identifier: letter or underscore, then letters/digits/underscore, at most 63 bytes.
static IDENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is valid")
});

/// True when `s` may be used as a schema name or tenant namespace in a statement.
pub fn is_safe_ident(s: &str) -> bool {
    IDENT.is_match(s)
}

/// Trimmed lowercase form used for every key and schema comparison.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// One isolated customer namespace, as stored in the main schema's `tenants` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: i64,
    #[sqlx(rename = "tenant")]
    pub namespace: String,
    pub schema: Option<String>,
    pub domain: Option<String>,
    pub is_active: bool,
    pub active_to: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn namespace_key(&self) -> String {
        normalize(&self.namespace)
    }

    /// Normalized domain, or None when unset or blank.
    pub fn domain_key(&self) -> Option<String> {
        self.domain.as_deref().map(normalize).filter(|d| !d.is_empty())
    }

    /// Normalized schema, or None when unset or blank. Not checked against the identifier pattern.
    pub fn schema_name(&self) -> Option<String> {
        self.schema.as_deref().map(normalize).filter(|s| !s.is_empty())
    }

    /// Active flag set and a non-empty schema: the directory's admission guard.
    pub fn is_routable(&self) -> bool {
        self.is_active && self.schema_name().is_some()
    }

    /// True once `now` is at or past `active_to`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.active_to.map(|to| now >= to).unwrap_or(false)
    }
}

/// Which data partition an entity lives in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scope {
    /// Routed to the schema resolved for the current request (main schema when none).
    #[default]
    Tenant,
    /// Always routed to the fixed main schema.
    Main,
}
