use super::{schema_of, SchemaStrategy};
use crate::context::{ResolvedBy, ResolvedSchema};
use crate::directory::TenantDirectory;
use crate::error::ResolveError;
use async_trait::async_trait;
use axum::http::request::Parts;
use std::sync::Arc;

pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Resolves the tenant whose domain matches the request host.
pub struct DomainResolver {
    directory: Arc<TenantDirectory>,
}

impl DomainResolver {
    pub fn new(directory: Arc<TenantDirectory>) -> Self {
        DomainResolver { directory }
    }
}

#[async_trait]
impl SchemaStrategy for DomainResolver {
    async fn resolve(&self, parts: &Parts) -> Result<ResolvedSchema, ResolveError> {
        let host = host_from_parts(parts);
        if host.is_empty() {
            return Err(ResolveError::HostEmpty);
        }

        let tenant = self
            .directory
            .get_by_domain(&host)
            .await
            .map_err(|_| ResolveError::TenantNotFoundHost)?;

        Ok(ResolvedSchema {
            schema: schema_of(&tenant)?,
            resolved_by: ResolvedBy::Domain,
        })
    }
}

/// Lowercased request host without port: `X-Forwarded-Host`, else `Host`, else the URI authority.
pub fn host_from_parts(parts: &Parts) -> String {
    let raw = header_value(parts, X_FORWARDED_HOST)
        .or_else(|| header_value(parts, "host"))
        .or_else(|| parts.uri.authority().map(|a| a.as_str()))
        .unwrap_or_default();
    strip_port(raw).to_lowercase()
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => &rest[..end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        // A second colon means a bare IPv6 address; leave it whole.
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}
