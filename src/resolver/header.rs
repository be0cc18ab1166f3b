use super::{schema_of, SchemaStrategy};
use crate::context::{ResolvedBy, ResolvedSchema};
use crate::directory::TenantDirectory;
use crate::error::ResolveError;
use crate::tenant::is_safe_ident;
use async_trait::async_trait;
use axum::http::request::Parts;
use std::sync::Arc;

pub const DEFAULT_TENANT_HEADER: &str = "X-Tenant";

/// Resolves the tenant namespace carried in a request header (`X-Tenant` by default).
pub struct HeaderResolver {
    header: String,
    directory: Arc<TenantDirectory>,
}

impl HeaderResolver {
    pub fn new(directory: Arc<TenantDirectory>, header: &str) -> Self {
        let header = header.trim();
        let header = if header.is_empty() {
            DEFAULT_TENANT_HEADER
        } else {
            header
        };
        HeaderResolver {
            header: header.to_string(),
            directory,
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }
}

#[async_trait]
impl SchemaStrategy for HeaderResolver {
    async fn resolve(&self, parts: &Parts) -> Result<ResolvedSchema, ResolveError> {
        let Some(raw) = parts.headers.get(self.header.as_str()) else {
            return Err(ResolveError::HeaderMissing);
        };
        // Present but not visible ASCII: never treated as absent.
        let namespace = raw.to_str().map_err(|_| ResolveError::TenantInvalid)?.trim();
        if namespace.is_empty() {
            return Err(ResolveError::HeaderMissing);
        }
        if !is_safe_ident(namespace) {
            return Err(ResolveError::TenantInvalid);
        }

        let tenant = self
            .directory
            .get_by_namespace(namespace)
            .await
            .map_err(|_| ResolveError::TenantNotFound)?;

        Ok(ResolvedSchema {
            schema: schema_of(&tenant)?,
            resolved_by: ResolvedBy::Header,
        })
    }
}
