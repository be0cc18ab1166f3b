//! Request gate: resolves the tenant schema for every request and stores it in request extensions.

use crate::context::{ResolvedBy, TenantContext};
use crate::error::{ConfigError, ResolveError};
use crate::resolver::{SchemaResolver, DEFAULT_TENANT_HEADER, X_FORWARDED_HOST};
use crate::tenant::{is_safe_ident, normalize};
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{HeaderName, HeaderValue, VARY};
use axum::http::request::Parts;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

pub const X_TENANT_RESOLVED_BY: &str = "x-tenant-resolved-by";

#[derive(Debug)]
pub struct TenantGate {
    resolver: SchemaResolver,
    main_schema: String,
    tenant_header: HeaderName,
}

impl TenantGate {
    pub fn new(resolver: SchemaResolver, main_schema: &str, tenant_header: &str) -> Result<Self, ConfigError> {
        let main_schema = normalize(main_schema);
        if !is_safe_ident(&main_schema) {
            return Err(ConfigError::Invalid {
                var: "DB_MAIN_SCHEMA",
                reason: format!("{:?} is not a valid schema name", main_schema),
            });
        }
        let header = tenant_header.trim();
        let header = if header.is_empty() { DEFAULT_TENANT_HEADER } else { header };
        let tenant_header = HeaderName::from_bytes(header.as_bytes()).map_err(|e| ConfigError::Invalid {
            var: "TENANT_HEADER",
            reason: e.to_string(),
        })?;
        Ok(TenantGate {
            resolver,
            main_schema,
            tenant_header,
        })
    }

    pub fn main_schema(&self) -> &str {
        &self.main_schema
    }

    /// Run the chain and apply the main-schema fallback. The final schema is re-validated.
    pub async fn resolve(&self, parts: &Parts) -> Result<TenantContext, ResolveError> {
        let (schema, resolved_by) = match self.resolver.resolve(parts).await {
            Ok(r) => (r.schema, r.resolved_by),
            Err(e) if e.falls_back_to_main() => {
                tracing::debug!(error = %e, "falling back to main schema");
                (self.main_schema.clone(), ResolvedBy::Default)
            }
            Err(e) => return Err(e),
        };

        let schema = normalize(&schema);
        if !is_safe_ident(&schema) {
            return Err(ResolveError::SchemaInvalid);
        }
        Ok(TenantContext::new(schema, resolved_by))
    }

    fn vary_for(&self, resolved_by: ResolvedBy) -> Vec<HeaderValue> {
        match resolved_by {
            ResolvedBy::Header => vec![HeaderValue::from(self.tenant_header.clone())],
            ResolvedBy::Domain => vec![
                HeaderValue::from_static("host"),
                HeaderValue::from_static(X_FORWARDED_HOST),
            ],
            ResolvedBy::Default => Vec::new(),
        }
    }
}

/// Axum middleware; install with `axum::middleware::from_fn_with_state(gate, tenant_gate)`.
pub async fn tenant_gate(State(gate): State<Arc<TenantGate>>, request: Request<Body>, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let ctx = match gate.resolve(&parts).await {
        Ok(ctx) => ctx,
        Err(e) => {
            if e.status().is_server_error() {
                tracing::warn!(code = e.code(), path = %parts.uri.path(), "tenant rejected");
            } else {
                tracing::info!(code = e.code(), path = %parts.uri.path(), "tenant rejected");
            }
            return e.into_response();
        }
    };
    tracing::debug!(schema = %ctx.schema, resolved_by = %ctx.resolved_by, "tenant resolved");

    let resolved_by = ctx.resolved_by;
    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(X_TENANT_RESOLVED_BY),
        HeaderValue::from_static(resolved_by.as_str()),
    );
    for value in gate.vary_for(resolved_by) {
        headers.append(VARY, value);
    }
    response
}
