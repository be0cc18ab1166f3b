//! Axum middleware: the CORS allow-list gate (outer) and the tenant request gate (inner).

pub mod cors;
pub mod tenant;

pub use cors::{cors_gate, AllowedDomain, CorsGate, CorsOptions};
pub use tenant::{tenant_gate, TenantGate, X_TENANT_RESOLVED_BY};
