//! Route builders and the tenancy layer stack.

pub mod common;
pub mod tenant;

pub use common::health_routes;
pub use tenant::tenant_routes;

use crate::middleware::{cors_gate, tenant_gate};
use crate::state::TenancyState;
use axum::{middleware::from_fn_with_state, Router};

/// Wrap `router` with the CORS gate (outer) and the tenant request gate (inner).
pub fn with_tenancy(router: Router, state: &TenancyState) -> Router {
    router
        .layer(from_fn_with_state(state.tenant_gate.clone(), tenant_gate))
        .layer(from_fn_with_state(state.cors_gate.clone(), cors_gate))
}
