//! Tenant-aware routes. Mount behind `with_tenancy` so the context is present.

use crate::handlers::tenant::current_tenant;
use axum::{routing::get, Router};

pub fn tenant_routes() -> Router {
    Router::new().route("/tenant", get(current_tenant))
}
