//! Tenant introspection: which schema the gate routed this request to.

use crate::context::TenantContext;
use crate::response::success_one_ok;
use axum::response::IntoResponse;

/// GET /tenant: `{"data":{"schema":..,"resolved_by":..}}`.
pub async fn current_tenant(ctx: TenantContext) -> impl IntoResponse {
    success_one_ok(ctx)
}
