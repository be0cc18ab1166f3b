//! Demo server: tenant-aware `/tenant` and `/orders` behind the CORS and tenant gates.
//!
//! Run from repo root: `cargo run -p example-consumer`

use axum::{extract::State, routing::get, Router};
use schema_tenancy::response::success_one_ok;
use schema_tenancy::{
    ensure_tenants_table, health_routes, tenant_routes, with_tenancy, AppError, Database,
    DistributedCache, EntityDescriptor, EntityRegistry, RedisCache, Statement, TenancyConfig,
    TenancyState, Tenant, TenantContext, TENANTS_TABLE,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Lives in each tenant schema.
#[derive(Serialize, sqlx::FromRow)]
struct Order {
    id: i64,
    reference: String,
    total_cents: i64,
}

async fn list_orders(
    State(db): State<Database>,
    ctx: TenantContext,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let stmt = Statement::query()
        .model::<Order>()
        .columns(&["id", "reference", "total_cents"])
        .order_by("id")
        .limit(100);
    let orders: Vec<Order> = db.session(Some(&ctx)).fetch_all_as(stmt).await?;
    Ok(success_one_ok(orders))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("schema_tenancy=info,tower_http=info")),
        )
        .init();

    let config = TenancyConfig::from_env()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    let mut entities = EntityRegistry::new();
    entities.register::<Tenant>(EntityDescriptor::main(TENANTS_TABLE))?;
    entities.register::<Order>(EntityDescriptor::tenant("orders"))?;
    let db = Database::new(pool, &config.main_schema, entities)?;
    ensure_tenants_table(&db).await?;

    let cache: Option<Arc<dyn DistributedCache>> = match &config.redis_url {
        Some(url) => Some(Arc::new(RedisCache::connect(url).await?)),
        None => None,
    };
    let state = TenancyState::new(db.clone(), cache, &config)?;

    let orders = Router::new()
        .route("/orders", get(list_orders))
        .with_state(db);
    let tenant_api = with_tenancy(tenant_routes().merge(orders), &state);

    let app = Router::new()
        .merge(health_routes(state))
        .merge(tenant_api)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&config.address).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
