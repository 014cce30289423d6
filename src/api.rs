//! Read-only query API
//!
//! Two endpoints, both delegating straight to the shared state store:
//!
//! - `GET /data` - the latest reading as a JSON object (`{}` when none yet)
//! - `GET /history?n=<int>` - the last n readings (default 200), oldest first
//!
//! Query callers never see ingestion problems; a failing pipeline just means
//! stale or empty data here.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::store::StateStore;

/// Shared state passed to all handlers
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<StateStore>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    n: Option<usize>,
}

/// Build the query router
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/data", get(get_data))
        .route("/history", get(get_history))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// GET /data
///
/// Latest reading's raw payload, or an empty object before the first reading
async fn get_data(State(state): State<ApiState>) -> Json<Value> {
    let latest = state.store.latest().await;
    Json(latest.map(|reading| reading.raw).unwrap_or_else(|| json!({})))
}

/// GET /history?n=<int>
///
/// Last `min(n, len)` readings in arrival order, oldest first
async fn get_history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Value> {
    let readings = state.store.history(query.n).await;
    Json(Value::Array(
        readings.into_iter().map(|reading| reading.raw).collect(),
    ))
}

/// Bind and spawn the API server in a background task.
///
/// Returns the bound local address. A bind failure is fatal to startup; this
/// is the only unrecoverable error in the process.
pub async fn spawn_api_server(bind_addr: SocketAddr, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting query API on {}", bind_addr);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("query API listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("query API server error: {}", e);
        }
    });

    Ok(addr)
}
