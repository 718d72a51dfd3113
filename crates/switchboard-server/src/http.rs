//! The diagnostic HTTP endpoint: `GET /stage1?caller=&called=`
//! returns the same data as the control channel's `call.route`, as a
//! structured document intended for tests and operator inspection.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::dispatcher::Dispatcher;
use crate::error::AppError;
use crate::metrics::MetricsSnapshot;

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    let state = AppState { dispatcher };
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/stage1", get(stage1))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.dispatcher.metrics().snapshot())
}

#[derive(Debug, Deserialize)]
struct Stage1Query {
    caller: String,
    called: String,
    #[serde(default)]
    call_id: Option<String>,
}

/// Never returns a non-2xx status: a failed computation is reported through
/// `routing_status`/`routing_status_details` in the body, with
/// whatever partial tree was available for inspection.
async fn stage1(
    State(state): State<AppState>,
    Query(query): Query<Stage1Query>,
) -> Result<Json<crate::dispatcher::DiagnosticResult>, AppError> {
    let result = state
        .dispatcher
        .diagnose(&query.caller, &query.called, query.call_id)
        .await;
    Ok(Json(result))
}
