pub mod download;
pub mod transactions;
pub mod webhook;

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(transactions::router())
        .merge(webhook::router())
        .merge(download::router())
}
