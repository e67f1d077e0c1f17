use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

pub fn status_router() -> Router<AppState> {
    Router::new().route("/status", get(status))
}

async fn status() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}
