mod query;
mod status;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use query::{QueryRequest, QueryResponse};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(query::query_router())
        .merge(status::status_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
