use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub input: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub result: String,
}

pub fn query_router() -> Router<AppState> {
    Router::new().route("/query", post(run_query))
}

/// Pipeline failures come back as `"Error: ..."` inside a 200 response; only a
/// crashed or overdue run is a 500.
async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    info!(input_chars = request.input.len(), "query received");

    let handler = state.handler();
    let input = request.input;
    let task = tokio::spawn(async move { handler.handle(&input).await });

    // On deadline the handle is dropped, which detaches the run instead of aborting it.
    let joined = match state.query_timeout() {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(timeout = ?limit, "query exceeded deadline");
                return Err(AppError::internal(format!(
                    "query did not finish within {limit:?}"
                )));
            }
        },
        None => task.await,
    };

    let result = joined.map_err(|err| {
        error!(error = %err, "query task crashed");
        AppError::internal(err)
    })?;

    info!(result_chars = result.len(), "query answered");
    Ok(Json(QueryResponse { result }))
}
