use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;
use tracing::error;

use super::AppState;
use crate::{metrics, Error};

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn list_pods(State(state): State<AppState>) -> Response {
    match state.provider.list_pods(&state.cancel).await {
        Ok(pods) => Json(pods).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_pod(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    match state.provider.get_pod(&namespace, &name, &state.cancel).await {
        Ok(Some(pod)) => Json(pod).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("pod {}/{} not found", namespace, name) })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn node(State(state): State<AppState>) -> Response {
    Json(state.provider.node()).into_response()
}

pub async fn metrics() -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
        .into_response()
}

fn error_response(e: Error) -> Response {
    error!("Request failed: {}", e);
    let status = match &e {
        Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        Error::BackendUnavailable { .. } | Error::Transport(_) | Error::Http { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}
