use crate::state::{authorized, RpcState};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use edgepay_pipeline::PipelineResponse;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

/// Builds the HTTP router: `POST /authorize` plus the operational
/// endpoints (`health`, `ready`, `metrics`, `version`, `tx`).
pub fn router(state: Arc<RpcState>) -> Router {
    Router::new()
        .route("/authorize", post(authorize))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .route("/version", get(version))
        .route("/tx", get(lookup_tx))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
}

/// Runs the HTTP server on `addr` until the process is killed. Each
/// request is handed to `tokio::task::spawn_blocking` because the shared
/// pipeline does blocking I/O (Postgres, the clearing RPC) internally.
pub async fn serve(state: Arc<RpcState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    log::info!(target: "edgepay_rpc", "http listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))
}

/// Submits the request to the shared worker pool rather
/// than calling the pipeline inline, so a saturated pool fails fast with
/// `server_busy` instead of piling up unbounded async tasks.
async fn authorize(State(state): State<Arc<RpcState>>, body: Bytes) -> impl IntoResponse {
    let body = String::from_utf8_lossy(&body).into_owned();
    let (tx, rx) = tokio::sync::oneshot::channel();
    let pipeline = Arc::clone(&state.pipeline);
    let submitted = state.pool.submit(move || {
        let response = pipeline.handle(&body);
        let _ = tx.send(response);
    });

    if submitted.is_err() {
        state.metrics.incr_server_busy();
        return Json(PipelineResponse::declined("server_busy")).into_response();
    }

    match rx.await {
        Ok(response) => Json(response).into_response(),
        Err(_) => Json(PipelineResponse::declined("server_busy")).into_response(),
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ready(State(state): State<Arc<RpcState>>) -> impl IntoResponse {
    let db = Arc::clone(&state.db);
    let ok = tokio::task::spawn_blocking(move || db.is_ready())
        .await
        .unwrap_or(false);
    if ok {
        (StatusCode::OK, Json(serde_json::json!({ "ready": true })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "ready": false })),
        )
    }
}

async fn metrics(headers: HeaderMap, State(state): State<Arc<RpcState>>) -> impl IntoResponse {
    if !authorized(&state.config, bearer_token(&headers).as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(serde_json::Value::Null)).into_response();
    }
    (StatusCode::OK, Json(state.metrics.snapshot())).into_response()
}

async fn version(State(state): State<Arc<RpcState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": state.service_name,
        "version": state.service_version,
    }))
}

#[derive(Debug, Deserialize)]
struct TxQuery {
    request_id: String,
}

#[derive(Debug, Serialize)]
struct TxNotFound {
    error: &'static str,
}

async fn lookup_tx(
    headers: HeaderMap,
    State(state): State<Arc<RpcState>>,
    Query(query): Query<TxQuery>,
) -> impl IntoResponse {
    if !authorized(&state.config, bearer_token(&headers).as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(serde_json::Value::Null)).into_response();
    }
    let db = Arc::clone(&state.db);
    let result = tokio::task::spawn_blocking(move || db.lookup_by_request_id(&query.request_id))
        .await
        .expect("db lookup task panicked");

    match result {
        Ok(Some(record)) => (StatusCode::OK, Json(serde_json::json!(record))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(TxNotFound { error: "not_found" }),
        )
            .into_response(),
        Err(err) => {
            log::warn!(target: "edgepay_rpc", "tx lookup failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TxNotFound { error: "lookup_failed" }),
            )
                .into_response()
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn bearer_token_strips_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn bearer_token_absent_without_header() {
        let headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
    }
}
