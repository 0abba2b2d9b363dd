//! RPC server - every backend procedure behind `POST /rpc`

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::backend::Backend;
use crate::error::CoachError;
use crate::rpc::{RpcCall, RpcResponse};

pub fn router(backend: Backend) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(backend)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn handle_rpc(State(backend): State<Backend>, body: String) -> Response {
    let outcome = match RpcCall::parse(&body) {
        Ok(call) => {
            let method = call.method();
            // Store access is blocking (SQLite, file I/O, bcrypt)
            let result = tokio::task::spawn_blocking(move || call.execute(&backend))
                .await
                .unwrap_or_else(|e| {
                    error!("RPC worker for {} failed: {}", method, e);
                    Err(CoachError::Storage("request worker failed".to_string()))
                });
            if let Err(e) = &result {
                warn!("{} failed: {}", method, e);
            }
            result
        }
        Err(e) => {
            warn!("Rejected RPC request: {}", e);
            Err(e)
        }
    };

    let status = match &outcome {
        Ok(_) => StatusCode::OK,
        Err(e) => StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    };
    (status, Json(RpcResponse::from_outcome(outcome))).into_response()
}

/// Bind and serve until Ctrl-C
pub async fn serve(addr: std::net::SocketAddr, backend: Backend) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("RPC server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(backend))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::tests::{backend, seed_trainer};

    /// Serve `backend` on an ephemeral port, returning the base URL
    pub(crate) async fn spawn_server(backend: Backend) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(backend)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health() {
        let url = spawn_server(backend()).await;
        let body: serde_json::Value = reqwest::get(format!("{}/health", url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_login_over_http() {
        let backend = backend();
        seed_trainer(&backend);
        let url = spawn_server(backend).await;

        let response = reqwest::Client::new()
            .post(format!("{}/rpc", url))
            .json(&json!({"method": "auth.login", "params": {"username": "coach", "password": "secret123"}}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["result"]["user"]["role"], "trainer");
        assert_eq!(body["result"]["origin"], "local");
    }

    #[tokio::test]
    async fn test_error_status_and_body() {
        let url = spawn_server(backend()).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/rpc", url))
            .json(&json!({"method": "diets.update", "params": {"id": "d_x", "patch": {"name": "y"}}}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");

        let response = client
            .post(format!("{}/rpc", url))
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }
}
