//! Axum JSON surface for Finboard: sync trigger, progress, logs, admin clear.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use finboard_storage::{Store, SyncLogStore};
use finboard_sync::SyncPipeline;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::info;
use uuid::Uuid;

pub const CRATE_NAME: &str = "finboard-web";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SyncPipeline>,
    pub store: Arc<dyn Store>,
    /// Static bearer token gating the trigger and clear endpoints; `None`
    /// disables the gate (local development).
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(
        pipeline: Arc<SyncPipeline>,
        store: Arc<dyn Store>,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            pipeline,
            store,
            admin_token,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct TriggerRequest {
    #[serde(default)]
    resume_only: bool,
}

#[derive(Debug, Deserialize, Default)]
struct LogsQuery {
    limit: Option<usize>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/sync/{tenant_id}", post(trigger_handler).delete(clear_handler))
        .route("/sync/{tenant_id}/status", get(status_handler))
        .route("/sync/{tenant_id}/logs", get(logs_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env(state: AppState) -> anyhow::Result<()> {
    let port: u16 = std::env::var("FINBOARD_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "web surface listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn healthz_handler() -> Response {
    Json(serde_json::json!({"status": "ok"})).into_response()
}

async fn trigger_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(tenant_id): AxumPath<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(resp) = check_admin_gate(&state, &headers) {
        return resp;
    }
    let request: TriggerRequest = if body.is_empty() {
        TriggerRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": err.to_string()})),
                )
                    .into_response()
            }
        }
    };
    match state.pipeline.trigger(tenant_id, request.resume_only).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => server_error(err),
    }
}

async fn clear_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(tenant_id): AxumPath<Uuid>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = check_admin_gate(&state, &headers) {
        return resp;
    }
    match state.pipeline.clear_synced_data(tenant_id).await {
        Ok(()) => Json(serde_json::json!({"cleared": true})).into_response(),
        Err(err) => server_error(err),
    }
}

async fn status_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(tenant_id): AxumPath<Uuid>,
) -> Response {
    match state.pipeline.sync_status(tenant_id).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => server_error(err),
    }
}

async fn logs_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(tenant_id): AxumPath<Uuid>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    match state.store.list_logs(tenant_id, limit).await {
        Ok(logs) => Json(logs).into_response(),
        Err(err) => server_error(err.into()),
    }
}

fn check_admin_gate(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = &state.admin_token else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "admin token required"})),
        )
            .into_response())
    }
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": err.to_string()})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use finboard_api::{
        ApiError, BookkeepingApi, DateRange, RecordDetail, TokenResponse,
    };
    use finboard_core::TransactionKind;
    use finboard_storage::MemStore;
    use finboard_sync::SyncConfig;
    use http_body_util::BodyExt;
    use serde_json::Value as JsonValue;
    use tower::ServiceExt;

    struct StubApi;

    #[async_trait]
    impl BookkeepingApi for StubApi {
        async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenResponse, ApiError> {
            Ok(TokenResponse {
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                expires_in: 3600,
            })
        }

        async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, ApiError> {
            Ok(TokenResponse {
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                expires_in: 3600,
            })
        }

        async fn fetch_page(
            &self,
            _access_token: &str,
            _kind: TransactionKind,
            _range: &DateRange,
            _page: u32,
        ) -> Result<Vec<JsonValue>, ApiError> {
            Ok(Vec::new())
        }

        async fn fetch_detail(
            &self,
            _access_token: &str,
            _kind: TransactionKind,
            _source_id: i64,
        ) -> Result<RecordDetail, ApiError> {
            Ok(RecordDetail {
                category_name: Some("General Fees".to_string()),
            })
        }
    }

    fn test_app(admin_token: Option<String>) -> Router {
        let store = Arc::new(MemStore::new());
        let pipeline = Arc::new(SyncPipeline::new(
            SyncConfig::default(),
            store.clone(),
            Arc::new(StubApi),
        ));
        app(AppState::new(pipeline, store, admin_token))
    }

    #[tokio::test]
    async fn healthz_is_open() {
        let app = test_app(Some("secret".into()));
        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn trigger_requires_admin_token() {
        let app = test_app(Some("secret".into()));
        let tenant = Uuid::new_v4();

        let denied = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri(format!("/sync/{tenant}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri(format!("/sync/{tenant}"))
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"resume_only": true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        let body = allowed.into_body().collect().await.unwrap().to_bytes();
        let result: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(result["completed"], true);
        assert!(result["message"]
            .as_str()
            .unwrap()
            .contains("already complete"));
    }

    #[tokio::test]
    async fn status_reports_not_started_for_unknown_tenant() {
        let app = test_app(None);
        let tenant = Uuid::new_v4();
        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .uri(format!("/sync/{tenant}/status"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let report: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["state"], "not_started");
        assert_eq!(report["progress"]["pendingCount"], 0);
    }

    #[tokio::test]
    async fn logs_endpoint_returns_empty_list() {
        let app = test_app(None);
        let tenant = Uuid::new_v4();
        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .uri(format!("/sync/{tenant}/logs?limit=5"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let logs: Vec<JsonValue> = serde_json::from_slice(&body).unwrap();
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn clear_requires_admin_token_and_succeeds_with_it() {
        let app = test_app(Some("secret".into()));
        let tenant = Uuid::new_v4();

        let denied = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("DELETE")
                    .uri(format!("/sync/{tenant}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .oneshot(
                axum::http::Request::builder()
                    .method("DELETE")
                    .uri(format!("/sync/{tenant}"))
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
