use axum::{
    extract::{Path, State},
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::client_ip::normalize;
use crate::guard::DdosGuard;
use crate::response::HealthResponse;

/// Shared application state
#[derive(Clone, Default)]
pub struct AppState {
    /// `None` when the guard is disabled.
    pub guard: Option<Arc<DdosGuard>>,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse::healthy(state.guard.is_some()))
}

/// Guard counters and store size
pub async fn guard_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.guard {
        Some(guard) => Json(json!({
            "enabled": true,
            "stats": guard.stats(),
        })),
        None => Json(json!({ "enabled": false })),
    }
}

/// Strike and block status for one client
pub async fn client_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let Some(guard) = state.guard else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Guard is disabled" })));
    };

    let key = normalize(&key).unwrap_or(key);
    match guard.client_status(&key) {
        Some(status) => (StatusCode::OK, Json(json!({ "client": key, "status": status }))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Client not tracked", "client": key })),
        ),
    }
}

/// Stand-in for the protected application
pub async fn protected_resource(method: Method, uri: Uri) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "method": method.as_str(),
        "path": uri.path(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardConfig;

    #[tokio::test]
    async fn test_client_status_for_untracked_client() {
        let state = AppState {
            guard: Some(Arc::new(DdosGuard::new(GuardConfig::default()))),
        };

        let response = client_status(State(state), Path("203.0.113.1".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_client_status_for_tracked_client() {
        let guard = Arc::new(DdosGuard::new(GuardConfig::default()));
        guard.check("203.0.113.1");
        let state = AppState { guard: Some(guard) };

        let response = client_status(State(state), Path("203.0.113.1".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_client_status_when_disabled() {
        let response = client_status(State(AppState::default()), Path("203.0.113.1".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
