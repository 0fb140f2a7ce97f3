use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client_ip::client_key;
use crate::guard::{DdosGuard, Decision};
use crate::response::GuardRejection;

pub const X_REQUEST_ID: &str = "x-request-id";

/// State for [`guard_middleware`].
#[derive(Clone)]
pub struct GuardLayerState {
    pub guard: Arc<DdosGuard>,
    pub trust_forwarded_headers: bool,
}

/// Admission guard. Admitted and exempt requests continue unmodified;
/// everything else ends here with a 429.
pub async fn guard_middleware(
    State(state): State<GuardLayerState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request, state.trust_forwarded_headers);
    let decision = state.guard.check(&client);

    let Some(rejection) = GuardRejection::from_decision(&decision) else {
        return next.run(request).await;
    };

    match decision {
        Decision::RateLimited { strikes, blocked } => warn!(
            subsystem = "http_ddos_guard",
            client = %client,
            path = %request.uri().path(),
            method = %request.method(),
            strikes,
            blocked,
            "Request denied by anti-DDoS guard"
        ),
        Decision::Blocked { remaining } => debug!(
            subsystem = "http_ddos_guard",
            client = %client,
            remaining_secs = remaining.as_secs(),
            "Request from blocked client rejected"
        ),
        Decision::Exempt | Decision::Admitted => {}
    }

    rejection.into_response()
}

/// State for [`logging_middleware`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestLogState {
    /// Must match the guard so both logs name the same client.
    pub trust_forwarded_headers: bool,
}

/// Logging middleware for request/response tracking
pub async fn logging_middleware(
    State(state): State<RequestLogState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert(X_REQUEST_ID, value);
    }

    let method = request.method().clone();
    let uri = request.uri().clone();
    let client = client_key(&request, state.trust_forwarded_headers);

    info!(
        target: "ddos_guard::middleware",
        request_id = %request_id,
        method = %method,
        uri = %uri,
        client = %client,
        "Incoming request"
    );

    let mut response = next.run(request).await;

    let status = response.status();
    info!(
        target: "ddos_guard::middleware",
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status,
        "Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
