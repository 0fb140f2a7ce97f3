use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::guard::Decision;

/// `Retry-After` sent with every rejection. Deliberately fixed; the real
/// remaining block time is only reported in the body.
pub const RETRY_AFTER_HINT_SECS: u64 = 60;

pub const BLOCKED_MESSAGE: &str = "Request blocked by anti-DDoS guard.";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please slow down.";

#[derive(Debug, Serialize)]
pub struct RejectionBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

/// A 429 produced by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRejection {
    Blocked { remaining_seconds: u64 },
    RateLimited,
}

impl GuardRejection {
    /// `None` for decisions that let the request through.
    pub fn from_decision(decision: &Decision) -> Option<Self> {
        match decision {
            Decision::Exempt | Decision::Admitted => None,
            Decision::Blocked { remaining } => Some(GuardRejection::Blocked {
                remaining_seconds: remaining.as_secs(),
            }),
            Decision::RateLimited { .. } => Some(GuardRejection::RateLimited),
        }
    }

    pub fn body(&self) -> RejectionBody {
        match self {
            GuardRejection::Blocked { remaining_seconds } => RejectionBody {
                error: BLOCKED_MESSAGE,
                retry_after_seconds: Some(*remaining_seconds),
            },
            GuardRejection::RateLimited => RejectionBody {
                error: RATE_LIMITED_MESSAGE,
                retry_after_seconds: None,
            },
        }
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, RETRY_AFTER_HINT_SECS.to_string())],
            Json(self.body()),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub guard_enabled: bool,
}

impl HealthResponse {
    pub fn healthy(guard_enabled: bool) -> Self {
        Self {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            guard_enabled,
        }
    }
}
