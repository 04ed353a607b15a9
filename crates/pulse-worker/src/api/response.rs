//! Response bodies of the HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Body of every `/pubsub/push` response.
///
/// `ok` decides the status: 200 when true, 500 otherwise. A 500 makes the
/// push subscription redeliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    pub ok: bool,
    pub job: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_processed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PushResponse {
    pub fn success(job: impl Into<String>, rows_processed: u64) -> Self {
        Self {
            ok: true,
            job: job.into(),
            rows_processed: Some(rows_processed),
            error: None,
        }
    }

    pub fn failure(job: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            job: job.into(),
            rows_processed: None,
            error: Some(error.into()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        if self.ok {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for PushResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Body of `GET /healthz`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub project_id: String,
    pub dataset: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_body_omits_error() {
        let body = serde_json::to_value(PushResponse::success("fetch-trends", 3)).unwrap();
        assert_eq!(body, json!({"ok": true, "job": "fetch-trends", "rows_processed": 3}));
    }

    #[test]
    fn test_failure_body_omits_rows() {
        let response = PushResponse::failure("ab-evaluate", "Warehouse error: boom");
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(
            body,
            json!({"ok": false, "job": "ab-evaluate", "error": "Warehouse error: boom"})
        );
    }
}
