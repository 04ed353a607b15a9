//! Middleware for the worker
//!
//! - Request tracing
//! - Panic recovery into a JSON 500

use std::any::Any;

use axum::{
    body::Body,
    http::Response,
    response::IntoResponse,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, Level};

use crate::api::PushResponse;
use crate::jobs::UNKNOWN_JOB;

type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response<Body>;

/// Create tracing/logging layer
pub fn tracing_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(tower_http::LatencyUnit::Micros),
        )
}

/// Turn a handler panic into `500 {ok: false, job: "unknown", error}`.
pub fn catch_panic_layer() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(panic_response as PanicHandler)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!(panic = %detail, "Request handler panicked");

    PushResponse::failure(UNKNOWN_JOB, format!("handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::{Request, StatusCode}, routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn boom() -> &'static str {
        panic!("warehouse handle vanished")
    }

    #[tokio::test]
    async fn test_panic_becomes_json_500() {
        let app = Router::new()
            .route("/boom", get(boom))
            .layer(catch_panic_layer())
            .layer(tracing_layer());

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: PushResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(!body.ok);
        assert_eq!(body.job, "unknown");
        assert!(body.error.unwrap().contains("warehouse handle vanished"));
    }
}
