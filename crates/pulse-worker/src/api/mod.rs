//! HTTP surface
//!
//! - `GET /healthz`: service identity, no side effects
//! - `POST /pubsub/push`: push subscription endpoint, see [`push`]

pub mod push;
pub mod response;

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use tokio::{net::TcpListener, sync::Notify};
use tracing::{info, warn};

use crate::context::AppContext;
use crate::middleware;

pub use response::{HealthResponse, PushResponse};

/// Largest accepted request body.
///
/// Push messages carry up to 10 MB of data, which grows by a third once
/// base64-encoded into the envelope; the rest is headroom for attributes.
pub const MAX_PUSH_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Build the router with tracing and panic recovery applied.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/pubsub/push", post(push::push))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(MAX_PUSH_BODY_BYTES))
        // Apply layers from innermost to outermost
        .layer(middleware::catch_panic_layer())
        .layer(middleware::tracing_layer())
}

/// Serve `app` until `shutdown` resolves, then drain for at most `grace`.
///
/// In-flight requests that are still running when the grace period ends are
/// dropped and the function returns.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    grace: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let draining = Arc::new(Notify::new());
    let signal = {
        let draining = draining.clone();
        async move {
            shutdown.await;
            info!(grace_secs = grace.as_secs_f64(), "Draining in-flight requests");
            draining.notify_one();
        }
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(signal);
    let grace_elapsed = async {
        draining.notified().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server.into_future() => result,
        _ = grace_elapsed => {
            warn!(
                grace_secs = grace.as_secs_f64(),
                "Grace period elapsed with requests still in flight"
            );
            Ok(())
        },
    }
}

async fn healthz(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: ctx.config.service_name.clone(),
        project_id: ctx.config.warehouse.project_id.clone(),
        dataset: ctx.config.warehouse.dataset.clone(),
    })
}
