//! Pulse Worker Library
//!
//! Push-triggered job worker. A messaging push subscription delivers one
//! envelope per HTTP request; the worker decodes it, runs the named job and
//! records the outcome in the warehouse.
//!
//! # Pipeline
//!
//! ```text
//! POST /pubsub/push
//!   -> envelope + payload decode   (pulse_common)
//!   -> job dispatch                (jobs)
//!   -> handler warehouse writes    (warehouse)
//!   -> audit record                (audit)
//!   -> JSON response, 200 or 500   (api)
//! ```
//!
//! Nothing is retried in process. A 500 response is the signal for the
//! messaging layer to redeliver.
//!
//! # Example
//!
//! ```no_run
//! use pulse_worker::{api, config::Config, context::AppContext};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let ctx = AppContext::from_config(config)?;
//!     let app = api::router(ctx);
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     api::serve(listener, app, shutdown, std::time::Duration::from_secs(10)).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod warehouse;

// Re-export commonly used types
pub use context::AppContext;
pub use error::{WorkerError, WorkerResult};
