//! Pulse Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Transport types shared by the Pulse worker and anything that publishes to it.
//!
//! # Overview
//!
//! - **Envelope**: lenient parsing of push-delivered message envelopes
//! - **Payload**: the relaxed payload decoder and its value type
//! - **Logging**: tracing subscriber setup
//! - **Error Handling**: transport decode errors
//!
//! # Example
//!
//! ```
//! use pulse_common::payload::{decode_payload, PayloadValue};
//!
//! let payload = decode_payload("{job: fetch-trends, limit: 3}");
//! assert_eq!(payload.get_str("job"), Some("fetch-trends"));
//! assert_eq!(payload.get("limit"), Some(&PayloadValue::Integer(3)));
//! ```

pub mod envelope;
pub mod error;
pub mod logging;
pub mod payload;

// Re-export commonly used types
pub use envelope::{PushEnvelope, PushMessage};
pub use error::{CommonError, Result};
pub use payload::{decode_payload, Payload, PayloadValue};
