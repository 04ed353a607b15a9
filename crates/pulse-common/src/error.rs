//! Error types for the push transport layer

use thiserror::Error;

/// Result type alias for transport decoding
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised while unwrapping the transport encoding of a push message.
///
/// These only ever occur before the relaxed payload decoder runs; the decoder
/// itself is infallible.
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("UTF-8 decode error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
