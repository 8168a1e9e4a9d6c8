//! Client side of the envelope protocol: one envelope and one credential in,
//! one [`ResultEnvelope`] out.
//!
//! A [`TransportError`] means the call never completed. A backend that
//! answered with a failure is an `Ok(ResultEnvelope { has_error: true, .. })`.
//! Transports never retry.

use crate::domain::{DataAccessError, Envelope, ResultEnvelope};
use async_trait::async_trait;

pub mod direct;
pub mod http;

pub use direct::DirectTransport;
pub use http::HttpTransport;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("dispatcher unreachable: {0}")]
    Unreachable(String),
    #[error("could not decode dispatcher reply: {0}")]
    Decode(String),
}

impl From<TransportError> for DataAccessError {
    fn from(err: TransportError) -> Self {
        DataAccessError::Transport(err.to_string())
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `envelope` with `token` attached as the bearer credential.
    async fn send(&self, envelope: &Envelope, token: &str) -> Result<ResultEnvelope, TransportError>;
}
