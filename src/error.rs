use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// A client-caused request defect. Never retried; always reported to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Failure to complete the HTTP exchange with the upstream.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// Errors raised by the upstream client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to send request: {0}")]
    Transport(#[from] TransportError),
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: StatusCode, body: String },
    #[error("failed to decode upstream response: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ClientError {
    /// Short label used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Transport(TransportError::DeadlineExceeded(_)) => "timeout",
            ClientError::Transport(_) => "transport",
            ClientError::Upstream { .. } => "upstream",
            ClientError::Codec(_) => "codec",
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(TransportError::Http(e))
    }
}

/// Outcome of the shared chat completion pipeline.
///
/// `Invalid` is the caller's fault; `Upstream` collapses every forwarding
/// failure into one server-side category.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] ClientError),
}
