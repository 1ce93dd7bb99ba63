use std::sync::Arc;

use http::StatusCode;

use crate::verifier::notification::ChannelError;

/// Presentation session error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A required input was missing or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A presentation session is already pending on this orchestrator.
    #[error("a presentation session is already in progress")]
    SessionBusy,

    /// No session identifier could be extracted from the authorization URI.
    #[error("malformed authorization URI: {0}")]
    MalformedUri(String),

    /// The verifier answered with a non-success status.
    #[error("request was unsuccessful (status: {status}): {body}")]
    RequestFailed { status: StatusCode, body: String },

    /// The verifier answered successfully but without an authorization URI.
    #[error("response did not contain a URI")]
    EmptyResponse,

    /// The notification channel could not be opened or broke down.
    #[error("notification channel error: {0}")]
    Channel(#[from] ChannelError),

    /// The HTTP client itself failed before a response was received.
    #[error("http request failed: {0:#}")]
    Http(Arc<anyhow::Error>),

    /// The visual code could not be produced.
    #[error("visual code could not be generated: {0}")]
    VisualCode(String),

    /// The medication directory has no entry for a prescribed GTIN.
    #[error("no medication found for GTIN {0}")]
    MedicationNotFound(String),

    /// A result was awaited while no session was pending.
    #[error("no presentation session is awaiting a result")]
    NotAwaiting,
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl ToString) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    pub(crate) fn http(e: impl Into<anyhow::Error>) -> Self {
        Self::Http(Arc::new(e.into()))
    }

    pub(crate) fn malformed_uri(msg: impl ToString) -> Self {
        Self::MalformedUri(msg.to_string())
    }
}
