use std::{fmt, sync::Arc};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    core::{authorization_request::AuthorizationUri, visual_code::VisualCode},
    Error,
};

use super::result::PresentationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// No transaction has been requested.
    Initial,
    /// The transaction-creation call has been issued to the verifier.
    Requested,
    /// Subscribed to the verifier's notifications, waiting for the wallet.
    AwaitingResult,
    /// A verification result has been received and normalized.
    Completed,
    /// The session broke down; it must be reset before starting again.
    Failed,
}

impl Status {
    /// Whether a transaction is pending, i.e. a new one cannot be started.
    pub fn is_pending(&self) -> bool {
        matches!(self, Status::Requested | Status::AwaitingResult)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Initial => "INITIAL",
            Status::Requested => "REQUESTED",
            Status::AwaitingResult => "AWAITING_RESULT",
            Status::Completed => "COMPLETED",
            Status::Failed => "FAILED",
        }
        .fmt(f)
    }
}

/// One request/scan/result cycle.
///
/// Only the [Orchestrator](super::Orchestrator) moves a session between states; callers observe
/// it through accessors and [SessionEvent]s.
#[derive(Debug, Clone)]
pub struct PresentationSession {
    pub(super) uuid: Uuid,
    pub(super) status: Status,
    pub(super) credential_type: Option<String>,
    pub(super) session_id: Option<String>,
    pub(super) authorization_uri: Option<AuthorizationUri>,
    pub(super) visual_code: Option<VisualCode>,
    pub(super) result: Option<Arc<PresentationResult>>,
    pub(super) error: Option<Arc<Error>>,
}

impl Default for PresentationSession {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            status: Status::Initial,
            credential_type: None,
            session_id: None,
            authorization_uri: None,
            visual_code: None,
            result: None,
            error: None,
        }
    }
}

impl PresentationSession {
    /// Local handle of this session, used to correlate log lines.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn credential_type(&self) -> Option<&str> {
        self.credential_type.as_deref()
    }

    /// Transaction identifier taken from the authorization URI's `state` parameter.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn authorization_uri(&self) -> Option<&AuthorizationUri> {
        self.authorization_uri.as_ref()
    }

    pub fn visual_code(&self) -> Option<&VisualCode> {
        self.visual_code.as_ref()
    }

    /// Present only once [Status::Completed].
    pub fn result(&self) -> Option<&Arc<PresentationResult>> {
        self.result.as_ref()
    }

    /// Present only once [Status::Failed].
    pub fn error(&self) -> Option<&Arc<Error>> {
        self.error.as_ref()
    }
}

/// Lifecycle notifications emitted by the [Orchestrator](super::Orchestrator).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The transaction-creation call was issued.
    Requested { credential_type: String },
    /// The transaction exists and the wallet can be pointed at it.
    AwaitingResult {
        session_id: String,
        authorization_uri: AuthorizationUri,
        visual_code: Option<VisualCode>,
    },
    /// Emitted once per session, with the normalized result.
    Completed(Arc<PresentationResult>),
    Failed(Arc<Error>),
    Reset,
}
