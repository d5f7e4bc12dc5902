use serde::{Deserialize, Serialize};

use crate::common::types::{SessionId, VoterId};

/// Exception severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    /// Caused by the caller, safe to show to the user.
    Common,
    /// Caller did something it should not be able to do.
    Suspicious,
    /// Something on our side or a collaborator broke.
    Fault,
}

/// Faults raised by a [`crate::store::StateStore`] backend.
///
/// These never leave the session state layer; they are logged and the
/// affected entity reads as its zero value.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("timed out acquiring lock {0}")]
    LockTimeout(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failure reported by an external collaborator (streaming provider,
/// account store, metrics sink).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Typed failures returned to callers of the session engine.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("session {0} is full")]
    SessionFull(SessionId),
    #[error("voter {1} not found in session {0}")]
    VoterNotFound(SessionId, VoterId),
    #[error("{0}")]
    InvalidVote(String),
    #[error("no free session id after {0} attempts")]
    IdSpaceExhausted(usize),
    #[error("streaming service error: {0}")]
    Streaming(#[source] ServiceError),
    #[error("account service error: {0}")]
    Account(#[source] ServiceError),
}

impl SessionError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::NotFound(_) | Self::SessionFull(_) | Self::InvalidVote(_) => Severity::Common,
            Self::VoterNotFound(..) => Severity::Suspicious,
            Self::IdSpaceExhausted(_) | Self::Streaming(_) | Self::Account(_) => Severity::Fault,
        }
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_faults_are_common() {
        assert_eq!(
            SessionError::SessionFull(SessionId(100000)).severity(),
            Severity::Common
        );
        assert_eq!(
            SessionError::Streaming(ServiceError::new("device offline")).severity(),
            Severity::Fault
        );
    }

    #[test]
    fn test_error_messages() {
        let err = SessionError::VoterNotFound(SessionId(123456), VoterId::from("v1"));
        assert_eq!(err.to_string(), "voter v1 not found in session 123456");
        let err = StoreError::LockTimeout("queue-mutex-123456".into());
        assert_eq!(err.to_string(), "timed out acquiring lock queue-mutex-123456");
    }
}
