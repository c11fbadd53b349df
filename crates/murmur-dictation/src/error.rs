//! Normalized error taxonomy for the dictation coordinator.

use murmur_core::error::MurmurError;
use murmur_core::types::{ErrorCode, ErrorEvent};

/// Errors from the dictation coordinator and its backend adapters.
///
/// Heterogeneous backend-native failures are normalized into this taxonomy
/// before they reach the caller. The `Aborted` variant is internal plumbing
/// for a stop request landing mid-startup; it is never surfaced as an
/// `ErrorEvent`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DictationError {
    #[error("speech capture requires a secure context")]
    NotSecureContext,
    #[error("microphone or speech permission denied")]
    NotAllowed,
    #[error("no usable speech backend on this platform")]
    EngineUnavailable,
    #[error("speech engine failed to start: {0}")]
    StartFailed(String),
    #[error("speech engine error: {0}")]
    Recognition(String),
    #[error("unrecognized speech engine failure: {0}")]
    Unknown(String),
    #[error("startup aborted by stop request")]
    Aborted,
}

impl DictationError {
    /// The normalized code this error maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            DictationError::NotSecureContext => ErrorCode::NotSecureContext,
            DictationError::NotAllowed => ErrorCode::NotAllowed,
            DictationError::EngineUnavailable => ErrorCode::EngineUnavailable,
            DictationError::StartFailed(_) => ErrorCode::StartFailed,
            DictationError::Recognition(_) => ErrorCode::RecognitionError,
            // Aborted starts are never surfaced; the mapping exists only to
            // keep this function total.
            DictationError::Unknown(_) | DictationError::Aborted => ErrorCode::Unknown,
        }
    }

    /// The caller-facing event for this error, message preserved verbatim.
    pub fn to_event(&self) -> ErrorEvent {
        ErrorEvent::new(self.code(), self.to_string())
    }

    /// Whether this is the internal abort marker rather than a real failure.
    pub fn is_abort(&self) -> bool {
        matches!(self, DictationError::Aborted)
    }
}

impl From<DictationError> for MurmurError {
    fn from(err: DictationError) -> Self {
        MurmurError::Dictation(err.to_string())
    }
}
