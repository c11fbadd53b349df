//! Session bookkeeping for the live dictation unit of work.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use murmur_core::types::{BackendKind, LanguageTag, PermissionState};

/// Tracks the data associated with one start-to-stop capture lifecycle.
///
/// Created when `start()` is accepted and destroyed when the stop sequence
/// completes. The operational state itself lives in the session state
/// machine; this record carries the identity and diagnostics.
#[derive(Debug, Clone)]
pub struct DictationSession {
    /// Unique identifier for this session, for log correlation.
    pub id: Uuid,
    /// Which engine backs this session. Fixed for the session's lifetime.
    pub backend: BackendKind,
    /// Locale being recognized. Immutable for the session's lifetime.
    pub language: LanguageTag,
    /// Last observed permission state, for diagnostics.
    pub permission: PermissionState,
    /// Most recent non-final fragment. Populated only while the session is
    /// live; cleared on start and on final emission.
    pub last_partial: Option<String>,
    /// When the session was started.
    pub started_at: DateTime<Utc>,
}

impl DictationSession {
    pub fn new(backend: BackendKind, language: LanguageTag) -> Self {
        Self {
            id: Uuid::new_v4(),
            backend,
            language,
            permission: PermissionState::Unknown,
            last_partial: None,
            started_at: Utc::now(),
        }
    }

    /// Returns the elapsed duration of this session in seconds.
    pub fn elapsed_secs(&self) -> f32 {
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_milliseconds() as f32 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = DictationSession::new(BackendKind::Native, LanguageTag::new("en-GB"));
        assert!(!session.id.is_nil());
        assert_eq!(session.backend, BackendKind::Native);
        assert_eq!(session.language.as_str(), "en-GB");
        assert_eq!(session.permission, PermissionState::Unknown);
        assert!(session.last_partial.is_none());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = DictationSession::new(BackendKind::Browser, LanguageTag::default());
        let b = DictationSession::new(BackendKind::Browser, LanguageTag::default());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_session_elapsed() {
        let session = DictationSession::new(BackendKind::Native, LanguageTag::default());
        // Elapsed should be essentially zero right after creation.
        assert!(session.elapsed_secs() < 1.0);
    }
}
