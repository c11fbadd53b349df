use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{BackendKind, ErrorEvent, LanguageTag, ResultEvent};

/// Events published on the coordinator's caller-facing stream.
///
/// One ordered stream carries results, failures, and the session lifecycle
/// signals. Consumers rely on two ordering guarantees: the final result of a
/// session, if any, precedes its `SessionEnded`, and nothing is delivered for
/// a session after its `SessionEnded`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DictationEvent {
    /// A session finished starting and the engine is capturing.
    RecordingStarted {
        session_id: Uuid,
        backend: BackendKind,
        language: LanguageTag,
        timestamp: DateTime<Utc>,
    },

    /// A partial or final transcript fragment.
    TranscriptUpdate {
        session_id: Uuid,
        result: ResultEvent,
    },

    /// A start attempt or live session failed with a normalized error.
    SessionFailed {
        session_id: Uuid,
        error: ErrorEvent,
        timestamp: DateTime<Utc>,
    },

    /// The session returned to idle; emitted exactly once per live session.
    SessionEnded {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl DictationEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DictationEvent::RecordingStarted { timestamp, .. }
            | DictationEvent::SessionFailed { timestamp, .. }
            | DictationEvent::SessionEnded { timestamp, .. } => *timestamp,
            DictationEvent::TranscriptUpdate { result, .. } => result.emitted_at,
        }
    }

    /// Returns the session this event belongs to.
    pub fn session_id(&self) -> Uuid {
        match self {
            DictationEvent::RecordingStarted { session_id, .. }
            | DictationEvent::TranscriptUpdate { session_id, .. }
            | DictationEvent::SessionFailed { session_id, .. }
            | DictationEvent::SessionEnded { session_id, .. } => *session_id,
        }
    }

    /// Returns a human-readable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            DictationEvent::RecordingStarted { .. } => "recording_started",
            DictationEvent::TranscriptUpdate { .. } => "transcript_update",
            DictationEvent::SessionFailed { .. } => "session_failed",
            DictationEvent::SessionEnded { .. } => "session_ended",
        }
    }
}
