use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Which speech engine backs the active coordinator.
///
/// Fixed at coordinator construction by the capability detector and never
/// switched at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// On-device engine reached through the native application shell.
    Native,
    /// In-process browser speech recognizer.
    Browser,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Native => write!(f, "native"),
            BackendKind::Browser => write!(f, "browser"),
        }
    }
}

/// Authorization state of a single capability (microphone or speech).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Not yet queried.
    #[default]
    Unknown,
    /// The platform will prompt the user on request.
    Prompt,
    /// Granted by the user or OS policy.
    Granted,
    /// Denied by the user or OS policy.
    Denied,
}

/// Normalized, backend-agnostic error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Capture attempted outside a transport-confidential origin.
    NotSecureContext,
    /// Microphone or speech permission denied by user or OS.
    NotAllowed,
    /// No usable speech backend on this platform.
    EngineUnavailable,
    /// The backend rejected the start call.
    StartFailed,
    /// The backend reported a mid-session failure.
    RecognitionError,
    /// Unrecognized backend-native error shape.
    Unknown,
}

// =============================================================================
// Language tag
// =============================================================================

/// A BCP-47-shaped locale identifier, e.g. `en-US`.
///
/// Supplied by the caller at session construction and immutable for the
/// session's lifetime. The tag is passed through to the backend verbatim;
/// no validation beyond non-emptiness is attempted here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageTag(pub String);

impl LanguageTag {
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if tag.is_empty() {
            Self::default()
        } else {
            Self(tag)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LanguageTag {
    fn default() -> Self {
        Self("en-US".to_string())
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Structs
// =============================================================================

/// Microphone and speech permission, queried before and after a request.
///
/// Used for observability and diagnostics only; gating decisions are made
/// by the permission negotiator itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    pub microphone: PermissionState,
    pub speech: PermissionState,
}

impl PermissionSnapshot {
    /// Snapshot with both capabilities in the given state.
    pub fn uniform(state: PermissionState) -> Self {
        Self {
            microphone: state,
            speech: state,
        }
    }

    /// Whether both capabilities are granted.
    pub fn granted(&self) -> bool {
        self.microphone == PermissionState::Granted && self.speech == PermissionState::Granted
    }

    /// Collapse the snapshot into a single session-level state.
    ///
    /// Denied wins over everything, then Prompt, then Unknown.
    pub fn combined(&self) -> PermissionState {
        use PermissionState::*;
        match (self.microphone, self.speech) {
            (Denied, _) | (_, Denied) => Denied,
            (Prompt, _) | (_, Prompt) => Prompt,
            (Unknown, _) | (_, Unknown) => Unknown,
            (Granted, Granted) => Granted,
        }
    }
}

/// A normalized error surfaced to the caller.
///
/// The message preserves whatever detail the backend supplied, verbatim,
/// for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorEvent {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// A transcript fragment produced by a backend and forwarded to the caller.
///
/// Exactly one `is_final = true` event is delivered per completed utterance
/// boundary, whether backend-declared or synthesized by the coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEvent {
    pub text: String,
    pub is_final: bool,
    pub emitted_at: DateTime<Utc>,
}

impl ResultEvent {
    /// An in-progress fragment that may still change.
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            emitted_at: Utc::now(),
        }
    }

    /// A committed fragment for a completed utterance boundary.
    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            emitted_at: Utc::now(),
        }
    }
}

/// Configuration record handed to a backend engine on start.
///
/// Unknown fields in serialized form are ignored; missing fields take the
/// defaults below.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Locale the engine should recognize.
    pub language: LanguageTag,
    /// Whether the engine should deliver in-progress fragments.
    pub wants_partial_results: bool,
    /// Prefer on-device recognition even when a server path exists.
    pub prefer_on_device_only: bool,
    /// Engine-side silence auto-stop, in milliseconds. `None` leaves the
    /// engine's own default in place.
    pub silence_timeout_ms: Option<u32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            language: LanguageTag::default(),
            wants_partial_results: true,
            prefer_on_device_only: false,
            silence_timeout_ms: None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
