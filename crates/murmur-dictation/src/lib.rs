//! Murmur Dictation crate - speech capture coordination over native and
//! browser engines.
//!
//! Turns a user's speech into a live, continuously updated transcript while
//! abstracting over two structurally different capture engines. Guarantees a
//! single consistent state machine (Idle -> Starting -> Listening ->
//! Stopping), prevents duplicate or overlapping capture sessions, negotiates
//! microphone/speech permissions, normalizes heterogeneous error conditions,
//! and releases audio hardware resources on every exit path. Speech-to-text
//! itself is delegated to whichever backend engine is available.

pub mod adapter;
pub mod aggregator;
pub mod bridge;
pub mod coordinator;
pub mod error;
pub mod permission;
pub mod platform;
pub mod resource;
pub mod session;
pub mod state;

pub use adapter::{BrowserEngineAdapter, EngineAdapter, EngineEvent, NativeEngineAdapter};
pub use aggregator::ResultAggregator;
pub use bridge::{
    BrowserSpeech, BrowserSpeechEvent, MockBrowserSpeech, MockNativeBridge, NativeBridge,
    NativeBridgeEvent,
};
pub use coordinator::DictationCoordinator;
pub use error::DictationError;
pub use permission::PermissionNegotiator;
pub use platform::{CapabilityDetector, PlatformCapabilities};
pub use resource::{AudioTrack, CaptureConstraints, CaptureStream, ResourceLifecycle};
pub use session::DictationSession;
pub use state::{SessionState, SessionStateMachine};
