//! Adapter over the browser's in-process speech recognizer.
//!
//! The browser engine declares its own final segments, possibly several per
//! session, and may end on its own. Microphone acquisition is a separate
//! media-capture call whose stream the resource lifecycle manager owns for
//! the duration of the session. The browser exposes a single microphone
//! permission; the snapshot mirrors it into the speech slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use murmur_core::types::{EngineOptions, PermissionSnapshot};

use crate::adapter::EngineEvent;
use crate::bridge::{BrowserSpeech, BrowserSpeechEvent};
use crate::error::DictationError;
use crate::resource::{CaptureConstraints, CaptureStream};

/// Adapter wrapping the browser speech engine.
pub struct BrowserEngineAdapter<B: BrowserSpeech> {
    engine: B,
    capturing: Arc<AtomicBool>,
}

impl<B: BrowserSpeech> BrowserEngineAdapter<B> {
    pub fn new(engine: B) -> Self {
        Self {
            engine,
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn engine(&self) -> &B {
        &self.engine
    }

    pub async fn check_permission(&self) -> Result<PermissionSnapshot, DictationError> {
        let state = self
            .engine
            .query_permission()
            .await
            .map_err(|e| DictationError::Unknown(e.to_string()))?;
        Ok(PermissionSnapshot::uniform(state))
    }

    pub async fn request_permission(&self) -> Result<PermissionSnapshot, DictationError> {
        let state = self
            .engine
            .request_permission()
            .await
            .map_err(|e| DictationError::Unknown(e.to_string()))?;
        Ok(PermissionSnapshot::uniform(state))
    }

    /// Open the microphone stream, echo cancellation and noise suppression
    /// requested.
    pub async fn acquire_capture(&self) -> Result<Option<CaptureStream>, DictationError> {
        let stream = self
            .engine
            .open_capture(&CaptureConstraints::default())
            .await
            .map_err(|e| DictationError::StartFailed(e.to_string()))?;
        Ok(Some(stream))
    }

    pub async fn start(
        &self,
        options: &EngineOptions,
    ) -> Result<mpsc::UnboundedReceiver<EngineEvent>, DictationError> {
        if self.capturing.swap(true, Ordering::SeqCst) {
            return Err(DictationError::StartFailed(
                "recognizer already capturing".to_string(),
            ));
        }

        let raw = self.engine.events();
        if let Err(e) = self.engine.start(options).await {
            self.capturing.store(false, Ordering::SeqCst);
            return Err(DictationError::StartFailed(e.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let capturing = Arc::clone(&self.capturing);
        tokio::spawn(forward_events(raw, tx, capturing));
        Ok(rx)
    }

    pub async fn stop(&self) -> Result<(), DictationError> {
        self.engine
            .stop()
            .await
            .map_err(|e| DictationError::Unknown(e.to_string()))?;
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Map raw recognizer events into the normalized stream until a terminal
/// event.
async fn forward_events(
    mut raw: mpsc::UnboundedReceiver<BrowserSpeechEvent>,
    tx: mpsc::UnboundedSender<EngineEvent>,
    capturing: Arc<AtomicBool>,
) {
    while let Some(event) = raw.recv().await {
        let mapped = match event {
            BrowserSpeechEvent::Result {
                transcript,
                is_final: false,
            } => EngineEvent::Partial(transcript),
            BrowserSpeechEvent::Result {
                transcript,
                is_final: true,
            } => EngineEvent::Final(transcript),
            BrowserSpeechEvent::Error(identifier) => {
                EngineEvent::Error(normalize_error(&identifier))
            }
            BrowserSpeechEvent::End => EngineEvent::Stopped,
        };

        let terminal = matches!(mapped, EngineEvent::Stopped | EngineEvent::Error(_));
        if tx.send(mapped).is_err() || terminal {
            break;
        }
    }
    capturing.store(false, Ordering::SeqCst);
}

/// Normalize a recognizer error identifier into the shared taxonomy.
///
/// Unrecognized identifiers are preserved verbatim for diagnostics.
fn normalize_error(identifier: &str) -> DictationError {
    match identifier {
        "not-allowed" | "service-not-allowed" => DictationError::NotAllowed,
        "no-speech" | "aborted" | "audio-capture" | "network" | "language-not-supported"
        | "bad-grammar" => DictationError::Recognition(identifier.to_string()),
        other => DictationError::Unknown(other.to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockBrowserSpeech;
    use murmur_core::types::PermissionState;

    #[tokio::test]
    async fn test_start_forwards_partials_and_finals() {
        let engine = MockBrowserSpeech::new();
        let adapter = BrowserEngineAdapter::new(engine.clone());

        let mut events = adapter.start(&EngineOptions::default()).await.unwrap();
        engine.emit_result("today was", false);
        engine.emit_result("today was hard", true);

        assert!(matches!(events.recv().await, Some(EngineEvent::Partial(t)) if t == "today was"));
        assert!(
            matches!(events.recv().await, Some(EngineEvent::Final(t)) if t == "today was hard")
        );
    }

    #[tokio::test]
    async fn test_end_becomes_stopped() {
        let engine = MockBrowserSpeech::new();
        let adapter = BrowserEngineAdapter::new(engine.clone());

        let mut events = adapter.start(&EngineOptions::default()).await.unwrap();
        adapter.stop().await.unwrap();

        assert!(matches!(events.recv().await, Some(EngineEvent::Stopped)));
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_permission_snapshot_mirrors_microphone() {
        let engine = MockBrowserSpeech::new();
        let adapter = BrowserEngineAdapter::new(engine.clone());

        let snapshot = adapter.check_permission().await.unwrap();
        assert_eq!(snapshot.microphone, PermissionState::Prompt);
        assert_eq!(snapshot.speech, PermissionState::Prompt);

        let snapshot = adapter.request_permission().await.unwrap();
        assert!(snapshot.granted());
    }

    #[tokio::test]
    async fn test_acquire_capture_requests_processing_constraints() {
        let engine = MockBrowserSpeech::new();
        let adapter = BrowserEngineAdapter::new(engine.clone());

        let stream = adapter.acquire_capture().await.unwrap().unwrap();
        assert_eq!(stream.tracks().len(), 1);

        let constraints = engine.last_constraints().unwrap();
        assert!(constraints.echo_cancellation);
        assert!(constraints.noise_suppression);
    }

    #[tokio::test]
    async fn test_capture_failure_is_start_failed() {
        let engine = MockBrowserSpeech::new().failing_capture();
        let adapter = BrowserEngineAdapter::new(engine);
        let err = adapter.acquire_capture().await.unwrap_err();
        assert!(matches!(err, DictationError::StartFailed(_)));
    }

    #[tokio::test]
    async fn test_double_start_is_start_failed() {
        let engine = MockBrowserSpeech::new();
        let adapter = BrowserEngineAdapter::new(engine.clone());

        let _events = adapter.start(&EngineOptions::default()).await.unwrap();
        let err = adapter.start(&EngineOptions::default()).await.unwrap_err();
        assert!(matches!(err, DictationError::StartFailed(_)));
        assert_eq!(engine.start_calls(), 1);
    }

    #[tokio::test]
    async fn test_error_normalization_table() {
        assert!(matches!(
            normalize_error("not-allowed"),
            DictationError::NotAllowed
        ));
        assert!(matches!(
            normalize_error("service-not-allowed"),
            DictationError::NotAllowed
        ));
        for identifier in [
            "no-speech",
            "aborted",
            "audio-capture",
            "network",
            "language-not-supported",
            "bad-grammar",
        ] {
            match normalize_error(identifier) {
                DictationError::Recognition(msg) => assert_eq!(msg, identifier),
                other => panic!("expected recognition for {identifier}, got {other:?}"),
            }
        }
        match normalize_error("vendor-custom-failure") {
            DictationError::Unknown(msg) => assert_eq!(msg, "vendor-custom-failure"),
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mid_session_error_terminates_stream() {
        let engine = MockBrowserSpeech::new();
        let adapter = BrowserEngineAdapter::new(engine.clone());

        let mut events = adapter.start(&EngineOptions::default()).await.unwrap();
        engine.emit_error("network");

        assert!(matches!(
            events.recv().await,
            Some(EngineEvent::Error(DictationError::Recognition(_)))
        ));
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_adapter_reusable_after_stop() {
        let engine = MockBrowserSpeech::new();
        let adapter = BrowserEngineAdapter::new(engine.clone());

        let _first = adapter.start(&EngineOptions::default()).await.unwrap();
        adapter.stop().await.unwrap();
        let _second = adapter.start(&EngineOptions::default()).await.unwrap();
        assert_eq!(engine.start_calls(), 2);
    }
}
