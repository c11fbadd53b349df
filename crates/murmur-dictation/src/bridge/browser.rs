//! Port onto the browser's in-process speech recognizer.
//!
//! A continuous, interim-results-enabled recognizer with callback-style
//! result, error, and end notifications, plus the standard media-capture
//! API for the microphone. Unlike the native engine it declares final
//! segments itself and may deliver several of them before naturally ending.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use murmur_core::error::MurmurError;
use murmur_core::types::{EngineOptions, PermissionState};

use crate::resource::{AudioTrack, CaptureConstraints, CaptureStream};

/// Raw events from the browser recognizer, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserSpeechEvent {
    /// A recognized segment, interim or final.
    Result { transcript: String, is_final: bool },
    /// Engine error identifier, e.g. `not-allowed` or `network`.
    Error(String),
    /// The recognizer ended, naturally or after `stop()`.
    End,
}

/// The browser speech engine the browser adapter drives.
pub trait BrowserSpeech: Send + Sync + 'static {
    /// Whether the speech-recognition constructor exists in this browser.
    fn recognizer_present(&self) -> bool;

    /// Whether the page runs in a secure context.
    fn secure_context(&self) -> bool;

    /// Non-mutating microphone permission query.
    fn query_permission(&self) -> impl Future<Output = Result<PermissionState, MurmurError>> + Send;

    /// Prompt for microphone permission; suspends until the user responds.
    fn request_permission(
        &self,
    ) -> impl Future<Output = Result<PermissionState, MurmurError>> + Send;

    /// Open a microphone stream with the given constraints.
    fn open_capture(
        &self,
        constraints: &CaptureConstraints,
    ) -> impl Future<Output = Result<CaptureStream, MurmurError>> + Send;

    /// Begin recognition with the given options.
    fn start(&self, options: &EngineOptions)
        -> impl Future<Output = Result<(), MurmurError>> + Send;

    /// Stop recognition. Stopping an idle recognizer is a no-op.
    fn stop(&self) -> impl Future<Output = Result<(), MurmurError>> + Send;

    /// Subscribe to recognizer events. Called once per session start.
    fn events(&self) -> mpsc::UnboundedReceiver<BrowserSpeechEvent>;
}

// =============================================================================
// Mock implementation
// =============================================================================

#[derive(Debug)]
struct MockBrowserState {
    recognizer_present: AtomicBool,
    secure: AtomicBool,
    query_state: Mutex<PermissionState>,
    request_state: Mutex<PermissionState>,
    request_delay: Mutex<Option<Duration>>,
    fail_capture: AtomicBool,
    fail_start: AtomicBool,
    start_delay: Mutex<Option<Duration>>,
    started: AtomicBool,
    last_options: Mutex<Option<EngineOptions>>,
    last_constraints: Mutex<Option<CaptureConstraints>>,
    issued_tracks: Mutex<Vec<AudioTrack>>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<BrowserSpeechEvent>>>,
    query_calls: AtomicUsize,
    request_calls: AtomicUsize,
    capture_calls: AtomicUsize,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

/// Scriptable browser engine for tests and the demo binary.
///
/// Clones share state. Defaults model a capable, secure browser that grants
/// the microphone on request.
#[derive(Debug, Clone)]
pub struct MockBrowserSpeech {
    state: Arc<MockBrowserState>,
}

impl Default for MockBrowserSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBrowserSpeech {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockBrowserState {
                recognizer_present: AtomicBool::new(true),
                secure: AtomicBool::new(true),
                query_state: Mutex::new(PermissionState::Prompt),
                request_state: Mutex::new(PermissionState::Granted),
                request_delay: Mutex::new(None),
                fail_capture: AtomicBool::new(false),
                fail_start: AtomicBool::new(false),
                start_delay: Mutex::new(None),
                started: AtomicBool::new(false),
                last_options: Mutex::new(None),
                last_constraints: Mutex::new(None),
                issued_tracks: Mutex::new(Vec::new()),
                events_tx: Mutex::new(None),
                query_calls: AtomicUsize::new(0),
                request_calls: AtomicUsize::new(0),
                capture_calls: AtomicUsize::new(0),
                start_calls: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Model a browser without the speech-recognition constructor.
    pub fn without_recognizer(self) -> Self {
        self.state
            .recognizer_present
            .store(false, Ordering::Relaxed);
        self
    }

    /// Model a non-secure origin.
    pub fn insecure(self) -> Self {
        self.state.secure.store(false, Ordering::Relaxed);
        self
    }

    /// Permission request resolves to the given state.
    pub fn with_request_result(self, state: PermissionState) -> Self {
        *self
            .state
            .request_state
            .lock()
            .expect("mock mutex poisoned") = state;
        self
    }

    /// Deny the microphone on request.
    pub fn denying_permission(self) -> Self {
        self.with_request_result(PermissionState::Denied)
    }

    /// Suspend permission requests before resolving.
    pub fn with_request_delay(self, delay: Duration) -> Self {
        *self
            .state
            .request_delay
            .lock()
            .expect("mock mutex poisoned") = Some(delay);
        self
    }

    /// Fail microphone acquisition.
    pub fn failing_capture(self) -> Self {
        self.state.fail_capture.store(true, Ordering::Relaxed);
        self
    }

    /// Reject the start call.
    pub fn failing_start(self) -> Self {
        self.state.fail_start.store(true, Ordering::Relaxed);
        self
    }

    /// Suspend `start()` before resolving.
    pub fn with_start_delay(self, delay: Duration) -> Self {
        *self.state.start_delay.lock().expect("mock mutex poisoned") = Some(delay);
        self
    }

    fn send(&self, event: BrowserSpeechEvent) {
        let guard = self.state.events_tx.lock().expect("mock mutex poisoned");
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Emit a recognized segment.
    pub fn emit_result(&self, transcript: impl Into<String>, is_final: bool) {
        self.send(BrowserSpeechEvent::Result {
            transcript: transcript.into(),
            is_final,
        });
    }

    /// Emit an engine error identifier.
    pub fn emit_error(&self, identifier: impl Into<String>) {
        self.send(BrowserSpeechEvent::Error(identifier.into()));
    }

    /// Emit the recognizer end notification.
    pub fn emit_end(&self) {
        self.state.started.store(false, Ordering::Relaxed);
        self.send(BrowserSpeechEvent::End);
    }

    pub fn is_capturing(&self) -> bool {
        self.state.started.load(Ordering::Relaxed)
    }

    /// Tracks issued by `open_capture`, shared stop flags included.
    pub fn issued_tracks(&self) -> Vec<AudioTrack> {
        self.state
            .issued_tracks
            .lock()
            .expect("mock mutex poisoned")
            .clone()
    }

    /// Constraints recorded by the most recent `open_capture` call.
    pub fn last_constraints(&self) -> Option<CaptureConstraints> {
        self.state
            .last_constraints
            .lock()
            .expect("mock mutex poisoned")
            .clone()
    }

    pub fn query_calls(&self) -> usize {
        self.state.query_calls.load(Ordering::Relaxed)
    }

    pub fn request_calls(&self) -> usize {
        self.state.request_calls.load(Ordering::Relaxed)
    }

    pub fn capture_calls(&self) -> usize {
        self.state.capture_calls.load(Ordering::Relaxed)
    }

    pub fn start_calls(&self) -> usize {
        self.state.start_calls.load(Ordering::Relaxed)
    }

    pub fn stop_calls(&self) -> usize {
        self.state.stop_calls.load(Ordering::Relaxed)
    }
}

impl BrowserSpeech for MockBrowserSpeech {
    fn recognizer_present(&self) -> bool {
        self.state.recognizer_present.load(Ordering::Relaxed)
    }

    fn secure_context(&self) -> bool {
        self.state.secure.load(Ordering::Relaxed)
    }

    async fn query_permission(&self) -> Result<PermissionState, MurmurError> {
        self.state.query_calls.fetch_add(1, Ordering::Relaxed);
        Ok(*self.state.query_state.lock().expect("mock mutex poisoned"))
    }

    async fn request_permission(&self) -> Result<PermissionState, MurmurError> {
        self.state.request_calls.fetch_add(1, Ordering::Relaxed);
        let delay = *self
            .state
            .request_delay
            .lock()
            .expect("mock mutex poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = *self
            .state
            .request_state
            .lock()
            .expect("mock mutex poisoned");
        *self.state.query_state.lock().expect("mock mutex poisoned") = state;
        Ok(state)
    }

    async fn open_capture(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<CaptureStream, MurmurError> {
        self.state.capture_calls.fetch_add(1, Ordering::Relaxed);
        *self
            .state
            .last_constraints
            .lock()
            .expect("mock mutex poisoned") = Some(constraints.clone());

        if self.state.fail_capture.load(Ordering::Relaxed) {
            return Err(MurmurError::Capture(
                "microphone stream unavailable".to_string(),
            ));
        }

        let track = AudioTrack::new("mock-microphone");
        self.state
            .issued_tracks
            .lock()
            .expect("mock mutex poisoned")
            .push(track.clone());
        Ok(CaptureStream::new(vec![track]))
    }

    async fn start(&self, options: &EngineOptions) -> Result<(), MurmurError> {
        self.state.start_calls.fetch_add(1, Ordering::Relaxed);
        *self
            .state
            .last_options
            .lock()
            .expect("mock mutex poisoned") = Some(options.clone());

        let delay = *self.state.start_delay.lock().expect("mock mutex poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.state.fail_start.load(Ordering::Relaxed) {
            return Err(MurmurError::Engine(
                "recognizer rejected start".to_string(),
            ));
        }
        if self.state.started.swap(true, Ordering::Relaxed) {
            return Err(MurmurError::Engine(
                "recognizer already capturing".to_string(),
            ));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), MurmurError> {
        self.state.stop_calls.fetch_add(1, Ordering::Relaxed);
        if self.state.started.swap(false, Ordering::Relaxed) {
            // The recognizer acknowledges the stop with its end notification.
            self.send(BrowserSpeechEvent::End);
        }
        Ok(())
    }

    fn events(&self) -> mpsc::UnboundedReceiver<BrowserSpeechEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.events_tx.lock().expect("mock mutex poisoned") = Some(tx);
        rx
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_start_stop_cycle() {
        let engine = MockBrowserSpeech::new();
        let mut rx = engine.events();

        engine.start(&EngineOptions::default()).await.unwrap();
        assert!(engine.is_capturing());

        engine.stop().await.unwrap();
        assert!(!engine.is_capturing());
        assert_eq!(rx.recv().await, Some(BrowserSpeechEvent::End));
    }

    #[tokio::test]
    async fn test_mock_capture_issues_observable_tracks() {
        let engine = MockBrowserSpeech::new();
        let stream = engine
            .open_capture(&CaptureConstraints::default())
            .await
            .unwrap();
        assert_eq!(stream.tracks().len(), 1);

        stream.stop_all();
        assert!(engine.issued_tracks()[0].is_stopped());
    }

    #[tokio::test]
    async fn test_mock_capture_records_constraints() {
        let engine = MockBrowserSpeech::new();
        let constraints = CaptureConstraints {
            echo_cancellation: true,
            noise_suppression: false,
        };
        engine.open_capture(&constraints).await.unwrap();
        assert_eq!(engine.last_constraints().unwrap(), constraints);
    }

    #[tokio::test]
    async fn test_mock_failing_capture() {
        let engine = MockBrowserSpeech::new().failing_capture();
        let result = engine.open_capture(&CaptureConstraints::default()).await;
        assert!(matches!(result, Err(MurmurError::Capture(_))));
    }

    #[tokio::test]
    async fn test_mock_permission_request_updates_query() {
        let engine = MockBrowserSpeech::new();
        assert_eq!(
            engine.query_permission().await.unwrap(),
            PermissionState::Prompt
        );
        assert_eq!(
            engine.request_permission().await.unwrap(),
            PermissionState::Granted
        );
        assert_eq!(
            engine.query_permission().await.unwrap(),
            PermissionState::Granted
        );
    }

    #[tokio::test]
    async fn test_mock_results_reach_subscriber() {
        let engine = MockBrowserSpeech::new();
        let mut rx = engine.events();
        engine.emit_result("today was", false);
        engine.emit_result("today was hard", true);

        assert_eq!(
            rx.recv().await,
            Some(BrowserSpeechEvent::Result {
                transcript: "today was".to_string(),
                is_final: false
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(BrowserSpeechEvent::Result {
                transcript: "today was hard".to_string(),
                is_final: true
            })
        );
    }

    #[tokio::test]
    async fn test_mock_double_start_fails() {
        let engine = MockBrowserSpeech::new();
        engine.start(&EngineOptions::default()).await.unwrap();
        assert!(engine.start(&EngineOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_stop_idle_is_noop() {
        let engine = MockBrowserSpeech::new();
        let mut rx = engine.events();
        engine.stop().await.unwrap();
        // No End notification when nothing was capturing.
        assert!(rx.try_recv().is_err());
    }
}
