//! Port onto the native application shell's speech engine.
//!
//! The native engine runs out of process behind a platform bridge. It
//! delivers only cumulative partial text per utterance plus a listening
//! state toggle; it never declares a final result mid-session. The error
//! channel is not guaranteed present on all platform versions, so its
//! silence is tolerated.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use murmur_core::error::MurmurError;
use murmur_core::types::{EngineOptions, PermissionSnapshot, PermissionState};

/// Raw events from the native bridge, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeBridgeEvent {
    /// Cumulative partial transcript for the current utterance.
    Partial(String),
    /// Capture toggle. `false` is the stop acknowledgment.
    ListeningState(bool),
    /// Engine failure. Platform versions without an error channel never
    /// deliver this; the detail string may also be absent.
    Error(Option<String>),
}

/// The platform bridge the native engine adapter drives.
///
/// All blocking operations are suspending; a permission request may wait
/// indefinitely for a human response.
pub trait NativeBridge: Send + Sync + 'static {
    /// Whether the process is running inside the native application shell.
    fn shell_active(&self) -> bool;

    /// Whether the execution context is transport-confidential.
    fn secure_context(&self) -> bool;

    /// Asynchronous capability query: is the speech engine usable here?
    fn available(&self) -> impl Future<Output = Result<bool, MurmurError>> + Send;

    /// Non-mutating permission query.
    fn check_permissions(
        &self,
    ) -> impl Future<Output = Result<PermissionSnapshot, MurmurError>> + Send;

    /// Permission request; may prompt and suspend until the user responds.
    fn request_permissions(
        &self,
    ) -> impl Future<Output = Result<PermissionSnapshot, MurmurError>> + Send;

    /// Begin capture with the given options.
    fn start(&self, options: &EngineOptions)
        -> impl Future<Output = Result<(), MurmurError>> + Send;

    /// Stop capture. Stopping an idle engine is a no-op.
    fn stop(&self) -> impl Future<Output = Result<(), MurmurError>> + Send;

    /// Subscribe to bridge events. Called once per session start; returns a
    /// fresh receiver carrying events from that point on.
    fn events(&self) -> mpsc::UnboundedReceiver<NativeBridgeEvent>;
}

// =============================================================================
// Mock implementation
// =============================================================================

#[derive(Debug)]
struct MockNativeState {
    shell_active: AtomicBool,
    secure: AtomicBool,
    available: AtomicBool,
    check_snapshot: Mutex<PermissionSnapshot>,
    request_snapshot: Mutex<PermissionSnapshot>,
    request_delay: Mutex<Option<Duration>>,
    start_delay: Mutex<Option<Duration>>,
    fail_start: AtomicBool,
    started: AtomicBool,
    last_options: Mutex<Option<EngineOptions>>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<NativeBridgeEvent>>>,
    check_calls: AtomicUsize,
    request_calls: AtomicUsize,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

/// Scriptable native bridge for tests and the demo binary.
///
/// Clones share state, so a test can hand one clone to the coordinator and
/// keep another to emit events and assert on call counts. Defaults model the
/// common case: active shell, secure context, engine available, permissions
/// granted on request.
#[derive(Debug, Clone)]
pub struct MockNativeBridge {
    state: Arc<MockNativeState>,
}

impl Default for MockNativeBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNativeBridge {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockNativeState {
                shell_active: AtomicBool::new(true),
                secure: AtomicBool::new(true),
                available: AtomicBool::new(true),
                check_snapshot: Mutex::new(PermissionSnapshot::uniform(PermissionState::Prompt)),
                request_snapshot: Mutex::new(PermissionSnapshot::uniform(
                    PermissionState::Granted,
                )),
                request_delay: Mutex::new(None),
                start_delay: Mutex::new(None),
                fail_start: AtomicBool::new(false),
                started: AtomicBool::new(false),
                last_options: Mutex::new(None),
                events_tx: Mutex::new(None),
                check_calls: AtomicUsize::new(0),
                request_calls: AtomicUsize::new(0),
                start_calls: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Model a process running outside the native shell.
    pub fn without_shell(self) -> Self {
        self.state.shell_active.store(false, Ordering::Relaxed);
        self
    }

    /// Model a shell whose speech engine is missing.
    pub fn unavailable(self) -> Self {
        self.state.available.store(false, Ordering::Relaxed);
        self
    }

    /// Model a non-secure execution context.
    pub fn insecure(self) -> Self {
        self.state.secure.store(false, Ordering::Relaxed);
        self
    }

    /// Permission request resolves to the given snapshot.
    pub fn with_request_result(self, snapshot: PermissionSnapshot) -> Self {
        *self
            .state
            .request_snapshot
            .lock()
            .expect("mock mutex poisoned") = snapshot;
        self
    }

    /// Permission check reports the given snapshot before any request.
    pub fn with_check_result(self, snapshot: PermissionSnapshot) -> Self {
        *self
            .state
            .check_snapshot
            .lock()
            .expect("mock mutex poisoned") = snapshot;
        self
    }

    /// Deny permission on request.
    pub fn denying_permissions(self) -> Self {
        self.with_request_result(PermissionSnapshot::uniform(PermissionState::Denied))
    }

    /// Suspend permission requests for the given duration before resolving.
    pub fn with_request_delay(self, delay: Duration) -> Self {
        *self
            .state
            .request_delay
            .lock()
            .expect("mock mutex poisoned") = Some(delay);
        self
    }

    /// Suspend `start()` for the given duration before resolving.
    pub fn with_start_delay(self, delay: Duration) -> Self {
        *self.state.start_delay.lock().expect("mock mutex poisoned") = Some(delay);
        self
    }

    /// Reject the start call.
    pub fn failing_start(self) -> Self {
        self.state.fail_start.store(true, Ordering::Relaxed);
        self
    }

    fn send(&self, event: NativeBridgeEvent) {
        let guard = self.state.events_tx.lock().expect("mock mutex poisoned");
        if let Some(tx) = guard.as_ref() {
            // Receiver may already be gone after session end.
            let _ = tx.send(event);
        }
    }

    /// Emit a cumulative partial transcript.
    pub fn emit_partial(&self, text: impl Into<String>) {
        self.send(NativeBridgeEvent::Partial(text.into()));
    }

    /// Emit an engine error, with or without detail.
    pub fn emit_error(&self, message: Option<String>) {
        self.send(NativeBridgeEvent::Error(message));
    }

    /// Emit a listening state toggle.
    pub fn emit_listening(&self, listening: bool) {
        self.send(NativeBridgeEvent::ListeningState(listening));
    }

    pub fn is_capturing(&self) -> bool {
        self.state.started.load(Ordering::Relaxed)
    }

    pub fn check_calls(&self) -> usize {
        self.state.check_calls.load(Ordering::Relaxed)
    }

    pub fn request_calls(&self) -> usize {
        self.state.request_calls.load(Ordering::Relaxed)
    }

    pub fn start_calls(&self) -> usize {
        self.state.start_calls.load(Ordering::Relaxed)
    }

    pub fn stop_calls(&self) -> usize {
        self.state.stop_calls.load(Ordering::Relaxed)
    }

    /// Options recorded by the most recent `start()` call.
    pub fn last_options(&self) -> Option<EngineOptions> {
        self.state
            .last_options
            .lock()
            .expect("mock mutex poisoned")
            .clone()
    }
}

impl NativeBridge for MockNativeBridge {
    fn shell_active(&self) -> bool {
        self.state.shell_active.load(Ordering::Relaxed)
    }

    fn secure_context(&self) -> bool {
        self.state.secure.load(Ordering::Relaxed)
    }

    async fn available(&self) -> Result<bool, MurmurError> {
        Ok(self.state.available.load(Ordering::Relaxed))
    }

    async fn check_permissions(&self) -> Result<PermissionSnapshot, MurmurError> {
        self.state.check_calls.fetch_add(1, Ordering::Relaxed);
        Ok(*self
            .state
            .check_snapshot
            .lock()
            .expect("mock mutex poisoned"))
    }

    async fn request_permissions(&self) -> Result<PermissionSnapshot, MurmurError> {
        self.state.request_calls.fetch_add(1, Ordering::Relaxed);
        let delay = *self
            .state
            .request_delay
            .lock()
            .expect("mock mutex poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let snapshot = *self
            .state
            .request_snapshot
            .lock()
            .expect("mock mutex poisoned");
        // Later checks observe the user's answer.
        *self
            .state
            .check_snapshot
            .lock()
            .expect("mock mutex poisoned") = snapshot;
        Ok(snapshot)
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
            return Err(MurmurError::Engine("native engine rejected start".to_string()));
        }
        if self.state.started.swap(true, Ordering::Relaxed) {
            return Err(MurmurError::Engine("native engine already capturing".to_string()));
        }
        self.send(NativeBridgeEvent::ListeningState(true));
        Ok(())
    }

    async fn stop(&self) -> Result<(), MurmurError> {
        self.state.stop_calls.fetch_add(1, Ordering::Relaxed);
        if self.state.started.swap(false, Ordering::Relaxed) {
            // The platform acknowledges the stop through the listening toggle.
            self.send(NativeBridgeEvent::ListeningState(false));
        }
        Ok(())
    }

    fn events(&self) -> mpsc::UnboundedReceiver<NativeBridgeEvent> {
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
        let bridge = MockNativeBridge::new();
        let mut rx = bridge.events();

        bridge.start(&EngineOptions::default()).await.unwrap();
        assert!(bridge.is_capturing());
        assert_eq!(
            rx.recv().await,
            Some(NativeBridgeEvent::ListeningState(true))
        );

        bridge.stop().await.unwrap();
        assert!(!bridge.is_capturing());
        assert_eq!(
            rx.recv().await,
            Some(NativeBridgeEvent::ListeningState(false))
        );
    }

    #[tokio::test]
    async fn test_mock_double_start_fails() {
        let bridge = MockNativeBridge::new();
        bridge.start(&EngineOptions::default()).await.unwrap();
        assert!(bridge.start(&EngineOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_stop_without_start_is_noop() {
        let bridge = MockNativeBridge::new();
        bridge.stop().await.unwrap();
        assert_eq!(bridge.stop_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_request_updates_check_snapshot() {
        let bridge = MockNativeBridge::new();
        let before = bridge.check_permissions().await.unwrap();
        assert!(!before.granted());

        let after = bridge.request_permissions().await.unwrap();
        assert!(after.granted());

        let checked = bridge.check_permissions().await.unwrap();
        assert!(checked.granted());
        assert_eq!(bridge.check_calls(), 2);
        assert_eq!(bridge.request_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_denying_permissions() {
        let bridge = MockNativeBridge::new().denying_permissions();
        let snapshot = bridge.request_permissions().await.unwrap();
        assert_eq!(snapshot.microphone, PermissionState::Denied);
    }

    #[tokio::test]
    async fn test_mock_records_start_options() {
        let bridge = MockNativeBridge::new();
        let mut options = EngineOptions::default();
        options.silence_timeout_ms = Some(2500);
        bridge.start(&options).await.unwrap();
        assert_eq!(bridge.last_options().unwrap().silence_timeout_ms, Some(2500));
    }

    #[tokio::test]
    async fn test_mock_partials_reach_subscriber() {
        let bridge = MockNativeBridge::new();
        let mut rx = bridge.events();
        bridge.emit_partial("dear diary");
        assert_eq!(
            rx.recv().await,
            Some(NativeBridgeEvent::Partial("dear diary".to_string()))
        );
    }

    #[test]
    fn test_mock_clones_share_state() {
        let bridge = MockNativeBridge::new();
        let observer = bridge.clone();
        bridge.state.started.store(true, Ordering::Relaxed);
        assert!(observer.is_capturing());
    }
}
