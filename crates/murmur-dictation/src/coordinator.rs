//! The dictation coordinator: one public contract over two speech engines.
//!
//! Composes the capability detector, permission negotiator, resource
//! lifecycle manager, and result aggregator into a guarded session state
//! machine. Callers get `start()`, `stop()`, an ordered event stream, and a
//! recording-state accessor; everything else — which engine runs, how its
//! events and errors look, when the microphone is released — is internal.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use murmur_core::config::DictationConfig;
use murmur_core::events::DictationEvent;
use murmur_core::types::{
    BackendKind, EngineOptions, PermissionSnapshot, PermissionState,
};

use crate::adapter::{BrowserEngineAdapter, EngineAdapter, EngineEvent, NativeEngineAdapter};
use crate::aggregator::ResultAggregator;
use crate::bridge::{BrowserSpeech, NativeBridge};
use crate::error::DictationError;
use crate::permission::PermissionNegotiator;
use crate::platform::{CapabilityDetector, PlatformCapabilities};
use crate::resource::ResourceLifecycle;
use crate::session::DictationSession;
use crate::state::{SessionState, SessionStateMachine};

/// How long `shutdown()` waits for a graceful stop before forcing teardown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

struct CoordinatorInner<N: NativeBridge, B: BrowserSpeech> {
    adapter: EngineAdapter<N, B>,
    capabilities: PlatformCapabilities,
    options: EngineOptions,
    state: SessionStateMachine,
    session: Mutex<Option<DictationSession>>,
    aggregator: Mutex<ResultAggregator>,
    resources: ResourceLifecycle,
    last_permission: Mutex<Option<PermissionSnapshot>>,
    events_tx: mpsc::UnboundedSender<DictationEvent>,
}

impl<N: NativeBridge, B: BrowserSpeech> CoordinatorInner<N, B> {
    fn publish(&self, event: DictationEvent) {
        tracing::debug!(event = event.event_name(), "Publishing dictation event");
        if self.events_tx.send(event).is_err() {
            tracing::debug!("No event subscriber; dictation event dropped");
        }
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut DictationSession) -> T) -> Option<T> {
        let mut guard = self.session.lock().expect("session mutex poisoned");
        guard.as_mut().map(f)
    }

    fn take_session(&self) -> Option<DictationSession> {
        self.session.lock().expect("session mutex poisoned").take()
    }

    /// Complete a live session: finalize the outstanding partial, release
    /// audio resources, surface the failure (if any) and the end-of-session
    /// signal, then return to Idle. A `stop()` caller resumes on the Idle
    /// flip, so every event of the session is enqueued before it.
    async fn finish_session(&self, error: Option<DictationError>) {
        // Engine-initiated stops arrive while still Listening.
        let _ = self
            .state
            .transition_if(SessionState::Listening, SessionState::Stopping);

        let final_event = self
            .aggregator
            .lock()
            .expect("aggregator mutex poisoned")
            .finalize();
        if let Some(result) = final_event {
            let session_id = self.with_session(|s| {
                s.last_partial = None;
                s.id
            });
            if let Some(session_id) = session_id {
                self.publish(DictationEvent::TranscriptUpdate { session_id, result });
            }
        }

        self.resources.release().await;

        // Publish before the Idle flip: a stop() caller resumes on Idle and
        // must find every event of its session already enqueued.
        let session = self.take_session();
        if let Some(session) = &session {
            if let Some(error) = error {
                tracing::warn!(
                    session_id = %session.id,
                    code = ?error.code(),
                    "Dictation session failed"
                );
                self.publish(DictationEvent::SessionFailed {
                    session_id: session.id,
                    error: error.to_event(),
                    timestamp: Utc::now(),
                });
            }
            tracing::info!(
                session_id = %session.id,
                elapsed_secs = session.elapsed_secs(),
                "Dictation session ended"
            );
            self.publish(DictationEvent::SessionEnded {
                session_id: session.id,
                timestamp: Utc::now(),
            });
        }

        if self.state.transition(SessionState::Idle).is_err() {
            self.state.reset();
        }
    }

    /// Roll back an aborted startup: no error is surfaced, but the session
    /// existed, so the end-of-session signal still fires.
    async fn abort_startup(&self, engine_armed: bool) {
        if engine_armed {
            if let Err(e) = self.adapter.stop().await {
                tracing::debug!(error = %e, "Engine stop during aborted startup failed");
            }
        }
        self.resources.release().await;
        self.aggregator
            .lock()
            .expect("aggregator mutex poisoned")
            .reset();

        let session = self.take_session();
        if let Some(session) = session {
            tracing::info!(session_id = %session.id, "Dictation start aborted by stop request");
            self.publish(DictationEvent::SessionEnded {
                session_id: session.id,
                timestamp: Utc::now(),
            });
        }

        if self.state.transition(SessionState::Idle).is_err() {
            self.state.reset();
        }
    }

    /// Roll back a failed startup and surface the error. No end-of-session
    /// signal: the session never went live.
    async fn fail_startup(&self, error: &DictationError) {
        self.resources.release().await;
        self.aggregator
            .lock()
            .expect("aggregator mutex poisoned")
            .reset();

        let session = self.take_session();
        if let Some(session) = session {
            tracing::warn!(
                session_id = %session.id,
                code = ?error.code(),
                "Dictation start failed"
            );
            self.publish(DictationEvent::SessionFailed {
                session_id: session.id,
                error: error.to_event(),
                timestamp: Utc::now(),
            });
        }

        if self.state.transition(SessionState::Idle).is_err() {
            self.state.reset();
        }
    }
}

/// Coordinates dictation sessions over whichever speech engine the platform
/// offers.
///
/// At most one session is live at a time; `start()` and `stop()` are
/// idempotent by design because user-interface double-invocation is expected.
/// All results and failures are published on the event stream returned by
/// `subscribe()`, in order, with nothing delivered for a session after its
/// end-of-session signal.
pub struct DictationCoordinator<N: NativeBridge, B: BrowserSpeech> {
    inner: Arc<CoordinatorInner<N, B>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<DictationEvent>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<N: NativeBridge, B: BrowserSpeech> DictationCoordinator<N, B> {
    /// Build a coordinator, probing the environment once.
    ///
    /// The backend is fixed here for the coordinator's lifetime. An
    /// unsupported environment still yields a coordinator; its first
    /// `start()` fails with `EngineUnavailable`.
    pub async fn new(native: N, browser: B, config: DictationConfig) -> Self {
        let capabilities = CapabilityDetector::detect(&native, &browser).await;
        let adapter = match capabilities.backend {
            BackendKind::Native => EngineAdapter::Native(NativeEngineAdapter::new(native)),
            BackendKind::Browser => EngineAdapter::Browser(BrowserEngineAdapter::new(browser)),
        };

        let settle_delay = Duration::from_millis(config.settle_delay_ms);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(CoordinatorInner {
                resources: ResourceLifecycle::new(capabilities.backend, settle_delay),
                adapter,
                capabilities,
                options: config.engine_options(),
                state: SessionStateMachine::new(),
                session: Mutex::new(None),
                aggregator: Mutex::new(ResultAggregator::new()),
                last_permission: Mutex::new(None),
                events_tx,
            }),
            events_rx: Mutex::new(Some(events_rx)),
            pump: Mutex::new(None),
        }
    }

    /// Take the event stream. Yields `None` after the first call; the stream
    /// has a single consumer.
    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<DictationEvent>> {
        self.events_rx
            .lock()
            .expect("events mutex poisoned")
            .take()
    }

    /// Start a dictation session.
    ///
    /// A silent no-op when a session is already starting, listening, or
    /// stopping — duplicate input events must never produce two concurrent
    /// capture sessions, and a start racing an in-flight stop loses. On
    /// failure the coordinator is back at Idle with all partial progress
    /// rolled back before the error is reported.
    pub async fn start(&self) -> Result<(), DictationError> {
        let inner = &self.inner;
        if !inner
            .state
            .transition_if(SessionState::Idle, SessionState::Starting)
        {
            tracing::debug!(state = %inner.state.current(), "Start ignored: session in progress");
            return Ok(());
        }

        {
            let mut guard = inner.session.lock().expect("session mutex poisoned");
            *guard = Some(DictationSession::new(
                inner.adapter.kind(),
                inner.options.language.clone(),
            ));
        }
        inner
            .aggregator
            .lock()
            .expect("aggregator mutex poisoned")
            .reset();

        match self.run_start_sequence().await {
            Ok(engine_rx) => {
                if inner
                    .state
                    .transition_if(SessionState::Starting, SessionState::Listening)
                {
                    let started = inner.with_session(|s| (s.id, s.language.clone()));
                    if let Some((session_id, language)) = started {
                        tracing::info!(
                            session_id = %session_id,
                            backend = %inner.adapter.kind(),
                            language = %language,
                            "Dictation session started"
                        );
                        inner.publish(DictationEvent::RecordingStarted {
                            session_id,
                            backend: inner.adapter.kind(),
                            language,
                            timestamp: Utc::now(),
                        });
                    }

                    let pump = tokio::spawn(pump_events(Arc::clone(inner), engine_rx));
                    *self.pump.lock().expect("pump mutex poisoned") = Some(pump);
                    Ok(())
                } else {
                    // A stop request landed between the last checkpoint and
                    // the commit; the engine is armed and must be unwound.
                    inner.abort_startup(true).await;
                    Ok(())
                }
            }
            Err(e) if e.is_abort() => {
                inner.abort_startup(false).await;
                Ok(())
            }
            Err(e) => {
                inner.fail_startup(&e).await;
                Err(e)
            }
        }
    }

    /// The suspending part of startup. Consults the state machine after
    /// every suspension point so a concurrent `stop()` aborts the sequence
    /// instead of racing it; in-flight acquisitions are allowed to complete
    /// and are then rolled back by the caller.
    async fn run_start_sequence(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<EngineEvent>, DictationError> {
        let inner = &self.inner;

        if !inner.capabilities.supported {
            return Err(DictationError::EngineUnavailable);
        }

        let negotiated =
            PermissionNegotiator::negotiate(&inner.adapter, &inner.capabilities).await;
        match &negotiated {
            Ok(snapshot) => {
                inner.with_session(|s| s.permission = snapshot.combined());
                *inner
                    .last_permission
                    .lock()
                    .expect("permission mutex poisoned") = Some(*snapshot);
            }
            Err(DictationError::NotAllowed) => {
                inner.with_session(|s| s.permission = PermissionState::Denied);
            }
            Err(_) => {}
        }
        let _snapshot = negotiated?;
        if inner.state.current() == SessionState::Stopping {
            return Err(DictationError::Aborted);
        }

        let stream = inner.adapter.acquire_capture().await?;
        inner.resources.adopt(stream);
        if inner.state.current() == SessionState::Stopping {
            return Err(DictationError::Aborted);
        }

        let engine_rx = inner.adapter.start(&inner.options).await?;
        if inner.state.current() == SessionState::Stopping {
            // The engine is armed; unwind it before reporting the abort.
            if let Err(e) = inner.adapter.stop().await {
                tracing::debug!(error = %e, "Engine stop during aborted startup failed");
            }
            return Err(DictationError::Aborted);
        }

        Ok(engine_rx)
    }

    /// Stop the current session.
    ///
    /// A no-op when nothing is live or a stop is already in flight. From
    /// `Listening` this asks the engine to stop and suspends until the
    /// acknowledgment has been processed, the last partial finalized, and
    /// resources released. From `Starting` it aborts the startup sequence.
    /// Either way the coordinator is at Idle when this returns.
    pub async fn stop(&self) -> Result<(), DictationError> {
        let inner = &self.inner;
        let Some(prev) = inner.state.begin_stop() else {
            tracing::debug!(state = %inner.state.current(), "Stop ignored: no live session");
            return Ok(());
        };

        match prev {
            SessionState::Listening => {
                tracing::debug!("Stopping dictation session");
                if let Err(e) = inner.adapter.stop().await {
                    // No acknowledgment will come; finish the stop here.
                    tracing::warn!(error = %e, "Engine stop failed; forcing session end");
                    inner.finish_session(None).await;
                    return Ok(());
                }
            }
            _ => {
                tracing::debug!("Stop requested during startup; aborting start sequence");
            }
        }

        inner.state.wait_for(SessionState::Idle).await;
        Ok(())
    }

    /// Tear the coordinator down, stopping any live session.
    ///
    /// Equivalent to an implicit `stop()` with best-effort error
    /// suppression; never fails. If the engine does not acknowledge within
    /// a grace period the session is dismantled forcibly.
    pub async fn shutdown(&self) {
        if self.inner.state.current() == SessionState::Idle {
            return;
        }
        tracing::info!("Dictation coordinator shutting down");

        match tokio::time::timeout(SHUTDOWN_GRACE, self.stop()).await {
            Ok(_) => {}
            Err(_) => {
                tracing::warn!("Graceful stop timed out during shutdown; forcing teardown");
                if let Some(pump) = self.pump.lock().expect("pump mutex poisoned").take() {
                    pump.abort();
                }
                self.inner.resources.release_blocking();
                self.inner.take_session();
                self.inner.state.reset();
            }
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.inner.state.current()
    }

    /// Whether a session is actively capturing.
    pub fn is_recording(&self) -> bool {
        self.inner.state.current() == SessionState::Listening
    }

    /// Whether the detected backend can recognize speech at all.
    pub fn is_supported(&self) -> bool {
        self.inner.capabilities.supported
    }

    /// Which backend this coordinator drives.
    pub fn backend_kind(&self) -> BackendKind {
        self.inner.capabilities.backend
    }

    /// The cached capability probe result.
    pub fn capabilities(&self) -> PlatformCapabilities {
        self.inner.capabilities
    }

    /// A clone of the live session record, if any.
    pub fn current_session(&self) -> Option<DictationSession> {
        self.inner
            .session
            .lock()
            .expect("session mutex poisoned")
            .clone()
    }

    /// The most recent permission snapshot, for diagnostics.
    pub fn last_permission_snapshot(&self) -> Option<PermissionSnapshot> {
        *self
            .inner
            .last_permission
            .lock()
            .expect("permission mutex poisoned")
    }
}

impl<N: NativeBridge, B: BrowserSpeech> Drop for DictationCoordinator<N, B> {
    fn drop(&mut self) {
        // Best-effort synchronous teardown; never panics, never blocks.
        if let Ok(mut guard) = self.pump.lock() {
            if let Some(pump) = guard.take() {
                pump.abort();
            }
        }
        self.inner.resources.release_blocking();
        self.inner.state.reset();
    }
}

/// Consume normalized engine events for one session until it ends.
///
/// Partials and finals flow through the aggregator and out to the caller;
/// a stop acknowledgment (or the bridge closing its event stream) completes
/// the session, and an engine error becomes an implicit stop that surfaces
/// the failure after cleanup.
async fn pump_events<N: NativeBridge, B: BrowserSpeech>(
    inner: Arc<CoordinatorInner<N, B>>,
    mut engine_rx: mpsc::UnboundedReceiver<EngineEvent>,
) {
    loop {
        match engine_rx.recv().await {
            Some(EngineEvent::Partial(text)) => {
                let result = inner
                    .aggregator
                    .lock()
                    .expect("aggregator mutex poisoned")
                    .on_partial(&text);
                let Some(result) = result else { continue };

                let session_id = inner.with_session(|s| {
                    s.last_partial = Some(text.clone());
                    s.id
                });
                if inner.options.wants_partial_results {
                    if let Some(session_id) = session_id {
                        inner.publish(DictationEvent::TranscriptUpdate { session_id, result });
                    }
                }
            }
            Some(EngineEvent::Final(text)) => {
                let result = inner
                    .aggregator
                    .lock()
                    .expect("aggregator mutex poisoned")
                    .on_final(&text);
                let session_id = inner.with_session(|s| {
                    s.last_partial = None;
                    s.id
                });
                if let Some(session_id) = session_id {
                    inner.publish(DictationEvent::TranscriptUpdate { session_id, result });
                }
            }
            Some(EngineEvent::Error(error)) => {
                // Implicit stop: make sure the engine is down, then finalize,
                // release, return to Idle, and surface the failure.
                if let Err(e) = inner.adapter.stop().await {
                    tracing::debug!(error = %e, "Engine stop after error failed");
                }
                inner.finish_session(Some(error)).await;
                break;
            }
            Some(EngineEvent::Stopped) | None => {
                inner.finish_session(None).await;
                break;
            }
        }
    }
}
