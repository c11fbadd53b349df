//! Audio capture resource ownership and release sequencing.
//!
//! The `ResourceLifecycle` exclusively owns the capture handle for one
//! session and guarantees release on every exit path: normal stop, error,
//! aborted startup, and teardown. For the browser backend the handle is a
//! microphone stream whose tracks must each be stopped; for the native
//! backend acquisition is implicit in engine start and release is the stop
//! acknowledgment followed by a settle delay that lets the OS audio session
//! wind down before the session end is reported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use murmur_core::types::BackendKind;

/// Constraints requested when opening a microphone stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// One audio track within a capture stream.
///
/// Clones share the underlying stop flag, so a bridge can retain a handle
/// to observe that the coordinator stopped the track.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    label: String,
    stopped: Arc<AtomicBool>,
}

impl AudioTrack {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stop the track. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// A microphone stream issued by the browser media-capture API.
#[derive(Debug, Clone, Default)]
pub struct CaptureStream {
    tracks: Vec<AudioTrack>,
}

impl CaptureStream {
    pub fn new(tracks: Vec<AudioTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[AudioTrack] {
        &self.tracks
    }

    /// Stop every track in the stream.
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Exclusive owner of the session's audio capture handle.
///
/// Holding the handle here rather than in a module-level slot means release
/// cannot be skipped: `release()` is wired into every exit path of the
/// coordinator, and take-semantics make repeated calls harmless.
#[derive(Debug)]
pub struct ResourceLifecycle {
    backend: BackendKind,
    settle_delay: Duration,
    stream: Mutex<Option<CaptureStream>>,
}

impl ResourceLifecycle {
    pub fn new(backend: BackendKind, settle_delay: Duration) -> Self {
        Self {
            backend,
            settle_delay,
            stream: Mutex::new(None),
        }
    }

    /// Take ownership of a capture stream for the current session.
    ///
    /// `None` is the native case, where acquisition is implicit in engine
    /// start and there is nothing to hold.
    pub fn adopt(&self, stream: Option<CaptureStream>) {
        let mut guard = self.stream.lock().expect("stream mutex poisoned");
        if let Some(stream) = stream {
            tracing::debug!(tracks = stream.tracks().len(), "Capture stream acquired");
            *guard = Some(stream);
        }
    }

    /// Whether a capture stream is currently held.
    pub fn holds_stream(&self) -> bool {
        self.stream.lock().expect("stream mutex poisoned").is_some()
    }

    /// Release the session's audio resources.
    ///
    /// Browser: stops every issued track. Native: sleeps the settle delay
    /// so the OS audio session fully releases before the caller observes
    /// session end. Idempotent; the second call finds nothing to do.
    pub async fn release(&self) {
        let stream = self
            .stream
            .lock()
            .expect("stream mutex poisoned")
            .take();

        if let Some(stream) = stream {
            stream.stop_all();
            tracing::debug!(tracks = stream.tracks().len(), "Capture stream released");
        }

        if self.backend == BackendKind::Native && !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
            tracing::debug!(delay_ms = self.settle_delay.as_millis() as u64, "Native audio settle complete");
        }
    }

    /// Synchronous best-effort release for teardown paths that cannot await.
    ///
    /// Stops any held tracks but skips the settle delay.
    pub fn release_blocking(&self) {
        let stream = self
            .stream
            .lock()
            .expect("stream mutex poisoned")
            .take();
        if let Some(stream) = stream {
            stream.stop_all();
            tracing::debug!("Capture stream released during teardown");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
