//! Adapter over the native shell's speech engine.
//!
//! The native engine delivers only cumulative partial text per utterance and
//! acknowledges stops through its listening-state toggle; it never declares
//! finals itself, so finalization of the last partial is the result
//! aggregator's job. Audio acquisition is implicit in engine start.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use murmur_core::types::{EngineOptions, PermissionSnapshot};

use crate::adapter::EngineEvent;
use crate::bridge::{NativeBridge, NativeBridgeEvent};
use crate::error::DictationError;
use crate::resource::CaptureStream;

/// Adapter wrapping the native platform bridge.
///
/// Reusable across sessions; the `capturing` flag guards against overlapping
/// capture from one adapter instance.
pub struct NativeEngineAdapter<N: NativeBridge> {
    bridge: N,
    capturing: Arc<AtomicBool>,
}

impl<N: NativeBridge> NativeEngineAdapter<N> {
    pub fn new(bridge: N) -> Self {
        Self {
            bridge,
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn bridge(&self) -> &N {
        &self.bridge
    }

    pub async fn check_permission(&self) -> Result<PermissionSnapshot, DictationError> {
        self.bridge
            .check_permissions()
            .await
            .map_err(|e| DictationError::Unknown(e.to_string()))
    }

    pub async fn request_permission(&self) -> Result<PermissionSnapshot, DictationError> {
        self.bridge
            .request_permissions()
            .await
            .map_err(|e| DictationError::Unknown(e.to_string()))
    }

    /// Native audio acquisition happens inside engine start; there is no
    /// separate handle to own.
    pub async fn acquire_capture(&self) -> Result<Option<CaptureStream>, DictationError> {
        Ok(None)
    }

    pub async fn start(
        &self,
        options: &EngineOptions,
    ) -> Result<mpsc::UnboundedReceiver<EngineEvent>, DictationError> {
        if self.capturing.swap(true, Ordering::SeqCst) {
            return Err(DictationError::StartFailed(
                "native engine already capturing".to_string(),
            ));
        }

        // Subscribe before starting so no early event is lost.
        let raw = self.bridge.events();
        if let Err(e) = self.bridge.start(options).await {
            self.capturing.store(false, Ordering::SeqCst);
            return Err(DictationError::StartFailed(e.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let capturing = Arc::clone(&self.capturing);
        tokio::spawn(forward_events(raw, tx, capturing));
        Ok(rx)
    }

    pub async fn stop(&self) -> Result<(), DictationError> {
        // Delegate unconditionally; the bridge treats an idle stop as a no-op.
        self.bridge
            .stop()
            .await
            .map_err(|e| DictationError::Unknown(e.to_string()))?;
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Map raw bridge events into the normalized stream until a terminal event.
async fn forward_events(
    mut raw: mpsc::UnboundedReceiver<NativeBridgeEvent>,
    tx: mpsc::UnboundedSender<EngineEvent>,
    capturing: Arc<AtomicBool>,
) {
    while let Some(event) = raw.recv().await {
        let mapped = match event {
            NativeBridgeEvent::Partial(text) => EngineEvent::Partial(text),
            // The rising edge carries no information the coordinator needs.
            NativeBridgeEvent::ListeningState(true) => continue,
            NativeBridgeEvent::ListeningState(false) => EngineEvent::Stopped,
            NativeBridgeEvent::Error(detail) => EngineEvent::Error(normalize_error(detail)),
        };

        let terminal = matches!(mapped, EngineEvent::Stopped | EngineEvent::Error(_));
        if tx.send(mapped).is_err() || terminal {
            break;
        }
    }
    capturing.store(false, Ordering::SeqCst);
}

/// Normalize a native bridge error into the shared taxonomy.
///
/// The bridge's detail string is preserved verbatim when present; platform
/// versions that report errors without detail fall into the catch-all.
fn normalize_error(detail: Option<String>) -> DictationError {
    match detail {
        Some(message) => DictationError::Recognition(message),
        None => DictationError::Unknown("native engine error without detail".to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockNativeBridge;

    #[tokio::test]
    async fn test_start_forwards_partials() {
        let bridge = MockNativeBridge::new();
        let adapter = NativeEngineAdapter::new(bridge.clone());

        let mut events = adapter.start(&EngineOptions::default()).await.unwrap();
        bridge.emit_partial("I feel");
        bridge.emit_partial("I feel sad");

        assert!(matches!(events.recv().await, Some(EngineEvent::Partial(t)) if t == "I feel"));
        assert!(matches!(events.recv().await, Some(EngineEvent::Partial(t)) if t == "I feel sad"));
    }

    #[tokio::test]
    async fn test_stop_ack_becomes_stopped() {
        let bridge = MockNativeBridge::new();
        let adapter = NativeEngineAdapter::new(bridge.clone());

        let mut events = adapter.start(&EngineOptions::default()).await.unwrap();
        adapter.stop().await.unwrap();

        assert!(matches!(events.recv().await, Some(EngineEvent::Stopped)));
        // Stream closes after the terminal event.
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_double_start_is_start_failed() {
        let bridge = MockNativeBridge::new();
        let adapter = NativeEngineAdapter::new(bridge.clone());

        let _events = adapter.start(&EngineOptions::default()).await.unwrap();
        let err = adapter.start(&EngineOptions::default()).await.unwrap_err();
        assert!(matches!(err, DictationError::StartFailed(_)));
        // The bridge itself was only started once.
        assert_eq!(bridge.start_calls(), 1);
    }

    #[tokio::test]
    async fn test_bridge_rejection_is_start_failed_and_rearms() {
        let bridge = MockNativeBridge::new().failing_start();
        let adapter = NativeEngineAdapter::new(bridge.clone());

        let err = adapter.start(&EngineOptions::default()).await.unwrap_err();
        assert!(matches!(err, DictationError::StartFailed(_)));
        // The guard was rolled back; a later start reaches the bridge again.
        let _ = adapter.start(&EngineOptions::default()).await;
        assert_eq!(bridge.start_calls(), 2);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let bridge = MockNativeBridge::new();
        let adapter = NativeEngineAdapter::new(bridge.clone());

        adapter.stop().await.unwrap();
        adapter.stop().await.unwrap();
        assert_eq!(bridge.stop_calls(), 2);
    }

    #[tokio::test]
    async fn test_error_with_detail_normalizes_to_recognition() {
        let bridge = MockNativeBridge::new();
        let adapter = NativeEngineAdapter::new(bridge.clone());

        let mut events = adapter.start(&EngineOptions::default()).await.unwrap();
        bridge.emit_error(Some("audio session interrupted".to_string()));

        match events.recv().await {
            Some(EngineEvent::Error(DictationError::Recognition(msg))) => {
                assert_eq!(msg, "audio session interrupted");
            }
            other => panic!("expected recognition error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_without_detail_normalizes_to_unknown() {
        assert!(matches!(
            normalize_error(None),
            DictationError::Unknown(_)
        ));
    }

    #[tokio::test]
    async fn test_acquire_capture_is_implicit() {
        let adapter = NativeEngineAdapter::new(MockNativeBridge::new());
        assert!(adapter.acquire_capture().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_adapter_reusable_after_stop() {
        let bridge = MockNativeBridge::new();
        let adapter = NativeEngineAdapter::new(bridge.clone());

        let _first = adapter.start(&EngineOptions::default()).await.unwrap();
        adapter.stop().await.unwrap();

        let _second = adapter.start(&EngineOptions::default()).await.unwrap();
        assert_eq!(bridge.start_calls(), 2);
    }
}
