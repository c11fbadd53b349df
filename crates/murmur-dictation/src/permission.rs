//! Permission negotiation ahead of every engine start.

use murmur_core::types::PermissionSnapshot;

use crate::adapter::EngineAdapter;
use crate::bridge::{BrowserSpeech, NativeBridge};
use crate::error::DictationError;
use crate::platform::PlatformCapabilities;

/// Sequences permission acquisition for one start attempt.
///
/// The secure-context check runs first and unconditionally for both
/// backends: outside a transport-confidential origin the underlying capture
/// API would refuse to operate, so no prompt is ever issued there. A
/// permission request may suspend indefinitely awaiting a human response;
/// no timeout is imposed here.
pub struct PermissionNegotiator;

impl PermissionNegotiator {
    /// Run the negotiation. Returns the snapshot after the last query or
    /// request, for diagnostic exposure on the session.
    pub async fn negotiate<N: NativeBridge, B: BrowserSpeech>(
        adapter: &EngineAdapter<N, B>,
        capabilities: &PlatformCapabilities,
    ) -> Result<PermissionSnapshot, DictationError> {
        if !capabilities.secure_context {
            tracing::warn!("Dictation start refused: not a secure context");
            return Err(DictationError::NotSecureContext);
        }

        let snapshot = adapter.check_permission().await?;
        if snapshot.granted() {
            tracing::debug!("Permissions already granted");
            return Ok(snapshot);
        }

        tracing::debug!(
            microphone = ?snapshot.microphone,
            speech = ?snapshot.speech,
            "Requesting permissions"
        );
        let snapshot = adapter.request_permission().await?;
        if !snapshot.granted() {
            tracing::warn!(
                microphone = ?snapshot.microphone,
                speech = ?snapshot.speech,
                "Permission request not granted"
            );
            return Err(DictationError::NotAllowed);
        }

        Ok(snapshot)
    }
}

// =============================================================================
// Tests
// =============================================================================
