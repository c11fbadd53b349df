//! Platform capability detection.
//!
//! Runs once at coordinator construction and is cached for the coordinator's
//! lifetime; it is never re-evaluated mid-session. No network or permission
//! calls happen here.

use murmur_core::types::BackendKind;

use crate::bridge::{BrowserSpeech, NativeBridge};

/// What the environment offers, decided once and cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// Which backend this environment selects. Decided by where the process
    /// runs, independent of whether the engine there actually works.
    pub backend: BackendKind,
    /// Whether the selected backend's engine is usable.
    pub supported: bool,
    /// Whether the execution context is transport-confidential.
    pub secure_context: bool,
}

/// Detects the runtime environment and the reachable speech backend.
pub struct CapabilityDetector;

impl CapabilityDetector {
    /// Probe the environment.
    ///
    /// Inside a native application shell the backend is native and support
    /// is confirmed by the bridge's asynchronous capability query (a failing
    /// query counts as unavailable). Otherwise the backend is the browser
    /// and support is the presence of its recognizer constructor.
    pub async fn detect<N: NativeBridge, B: BrowserSpeech>(
        native: &N,
        browser: &B,
    ) -> PlatformCapabilities {
        if native.shell_active() {
            let supported = match native.available().await {
                Ok(available) => available,
                Err(e) => {
                    tracing::warn!(error = %e, "Native capability query failed");
                    false
                }
            };
            let caps = PlatformCapabilities {
                backend: BackendKind::Native,
                supported,
                secure_context: native.secure_context(),
            };
            tracing::info!(supported, "Native speech backend selected");
            return caps;
        }

        let supported = browser.recognizer_present();
        let caps = PlatformCapabilities {
            backend: BackendKind::Browser,
            supported,
            secure_context: browser.secure_context(),
        };
        tracing::info!(supported, "Browser speech backend selected");
        caps
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{MockBrowserSpeech, MockNativeBridge};

    #[tokio::test]
    async fn test_native_shell_selects_native() {
        let caps =
            CapabilityDetector::detect(&MockNativeBridge::new(), &MockBrowserSpeech::new()).await;
        assert_eq!(caps.backend, BackendKind::Native);
        assert!(caps.supported);
        assert!(caps.secure_context);
    }

    #[tokio::test]
    async fn test_native_shell_without_engine_is_unsupported() {
        let native = MockNativeBridge::new().unavailable();
        let caps = CapabilityDetector::detect(&native, &MockBrowserSpeech::new()).await;
        // The environment still selects native; it does not fall back to the
        // browser engine inside a shell.
        assert_eq!(caps.backend, BackendKind::Native);
        assert!(!caps.supported);
    }

    #[tokio::test]
    async fn test_no_shell_selects_browser() {
        let native = MockNativeBridge::new().without_shell();
        let caps = CapabilityDetector::detect(&native, &MockBrowserSpeech::new()).await;
        assert_eq!(caps.backend, BackendKind::Browser);
        assert!(caps.supported);
    }

    #[tokio::test]
    async fn test_browser_without_recognizer_is_unsupported() {
        let native = MockNativeBridge::new().without_shell();
        let browser = MockBrowserSpeech::new().without_recognizer();
        let caps = CapabilityDetector::detect(&native, &browser).await;
        assert_eq!(caps.backend, BackendKind::Browser);
        assert!(!caps.supported);
    }

    #[tokio::test]
    async fn test_secure_context_follows_selected_backend() {
        let native = MockNativeBridge::new().without_shell();
        let browser = MockBrowserSpeech::new().insecure();
        let caps = CapabilityDetector::detect(&native, &browser).await;
        assert!(!caps.secure_context);
    }
}
