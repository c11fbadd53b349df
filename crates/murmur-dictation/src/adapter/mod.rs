//! Backend engine adapters behind one capability set.
//!
//! Both adapters expose the same operations; the session state machine never
//! branches on backend kind except through the `EngineAdapter` enum, which is
//! selected once at coordinator construction and never switched at runtime.
//! Each adapter normalizes its bridge's raw event vocabulary into
//! `EngineEvent` and its error shapes into the shared taxonomy.

pub mod browser;
pub mod native;

pub use browser::BrowserEngineAdapter;
pub use native::NativeEngineAdapter;

use tokio::sync::mpsc;

use murmur_core::types::{BackendKind, EngineOptions, PermissionSnapshot};

use crate::bridge::{BrowserSpeech, NativeBridge};
use crate::error::DictationError;
use crate::resource::CaptureStream;

/// Normalized engine events consumed by the coordinator's pump.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// In-progress transcript fragment.
    Partial(String),
    /// Backend-declared final segment. Only the browser engine emits these.
    Final(String),
    /// The engine acknowledged a stop or ended on its own.
    Stopped,
    /// Normalized mid-session failure.
    Error(DictationError),
}

/// The engine selected for this coordinator, exactly one of two variants.
pub enum EngineAdapter<N: NativeBridge, B: BrowserSpeech> {
    Native(NativeEngineAdapter<N>),
    Browser(BrowserEngineAdapter<B>),
}

impl<N: NativeBridge, B: BrowserSpeech> EngineAdapter<N, B> {
    pub fn kind(&self) -> BackendKind {
        match self {
            EngineAdapter::Native(_) => BackendKind::Native,
            EngineAdapter::Browser(_) => BackendKind::Browser,
        }
    }

    /// Non-mutating permission query.
    pub async fn check_permission(&self) -> Result<PermissionSnapshot, DictationError> {
        match self {
            EngineAdapter::Native(adapter) => adapter.check_permission().await,
            EngineAdapter::Browser(adapter) => adapter.check_permission().await,
        }
    }

    /// Permission request; may suspend indefinitely awaiting the user.
    pub async fn request_permission(&self) -> Result<PermissionSnapshot, DictationError> {
        match self {
            EngineAdapter::Native(adapter) => adapter.request_permission().await,
            EngineAdapter::Browser(adapter) => adapter.request_permission().await,
        }
    }

    /// Acquire the audio capture handle ahead of engine start.
    ///
    /// Returns `Some` for the browser backend; `None` for native, whose
    /// acquisition is implicit in `start()`.
    pub async fn acquire_capture(&self) -> Result<Option<CaptureStream>, DictationError> {
        match self {
            EngineAdapter::Native(adapter) => adapter.acquire_capture().await,
            EngineAdapter::Browser(adapter) => adapter.acquire_capture().await,
        }
    }

    /// Begin capture and return the normalized event stream for this session.
    pub async fn start(
        &self,
        options: &EngineOptions,
    ) -> Result<mpsc::UnboundedReceiver<EngineEvent>, DictationError> {
        match self {
            EngineAdapter::Native(adapter) => adapter.start(options).await,
            EngineAdapter::Browser(adapter) => adapter.start(options).await,
        }
    }

    /// Stop capture. Idempotent; stopping an idle engine is a no-op.
    pub async fn stop(&self) -> Result<(), DictationError> {
        match self {
            EngineAdapter::Native(adapter) => adapter.stop().await,
            EngineAdapter::Browser(adapter) => adapter.stop().await,
        }
    }
}
