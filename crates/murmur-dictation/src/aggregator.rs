//! Partial/final result aggregation.
//!
//! Bridges the asymmetry between backends: the browser engine declares its
//! own final segments, while the native engine only ever reports cumulative
//! partials and relies on the coordinator to commit the last one when the
//! session stops.

use murmur_core::types::ResultEvent;

/// Buffers the most recent partial result and promotes it to a final result
/// on session end if the backend never explicitly finalized it.
///
/// Take-semantics in `finalize` make the synthesized final exactly-once:
/// across a session, the caller sees zero or more partials followed by one
/// final per utterance boundary, and a session with no speech produces no
/// results at all.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    last_partial: Option<String>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear any leftover fragment. Called when a session starts.
    pub fn reset(&mut self) {
        self.last_partial = None;
    }

    /// Record an in-progress fragment, overwriting the previous one.
    ///
    /// Empty fragments are dropped: they carry nothing to forward and must
    /// not leave a stale value to be finalized later.
    pub fn on_partial(&mut self, text: &str) -> Option<ResultEvent> {
        if text.is_empty() {
            return None;
        }
        self.last_partial = Some(text.to_string());
        Some(ResultEvent::partial(text))
    }

    /// Pass through a backend-declared final segment.
    ///
    /// The outstanding partial is superseded by the engine's own commit and
    /// is cleared so it cannot be finalized a second time.
    pub fn on_final(&mut self, text: &str) -> ResultEvent {
        self.last_partial = None;
        ResultEvent::finalized(text)
    }

    /// Promote the outstanding partial to a synthesized final, exactly once.
    ///
    /// Returns `None` when there is nothing outstanding: the engine already
    /// finalized, or no speech was ever received.
    pub fn finalize(&mut self) -> Option<ResultEvent> {
        self.last_partial
            .take()
            .map(|text| ResultEvent::finalized(text))
    }

    /// The outstanding fragment, for session diagnostics.
    pub fn last_partial(&self) -> Option<&str> {
        self.last_partial.as_deref()
    }
}

// =============================================================================
// Tests
// =============================================================================
