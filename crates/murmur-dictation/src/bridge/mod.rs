//! External speech engine ports.
//!
//! The coordinator does not perform speech-to-text itself; it drives one of
//! two engines it does not control. Each engine is modeled as a trait with
//! its own event vocabulary and permission channel, plus a scriptable mock
//! used by tests and the demo binary. Real implementations bind these traits
//! to the platform bridge or the browser recognizer.

pub mod browser;
pub mod native;

pub use browser::{BrowserSpeech, BrowserSpeechEvent, MockBrowserSpeech};
pub use native::{MockNativeBridge, NativeBridge, NativeBridgeEvent};
