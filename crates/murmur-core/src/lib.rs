pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{DictationConfig, GeneralConfig, MurmurConfig};
pub use error::{MurmurError, Result};
pub use events::DictationEvent;
pub use types::*;
