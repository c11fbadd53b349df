use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{EngineOptions, LanguageTag};

/// Top-level configuration for the Murmur dictation coordinator.
///
/// Loaded from `~/.murmur/config.toml` by default. Each section corresponds
/// to a subsystem or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MurmurConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub dictation: DictationConfig,
}

impl MurmurConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MurmurConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Dictation coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictationConfig {
    /// Locale the engine should recognize (BCP-47 tag).
    pub language_tag: String,
    /// Forward in-progress fragments to the caller.
    pub wants_partial_results: bool,
    /// Prefer on-device recognition even when a server path exists.
    pub prefer_on_device_only: bool,
    /// Engine-side silence auto-stop, in milliseconds. Omit to keep the
    /// engine's own default.
    pub silence_timeout_ms: Option<u32>,
    /// Pause after native engine stop before the session end is reported,
    /// letting the OS audio session release. Platform tuning, not a
    /// correctness requirement.
    pub settle_delay_ms: u64,
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            language_tag: "en-US".to_string(),
            wants_partial_results: true,
            prefer_on_device_only: false,
            silence_timeout_ms: None,
            settle_delay_ms: 150,
        }
    }
}

impl DictationConfig {
    /// The engine options this configuration resolves to.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            language: LanguageTag::new(self.language_tag.clone()),
            wants_partial_results: self.wants_partial_results,
            prefer_on_device_only: self.prefer_on_device_only,
            silence_timeout_ms: self.silence_timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MurmurConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.dictation.language_tag, "en-US");
        assert!(config.dictation.wants_partial_results);
        assert!(!config.dictation.prefer_on_device_only);
        assert!(config.dictation.silence_timeout_ms.is_none());
        assert_eq!(config.dictation.settle_delay_ms, 150);
    }

    #[test]
    fn test_engine_options_resolution() {
        let mut config = DictationConfig::default();
        config.language_tag = "ja-JP".to_string();
        config.silence_timeout_ms = Some(4000);

        let opts = config.engine_options();
        assert_eq!(opts.language.as_str(), "ja-JP");
        assert_eq!(opts.silence_timeout_ms, Some(4000));
        assert!(opts.wants_partial_results);
    }

    #[test]
    fn test_empty_language_tag_resolves_to_default() {
        let mut config = DictationConfig::default();
        config.language_tag = String::new();
        assert_eq!(config.engine_options().language.as_str(), "en-US");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = MurmurConfig::default();
        config.dictation.language_tag = "de-DE".to_string();
        config.dictation.settle_delay_ms = 50;
        config.save(&path).unwrap();

        let loaded = MurmurConfig::load(&path).unwrap();
        assert_eq!(loaded.dictation.language_tag, "de-DE");
        assert_eq!(loaded.dictation.settle_delay_ms, 50);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(MurmurConfig::load(&path).is_err());
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let config = MurmurConfig::load_or_default(&path);
        assert_eq!(config.dictation.language_tag, "en-US");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[dictation]\nlanguage_tag = \"nl-NL\"\n").unwrap();

        let config = MurmurConfig::load(&path).unwrap();
        assert_eq!(config.dictation.language_tag, "nl-NL");
        assert_eq!(config.dictation.settle_delay_ms, 150);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_malformed_toml_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[dictation\nbroken").unwrap();

        let config = MurmurConfig::load_or_default(&path);
        assert_eq!(config.dictation.language_tag, "en-US");
    }
}
