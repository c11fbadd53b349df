//! CLI argument definitions for the Murmur demo binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which mock engine environment the demo session runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DemoBackend {
    /// Simulate a native application shell with its on-device engine.
    Native,
    /// Simulate a browser with an in-process recognizer.
    Browser,
}

/// Murmur — speech dictation coordinator demo.
#[derive(Parser, Debug)]
#[command(name = "murmur", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Locale to recognize (BCP-47 tag), e.g. en-US.
    #[arg(long = "language")]
    pub language: Option<String>,

    /// Which mock engine environment to run the demo session against.
    #[arg(long = "backend", value_enum, default_value_t = DemoBackend::Native)]
    pub backend: DemoBackend,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > MURMUR_CONFIG env var > ~/.murmur/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("MURMUR_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".murmur").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".murmur").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_prefers_flag() {
        let args = CliArgs {
            config: None,
            log_level: Some("debug".to_string()),
            language: None,
            backend: DemoBackend::Native,
        };
        assert_eq!(args.resolve_log_level("info"), "debug");
    }

    #[test]
    fn test_log_level_falls_back_to_config() {
        let args = CliArgs {
            config: None,
            log_level: None,
            language: None,
            backend: DemoBackend::Browser,
        };
        assert_eq!(args.resolve_log_level("warn"), "warn");
    }

    #[test]
    fn test_config_flag_wins() {
        let args = CliArgs {
            config: Some(PathBuf::from("/tmp/custom.toml")),
            log_level: None,
            language: None,
            backend: DemoBackend::Native,
        };
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/custom.toml"));
    }
}
