use thiserror::Error;

/// Top-level error type for the Murmur system.
///
/// Each variant wraps a subsystem-specific error. Subsystem crates define their
/// own error types and implement `From<SubsystemError> for MurmurError` so
/// that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MurmurError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Permission error: {0}")]
    Permission(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Dictation error: {0}")]
    Dictation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for MurmurError {
    fn from(err: toml::de::Error) -> Self {
        MurmurError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MurmurError {
    fn from(err: toml::ser::Error) -> Self {
        MurmurError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MurmurError {
    fn from(err: serde_json::Error) -> Self {
        MurmurError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Murmur operations.
pub type Result<T> = std::result::Result<T, MurmurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MurmurError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(MurmurError, &str)> = vec![
            (
                MurmurError::Platform("no backend".to_string()),
                "Platform error: no backend",
            ),
            (
                MurmurError::Permission("mic denied".to_string()),
                "Permission error: mic denied",
            ),
            (
                MurmurError::Capture("stream lost".to_string()),
                "Capture error: stream lost",
            ),
            (
                MurmurError::Engine("recognizer crashed".to_string()),
                "Engine error: recognizer crashed",
            ),
            (
                MurmurError::Dictation("invalid transition".to_string()),
                "Dictation error: invalid transition",
            ),
            (
                MurmurError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "device not found");
        let murmur_err: MurmurError = io_err.into();
        assert!(matches!(murmur_err, MurmurError::Io(_)));
        assert!(murmur_err.to_string().contains("device not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let err: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        assert!(err.is_err());
        let murmur_err: MurmurError = err.unwrap_err().into();
        assert!(matches!(murmur_err, MurmurError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad_json = "{ invalid json }";
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        assert!(err.is_err());
        let murmur_err: MurmurError = err.unwrap_err().into();
        assert!(matches!(murmur_err, MurmurError::Serialization(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(MurmurError::Engine("fail".to_string()))
        }

        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_debug_impl() {
        let err = MurmurError::Permission("test debug".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("Permission"));
        assert!(debug_str.contains("test debug"));
    }
}
