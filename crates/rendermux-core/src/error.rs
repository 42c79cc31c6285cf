//! Error types for rendermux

/// Result type alias using rendermux's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rendermux operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Renderer failures (render, fragment, or finalize stage)
    #[error("renderer error: {0}")]
    Renderer(String),

    /// Stream processing errors
    #[error("stream error: {0}")]
    Stream(String),

    /// Detection setup errors (rule compilation, bad thresholds)
    #[error("detection error: {0}")]
    Detection(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new renderer error
    pub fn renderer(msg: impl Into<String>) -> Self {
        Self::Renderer(msg.into())
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// Create a new detection error
    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::renderer("katex exploded");
        assert_eq!(err.to_string(), "renderer error: katex exploded");

        let err = Error::stream("already complete");
        assert_eq!(err.to_string(), "stream error: already complete");
    }

    #[test]
    fn test_yaml_conversion() {
        let parsed: std::result::Result<Vec<u32>, _> = serde_yaml::from_str("{not: [a list");
        let err: Error = parsed.unwrap_err().into();
        assert!(matches!(err, Error::Yaml(_)));
    }
}
