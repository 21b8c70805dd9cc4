//! Error handling for fontdeb
//!
//! Provides centralized error handling with proper error types using thiserror.
//! All errors in the crate should use these types for consistency.

use thiserror::Error;

/// Main error type for fontdeb
#[derive(Error, Debug)]
pub enum FontdebError {
    /// IO errors (file operations, temp dirs, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Recipe errors (loading, parsing, validation)
    #[error("Recipe error: {0}")]
    Recipe(String),

    /// Archive root errors (sources.list, key seeding, index refresh)
    #[error("Archive error: {0}")]
    Archive(String),

    /// Patch application errors
    #[error("Patch error: {0}")]
    Patch(String),

    /// Validation errors (release codenames, architectures, user input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A delegated tool exited with a non-zero status
    #[error("{tool} failed with exit code {code}")]
    Tool { tool: String, code: i32 },

    /// A delegated tool was terminated by a signal
    #[error("{tool} was terminated by a signal")]
    Signal { tool: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General errors (catch-all for edge cases)
    #[error("{0}")]
    General(String),
}

/// Result type alias for fontdeb operations
pub type Result<T> = std::result::Result<T, FontdebError>;

// Convenient error constructors
impl FontdebError {
    /// Create a recipe error
    pub fn recipe(msg: impl Into<String>) -> Self {
        Self::Recipe(msg.into())
    }

    /// Create an archive error
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a patch error
    pub fn patch(msg: impl Into<String>) -> Self {
        Self::Patch(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a general error
    pub fn general(msg: impl Into<String>) -> Self {
        Self::General(msg.into())
    }

    /// Exit code this error should map to when it aborts the run.
    ///
    /// The first failing subprocess's status is propagated; everything else
    /// is a plain failure (1).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Tool { code, .. } => *code,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FontdebError::validation("unknown release codename");
        assert_eq!(
            err.to_string(),
            "Validation error: unknown release codename"
        );

        let err = FontdebError::patch("series file unreadable");
        assert_eq!(err.to_string(), "Patch error: series file unreadable");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FontdebError = io_err.into();
        assert!(matches!(err, FontdebError::Io(_)));
    }

    #[test]
    fn test_tool_error_carries_exit_code() {
        let err = FontdebError::Tool {
            tool: "dpkg-buildpackage".to_string(),
            code: 2,
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "dpkg-buildpackage failed with exit code 2");
    }

    #[test]
    fn test_non_tool_errors_exit_one() {
        assert_eq!(FontdebError::general("boom").exit_code(), 1);
        let err = FontdebError::Signal {
            tool: "apt-get".to_string(),
        };
        assert_eq!(err.exit_code(), 1);
    }
}
