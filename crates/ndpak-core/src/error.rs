//! Unified error handling for ndpak
//!
//! Every crate in the workspace converts its local error type into this
//! one at the crate boundary so the CLI has a single type to report.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all ndpak operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // ==================== Container Errors ====================

    /// Container does not start with a known magic
    #[error("Unrecognized container magic: {found:#X}")]
    UnrecognizedMagic {
        found: u32,
    },

    /// A read ran past the end of the container
    #[error("Truncated data: wanted {wanted} bytes at offset {offset:#X} (container is {len} bytes)")]
    TruncatedData {
        offset: u64,
        wanted: u64,
        len: u64,
    },

    /// A non-null pointer field has no fixup record
    #[error("Pointer at {address:#X} has no fixup record")]
    UnfixedPointer {
        address: u64,
    },

    /// Invalid data structure
    #[error("Invalid data: {message}")]
    InvalidData {
        message: String,
    },

    /// Layout or feature the engine does not handle
    #[error("Unsupported: {message}")]
    Unsupported {
        message: String,
    },

    // ==================== Asset Errors ====================

    /// A skinned container needs a base skeleton that could not be located
    #[error("Base skeleton not found for {path}")]
    MissingBaseSkeleton {
        path: String,
    },

    /// A texture could not be found locally or in any dictionary
    #[error("Texture not found: {name}")]
    TextureNotFound {
        name: String,
    },

    // ==================== Export Errors ====================

    /// Unsupported export format
    #[error("Unsupported export format: {format}")]
    UnsupportedFormat {
        format: String,
    },

    /// Export failed
    #[error("Export failed: {message}")]
    ExportFailed {
        message: String,
    },

    // ==================== Configuration Errors ====================

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
    },

    // ==================== General Errors ====================

    /// Internal error (should not happen)
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },

    /// Error with added context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// External error (from other crates)
    #[error("{0}")]
    External(String),
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
        }
    }

    /// Create an unsupported-layout error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported {
            message: message.into(),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Error::FileNotFound(_)
                | Error::MissingBaseSkeleton { .. }
                | Error::TextureNotFound { .. }
        )
    }

    /// Check if this is a parse/format error
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self.root(),
            Error::UnrecognizedMagic { .. }
                | Error::TruncatedData { .. }
                | Error::UnfixedPointer { .. }
                | Error::InvalidData { .. }
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::UnfixedPointer { address: 0x40 };
        let contextualized = err.with_context("while resolving submesh streams");

        let message = contextualized.to_string();
        assert!(message.contains("while resolving submesh streams"));
        assert!(message.contains("0x40"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::FileNotFound(PathBuf::from("/test")).is_not_found());
        assert!(Error::TextureNotFound { name: "a.dds".into() }.is_not_found());
        assert!(!Error::UnrecognizedMagic { found: 0 }.is_not_found());
    }

    #[test]
    fn test_is_parse_error_sees_through_context() {
        let err = Error::TruncatedData { offset: 8, wanted: 4, len: 10 }.with_context("header");
        assert!(err.is_parse_error());
        assert!(!Error::FileNotFound(PathBuf::from("/test")).is_parse_error());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::MissingBaseSkeleton { path: "hero.pak".into() });
        let with_context = result.context("loading skin");

        assert!(with_context.is_err());
        assert!(with_context.unwrap_err().to_string().contains("loading skin"));
    }
}
