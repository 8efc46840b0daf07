// ndpak-parsers/src/traits.rs
//! Core traits and the error type shared by every container decoder.
//!
//! Decoders take their configuration explicitly as `&PakOptions`; nothing
//! in this crate reads ambient state.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::config::PakOptions;

/// Errors that can occur while reading or rewriting a container
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized container magic: 0x{found:X}")]
    UnrecognizedMagic { found: u32 },

    #[error("Truncated data: wanted {wanted} bytes at 0x{offset:X}, buffer is {len} bytes")]
    TruncatedData { offset: u64, wanted: u64, len: u64 },

    #[error("Pointer at 0x{address:X} has no fixup record")]
    UnfixedPointer { address: u64 },

    #[error("Base skeleton not found for {path}")]
    MissingBaseSkeleton { path: String },

    #[error("Texture not found: {name}")]
    TextureNotFound { name: String },

    #[error("Byte read at 0x{offset:X} while {bits} bits are pending in the bit cursor")]
    MisalignedBitRead { offset: u64, bits: u8 },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error under any context wrappers
    pub fn root(&self) -> &ParseError {
        match self {
            ParseError::Nested { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<ParseError> for ndpak_core::Error {
    fn from(err: ParseError) -> Self {
        use ndpak_core::Error as E;
        match err {
            ParseError::Io(e) => E::Io(e),
            ParseError::Json(e) => E::External(e.to_string()),
            ParseError::UnrecognizedMagic { found } => E::UnrecognizedMagic { found },
            ParseError::TruncatedData { offset, wanted, len } => {
                E::TruncatedData { offset, wanted, len }
            }
            ParseError::UnfixedPointer { address } => E::UnfixedPointer { address },
            ParseError::MissingBaseSkeleton { path } => E::MissingBaseSkeleton { path },
            ParseError::TextureNotFound { name } => E::TextureNotFound { name },
            ParseError::MisalignedBitRead { .. } | ParseError::InvalidStructure(_) => {
                E::invalid_data(err.to_string())
            }
            ParseError::Unsupported(message) => E::Unsupported { message },
            ParseError::Nested { context, source } => {
                E::from(*source).with_context(context)
            }
        }
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Extension for attaching context to parse results
pub trait ParseResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> ParseResult<T>;
}

impl<T> ParseResultExt<T> for ParseResult<T> {
    fn context(self, context: impl Into<String>) -> ParseResult<T> {
        self.map_err(|e| e.with_context(context))
    }
}

/// Core trait for container parsers
pub trait Parser: Send + Sync {
    /// The parsed output type
    type Output: Send + Sync;

    /// Returns a human-readable name for this parser
    fn name(&self) -> &str;

    /// Returns the file extensions this parser handles (e.g., ["pak"])
    fn extensions(&self) -> &[&str];

    /// Cheap check on the first bytes of a file
    fn can_parse(&self, header: &[u8]) -> bool;

    /// Parse an owned buffer
    fn parse_bytes(&self, data: Vec<u8>, options: &PakOptions) -> ParseResult<Self::Output>;

    /// Parse from a reader
    fn parse<R: Read>(&self, mut reader: R, options: &PakOptions) -> ParseResult<Self::Output>
    where
        Self: Sized,
    {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.parse_bytes(data, options)
    }

    /// Parse from a file path
    fn parse_file(&self, path: &Path, options: &PakOptions) -> ParseResult<Self::Output> {
        let data = std::fs::read(path)?;
        self.parse_bytes(data, options)
            .map_err(|e| e.with_context(path.display().to_string()))
    }

    /// Check the file extension against [`Parser::extensions`]
    fn handles_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions().iter().any(|e| e.eq_ignore_ascii_case(&ext)))
    }
}
