// ndpak-export/src/textures/mod.rs
//! Texture decoding, encoding and file output
//!
//! [`BlockCodec`] is the [`TextureCodec`](ndpak_parsers::TextureCodec) the
//! engine calls for pixel work; [`TextureWriter`] turns loaded textures
//! into DDS or PNG files.

mod codec;
mod writer;

pub use codec::{decode_rgba, encode_rgba, BlockCodec};
pub use writer::{ImageFormat, TextureWriter};

use ndpak_parsers::ParseError;
use thiserror::Error;

/// Texture conversion errors
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Buffer too small: {wanted} bytes needed, {len} available")]
    ShortBuffer { wanted: usize, len: usize },
}

pub type TextureResult<T> = Result<T, TextureError>;

impl From<TextureError> for ParseError {
    fn from(err: TextureError) -> Self {
        match err {
            TextureError::Io(e) => ParseError::Io(e),
            TextureError::UnsupportedFormat(what) => ParseError::Unsupported(what),
            other => ParseError::InvalidStructure(other.to_string()),
        }
    }
}
