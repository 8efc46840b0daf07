//! ndpak export pipeline
//!
//! Turns decoded containers into files:
//! - JSON (scenes, container summaries)
//! - DDS/PNG (textures)
//!
//! It also provides [`BlockCodec`], the pixel codec the engine needs for
//! texture decoding and TGA embedding.

pub mod json;
pub mod textures;

pub use json::{JsonExportOptions, JsonExporter};
pub use textures::{BlockCodec, ImageFormat, TextureError, TextureResult, TextureWriter};
