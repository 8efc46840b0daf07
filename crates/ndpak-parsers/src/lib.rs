//! ndpak-parsers
//!
//! Reader and rewriter for Naughty Dog PAK containers.
//!
//! # Supported Revisions
//!
//! | Revision | Magic | Resource discovery | Streams |
//! |----------|-------|--------------------|---------|
//! | Legacy   | `0xA79` and variants | page-header directory | fixed stride |
//! | Tlou2    | `0xA79` + login marker | page-header directory | quantized |
//! | Tloup1   | `0xA7D`, `0x10A7D` | hashed login table | quantized |
//!
//! # Example
//!
//! ```rust,ignore
//! use ndpak_parsers::{PakContainer, PakOptions};
//!
//! let options = PakOptions::for_path(path);
//! let pak = PakContainer::open(path, &options)?;
//! let scene = pak.decode_scene()?;
//! println!("{} meshes, {} bones", scene.meshes.len(), scene.bones.len());
//! ```

pub mod config;
pub mod cursor;
pub mod inject;
pub mod logging;
pub mod pak;
pub mod traits;

pub use config::{PakOptions, MEMORY_MAPPING_THRESHOLD};
pub use cursor::{ByteCursor, ByteWriter};
pub use traits::{ParseError, ParseResult, ParseResultExt, Parser};

pub use pak::{
    BaseSkeletonResolver, DecodedMesh, DecodedScene, Material, MeshSink, PakContainer, PakParser,
    Revision, SceneBuilder, SceneSink, Semantic, Skeleton, TextureCodec, TextureRequest,
};

pub use inject::{InjectOptions, InjectReport, Injector};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
