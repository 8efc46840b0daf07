// ndpak-parsers/src/config.rs
//! Options that steer decoding and injection.
//!
//! One immutable [`PakOptions`] value is built up front and passed by
//! reference into every decoder and mutator entry point.

use std::path::{Path, PathBuf};

use ndpak_core::Game;
use serde::{Deserialize, Serialize};

use crate::traits::ParseResult;

/// Files at or above this size are memory-mapped instead of read
pub const MEMORY_MAPPING_THRESHOLD: u64 = 16 * 1024 * 1024;

/// Configuration options for reading and rewriting containers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PakOptions {
    /// Title; selects base-skeleton hints and dictionary layout
    pub game: Game,
    /// Positions are multiplied by this on read and divided on write
    pub global_scale: f32,
    /// Resolve a base skeleton when skinned geometry has no joints
    pub load_base_skeleton: bool,
    /// Explicit base skeleton, absolute or relative to `base_directory`
    pub base_skeleton: Option<PathBuf>,
    /// Game root used for skeleton hints and texture dictionaries
    pub base_directory: Option<PathBuf>,
    /// Decode and inject LOD>0 submeshes
    pub include_lods: bool,
    /// Resolve VRAM entries to pixel data
    pub load_textures: bool,
    /// Synthesize placeholder and derived textures
    pub convert_textures: bool,
    /// Keep every texture, not only the ones assigned to a slot
    pub load_all_textures: bool,
    /// Decode the first half-float vec4 stream as vertex colors
    pub read_colors: bool,
    /// Log every shader parameter
    pub print_material_params: bool,
    /// Re-parent `_helper`/`_grp` stragglers onto their name match
    pub reparent_helpers: bool,
    /// Fall back to the raw stored offset for pointers without a fixup
    pub tolerant_pointers: bool,
    /// Path to `NDTextureHashes.json`
    pub texture_hash_index: Option<PathBuf>,
}

impl Default for PakOptions {
    fn default() -> Self {
        Self {
            game: Game::Uncharted4,
            global_scale: 100.0,
            load_base_skeleton: true,
            base_skeleton: None,
            base_directory: None,
            include_lods: false,
            load_textures: false,
            convert_textures: true,
            load_all_textures: false,
            read_colors: false,
            print_material_params: false,
            reparent_helpers: true,
            tolerant_pointers: false,
            texture_hash_index: None,
        }
    }
}

impl PakOptions {
    /// Defaults with the title detected from `path`
    pub fn for_path(path: &Path) -> Self {
        Self {
            game: Game::detect_from_path(path).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Load options from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> ParseResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_game(mut self, game: Game) -> Self {
        self.game = game;
        self
    }

    pub fn with_base_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_directory = Some(dir.into());
        self
    }

    /// Directory that skeleton hints and dictionary paths are relative to.
    ///
    /// Without an explicit directory, the root is found from the nearest
    /// `actorNN` folder above the container: its parent for Uncharted
    /// titles, the folder above the world folder otherwise.
    pub fn resolve_base_directory(&self, pak_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(dir) = &self.base_directory {
            return Some(dir.clone());
        }
        let pak_path = pak_path?;
        let actor_dir = pak_path.ancestors().skip(1).find(|dir| {
            dir.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_ascii_lowercase().starts_with("actor"))
        });
        let root = match actor_dir {
            Some(dir) if self.game.is_uncharted() => dir.parent(),
            Some(dir) => dir.parent().and_then(Path::parent),
            None => pak_path.parent().and_then(Path::parent),
        };
        root.map(Path::to_path_buf)
    }
}
