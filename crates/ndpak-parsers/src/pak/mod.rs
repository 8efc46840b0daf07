// ndpak-parsers/src/pak/mod.rs
//! Naughty Dog PAK container
//!
//! A PAK is a set of pages addressed through a page table. Pointers
//! inside pages are page-relative and each one has a record in the fixup
//! table naming the page it is relative to.
//!
//! # Format Structure
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (magic, login page/offset, tables)    │
//! ├──────────────────────────────────────────────┤
//! │ Page 0  [20-byte page header | content]      │
//! │ Page 1  [20-byte page header | content]      │
//! │ ...                                          │
//! ├──────────────────────────────────────────────┤
//! │ Raw texture data (rawDataStart = end of the  │
//! │ last page)                                   │
//! └──────────────────────────────────────────────┘
//!   page table:  (base u32, size u32, owner u32) per page
//!   fixup table: 8 fixed rows, then (src u16, dst u16, offset u32)
//! ```

pub mod dds;
pub mod dictionary;
pub mod fixups;
pub mod geometry;
pub mod header;
pub mod joints;
pub mod material;
pub mod pages;
pub mod sink;
pub mod skeleton;
pub mod view;
pub mod vram;
pub mod walker;

pub use dictionary::{TextureDictionary, TextureHashIndex};
pub use fixups::{FixupEntry, PointerFixupTable};
pub use geometry::{Geometry, StreamDesc, Submesh};
pub use header::{PakHeader, Revision};
pub use joints::{Bone, Skeleton};
pub use material::{Material, MaterialSet};
pub use pages::{Page, PageTable};
pub use sink::{DecodedMesh, DecodedScene, MeshSink, SceneBone, SceneSink, Semantic, VertexBinding};
pub use skeleton::{BaseSkeletonResolver, SkeletonPurpose};
pub use view::PakView;
pub use vram::{TextureCodec, TextureLoader, TextureRequest, VramTable};
pub use walker::{ResItemType, ResourceIndex, ResourceItem};

use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use memmap2::Mmap;

use crate::config::{PakOptions, MEMORY_MAPPING_THRESHOLD};
use crate::traits::{ParseError, ParseResult, Parser};

/// Container bytes, read into memory or mapped
enum PakData {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for PakData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            PakData::Owned(bytes) => bytes,
            PakData::Mapped(map) => map,
        }
    }
}

/// A parsed container.
///
/// Everything here is an offset into the bytes; nothing is decoded
/// lazily except mesh streams and textures.
pub struct PakContainer {
    data: PakData,
    path: Option<PathBuf>,
    options: PakOptions,
    pub header: PakHeader,
    pub revision: Revision,
    pub pages: PageTable,
    pub fixups: PointerFixupTable,
    pub login: Vec<header::LoginEntry>,
    pub resources: ResourceIndex,
    pub skeleton: Option<Skeleton>,
    pub geometry: Option<Geometry>,
    pub materials: MaterialSet,
}

impl std::fmt::Debug for PakContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakContainer")
            .field("path", &self.path)
            .field("len", &self.data.len())
            .field("revision", &self.revision)
            .field("pages", &self.pages.len())
            .field("fixups", &self.fixups.len())
            .field("items", &self.resources.items.len())
            .finish()
    }
}

impl PakContainer {
    /// Parse an in-memory container
    pub fn from_bytes(data: Vec<u8>, options: &PakOptions) -> ParseResult<Self> {
        Self::load(PakData::Owned(data), options, None)
    }

    /// Open a container file, memory-mapping large files
    pub fn open(path: &Path, options: &PakOptions) -> ParseResult<Self> {
        crate::log_parse_start!("pak", path);
        let started = Instant::now();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let data = if len >= MEMORY_MAPPING_THRESHOLD {
            tracing::debug!(path = %path.display(), len, "memory-mapping container");
            // SAFETY: the map is read-only and lives as long as the container
            PakData::Mapped(unsafe { Mmap::map(&file)? })
        } else {
            let mut bytes = Vec::with_capacity(len as usize);
            (&file).read_to_end(&mut bytes)?;
            PakData::Owned(bytes)
        };
        match Self::load(data, options, Some(path)) {
            Ok(pak) => {
                crate::log_parse_complete!("pak", started.elapsed(), pak.resources.items.len());
                Ok(pak)
            }
            Err(err) => {
                crate::log_parse_error!("pak", err);
                Err(err.with_context(path.display().to_string()))
            }
        }
    }

    fn load(data: PakData, options: &PakOptions, path: Option<&Path>) -> ParseResult<Self> {
        let header = PakHeader::read(&data)?;
        let pages = PageTable::read(&data, u64::from(header.page_table_offset), header.page_count)?;
        let fixups = PointerFixupTable::read(&data, u64::from(header.fixup_table_offset), &pages)?;
        let login_item = pages.base(header.login_page as usize)? + u64::from(header.login_offset);
        let revision = header.detect_revision(&data, login_item)?;
        let login = header::read_login_table(&data, login_item, revision)?;
        tracing::debug!(
            magic = %format!("{:#X}", header.magic),
            ?revision,
            pages = pages.len(),
            fixups = fixups.len(),
            login = login.len(),
            "container header"
        );

        let view = PakView {
            data: &data,
            pages: &pages,
            fixups: &fixups,
            revision,
            options,
        };
        let resources = walker::walk(&view, &login)?;

        let skeleton = match &resources.joint {
            Some(item) => match joints::decode_joints(&view, item.address(), item.page_base, 0) {
                Ok(skeleton) => Some(skeleton),
                Err(err) => {
                    tracing::warn!(error = %err, "joint hierarchy could not be decoded");
                    None
                }
            },
            None => None,
        };

        let mut materials = MaterialSet::new();
        let geometry = match &resources.geometry {
            Some(item) => match geometry::decode_geometry(&view, item.address(), item.page_base) {
                Ok(mut geo) => {
                    for submesh in &mut geo.submeshes {
                        let Some(address) = submesh.material_address else {
                            continue;
                        };
                        match materials.resolve(&view, address, &resources.vrams) {
                            Ok(index) => submesh.material = Some(index),
                            Err(err) => tracing::warn!(submesh = %submesh.name, error = %err, "material could not be decoded"),
                        }
                    }
                    Some(geo)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "geometry could not be decoded");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            path: path.map(Path::to_path_buf),
            options: options.clone(),
            header,
            revision,
            pages,
            fixups,
            login,
            resources,
            skeleton,
            geometry,
            materials,
            data,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn options(&self) -> &PakOptions {
        &self.options
    }

    pub fn pages(&self) -> &PageTable {
        &self.pages
    }

    pub fn vrams(&self) -> &VramTable {
        &self.resources.vrams
    }

    /// Borrowed view for decoders
    pub fn view(&self) -> PakView<'_> {
        PakView {
            data: &self.data,
            pages: &self.pages,
            fixups: &self.fixups,
            revision: self.revision,
            options: &self.options,
        }
    }

    pub fn bone_count(&self) -> usize {
        self.skeleton.as_ref().map_or(0, Skeleton::len)
    }

    pub fn submeshes(&self) -> &[Submesh] {
        self.geometry.as_ref().map_or(&[], |g| g.submeshes.as_slice())
    }

    /// Skinned geometry without its own joints
    pub fn needs_base_skeleton(&self) -> bool {
        self.skeleton.is_none() && self.resources.needs_base_skeleton
    }

    /// Decode this container's joints again with every index offset by `start`
    pub fn skeleton_at(&self, start: usize) -> ParseResult<Option<Skeleton>> {
        match &self.resources.joint {
            Some(item) => joints::decode_joints(&self.view(), item.address(), item.page_base, start).map(Some),
            None => Ok(None),
        }
    }

    /// Texture loader over this container's VRAM entries
    pub fn texture_loader<'a>(
        &'a self,
        dictionary: Option<&'a TextureDictionary>,
        codec: &'a dyn TextureCodec,
    ) -> TextureLoader<'a> {
        TextureLoader::new(self.view(), &self.resources.vrams, dictionary, codec)
    }

    /// Decode this container alone into a scene
    pub fn decode_scene(&self) -> ParseResult<DecodedScene> {
        crate::logging::instrument_parse("decode_scene", || {
            let mut builder = SceneBuilder::new(&self.options);
            builder.add(self)?;
            Ok(builder.finish())
        })
    }
}

/// Merges one or more containers into a [`DecodedScene`].
///
/// Bones of every added container are appended to one list; packed bone
/// indices of later containers are offset by the bones already present.
pub struct SceneBuilder {
    options: PakOptions,
    resolver: Arc<BaseSkeletonResolver>,
    scene: DecodedScene,
    bones: Vec<Bone>,
    containers: usize,
}

impl SceneBuilder {
    pub fn new(options: &PakOptions) -> Self {
        Self::with_resolver(options, Arc::new(BaseSkeletonResolver::new()))
    }

    /// Share a base-skeleton cache with other builders
    pub fn with_resolver(options: &PakOptions, resolver: Arc<BaseSkeletonResolver>) -> Self {
        Self {
            options: options.clone(),
            resolver,
            scene: DecodedScene {
                game: options.game,
                ..DecodedScene::default()
            },
            bones: Vec::new(),
            containers: 0,
        }
    }

    /// Skeleton for `pak` with indices starting at `start`
    fn skeleton_for(&self, pak: &PakContainer, start: usize) -> ParseResult<Option<Skeleton>> {
        if pak.skeleton.is_some() {
            return pak.skeleton_at(start);
        }
        if !pak.needs_base_skeleton() || !self.options.load_base_skeleton {
            return Ok(None);
        }
        let path = pak.path().ok_or_else(|| ParseError::MissingBaseSkeleton {
            path: "<in-memory container>".into(),
        })?;
        let base = self.resolver.resolve(path, &self.options, SkeletonPurpose::Load)?;
        base.skeleton_at(start)
    }

    /// Add a container's bones, submeshes and materials
    pub fn add(&mut self, pak: &PakContainer) -> ParseResult<()> {
        let start = self.bones.len();
        let skeleton = match self.skeleton_for(pak, start) {
            Ok(skeleton) => skeleton,
            Err(err) => {
                tracing::warn!(error = %err, "skinned submeshes will load without weights");
                None
            }
        };
        let starting_bones = skeleton.as_ref().map(|_| start as u32);
        if let Some(skeleton) = skeleton {
            tracing::info!(bones = skeleton.len(), start, "adding skeleton");
            self.bones.extend(skeleton.bones);
        }

        let view = pak.view();
        let mut sink = SceneSink::new();
        for submesh in pak.submeshes() {
            if submesh.lod > 0 && !self.options.include_lods {
                tracing::debug!(submesh = %submesh.name, lod = submesh.lod, "skipping LOD submesh");
                continue;
            }
            let material = submesh
                .material
                .and_then(|m| pak.materials.get(m))
                .map_or("", |m| m.name.as_str());
            if let Err(err) = geometry::emit_submesh(&view, submesh, material, starting_bones, &mut sink) {
                tracing::warn!(submesh = %submesh.name, error = %err, "skipping submesh");
            }
        }
        self.scene.meshes.extend(sink.into_meshes());

        for material in &pak.materials.materials {
            if !self.scene.materials.iter().any(|m| m.name == material.name) {
                self.scene.materials.push(material.clone());
            }
        }
        for request in &pak.materials.texture_requests {
            if let Some(name) = request.file_name(pak.vrams()) {
                if !self.scene.textures.iter().any(|t| t == name) {
                    self.scene.textures.push(name.to_string());
                }
            }
        }

        if self.containers == 0 {
            self.scene.source = pak.path().map(|p| p.display().to_string()).unwrap_or_default();
            self.scene.revision = Some(pak.revision);
        }
        self.containers += 1;
        Ok(())
    }

    /// Open and add a container file
    pub fn add_file(&mut self, path: &Path) -> ParseResult<()> {
        let pak = PakContainer::open(path, &self.options)?;
        self.add(&pak)
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Resolve world matrices and return the scene
    pub fn finish(mut self) -> DecodedScene {
        if self.containers > 1 {
            if let Some(headb) = self.bones.iter().position(|b| b.name == "headb") {
                for bone in self.bones.iter_mut().filter(|b| b.name.contains("root_hair")) {
                    bone.parent = headb as i32;
                }
            }
        }
        let world = joints::world_matrices(&self.bones);
        self.scene.bones = self
            .bones
            .into_iter()
            .zip(world)
            .map(|(bone, matrix)| SceneBone {
                name: bone.name,
                parent: bone.parent,
                matrix,
            })
            .collect();
        self.scene
    }
}

/// [`Parser`] front end for PAK files
#[derive(Debug, Default, Clone, Copy)]
pub struct PakParser;

impl PakParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for PakParser {
    type Output = PakContainer;

    fn name(&self) -> &str {
        "Naughty Dog PAK"
    }

    fn extensions(&self) -> &[&str] {
        &["pak"]
    }

    fn can_parse(&self, header: &[u8]) -> bool {
        header
            .get(..4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .is_some_and(PakHeader::is_known_magic)
    }

    fn parse_bytes(&self, data: Vec<u8>, options: &PakOptions) -> ParseResult<PakContainer> {
        PakContainer::from_bytes(data, options)
    }

    fn parse_file(&self, path: &Path, options: &PakOptions) -> ParseResult<PakContainer> {
        PakContainer::open(path, options)
    }
}

#[cfg(test)]
mod test_pak {
    use super::*;

    #[test]
    fn test_can_parse_magics() {
        let parser = PakParser::new();
        assert!(parser.can_parse(&0xA79u32.to_le_bytes()));
        assert!(parser.can_parse(&0x10A7Du32.to_le_bytes()));
        assert!(!parser.can_parse(b"DDS "));
        assert!(!parser.can_parse(&[0x79]));
        assert!(parser.handles_extension(Path::new("hero.PAK")));
    }

    #[test]
    fn test_rejects_unknown_magic() {
        let err = PakContainer::from_bytes(vec![0u8; 64], &PakOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::UnrecognizedMagic { found: 0 }));
    }
}
