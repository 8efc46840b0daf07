// ndpak-parsers/src/inject/mod.rs
//! Container mutator.
//!
//! Replacement geometry is written over each submesh's buffers when it
//! fits. A submesh that gains vertices moves every vertex-sized buffer to
//! new pages; faces and weight tables move on their own when they grow.
//! Moved buffers are reached by redirecting the original pointer fields,
//! and the new pages are spliced in by [`builder::flatten`] at the end.
//!
//! ```text
//!   source bytes ──► in-place writes ──► redirects ──► textures ──► flatten
//!                         │                  ▲
//!                         └── PageBuilder ───┘
//! ```

pub mod bones;
pub mod builder;
pub mod encode;
pub mod model;
pub mod textures;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::config::PakOptions;
use crate::cursor::{ByteCursor, ByteWriter};
use crate::pak::geometry::{Geometry, SkinDesc, StreamDesc, Submesh, SubmeshLayout};
use crate::pak::joints::Skeleton;
use crate::pak::sink::DecodedScene;
use crate::pak::skeleton::{locate, rewritten_name, BaseSkeletonResolver, SkeletonPurpose};
use crate::pak::vram::TextureCodec;
use crate::pak::PakContainer;
use crate::traits::{ParseError, ParseResult, ParseResultExt};

pub use builder::{flatten, MutationLog, PageBuilder, Placement};
pub use model::ReplacementMesh;

/// Offset of the submesh pointer in a LOD descriptor
const LOD_SUBMESHES: u64 = 24;
/// Offset of the submesh count in a LOD descriptor
const LOD_COUNT: u64 = 4;

/// What to inject besides geometry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectOptions {
    /// Only embed textures; geometry and bones are left alone
    pub textures_only: bool,
    /// Also write bone transforms and parents
    pub bones: bool,
    /// Folder searched for replacement textures
    pub texture_folder: Option<PathBuf>,
}

/// Summary of one injection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InjectReport {
    /// Submeshes given replacement geometry
    pub injected: usize,
    /// Submeshes overwritten with an invisible placeholder
    pub placeholders: usize,
    /// Submeshes with at least one relocated buffer
    pub relocated: Vec<String>,
    pub new_pages: usize,
    pub textures: usize,
    pub bones_written: usize,
    /// Rewritten base-skeleton container, when bones went there
    pub base_written: Option<PathBuf>,
    /// The source was already flattened by an earlier injection
    pub modded: bool,
}

/// Bytes produced by [`Injector::rewrite`]
#[derive(Debug)]
pub struct Rewrite {
    pub data: Vec<u8>,
    /// Rewritten base-skeleton container bytes
    pub base_data: Option<Vec<u8>>,
    pub report: InjectReport,
}

/// Applies a replacement scene to one container
pub struct Injector<'a> {
    pak: &'a PakContainer,
    base: Option<&'a PakContainer>,
    options: InjectOptions,
    codec: Option<&'a dyn TextureCodec>,
}

impl<'a> Injector<'a> {
    pub fn new(pak: &'a PakContainer, options: InjectOptions) -> Self {
        Self {
            pak,
            base: None,
            options,
            codec: None,
        }
    }

    /// Container supplying the skeleton when `pak` has none
    pub fn with_base(mut self, base: &'a PakContainer) -> Self {
        self.base = Some(base);
        self
    }

    /// Codec used to encode TGA replacements
    pub fn with_codec(mut self, codec: &'a dyn TextureCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    fn pak_options(&self) -> &PakOptions {
        self.pak.options()
    }

    /// Skeleton that weights and bones are resolved against
    fn skeleton(&self) -> Option<&'a Skeleton> {
        self.pak
            .skeleton
            .as_ref()
            .or_else(|| self.base.and_then(|b| b.skeleton.as_ref()))
    }

    /// Produce the rewritten container bytes
    pub fn rewrite(&self, scene: Option<&DecodedScene>) -> ParseResult<Rewrite> {
        let mut out = ByteWriter::from_vec(self.pak.data().to_vec());
        let mut report = InjectReport {
            modded: builder::is_modded(self.pak.data())?,
            ..Default::default()
        };
        if report.modded {
            tracing::warn!("container was injected before; injecting into an unedited file is recommended");
        }

        let mut pages = PageBuilder::new(self.pak.pages.len());
        let mut log = MutationLog::new();
        let mut base_data = None;

        if let (Some(scene), false) = (scene, self.options.textures_only) {
            if self.pak.revision.mesh_injection_unverified() {
                tracing::warn!(
                    revision = ?self.pak.revision,
                    "mesh injection into this revision is unverified; use --textures-only for texture edits"
                );
            }
            match &self.pak.geometry {
                Some(geometry) => {
                    self.inject_geometry(&mut out, &mut pages, &mut log, geometry, scene, &mut report)?;
                    if report.injected + report.placeholders > 0 && !self.pak_options().include_lods {
                        self.collapse_lods(&mut out, geometry);
                    }
                }
                None => tracing::warn!("container has no geometry; skipping mesh injection"),
            }
            if self.options.bones {
                base_data = self.inject_bones(&mut out, scene, &mut report);
            }
        }

        log.apply(&mut out, &self.pak.fixups)?;

        if let Some(folder) = &self.options.texture_folder {
            tracing::info!(folder = %folder.display(), "checking for textures to embed");
            report.textures = textures::embed_folder(
                &mut out,
                self.pak.vrams(),
                self.pak.revision,
                self.pak.pages.raw_data_start(),
                folder,
                self.codec,
            )?;
        }

        let mut data = out.into_inner();
        if !report.relocated.is_empty() {
            let new_pages = pages.finish();
            let (flat, layout) = flatten(&data, &new_pages)?;
            report.new_pages = layout.new_pages;
            data = flat;
        }
        Ok(Rewrite {
            data,
            base_data,
            report,
        })
    }

    fn inject_geometry(
        &self,
        out: &mut ByteWriter,
        pages: &mut PageBuilder,
        log: &mut MutationLog,
        geometry: &Geometry,
        scene: &DecodedScene,
        report: &mut InjectReport,
    ) -> ParseResult<()> {
        let replacements = model::replacement_meshes(scene, self.skeleton());
        let mut by_name: HashMap<&str, &ReplacementMesh> = HashMap::new();
        for mesh in &replacements {
            by_name.entry(model::match_name(&mesh.name)).or_insert(mesh);
        }

        for submesh in &geometry.submeshes {
            let placeholder;
            let mesh = match by_name.get(submesh.name.as_str()) {
                Some(mesh) => *mesh,
                None => {
                    placeholder = ReplacementMesh::placeholder(&submesh.name);
                    &placeholder
                }
            };
            if submesh.lod > 0 && mesh.placeholder && !self.pak_options().include_lods {
                continue;
            }
            tracing::info!(submesh = %submesh.name, vertices = mesh.vertex_count(), "injecting");
            let moved = self
                .inject_submesh(out, pages, log, geometry.layout, submesh, mesh)
                .context(format!("submesh {}", submesh.name))?;
            if moved {
                tracing::info!(submesh = %submesh.name, "buffers appended to a new page");
                report.relocated.push(submesh.name.clone());
            }
            if mesh.placeholder {
                report.placeholders += 1;
            } else {
                report.injected += 1;
            }
        }
        Ok(())
    }

    /// Write one submesh; returns whether any buffer was relocated
    fn inject_submesh(
        &self,
        out: &mut ByteWriter,
        pages: &mut PageBuilder,
        log: &mut MutationLog,
        layout: SubmeshLayout,
        submesh: &Submesh,
        mesh: &ReplacementMesh,
    ) -> ParseResult<bool> {
        let n = mesh.vertex_count();
        let relocate = n > submesh.vertex_count as usize;
        if n > submesh.vertex_count as usize {
            tracing::info!(submesh = %submesh.name, limit = submesh.vertex_count, has = n, "vertex count exceeds allocation");
        }
        let mut moved = relocate;

        let mut encoder = encode::StreamEncoder::new(mesh, self.pak_options().global_scale);
        for (j, stream) in submesh.streams.iter().enumerate() {
            let bytes = encoder.encode(j, stream);
            match (relocate, stream.buffer()) {
                (_, None) => {
                    tracing::debug!(submesh = %submesh.name, stream = j, "stream has no buffer");
                    continue;
                }
                (true, Some(_)) => log.redirect(stream.buffer_ptr_address(), pages.place(&bytes)),
                (false, Some(buffer)) => {
                    out.seek(buffer);
                    out.write_bytes(&bytes);
                }
            }
            out.seek(stream.size_address());
            out.write_u32(bytes.len() as u32);
            if let StreamDesc::Quantized(sd) = stream {
                out.seek(sd.address + 8);
                out.write_u32(n as u32);
            }
        }

        if let Some(skin) = &submesh.skin {
            moved |= self.inject_skin(out, pages, log, skin, mesh, relocate);
        }

        let faces = encode::encode_faces(&mesh.indices);
        if mesh.indices.len() > submesh.index_count as usize {
            tracing::info!(submesh = %submesh.name, limit = submesh.index_count / 3, has = mesh.indices.len() / 3, "face count exceeds allocation");
            log.redirect(submesh.address + layout.indices, pages.place(&faces));
            moved = true;
        } else if let Some(at) = submesh.faces {
            out.seek(at);
            out.write_bytes(&faces);
        }

        if let Some(recalc) = &submesh.normal_recalc {
            let grows = n > recalc.vertex_count as usize;
            let zeros = vec![0u8; 2 * n];
            if relocate || grows {
                let placed = pages.place(&zeros);
                for (k, buffer) in recalc.buffers.iter().enumerate() {
                    if buffer.is_some() {
                        log.redirect(recalc.ptr_address(k), placed);
                    }
                }
                moved = true;
            } else {
                for buffer in recalc.buffers.iter().flatten() {
                    out.seek(*buffer);
                    out.write_bytes(&zeros);
                }
            }
            out.seek(recalc.address);
            out.write_u32(n as u32);
            out.write_u32(mesh.indices.len() as u32);
        }
        pages.end_submesh();

        out.seek(submesh.address + layout.vertex_count);
        out.write_u32(n as u32);
        out.seek(submesh.address + layout.index_count);
        out.write_u32(mesh.indices.len() as u32);
        Ok(moved)
    }

    fn inject_skin(
        &self,
        out: &mut ByteWriter,
        pages: &mut PageBuilder,
        log: &mut MutationLog,
        skin: &SkinDesc,
        mesh: &ReplacementMesh,
        relocate: bool,
    ) -> bool {
        let tables = encode::encode_skin(mesh, skin.uncompressed);
        let mut moved = false;
        match (relocate, skin.map) {
            (true, Some(_)) => log.redirect(skin.address + SkinDesc::MAP_PTR, pages.place(&tables.map)),
            (false, Some(map)) => {
                out.seek(map);
                out.write_bytes(&tables.map);
            }
            (_, None) => tracing::warn!("skin map pointer is null"),
        }
        if tables.total > skin.weight_count {
            tracing::info!(limit = skin.weight_count, has = tables.total, "weight count exceeds allocation");
            log.redirect(skin.address + SkinDesc::WEIGHTS_PTR, pages.place(&tables.weights));
            moved = true;
        } else if let Some(weights) = skin.weights {
            out.seek(weights);
            out.write_bytes(&tables.weights);
        }
        out.seek(skin.address + SkinDesc::WEIGHT_COUNT);
        out.write_u32(tables.total);
        moved
    }

    /// Point LODs `1..n-1` at LOD 0's submeshes
    fn collapse_lods(&self, out: &mut ByteWriter, geometry: &Geometry) {
        let lods = &geometry.lod_descs;
        let Some(&first) = lods.first() else {
            return;
        };
        let cursor = ByteCursor::new(self.pak.data());
        let (Ok(submeshes), Ok(count)) = (cursor.read_u64_at(first + LOD_SUBMESHES), cursor.read_u32_at(first + LOD_COUNT)) else {
            tracing::warn!("unreadable LOD 0 descriptor");
            return;
        };
        let page = self.pak.fixups.target_page(first + LOD_SUBMESHES);
        for &lod in lods.iter().take(lods.len().saturating_sub(1)).skip(1) {
            out.seek(lod + LOD_SUBMESHES);
            out.write_u64(submeshes);
            out.seek(lod + LOD_COUNT);
            out.write_u32(count);
            if let (Some(page), Some(entry)) = (page, self.pak.fixups.get(lod + LOD_SUBMESHES)) {
                out.seek(entry.page_field_address);
                out.write_u16(page as u16);
            }
        }
        tracing::debug!(lods = lods.len(), "collapsed LODs onto LOD 0");
    }

    /// Write bones into this container, or return the rewritten base bytes
    fn inject_bones(&self, out: &mut ByteWriter, scene: &DecodedScene, report: &mut InjectReport) -> Option<Vec<u8>> {
        let scale = self.pak_options().global_scale;
        if let Some(skeleton) = &self.pak.skeleton {
            report.bones_written = bones::write_bones(out, skeleton, scene, scale);
            return None;
        }
        let Some(base) = self.base else {
            tracing::warn!("no skeleton available for bone injection");
            return None;
        };
        let skeleton = base.skeleton.as_ref()?;
        let mut base_out = ByteWriter::from_vec(base.data().to_vec());
        report.bones_written = bones::write_bones(&mut base_out, skeleton, scene, scale);
        Some(base_out.into_inner())
    }
}

/// Output path of a rewritten base skeleton: `<out dir>/<base>.NEW.pak`
pub fn base_output_path(base: &Path, output: &Path) -> PathBuf {
    let name = base.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let plain = match name.strip_suffix(".NEW.pak") {
        Some(stem) => format!("{stem}.pak"),
        None => name,
    };
    let renamed = rewritten_name(Path::new(&plain));
    match output.parent() {
        Some(dir) => dir.join(renamed),
        None => renamed,
    }
}

/// Inject the scene at `model` into the container at `source` and write
/// the result to `output`.
///
/// Fails without writing when the source or model file is missing, or
/// when skinned geometry has no locatable base skeleton.
pub fn run(
    source: &Path,
    model: Option<&Path>,
    output: &Path,
    options: &PakOptions,
    inject: InjectOptions,
    codec: Option<&dyn TextureCodec>,
) -> ParseResult<InjectReport> {
    crate::log_parse_start!("inject", source);
    let started = Instant::now();
    if !source.is_file() {
        return Err(ParseError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("injection source not found: {}", source.display()),
        )));
    }
    let pak = PakContainer::open(source, options).context(format!("source {}", source.display()))?;

    let scene = match (model, inject.textures_only) {
        (Some(model), false) => Some(model::load_scene(model).context(format!("model {}", model.display()))?),
        (None, false) => return Err(ParseError::InvalidStructure("no replacement model given".into())),
        (_, true) => None,
    };

    let resolver = Arc::new(BaseSkeletonResolver::new());
    let mut base_path = None;
    let base = if pak.needs_base_skeleton() && !inject.textures_only {
        let path = locate(source, options, SkeletonPurpose::Write)?;
        let base = resolver.load(&path, options)?;
        base_path = Some(path);
        Some(base)
    } else {
        None
    };

    let inject = InjectOptions {
        texture_folder: textures::texture_folder(inject.texture_folder.as_deref(), output, source),
        ..inject
    };
    let mut injector = Injector::new(&pak, inject);
    if let Some(base) = &base {
        injector = injector.with_base(base);
    }
    if let Some(codec) = codec {
        injector = injector.with_codec(codec);
    }

    let result = injector.rewrite(scene.as_ref());
    let Rewrite { data, base_data, mut report } = match result {
        Ok(rewrite) => rewrite,
        Err(e) => {
            crate::log_parse_error!("inject", e);
            return Err(e);
        }
    };
    std::fs::write(output, &data)?;
    if let (Some(bytes), Some(path)) = (base_data, base_path) {
        let target = base_output_path(&path, output);
        std::fs::write(&target, bytes)?;
        tracing::info!(path = %target.display(), "wrote new skeleton");
        report.base_written = Some(target);
    }
    tracing::info!(pages = report.new_pages, injected = report.injected, "added new pages");
    crate::log_parse_complete!("inject", started.elapsed(), report.injected + report.placeholders);
    Ok(report)
}
