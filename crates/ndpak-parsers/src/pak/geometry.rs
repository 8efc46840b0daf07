// ndpak-parsers/src/pak/geometry.rs
//! Geometry resource: submesh descriptors and vertex stream decoding.
//!
//! Descriptors are read once into plain structs holding absolute offsets
//! and the addresses of every pointer field. Stream data is decoded
//! on demand and handed to a [`MeshSink`].

use ndpak_core::{BoundingBox, Vec3};
use serde::Serialize;

use super::header::Revision;
use super::sink::{ElementType, MeshSink, Semantic, VertexBinding, MAX_WEIGHTS};
use super::view::PakView;
use crate::traits::{ParseError, ParseResult};

/// Size of one submesh descriptor in every revision
pub const SUBMESH_STRIDE: u64 = 176;
/// Size of a legacy stream descriptor
pub const LEGACY_STREAM_SIZE: u64 = 24;
/// Size of a quantized stream descriptor
pub const QUANTIZED_STREAM_SIZE: u64 = 64;
/// Full scale of a packed 22-bit weight
pub const WEIGHT_SCALE: f32 = 4_194_303.0;

/// Legacy component codes
pub mod legacy_code {
    pub const COLOR: u8 = 10;
    pub const FRAME: u8 = 31;
    pub const UV: u8 = 34;
}

/// Quantized component codes
pub mod quantized_code {
    pub const UV1: u8 = 1;
    pub const NORMAL: u8 = 2;
    pub const TANGENT: u8 = 3;
    pub const UV2: u8 = 11;
    pub const QUANT_POSITION: u8 = 64;
    pub const QUANT_UV1: u8 = 65;
    pub const QUANT_UV2: u8 = 75;
    pub const QUANT_UVX: u8 = 76;
}

/// Field offsets inside a submesh descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmeshLayout {
    pub name: u64,
    pub streams: u64,
    pub indices: u64,
    pub indices_zero_valid: bool,
    pub material: u64,
    pub skin: u64,
    pub normal_recalc: u64,
    pub vertex_count: u64,
    pub index_count: u64,
    pub stream_count: u64,
    pub has_bbox: bool,
}

impl SubmeshLayout {
    pub const LEGACY: Self = Self {
        name: 8,
        streams: 56,
        indices: 72,
        indices_zero_valid: false,
        material: 80,
        skin: 104,
        normal_recalc: 136,
        vertex_count: 36,
        index_count: 40,
        stream_count: 44,
        has_bbox: false,
    };

    pub const QUANTIZED: Self = Self {
        name: 32,
        streams: 48,
        indices: 64,
        indices_zero_valid: true,
        material: 72,
        skin: 88,
        normal_recalc: 112,
        vertex_count: 128,
        index_count: 132,
        stream_count: 136,
        has_bbox: true,
    };

    pub fn for_revision(revision: Revision) -> Self {
        if revision.is_quantized() {
            Self::QUANTIZED
        } else {
            Self::LEGACY
        }
    }
}

/// Geometry resource header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeometryHeader {
    pub version: u32,
    pub is_foreground: u32,
    pub submesh_count: u32,
    pub lod_count: u32,
    pub material_count: u32,
    pub shader_count: u32,
    pub submeshes: Option<u64>,
    pub lods: Option<u64>,
    pub textures: Option<u64>,
    pub shaders: Option<u64>,
    pub materials: Option<u64>,
}

impl GeometryHeader {
    pub fn read(view: &PakView<'_>, body: u64) -> ParseResult<Self> {
        let mut cursor = view.cursor_at(body);
        let version = cursor.read_u32()?;
        let is_foreground = cursor.read_u32()?;
        let submesh_count = cursor.read_u32()?;
        let lod_count = cursor.read_u32()?;
        let material_count = cursor.read_u32()?;
        cursor.skip(4)?;
        let shader_count = cursor.read_u32()?;
        Ok(Self {
            version,
            is_foreground,
            submesh_count,
            lod_count,
            material_count,
            shader_count,
            submeshes: view.ptr(body + 40)?,
            lods: view.ptr(body + 48)?,
            textures: view.ptr(body + 64)?,
            shaders: view.ptr(body + 72)?,
            materials: view.ptr(body + 96)?,
        })
    }
}

/// Fixed-stride stream with an indirect component type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LegacyStream {
    pub address: u64,
    pub attribute_count: u8,
    pub stride: u16,
    pub buffer_size: u32,
    pub comp_type: u8,
    pub buffer: Option<u64>,
}

/// Bit-packed stream with per-channel scale and offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantizedStream {
    pub address: u64,
    pub buffer: Option<u64>,
    pub vertex_count: u32,
    pub buffer_size: u32,
    pub comp_type: u8,
    pub stride: u8,
    pub sizes: [u8; 4],
    pub scale: [f32; 4],
    pub offset: [f32; 4],
}

impl QuantizedStream {
    /// Number of channels with a nonzero bit width
    pub fn channels(&self) -> usize {
        self.sizes.iter().filter(|&&s| s > 0).count()
    }

    /// Packed bits per vertex
    pub fn bits_per_vertex(&self) -> u32 {
        self.sizes.iter().map(|&s| u32::from(s)).sum()
    }
}

/// A stream descriptor in either encoding
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum StreamDesc {
    Legacy(LegacyStream),
    Quantized(QuantizedStream),
}

impl StreamDesc {
    pub fn comp_type(&self) -> u8 {
        match self {
            StreamDesc::Legacy(s) => s.comp_type,
            StreamDesc::Quantized(s) => s.comp_type,
        }
    }

    pub fn stride(&self) -> usize {
        match self {
            StreamDesc::Legacy(s) => usize::from(s.stride),
            StreamDesc::Quantized(s) => usize::from(s.stride),
        }
    }

    pub fn buffer(&self) -> Option<u64> {
        match self {
            StreamDesc::Legacy(s) => s.buffer,
            StreamDesc::Quantized(s) => s.buffer,
        }
    }

    /// Address of the buffer pointer field
    pub fn buffer_ptr_address(&self) -> u64 {
        match self {
            StreamDesc::Legacy(s) => s.address + 16,
            StreamDesc::Quantized(s) => s.address,
        }
    }

    /// Address of the buffer size field
    pub fn size_address(&self) -> u64 {
        match self {
            StreamDesc::Legacy(s) => s.address + 4,
            StreamDesc::Quantized(s) => s.address + 16,
        }
    }

    pub fn buffer_size(&self) -> u32 {
        match self {
            StreamDesc::Legacy(s) => s.buffer_size,
            StreamDesc::Quantized(s) => s.buffer_size,
        }
    }

    fn read_legacy(view: &PakView<'_>, address: u64) -> ParseResult<Self> {
        let mut cursor = view.cursor_at(address);
        let attribute_count = cursor.read_u8()?;
        cursor.skip(1)?;
        let stride = cursor.read_u16()?;
        let buffer_size = cursor.read_u32()?;
        let comp_info = view.ptr_required(address + 8, "stream component info")?;
        Ok(StreamDesc::Legacy(LegacyStream {
            address,
            attribute_count,
            stride,
            buffer_size,
            comp_type: view.u8_at(comp_info + 3)?,
            buffer: view.ptr(address + 16)?,
        }))
    }

    fn read_quantized(view: &PakView<'_>, address: u64) -> ParseResult<Self> {
        let buffer = view.ptr_zero_valid(address)?;
        let mut cursor = view.cursor_at(address + 8);
        let vertex_count = cursor.read_u32()?;
        cursor.skip(4)?;
        let buffer_size = cursor.read_u32()?;
        let comp_type = cursor.read_u8()?;
        cursor.skip(1)?;
        let _packed_unknown = cursor.read_bits(4)?;
        let stride = cursor.read_bits(4)? as u8;
        cursor.skip(1)?;
        let mut sizes = [0u8; 4];
        for s in &mut sizes {
            *s = cursor.read_u8()?;
        }
        cursor.skip(4)?;
        let scale = cursor.read_f32x4()?;
        let offset = cursor.read_f32x4()?;
        Ok(StreamDesc::Quantized(QuantizedStream {
            address,
            buffer,
            vertex_count,
            buffer_size,
            comp_type,
            stride,
            sizes,
            scale,
            offset,
        }))
    }
}

/// Per-vertex weight tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkinDesc {
    pub address: u64,
    pub weight_count: u32,
    pub flags: u32,
    pub map: Option<u64>,
    pub weights: Option<u64>,
    /// Weights are `(f32, u32)` pairs instead of packed words
    pub uncompressed: bool,
}

impl SkinDesc {
    pub const WEIGHT_COUNT: u64 = 4;
    pub const MAP_PTR: u64 = 16;
    pub const WEIGHTS_PTR: u64 = 24;

    fn read(view: &PakView<'_>, address: u64) -> ParseResult<Self> {
        let zero_valid = view.revision == Revision::Tloup1;
        let resolve = |at| if zero_valid { view.ptr_zero_valid(at) } else { view.ptr(at) };
        let flags = view.u32_at(address + 8)?;
        Ok(Self {
            address,
            weight_count: view.u32_at(address + Self::WEIGHT_COUNT)?,
            flags,
            map: resolve(address + Self::MAP_PTR)?,
            weights: resolve(address + Self::WEIGHTS_PTR)?,
            uncompressed: zero_valid && flags > 0,
        })
    }
}

/// Auxiliary index buffers used for runtime normal smoothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalRecalcDesc {
    pub address: u64,
    pub vertex_count: u32,
    pub index_count: u32,
    /// Four parallel `u16` buffers; null slots stay `None`
    pub buffers: [Option<u64>; 4],
}

impl NormalRecalcDesc {
    /// Address of the `n`th buffer pointer
    pub fn ptr_address(&self, n: usize) -> u64 {
        self.address + 8 + 8 * n as u64
    }

    fn read(view: &PakView<'_>, address: u64) -> ParseResult<Self> {
        let mut buffers = [None; 4];
        for (n, b) in buffers.iter_mut().enumerate() {
            *b = view.ptr(address + 8 + 8 * n as u64)?;
        }
        Ok(Self {
            address,
            vertex_count: view.u32_at(address)?,
            index_count: view.u32_at(address + 4)?,
            buffers,
        })
    }
}

/// One submesh descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submesh {
    pub index: usize,
    pub address: u64,
    pub name: String,
    pub lod: u8,
    pub vertex_count: u32,
    pub index_count: u32,
    pub streams: Vec<StreamDesc>,
    pub faces: Option<u64>,
    pub material_address: Option<u64>,
    /// Index into the container's material set
    pub material: Option<usize>,
    pub skin: Option<SkinDesc>,
    pub normal_recalc: Option<NormalRecalcDesc>,
    pub bbox: Option<BoundingBox>,
}

/// Last `|`-delimited segment of a submesh path
pub fn short_name(path: &str) -> &str {
    path.rsplit('|').next().unwrap_or(path)
}

/// LOD index from the digit following `Shape`, else 0
pub fn lod_of(name: &str) -> u8 {
    name.find("Shape")
        .and_then(|at| name[at + 5..].chars().next())
        .and_then(|c| c.to_digit(10))
        .map_or(0, |d| d as u8)
}

/// Decoded geometry resource
#[derive(Debug, Clone, Serialize)]
pub struct Geometry {
    pub body: u64,
    pub header: GeometryHeader,
    #[serde(skip)]
    pub layout: SubmeshLayout,
    pub submeshes: Vec<Submesh>,
    /// Resolved LOD descriptor addresses
    pub lod_descs: Vec<u64>,
}

impl Geometry {
    /// Address of submesh `index`'s descriptor
    pub fn submesh_address(&self, index: usize) -> Option<u64> {
        self.header.submeshes.map(|s| s + SUBMESH_STRIDE * index as u64)
    }

    pub fn find(&self, name: &str) -> Option<&Submesh> {
        self.submeshes.iter().find(|s| s.name == name)
    }

    pub fn is_skinned(&self) -> bool {
        self.submeshes.iter().any(|s| s.skin.is_some())
    }

    pub fn max_lod(&self) -> u8 {
        self.submeshes.iter().map(|s| s.lod).max().unwrap_or(0)
    }
}

/// Decode the geometry item at `item`.
///
/// A submesh that fails to decode is logged and left out.
pub fn decode_geometry(view: &PakView<'_>, item: u64, page_base: u64) -> ParseResult<Geometry> {
    let body = item + view.item_padding();
    let header = GeometryHeader::read(view, body)?;
    let layout = SubmeshLayout::for_revision(view.revision);
    tracing::debug!(
        version = header.version,
        submeshes = header.submesh_count,
        lods = header.lod_count,
        materials = header.material_count,
        "geometry header"
    );

    let mut lod_descs = Vec::new();
    if let Some(lods) = header.lods {
        for a in 0..u64::from(header.lod_count) {
            match view.ptr(lods + 8 * a) {
                Ok(Some(desc)) => lod_descs.push(desc),
                Ok(None) => {}
                Err(err) => tracing::warn!(lod = a, error = %err, "unreadable LOD descriptor"),
            }
        }
    }

    let mut submeshes = Vec::with_capacity(header.submesh_count as usize);
    if let Some(start) = header.submeshes {
        for i in 0..header.submesh_count as usize {
            let address = start + SUBMESH_STRIDE * i as u64;
            match read_submesh(view, &layout, address, i, page_base) {
                Ok(sm) => submeshes.push(sm),
                Err(err) => tracing::warn!(submesh = i, error = %err, "skipping submesh"),
            }
        }
    }

    Ok(Geometry {
        body,
        header,
        layout,
        submeshes,
        lod_descs,
    })
}

fn read_submesh(view: &PakView<'_>, layout: &SubmeshLayout, address: u64, index: usize, page_base: u64) -> ParseResult<Submesh> {
    let bbox = if layout.has_bbox {
        let mut cursor = view.cursor_at(address);
        let min = cursor.read_f32x4()?;
        let max = cursor.read_f32x4()?;
        Some(BoundingBox::new(
            Vec3::new(min[0], min[1], min[2]),
            Vec3::new(max[0], max[1], max[2]),
        ))
    } else {
        None
    };

    let name_at = match view.ptr(address + layout.name)? {
        Some(p) => Some(p),
        None if layout.has_bbox => Some(page_base),
        None => None,
    };
    let full_name = match name_at {
        Some(p) => view.string_at(p)?,
        None => String::new(),
    };
    let name = short_name(&full_name).to_string();

    let vertex_count = view.u32_at(address + layout.vertex_count)?;
    let index_count = view.u32_at(address + layout.index_count)?;
    let stream_count = view.u32_at(address + layout.stream_count)?;

    let faces = if layout.indices_zero_valid {
        view.ptr_zero_valid(address + layout.indices)?
    } else {
        view.ptr(address + layout.indices)?
    };

    let mut streams = Vec::with_capacity(stream_count as usize);
    if let Some(descs) = view.ptr(address + layout.streams)? {
        for j in 0..u64::from(stream_count) {
            let desc = if view.revision.is_quantized() {
                StreamDesc::read_quantized(view, descs + QUANTIZED_STREAM_SIZE * j)?
            } else {
                StreamDesc::read_legacy(view, descs + LEGACY_STREAM_SIZE * j)?
            };
            streams.push(desc);
        }
    }

    let skin = view
        .ptr(address + layout.skin)?
        .map(|at| SkinDesc::read(view, at))
        .transpose()?;
    let normal_recalc = view
        .ptr(address + layout.normal_recalc)?
        .map(|at| NormalRecalcDesc::read(view, at))
        .transpose()?;

    Ok(Submesh {
        index,
        address,
        lod: lod_of(&name),
        name,
        vertex_count,
        index_count,
        streams,
        faces,
        material_address: view.ptr(address + layout.material)?,
        material: None,
        skin,
        normal_recalc,
        bbox,
    })
}

fn scaled_positions(values: impl Iterator<Item = [f32; 3]>, scale: f32) -> Vec<f32> {
    values.flat_map(|p| p.map(|c| c * scale)).collect()
}

/// Dequantize a bit-packed stream to `channels` floats per vertex
pub fn dequantize(view: &PakView<'_>, stream: &QuantizedStream, buffer: u64) -> ParseResult<Vec<f32>> {
    let mut cursor = view.cursor_at(buffer);
    let mut out = Vec::with_capacity(stream.vertex_count as usize * stream.channels());
    for _ in 0..stream.vertex_count {
        for c in 0..4 {
            if stream.sizes[c] > 0 {
                let q = cursor.read_bits(stream.sizes[c])?;
                out.push(q as f32 * stream.scale[c] + stream.offset[c]);
            }
        }
    }
    Ok(out)
}

/// Streams of one submesh, ready for a sink
pub struct SubmeshData<'a> {
    pub bindings: Vec<VertexBinding<'a>>,
    pub indices: Vec<u16>,
}

/// Decode the vertex streams, skin and faces of `submesh`.
///
/// `starting_bones` is added to packed bone indices; `None` skips skin
/// data entirely, for containers without a skeleton.
pub fn decode_submesh<'a>(view: &PakView<'a>, submesh: &Submesh, starting_bones: Option<u32>) -> ParseResult<SubmeshData<'a>> {
    let n = submesh.vertex_count as usize;
    let scale = view.options.global_scale;
    let mut bindings = Vec::with_capacity(submesh.streams.len() + 2);
    let mut found_uvs = 0u8;
    let mut found_frames = 0u8;
    let mut found_colors = 0usize;

    for (j, stream) in submesh.streams.iter().enumerate() {
        let Some(buffer) = stream.buffer() else {
            tracing::debug!(submesh = %submesh.name, stream = j, "stream has no buffer");
            continue;
        };
        match stream {
            StreamDesc::Legacy(sd) => {
                let stride = usize::from(sd.stride);
                if j == 0 {
                    let raw = view.bytes_at(buffer, stride * n)?;
                    let element = if stride == 12 { ElementType::F32 } else { ElementType::F16 };
                    let source = VertexBinding::new(Semantic::Position, element, 3, stride, raw);
                    let values = scaled_positions(source.rows::<3>().into_iter(), scale);
                    bindings.push(VertexBinding::floats(Semantic::Position, 3, &values));
                    continue;
                }
                match sd.comp_type {
                    legacy_code::UV => {
                        bindings.push(VertexBinding::new(Semantic::Uv(found_uvs), ElementType::F16, 2, 4, view.bytes_at(buffer, 4 * n)?));
                        found_uvs += 1;
                    }
                    legacy_code::FRAME if found_frames < 2 => {
                        let (semantic, components) = if found_frames == 0 {
                            (Semantic::Normal, 3)
                        } else {
                            (Semantic::Bitangent, 4)
                        };
                        bindings.push(VertexBinding::new(semantic, ElementType::I8, components, 4, view.bytes_at(buffer, 4 * n)?));
                        found_frames += 1;
                    }
                    legacy_code::COLOR => {
                        let semantic = if view.options.read_colors && found_colors == 0 {
                            Semantic::Color
                        } else {
                            Semantic::User(format!("Vec4Halfs_{found_colors}"))
                        };
                        found_colors += 1;
                        bindings.push(VertexBinding::new(semantic, ElementType::F16, 4, 8, view.bytes_at(buffer, 8 * n)?));
                    }
                    other => {
                        tracing::debug!(submesh = %submesh.name, comp_type = other, "omitting vertex component");
                    }
                }
            }
            StreamDesc::Quantized(sd) => {
                if j == 0 && sd.stride == 12 {
                    let raw = view.bytes_at(buffer, 12 * n)?;
                    let source = VertexBinding::new(Semantic::Position, ElementType::F32, 3, 12, raw);
                    let values = scaled_positions(source.rows::<3>().into_iter(), scale);
                    bindings.push(VertexBinding::floats(Semantic::Position, 3, &values));
                    continue;
                }
                match sd.comp_type {
                    quantized_code::UV1 => bindings.push(VertexBinding::new(Semantic::Uv(0), ElementType::F16, 2, 4, view.bytes_at(buffer, 4 * n)?)),
                    quantized_code::UV2 => bindings.push(VertexBinding::new(Semantic::Uv(1), ElementType::F16, 2, 4, view.bytes_at(buffer, 4 * n)?)),
                    quantized_code::NORMAL => bindings.push(VertexBinding::new(Semantic::Normal, ElementType::I8, 3, 4, view.bytes_at(buffer, 4 * n)?)),
                    quantized_code::TANGENT => bindings.push(VertexBinding::new(Semantic::Tangent, ElementType::I8, 4, 4, view.bytes_at(buffer, 4 * n)?)),
                    code => {
                        let semantic = match code {
                            quantized_code::QUANT_POSITION => Semantic::Position,
                            quantized_code::QUANT_UV1 => Semantic::Uv(0),
                            quantized_code::QUANT_UV2 => Semantic::Uv(1),
                            quantized_code::QUANT_UVX => Semantic::Uv(2),
                            _ => {
                                tracing::debug!(submesh = %submesh.name, comp_type = code, "omitting quantized component");
                                continue;
                            }
                        };
                        let channels = sd.channels();
                        let mut values = dequantize(view, sd, buffer)?;
                        if semantic == Semantic::Position {
                            values.iter_mut().for_each(|v| *v *= scale);
                        }
                        bindings.push(VertexBinding::floats(semantic, channels, &values));
                    }
                }
            }
        }
    }

    if let (Some(start), Some(skin)) = (starting_bones, submesh.skin.as_ref()) {
        let (ids, weights) = read_skin(view, skin, n, start)?;
        bindings.push(VertexBinding::new(Semantic::BoneIndex, ElementType::U32, MAX_WEIGHTS, 4 * MAX_WEIGHTS, ids));
        bindings.push(VertexBinding::new(Semantic::BoneWeight, ElementType::F32, MAX_WEIGHTS, 4 * MAX_WEIGHTS, weights));
    }

    let indices = match submesh.faces {
        Some(faces) => {
            let mut cursor = view.cursor_at(faces);
            (0..submesh.index_count).map(|_| cursor.read_u16()).collect::<ParseResult<Vec<_>>>()?
        }
        None => Vec::new(),
    };

    Ok(SubmeshData { bindings, indices })
}

/// Read weights as 12 `u32` bone slots and 12 `f32` weight slots per vertex
fn read_skin(view: &PakView<'_>, skin: &SkinDesc, vertex_count: usize, starting_bones: u32) -> ParseResult<(Vec<u8>, Vec<u8>)> {
    let map = skin.map.ok_or_else(|| ParseError::InvalidStructure("skin map pointer is null".into()))?;
    let table = skin.weights.ok_or_else(|| ParseError::InvalidStructure("skin weight pointer is null".into()))?;
    let mut ids = Vec::with_capacity(vertex_count * MAX_WEIGHTS * 4);
    let mut weights = Vec::with_capacity(vertex_count * MAX_WEIGHTS * 4);

    let mut map_cursor = view.cursor_at(map);
    for _ in 0..vertex_count {
        let count = map_cursor.read_u32()? as usize;
        let offset = u64::from(map_cursor.read_u32()?);
        let mut cursor = view.cursor_at(table + offset);
        for w in 0..MAX_WEIGHTS {
            let (bone, weight) = if w >= count {
                (0, 0.0)
            } else if skin.uncompressed {
                let weight = cursor.read_f32()?;
                (cursor.read_u32()?, weight)
            } else {
                let weight = cursor.read_bits(22)? as f32 / WEIGHT_SCALE;
                (cursor.read_bits(10)? + starting_bones, weight)
            };
            ids.extend_from_slice(&bone.to_le_bytes());
            weights.extend_from_slice(&weight.to_le_bytes());
        }
    }
    Ok((ids, weights))
}

/// Decode `submesh` and feed it to `sink`
pub fn emit_submesh(view: &PakView<'_>, submesh: &Submesh, material: &str, starting_bones: Option<u32>, sink: &mut dyn MeshSink) -> ParseResult<()> {
    let data = decode_submesh(view, submesh, starting_bones)?;
    sink.begin_submesh(&submesh.name, material, submesh.lod);
    for binding in data.bindings {
        sink.bind(binding);
    }
    sink.commit_triangles(&data.indices);
    sink.end_submesh();
    Ok(())
}

#[cfg(test)]
mod test_geometry {
    use super::*;

    #[test]
    fn test_lod_from_name() {
        assert_eq!(lod_of("bodyShape"), 0);
        assert_eq!(lod_of("bodyShape2"), 2);
        assert_eq!(lod_of("body_lod"), 0);
        assert_eq!(lod_of("headShapeX"), 0);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("root|hero|bodyShape1"), "bodyShape1");
        assert_eq!(short_name("plain"), "plain");
    }

    #[test]
    fn test_layouts_share_stride() {
        assert!(SubmeshLayout::LEGACY.vertex_count + 12 <= SUBMESH_STRIDE);
        assert!(SubmeshLayout::QUANTIZED.stream_count + 4 <= SUBMESH_STRIDE);
        assert_eq!(SubmeshLayout::for_revision(Revision::Tloup1), SubmeshLayout::QUANTIZED);
        assert_eq!(SubmeshLayout::for_revision(Revision::Legacy), SubmeshLayout::LEGACY);
    }

    #[test]
    fn test_quantized_channel_math() {
        let s = QuantizedStream {
            address: 0,
            buffer: Some(0),
            vertex_count: 2,
            buffer_size: 0,
            comp_type: quantized_code::QUANT_UV1,
            stride: 4,
            sizes: [16, 16, 0, 0],
            scale: [0.5, 0.25, 0.0, 0.0],
            offset: [1.0, -1.0, 0.0, 0.0],
        };
        assert_eq!(s.channels(), 2);
        assert_eq!(s.bits_per_vertex(), 32);
    }
}
