// ndpak-parsers/src/inject/encode.rs
//! Byte encoders for replacement vertex streams, skin tables and faces.

use ndpak_core::Vec3;

use super::model::ReplacementMesh;
use crate::cursor::{BitWriter, ByteWriter};
use crate::pak::geometry::{legacy_code, quantized_code, LegacyStream, QuantizedStream, StreamDesc, WEIGHT_SCALE};

/// Handedness byte for a positive frame
pub const HANDED_POSITIVE: u8 = 127;
/// Handedness byte for a mirrored frame
pub const HANDED_NEGATIVE: u8 = 129;

/// Signed-byte encoding of a unit component
pub fn frame_byte(c: f32) -> u8 {
    (f64::from(c) * 127.0 + 0.500_000_000_1) as i32 as u8
}

fn frame_bytes(v: Vec3) -> [u8; 3] {
    [frame_byte(v.x), frame_byte(v.y), frame_byte(v.z)]
}

/// Pack one weight as `bone << 22 | weight`; the weight is truncated
pub fn pack_weight(bone: u32, weight: f32) -> u32 {
    (bone << 22) | (f64::from(weight) * f64::from(WEIGHT_SCALE)) as u32 & 0x3F_FFFF
}

pub fn unpack_weight(word: u32) -> (u32, f32) {
    (word >> 22, (word & 0x3F_FFFF) as f32 / WEIGHT_SCALE)
}

/// Encoded per-vertex weight tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkinTables {
    /// `(count, byte offset)` per vertex
    pub map: Vec<u8>,
    pub weights: Vec<u8>,
    /// Number of weight entries
    pub total: u32,
}

/// Encode the map and weight tables of `mesh`.
///
/// Only nonzero weights are counted. `uncompressed` selects
/// `(f32 weight, u32 bone)` pairs over packed words.
pub fn encode_skin(mesh: &ReplacementMesh, uncompressed: bool) -> SkinTables {
    let mut map = ByteWriter::new();
    let mut weights = ByteWriter::new();
    let mut total = 0u32;
    for v in 0..mesh.vertex_count() {
        let offset = weights.len() as u32;
        let mut count = 0u32;
        for (bone, w) in mesh.live_weights(v) {
            if uncompressed {
                weights.write_f32(w);
                weights.write_u32(bone);
            } else {
                weights.write_u32(pack_weight(bone, w));
            }
            count += 1;
        }
        map.write_u32(count);
        map.write_u32(offset);
        total += count;
    }
    SkinTables {
        map: map.into_inner(),
        weights: weights.into_inner(),
        total,
    }
}

/// Face indices as little-endian `u16`s
pub fn encode_faces(indices: &[u16]) -> Vec<u8> {
    indices.iter().flat_map(|i| i.to_le_bytes()).collect()
}

/// Encodes the streams of one submesh in descriptor order.
///
/// UV, frame and color streams are matched to the replacement by the
/// order they appear in, so one encoder must see every stream of the
/// submesh.
#[derive(Debug)]
pub struct StreamEncoder<'m> {
    mesh: &'m ReplacementMesh,
    global_scale: f32,
    found_uvs: usize,
    found_frames: usize,
    found_colors: usize,
}

impl<'m> StreamEncoder<'m> {
    pub fn new(mesh: &'m ReplacementMesh, global_scale: f32) -> Self {
        Self {
            mesh,
            global_scale,
            found_uvs: 0,
            found_frames: 0,
            found_colors: 0,
        }
    }

    /// Bytes for stream `index`
    pub fn encode(&mut self, index: usize, stream: &StreamDesc) -> Vec<u8> {
        match stream {
            StreamDesc::Legacy(sd) => self.encode_legacy(index, sd),
            StreamDesc::Quantized(sd) => self.encode_quantized(index, sd),
        }
    }

    fn buffer(&self, stride: usize) -> ByteWriter {
        ByteWriter::from_vec(vec![0u8; stride * self.mesh.vertex_count()])
    }

    fn scaled_position(&self, v: usize) -> [f32; 3] {
        self.mesh.positions[v].map(|c| c / self.global_scale)
    }

    fn write_positions(&self, out: &mut ByteWriter, stride: usize, half: bool) {
        for v in 0..self.mesh.vertex_count() {
            out.seek((v * stride) as u64);
            let [x, y, z] = self.scaled_position(v);
            if half {
                out.write_f16(x);
                out.write_f16(y);
                out.write_f16(z);
                out.write_f16(0.0);
            } else {
                out.write_f32(x);
                out.write_f32(y);
                out.write_f32(z);
            }
        }
    }

    fn write_uvs(&self, out: &mut ByteWriter, stride: usize, set: usize) {
        let Some(uvs) = self.mesh.uv_set(set) else {
            tracing::debug!(mesh = %self.mesh.name, set, "replacement lacks UV set; writing zeros");
            return;
        };
        for (v, [u, t]) in uvs.iter().enumerate() {
            out.seek((v * stride) as u64);
            out.write_f16(*u);
            out.write_f16(*t);
        }
    }

    fn write_normals(&self, out: &mut ByteWriter, stride: usize) {
        for v in 0..self.mesh.vertex_count() {
            out.seek((v * stride) as u64);
            out.write_bytes(&frame_bytes(self.mesh.normal(v)));
            out.write_u8(0);
        }
    }

    fn encode_legacy(&mut self, index: usize, sd: &LegacyStream) -> Vec<u8> {
        let stride = usize::from(sd.stride);
        let mut out = self.buffer(stride);
        if index == 0 {
            match stride {
                12 => self.write_positions(&mut out, stride, false),
                8 => self.write_positions(&mut out, stride, true),
                other => tracing::warn!(mesh = %self.mesh.name, stride = other, "unexpected position stride; writing zeros"),
            }
            return out.into_inner();
        }
        match sd.comp_type {
            legacy_code::UV => {
                self.found_uvs += 1;
                self.write_uvs(&mut out, stride, self.found_uvs - 1);
            }
            legacy_code::FRAME => {
                self.found_frames += 1;
                match self.found_frames {
                    1 => self.write_normals(&mut out, stride),
                    2 => {
                        for v in 0..self.mesh.vertex_count() {
                            let n = self.mesh.normal(v);
                            let (t, _) = self.mesh.tangent(v);
                            let b = self.mesh.bitangent(v);
                            let handed = if n.cross(&t).dot(&b) < 0.0 { HANDED_NEGATIVE } else { HANDED_POSITIVE };
                            out.seek((v * stride) as u64);
                            out.write_bytes(&frame_bytes(b));
                            out.write_u8(handed);
                        }
                    }
                    _ => tracing::debug!(mesh = %self.mesh.name, "extra frame stream left zeroed"),
                }
            }
            legacy_code::COLOR => {
                self.found_colors += 1;
                let colors = &self.mesh.colors;
                if self.found_colors == 1 && colors.len() == self.mesh.vertex_count() {
                    for (v, c) in colors.iter().enumerate() {
                        out.seek((v * stride) as u64);
                        out.write_f16(c[0]);
                        out.write_f16(c[1]);
                        out.write_f16(c[2]);
                        out.write_f16(0.0);
                    }
                }
            }
            other => {
                tracing::debug!(mesh = %self.mesh.name, comp_type = other, "zero-filling unhandled stream");
            }
        }
        out.into_inner()
    }

    fn encode_quantized(&mut self, index: usize, sd: &QuantizedStream) -> Vec<u8> {
        let stride = usize::from(sd.stride);
        let n = self.mesh.vertex_count();
        if index == 0 && stride == 12 {
            let mut out = self.buffer(stride);
            self.write_positions(&mut out, stride, false);
            return out.into_inner();
        }
        match sd.comp_type {
            quantized_code::UV1 | quantized_code::UV2 => {
                let mut out = self.buffer(stride);
                let set = usize::from(sd.comp_type == quantized_code::UV2);
                self.write_uvs(&mut out, stride, set);
                out.into_inner()
            }
            quantized_code::NORMAL => {
                let mut out = self.buffer(stride);
                self.write_normals(&mut out, stride);
                out.into_inner()
            }
            quantized_code::TANGENT => {
                let mut out = self.buffer(stride);
                for v in 0..n {
                    let (t, w) = self.mesh.tangent(v);
                    out.seek((v * stride) as u64);
                    out.write_bytes(&frame_bytes(t));
                    out.write_u8(if w < 0.0 { HANDED_NEGATIVE } else { HANDED_POSITIVE });
                }
                out.into_inner()
            }
            code => {
                let values: Vec<[f32; 3]> = match code {
                    quantized_code::QUANT_POSITION => (0..n).map(|v| self.scaled_position(v)).collect(),
                    quantized_code::QUANT_UV1 | quantized_code::QUANT_UV2 | quantized_code::QUANT_UVX => {
                        let set = match code {
                            quantized_code::QUANT_UV1 => 0,
                            quantized_code::QUANT_UV2 => 1,
                            _ => 2,
                        };
                        match self.mesh.uv_set(set) {
                            Some(uvs) => uvs.iter().map(|[u, v]| [*u, *v, 0.0]).collect(),
                            None => vec![[0.0; 3]; n],
                        }
                    }
                    other => {
                        tracing::debug!(mesh = %self.mesh.name, comp_type = other, "zero-filling unhandled quantized stream");
                        vec![[0.0; 3]; n]
                    }
                };
                let mut packed = requantize(sd, &values);
                let size = (stride * n).max((sd.bits_per_vertex() as usize * n).div_ceil(8));
                packed.resize(size, 0);
                packed
            }
        }
    }
}

/// Bit-pack `values` with the stream's own scale and offset
pub fn requantize(stream: &QuantizedStream, values: &[[f32; 3]]) -> Vec<u8> {
    let mut bits = BitWriter::new();
    for value in values {
        for c in 0..4 {
            let width = stream.sizes[c];
            if width == 0 {
                continue;
            }
            let component = value.get(c).copied().unwrap_or(0.0);
            bits.write_bits(quantize(component, stream.scale[c], stream.offset[c], width), width);
        }
    }
    bits.finish()
}

/// `round((v - offset) / scale)` clamped to the channel width
pub fn quantize(value: f32, scale: f32, offset: f32, width: u8) -> u32 {
    if scale == 0.0 {
        return 0;
    }
    let max = if width >= 32 { u32::MAX } else { (1u32 << width) - 1 };
    let q = ((value - offset) / scale).round();
    if q <= 0.0 {
        0
    } else if q >= max as f32 {
        max
    } else {
        q as u32
    }
}
