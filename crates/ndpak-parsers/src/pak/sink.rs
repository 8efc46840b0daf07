// ndpak-parsers/src/pak/sink.rs
//! Host-facing mesh sink and the serializable scene it builds.
//!
//! Decoders never interpret vertex data beyond what is needed to hand it
//! over: every stream is bound as raw bytes with an element type, a
//! component count and a stride. [`SceneSink`] is the sink used by the
//! CLI and the injector; hosts with their own scene graph implement
//! [`MeshSink`] directly.

use std::borrow::Cow;

use half::f16;
use ndpak_core::{BoundingBox, Game, Mat43, Vec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::header::Revision;
use super::material::Material;

/// Maximum number of influences a vertex can carry
pub const MAX_WEIGHTS: usize = 12;

/// Meaning of a bound vertex stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Normal,
    Tangent,
    /// Second legacy frame stream; `w` holds handedness
    Bitangent,
    Uv(u8),
    Color,
    BoneIndex,
    BoneWeight,
    User(String),
}

/// Storage type of one component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    F16,
    /// Signed byte normalized by 127
    I8,
    U16,
    U32,
}

impl ElementType {
    pub fn size(self) -> usize {
        match self {
            ElementType::F32 | ElementType::U32 => 4,
            ElementType::F16 | ElementType::U16 => 2,
            ElementType::I8 => 1,
        }
    }
}

/// One vertex stream handed to a sink
#[derive(Debug, Clone)]
pub struct VertexBinding<'a> {
    pub semantic: Semantic,
    pub element: ElementType,
    pub components: usize,
    pub stride: usize,
    pub data: Cow<'a, [u8]>,
}

impl<'a> VertexBinding<'a> {
    pub fn new(semantic: Semantic, element: ElementType, components: usize, stride: usize, data: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            semantic,
            element,
            components,
            stride,
            data: data.into(),
        }
    }

    /// Tightly packed f32 stream
    pub fn floats(semantic: Semantic, components: usize, values: &[f32]) -> VertexBinding<'static> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        VertexBinding::new(semantic, ElementType::F32, components, components * 4, data)
    }

    pub fn vertex_count(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride
        }
    }

    fn component_bytes(&self, vertex: usize, component: usize) -> Option<&[u8]> {
        let size = self.element.size();
        let start = vertex * self.stride + component * size;
        self.data.get(start..start + size)
    }

    /// Component value as f32; missing components read as zero
    pub fn component(&self, vertex: usize, component: usize) -> f32 {
        let Some(b) = self.component_bytes(vertex, component) else {
            return 0.0;
        };
        match self.element {
            ElementType::F32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            ElementType::F16 => f16::from_bits(u16::from_le_bytes([b[0], b[1]])).to_f32(),
            ElementType::I8 => f32::from(b[0] as i8) / 127.0,
            ElementType::U16 => f32::from(u16::from_le_bytes([b[0], b[1]])),
            ElementType::U32 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32,
        }
    }

    /// Component value as an integer
    pub fn component_u32(&self, vertex: usize, component: usize) -> u32 {
        let Some(b) = self.component_bytes(vertex, component) else {
            return 0;
        };
        match self.element {
            ElementType::U32 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            ElementType::U16 => u32::from(u16::from_le_bytes([b[0], b[1]])),
            _ => self.component(vertex, component).max(0.0) as u32,
        }
    }

    /// Every vertex as an `N`-wide row, padding with zeros
    pub fn rows<const N: usize>(&self) -> Vec<[f32; N]> {
        (0..self.vertex_count())
            .map(|v| {
                let mut row = [0.0; N];
                for (c, slot) in row.iter_mut().enumerate().take(self.components) {
                    *slot = self.component(v, c);
                }
                row
            })
            .collect()
    }
}

/// Receiver of decoded geometry
pub trait MeshSink {
    fn begin_submesh(&mut self, name: &str, material: &str, lod: u8);
    fn bind(&mut self, binding: VertexBinding<'_>);
    fn commit_triangles(&mut self, indices: &[u16]);
    fn end_submesh(&mut self);
}

/// A named extra stream kept as vec4 rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStream {
    pub name: String,
    pub values: Vec<[f32; 4]>,
}

/// One decoded submesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedMesh {
    pub name: String,
    pub material: String,
    #[serde(default)]
    pub lod: u8,
    pub positions: Vec<[f32; 3]>,
    #[serde(default)]
    pub normals: Vec<[f32; 3]>,
    /// Tangent with handedness in `w`
    #[serde(default)]
    pub tangents: Vec<[f32; 4]>,
    #[serde(default)]
    pub uvs: Vec<Vec<[f32; 2]>>,
    #[serde(default)]
    pub colors: Vec<[f32; 4]>,
    /// Nonzero `(bone, weight)` pairs per vertex
    #[serde(default)]
    pub weights: Vec<SmallVec<[(u32, f32); 4]>>,
    #[serde(default)]
    pub user_streams: Vec<UserStream>,
    pub indices: Vec<u16>,
}

impl DecodedMesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_skinned(&self) -> bool {
        self.weights.iter().any(|w| !w.is_empty())
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = Vec3::from_array(*self.positions.first()?);
        let mut bbox = BoundingBox::new(first, first);
        for p in &self.positions[1..] {
            bbox.expand(Vec3::from_array(*p));
        }
        Some(bbox)
    }

    /// Number of nonzero influences across all vertices
    pub fn weight_count(&self) -> usize {
        self.weights
            .iter()
            .map(|w| w.iter().filter(|(_, weight)| *weight > 0.0).count())
            .sum()
    }
}

/// A bone as exported: world matrix and parent index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneBone {
    pub name: String,
    pub parent: i32,
    pub matrix: Mat43,
}

/// Everything decoded from one or more containers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodedScene {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub game: Game,
    #[serde(default, skip_deserializing)]
    pub revision: Option<Revision>,
    pub meshes: Vec<DecodedMesh>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub bones: Vec<SceneBone>,
    /// File names of textures the materials reference
    #[serde(default)]
    pub textures: Vec<String>,
}

impl DecodedScene {
    pub fn mesh(&self, name: &str) -> Option<&DecodedMesh> {
        self.meshes.iter().find(|m| m.name == name)
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Matrix of `bone` relative to its parent
    pub fn local_matrix(&self, bone: usize) -> Option<Mat43> {
        let b = self.bones.get(bone)?;
        let parent = usize::try_from(b.parent).ok().and_then(|p| self.bones.get(p));
        Some(match parent {
            Some(p) => b.matrix.multiply(&p.matrix.inverse()),
            None => b.matrix,
        })
    }
}

#[derive(Default)]
struct PendingSkin {
    indices: Vec<Vec<u32>>,
    weights: Vec<Vec<f32>>,
}

/// [`MeshSink`] collecting submeshes into [`DecodedMesh`] values
#[derive(Default)]
pub struct SceneSink {
    current: Option<DecodedMesh>,
    bitangents: Vec<[f32; 4]>,
    skin: PendingSkin,
    pub meshes: Vec<DecodedMesh>,
}

impl SceneSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_meshes(self) -> Vec<DecodedMesh> {
        self.meshes
    }
}

fn per_vertex<T: Copy + Default>(binding: &VertexBinding<'_>, read: impl Fn(usize, usize) -> T) -> Vec<Vec<T>> {
    (0..binding.vertex_count())
        .map(|v| (0..binding.components).map(|c| read(v, c)).collect())
        .collect()
}

impl MeshSink for SceneSink {
    fn begin_submesh(&mut self, name: &str, material: &str, lod: u8) {
        let mut mesh = DecodedMesh::new(name);
        mesh.material = material.to_string();
        mesh.lod = lod;
        self.current = Some(mesh);
        self.bitangents.clear();
        self.skin = PendingSkin::default();
    }

    fn bind(&mut self, binding: VertexBinding<'_>) {
        let Some(mesh) = self.current.as_mut() else {
            tracing::warn!(semantic = ?binding.semantic, "stream bound outside a submesh");
            return;
        };
        match &binding.semantic {
            Semantic::Position => mesh.positions = binding.rows::<3>(),
            Semantic::Normal => mesh.normals = binding.rows::<3>(),
            Semantic::Tangent => mesh.tangents = binding.rows::<4>(),
            Semantic::Bitangent => self.bitangents = binding.rows::<4>(),
            Semantic::Uv(set) => {
                let set = usize::from(*set);
                if mesh.uvs.len() <= set {
                    mesh.uvs.resize(set + 1, Vec::new());
                }
                mesh.uvs[set] = binding.rows::<2>();
            }
            Semantic::Color => mesh.colors = binding.rows::<4>(),
            Semantic::BoneIndex => self.skin.indices = per_vertex(&binding, |v, c| binding.component_u32(v, c)),
            Semantic::BoneWeight => self.skin.weights = per_vertex(&binding, |v, c| binding.component(v, c)),
            Semantic::User(name) => mesh.user_streams.push(UserStream {
                name: name.clone(),
                values: binding.rows::<4>(),
            }),
        }
    }

    fn commit_triangles(&mut self, indices: &[u16]) {
        if let Some(mesh) = self.current.as_mut() {
            mesh.indices.extend_from_slice(indices);
        }
    }

    fn end_submesh(&mut self) {
        let Some(mut mesh) = self.current.take() else {
            return;
        };

        if mesh.tangents.is_empty() && !self.bitangents.is_empty() {
            mesh.tangents = self
                .bitangents
                .iter()
                .zip(&mesh.normals)
                .map(|(b, n)| {
                    let w = if b[3] < 0.0 { -1.0 } else { 1.0 };
                    let t = Vec3::new(b[0], b[1], b[2]).cross(&Vec3::from_array(*n)).scale(w);
                    [t.x, t.y, t.z, w]
                })
                .collect();
        }

        let skin = std::mem::take(&mut self.skin);
        if !skin.indices.is_empty() {
            mesh.weights = skin
                .indices
                .iter()
                .zip(&skin.weights)
                .map(|(ids, ws)| {
                    ids.iter()
                        .zip(ws)
                        .filter(|(_, w)| **w > 0.0)
                        .map(|(i, w)| (*i, *w))
                        .collect()
                })
                .collect();
        }

        self.meshes.push(mesh);
    }
}
