// ndpak-parsers/src/inject/model.rs
//! Replacement geometry as the mutator consumes it.

use std::path::Path;

use ndpak_core::Vec3;
use smallvec::{smallvec, SmallVec};

use crate::pak::joints::Skeleton;
use crate::pak::sink::{DecodedMesh, DecodedScene};
use crate::traits::ParseResult;

/// Vertex limit of 16-bit face indices
pub const MAX_VERTICES: usize = 65_535;

/// Offset of the tiny positions given to placeholder submeshes
const PLACEHOLDER_EXTENT: f32 = 0.000_000_000_01;

/// One submesh worth of replacement data.
///
/// Positions are in scene units (already multiplied by the global scale);
/// bone ids index the target container's skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// xyz tangent and handedness in w
    pub tangents: Vec<[f32; 4]>,
    pub uvs: Vec<Vec<[f32; 2]>>,
    pub colors: Vec<[f32; 4]>,
    pub weights: Vec<SmallVec<[(u32, f32); 4]>>,
    pub indices: Vec<u16>,
    pub placeholder: bool,
}

impl ReplacementMesh {
    /// Invisible stand-in for a submesh the model does not replace
    pub fn placeholder(name: &str) -> Self {
        let e = PLACEHOLDER_EXTENT;
        Self {
            name: name.to_string(),
            positions: vec![[e, 0.0, 0.0], [0.0, e, 0.0], [0.0, 0.0, e]],
            normals: vec![[0.0; 3]; 3],
            tangents: vec![[0.0; 4]; 3],
            uvs: vec![vec![[0.0; 2]; 3], vec![[0.0; 2]; 3]],
            colors: Vec::new(),
            weights: vec![smallvec![(0, 1.0)]; 3],
            indices: vec![0, 1, 2],
            placeholder: true,
        }
    }

    /// Convert a decoded mesh, mapping scene bone indices to `skeleton` by name.
    ///
    /// A bone missing from the skeleton is logged and written as bone 0.
    pub fn from_decoded(mesh: &DecodedMesh, scene: &DecodedScene, skeleton: Option<&Skeleton>) -> Self {
        let weights = mesh
            .weights
            .iter()
            .map(|vertex| {
                vertex
                    .iter()
                    .map(|&(bone, w)| (target_bone(bone, scene, skeleton), w))
                    .collect()
            })
            .collect();
        Self {
            name: mesh.name.clone(),
            positions: mesh.positions.clone(),
            normals: mesh.normals.clone(),
            tangents: mesh.tangents.clone(),
            uvs: mesh.uvs.clone(),
            colors: mesh.colors.clone(),
            weights,
            indices: mesh.indices.clone(),
            placeholder: false,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn normal(&self, v: usize) -> Vec3 {
        self.normals.get(v).map_or(Vec3::ZERO, |n| Vec3::from_array(*n))
    }

    pub fn tangent(&self, v: usize) -> (Vec3, f32) {
        self.tangents
            .get(v)
            .map_or((Vec3::ZERO, 1.0), |t| (Vec3::new(t[0], t[1], t[2]), t[3]))
    }

    /// Bitangent rebuilt from normal, tangent and handedness
    pub fn bitangent(&self, v: usize) -> Vec3 {
        let (t, w) = self.tangent(v);
        self.normal(v).cross(&t).scale(w)
    }

    /// UV set `set`, if it covers every vertex
    pub fn uv_set(&self, set: usize) -> Option<&[[f32; 2]]> {
        self.uvs
            .get(set)
            .filter(|uv| uv.len() == self.vertex_count())
            .map(Vec::as_slice)
    }

    /// Nonzero weights of vertex `v`
    pub fn live_weights(&self, v: usize) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.weights
            .get(v)
            .into_iter()
            .flat_map(|w| w.iter().copied())
            .filter(|&(_, w)| w > 0.0)
    }
}

fn target_bone(bone: u32, scene: &DecodedScene, skeleton: Option<&Skeleton>) -> u32 {
    let Some(name) = scene.bones.get(bone as usize).map(|b| b.name.as_str()) else {
        tracing::warn!(bone, "weight references a bone the model does not define");
        return 0;
    };
    match skeleton.and_then(|s| s.find(name)) {
        Some(id) => id as u32,
        None => {
            tracing::warn!(bone = %name, "bone weight not found in container skeleton");
            0
        }
    }
}

/// Name a replacement is matched under: its mesh name without extension.
///
/// Submesh names are compared as stored.
pub fn match_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

/// Source name of a `NNNN_`-prefixed split mesh
fn split_source(name: &str) -> &str {
    match name.split_once('_') {
        Some((prefix, rest)) if prefix.len() == 4 && prefix.bytes().all(|b| b.is_ascii_digit()) => rest,
        _ => name,
    }
}

/// The model was split into `0000_`-prefixed parts on export
pub fn is_split(meshes: &[DecodedMesh]) -> bool {
    meshes.first().is_some_and(|m| m.name.starts_with("0000_"))
}

/// Join split parts that share a source name, in first-seen order.
///
/// Joined meshes over [`MAX_VERTICES`] are dropped with a warning.
pub fn recombine(meshes: Vec<ReplacementMesh>) -> Vec<ReplacementMesh> {
    let mut groups: Vec<ReplacementMesh> = Vec::new();
    for part in meshes {
        let source = split_source(&part.name).to_string();
        let Some(group) = groups.iter_mut().find(|g| g.name == source) else {
            groups.push(ReplacementMesh { name: source, ..part });
            continue;
        };
        let base = group.positions.len();
        let uv_sets = group.uvs.len().max(part.uvs.len());
        group.uvs.resize(uv_sets, Vec::new());
        for (set, uvs) in part.uvs.into_iter().enumerate() {
            group.uvs[set].extend(uvs);
        }
        group.indices.extend(part.indices.iter().map(|&i| (usize::from(i) + base) as u16));
        group.positions.extend(part.positions);
        group.normals.extend(part.normals);
        group.tangents.extend(part.tangents);
        group.colors.extend(part.colors);
        group.weights.extend(part.weights);
    }
    groups
        .into_iter()
        .filter(|mesh| {
            let keep = mesh.vertex_count() <= MAX_VERTICES;
            if !keep {
                tracing::warn!(mesh = %mesh.name, vertices = mesh.vertex_count(), "recombined mesh exceeds 65535 vertices");
            }
            keep
        })
        .collect()
}

/// Load a replacement scene written by the JSON exporter
pub fn load_scene(path: &Path) -> ParseResult<DecodedScene> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Replacement meshes of `scene`, with split parts recombined
pub fn replacement_meshes(scene: &DecodedScene, skeleton: Option<&Skeleton>) -> Vec<ReplacementMesh> {
    let meshes: Vec<ReplacementMesh> = scene
        .meshes
        .iter()
        .map(|m| ReplacementMesh::from_decoded(m, scene, skeleton))
        .collect();
    if is_split(&scene.meshes) {
        tracing::warn!("duplicate mesh names detected; recombining split meshes");
        recombine(meshes)
    } else {
        meshes
    }
}

#[cfg(test)]
mod test_model {
    use super::*;

    fn part(name: &str, verts: usize) -> ReplacementMesh {
        ReplacementMesh {
            name: name.to_string(),
            positions: vec![[1.0, 2.0, 3.0]; verts],
            normals: vec![[0.0, 0.0, 1.0]; verts],
            tangents: vec![[1.0, 0.0, 0.0, 1.0]; verts],
            uvs: vec![vec![[0.5, 0.5]; verts]],
            colors: Vec::new(),
            weights: vec![smallvec![(1, 1.0)]; verts],
            indices: vec![0, 1, 2],
            placeholder: false,
        }
    }

    #[test]
    fn test_placeholder_shape() {
        let mesh = ReplacementMesh::placeholder("bodyShape");
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.positions[1], [0.0, 1e-11, 0.0]);
        assert_eq!(mesh.live_weights(0).collect::<Vec<_>>(), vec![(0, 1.0)]);
        assert!(mesh.uv_set(1).is_some());
    }

    #[test]
    fn test_recombine_offsets_indices() {
        let merged = recombine(vec![part("0000_body", 3), part("0001_body", 3), part("0002_head", 3)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "body");
        assert_eq!(merged[0].vertex_count(), 6);
        assert_eq!(merged[0].indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(merged[0].uvs[0].len(), 6);
        assert_eq!(merged[1].name, "head");
    }

    #[test]
    fn test_recombine_drops_oversized() {
        let merged = recombine(vec![part("0000_big", 40_000), part("0001_big", 40_000)]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_match_name_strips_extension() {
        assert_eq!(match_name("bodyShape.001"), "bodyShape");
        assert_eq!(match_name("bodyShape"), "bodyShape");
    }

    #[test]
    fn test_bitangent_follows_handedness() {
        let mut mesh = part("m", 1);
        assert_eq!(mesh.bitangent(0), Vec3::new(0.0, 1.0, 0.0));
        mesh.tangents[0][3] = -1.0;
        assert_eq!(mesh.bitangent(0), Vec3::new(0.0, -1.0, 0.0));
    }
}
