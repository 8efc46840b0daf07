// ndpak-parsers/src/pak/joints.rs
//! Joint hierarchy decoding and bone reconciliation.
//!
//! Only bones whose root ancestor is bone 0 have transforms in the
//! container (the main set). Every other bone borrows a pose from a main
//! bone whose name contains its stem, and may be re-parented onto it.

use std::collections::HashMap;

use ndpak_core::{Mat43, Vec3};
use serde::Serialize;

use super::view::PakView;
use crate::traits::{ParseError, ParseResult};

/// Size of one stored transform
pub const TRANSFORM_SIZE: u64 = 48;
/// Offset of the quaternion inside a transform
pub const TRANSFORM_QUAT: u64 = 16;
/// Offset of the position inside a transform
pub const TRANSFORM_POSITION: u64 = 32;
/// Size of one parent-link record
pub const LINK_SIZE: u64 = 16;
/// Offset of the parent index inside a link record
pub const LINK_PARENT: u64 = 4;

/// One `(group, parent, child, chain)` record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParentLink {
    pub group: i32,
    pub parent: i32,
    pub child: i32,
    pub chain: i32,
}

/// Where the writable joint tables live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JointsInfo {
    pub transforms_start: u64,
    pub parenting_start: u64,
    pub transform_count: u16,
}

/// A reconciled bone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    /// Index in the combined bone list
    pub index: usize,
    pub name: String,
    /// Pose relative to the parent
    pub matrix: Mat43,
    /// Parent in the combined list, -1 for a root
    pub parent: i32,
}

/// Bones of one joint hierarchy
#[derive(Debug, Clone, Serialize)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
    /// Local indices of bones that own a transform, in transform order
    pub main_set: Vec<usize>,
    pub info: JointsInfo,
    /// Offset added to every index of this skeleton
    pub start: usize,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

impl Skeleton {
    pub fn new(bones: Vec<Bone>, main_set: Vec<usize>, info: JointsInfo, start: usize) -> Self {
        let mut by_name = HashMap::with_capacity(bones.len());
        for (i, bone) in bones.iter().enumerate() {
            by_name.entry(bone.name.clone()).or_insert(i);
        }
        Self {
            bones,
            main_set,
            info,
            start,
            by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Local index of the first bone called `name`
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Transform slot of a local bone index, if it is in the main set
    pub fn transform_index(&self, local: usize) -> Option<usize> {
        self.main_set.iter().position(|&b| b == local)
    }

    /// Address of the transform of a main-set slot
    pub fn transform_address(&self, slot: usize) -> u64 {
        self.info.transforms_start + slot as u64 * TRANSFORM_SIZE
    }

    /// Address of the parent field of a local bone index
    pub fn parent_address(&self, local: usize) -> u64 {
        self.info.parenting_start + local as u64 * LINK_SIZE + LINK_PARENT
    }

    /// Name to local index map, first occurrence wins
    pub fn name_map(&self) -> &HashMap<String, usize> {
        &self.by_name
    }
}

/// Decode the joint hierarchy item at `item`.
///
/// `start` is the number of bones already in the combined list; it is
/// added to every index.
pub fn decode_joints(view: &PakView<'_>, item: u64, page_base: u64, start: usize) -> ParseResult<Skeleton> {
    let body = item + 20 + view.item_padding();
    let mut cursor = view.cursor_at(body);
    let bone_count = cursor.read_u32()? as usize;
    let transforms = view.ptr_required(body + 12, "joint transforms")?;
    let names = view.ptr_required(body + 36, "joint names")?;

    let mut block = view.cursor_at(transforms + 16);
    let _node_count = block.read_u16()?;
    let transform_count = block.read_u16()?;
    block.skip(12)?;
    let header_size = u64::from(block.read_u32()?);
    block.skip(24)?;
    let hierarchy_offset = u64::from(block.read_u32()?);

    let transforms_start = transforms + header_size;
    let mut xforms = Vec::with_capacity(usize::from(transform_count));
    let mut cursor = view.cursor_at(transforms_start);
    for _ in 0..transform_count {
        let _scale = cursor.read_f32x3()?;
        cursor.skip(4)?;
        let [x, y, z, w] = cursor.read_f32x4()?;
        let position = Vec3::from_array(cursor.read_f32x3()?);
        cursor.skip(4)?;
        xforms.push(
            Mat43::from_quat([-x, -y, -z, w]).with_translation(position.scale(view.options.global_scale)),
        );
    }

    let hashes_at = transforms + hierarchy_offset + 20;
    let hashes_size = u64::from(view.u32_at(hashes_at)?);
    let parenting_start = (hashes_at + 4 + hashes_size).checked_sub(24).ok_or_else(|| {
        ParseError::InvalidStructure(format!("joint hash table size {hashes_size} is too small"))
    })?;
    let mut cursor = view.cursor_at(parenting_start);
    let links = (0..bone_count)
        .map(|_| {
            Ok(ParentLink {
                group: cursor.read_i32()?,
                parent: cursor.read_i32()?,
                child: cursor.read_i32()?,
                chain: cursor.read_i32()?,
            })
        })
        .collect::<ParseResult<Vec<_>>>()?;

    let mut cursor = view.cursor_at(names);
    let mut bone_names = Vec::with_capacity(bone_count);
    for _ in 0..bone_count {
        cursor.skip(8)?;
        let offset = cursor.read_u64()?;
        bone_names.push(view.string_at(offset + page_base)?);
    }

    let (bones, main_set) = reconcile_bones(&bone_names, &links, &xforms, start, view.options.reparent_helpers);
    tracing::debug!(bones = bones.len(), main = main_set.len(), transforms = transform_count, "decoded joint hierarchy");

    Ok(Skeleton::new(
        bones,
        main_set,
        JointsInfo {
            transforms_start,
            parenting_start,
            transform_count,
        },
        start,
    ))
}

/// Index of the root ancestor of `bone`, following parent links
fn root_ancestor(links: &[ParentLink], bone: usize) -> usize {
    let mut current = bone;
    for _ in 0..links.len() {
        match usize::try_from(links[current].parent) {
            Ok(parent) if parent < links.len() => current = parent,
            _ => break,
        }
    }
    current
}

/// Build the bone list from names, links and main-set transforms.
///
/// Output depends only on input order: the main set is scanned in index
/// order and the first name match wins.
pub fn reconcile_bones(
    names: &[String],
    links: &[ParentLink],
    transforms: &[Mat43],
    start: usize,
    reparent_helpers: bool,
) -> (Vec<Bone>, Vec<usize>) {
    let count = names.len().min(links.len());
    let main_set: Vec<usize> = (0..count).filter(|&b| root_ancestor(links, b) == 0).collect();
    let main_matrix = |slot: usize| transforms.get(slot).copied().unwrap_or(Mat43::IDENTITY);
    let headb = names.iter().position(|n| n == "headb");

    let mut bones = Vec::with_capacity(count);
    for b in 0..count {
        let name = &names[b];
        let link_parent = links[b].parent;
        let in_main = main_set.iter().position(|&m| m == b);

        let (matrix, mut parent) = match in_main {
            Some(slot) => (main_matrix(slot), link_parent),
            None => {
                let end = name.rsplit('_').next().unwrap_or(name);
                let stem = name.replace(&format!("_{end}"), "");
                let matched = main_set
                    .iter()
                    .enumerate()
                    .find(|(_, &m)| names[m].contains(&stem));
                match matched {
                    Some((slot, &m)) => {
                        let reparent = link_parent == -1
                            || (reparent_helpers && (end == "helper" || end == "grp"));
                        let parent = if reparent { m as i32 } else { link_parent };
                        (main_matrix(slot), parent)
                    }
                    None => (Mat43::IDENTITY, link_parent),
                }
            }
        };

        if parent != -1 {
            parent += start as i32;
        } else if in_main.is_none() {
            parent = match headb {
                Some(h) if name == "eyelash_grp" => (h + start) as i32,
                _ => 0,
            };
        }

        bones.push(Bone {
            index: start + b,
            name: name.clone(),
            matrix,
            parent,
        });
    }
    (bones, main_set)
}

/// World matrices for a bone list whose parents index into the same list
pub fn world_matrices(bones: &[Bone]) -> Vec<Mat43> {
    let base = bones.first().map_or(0, |b| b.index);
    let mut world: Vec<Option<Mat43>> = vec![None; bones.len()];

    fn resolve(i: usize, bones: &[Bone], base: usize, world: &mut [Option<Mat43>], depth: usize) -> Mat43 {
        if let Some(m) = world[i] {
            return m;
        }
        let local = bones[i].matrix;
        let parent = usize::try_from(bones[i].parent)
            .ok()
            .and_then(|p| p.checked_sub(base))
            .filter(|&p| p < bones.len() && p != i);
        let m = match parent {
            Some(p) if depth < bones.len() => local.multiply(&resolve(p, bones, base, world, depth + 1)),
            _ => local,
        };
        world[i] = Some(m);
        m
    }

    for i in 0..bones.len() {
        resolve(i, bones, base, &mut world, 0);
    }
    world.into_iter().map(|m| m.unwrap_or(Mat43::IDENTITY)).collect()
}

#[cfg(test)]
mod test_joints {
    use super::*;

    fn link(parent: i32) -> ParentLink {
        ParentLink { group: 0, parent, child: -1, chain: -1 }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> (Vec<String>, Vec<ParentLink>, Vec<Mat43>) {
        let names = names(&["root", "spine", "headb", "spine_helper", "eyelash_grp", "prop_grp"]);
        let links = vec![link(-1), link(0), link(1), link(-1), link(-1), link(-1)];
        let xforms = vec![
            Mat43::IDENTITY,
            Mat43::IDENTITY.with_translation(Vec3::new(0.0, 10.0, 0.0)),
            Mat43::IDENTITY.with_translation(Vec3::new(0.0, 5.0, 0.0)),
        ];
        (names, links, xforms)
    }

    #[test]
    fn test_main_set_is_bones_rooted_at_zero() {
        let (names, links, xforms) = sample();
        let (_, main) = reconcile_bones(&names, &links, &xforms, 0, true);
        assert_eq!(main, vec![0, 1, 2]);
    }

    #[test]
    fn test_helpers_reparent_onto_match() {
        let (names, links, xforms) = sample();
        let (bones, _) = reconcile_bones(&names, &links, &xforms, 0, true);
        // spine_helper matches "spine" and takes its pose
        assert_eq!(bones[3].parent, 1);
        assert_eq!(bones[3].matrix, xforms[1]);
        // eyelash has no match and goes to headb
        assert_eq!(bones[4].parent, 2);
        // prop_grp has no match and goes to the root
        assert_eq!(bones[5].parent, 0);
        assert_eq!(bones[5].matrix, Mat43::IDENTITY);
        // the real root stays a root
        assert_eq!(bones[0].parent, -1);
    }

    #[test]
    fn test_start_offsets_parents() {
        let (names, links, xforms) = sample();
        let (bones, _) = reconcile_bones(&names, &links, &xforms, 10, true);
        assert_eq!(bones[2].index, 12);
        assert_eq!(bones[2].parent, 11);
        assert_eq!(bones[3].parent, 11);
        assert_eq!(bones[4].parent, 12);
        assert_eq!(bones[5].parent, 0);
    }

    #[test]
    fn test_reparent_helpers_off_keeps_link() {
        let names = names(&["root", "arm", "arm_helper"]);
        let links = vec![link(-1), link(0), link(5)];
        let (bones, _) = reconcile_bones(&names, &links, &[], 0, false);
        assert_eq!(bones[2].parent, 5);
        let (bones, _) = reconcile_bones(&names, &links, &[], 0, true);
        assert_eq!(bones[2].parent, 1);
    }

    #[test]
    fn test_reconciliation_is_deterministic() {
        let (names, links, xforms) = sample();
        let first = reconcile_bones(&names, &links, &xforms, 3, true);
        let second = reconcile_bones(&names, &links, &xforms, 3, true);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cyclic_links_terminate() {
        let names = names(&["a", "b"]);
        let links = vec![link(1), link(0)];
        let (bones, main) = reconcile_bones(&names, &links, &[], 0, true);
        assert_eq!(bones.len(), 2);
        assert!(main.len() <= 2);
    }

    #[test]
    fn test_world_matrices_accumulate() {
        let (names, links, xforms) = sample();
        let (bones, _) = reconcile_bones(&names, &links, &xforms, 0, true);
        let world = world_matrices(&bones);
        assert_eq!(world[2].translation(), Vec3::new(0.0, 15.0, 0.0));
    }
}
