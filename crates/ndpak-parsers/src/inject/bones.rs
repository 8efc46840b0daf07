// ndpak-parsers/src/inject/bones.rs
//! Writes replacement bone transforms and parents back into a joint hierarchy.

use crate::cursor::ByteWriter;
use crate::pak::joints::{Skeleton, TRANSFORM_POSITION, TRANSFORM_QUAT};
use crate::pak::sink::DecodedScene;

/// Overwrite the local transform and parent of every scene bone that the
/// skeleton's main set also contains. Returns the number of bones written.
pub fn write_bones(out: &mut ByteWriter, skeleton: &Skeleton, scene: &DecodedScene, global_scale: f32) -> usize {
    let mut written = 0;
    for (index, bone) in scene.bones.iter().enumerate() {
        let Some(local) = skeleton.find(&bone.name) else {
            tracing::debug!(bone = %bone.name, "bone not in target skeleton");
            continue;
        };
        let Some(slot) = skeleton.transform_index(local) else {
            continue;
        };
        let Some(matrix) = scene.local_matrix(index) else {
            continue;
        };

        let transform = skeleton.transform_address(slot);
        out.seek(transform + TRANSFORM_QUAT);
        for q in matrix.transpose_rotation().to_quat() {
            out.write_f32(q);
        }
        out.seek(transform + TRANSFORM_POSITION);
        for c in matrix.translation().scale(1.0 / global_scale).to_array() {
            out.write_f32(c);
        }

        let parent = match usize::try_from(bone.parent) {
            Err(_) => Some(-1),
            Ok(p) => scene
                .bones
                .get(p)
                .and_then(|parent| skeleton.find(&parent.name))
                .and_then(|id| i32::try_from(id).ok()),
        };
        match parent {
            Some(parent) => {
                out.seek(skeleton.parent_address(local));
                out.write_i32(parent);
            }
            None => tracing::warn!(bone = %bone.name, "parent bone not in target skeleton; keeping original parent"),
        }
        written += 1;
    }
    tracing::info!(written, "wrote bone transforms");
    written
}

#[cfg(test)]
mod test_bones {
    use super::*;
    use crate::cursor::ByteCursor;
    use crate::pak::joints::{Bone, JointsInfo, TRANSFORM_SIZE};
    use crate::pak::sink::SceneBone;
    use ndpak_core::{Mat43, Vec3};

    fn skeleton() -> Skeleton {
        let bone = |index: usize, name: &str, parent: i32| Bone {
            index,
            name: name.into(),
            matrix: Mat43::IDENTITY,
            parent,
        };
        Skeleton::new(
            vec![bone(0, "root", -1), bone(1, "helper_grp", 0), bone(2, "spine", 0)],
            vec![0, 2],
            JointsInfo {
                transforms_start: 0x100,
                parenting_start: 0x200,
                transform_count: 2,
            },
            0,
        )
    }

    #[test]
    fn test_writes_main_set_bones() {
        let scene = DecodedScene {
            bones: vec![
                SceneBone { name: "root".into(), parent: -1, matrix: Mat43::IDENTITY },
                SceneBone {
                    name: "spine".into(),
                    parent: 0,
                    matrix: Mat43::IDENTITY.with_translation(Vec3::new(0.0, 150.0, 0.0)),
                },
                SceneBone { name: "prop".into(), parent: 1, matrix: Mat43::IDENTITY },
            ],
            ..Default::default()
        };
        let mut out = ByteWriter::from_vec(vec![0xEE; 0x240]);
        assert_eq!(write_bones(&mut out, &skeleton(), &scene, 100.0), 2);
        let data = out.into_inner();
        let cursor = ByteCursor::new(&data);

        let spine = 0x100 + TRANSFORM_SIZE;
        let quat = ByteCursor::at(&data, spine + TRANSFORM_QUAT).read_f32x4().unwrap();
        assert!((quat[3].abs() - 1.0).abs() < 1e-5);
        let position = ByteCursor::at(&data, spine + TRANSFORM_POSITION).read_f32x3().unwrap();
        assert!((position[1] - 1.5).abs() < 1e-5);

        assert_eq!(cursor.read_i32_at(skeleton().parent_address(0)).unwrap(), -1);
        assert_eq!(cursor.read_i32_at(skeleton().parent_address(2)).unwrap(), 0);
        // not in the main set, untouched
        assert_eq!(cursor.read_u32_at(skeleton().parent_address(1)).unwrap(), 0xEEEE_EEEE);
    }
}
