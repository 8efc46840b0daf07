// ndpak-parsers/tests/inject.rs
//! Injection into synthetic containers, checked by reloading the output.

mod common;

use common::{ContainerBuilder, MeshSpec, CHAIN};
use ndpak_core::{Mat43, Vec3};
use ndpak_parsers::inject::{self, InjectOptions, Injector};
use ndpak_parsers::{ByteCursor, DecodedScene, PakContainer, PakOptions, ParseError};

fn build() -> (Vec<u8>, common::Layout) {
    ContainerBuilder::new()
        .bones(&CHAIN)
        .mesh(MeshSpec::new("bodyShape", 10).skinned())
        .mesh(MeshSpec::new("eyesShape", 3))
        .lods(3)
        .build_with_layout()
}

fn load(data: Vec<u8>) -> PakContainer {
    PakContainer::from_bytes(data, &PakOptions::default()).unwrap()
}

fn grow(scene: &mut DecodedScene, name: &str, vertices: usize) {
    let mesh = scene.meshes.iter_mut().find(|m| m.name == name).unwrap();
    let template_weights = mesh.weights.clone();
    mesh.positions = (0..vertices).map(|i| [i as f32, 1.0, -(i as f32)]).collect();
    mesh.normals = vec![[0.0, 1.0, 0.0]; vertices];
    for set in &mut mesh.uvs {
        *set = vec![[0.5, 0.25]; vertices];
    }
    mesh.weights = (0..vertices).map(|i| template_weights[i % template_weights.len()].clone()).collect();
    mesh.indices = (0..vertices as u16).collect();
}

#[test]
fn test_same_scene_leaves_tables_untouched() {
    common::init_tracing();
    let (data, layout) = build();
    let pak = load(data.clone());
    let scene = pak.decode_scene().unwrap();

    let rewrite = Injector::new(&pak, InjectOptions::default()).rewrite(Some(&scene)).unwrap();
    assert_eq!(rewrite.report.new_pages, 0);
    assert!(rewrite.report.relocated.is_empty());
    assert_eq!(rewrite.report.injected, 2);
    assert_eq!(rewrite.data.len(), data.len());
    // header, page table and fixup table
    let tables = layout.page_base as usize;
    assert_eq!(&rewrite.data[..tables], &data[..tables]);

    let again = load(rewrite.data).decode_scene().unwrap();
    for (before, after) in scene.meshes.iter().zip(&again.meshes) {
        assert_eq!(before.name, after.name);
        assert_eq!(before.indices, after.indices);
        assert_eq!(before.weights, after.weights);
        for (a, b) in before.positions.iter().zip(&after.positions) {
            for c in 0..3 {
                assert!((a[c] - b[c]).abs() < 1e-3);
            }
        }
    }
}

#[test]
fn test_growth_appends_one_page() {
    let (data, _) = build();
    let pak = load(data);
    let mut scene = pak.decode_scene().unwrap();
    grow(&mut scene, "bodyShape", 20);

    let rewrite = Injector::new(&pak, InjectOptions::default()).rewrite(Some(&scene)).unwrap();
    assert_eq!(rewrite.report.relocated, vec!["bodyShape".to_string()]);
    assert_eq!(rewrite.report.new_pages, 1);

    let out = load(rewrite.data);
    assert_eq!(out.pages.len(), 2);
    assert_eq!(out.pages.get(1).unwrap().base % 16, 0);
    assert_eq!(out.pages.raw_data_start(), out.pages.get(1).unwrap().end());

    let body = out.geometry.as_ref().unwrap().find("bodyShape").unwrap();
    assert_eq!(body.vertex_count, 20);
    assert_eq!(body.index_count, 20);
    let position_buffer = body.streams[0].buffer().unwrap();
    assert_eq!(out.pages.page_of(position_buffer), Some(1));
    assert_eq!(body.skin.unwrap().weight_count, 20);

    let decoded = out.decode_scene().unwrap();
    let mesh = decoded.mesh("bodyShape").unwrap();
    assert_eq!(mesh.vertex_count(), 20);
    assert!((mesh.positions[19][0] - 19.0).abs() < 1e-3);
    assert!((mesh.positions[19][2] + 19.0).abs() < 1e-3);
    assert_eq!(mesh.weights[3], scene.mesh("bodyShape").unwrap().weights[3]);
    assert_eq!(mesh.indices.len(), 20);

    // the untouched submesh still decodes in place
    let eyes = out.geometry.as_ref().unwrap().find("eyesShape").unwrap();
    assert_eq!(out.pages.page_of(eyes.streams[0].buffer().unwrap()), Some(0));
}

fn with_normal_recalc() -> (Vec<u8>, common::Layout) {
    ContainerBuilder::new()
        .bones(&CHAIN)
        .mesh(MeshSpec::new("bodyShape", 10).skinned().normal_recalc([true, false, true, true]))
        .build_with_layout()
}

#[test]
fn test_growth_moves_normal_recalc_buffers() {
    let (data, _) = with_normal_recalc();
    let pak = load(data);
    let mut scene = pak.decode_scene().unwrap();
    grow(&mut scene, "bodyShape", 20);
    let body = scene.meshes.iter_mut().find(|m| m.name == "bodyShape").unwrap();
    body.indices = (0..40u16).map(|i| i % 20).collect();

    let rewrite = Injector::new(&pak, InjectOptions::default()).rewrite(Some(&scene)).unwrap();
    assert_eq!(rewrite.report.new_pages, 1);

    let out = load(rewrite.data);
    let body = out.geometry.as_ref().unwrap().find("bodyShape").unwrap();
    let recalc = body.normal_recalc.as_ref().unwrap();
    assert_eq!(recalc.vertex_count, 20);
    assert_eq!(recalc.index_count, 40);
    assert!(recalc.buffers[1].is_none());

    let shared = recalc.buffers[0].unwrap();
    assert_eq!(recalc.buffers[2], Some(shared));
    assert_eq!(recalc.buffers[3], Some(shared));
    assert_eq!(out.pages.page_of(shared), Some(1));

    let at = shared as usize;
    assert!(out.data()[at..at + 40].iter().all(|&b| b == 0));
}

#[test]
fn test_normal_recalc_zeroed_in_place() {
    let (data, layout) = with_normal_recalc();
    let pak = load(data.clone());
    let before = pak.geometry.as_ref().unwrap().find("bodyShape").unwrap().normal_recalc.unwrap();
    let scene = pak.decode_scene().unwrap();

    let rewrite = Injector::new(&pak, InjectOptions::default()).rewrite(Some(&scene)).unwrap();
    assert_eq!(rewrite.report.new_pages, 0);

    let desc = layout.page_base + layout.normal_recalc[0].1;
    let cursor = ByteCursor::new(&rewrite.data);
    assert_eq!(cursor.read_u32_at(desc).unwrap(), 10);
    assert_eq!(cursor.read_u32_at(desc + 4).unwrap(), 3);
    // pointer slots are left as they were
    let slots = (desc + 8) as usize;
    assert_eq!(&rewrite.data[slots..slots + 32], &data[slots..slots + 32]);

    for buffer in before.buffers.iter().flatten() {
        let at = *buffer as usize;
        assert!(data[at..at + 20].iter().any(|&b| b != 0));
        assert!(rewrite.data[at..at + 20].iter().all(|&b| b == 0));
    }
}

#[test]
fn test_large_growth_spans_several_pages() {
    let (data, _) = build();
    let pak = load(data);
    let mut scene = pak.decode_scene().unwrap();
    grow(&mut scene, "bodyShape", 60000);

    let rewrite = Injector::new(&pak, InjectOptions::default()).rewrite(Some(&scene)).unwrap();
    assert_eq!(rewrite.report.new_pages, 3);

    let out = load(rewrite.data);
    assert_eq!(out.pages.len(), 4);
    for i in 1..4 {
        assert_eq!(out.pages.get(i).unwrap().base % 16, 0);
    }

    let body = out.geometry.as_ref().unwrap().find("bodyShape").unwrap();
    assert_eq!(body.vertex_count, 60000);
    let pages: Vec<_> = body.streams.iter().map(|s| out.pages.page_of(s.buffer().unwrap())).collect();
    assert_eq!(pages, vec![Some(1), Some(1), Some(2)]);

    let decoded = out.decode_scene().unwrap();
    let mesh = decoded.mesh("bodyShape").unwrap();
    assert_eq!(mesh.vertex_count(), 60000);
    assert!((mesh.positions[59999][0] - 59999.0).abs() < 1e-2);
    assert!((mesh.positions[59999][2] + 59999.0).abs() < 1e-2);
    assert_eq!(mesh.indices.len(), 60000);
}

#[test]
fn test_submesh_names_matched_as_stored() {
    let data = ContainerBuilder::new().mesh(MeshSpec::new("arm.l", 4)).build();
    let pak = load(data);

    let mut scene = pak.decode_scene().unwrap();
    scene.meshes[0].name = "arm".to_string();
    let rewrite = Injector::new(&pak, InjectOptions::default()).rewrite(Some(&scene)).unwrap();
    assert_eq!(rewrite.report.placeholders, 1);
    assert_eq!(rewrite.report.injected, 0);

    scene.meshes[0].name = "arm.l.001".to_string();
    let rewrite = Injector::new(&pak, InjectOptions::default()).rewrite(Some(&scene)).unwrap();
    assert_eq!(rewrite.report.placeholders, 0);
    assert_eq!(rewrite.report.injected, 1);
}

#[test]
fn test_second_injection_keeps_single_marker() {
    let (data, _) = build();
    let pak = load(data);
    let mut scene = pak.decode_scene().unwrap();
    grow(&mut scene, "bodyShape", 20);
    let first = Injector::new(&pak, InjectOptions::default()).rewrite(Some(&scene)).unwrap();

    let modded = load(first.data);
    grow(&mut scene, "bodyShape", 30);
    let second = Injector::new(&modded, InjectOptions::default()).rewrite(Some(&scene)).unwrap();
    assert!(second.report.modded);
    assert_eq!(second.report.new_pages, 1);

    let out = load(second.data);
    assert_eq!(out.pages.len(), 3);
    assert_eq!(out.decode_scene().unwrap().mesh("bodyShape").unwrap().vertex_count(), 30);
}

#[test]
fn test_missing_mesh_becomes_placeholder() {
    let (data, _) = build();
    let pak = load(data);
    let mut scene = pak.decode_scene().unwrap();
    scene.meshes.retain(|m| m.name != "eyesShape");

    let rewrite = Injector::new(&pak, InjectOptions::default()).rewrite(Some(&scene)).unwrap();
    assert_eq!(rewrite.report.placeholders, 1);
    assert_eq!(rewrite.report.injected, 1);

    let out = load(rewrite.data);
    let eyes = out.geometry.as_ref().unwrap().find("eyesShape").unwrap();
    assert_eq!(eyes.vertex_count, 3);
    let decoded = out.decode_scene().unwrap();
    let positions = &decoded.mesh("eyesShape").unwrap().positions;
    assert!(positions.iter().flatten().all(|c| c.abs() < 1e-6));
}

#[test]
fn test_lods_collapse_onto_first() {
    let (data, layout) = build();
    let pak = load(data);
    let scene = pak.decode_scene().unwrap();
    let rewrite = Injector::new(&pak, InjectOptions::default()).rewrite(Some(&scene)).unwrap();

    let cursor = ByteCursor::new(&rewrite.data);
    let desc = |a: usize| layout.page_base + layout.lod_descs[a];
    let lod0 = cursor.read_u64_at(desc(0) + 24).unwrap();
    assert_eq!(cursor.read_u64_at(desc(1) + 24).unwrap(), lod0);
    assert_eq!(cursor.read_u32_at(desc(1) + 4).unwrap(), 2);
    // the last LOD is left alone
    assert_ne!(cursor.read_u64_at(desc(2) + 24).unwrap(), lod0);
    assert_eq!(cursor.read_u32_at(desc(2) + 4).unwrap(), 1);
}

#[test]
fn test_lods_kept_when_included() {
    let (data, layout) = build();
    let options = PakOptions {
        include_lods: true,
        ..PakOptions::default()
    };
    let pak = PakContainer::from_bytes(data.clone(), &options).unwrap();
    let scene = pak.decode_scene().unwrap();
    let rewrite = Injector::new(&pak, InjectOptions::default()).rewrite(Some(&scene)).unwrap();

    let at = (layout.page_base + layout.lod_descs[1]) as usize;
    assert_eq!(&rewrite.data[at..at + 32], &data[at..at + 32]);
}

#[test]
fn test_bones_written_into_own_skeleton() {
    let (data, _) = build();
    let pak = load(data);
    let mut scene = pak.decode_scene().unwrap();
    let spine = scene.bone_index("spine").unwrap();
    scene.bones[spine].matrix = Mat43::IDENTITY.with_translation(Vec3::new(0.0, 60.0, 0.0));

    let options = InjectOptions {
        bones: true,
        ..InjectOptions::default()
    };
    let rewrite = Injector::new(&pak, options).rewrite(Some(&scene)).unwrap();
    assert_eq!(rewrite.report.bones_written, 3);
    assert!(rewrite.base_data.is_none());

    let out = load(rewrite.data).decode_scene().unwrap();
    let spine_y = out.bones[spine].matrix.translation().to_array()[1];
    let head_y = out.bones[2].matrix.translation().to_array()[1];
    assert!((spine_y - 60.0).abs() < 1e-3, "spine at {spine_y}");
    assert!((head_y - 75.0).abs() < 1e-3, "head at {head_y}");
    assert_eq!(out.bones[2].parent, 1);
}

#[test]
fn test_textures_only_changes_nothing_without_folder() {
    let (data, _) = build();
    let pak = load(data.clone());
    let options = InjectOptions {
        textures_only: true,
        ..InjectOptions::default()
    };
    let rewrite = Injector::new(&pak, options).rewrite(None).unwrap();
    assert_eq!(rewrite.data, data);
    assert_eq!(rewrite.report.injected, 0);
}

#[test]
fn test_run_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("hero.pak");
    let (data, _) = build();
    std::fs::write(&source, &data).unwrap();

    let options = PakOptions::default();
    let mut scene = PakContainer::open(&source, &options).unwrap().decode_scene().unwrap();
    grow(&mut scene, "bodyShape", 12);
    let model = dir.path().join("hero.json");
    std::fs::write(&model, serde_json::to_string(&scene).unwrap()).unwrap();

    let output = dir.path().join("hero.NEW.pak");
    let report = inject::run(&source, Some(&model), &output, &options, InjectOptions::default(), None).unwrap();
    assert_eq!(report.new_pages, 1);

    let out = PakContainer::open(&output, &options).unwrap();
    assert_eq!(out.decode_scene().unwrap().mesh("bodyShape").unwrap().vertex_count(), 12);
}

#[test]
fn test_run_without_model_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("hero.pak");
    std::fs::write(&source, build().0).unwrap();
    let output = dir.path().join("hero.NEW.pak");

    let result = inject::run(&source, None, &output, &PakOptions::default(), InjectOptions::default(), None);
    assert!(matches!(result, Err(ParseError::InvalidStructure(_))));
    assert!(!output.exists());
}

#[test]
fn test_run_writes_bones_to_base_skeleton() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("hero.pak");
    let skeleton = dir.path().join("skel.pak");
    std::fs::write(&source, ContainerBuilder::new().mesh(MeshSpec::new("bodyShape", 4).skinned()).build()).unwrap();
    std::fs::write(&skeleton, ContainerBuilder::new().bones(&CHAIN).build()).unwrap();

    let options = PakOptions {
        base_skeleton: Some(skeleton.clone()),
        ..PakOptions::default()
    };
    let mut scene = PakContainer::open(&source, &options).unwrap().decode_scene().unwrap();
    assert_eq!(scene.bones.len(), 3);
    scene.bones[1].matrix = Mat43::IDENTITY.with_translation(Vec3::new(0.0, 80.0, 0.0));
    let model = dir.path().join("hero.json");
    std::fs::write(&model, serde_json::to_string(&scene).unwrap()).unwrap();

    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();
    let output = out_dir.join("hero.NEW.pak");
    let inject_options = InjectOptions {
        bones: true,
        ..InjectOptions::default()
    };
    let report = inject::run(&source, Some(&model), &output, &options, inject_options, None).unwrap();
    let written = out_dir.join("skel.NEW.pak");
    assert_eq!(report.base_written.as_deref(), Some(written.as_path()));

    let base = PakContainer::open(&written, &PakOptions::default()).unwrap();
    let spine_y = base.decode_scene().unwrap().bones[1].matrix.translation().to_array()[1];
    assert!((spine_y - 80.0).abs() < 1e-3);
}

#[test]
fn test_run_fails_without_base_skeleton() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("hero.pak");
    std::fs::write(&source, ContainerBuilder::new().mesh(MeshSpec::new("bodyShape", 4).skinned()).build()).unwrap();
    let model = dir.path().join("hero.json");
    std::fs::write(&model, serde_json::to_string(&DecodedScene::default()).unwrap()).unwrap();
    let output = dir.path().join("hero.NEW.pak");

    let result = inject::run(&source, Some(&model), &output, &PakOptions::default(), InjectOptions::default(), None);
    assert!(matches!(result, Err(ParseError::MissingBaseSkeleton { .. })));
    assert!(!output.exists());
}
