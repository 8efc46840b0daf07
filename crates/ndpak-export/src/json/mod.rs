// ndpak-export/src/json/mod.rs
//! JSON output for decoded scenes and container summaries.
//!
//! The scene file is the same format `inject` reads back as its
//! replacement model.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use ndpak_parsers::{DecodedScene, PakContainer};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// JSON export errors
#[derive(Error, Debug)]
pub enum JsonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type JsonResult<T> = Result<T, JsonError>;

/// JSON export options
#[derive(Debug, Clone)]
pub struct JsonExportOptions {
    /// Use pretty-print formatting
    pub pretty: bool,
    /// Add a metadata block with counts to summaries
    pub include_metadata: bool,
}

impl Default for JsonExportOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            include_metadata: true,
        }
    }
}

/// Writes scenes and summaries as JSON
#[derive(Debug, Default)]
pub struct JsonExporter {
    options: JsonExportOptions,
}

impl JsonExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: JsonExportOptions) -> Self {
        Self { options }
    }

    /// Write a decoded scene
    pub fn export_scene(&self, scene: &DecodedScene, output_path: impl AsRef<Path>) -> JsonResult<()> {
        tracing::info!(
            path = %output_path.as_ref().display(),
            meshes = scene.meshes.len(),
            bones = scene.bones.len(),
            "writing scene"
        );
        self.write_json(scene, output_path)
    }

    /// Header, pages, items, submeshes, bones, materials and textures of a container
    pub fn container_summary(&self, pak: &PakContainer) -> serde_json::Value {
        let submeshes: Vec<_> = pak
            .submeshes()
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "lod": s.lod,
                    "vertices": s.vertex_count,
                    "indices": s.index_count,
                    "streams": s.streams.len(),
                    "skinned": s.skin.is_some(),
                    "material": s.material.and_then(|m| pak.materials.get(m)).map(|m| m.name.as_str()),
                })
            })
            .collect();
        let bones: Vec<_> = pak
            .skeleton
            .iter()
            .flat_map(|s| s.bones.iter())
            .map(|b| json!({ "name": b.name, "parent": b.parent }))
            .collect();
        let textures: Vec<_> = pak
            .vrams()
            .iter()
            .map(|v| json!({ "hash": format!("{:#018X}", v.hash), "file": v.file_name, "source": v.source_path }))
            .collect();
        let items: Vec<_> = pak
            .resources
            .items
            .iter()
            .map(|i| json!({ "type": i.item_type.as_str(), "name": i.name, "address": i.address() }))
            .collect();

        let mut value = json!({
            "header": pak.header,
            "revision": pak.revision,
            "pages": pak.pages(),
            "items": items,
            "submeshes": submeshes,
            "bones": bones,
            "materials": pak.materials.materials,
            "textures": textures,
        });
        if self.options.include_metadata {
            value["metadata"] = json!({
                "path": pak.path().map(|p| p.display().to_string()),
                "size": pak.data().len(),
                "fixups": pak.fixups.len(),
                "needs_base_skeleton": pak.needs_base_skeleton(),
            });
        }
        value
    }

    /// Write any serializable value
    pub fn write_json<T: Serialize + ?Sized>(&self, value: &T, output_path: impl AsRef<Path>) -> JsonResult<()> {
        let file = File::create(output_path)?;
        let writer = BufWriter::new(file);
        if self.options.pretty {
            serde_json::to_writer_pretty(writer, value)?;
        } else {
            serde_json::to_writer(writer, value)?;
        }
        Ok(())
    }

    /// Serialize to a string
    pub fn to_string<T: Serialize + ?Sized>(&self, value: &T) -> JsonResult<String> {
        Ok(if self.options.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndpak_parsers::DecodedMesh;

    #[test]
    fn test_scene_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let mut mesh = DecodedMesh::new("bodyShape");
        mesh.positions = vec![[0.0, 1.0, 2.0]; 3];
        mesh.indices = vec![0, 1, 2];
        let scene = DecodedScene {
            meshes: vec![mesh],
            ..Default::default()
        };

        JsonExporter::new().export_scene(&scene, &path).unwrap();
        let back = ndpak_parsers::inject::model::load_scene(&path).unwrap();
        assert_eq!(back.meshes, scene.meshes);
    }

    #[test]
    fn test_compact_output() {
        let exporter = JsonExporter::with_options(JsonExportOptions {
            pretty: false,
            include_metadata: false,
        });
        let text = exporter.to_string(&json!({ "a": 1 })).unwrap();
        assert_eq!(text, r#"{"a":1}"#);
    }
}
