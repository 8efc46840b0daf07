// ndpak-parsers/src/pak/material.rs
//! Material blocks: texture slot assignment and shader parameters.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::view::PakView;
use super::vram::{TextureRequest, VramTable, TEXTURE_EXTENSION};
use crate::traits::ParseResult;

/// Default specular color, alpha is the exponent
pub const DEFAULT_SPECULAR: [f32; 4] = [0.5, 0.5, 0.5, 32.0];
/// Alpha-test threshold for transparency-mapped materials
pub const OPACITY_ALPHA_TEST: f32 = 0.05;

const PARAM_STRIDE: u64 = 24;

/// Field offsets of a material block for one descriptor generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MaterialLayout {
    params: u64,
    params_zero_valid: bool,
    textures: u64,
    param_count: u64,
    texture_count: u64,
    texture_stride: u64,
    texture_ref: u64,
}

impl MaterialLayout {
    const LEGACY: Self = Self {
        params: 32,
        params_zero_valid: false,
        textures: 40,
        param_count: 60,
        texture_count: 64,
        texture_stride: 40,
        texture_ref: 16,
    };

    const QUANTIZED: Self = Self {
        params: 24,
        params_zero_valid: true,
        textures: 32,
        param_count: 272,
        texture_count: 276,
        texture_stride: 48,
        texture_ref: 24,
    };

    fn for_view(view: &PakView<'_>) -> Self {
        if view.revision.is_quantized() {
            Self::QUANTIZED
        } else {
            Self::LEGACY
        }
    }
}

/// A named shader constant, padded to four floats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderParam {
    pub name: String,
    pub values: [f32; 4],
    pub count: u32,
}

/// A decoded material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub shader_type: String,
    pub diffuse: Option<TextureRequest>,
    pub normal: Option<TextureRequest>,
    pub opacity: Option<TextureRequest>,
    pub specular: Option<TextureRequest>,
    pub occlusion: Option<TextureRequest>,
    pub flip_normal_y: bool,
    pub alpha_test: Option<f32>,
    pub two_sided: bool,
    pub diffuse_color: Option<[f32; 4]>,
    pub specular_color: [f32; 4],
    pub roughness: Option<f32>,
    pub metal: Option<f32>,
    pub skip_render: bool,
    #[serde(default)]
    pub params: Vec<ShaderParam>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shader_type: String::new(),
            diffuse: None,
            normal: None,
            opacity: None,
            specular: None,
            occlusion: None,
            flip_normal_y: false,
            alpha_test: None,
            two_sided: false,
            diffuse_color: None,
            specular_color: DEFAULT_SPECULAR,
            roughness: None,
            metal: None,
            skip_render: false,
            params: Vec::new(),
        }
    }

    pub fn slots(&self) -> impl Iterator<Item = &TextureRequest> {
        [&self.diffuse, &self.normal, &self.opacity, &self.specular, &self.occlusion]
            .into_iter()
            .flatten()
    }
}

/// Local file name of a shader asset path, up to the first `:`
pub fn material_key(asset_name: &str) -> String {
    let path = asset_name.split(':').next().unwrap_or(asset_name);
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_string()
}

/// One entry of a material's texture list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSlot {
    /// Declared slot name, e.g. `BaseColor01`
    pub name: String,
    pub vram_hash: u64,
    /// Derived file name, if the hash is registered
    pub file_name: Option<String>,
}

#[derive(Default)]
struct Loaded {
    diffuse: bool,
    normal: bool,
    opacity: bool,
    specular: bool,
    occlusion: bool,
}

/// Assign slots by name markers, in fixed precedence.
///
/// Returns the textures that should be loaded for this material.
pub fn assign_slots(material: &mut Material, slots: &[TextureSlot], convert: bool, load_all: bool) -> Vec<TextureRequest> {
    let mut loaded = Loaded::default();
    let mut requests = Vec::new();
    let mut secondary: Option<&TextureSlot> = None;

    for slot in slots {
        let vram = TextureRequest::Vram { hash: slot.vram_hash };
        let mut wanted = false;

        if let Some(file) = slot.file_name.as_deref().filter(|_| slot.name.contains("01")) {
            if !loaded.diffuse && slot.name.contains("BaseColor01") {
                loaded.diffuse = true;
                wanted = true;
                material.diffuse = Some(vram.clone());
            } else if !loaded.normal && (slot.name.contains("Normal01") || slot.name.contains("NR")) {
                loaded.normal = true;
                wanted = true;
                material.normal = Some(vram.clone());
                if convert {
                    material.flip_normal_y = true;
                    if slot.name.contains("NR") && file.contains("-ao") {
                        let derived = TextureRequest::Derived {
                            source: slot.vram_hash,
                            name: file.replace(TEXTURE_EXTENSION, &format!("_NoesisAO{TEXTURE_EXTENSION}")),
                        };
                        material.occlusion = Some(derived.clone());
                        requests.push(derived);
                    }
                }
            } else if !loaded.opacity && slot.name.contains("Transparency01") {
                loaded.opacity = true;
                wanted = true;
                material.opacity = Some(vram.clone());
                material.alpha_test = Some(OPACITY_ALPHA_TEST);
                material.two_sided = true;
                if convert {
                    if !loaded.normal {
                        let nrm = placeholder("NoesisNRM");
                        material.normal = Some(nrm.clone());
                        requests.push(nrm);
                    }
                    if !loaded.diffuse {
                        let brown = placeholder("NoesisBrown");
                        material.diffuse = Some(brown.clone());
                        requests.push(brown);
                    }
                }
            } else if !loaded.specular && slot.name.contains("pecular") {
                loaded.specular = true;
                wanted = true;
                material.specular = Some(vram.clone());
            } else if !loaded.occlusion && slot.name.contains("Ao01") {
                loaded.occlusion = true;
                wanted = true;
                material.occlusion = Some(vram.clone());
            }
        }

        if !loaded.diffuse && secondary.is_none() && slot.name.contains("Color0") {
            secondary = Some(slot);
        }

        if (wanted || load_all) && slot.file_name.is_some() {
            requests.push(vram);
        }
    }

    if !loaded.diffuse {
        if let Some(slot) = secondary.filter(|s| s.file_name.is_some()) {
            let vram = TextureRequest::Vram { hash: slot.vram_hash };
            material.diffuse = Some(vram.clone());
            requests.push(vram);
        }
    }

    material.skip_render = convert
        && material.diffuse.is_none()
        && ((!loaded.normal && !loaded.opacity && !loaded.specular && material.diffuse_color.is_none())
            || material.name.contains("lens"));
    requests
}

fn placeholder(name: &str) -> TextureRequest {
    TextureRequest::Placeholder {
        name: format!("{name}{TEXTURE_EXTENSION}"),
    }
}

/// Apply recognized shader parameters to scalar material fields
pub fn apply_params(material: &mut Material) {
    let mut set_base = false;
    let mut set_spec = false;
    let mut set_rough = false;
    let mut set_metal = false;
    for param in &material.params {
        let lower = param.name.to_lowercase();
        let v = param.values;
        if param.count == 3 && !set_base && material.diffuse.is_none() && lower.contains("basecolor") {
            set_base = true;
            material.diffuse_color = Some(v);
        } else if param.count == 1 && !set_spec && lower.contains("spec") {
            set_spec = true;
            material.specular_color = [0.5 * v[0], 0.5 * v[0], 0.5 * v[0], DEFAULT_SPECULAR[3]];
        } else if param.count == 1 && !set_rough && lower.contains("roughness") {
            set_rough = true;
            material.roughness = Some(v[0]);
        } else if param.count == 1 && !set_metal && lower.contains("metal") {
            set_metal = true;
            material.metal = Some(v[0]);
        }
    }
}

fn read_params(view: &PakView<'_>, start: u64, count: u32) -> ParseResult<Vec<ShaderParam>> {
    let mut params = Vec::with_capacity(count as usize);
    for j in 0..u64::from(count) {
        let at = start + PARAM_STRIDE * j;
        let name = match view.ptr_zero_valid(at)? {
            Some(p) => view.string_at(p)?,
            None => String::new(),
        };
        let value = view.ptr(at + 8)?;
        let count = view.u32_at(at + 16)?;
        let mut values = [0.0, 0.0, 0.0, 1.0];
        if let Some(value) = value {
            let mut cursor = view.cursor_at(value);
            for slot in values.iter_mut().take(count.min(4) as usize) {
                *slot = cursor.read_f32()?;
            }
        }
        params.push(ShaderParam { name, values, count });
    }
    Ok(params)
}

fn read_slots(view: &PakView<'_>, layout: &MaterialLayout, start: u64, count: u32, vrams: &VramTable) -> ParseResult<Vec<TextureSlot>> {
    let mut slots = Vec::with_capacity(count as usize);
    for j in 0..u64::from(count) {
        let at = start + layout.texture_stride * j;
        let name = view.string_ptr(at)?.unwrap_or_default();
        let Some(reference) = view.ptr(at + layout.texture_ref)? else {
            continue;
        };
        let vram_hash = view.u64_at(reference + 8)?;
        slots.push(TextureSlot {
            name,
            vram_hash,
            file_name: vrams.get(vram_hash).map(|e| e.file_name.clone()),
        });
    }
    Ok(slots)
}

/// Decode the material block at `address`
pub fn decode_material(view: &PakView<'_>, address: u64, vrams: &VramTable) -> ParseResult<(Material, Vec<TextureRequest>)> {
    let layout = MaterialLayout::for_view(view);
    let asset = view.string_ptr(address)?.unwrap_or_default();
    let shader_type = view.string_ptr(address + 8)?.unwrap_or_default();

    let mut material = Material::new(material_key(&asset));
    material.shader_type = shader_type;

    let param_count = view.u32_at(address + layout.param_count)?;
    let texture_count = view.u32_at(address + layout.texture_count)?;
    let params_at = if layout.params_zero_valid {
        view.ptr_zero_valid(address + layout.params)?
    } else {
        view.ptr(address + layout.params)?
    };

    let slots = match view.ptr(address + layout.textures)? {
        Some(start) => read_slots(view, &layout, start, texture_count, vrams)?,
        None => Vec::new(),
    };
    if let Some(start) = params_at {
        material.params = read_params(view, start, param_count)?;
    }

    let options = view.options;
    let requests = assign_slots(&mut material, &slots, options.convert_textures, options.load_all_textures);
    apply_params(&mut material);
    // skip_render also depends on a base color parameter
    if material.skip_render && material.diffuse_color.is_some() && !material.name.contains("lens") {
        material.skip_render = false;
    }

    if options.print_material_params {
        for p in &material.params {
            tracing::info!(material = %material.name, param = %p.name, values = ?&p.values[..p.count.min(4) as usize], "shader parameter");
        }
    }
    tracing::debug!(material = %material.name, textures = slots.len(), params = material.params.len(), "decoded material");
    Ok((material, requests))
}

/// Materials of one container, deduplicated by block address
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaterialSet {
    pub materials: Vec<Material>,
    /// Textures to load, in first-request order
    pub texture_requests: Vec<TextureRequest>,
    #[serde(skip)]
    by_address: HashMap<u64, usize>,
    #[serde(skip)]
    requested: HashSet<TextureRequest>,
}

impl MaterialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the material at `address`, decoding it on first use
    pub fn resolve(&mut self, view: &PakView<'_>, address: u64, vrams: &VramTable) -> ParseResult<usize> {
        if let Some(&index) = self.by_address.get(&address) {
            return Ok(index);
        }
        let (material, requests) = decode_material(view, address, vrams)?;
        for request in requests {
            self.request(request);
        }
        let index = self.materials.len();
        self.materials.push(material);
        self.by_address.insert(address, index);
        Ok(index)
    }

    pub fn request(&mut self, request: TextureRequest) {
        if self.requested.insert(request.clone()) {
            self.texture_requests.push(request);
        }
    }

    pub fn get(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod test_material {
    use super::*;

    fn slot(name: &str, hash: u64, file: Option<&str>) -> TextureSlot {
        TextureSlot {
            name: name.to_string(),
            vram_hash: hash,
            file_name: file.map(str::to_string),
        }
    }

    #[test]
    fn test_material_key() {
        assert_eq!(material_key("art/shaders/hero-body.mat:main"), "hero-body.mat");
        assert_eq!(material_key("plain"), "plain");
    }

    #[test]
    fn test_slot_precedence() {
        let mut m = Material::new("body");
        let slots = [
            slot("BaseColor01", 1, Some("a.dds")),
            slot("BaseColor01", 2, Some("b.dds")),
            slot("Normal01", 3, Some("n.dds")),
            slot("Specular01", 4, Some("s.dds")),
            slot("Ao01", 5, Some("o.dds")),
        ];
        let requests = assign_slots(&mut m, &slots, true, false);
        assert_eq!(m.diffuse, Some(TextureRequest::Vram { hash: 1 }));
        assert_eq!(m.normal, Some(TextureRequest::Vram { hash: 3 }));
        assert_eq!(m.specular, Some(TextureRequest::Vram { hash: 4 }));
        assert_eq!(m.occlusion, Some(TextureRequest::Vram { hash: 5 }));
        assert!(m.flip_normal_y);
        assert_eq!(requests.len(), 4);
        assert!(!m.skip_render);
    }

    #[test]
    fn test_transparency_gets_placeholders() {
        let mut m = Material::new("hair");
        let requests = assign_slots(&mut m, &[slot("Transparency01", 9, Some("t.dds"))], true, false);
        assert_eq!(m.alpha_test, Some(OPACITY_ALPHA_TEST));
        assert!(m.two_sided);
        assert_eq!(m.normal, Some(TextureRequest::Placeholder { name: "NoesisNRM.dds".into() }));
        assert_eq!(m.diffuse, Some(TextureRequest::Placeholder { name: "NoesisBrown.dds".into() }));
        assert_eq!(requests.len(), 3);
    }

    #[test]
    fn test_derived_ambient_occlusion() {
        let mut m = Material::new("face");
        assert!(assign_slots(&mut m, &[slot("NR01", 7, Some("face-nr-ao.dds"))], true, false)
            .contains(&TextureRequest::Derived { source: 7, name: "face-nr-ao_NoesisAO.dds".into() }));
        assert!(matches!(m.occlusion, Some(TextureRequest::Derived { source: 7, .. })));
    }

    #[test]
    fn test_secondary_diffuse_and_skip_render() {
        let mut m = Material::new("prop");
        assign_slots(&mut m, &[slot("DetailColor02", 4, Some("d.dds"))], true, false);
        assert_eq!(m.diffuse, Some(TextureRequest::Vram { hash: 4 }));

        let mut lens = Material::new("glass_lens");
        assign_slots(&mut lens, &[slot("Normal01", 1, Some("n.dds"))], true, false);
        assert!(lens.skip_render);
        let mut plain = Material::new("cloth");
        assign_slots(&mut plain, &[slot("Normal01", 1, Some("n.dds"))], true, false);
        assert!(!plain.skip_render);
        let mut empty = Material::new("decal");
        assign_slots(&mut empty, &[], true, false);
        assert!(empty.skip_render);
        let mut empty = Material::new("decal");
        assign_slots(&mut empty, &[], false, false);
        assert!(!empty.skip_render);
    }

    #[test]
    fn test_params_apply() {
        let mut m = Material::new("m");
        m.params = vec![
            ShaderParam { name: "g_BaseColor".into(), values: [0.2, 0.3, 0.4, 1.0], count: 3 },
            ShaderParam { name: "g_SpecScale".into(), values: [0.8, 0.0, 0.0, 1.0], count: 1 },
            ShaderParam { name: "g_Roughness".into(), values: [0.6, 0.0, 0.0, 1.0], count: 1 },
        ];
        apply_params(&mut m);
        assert_eq!(m.diffuse_color, Some([0.2, 0.3, 0.4, 1.0]));
        assert_eq!(m.specular_color, [0.4, 0.4, 0.4, 32.0]);
        assert_eq!(m.roughness, Some(0.6));
        assert_eq!(m.metal, None);
    }
}
