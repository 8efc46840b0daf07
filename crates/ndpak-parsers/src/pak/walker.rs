// ndpak-parsers/src/pak/walker.rs
//! Resource-item discovery.
//!
//! Two protocols fill the same [`ResourceIndex`]: the page-header directory
//! of the older layouts and the hashed login table of the newest one.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;

use super::header::{LoginEntry, Revision};
use super::pages::{PageHeader, PAGE_HEADER_SIZE};
use super::view::PakView;
use super::vram::VramTable;
use crate::traits::{ParseError, ParseResult};

/// Resource item types the engine cares about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ResItemType {
    JointHierarchy,
    Geometry,
    VramDesc,
    VramDescTable,
    TextureTable,
    TextureDictionary,
    PakLoginTable,
    MaterialTable,
    Other(String),
}

impl ResItemType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "JOINT_HIERARCHY" => Self::JointHierarchy,
            "GEOMETRY_1" => Self::Geometry,
            "VRAM_DESC" => Self::VramDesc,
            "VRAM_DESC_TABLE" => Self::VramDescTable,
            "TEXTURE_TABLE" => Self::TextureTable,
            "TEXTURE_DICTIONARY" => Self::TextureDictionary,
            "PAK_LOGIN_TABLE" => Self::PakLoginTable,
            "MATERIAL_TABLE_1" => Self::MaterialTable,
            other => Self::Other(other.to_string()),
        }
    }

    /// Type for a hashed type id; `None` for ids not in the table
    pub fn from_hash(hash: u64) -> Option<Self> {
        TYPE_HASHES.get(&hash).map(|name| Self::from_name(name))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::JointHierarchy => "JOINT_HIERARCHY",
            Self::Geometry => "GEOMETRY_1",
            Self::VramDesc => "VRAM_DESC",
            Self::VramDescTable => "VRAM_DESC_TABLE",
            Self::TextureTable => "TEXTURE_TABLE",
            Self::TextureDictionary => "TEXTURE_DICTIONARY",
            Self::PakLoginTable => "PAK_LOGIN_TABLE",
            Self::MaterialTable => "MATERIAL_TABLE_1",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ResItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static TYPE_HASHES: Lazy<HashMap<u64, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (0x50CA_F525_7D6A_140B, "JOINT_HIERARCHY"),
        (0x349D_779A_792F_45C1, "GEOMETRY_1"),
        (0xCE3A_DE69_3131_B309, "VRAM_DESC"),
        (0xE725_4422_A7A8_F476, "VRAM_DESC_TABLE"),
        (0xA248_1DA1_A5D2_CE2B, "TEXTURE_TABLE"),
        (0x3612_5D3C_FB7F_3991, "TEXTURE_DICTIONARY"),
        (0x4903_7312_34F1_BEA6, "PAK_LOGIN_TABLE"),
        (0x61DE_7E61_41BC_6F2B, "EFFECT_TABLE"),
        (0x460F_4975_40A2_9F73, "SPAWNER_GROUP"),
        (0x0596_A727_79C4_C87D, "TAG_INT"),
        (0x53DE_1E19_77F9_CBA4, "ANIM_GROUP"),
        (0x7911_3700_2DB1_7EBB, "MATERIAL_TABLE_1"),
        (0x384A_DF72_4B12_3839, "FOREGROUND_SECTION_2"),
        (0x05AD_B4A2_D2E2_A6EB, "COLLISION_DATA_CLOTH"),
        (0x3A3B_B43D_817C_93DE, "TAG_VEC4"),
        (0x35EB_8812_D3A2_D576, "TAG_FLOAT"),
        (0x06A9_8005_088A_56C5, "LEVEL_BOUNDING_BOX_DATA"),
        (0x0438_E1B0_DBFF_AA93, "AMBSHADOWS_OCCLUDER_INFO"),
        (0x7D9B_FD5C_EC87_9080, "COLLISION_DATA_FOREGROUND"),
        (0xEC3A_FEDF_7EF2_82F0, "SOUND_BANK_TABLE"),
    ])
});

/// A typed region inside a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceItem {
    pub item_type: ResItemType,
    /// Item name; hashed items carry none
    pub name: Option<String>,
    pub page_base: u64,
    pub local_offset: u64,
}

impl ResourceItem {
    /// Absolute offset of the item header
    pub fn address(&self) -> u64 {
        self.page_base + self.local_offset
    }
}

/// Everything the walker found
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceIndex {
    pub items: Vec<ResourceItem>,
    pub joint: Option<ResourceItem>,
    pub geometry: Option<ResourceItem>,
    pub vrams: VramTable,
    /// Geometry has skin data; a skeleton is needed to bind it
    pub needs_base_skeleton: bool,
}

impl ResourceIndex {
    fn record(&mut self, view: &PakView<'_>, item: ResourceItem) -> ParseResult<()> {
        match item.item_type {
            ResItemType::VramDesc => {
                self.vrams.register(view, item.address())?;
            }
            ResItemType::JointHierarchy => {
                if self.joint.is_none() {
                    self.joint = Some(item.clone());
                } else {
                    tracing::warn!(offset = item.address(), "ignoring extra joint hierarchy");
                }
            }
            ResItemType::Geometry => {
                if self.geometry.is_none() {
                    self.needs_base_skeleton = geometry_has_skin(view, item.address())?;
                    self.geometry = Some(item.clone());
                } else {
                    tracing::warn!(offset = item.address(), "ignoring extra geometry");
                }
            }
            _ => {}
        }
        self.items.push(item);
        Ok(())
    }

    pub fn items_of(&self, item_type: &ResItemType) -> impl Iterator<Item = &ResourceItem> + '_ {
        let wanted = item_type.clone();
        self.items.iter().filter(move |i| i.item_type == wanted)
    }
}

/// Any submesh of the geometry at `geo` references skin data
fn geometry_has_skin(view: &PakView<'_>, geo: u64) -> ParseResult<bool> {
    let body = geo + view.item_padding();
    let submesh_count = view.u32_at(body + 8)?;
    let Some(submeshes) = view.ptr(body + 40)? else {
        return Ok(false);
    };
    let skin_field = if view.revision.is_quantized() { 88 } else { 104 };
    for i in 0..u64::from(submesh_count) {
        if view.u64_at(submeshes + 176 * i + skin_field)? != 0 {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Walk the container and index its resource items
pub fn walk(view: &PakView<'_>, login: &[LoginEntry]) -> ParseResult<ResourceIndex> {
    let mut index = ResourceIndex::default();
    match view.revision {
        Revision::Tloup1 => walk_hashed(view, login, &mut index)?,
        Revision::Legacy | Revision::Tlou2 => walk_page_headers(view, &mut index)?,
    }
    tracing::debug!(
        items = index.items.len(),
        vrams = index.vrams.len(),
        joints = index.joint.is_some(),
        geometry = index.geometry.is_some(),
        "resource walk complete"
    );
    Ok(index)
}

fn walk_page_headers(view: &PakView<'_>, index: &mut ResourceIndex) -> ParseResult<()> {
    for (p, page) in view.pages.iter().enumerate() {
        let start = u64::from(page.base);
        let header = PageHeader::read(view.data, start)?;
        for e in 0..u64::from(header.entry_count) {
            let entry = start + PAGE_HEADER_SIZE + 16 * e;
            let item_offset = u64::from(view.u32_at(entry + 8)?);
            let item = start + item_offset;
            let name = view
                .page_relative_string(item, start)
                .map_err(|err| err.with_context(format!("page {p} entry {e} name")))?;
            let type_name = view
                .page_relative_string(item + 8, start)
                .map_err(|err| err.with_context(format!("page {p} entry {e} type")))?;
            index.record(
                view,
                ResourceItem {
                    item_type: ResItemType::from_name(&type_name),
                    name: Some(name),
                    page_base: start,
                    local_offset: item_offset,
                },
            )?;
        }
    }
    Ok(())
}

fn walk_hashed(view: &PakView<'_>, login: &[LoginEntry], index: &mut ResourceIndex) -> ParseResult<()> {
    let padding = view.item_padding();
    for entry in login {
        let start = view.pages.base(entry.page as usize)?;
        let item = start + u64::from(entry.offset);
        let type_hash = view.u64_at(item + 32)?;
        let Some(item_type) = ResItemType::from_hash(type_hash) else {
            tracing::trace!(hash = %format!("{type_hash:#018X}"), "unknown item type");
            continue;
        };
        let is_texture_table = matches!(
            item_type,
            ResItemType::TextureTable | ResItemType::TextureDictionary
        );
        index.record(
            view,
            ResourceItem {
                item_type,
                name: None,
                page_base: start,
                local_offset: u64::from(entry.offset),
            },
        )?;

        if is_texture_table {
            let count = view.u32_at(item + padding)?;
            let list = view.ptr_required(item + padding + 24, "texture table list")?;
            for i in 0..u64::from(count) {
                let element = list + 8 * i;
                let page = view
                    .fixups
                    .target_page(element)
                    .ok_or(ParseError::UnfixedPointer { address: element })?;
                let value = view.u64_at(element)?;
                let local_offset = value.checked_sub(32).ok_or_else(|| {
                    ParseError::InvalidStructure(format!("texture table entry {i} points before its item"))
                })?;
                index.record(
                    view,
                    ResourceItem {
                        item_type: ResItemType::VramDesc,
                        name: None,
                        page_base: view.pages.base(page)?,
                        local_offset,
                    },
                )?;
            }
        }
    }
    Ok(())
}
