// ndpak-parsers/src/pak/vram.rs
//! VRAM descriptors: texture names, formats and pixel data lookup.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::dictionary::TextureDictionary;
use super::view::PakView;
use crate::cursor::ByteCursor;
use crate::traits::{ParseError, ParseResult};

/// Extension given to every derived texture name
pub const TEXTURE_EXTENSION: &str = ".dds";

/// Offset of the descriptor fields inside a VRAM item
pub const VRAM_FIELDS: u64 = 40;
/// Offset of the content hash inside a VRAM item
pub const VRAM_HASH: u64 = 56;
/// Offset of the inline source path inside a VRAM item
pub const VRAM_PATH: u64 = 112;

/// Field offsets relative to the VRAM item, rewritten on texture embedding
pub mod field {
    pub const DATA_OFFSET: u64 = 40;
    pub const SIZE: u64 = 48;
    pub const FORMAT: u64 = 72;
    pub const MIP_COUNT: u64 = 80;
    pub const WIDTH: u64 = 84;
    pub const HEIGHT: u64 = 88;
}

/// One registered texture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VramEntry {
    pub hash: u64,
    /// Absolute offset of the VRAM item
    pub item_offset: u64,
    /// Derived `.dds` file name, unique within the container
    pub file_name: String,
    /// Source path stored in the item
    pub source_path: String,
}

/// Hash-keyed VRAM entries in discovery order of hashes
#[derive(Debug, Clone, Default, Serialize)]
pub struct VramTable {
    entries: BTreeMap<u64, VramEntry>,
    #[serde(skip)]
    names: HashSet<String>,
}

impl VramTable {
    /// Register the VRAM item at `item`
    pub fn register(&mut self, view: &PakView<'_>, item: u64) -> ParseResult<()> {
        let hash = view.u64_at(item + VRAM_HASH)?;
        let source_path = view.string_at(item + VRAM_PATH)?;
        let file_name = derive_file_name(&source_path, &self.names);
        self.names.insert(file_name.clone());
        self.entries.insert(
            hash,
            VramEntry {
                hash,
                item_offset: item,
                file_name,
                source_path,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, hash: u64) -> Option<&VramEntry> {
        self.entries.get(&hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VramEntry> {
        self.entries.values()
    }

    pub fn find_by_name(&self, file_name: &str) -> Option<&VramEntry> {
        self.entries.values().find(|e| e.file_name == file_name)
    }
}

/// Last path component, accepting either separator
pub fn local_file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// File name for a VRAM source path.
///
/// `foo.tga/foo-hash.ndb` becomes `foo.dds`; a second texture with the same
/// stem becomes `foo_foo-hash.dds`.
pub fn derive_file_name(source_path: &str, taken: &HashSet<String>) -> String {
    let replaced = source_path.replace(".tga/", "+");
    let local = local_file_name(&replaced);
    match local.split_once('+') {
        Some((first, second)) => {
            let name = format!("{first}{TEXTURE_EXTENSION}");
            if taken.contains(&name) {
                format!("{first}_{second}").replace(".ndb", TEXTURE_EXTENSION)
            } else {
                name
            }
        }
        None => format!("{local}{TEXTURE_EXTENSION}"),
    }
}

/// DXGI format code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DxgiFormat(pub u32);

const DXGI_NAMES: &[(u32, &str)] = &[
    (0x00, "Invalid"),
    (0x02, "R32G32B32A32_Float"),
    (0x03, "R32G32B32A32_Uint"),
    (0x04, "R32G32B32A32_Sint"),
    (0x06, "R32G32B32_Float"),
    (0x07, "R32G32B32_Uint"),
    (0x08, "R32G32B32_Sint"),
    (0x0A, "R16G16B16A16_Float"),
    (0x0B, "R16G16B16A16_Unorm"),
    (0x0C, "R16G16B16A16_Uint"),
    (0x0D, "R16G16B16A16_Snorm"),
    (0x0E, "R16G16B16A16_Sint"),
    (0x10, "R32G32_Float"),
    (0x11, "R32G32_Uint"),
    (0x12, "R32G32_Sint"),
    (0x18, "R10G10B10A2_Unorm"),
    (0x19, "R10G10B10A2_Uint"),
    (0x1A, "R11G11B10_Float"),
    (0x1C, "R8G8B8A8_Unorm"),
    (0x1D, "R8G8B8A8_UnormSrgb"),
    (0x1E, "R8G8B8A8_Uint"),
    (0x1F, "R8G8B8A8_Snorm"),
    (0x20, "R8G8B8A8_Sint"),
    (0x22, "R16G16_Float"),
    (0x23, "R16G16_Unorm"),
    (0x24, "R16G16_Uint"),
    (0x25, "R16G16_Snorm"),
    (0x26, "R16G16_Sint"),
    (0x29, "R32_Float"),
    (0x2A, "R32_Uint"),
    (0x2B, "R32_Sint"),
    (0x31, "R8G8_Unorm"),
    (0x32, "R8G8_Uint"),
    (0x33, "R8G8_Snorm"),
    (0x34, "R8G8_Sint"),
    (0x36, "R16_Float"),
    (0x38, "R16_Unorm"),
    (0x39, "R16_Uint"),
    (0x3A, "R16_Snorm"),
    (0x3B, "R16_Sint"),
    (0x3D, "R8_Unorm"),
    (0x3E, "R8_Uint"),
    (0x3F, "R8_Snorm"),
    (0x40, "R8_Sint"),
    (0x41, "A8_Unorm"),
    (0x46, "Bc1_Typeless"),
    (0x47, "Bc1_Unorm"),
    (0x48, "Bc1_UnormSrgb"),
    (0x49, "Bc2_Typeless"),
    (0x4A, "Bc2_Unorm"),
    (0x4B, "Bc2_UnormSrgb"),
    (0x4C, "Bc3_Typeless"),
    (0x4D, "Bc3_Unorm"),
    (0x4E, "Bc3_UnormSrgb"),
    (0x4F, "Bc4_Typeless"),
    (0x50, "Bc4_Unorm"),
    (0x51, "Bc4_Snorm"),
    (0x52, "Bc5_Typeless"),
    (0x53, "Bc5_Unorm"),
    (0x54, "Bc5_Snorm"),
    (0x55, "B5G6R5_Unorm"),
    (0x56, "B5G5R5A1_Unorm"),
    (0x57, "B8G8R8A8_Unorm"),
    (0x58, "B8G8R8X8_Unorm"),
    (0x5A, "B8G8R8A8_Unorm"),
    (0x5B, "B8G8R8A8_UnormSrgb"),
    (0x5D, "B8G8R8X8_UnormSrgb"),
    (0x5E, "Bc6_Typeless"),
    (0x5F, "Bc6_Uf16"),
    (0x60, "Bc6_Sf16"),
    (0x61, "Bc7_Typeless"),
    (0x62, "Bc7_Unorm"),
    (0x63, "Bc7_UnormSrgb"),
    (0x64, "B16G16R16A16_Float"),
];

/// How a texture's bytes are laid out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PixelEncoding {
    Bc1,
    Bc3,
    Bc4,
    Bc5,
    Bc6,
    Bc7,
    /// Uncompressed, named by its channel layout such as `r8g8b8a8`
    Raw(String),
    Unknown,
}

impl DxgiFormat {
    pub fn name(&self) -> &'static str {
        DXGI_NAMES
            .iter()
            .find(|(code, _)| *code == self.0)
            .map_or("", |(_, name)| name)
    }

    pub fn encoding(&self) -> PixelEncoding {
        let name = self.name();
        if name.contains("Bc1") {
            PixelEncoding::Bc1
        } else if name.contains("Bc3") {
            PixelEncoding::Bc3
        } else if name.contains("Bc4") {
            PixelEncoding::Bc4
        } else if name.contains("Bc5") {
            PixelEncoding::Bc5
        } else if name.contains("Bc6") {
            PixelEncoding::Bc6
        } else if name.contains("Bc7") {
            PixelEncoding::Bc7
        } else if is_channel_layout(name) {
            let layout = name.split('_').next().unwrap_or(name);
            PixelEncoding::Raw(layout.to_lowercase())
        } else {
            PixelEncoding::Unknown
        }
    }

    /// 4 for the half-byte-per-pixel block formats, otherwise 8
    pub fn tile_bits_per_pixel(&self) -> u32 {
        match self.encoding() {
            PixelEncoding::Bc1 | PixelEncoding::Bc4 => 4,
            _ => 8,
        }
    }
}

/// A channel letter followed by a digit, as in `R8G8`
fn is_channel_layout(name: &str) -> bool {
    name.as_bytes()
        .windows(2)
        .any(|w| b"RGBA".contains(&w[0]) && w[1].is_ascii_digit())
}

/// Fields of a VRAM descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VramInfo {
    /// Pixel data offset relative to the raw-data start
    pub data_offset: u32,
    pub size: u32,
    pub dictionary_id: u32,
    pub hash: u64,
    pub kind: u32,
    pub format: DxgiFormat,
    pub mip_count: u32,
    pub width: u32,
    pub height: u32,
}

impl VramInfo {
    /// Read the descriptor of the VRAM item at `item`
    pub fn read(data: &[u8], item: u64) -> ParseResult<Self> {
        let mut cursor = ByteCursor::at(data, item + VRAM_FIELDS);
        let data_offset = cursor.read_u32()?;
        cursor.skip(4)?;
        let size = cursor.read_u32()?;
        let dictionary_id = cursor.read_u32()?;
        let hash = cursor.read_u64()?;
        cursor.skip(4)?;
        let kind = cursor.read_u32()?;
        let format = DxgiFormat(cursor.read_u32()?);
        cursor.skip(4)?;
        let mip_count = cursor.read_u32()?;
        let width = cursor.read_u32()?;
        let height = cursor.read_u32()?;
        Ok(Self {
            data_offset,
            size,
            dictionary_id,
            hash,
            kind,
            format,
            mip_count,
            width,
            height,
        })
    }
}

/// Texture bytes as stored, before decoding
#[derive(Debug, Clone)]
pub struct RawTexture {
    pub name: String,
    pub info: VramInfo,
    pub data: Vec<u8>,
    /// Dictionary file the data came from, if not local
    pub dictionary: Option<String>,
}

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub rgba: Vec<u8>,
}

/// Something a material asked to be loaded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureRequest {
    /// A texture stored under this hash
    Vram { hash: u64 },
    /// A texture computed from another one (ambient occlusion from a normal map)
    Derived { source: u64, name: String },
    /// A solid-color stand-in
    Placeholder { name: String },
}

impl TextureRequest {
    pub fn file_name<'t>(&'t self, vrams: &'t VramTable) -> Option<&'t str> {
        match self {
            TextureRequest::Vram { hash } => vrams.get(*hash).map(|e| e.file_name.as_str()),
            TextureRequest::Derived { name, .. } | TextureRequest::Placeholder { name } => Some(name),
        }
    }
}

/// Color of a named placeholder texture
pub fn placeholder_color(name: &str) -> Option<[u8; 4]> {
    if name.contains("NoesisBrown") {
        Some([32, 26, 18, 255])
    } else if name.contains("NoesisGray") {
        Some([127, 127, 127, 255])
    } else if name.contains("NoesisWhite") {
        Some([255, 255, 255, 255])
    } else if name.contains("NoesisNRM") {
        Some([127, 127, 254, 255])
    } else {
        None
    }
}

/// 4x4 solid texture for a placeholder name
pub fn placeholder_texture(name: &str) -> Option<DecodedTexture> {
    placeholder_color(name).map(|color| DecodedTexture {
        name: name.to_string(),
        width: 4,
        height: 4,
        rgba: color.repeat(16),
    })
}

/// Image codec supplied by the host
pub trait TextureCodec {
    /// Decode stored bytes to RGBA8
    fn decode(&self, data: &[u8], encoding: &PixelEncoding, width: u32, height: u32) -> ParseResult<Vec<u8>>;

    /// Encode RGBA8 to `encoding`, halving each dimension above 2 per level
    /// until both are 2 or less. Returns the bytes and level count.
    fn encode_mip_chain(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
        encoding: &PixelEncoding,
    ) -> ParseResult<(Vec<u8>, u32)>;

    /// Decode an image file (TGA and friends) to RGBA8
    fn decode_image_file(&self, bytes: &[u8]) -> ParseResult<(Vec<u8>, u32, u32)>;
}

/// Dimensions of every level [`TextureCodec::encode_mip_chain`] produces
pub fn mip_dimensions(width: u32, height: u32) -> Vec<(u32, u32)> {
    let mut levels = Vec::new();
    let (mut w, mut h) = (width, height);
    while w > 2 || h > 2 {
        levels.push((w, h));
        if w > 2 {
            w /= 2;
        }
        if h > 2 {
            h /= 2;
        }
    }
    levels
}

/// Replicate the red channel into RGB
pub fn red_to_gray(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        px[1] = px[0];
        px[2] = px[0];
        px[3] = 255;
    }
}

/// Move green and blue into red and green
pub fn shift_occlusion_channels(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        px[0] = px[1];
        px[1] = px[2];
        px[2] = 0;
        px[3] = 255;
    }
}

/// Resolves texture requests against one container
pub struct TextureLoader<'a> {
    view: PakView<'a>,
    vrams: &'a VramTable,
    dictionary: Option<&'a TextureDictionary>,
    codec: &'a dyn TextureCodec,
}

impl<'a> TextureLoader<'a> {
    pub fn new(
        view: PakView<'a>,
        vrams: &'a VramTable,
        dictionary: Option<&'a TextureDictionary>,
        codec: &'a dyn TextureCodec,
    ) -> Self {
        Self {
            view,
            vrams,
            dictionary,
            codec,
        }
    }

    /// Stored bytes for `hash`, from a dictionary if indexed there, else local
    pub fn load_raw(&self, hash: u64) -> ParseResult<RawTexture> {
        let entry = self.vrams.get(hash).ok_or_else(|| ParseError::TextureNotFound {
            name: format!("{hash:#018X}"),
        })?;

        if let Some(dictionary) = self.dictionary {
            if let Some(hit) = dictionary.find(hash) {
                match dictionary.read_texture(&hit) {
                    Ok((info, data)) => {
                        tracing::info!(file = %hit.file, texture = %entry.file_name, "texture found in dictionary");
                        return Ok(RawTexture {
                            name: entry.file_name.clone(),
                            info,
                            data,
                            dictionary: Some(hit.file),
                        });
                    }
                    Err(err) => {
                        tracing::warn!(file = %hit.file, error = %err, "dictionary read failed; trying local data");
                    }
                }
            }
        }

        let info = VramInfo::read(self.view.data, entry.item_offset)?;
        let start = u64::from(info.data_offset) + self.view.raw_data_start();
        tracing::debug!(texture = %entry.file_name, start, size = info.size, "loading local texture");
        let data = self
            .view
            .bytes_at(start, info.size as usize)
            .map_err(|_| ParseError::TextureNotFound {
                name: entry.file_name.clone(),
            })?
            .to_vec();
        Ok(RawTexture {
            name: entry.file_name.clone(),
            info,
            data,
            dictionary: None,
        })
    }

    /// Decode a request to RGBA8
    pub fn load(&self, request: &TextureRequest) -> ParseResult<DecodedTexture> {
        match request {
            TextureRequest::Placeholder { name } => {
                placeholder_texture(name).ok_or_else(|| ParseError::TextureNotFound { name: name.clone() })
            }
            TextureRequest::Vram { hash } => self.decode_hash(*hash, None),
            TextureRequest::Derived { source, name } => self.decode_hash(*source, Some(name)),
        }
    }

    fn decode_hash(&self, hash: u64, derived_name: Option<&str>) -> ParseResult<DecodedTexture> {
        let raw = self.load_raw(hash)?;
        if self.view.revision == super::header::Revision::Tlou2 {
            return Err(ParseError::Unsupported(format!(
                "{} uses tiled texture storage",
                raw.name
            )));
        }

        let encoding = raw.info.format.encoding();
        if encoding == PixelEncoding::Unknown {
            return Err(ParseError::Unsupported(format!(
                "texture {} has format {} ({})",
                raw.name,
                raw.info.format.0,
                raw.info.format.name()
            )));
        }
        let mut rgba = self
            .codec
            .decode(&raw.data, &encoding, raw.info.width, raw.info.height)
            .map_err(|e| e.with_context(raw.name.clone()))?;

        let convert = self.view.options.convert_textures;
        let name = match derived_name {
            Some(derived) => {
                red_to_gray(&mut rgba);
                derived.to_string()
            }
            None => {
                if convert
                    && encoding == PixelEncoding::Bc7
                    && (raw.name.contains("-ao") || raw.name.contains("-occlusion"))
                {
                    shift_occlusion_channels(&mut rgba);
                }
                raw.name
            }
        };

        Ok(DecodedTexture {
            name,
            width: raw.info.width,
            height: raw.info.height,
            rgba,
        })
    }
}
