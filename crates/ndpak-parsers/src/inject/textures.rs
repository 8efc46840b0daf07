// ndpak-parsers/src/inject/textures.rs
//! Appends replacement texture data and re-points VRAM descriptors at it.

use std::path::{Path, PathBuf};

use crate::cursor::{ByteCursor, ByteWriter};
use crate::pak::dds::dds_payload;
use crate::pak::header::{field, Revision};
use crate::pak::vram::{field as vram_field, TextureCodec, VramInfo, VramTable, TEXTURE_EXTENSION, VRAM_HASH};
use crate::traits::{ParseError, ParseResult};

/// Folder searched for replacement textures.
///
/// An existing explicit folder wins, then `<out dir>/<out stem>`, then
/// `<source dir>/<source stem>`; stems end at the first dot.
pub fn texture_folder(explicit: Option<&Path>, output: &Path, source: &Path) -> Option<PathBuf> {
    if let Some(dir) = explicit.filter(|d| d.is_dir()) {
        return Some(dir.to_path_buf());
    }
    [output, source]
        .into_iter()
        .map(stem_folder)
        .find(|dir| dir.is_dir())
}

fn stem_folder(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    path.with_file_name(stem)
}

/// Pixel data and header fields for one replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
}

/// Load a `.dds` as stored, or encode a `.tga` to the VRAM entry's format
pub fn load_image(path: &Path, info: &VramInfo, codec: Option<&dyn TextureCodec>) -> ParseResult<TextureImage> {
    let bytes = std::fs::read(path)?;
    let is_tga = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("tga"));
    if !is_tga {
        let (header, payload) = dds_payload(&bytes)?;
        return Ok(TextureImage {
            data: payload.to_vec(),
            width: header.width,
            height: header.height,
            mip_count: header.mipmap_count.max(1),
        });
    }
    let codec = codec.ok_or_else(|| ParseError::Unsupported("no texture codec available to encode TGA files".into()))?;
    let (rgba, width, height) = codec.decode_image_file(&bytes)?;
    let (data, mip_count) = codec.encode_mip_chain(&rgba, width, height, &info.format.encoding())?;
    Ok(TextureImage {
        data,
        width,
        height,
        mip_count,
    })
}

/// Append `image` and rewrite the descriptor of the VRAM item at `item`.
///
/// The item's hash is bumped by one and every copy of the old hash before
/// the raw data is replaced, so the engine does not reuse a cached copy.
pub fn embed_image(out: &mut ByteWriter, item: u64, raw_data_start: u64, image: &TextureImage) -> ParseResult<()> {
    let len = u32::try_from(image.data.len())
        .map_err(|_| ParseError::InvalidStructure("texture larger than 4 GiB".into()))?;
    let new_offset = out.len() as u64;
    let relative = u32::try_from(new_offset - raw_data_start)
        .map_err(|_| ParseError::InvalidStructure(format!("texture offset {new_offset:#X} exceeds 32 bits")))?;

    let (raw_size, old_hash) = {
        let cursor = ByteCursor::new(out.as_slice());
        (cursor.read_u32_at(field::RAW_DATA_SIZE)?, cursor.read_u64_at(item + VRAM_HASH)?)
    };
    out.seek(field::RAW_DATA_SIZE);
    out.write_u32(raw_size.wrapping_add(len));
    out.seek(item + vram_field::DATA_OFFSET);
    out.write_u32(relative);
    out.seek(item + vram_field::SIZE);
    out.write_u32(len);
    out.seek(item + vram_field::WIDTH);
    out.write_u32(image.width);
    out.seek(item + vram_field::HEIGHT);
    out.write_u32(image.height);
    out.seek(item + vram_field::MIP_COUNT);
    out.write_u32(image.mip_count);

    let replaced = replace_hash(out, raw_data_start, old_hash, old_hash.wrapping_add(1));
    tracing::debug!(item = %format!("{item:#X}"), replaced, bytes = len, "re-pointed VRAM descriptor");

    out.seek_end();
    out.write_bytes(&image.data);
    Ok(())
}

/// Replace non-overlapping occurrences of `old` before `end`
fn replace_hash(out: &mut ByteWriter, end: u64, old: u64, new: u64) -> usize {
    let needle = old.to_le_bytes();
    let end = (end as usize).min(out.len());
    let mut hits = Vec::new();
    let haystack = &out.as_slice()[..end];
    let mut i = 0;
    while i + 8 <= haystack.len() {
        if haystack[i..i + 8] == needle {
            hits.push(i);
            i += 8;
        } else {
            i += 1;
        }
    }
    for &at in &hits {
        out.seek(at as u64);
        out.write_u64(new);
    }
    hits.len()
}

/// Embed every file in `folder` that names a VRAM entry of the container.
///
/// Files that fail to load are logged and skipped. Returns the number of
/// textures embedded.
pub fn embed_folder(
    out: &mut ByteWriter,
    vrams: &VramTable,
    revision: Revision,
    raw_data_start: u64,
    folder: &Path,
    codec: Option<&dyn TextureCodec>,
) -> ParseResult<usize> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let mut done = std::collections::HashSet::new();
    let mut embedded = 0;
    for path in files {
        let ext = path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase());
        if !matches!(ext.as_deref(), Some("dds" | "tga")) {
            continue;
        }
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let name = format!("{stem}{TEXTURE_EXTENSION}");
        let Some(entry) = vrams.find_by_name(&name) else {
            tracing::info!(file = %path.display(), "texture is not in the container");
            continue;
        };
        if !done.insert(entry.hash) {
            continue;
        }
        if revision == Revision::Tlou2 {
            tracing::warn!(file = %path.display(), "tiled textures cannot be embedded");
            continue;
        }
        let result = VramInfo::read(out.as_slice(), entry.item_offset)
            .and_then(|info| load_image(&path, &info, codec))
            .and_then(|image| embed_image(out, entry.item_offset, raw_data_start, &image));
        match result {
            Ok(()) => {
                tracing::info!(texture = %name, "embedded texture");
                embedded += 1;
            }
            Err(e) => tracing::warn!(file = %path.display(), error = %e, "failed to embed texture"),
        }
    }
    Ok(embedded)
}
