// ndpak-parsers/src/pak/dds.rs
//! DDS container headers for exported and embedded textures.

use super::vram::DxgiFormat;
use crate::cursor::{ByteCursor, ByteWriter};
use crate::traits::{ParseError, ParseResult};

/// "DDS "
pub const DDS_MAGIC: u32 = 0x2053_4444;
/// Size of the DDS header after the magic
pub const DDS_HEADER_SIZE: u32 = 124;
/// Size of the DX10 extension
pub const DX10_HEADER_SIZE: u32 = 20;

/// Header flags
pub mod flags {
    pub const CAPS: u32 = 0x1;
    pub const HEIGHT: u32 = 0x2;
    pub const WIDTH: u32 = 0x4;
    pub const PIXEL_FORMAT: u32 = 0x1000;
    pub const MIPMAP_COUNT: u32 = 0x20000;
    pub const LINEAR_SIZE: u32 = 0x80000;
}

/// Caps flags
pub mod caps {
    pub const COMPLEX: u32 = 0x8;
    pub const TEXTURE: u32 = 0x1000;
    pub const MIPMAP: u32 = 0x40_0000;
}

const PF_FOURCC: u32 = 0x4;
const DIMENSION_TEXTURE2D: u32 = 3;

/// DDS pixel format block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    pub flags: u32,
    pub fourcc: [u8; 4],
    pub rgb_bit_count: u32,
    pub masks: [u32; 4],
}

/// DX10 extension header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dx10Header {
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
    pub misc_flags2: u32,
}

/// Parsed DDS file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsHeader {
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mipmap_count: u32,
    pub pixel_format: PixelFormat,
    pub caps: u32,
    pub caps2: u32,
    pub dx10: Option<Dx10Header>,
}

impl DdsHeader {
    /// Parse the header of a complete DDS file
    pub fn parse(bytes: &[u8]) -> ParseResult<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let magic = cursor.read_u32()?;
        if magic != DDS_MAGIC {
            return Err(ParseError::InvalidStructure(format!("not a DDS file (magic 0x{magic:08X})")));
        }
        let size = cursor.read_u32()?;
        if size != DDS_HEADER_SIZE {
            return Err(ParseError::InvalidStructure(format!(
                "invalid DDS header size: expected {DDS_HEADER_SIZE}, got {size}"
            )));
        }
        let flags = cursor.read_u32()?;
        let height = cursor.read_u32()?;
        let width = cursor.read_u32()?;
        let pitch_or_linear_size = cursor.read_u32()?;
        let depth = cursor.read_u32()?;
        let mipmap_count = cursor.read_u32()?;
        cursor.skip(44)?;

        let _pf_size = cursor.read_u32()?;
        let pf_flags = cursor.read_u32()?;
        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(cursor.read_bytes(4)?);
        let rgb_bit_count = cursor.read_u32()?;
        let masks = [cursor.read_u32()?, cursor.read_u32()?, cursor.read_u32()?, cursor.read_u32()?];

        let caps = cursor.read_u32()?;
        let caps2 = cursor.read_u32()?;
        cursor.skip(12)?;

        let dx10 = if &fourcc == b"DX10" {
            Some(Dx10Header {
                dxgi_format: cursor.read_u32()?,
                resource_dimension: cursor.read_u32()?,
                misc_flag: cursor.read_u32()?,
                array_size: cursor.read_u32()?,
                misc_flags2: cursor.read_u32()?,
            })
        } else {
            None
        };

        Ok(Self {
            flags,
            height,
            width,
            pitch_or_linear_size,
            depth,
            mipmap_count,
            pixel_format: PixelFormat {
                flags: pf_flags,
                fourcc,
                rgb_bit_count,
                masks,
            },
            caps,
            caps2,
            dx10,
        })
    }

    /// Header for a 2D texture with a DX10 extension
    pub fn for_texture(width: u32, height: u32, mipmap_count: u32, format: DxgiFormat, data_len: usize) -> Self {
        let mut flags = flags::CAPS | flags::HEIGHT | flags::WIDTH | flags::PIXEL_FORMAT | flags::LINEAR_SIZE;
        let mut caps = caps::TEXTURE;
        if mipmap_count > 1 {
            flags |= flags::MIPMAP_COUNT;
            caps |= caps::COMPLEX | caps::MIPMAP;
        }
        Self {
            flags,
            height,
            width,
            pitch_or_linear_size: u32::try_from(data_len).unwrap_or(u32::MAX),
            depth: 0,
            mipmap_count: mipmap_count.max(1),
            pixel_format: PixelFormat {
                flags: PF_FOURCC,
                fourcc: *b"DX10",
                rgb_bit_count: 0,
                masks: [0; 4],
            },
            caps,
            caps2: 0,
            dx10: Some(Dx10Header {
                dxgi_format: format.0,
                resource_dimension: DIMENSION_TEXTURE2D,
                misc_flag: 0,
                array_size: 1,
                misc_flags2: 0,
            }),
        }
    }

    /// Offset of the pixel data from the start of the file
    pub fn data_offset(&self) -> usize {
        4 + DDS_HEADER_SIZE as usize + if self.dx10.is_some() { DX10_HEADER_SIZE as usize } else { 0 }
    }

    pub fn has_dx10_header(&self) -> bool {
        self.dx10.is_some()
    }

    /// Serialize magic, header and optional extension
    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_u32(DDS_MAGIC);
        writer.write_u32(DDS_HEADER_SIZE);
        writer.write_u32(self.flags);
        writer.write_u32(self.height);
        writer.write_u32(self.width);
        writer.write_u32(self.pitch_or_linear_size);
        writer.write_u32(self.depth);
        writer.write_u32(self.mipmap_count);
        writer.write_zeros(44);
        writer.write_u32(32);
        writer.write_u32(self.pixel_format.flags);
        writer.write_bytes(&self.pixel_format.fourcc);
        writer.write_u32(self.pixel_format.rgb_bit_count);
        for mask in self.pixel_format.masks {
            writer.write_u32(mask);
        }
        writer.write_u32(self.caps);
        writer.write_u32(self.caps2);
        writer.write_zeros(12);
        if let Some(dx10) = &self.dx10 {
            writer.write_u32(dx10.dxgi_format);
            writer.write_u32(dx10.resource_dimension);
            writer.write_u32(dx10.misc_flag);
            writer.write_u32(dx10.array_size);
            writer.write_u32(dx10.misc_flags2);
        }
    }
}

/// Pixel payload of a DDS file
pub fn dds_payload(bytes: &[u8]) -> ParseResult<(DdsHeader, &[u8])> {
    let header = DdsHeader::parse(bytes)?;
    let offset = header.data_offset();
    let data = bytes.get(offset..).ok_or(ParseError::TruncatedData {
        offset: offset as u64,
        wanted: 0,
        len: bytes.len() as u64,
    })?;
    Ok((header, data))
}

/// Complete DDS file for stored texture bytes
pub fn build_dds(width: u32, height: u32, mipmap_count: u32, format: DxgiFormat, data: &[u8]) -> Vec<u8> {
    let header = DdsHeader::for_texture(width, height, mipmap_count, format, data.len());
    let mut writer = ByteWriter::new();
    header.write(&mut writer);
    writer.write_bytes(data);
    writer.into_inner()
}
