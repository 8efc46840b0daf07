// ndpak-export/src/textures/codec.rs
//! Block-compressed and raw pixel codec
//!
//! BC1 to BC5 go through texpresso. BC6H and BC7 are recognised but not
//! decodable here; callers get `UnsupportedFormat` and skip the texture.

use half::f16;
use image::imageops::FilterType;
use image::RgbaImage;
use ndpak_parsers::pak::vram::{mip_dimensions, PixelEncoding};
use ndpak_parsers::{ParseResult, TextureCodec};

use crate::textures::{TextureError, TextureResult};

fn block_format(encoding: &PixelEncoding) -> Option<texpresso::Format> {
    match encoding {
        PixelEncoding::Bc1 => Some(texpresso::Format::Bc1),
        PixelEncoding::Bc3 => Some(texpresso::Format::Bc3),
        PixelEncoding::Bc4 => Some(texpresso::Format::Bc4),
        PixelEncoding::Bc5 => Some(texpresso::Format::Bc5),
        _ => None,
    }
}

fn check_len(data: &[u8], wanted: usize) -> TextureResult<()> {
    if data.len() < wanted {
        return Err(TextureError::ShortBuffer { wanted, len: data.len() });
    }
    Ok(())
}

/// Decode one image level to RGBA8
pub fn decode_rgba(data: &[u8], encoding: &PixelEncoding, width: u32, height: u32) -> TextureResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(TextureError::InvalidDimensions { width, height });
    }
    let (w, h) = (width as usize, height as usize);
    let pixels = w * h;
    let mut output = vec![0u8; pixels * 4];

    if let Some(format) = block_format(encoding) {
        check_len(data, format.compressed_size(w, h))?;
        format.decompress(data, w, h, &mut output);
        return Ok(output);
    }

    let PixelEncoding::Raw(layout) = encoding else {
        return Err(TextureError::UnsupportedFormat(format!("{encoding:?}")));
    };
    match layout.as_str() {
        "r8g8b8a8" => {
            check_len(data, pixels * 4)?;
            output.copy_from_slice(&data[..pixels * 4]);
        }
        "b8g8r8a8" | "b8g8r8x8" => {
            check_len(data, pixels * 4)?;
            let opaque = layout.ends_with("x8");
            for (src, dst) in data.chunks_exact(4).zip(output.chunks_exact_mut(4)) {
                dst.copy_from_slice(&[src[2], src[1], src[0], if opaque { 255 } else { src[3] }]);
            }
        }
        "r8g8" => {
            check_len(data, pixels * 2)?;
            for (src, dst) in data.chunks_exact(2).zip(output.chunks_exact_mut(4)) {
                dst.copy_from_slice(&[src[0], src[1], 0, 255]);
            }
        }
        "r8" => {
            check_len(data, pixels)?;
            for (&v, dst) in data.iter().zip(output.chunks_exact_mut(4)) {
                dst.copy_from_slice(&[v, v, v, 255]);
            }
        }
        "a8" => {
            check_len(data, pixels)?;
            for (&a, dst) in data.iter().zip(output.chunks_exact_mut(4)) {
                dst.copy_from_slice(&[255, 255, 255, a]);
            }
        }
        "r16g16b16a16" => {
            check_len(data, pixels * 8)?;
            for (src, dst) in data.chunks_exact(8).zip(output.chunks_exact_mut(4)) {
                for c in 0..4 {
                    let v = f16::from_le_bytes([src[2 * c], src[2 * c + 1]]).to_f32();
                    dst[c] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
        }
        other => return Err(TextureError::UnsupportedFormat(format!("raw layout {other}"))),
    }
    Ok(output)
}

/// Encode one RGBA8 image level
pub fn encode_rgba(rgba: &[u8], encoding: &PixelEncoding, width: u32, height: u32) -> TextureResult<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    check_len(rgba, w * h * 4)?;
    let rgba = &rgba[..w * h * 4];

    if let Some(format) = block_format(encoding) {
        let mut output = vec![0u8; format.compressed_size(w, h)];
        format.compress(rgba, w, h, texpresso::Params::default(), &mut output);
        return Ok(output);
    }
    match encoding {
        PixelEncoding::Raw(layout) if layout == "r8g8b8a8" => Ok(rgba.to_vec()),
        PixelEncoding::Raw(layout) if layout == "b8g8r8a8" => Ok(rgba
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0], px[3]])
            .collect()),
        PixelEncoding::Raw(layout) if layout == "r16g16b16a16" => {
            let halves: Vec<u16> = rgba
                .iter()
                .map(|&v| f16::from_f32(f32::from(v) / 255.0).to_bits())
                .collect();
            Ok(bytemuck::cast_slice::<u16, u8>(&halves).to_vec())
        }
        other => Err(TextureError::UnsupportedFormat(format!("cannot encode {other:?}"))),
    }
}

/// Default codec handed to the engine
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockCodec;

impl BlockCodec {
    pub fn new() -> Self {
        Self
    }
}

impl TextureCodec for BlockCodec {
    fn decode(&self, data: &[u8], encoding: &PixelEncoding, width: u32, height: u32) -> ParseResult<Vec<u8>> {
        Ok(decode_rgba(data, encoding, width, height)?)
    }

    fn encode_mip_chain(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
        encoding: &PixelEncoding,
    ) -> ParseResult<(Vec<u8>, u32)> {
        let source = RgbaImage::from_raw(width, height, rgba.to_vec()).ok_or(TextureError::ShortBuffer {
            wanted: width as usize * height as usize * 4,
            len: rgba.len(),
        })?;
        let mut levels = mip_dimensions(width, height);
        if levels.is_empty() {
            levels.push((width, height));
        }

        let mut out = Vec::new();
        for &(w, h) in &levels {
            let bytes = if (w, h) == (width, height) {
                encode_rgba(rgba, encoding, w, h)?
            } else {
                let scaled = image::imageops::resize(&source, w, h, FilterType::Triangle);
                encode_rgba(scaled.as_raw(), encoding, w, h)?
            };
            out.extend_from_slice(&bytes);
        }
        tracing::debug!(width, height, levels = levels.len(), bytes = out.len(), "encoded mip chain");
        Ok((out, levels.len() as u32))
    }

    fn decode_image_file(&self, bytes: &[u8]) -> ParseResult<(Vec<u8>, u32, u32)> {
        let image = image::load_from_memory(bytes).map_err(TextureError::from)?.to_rgba8();
        let (width, height) = image.dimensions();
        Ok((image.into_raw(), width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| if i % 2 == 0 { [255, 0, 0, 255] } else { [0, 0, 255, 255] })
            .collect()
    }

    #[test]
    fn test_raw_rgba_passthrough() {
        let rgba = checker(2, 2);
        let encoding = PixelEncoding::Raw("r8g8b8a8".into());
        assert_eq!(decode_rgba(&rgba, &encoding, 2, 2).unwrap(), rgba);
    }

    #[test]
    fn test_bgra_swaps_channels() {
        let encoding = PixelEncoding::Raw("b8g8r8x8".into());
        let rgba = decode_rgba(&[1, 2, 3, 0], &encoding, 1, 1).unwrap();
        assert_eq!(rgba, vec![3, 2, 1, 255]);
    }

    #[test]
    fn test_bc1_solid_round_trip() {
        let rgba: Vec<u8> = [0u8, 255, 0, 255].repeat(16);
        let encoded = encode_rgba(&rgba, &PixelEncoding::Bc1, 4, 4).unwrap();
        assert_eq!(encoded.len(), 8);
        let decoded = decode_rgba(&encoded, &PixelEncoding::Bc1, 4, 4).unwrap();
        for px in decoded.chunks_exact(4) {
            assert!(px[1] > 250 && px[0] < 5 && px[2] < 5, "{px:?}");
        }
    }

    #[test]
    fn test_short_buffer_rejected() {
        let err = decode_rgba(&[0u8; 4], &PixelEncoding::Bc3, 4, 4).unwrap_err();
        assert!(matches!(err, TextureError::ShortBuffer { wanted: 16, len: 4 }));
    }

    #[test]
    fn test_bc7_unsupported() {
        let err = decode_rgba(&[0u8; 16], &PixelEncoding::Bc7, 4, 4).unwrap_err();
        assert!(matches!(err, TextureError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_mip_chain_levels() {
        let codec = BlockCodec::new();
        let (data, levels) = codec
            .encode_mip_chain(&checker(8, 8), 8, 8, &PixelEncoding::Raw("r8g8b8a8".into()))
            .unwrap();
        // 8x8 and 4x4; 2x2 ends the chain
        assert_eq!(levels, 2);
        assert_eq!(data.len(), (64 + 16) * 4);
    }

    #[test]
    fn test_half_float_layout() {
        let encoding = PixelEncoding::Raw("r16g16b16a16".into());
        let encoded = encode_rgba(&[255, 0, 255, 255], &encoding, 1, 1).unwrap();
        assert_eq!(encoded.len(), 8);
        assert_eq!(decode_rgba(&encoded, &encoding, 1, 1).unwrap(), vec![255, 0, 255, 255]);
    }
}
