// ndpak-export/src/textures/writer.rs
//! Writes loaded textures to disk

use std::path::{Path, PathBuf};

use image::RgbaImage;
use ndpak_parsers::pak::dds::build_dds;
use ndpak_parsers::pak::vram::{DecodedTexture, DxgiFormat, RawTexture};

use crate::textures::{TextureError, TextureResult};

/// Uncompressed RGBA8 DXGI code
const R8G8B8A8_UNORM: DxgiFormat = DxgiFormat(0x1C);

/// Output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// DDS, stored bytes kept as they are
    #[default]
    Dds,
    /// PNG, decoded to RGBA8
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Dds => "dds",
            ImageFormat::Png => "png",
        }
    }
}

/// Writes textures into one output folder
#[derive(Debug, Clone)]
pub struct TextureWriter {
    dir: PathBuf,
    format: ImageFormat,
}

impl TextureWriter {
    pub fn new(dir: impl Into<PathBuf>, format: ImageFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Target path for a texture name such as `hero-bc.dds`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(Path::new(name).with_extension(self.format.extension()))
    }

    /// Write stored bytes as a DDS with a DX10 header
    pub fn write_raw(&self, texture: &RawTexture) -> TextureResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Path::new(&texture.name).with_extension("dds"));
        let info = &texture.info;
        let bytes = build_dds(info.width, info.height, info.mip_count, info.format, &texture.data);
        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), "wrote stored texture");
        Ok(path)
    }

    /// Write a decoded image in the writer's format
    pub fn write_decoded(&self, texture: &DecodedTexture) -> TextureResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&texture.name);
        match self.format {
            ImageFormat::Dds => {
                let bytes = build_dds(texture.width, texture.height, 1, R8G8B8A8_UNORM, &texture.rgba);
                std::fs::write(&path, bytes)?;
            }
            ImageFormat::Png => {
                let image = RgbaImage::from_raw(texture.width, texture.height, texture.rgba.clone()).ok_or(
                    TextureError::InvalidDimensions {
                        width: texture.width,
                        height: texture.height,
                    },
                )?;
                image.save_with_format(&path, image::ImageFormat::Png)?;
            }
        }
        tracing::debug!(path = %path.display(), "wrote decoded texture");
        Ok(path)
    }
}
