//! Container decoders: bytes of a known file kind in, pixels or a
//! hardware-only container out.

use super::dds::{self, DdsContainer};
use super::{Cubemap, DecodeError, Surface};
use crate::imaging::PixelBuffer;
use std::path::Path;

/// What kind of file a path holds, decided from its extension or, failing
/// that, its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Raster(image::ImageFormat),
    Dds,
}

const RASTER_FORMATS: [image::ImageFormat; 7] = [
    image::ImageFormat::Tga,
    image::ImageFormat::Bmp,
    image::ImageFormat::Gif,
    image::ImageFormat::Jpeg,
    image::ImageFormat::Png,
    image::ImageFormat::Tiff,
    image::ImageFormat::WebP,
];

impl FileKind {
    /// Kind implied by the file extension, if it is one we read.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("dds") {
            return Some(Self::Dds);
        }
        image::ImageFormat::from_extension(ext)
            .filter(|f| RASTER_FORMATS.contains(f))
            .map(Self::Raster)
    }

    /// Kind implied by the leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if dds::is_dds(bytes) {
            return Some(Self::Dds);
        }
        image::guess_format(bytes)
            .ok()
            .filter(|f| RASTER_FORMATS.contains(f))
            .map(Self::Raster)
    }

    pub fn is_supported_path(path: &Path) -> bool {
        Self::from_path(path).is_some()
    }
}

/// Result of a decode: either pixels ready to use or a container the
/// decode bridge must turn into pixels.
#[derive(Debug)]
pub enum Decoded {
    Pixels {
        picture: PixelBuffer,
        /// Bits per pixel in the source file.
        src_bit_depth: u32,
    },
    Surface(Surface),
    Cube(Cubemap),
}

impl Decoded {
    /// Whether turning this into pixels needs a hardware decode context.
    pub fn needs_hardware(&self) -> bool {
        match self {
            Self::Pixels { .. } => false,
            Self::Surface(surface) => surface.format().is_block_compressed(),
            Self::Cube(cube) => cube.format().is_block_compressed(),
        }
    }
}

pub trait ContainerDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError>;
}

/// Ordinary raster formats through the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct RasterDecoder {
    format: image::ImageFormat,
}

impl RasterDecoder {
    pub fn new(format: image::ImageFormat) -> Self {
        Self { format }
    }
}

impl ContainerDecoder for RasterDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        let img = image::load_from_memory_with_format(bytes, self.format)?;
        let src_bit_depth = if img.color().has_alpha() { 32 } else { 24 };
        let rgba = img.into_rgba8();
        let (width, height) = rgba.dimensions();
        let picture = PixelBuffer::from_rgba_top_down(width, height, rgba.as_raw())?;
        Ok(Decoded::Pixels {
            picture,
            src_bit_depth,
        })
    }
}

/// DDS textures and cube maps.
#[derive(Debug, Clone, Copy, Default)]
pub struct DdsDecoder;

impl ContainerDecoder for DdsDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        Ok(match dds::parse(bytes)? {
            DdsContainer::Surface(surface) => Decoded::Surface(surface),
            DdsContainer::Cube(cube) => Decoded::Cube(cube),
        })
    }
}

/// The decoder for `kind`.
pub fn decoder_for(kind: FileKind) -> Box<dyn ContainerDecoder> {
    match kind {
        FileKind::Raster(format) => Box::new(RasterDecoder::new(format)),
        FileKind::Dds => Box::new(DdsDecoder),
    }
}

/// Read `path` and decode it with the decoder its kind selects.
///
/// The extension decides the kind; files without a recognised extension
/// are sniffed.
pub fn decode_file(path: &Path) -> Result<(FileKind, Decoded), DecodeError> {
    let bytes = std::fs::read(path)?;
    let kind = FileKind::from_path(path)
        .or_else(|| FileKind::sniff(&bytes))
        .ok_or_else(|| DecodeError::UnsupportedFile(path.display().to_string()))?;
    let decoded = decoder_for(kind).decode(&bytes)?;
    Ok((kind, decoded))
}
