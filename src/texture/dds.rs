//! DDS container parsing.
//!
//! Only the legacy 124-byte header is understood. Pixel formats come from
//! the FourCC (`DXT1`, `DXT3`, `DXT5`) or from the RGB bit masks for
//! uncompressed data. Files carrying a `DX10` extension header are rejected.
//!
//! Layout after the header is face-major: each face (one for a plain
//! texture, six for a cube map in [`CubeFace::FILE_ORDER`]) stores its full
//! mip chain before the next face begins. Rows are stored top to bottom.

use super::{CubeFace, Cubemap, DecodeError, Layer, PixelFormat, Surface};
use crate::imaging::mip_dimensions;

const MAGIC: &[u8; 4] = b"DDS ";
const HEADER_SIZE: usize = 124;
const DATA_OFFSET: usize = MAGIC.len() + HEADER_SIZE;

const FLAG_MIPMAPCOUNT: u32 = 0x2_0000;

const PF_ALPHAPIXELS: u32 = 0x1;
const PF_FOURCC: u32 = 0x4;
const PF_RGB: u32 = 0x40;

const CAPS2_CUBEMAP: u32 = 0x200;
const CAPS2_ALL_FACES: u32 = 0xFC00;

/// Parsed contents of a DDS file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdsContainer {
    Surface(Surface),
    Cube(Cubemap),
}

/// Cheap check for the `DDS ` magic.
pub fn is_dds(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Fields of the header this parser uses. Offsets are relative to the
/// start of the header, just past the magic.
#[derive(Debug)]
struct Header {
    flags: u32,
    height: u32,
    width: u32,
    mip_count: u32,
    pf_flags: u32,
    four_cc: [u8; 4],
    rgb_bits: u32,
    masks: [u32; 4],
    caps2: u32,
}

impl Header {
    fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        if !is_dds(bytes) {
            return Err(DecodeError::BadMagic);
        }
        if bytes.len() < DATA_OFFSET {
            return Err(DecodeError::Truncated {
                needed: DATA_OFFSET,
                available: bytes.len(),
            });
        }
        let h = &bytes[MAGIC.len()..DATA_OFFSET];
        let size = read_u32(h, 0);
        if size as usize != HEADER_SIZE {
            return Err(DecodeError::InvalidHeader(format!("header size {size}")));
        }
        Ok(Self {
            flags: read_u32(h, 4),
            height: read_u32(h, 8),
            width: read_u32(h, 12),
            mip_count: read_u32(h, 24),
            pf_flags: read_u32(h, 76),
            four_cc: [h[80], h[81], h[82], h[83]],
            rgb_bits: read_u32(h, 84),
            masks: [
                read_u32(h, 88),
                read_u32(h, 92),
                read_u32(h, 96),
                read_u32(h, 100),
            ],
            caps2: read_u32(h, 108),
        })
    }

    fn pixel_format(&self) -> Result<PixelFormat, DecodeError> {
        if self.pf_flags & PF_FOURCC != 0 {
            return match &self.four_cc {
                b"DXT1" if self.pf_flags & PF_ALPHAPIXELS != 0 => Ok(PixelFormat::Bc1a),
                b"DXT1" => Ok(PixelFormat::Bc1),
                b"DXT2" | b"DXT3" => Ok(PixelFormat::Bc2),
                b"DXT4" | b"DXT5" => Ok(PixelFormat::Bc3),
                b"DX10" => Err(DecodeError::Dx10),
                other => Err(DecodeError::UnsupportedFormat(format!(
                    "FourCC {}",
                    String::from_utf8_lossy(other)
                ))),
            };
        }
        if self.pf_flags & PF_RGB == 0 {
            return Err(DecodeError::UnsupportedFormat(format!(
                "pixel format flags {:#x}",
                self.pf_flags
            )));
        }

        let alpha = self.pf_flags & PF_ALPHAPIXELS != 0;
        let [r, g, b, a] = self.masks;
        let a = if alpha { a } else { 0 };
        match (self.rgb_bits, r, g, b, a) {
            (24, 0xff, 0xff00, 0xff_0000, _) => Ok(PixelFormat::Rgb8),
            (24, 0xff_0000, 0xff00, 0xff, _) => Ok(PixelFormat::Bgr8),
            (32, 0xff, 0xff00, 0xff_0000, 0xff00_0000) => Ok(PixelFormat::Rgba8),
            (32, 0xff_0000, 0xff00, 0xff, 0xff00_0000) => Ok(PixelFormat::Bgra8),
            (16, 0xf800, 0x07e0, 0x001f, 0) => Ok(PixelFormat::Rgb565),
            (16, 0x0f00, 0x00f0, 0x000f, 0xf000) => Ok(PixelFormat::Argb4444),
            (16, 0x7c00, 0x03e0, 0x001f, 0x8000) => Ok(PixelFormat::Argb1555),
            (bits, ..) => Err(DecodeError::UnsupportedFormat(format!(
                "{bits}-bit RGB masks {r:#x}/{g:#x}/{b:#x}/{a:#x}"
            ))),
        }
    }

    fn num_levels(&self) -> u32 {
        if self.flags & FLAG_MIPMAPCOUNT != 0 && self.mip_count > 0 {
            self.mip_count
        } else {
            1
        }
    }
}

/// Parse a whole DDS file.
pub fn parse(bytes: &[u8]) -> Result<DdsContainer, DecodeError> {
    let header = Header::parse(bytes)?;
    if header.width == 0 || header.height == 0 {
        return Err(DecodeError::InvalidHeader(format!(
            "dimensions {}x{}",
            header.width, header.height
        )));
    }
    let format = header.pixel_format()?;
    let levels = header.num_levels();
    // A 32-bit dimension cannot halve more than 32 times.
    if levels > 32 {
        return Err(DecodeError::InvalidHeader(format!("{levels} mip levels")));
    }

    let cube = header.caps2 & CAPS2_CUBEMAP != 0;
    if cube && header.caps2 & CAPS2_ALL_FACES != CAPS2_ALL_FACES {
        return Err(DecodeError::IncompleteCube);
    }

    let mut offset = DATA_OFFSET;
    let mut read_surface = || -> Result<Surface, DecodeError> {
        let mut layers = Vec::with_capacity(levels as usize);
        for level in 0..levels {
            let (w, h) = mip_dimensions((header.width, header.height), level);
            let size = format.data_size(w, h).ok_or_else(|| {
                DecodeError::InvalidHeader(format!("{w}x{h} {format} level is too large"))
            })?;
            let remaining = bytes.len() - offset;
            if size > remaining {
                return Err(DecodeError::Truncated {
                    needed: offset.saturating_add(size),
                    available: bytes.len(),
                });
            }
            let end = offset + size;
            let data = &bytes[offset..end];
            layers.push(Layer::new(format, w, h, data.to_vec())?);
            offset = end;
        }
        Surface::new(layers)
    };

    if !cube {
        return Ok(DdsContainer::Surface(read_surface()?));
    }

    let mut faces = Vec::with_capacity(CubeFace::FILE_ORDER.len());
    for _ in CubeFace::FILE_ORDER {
        faces.push(read_surface()?);
    }
    let faces: [Surface; 6] = faces
        .try_into()
        .map_err(|_| DecodeError::IncompleteCube)?;
    Ok(DdsContainer::Cube(Cubemap::new(faces)?))
}
