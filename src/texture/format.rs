//! Pixel formats a compressed layer may carry.
//!
//! Uncompressed variants are named by their in-memory byte order, so
//! `Bgra8` means the bytes B, G, R, A appear in that order for each pixel.
//! Packed 16-bit variants are little-endian words read as
//! `A`-`R`-`G`-`B` from the most significant bit down.

use super::DecodeError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Bgr8,
    Bgra8,
    /// 5-6-5 packed, no alpha.
    Rgb565,
    /// 4-4-4-4 packed.
    Argb4444,
    /// 1-5-5-5 packed.
    Argb1555,
    /// BC1 / DXT1 with no alpha.
    Bc1,
    /// BC1 / DXT1 with 1-bit alpha.
    Bc1a,
    /// BC2 / DXT3, explicit 4-bit alpha.
    Bc2,
    /// BC3 / DXT5, interpolated alpha.
    Bc3,
}

impl PixelFormat {
    /// Display name used in info output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Rgb8 => "R8G8B8",
            Self::Rgba8 => "R8G8B8A8",
            Self::Bgr8 => "B8G8R8",
            Self::Bgra8 => "B8G8R8A8",
            Self::Rgb565 => "G3B5R5G3",
            Self::Argb4444 => "G4B4A4R4",
            Self::Argb1555 => "G3B5A1R5G2",
            Self::Bc1 => "BC1DXT1",
            Self::Bc1a => "BC1DXT1BA",
            Self::Bc2 => "BC2DXT3",
            Self::Bc3 => "BC3DXT5",
        }
    }

    pub fn is_block_compressed(self) -> bool {
        matches!(self, Self::Bc1 | Self::Bc1a | Self::Bc2 | Self::Bc3)
    }

    /// Bytes per 4x4 block, for block-compressed formats.
    pub fn block_bytes(self) -> Option<usize> {
        match self {
            Self::Bc1 | Self::Bc1a => Some(8),
            Self::Bc2 | Self::Bc3 => Some(16),
            _ => None,
        }
    }

    /// Bytes per pixel, for uncompressed formats.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Rgb8 | Self::Bgr8 => Some(3),
            Self::Rgba8 | Self::Bgra8 => Some(4),
            Self::Rgb565 | Self::Argb4444 | Self::Argb1555 => Some(2),
            _ => None,
        }
    }

    /// Bit depth of the stored data; block-compressed formats have none.
    pub fn bit_depth(self) -> Option<u32> {
        self.bytes_per_pixel().map(|b| b as u32 * 8)
    }

    /// Whether the format itself rules out transparency.
    pub fn is_opaque_format(self) -> bool {
        matches!(self, Self::Rgb8 | Self::Bgr8 | Self::Rgb565 | Self::Bc1)
    }

    /// Payload size of a `width` x `height` layer, or `None` if it does not
    /// fit in `usize`.
    pub fn data_size(self, width: u32, height: u32) -> Option<usize> {
        let (w, h) = (width as usize, height as usize);
        match (self.block_bytes(), self.bytes_per_pixel()) {
            (Some(block), _) => w.div_ceil(4).checked_mul(h.div_ceil(4))?.checked_mul(block),
            (None, Some(bpp)) => w.checked_mul(h)?.checked_mul(bpp),
            (None, None) => Some(0),
        }
    }

    /// Expand uncompressed data to tightly packed RGBA8, keeping row order.
    pub fn expand_to_rgba(self, data: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let convert: fn(&[u8]) -> [u8; 4] = match self {
            Self::Rgb8 => |px| [px[0], px[1], px[2], 255],
            Self::Rgba8 => |px| [px[0], px[1], px[2], px[3]],
            Self::Bgr8 => |px| [px[2], px[1], px[0], 255],
            Self::Bgra8 => |px| [px[2], px[1], px[0], px[3]],
            Self::Rgb565 => |px| {
                let v = u16::from_le_bytes([px[0], px[1]]);
                [
                    expand5((v >> 11) & 0x1f),
                    expand6((v >> 5) & 0x3f),
                    expand5(v & 0x1f),
                    255,
                ]
            },
            Self::Argb4444 => |px| {
                let v = u16::from_le_bytes([px[0], px[1]]);
                [
                    expand4((v >> 8) & 0xf),
                    expand4((v >> 4) & 0xf),
                    expand4(v & 0xf),
                    expand4(v >> 12),
                ]
            },
            Self::Argb1555 => |px| {
                let v = u16::from_le_bytes([px[0], px[1]]);
                [
                    expand5((v >> 10) & 0x1f),
                    expand5((v >> 5) & 0x1f),
                    expand5(v & 0x1f),
                    if v & 0x8000 != 0 { 255 } else { 0 },
                ]
            },
            Self::Bc1 | Self::Bc1a | Self::Bc2 | Self::Bc3 => {
                return Err(DecodeError::NeedsHardware(self));
            }
        };
        let bpp = self.bytes_per_pixel().unwrap_or(4);
        let mut out = Vec::with_capacity(data.len() / bpp * 4);
        for px in data.chunks_exact(bpp) {
            out.extend_from_slice(&convert(px));
        }
        Ok(out)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn expand4(v: u16) -> u8 {
    (v as u8) * 17
}

fn expand5(v: u16) -> u8 {
    let v = v as u8;
    (v << 3) | (v >> 2)
}

fn expand6(v: u16) -> u8 {
    let v = v as u8;
    (v << 2) | (v >> 4)
}
