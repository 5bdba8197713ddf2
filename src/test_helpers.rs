//! Shared test utilities.
//!
//! Builders for source files (`encode_png`, `write_test_png`, [`DdsBuilder`])
//! and doubles for the two collaborator traits: [`MockBridge`] decodes
//! without a GPU, [`RecordingHost`] hands out texture ids and remembers
//! what it was given.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let bytes = DdsBuilder::new(PixelFormat::Bc1, 64, 64).mips(7).build();
//! let bridge = MockBridge::default();
//! let mut host = RecordingHost::default();
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::bridge::{BridgeError, DecodeBridge, expand_layer};
use crate::display::{TextureHost, TextureId};
use crate::imaging::{Pixel, PixelBuffer, mip_dimensions};
use crate::texture::{Layer, PixelFormat};

// =========================================================================
// Raster fixtures
// =========================================================================

/// PNG bytes of a solid `width` x `height` RGBA image.
pub fn encode_png(width: u32, height: u32, color: Pixel) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([color.r, color.g, color.b, color.a]),
    );
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Write a solid PNG into `dir` and return its path.
pub fn write_test_png(dir: &Path, name: &str, width: u32, height: u32, color: Pixel) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, encode_png(width, height, color)).unwrap();
    path
}

// =========================================================================
// DDS fixtures
// =========================================================================

const DDSD_MIPMAPCOUNT: u32 = 0x2_0000;
const DDSD_REQUIRED: u32 = 0x1 | 0x2 | 0x4 | 0x1000;
const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;
const DDSCAPS2_CUBEMAP: u32 = 0x200;
const DDSCAPS2_ALL_FACES: u32 = 0xFC00;

/// Colour of every uncompressed layer unless overridden.
pub const DDS_DEFAULT_COLOR: Pixel = Pixel::new(200, 100, 50, 255);

/// Builds DDS file bytes in memory.
///
/// Uncompressed layers are filled with one colour per face; block-compressed
/// layers are zero-filled.
#[derive(Debug, Clone)]
pub struct DdsBuilder {
    format: PixelFormat,
    width: u32,
    height: u32,
    mips: u32,
    cube_faces: Option<u32>,
    dx10: bool,
    colors: [Pixel; 6],
}

impl DdsBuilder {
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            mips: 1,
            cube_faces: None,
            dx10: false,
            colors: [DDS_DEFAULT_COLOR; 6],
        }
    }

    /// Declare `count` mip levels (sets the mip-count flag).
    pub fn mips(mut self, count: u32) -> Self {
        self.mips = count;
        self
    }

    /// A complete cube map.
    pub fn cube(self) -> Self {
        self.cube_faces(DDSCAPS2_ALL_FACES)
    }

    /// A cube map declaring only the faces in `mask`. Six faces of data are
    /// written regardless.
    pub fn cube_faces(mut self, mask: u32) -> Self {
        self.cube_faces = Some(mask);
        self
    }

    pub fn dx10(mut self) -> Self {
        self.dx10 = true;
        self
    }

    /// Colour of every face.
    pub fn color(mut self, color: Pixel) -> Self {
        self.colors = [color; 6];
        self
    }

    /// Colour of the face at `file_index` (+X -X +Y -Y +Z -Z).
    pub fn face_color(mut self, file_index: usize, color: Pixel) -> Self {
        self.colors[file_index] = color;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = self.header();
        let faces = if self.cube_faces.is_some() { 6 } else { 1 };
        for &color in &self.colors[..faces] {
            for level in 0..self.mips {
                let (w, h) = mip_dimensions((self.width, self.height), level);
                bytes.extend(self.layer_bytes(w, h, color));
            }
        }
        bytes
    }

    /// Magic and header only, no layer data.
    pub fn header(&self) -> Vec<u8> {
        let mut header = [0u32; 31];
        header[0] = 124;
        header[1] = DDSD_REQUIRED | if self.mips > 1 { DDSD_MIPMAPCOUNT } else { 0 };
        header[2] = self.height;
        header[3] = self.width;
        header[6] = if self.mips > 1 { self.mips } else { 0 };
        header[18] = 32;
        let (flags, four_cc, bits, masks) = self.pixel_format_fields();
        header[19] = flags;
        header[20] = u32::from_le_bytes(four_cc);
        header[21] = bits;
        header[22..26].copy_from_slice(&masks);
        header[26] = 0x1000;
        header[27] = self.cube_faces.map_or(0, |mask| DDSCAPS2_CUBEMAP | mask);

        let mut bytes = b"DDS ".to_vec();
        for word in header {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    fn pixel_format_fields(&self) -> (u32, [u8; 4], u32, [u32; 4]) {
        if self.dx10 {
            return (DDPF_FOURCC, *b"DX10", 0, [0; 4]);
        }
        let rgba = DDPF_RGB | DDPF_ALPHAPIXELS;
        match self.format {
            PixelFormat::Bc1 => (DDPF_FOURCC, *b"DXT1", 0, [0; 4]),
            PixelFormat::Bc1a => (DDPF_FOURCC | DDPF_ALPHAPIXELS, *b"DXT1", 0, [0; 4]),
            PixelFormat::Bc2 => (DDPF_FOURCC, *b"DXT3", 0, [0; 4]),
            PixelFormat::Bc3 => (DDPF_FOURCC, *b"DXT5", 0, [0; 4]),
            PixelFormat::Rgb8 => (DDPF_RGB, [0; 4], 24, [0xff, 0xff00, 0xff_0000, 0]),
            PixelFormat::Bgr8 => (DDPF_RGB, [0; 4], 24, [0xff_0000, 0xff00, 0xff, 0]),
            PixelFormat::Rgba8 => (rgba, [0; 4], 32, [0xff, 0xff00, 0xff_0000, 0xff00_0000]),
            PixelFormat::Bgra8 => (rgba, [0; 4], 32, [0xff_0000, 0xff00, 0xff, 0xff00_0000]),
            PixelFormat::Rgb565 => (DDPF_RGB, [0; 4], 16, [0xf800, 0x07e0, 0x001f, 0]),
            PixelFormat::Argb4444 => (rgba, [0; 4], 16, [0x0f00, 0x00f0, 0x000f, 0xf000]),
            PixelFormat::Argb1555 => (rgba, [0; 4], 16, [0x7c00, 0x03e0, 0x001f, 0x8000]),
        }
    }

    fn layer_bytes(&self, width: u32, height: u32, c: Pixel) -> Vec<u8> {
        let texel: Vec<u8> = match self.format {
            PixelFormat::Rgb8 => vec![c.r, c.g, c.b],
            PixelFormat::Bgr8 => vec![c.b, c.g, c.r],
            PixelFormat::Rgba8 => vec![c.r, c.g, c.b, c.a],
            PixelFormat::Bgra8 => vec![c.b, c.g, c.r, c.a],
            PixelFormat::Rgb565 => {
                let v = (u16::from(c.r >> 3) << 11) | (u16::from(c.g >> 2) << 5) | u16::from(c.b >> 3);
                v.to_le_bytes().to_vec()
            }
            PixelFormat::Argb4444 => {
                let v = (u16::from(c.a >> 4) << 12)
                    | (u16::from(c.r >> 4) << 8)
                    | (u16::from(c.g >> 4) << 4)
                    | u16::from(c.b >> 4);
                v.to_le_bytes().to_vec()
            }
            PixelFormat::Argb1555 => {
                let v = (u16::from(c.a >= 128) << 15)
                    | (u16::from(c.r >> 3) << 10)
                    | (u16::from(c.g >> 3) << 5)
                    | u16::from(c.b >> 3);
                v.to_le_bytes().to_vec()
            }
            PixelFormat::Bc1 | PixelFormat::Bc1a | PixelFormat::Bc2 | PixelFormat::Bc3 => {
                return vec![0; self.format.data_size(width, height).unwrap_or(0)];
            }
        };
        texel.repeat((width * height) as usize)
    }
}

// =========================================================================
// Collaborator doubles
// =========================================================================

/// What [`MockBridge`] returns for block-compressed layers.
pub const MOCK_BC_COLOR: Pixel = Pixel::new(128, 128, 128, 255);

/// GPU-free [`DecodeBridge`].
///
/// Uncompressed layers are expanded on the CPU; block-compressed layers come
/// back as solid [`MOCK_BC_COLOR`] at the layer's size. Clones and sessions
/// share the call counters.
#[derive(Debug, Clone, Default)]
pub struct MockBridge {
    decoded: Arc<AtomicUsize>,
    sessions: Arc<AtomicUsize>,
    fail: bool,
}

impl MockBridge {
    /// A bridge whose sessions and decodes all fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Layers decoded so far.
    pub fn decoded(&self) -> usize {
        self.decoded.load(Ordering::SeqCst)
    }

    /// Sessions opened so far.
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

impl DecodeBridge for MockBridge {
    fn decode_layer(&self, layer: &Layer) -> Result<PixelBuffer, BridgeError> {
        if self.fail {
            return Err(BridgeError::Readback("mock failure".into()));
        }
        self.decoded.fetch_add(1, Ordering::SeqCst);
        if layer.format().is_block_compressed() {
            Ok(PixelBuffer::new(layer.width(), layer.height(), MOCK_BC_COLOR))
        } else {
            expand_layer(layer)
        }
    }

    fn open_session(&self) -> Result<Box<dyn DecodeBridge>, BridgeError> {
        if self.fail {
            return Err(BridgeError::NoAdapter("mock adapter".into()));
        }
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

/// [`TextureHost`] that records uploads and releases.
#[derive(Debug, Default)]
pub struct RecordingHost {
    next: u64,
    /// Dimensions of every upload, in order.
    pub uploads: Vec<(u32, u32)>,
    pub released: Vec<TextureId>,
    live: Vec<TextureId>,
}

impl RecordingHost {
    /// Textures uploaded and not yet released.
    pub fn live(&self) -> &[TextureId] {
        &self.live
    }
}

impl TextureHost for RecordingHost {
    fn upload(&mut self, picture: &PixelBuffer) -> Option<TextureId> {
        self.next += 1;
        let id = TextureId::new(self.next)?;
        self.uploads.push((picture.width(), picture.height()));
        self.live.push(id);
        Some(id)
    }

    fn release(&mut self, id: TextureId) {
        self.live.retain(|&live| live != id);
        self.released.push(id);
    }
}
