//! One source file and everything loaded from it.
//!
//! A [`SourceImage`] starts empty, is filled by [`SourceImage::load`] and
//! emptied by [`SourceImage::unload`]. While loaded it holds:
//!
//! - the **primary** pictures: one per mip level for a DDS texture, one per
//!   face for a cube map (front, back, right, left, top, bottom), or a single
//!   picture for raster files;
//! - an optional **alt** composite: a horizontal strip of every mip level,
//!   or the six cube faces unfolded into a 4x3 cross;
//! - an [`ImageInfo`] record describing what was loaded.
//!
//! Queries read the alt composite when it exists and is enabled, otherwise
//! the first primary picture, otherwise report an empty image.
//!
//! Thumbnail requests on a `SourceImage` live in [`crate::thumbnail`].

use crate::bridge::{BridgeError, DecodeBridge};
use crate::display::{TextureHost, TextureId};
use crate::imaging::{
    Pixel, PixelBuffer, PixelError, cube_cross_dimensions, mip_strip_dimensions,
};
use crate::texture::{CubeFace, DecodeError, Decoded, FileKind, PixelFormat, decode_file};
use crate::thumbnail::ThumbnailState;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("image has no path")]
    NoPath,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("hardware decode failed: {0}")]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Pixels(#[from] PixelError),
}

/// Facts about a loaded image, filled in by a successful load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Pixel format name, e.g. `R8G8B8A8` or `BC1DXT1`.
    pub pixel_format: &'static str,
    /// Bits per pixel in the file; absent for block-compressed data.
    pub src_bit_depth: Option<u32>,
    pub opaque: bool,
    pub file_size: u64,
    /// Bytes held by decoded pictures, alt composite included.
    pub mem_size: usize,
    /// Primary pictures: mip levels, or faces for a cube map.
    pub mipmaps: usize,
}

/// How the loaded pictures were produced. Containers carry the opacity
/// their pixel format implies, across every face for a cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Raster,
    Surface { opaque: bool },
    Cube { opaque: bool },
}

#[derive(Default)]
pub struct SourceImage {
    path: PathBuf,
    layout: Option<Layout>,
    pictures: Vec<PixelBuffer>,
    alt: PixelBuffer,
    alt_enabled: bool,
    primary_texture: Option<TextureId>,
    alt_texture: Option<TextureId>,
    info: ImageInfo,
    loaded_at: Option<Instant>,
    pub(crate) thumbnail: ThumbnailState,
}

impl SourceImage {
    /// An unloaded image for `path`. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        !self.pictures.is_empty()
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// When the image was last loaded or re-requested.
    pub fn loaded_at(&self) -> Option<Instant> {
        self.loaded_at
    }

    /// Decode the file and fill the pictures, alt composite and info.
    ///
    /// Loading an already loaded image only refreshes [`loaded_at`](Self::loaded_at).
    /// On failure the image is left empty.
    pub fn load(&mut self, bridge: &dyn DecodeBridge) -> Result<(), LoadError> {
        if self.is_loaded() {
            self.loaded_at = Some(Instant::now());
            return Ok(());
        }
        if self.path.as_os_str().is_empty() {
            return Err(LoadError::NoPath);
        }
        let result = decode_file(&self.path)
            .map_err(LoadError::from)
            .and_then(|(kind, decoded)| self.load_decoded(kind, decoded, bridge));
        if let Err(e) = &result {
            debug!(path = %self.path.display(), "load failed: {e}");
            self.clear();
        }
        result
    }

    /// Fill from an already decoded file. Containers go through `bridge`.
    pub(crate) fn load_decoded(
        &mut self,
        kind: FileKind,
        decoded: Decoded,
        bridge: &dyn DecodeBridge,
    ) -> Result<(), LoadError> {
        let (pixel_format, src_bit_depth) = match decoded {
            Decoded::Pixels {
                picture,
                src_bit_depth,
            } => {
                self.pictures = vec![picture];
                self.layout = Some(Layout::Raster);
                let format = if src_bit_depth == 24 {
                    PixelFormat::Rgb8
                } else {
                    PixelFormat::Rgba8
                };
                (format.name(), Some(src_bit_depth))
            }
            Decoded::Surface(surface) => {
                let format = surface.format();
                self.pictures = bridge.decode_surface(&surface)?;
                self.layout = Some(Layout::Surface {
                    opaque: surface.is_opaque(),
                });
                if self.pictures.len() > 1 {
                    self.alt = self.mip_strip();
                }
                (format.name(), format.bit_depth())
            }
            Decoded::Cube(cube) => {
                let format = cube.format();
                self.pictures = bridge.decode_cube(&cube)?;
                self.layout = Some(Layout::Cube {
                    opaque: cube.all_faces_opaque(),
                });
                self.alt = self.cube_cross();
                (format.name(), format.bit_depth())
            }
        };
        if !self.is_loaded() {
            return Err(PixelError::Empty.into());
        }

        self.loaded_at = Some(Instant::now());
        self.info = ImageInfo {
            width: self.width(),
            height: self.height(),
            pixel_format,
            src_bit_depth,
            opaque: self.is_opaque(),
            file_size: std::fs::metadata(&self.path).map_or(0, |m| m.len()),
            mem_size: self.mem_size(),
            mipmaps: self.pictures.len(),
        };
        debug!(
            path = %self.path.display(),
            ?kind,
            width = self.info.width,
            height = self.info.height,
            "loaded"
        );
        Ok(())
    }

    /// Every mip level left to right along the bottom edge.
    fn mip_strip(&self) -> PixelBuffer {
        let dims: Vec<_> = self
            .pictures
            .iter()
            .map(|p| (p.width(), p.height()))
            .collect();
        let Some((w, h)) = mip_strip_dimensions(&dims) else {
            debug!(path = %self.path.display(), "mip strip too wide, skipping");
            return PixelBuffer::default();
        };
        let mut strip = PixelBuffer::new(w, h, Pixel::TRANSPARENT);
        let mut origin_x = 0;
        for level in &self.pictures {
            strip.blit(level, origin_x, 0);
            origin_x += level.width();
        }
        strip
    }

    /// Faces unfolded into a 4x3 cross.
    fn cube_cross(&self) -> PixelBuffer {
        let Some(front) = self.pictures.first() else {
            return PixelBuffer::default();
        };
        let (face_w, face_h) = (front.width(), front.height());
        let Some((w, h)) = cube_cross_dimensions((face_w, face_h)) else {
            debug!(path = %self.path.display(), "cube cross too large, skipping");
            return PixelBuffer::default();
        };
        let mut cross = PixelBuffer::new(w, h, Pixel::TRANSPARENT);
        for (face, picture) in CubeFace::DECODE_ORDER.iter().zip(&self.pictures) {
            let (col, row) = face.cross_cell();
            cross.blit(picture, col * face_w, row * face_h);
        }
        cross
    }

    /// The base picture, consuming the image.
    pub(crate) fn into_base(self) -> Option<PixelBuffer> {
        self.pictures.into_iter().next().filter(PixelBuffer::is_valid)
    }

    fn mem_size(&self) -> usize {
        self.pictures.iter().map(PixelBuffer::mem_size).sum::<usize>() + self.alt.mem_size()
    }

    fn clear(&mut self) {
        self.layout = None;
        self.pictures.clear();
        self.alt.clear();
        self.alt_enabled = false;
        self.loaded_at = None;
        self.info = ImageInfo::default();
    }

    /// Release textures and drop every decoded picture.
    ///
    /// The info record survives with its memory size zeroed.
    pub fn unload(&mut self, host: &mut dyn TextureHost) {
        self.unbind(host);
        self.layout = None;
        self.pictures.clear();
        self.alt.clear();
        self.alt_enabled = false;
        self.loaded_at = None;
        self.info.mem_size = 0;
    }

    /// Decoded pictures, base level (or front face) first.
    pub fn pictures(&self) -> &[PixelBuffer] {
        &self.pictures
    }

    pub fn alt(&self) -> Option<&PixelBuffer> {
        self.alt.is_valid().then_some(&self.alt)
    }

    pub fn is_alt_enabled(&self) -> bool {
        self.alt_enabled
    }

    pub fn set_alt_enabled(&mut self, enabled: bool) {
        self.alt_enabled = enabled;
    }

    /// The picture queries read from.
    fn current(&self) -> Option<&PixelBuffer> {
        if self.alt.is_valid() && self.alt_enabled {
            return Some(&self.alt);
        }
        self.pictures.first().filter(|p| p.is_valid())
    }

    pub fn width(&self) -> u32 {
        self.current().map_or(0, PixelBuffer::width)
    }

    pub fn height(&self) -> u32 {
        self.current().map_or(0, PixelBuffer::height)
    }

    /// Pixel at `(x, y)`, row 0 at the bottom. Black when nothing is loaded.
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        self.current().map_or(Pixel::BLACK, |p| p.get(x, y))
    }

    pub fn is_opaque(&self) -> bool {
        match self.layout {
            Some(Layout::Cube { opaque }) | Some(Layout::Surface { opaque }) => opaque,
            _ => self.current().is_none_or(PixelBuffer::is_opaque),
        }
    }

    /// Rotate every decoded picture a quarter turn.
    ///
    /// Bound textures are not refreshed; call [`unbind`](Self::unbind) first
    /// if they must follow.
    pub fn rotate90(&mut self, anticlockwise: bool) {
        for picture in &mut self.pictures {
            picture.rotate90(anticlockwise);
        }
        self.alt.rotate90(anticlockwise);
        if self.is_loaded() {
            self.info.width = self.width();
            self.info.height = self.height();
        }
    }

    /// Mirror every decoded picture.
    pub fn flip(&mut self, horizontal: bool) {
        for picture in &mut self.pictures {
            picture.flip(horizontal);
        }
        self.alt.flip(horizontal);
    }

    /// Upload what the queries currently show and return its texture. Each
    /// of the primary and alt textures is uploaded at most once.
    pub fn bind(&mut self, host: &mut dyn TextureHost) -> Option<TextureId> {
        if self.alt.is_valid() && self.alt_enabled {
            if self.alt_texture.is_none() {
                self.alt_texture = host.upload(&self.alt);
            }
            return self.alt_texture;
        }
        if self.primary_texture.is_none() {
            let base = self.pictures.first().filter(|p| p.is_valid())?;
            self.primary_texture = host.upload(base);
        }
        self.primary_texture
    }

    /// Release the primary and alt textures.
    pub fn unbind(&mut self, host: &mut dyn TextureHost) {
        if let Some(id) = self.primary_texture.take() {
            host.release(id);
        }
        if let Some(id) = self.alt_texture.take() {
            host.release(id);
        }
    }
}
