//! Flat RGBA pixel buffers.
//!
//! A [`PixelBuffer`] is the one uncompressed image representation in the
//! crate: decoders produce them, the decode bridge reads them back from the
//! GPU, the source aggregate keeps a mip chain of them and thumbnails are
//! stored as one.
//!
//! ## Coordinates
//!
//! Pixels are stored row-major with row 0 at the **bottom** of the image.
//! Decoders that produce top-down data go through
//! [`PixelBuffer::from_rgba_top_down`], and exporters use
//! [`PixelBuffer::to_rgba_top_down`].
//!
//! ## Validity
//!
//! A zero-area buffer is the "unset" state. It is distinct from a buffer
//! filled with zeroes: `is_valid()` is false and every transforming operation
//! either fails with [`PixelError::Empty`] or does nothing.

use super::params::ResampleFilter;
use bytemuck::{Pod, Zeroable};
use fast_image_resize as fir;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PixelError {
    #[error("pixel buffer is empty")]
    Empty,
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("expected {expected} bytes of pixel data, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("resample failed: {0}")]
    Resample(String),
}

/// One 8-bit-per-channel RGBA pixel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub const TRANSPARENT: Pixel = Pixel::new(0, 0, 0, 0);
    pub const BLACK: Pixel = Pixel::new(0, 0, 0, 255);
    pub const WHITE: Pixel = Pixel::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn is_opaque(self) -> bool {
        self.a == u8::MAX
    }
}

/// Bytes per stored pixel.
pub const BYTES_PER_PIXEL: usize = std::mem::size_of::<Pixel>();

/// `width * height`, or an error if it overflows `usize`.
fn pixel_count(width: u32, height: u32) -> Result<usize, PixelError> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or(PixelError::InvalidDimensions { width, height })
}

/// A mutable 2D array of [`Pixel`]s. `pixels.len() == width * height` always.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl PixelBuffer {
    /// Create a `width` x `height` buffer filled with `fill`.
    ///
    /// A zero dimension yields the empty (invalid) buffer.
    pub fn new(width: u32, height: u32, fill: Pixel) -> Self {
        if width == 0 || height == 0 {
            return Self::default();
        }
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    /// Wrap an existing bottom-up pixel vector.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Pixel>) -> Result<Self, PixelError> {
        if width == 0 || height == 0 {
            return Err(PixelError::InvalidDimensions { width, height });
        }
        let expected = pixel_count(width, height)?;
        if pixels.len() != expected {
            return Err(PixelError::LengthMismatch {
                expected: expected.saturating_mul(BYTES_PER_PIXEL),
                actual: pixels.len() * BYTES_PER_PIXEL,
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a buffer from tightly packed RGBA8 rows ordered top to bottom
    /// (the order image files and GPU readbacks use).
    pub fn from_rgba_top_down(width: u32, height: u32, bytes: &[u8]) -> Result<Self, PixelError> {
        if width == 0 || height == 0 {
            return Err(PixelError::InvalidDimensions { width, height });
        }
        let expected = pixel_count(width, height)?
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or(PixelError::InvalidDimensions { width, height })?;
        if bytes.len() != expected {
            return Err(PixelError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        let mut pixels: Vec<Pixel> = Vec::with_capacity(bytes.len() / BYTES_PER_PIXEL);
        for row in bytes.chunks_exact(row_bytes).rev() {
            pixels.extend_from_slice(bytemuck::cast_slice(row));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Tightly packed RGBA8 rows, top row first.
    pub fn to_rgba_top_down(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * BYTES_PER_PIXEL);
        if self.width == 0 {
            return out;
        }
        for row in self.pixels.chunks_exact(self.width as usize).rev() {
            out.extend_from_slice(bytemuck::cast_slice(row));
        }
        out
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_valid(&self) -> bool {
        !self.pixels.is_empty()
    }

    pub fn num_pixels(&self) -> usize {
        self.pixels.len()
    }

    /// Memory held by the pixel data in bytes.
    pub fn mem_size(&self) -> usize {
        self.pixels.len() * BYTES_PER_PIXEL
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Raw RGBA bytes in storage (bottom-up) order.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Read the pixel at `(x, y)`. Coordinates must be in bounds.
    pub fn get(&self, x: u32, y: u32) -> Pixel {
        self.pixels[self.index(x, y)]
    }

    /// Write the pixel at `(x, y)`. Coordinates must be in bounds.
    pub fn set(&mut self, x: u32, y: u32, pixel: Pixel) {
        let i = self.index(x, y);
        self.pixels[i] = pixel;
    }

    /// Return to the empty state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True when every pixel is fully opaque. An empty buffer counts as opaque.
    pub fn is_opaque(&self) -> bool {
        self.pixels.iter().all(|p| p.is_opaque())
    }

    /// Copy `src` into this buffer with its bottom-left corner at
    /// `(origin_x, origin_y)`. Pixels falling outside are dropped.
    pub fn blit(&mut self, src: &PixelBuffer, origin_x: u32, origin_y: u32) {
        for y in 0..src.height {
            let dy = origin_y + y;
            if dy >= self.height {
                break;
            }
            for x in 0..src.width {
                let dx = origin_x + x;
                if dx >= self.width {
                    break;
                }
                self.set(dx, dy, src.get(x, y));
            }
        }
    }

    /// Replace the contents with a filtered resize to `width` x `height`.
    pub fn resample(
        &mut self,
        width: u32,
        height: u32,
        filter: ResampleFilter,
    ) -> Result<(), PixelError> {
        if !self.is_valid() {
            return Err(PixelError::Empty);
        }
        if width == 0 || height == 0 {
            return Err(PixelError::InvalidDimensions { width, height });
        }
        if width == self.width && height == self.height {
            return Ok(());
        }

        let src = fir::images::ImageRef::new(
            self.width,
            self.height,
            bytemuck::cast_slice(&self.pixels),
            fir::PixelType::U8x4,
        )
        .map_err(|e| PixelError::Resample(e.to_string()))?;
        let mut dst = fir::images::Image::new(width, height, fir::PixelType::U8x4);
        let options = fir::ResizeOptions::new().resize_alg(filter.algorithm());
        fir::Resizer::new()
            .resize(&src, &mut dst, Some(&options))
            .map_err(|e| PixelError::Resample(e.to_string()))?;

        let bytes = dst.into_vec();
        self.pixels = bytemuck::cast_slice(&bytes).to_vec();
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Reframe to `width` x `height` around the image centre.
    ///
    /// Growing pads the new area with `fill`; shrinking truncates
    /// symmetrically. Odd differences favour the bottom/left edge, matching
    /// integer halving of both sizes.
    pub fn crop(&mut self, width: u32, height: u32, fill: Pixel) -> Result<(), PixelError> {
        if !self.is_valid() {
            return Err(PixelError::Empty);
        }
        if width == 0 || height == 0 {
            return Err(PixelError::InvalidDimensions { width, height });
        }
        if width == self.width && height == self.height {
            return Ok(());
        }

        let origin_x = i64::from(self.width / 2) - i64::from(width / 2);
        let origin_y = i64::from(self.height / 2) - i64::from(height / 2);
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..i64::from(height) {
            let sy = origin_y + y;
            for x in 0..i64::from(width) {
                let sx = origin_x + x;
                let inside = (0..i64::from(self.width)).contains(&sx)
                    && (0..i64::from(self.height)).contains(&sy);
                pixels.push(if inside {
                    self.get(sx as u32, sy as u32)
                } else {
                    fill
                });
            }
        }

        self.pixels = pixels;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Mirror in place: left/right when `horizontal`, otherwise top/bottom.
    pub fn flip(&mut self, horizontal: bool) {
        if !self.is_valid() {
            return;
        }
        let w = self.width as usize;
        if horizontal {
            for row in self.pixels.chunks_exact_mut(w) {
                row.reverse();
            }
        } else {
            let rows: Vec<Pixel> = self.pixels.chunks_exact(w).rev().flatten().copied().collect();
            self.pixels = rows;
        }
    }

    /// Rotate a quarter turn, clockwise unless `anticlockwise`.
    pub fn rotate90(&mut self, anticlockwise: bool) {
        if !self.is_valid() {
            return;
        }
        let (w, h) = (self.width, self.height);
        let (new_w, new_h) = (h, w);
        let mut pixels = Vec::with_capacity(self.pixels.len());
        for ny in 0..new_h {
            for nx in 0..new_w {
                let (sx, sy) = if anticlockwise {
                    (ny, h - 1 - nx)
                } else {
                    (w - 1 - ny, nx)
                };
                pixels.push(self.get(sx, sy));
            }
        }
        self.pixels = pixels;
        self.width = new_w;
        self.height = new_h;
    }
}
