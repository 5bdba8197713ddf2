//! Pixel data and the pure math around it.
//!
//! | Piece | Role |
//! |---|---|
//! | [`PixelBuffer`] | flat RGBA array, row 0 at the bottom |
//! | [`ResampleFilter`] | kernel selection for [`PixelBuffer::resample`] |
//! | calculations | thumbnail fit, mip sizes, composite layouts |
//!
//! Resampling is delegated to `fast_image_resize`; everything else is plain
//! index arithmetic.

mod calculations;
mod params;
mod pixels;

pub use calculations::{
    cube_cross_dimensions, mip_dimensions, mip_strip_dimensions, thumbnail_fit_dimensions,
};
pub use params::ResampleFilter;
pub use pixels::{BYTES_PER_PIXEL, Pixel, PixelBuffer, PixelError};
