//! Source file decoding.
//!
//! Raster files decode straight to a [`PixelBuffer`](crate::imaging::PixelBuffer).
//! DDS files decode to a [`Surface`] (a mip chain) or a [`Cubemap`] whose
//! layers may be block compressed; turning those into pixels is the job of
//! the [`bridge`](crate::bridge).
//!
//! ```text
//! path ──► FileKind ──► ContainerDecoder ──► Decoded::Pixels
//!                                        ├─► Decoded::Surface
//!                                        └─► Decoded::Cube
//! ```

pub mod dds;
mod decoder;
mod format;
mod layer;

pub use decoder::{
    ContainerDecoder, DdsDecoder, Decoded, FileKind, RasterDecoder, decode_file, decoder_for,
};
pub use format::PixelFormat;
pub use layer::{CubeFace, Cubemap, Layer, Surface};

use crate::imaging::PixelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("not a DDS file")]
    BadMagic,
    #[error("invalid DDS header: {0}")]
    InvalidHeader(String),
    #[error("unsupported DDS pixel format: {0}")]
    UnsupportedFormat(String),
    #[error("DDS files with a DX10 header are not supported")]
    Dx10,
    #[error("cube map does not contain all six faces")]
    IncompleteCube,
    #[error("data truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("{format} layer {width}x{height} needs {expected} bytes, got {actual}")]
    LayerSize {
        format: PixelFormat,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("{format} layer {width}x{height} is too large")]
    TooLarge {
        format: PixelFormat,
        width: u32,
        height: u32,
    },
    #[error("container has no layers")]
    NoLayers,
    #[error("layers disagree on pixel format")]
    MixedFormats,
    #[error("cube faces differ in size or pixel format")]
    MismatchedFaces,
    #[error("{0} data can only be decoded in hardware")]
    NeedsHardware(PixelFormat),
    #[error(transparent)]
    Pixels(#[from] PixelError),
}
