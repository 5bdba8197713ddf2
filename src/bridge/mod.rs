//! Turning texture containers into pixel buffers.
//!
//! Block-compressed layers cannot be read on the CPU here; they are uploaded
//! to a GPU and read back as RGBA8. The [`DecodeBridge`] trait is the seam:
//! [`WgpuBridge`] is the real implementation, tests substitute a GPU-free
//! double.
//!
//! ## Decode contexts
//!
//! A bridge either owns a GPU context for its lifetime (a *session*, see
//! [`DecodeBridge::open_session`]) or acquires a transient one per call and
//! releases it before returning. Thumbnail workers always open their own
//! session; contexts are never shared between threads.
//!
//! Uncompressed layers are expanded on the CPU and never touch the GPU.

mod wgpu_bridge;

pub use wgpu_bridge::WgpuBridge;

use crate::imaging::{PixelBuffer, PixelError};
use crate::texture::{CubeFace, Cubemap, DecodeError, Layer, PixelFormat, Surface};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("no GPU adapter available: {0}")]
    NoAdapter(String),
    #[error("GPU adapter does not support BC texture compression")]
    MissingFeature,
    #[error("GPU device request failed: {0}")]
    Device(String),
    #[error("{format} layer {width}x{height} exceeds the GPU texture limit of {limit}")]
    TooLarge {
        format: PixelFormat,
        width: u32,
        height: u32,
        limit: u32,
    },
    #[error("GPU readback failed: {0}")]
    Readback(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Pixels(#[from] PixelError),
}

/// Decodes container layers into pixel buffers.
pub trait DecodeBridge: Send + Sync {
    /// Decode one layer at the resolution recorded in it.
    fn decode_layer(&self, layer: &Layer) -> Result<PixelBuffer, BridgeError>;

    /// A bridge holding a private decode context until dropped.
    fn open_session(&self) -> Result<Box<dyn DecodeBridge>, BridgeError>;

    /// Every mip level of `surface`, base level first.
    fn decode_surface(&self, surface: &Surface) -> Result<Vec<PixelBuffer>, BridgeError> {
        surface
            .layers()
            .iter()
            .map(|layer| self.decode_layer(layer))
            .collect()
    }

    /// Base level of every face, in [`CubeFace::DECODE_ORDER`].
    fn decode_cube(&self, cube: &Cubemap) -> Result<Vec<PixelBuffer>, BridgeError> {
        CubeFace::DECODE_ORDER
            .iter()
            .map(|&face| self.decode_layer(cube.face(face).base()))
            .collect()
    }
}

/// CPU path for uncompressed layers.
pub fn expand_layer(layer: &Layer) -> Result<PixelBuffer, BridgeError> {
    let rgba = layer.format().expand_to_rgba(layer.data())?;
    Ok(PixelBuffer::from_rgba_top_down(
        layer.width(),
        layer.height(),
        &rgba,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Pixel;
    use crate::test_helpers::{DdsBuilder, MockBridge};
    use crate::texture::dds::{self, DdsContainer};

    #[test]
    fn expand_layer_flips_rows() {
        // Two rows, top row red, bottom row green.
        let data = vec![255, 0, 0, 0, 255, 0];
        let layer = Layer::new(PixelFormat::Rgb8, 1, 2, data).unwrap();
        let buf = expand_layer(&layer).unwrap();
        assert_eq!(buf.get(0, 1), Pixel::new(255, 0, 0, 255));
        assert_eq!(buf.get(0, 0), Pixel::new(0, 255, 0, 255));
    }

    #[test]
    fn expand_layer_refuses_compressed() {
        let layer = Layer::new(PixelFormat::Bc3, 4, 4, vec![0; 16]).unwrap();
        assert!(matches!(
            expand_layer(&layer),
            Err(BridgeError::Decode(DecodeError::NeedsHardware(_)))
        ));
    }

    #[test]
    fn surface_decodes_every_level_at_its_own_size() {
        let bytes = DdsBuilder::new(PixelFormat::Bc1, 8, 4).mips(4).build();
        let DdsContainer::Surface(surface) = dds::parse(&bytes).unwrap() else {
            panic!("expected surface");
        };
        let bridge = MockBridge::default();
        let levels = bridge.decode_surface(&surface).unwrap();
        let dims: Vec<_> = levels.iter().map(|p| (p.width(), p.height())).collect();
        assert_eq!(dims, vec![(8, 4), (4, 2), (2, 1), (1, 1)]);
        assert_eq!(bridge.decoded(), 4);
    }

    #[test]
    fn cube_decodes_base_faces_in_front_back_right_left_top_bottom_order() {
        // File order is +X -X +Y -Y +Z -Z; give each face a distinct red.
        let mut builder = DdsBuilder::new(PixelFormat::Rgba8, 2, 2).cube().mips(2);
        for i in 0..6 {
            builder = builder.face_color(i, Pixel::new(i as u8 * 10, 0, 0, 255));
        }
        let DdsContainer::Cube(cube) = dds::parse(&builder.build()).unwrap() else {
            panic!("expected cube");
        };
        let faces = MockBridge::default().decode_cube(&cube).unwrap();
        let reds: Vec<u8> = faces.iter().map(|p| p.get(0, 0).r).collect();
        assert_eq!(reds, vec![40, 50, 0, 10, 20, 30]);
        assert!(faces.iter().all(|p| (p.width(), p.height()) == (2, 2)));
    }
}
