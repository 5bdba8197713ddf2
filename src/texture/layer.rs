//! Compressed layers and the containers that own them.

use super::{DecodeError, PixelFormat};

/// One mip level or cube face of raw texture data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Layer {
    /// Wrap `data`, which must be exactly the size `format` implies.
    pub fn new(
        format: PixelFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        let expected = format.data_size(width, height).ok_or(DecodeError::TooLarge {
            format,
            width,
            height,
        })?;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(DecodeError::LayerSize {
                format,
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A single 2D texture: its mip chain, base level first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    layers: Vec<Layer>,
}

impl Surface {
    pub fn new(layers: Vec<Layer>) -> Result<Self, DecodeError> {
        let first = layers.first().ok_or(DecodeError::NoLayers)?;
        if layers.iter().any(|l| l.format != first.format) {
            return Err(DecodeError::MixedFormats);
        }
        Ok(Self { layers })
    }

    pub fn format(&self) -> PixelFormat {
        self.layers[0].format
    }

    pub fn width(&self) -> u32 {
        self.layers[0].width
    }

    pub fn height(&self) -> u32 {
        self.layers[0].height
    }

    /// Level 0.
    pub fn base(&self) -> &Layer {
        &self.layers[0]
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn is_opaque(&self) -> bool {
        self.format().is_opaque_format()
    }
}

/// Cube map face, named by the axis it looks down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl CubeFace {
    /// Order faces are stored in a DDS file.
    pub const FILE_ORDER: [CubeFace; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// Order faces are decoded and listed in: front, back, right, left,
    /// top, bottom.
    pub const DECODE_ORDER: [CubeFace; 6] = [
        Self::PosZ,
        Self::NegZ,
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// `(column, row)` of this face in the 4x3 cross, row 0 at the bottom.
    pub fn cross_cell(self) -> (u32, u32) {
        match self {
            Self::PosZ => (1, 1),
            Self::NegZ => (3, 1),
            Self::PosX => (2, 1),
            Self::NegX => (0, 1),
            Self::PosY => (1, 2),
            Self::NegY => (1, 0),
        }
    }
}

/// Six surfaces sharing one base size and pixel format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cubemap {
    faces: [Surface; 6],
}

impl Cubemap {
    /// Build from faces given in [`CubeFace::FILE_ORDER`].
    pub fn new(faces: [Surface; 6]) -> Result<Self, DecodeError> {
        let first = &faces[0];
        let consistent = faces.iter().all(|f| {
            f.format() == first.format() && f.width() == first.width() && f.height() == first.height()
        });
        if !consistent {
            return Err(DecodeError::MismatchedFaces);
        }
        Ok(Self { faces })
    }

    pub fn face(&self, face: CubeFace) -> &Surface {
        &self.faces[face.index()]
    }

    pub fn format(&self) -> PixelFormat {
        self.faces[0].format()
    }

    pub fn width(&self) -> u32 {
        self.faces[0].width()
    }

    pub fn height(&self) -> u32 {
        self.faces[0].height()
    }

    pub fn all_faces_opaque(&self) -> bool {
        self.faces.iter().all(Surface::is_opaque)
    }
}
