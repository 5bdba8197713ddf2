//! Parameter types for pixel operations.
//!
//! These describe *what* a resample should do, not *how*. The mapping onto
//! the `fast_image_resize` kernels lives here so the rest of the crate only
//! ever deals in [`ResampleFilter`].
//!
//! | Filter | Kernel |
//! |---|---|
//! | `Nearest` | nearest neighbour (no convolution) |
//! | `Box` | box |
//! | `Bilinear` | bilinear (triangle) |
//! | `Bicubic` | Catmull-Rom |
//! | `Quadratic` | Gaussian (closest available quadratic-spline approximation) |
//! | `Hamming` | Hamming-windowed sinc |

use fast_image_resize as fir;

/// Interpolation kernel used by [`PixelBuffer::resample`](super::PixelBuffer::resample).
///
/// The choice only affects filtering, never the layout of the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleFilter {
    Nearest,
    Box,
    #[default]
    Bilinear,
    Bicubic,
    Quadratic,
    Hamming,
}

impl ResampleFilter {
    pub(crate) fn algorithm(self) -> fir::ResizeAlg {
        let kernel = match self {
            Self::Nearest => return fir::ResizeAlg::Nearest,
            Self::Box => fir::FilterType::Box,
            Self::Bilinear => fir::FilterType::Bilinear,
            Self::Bicubic => fir::FilterType::CatmullRom,
            Self::Quadratic => fir::FilterType::Gaussian,
            Self::Hamming => fir::FilterType::Hamming,
        };
        fir::ResizeAlg::Convolution(kernel)
    }

    pub const ALL: [ResampleFilter; 6] = [
        Self::Nearest,
        Self::Box,
        Self::Bilinear,
        Self::Bicubic,
        Self::Quadratic,
        Self::Hamming,
    ];
}
