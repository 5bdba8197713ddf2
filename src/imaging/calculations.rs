//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Scale `source` uniformly so it fits `target`, choosing the axis whose
/// scale factor is smaller.
///
/// The result matches the target exactly on the limiting axis and is no
/// larger than the target on the other. A later centre-crop to `target`
/// then pads the remaining space.
///
/// # Arguments
/// * `source` - Source image dimensions (width, height)
/// * `target` - Thumbnail dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Resample dimensions, never zero on either axis
///
/// # Examples
/// ```
/// # use texview::imaging::thumbnail_fit_dimensions;
/// // 2:1 landscape into a square → width-bound
/// assert_eq!(thumbnail_fit_dimensions((400, 200), (128, 128)), (128, 64));
/// ```
pub fn thumbnail_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    if src_w == 0 || src_h == 0 {
        return (tgt_w.max(1), tgt_h.max(1));
    }

    let scale_x = tgt_w as f64 / src_w as f64;
    let scale_y = tgt_h as f64 / src_h as f64;

    let (w, h) = if scale_x < scale_y {
        // Width is the limiting axis
        (tgt_w, (src_h as f64 * scale_x).round() as u32)
    } else {
        ((src_w as f64 * scale_y).round() as u32, tgt_h)
    };
    (w.max(1), h.max(1))
}

/// Dimensions of mip `level` below a base of `base` pixels.
///
/// Each level halves the previous one, flooring, never below 1.
pub fn mip_dimensions(base: (u32, u32), level: u32) -> (u32, u32) {
    let shrink = |d: u32| d.checked_shr(level).unwrap_or(0).max(1);
    (shrink(base.0), shrink(base.1))
}

/// Size of the horizontal strip holding every level side by side.
///
/// # Arguments
/// * `levels` - Level dimensions, base level first
///
/// # Returns
/// * `Some((width, height))` - Sum of widths by the height of the base level
/// * `None` - The summed width does not fit in a `u32`
pub fn mip_strip_dimensions(levels: &[(u32, u32)]) -> Option<(u32, u32)> {
    let width = levels
        .iter()
        .try_fold(0u32, |acc, &(w, _)| acc.checked_add(w))?;
    let height = levels.first().map_or(0, |&(_, h)| h);
    Some((width, height))
}

/// Size of the 4-wide by 3-tall cross layout for cube faces of `face` size,
/// or `None` if it does not fit in a `u32`.
pub fn cube_cross_dimensions(face: (u32, u32)) -> Option<(u32, u32)> {
    Some((face.0.checked_mul(4)?, face.1.checked_mul(3)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // thumbnail_fit_dimensions tests
    // =========================================================================

    #[test]
    fn fit_landscape_into_square_is_width_bound() {
        assert_eq!(thumbnail_fit_dimensions((400, 200), (128, 128)), (128, 64));
    }

    #[test]
    fn fit_portrait_into_square_is_height_bound() {
        assert_eq!(thumbnail_fit_dimensions((200, 400), (128, 128)), (64, 128));
    }

    #[test]
    fn fit_same_aspect_matches_target() {
        assert_eq!(thumbnail_fit_dimensions((1920, 1080), (256, 144)), (256, 144));
    }

    #[test]
    fn fit_upscales_small_sources() {
        // 16x16 into 256x144: height limits
        assert_eq!(thumbnail_fit_dimensions((16, 16), (256, 144)), (144, 144));
    }

    #[test]
    fn fit_never_collapses_to_zero() {
        // 10000x1 sliver into 128x128 → height rounds to 0, clamped to 1
        assert_eq!(thumbnail_fit_dimensions((10000, 1), (128, 128)), (128, 1));
    }

    #[test]
    fn fit_zero_source_falls_back_to_target() {
        assert_eq!(thumbnail_fit_dimensions((0, 10), (64, 32)), (64, 32));
    }

    // =========================================================================
    // mip_dimensions tests
    // =========================================================================

    #[test]
    fn mip_levels_halve_and_floor() {
        assert_eq!(mip_dimensions((256, 64), 0), (256, 64));
        assert_eq!(mip_dimensions((256, 64), 1), (128, 32));
        assert_eq!(mip_dimensions((5, 3), 1), (2, 1));
    }

    #[test]
    fn mip_levels_clamp_at_one() {
        assert_eq!(mip_dimensions((256, 64), 7), (2, 1));
        assert_eq!(mip_dimensions((256, 64), 40), (1, 1));
    }

    // =========================================================================
    // Composite layout tests
    // =========================================================================

    #[test]
    fn strip_sums_widths_at_base_height() {
        let levels = [(8, 4), (4, 2), (2, 1), (1, 1)];
        assert_eq!(mip_strip_dimensions(&levels), Some((15, 4)));
    }

    #[test]
    fn strip_of_nothing_is_empty() {
        assert_eq!(mip_strip_dimensions(&[]), Some((0, 0)));
    }

    #[test]
    fn strip_wider_than_u32_has_no_size() {
        let levels = [(0x8000_0000, 1), (0x4000_0000, 1), (0x4000_0000, 1)];
        assert_eq!(mip_strip_dimensions(&levels), None);
    }

    #[test]
    fn cross_is_four_by_three_faces() {
        assert_eq!(cube_cross_dimensions((32, 32)), Some((128, 96)));
        assert_eq!(cube_cross_dimensions((0x4000_0000, 1)), None);
        assert_eq!(cube_cross_dimensions((1, 0x6000_0000)), None);
    }
}
