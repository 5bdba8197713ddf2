//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Info
//!
//! ```text
//! sky.dds
//!     Size: 512x512
//!     Format: BC1DXT1
//!     Mipmaps: 10
//!     Opaque: yes
//!     File: 170.8 KiB
//!     Memory: 1.3 MiB
//! ```
//!
//! ## Thumbs
//!
//! ```text
//! generated  textures/sky.dds
//! cached     textures/grass.png
//! failed     textures/broken.tga
//!
//! Thumbnails: 1 cached, 1 generated, 1 failed
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns lines) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::cache::ThumbnailStats;
use crate::source::ImageInfo;
use crate::thumbnail::ThumbnailOutcome;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count with binary units.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

// ============================================================================
// Info
// ============================================================================

/// Format the info record of a loaded image.
pub fn format_info(path: &Path, info: &ImageInfo) -> Vec<String> {
    let name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let format = match info.src_bit_depth {
        Some(bits) => format!("{} ({bits}-bit source)", info.pixel_format),
        None => info.pixel_format.to_string(),
    };
    let pad = indent(1);
    vec![
        name,
        format!("{pad}Size: {}x{}", info.width, info.height),
        format!("{pad}Format: {format}"),
        format!("{pad}Mipmaps: {}", info.mipmaps),
        format!("{pad}Opaque: {}", if info.opaque { "yes" } else { "no" }),
        format!("{pad}File: {}", format_bytes(info.file_size)),
        format!("{pad}Memory: {}", format_bytes(info.mem_size as u64)),
    ]
}

pub fn print_info(path: &Path, info: &ImageInfo) {
    for line in format_info(path, info) {
        println!("{}", line);
    }
}

// ============================================================================
// Thumbs
// ============================================================================

fn outcome_label(outcome: ThumbnailOutcome) -> &'static str {
    match outcome {
        ThumbnailOutcome::Cached => "cached",
        ThumbnailOutcome::Generated => "generated",
        ThumbnailOutcome::Failed => "failed",
    }
}

/// One line per finished thumbnail: outcome, then the source path.
pub fn format_thumb_line(path: &Path, outcome: ThumbnailOutcome) -> String {
    format!("{:<10} {}", outcome_label(outcome), path.display())
}

pub fn format_summary(stats: &ThumbnailStats) -> String {
    format!("Thumbnails: {stats}")
}

pub fn print_thumb_line(path: &Path, outcome: ThumbnailOutcome) {
    println!("{}", format_thumb_line(path, outcome));
}

pub fn print_summary(stats: &ThumbnailStats) {
    println!();
    println!("{}", format_summary(stats));
}
