//! # texview
//!
//! Image loading and thumbnail caching for a texture viewer. Ordinary raster
//! files and DDS textures (block-compressed, mip-chained, cube-mapped) load
//! into a [`source::SourceImage`]; thumbnails are produced in the background
//! and kept in a content-addressed disk cache so an unchanged file is decoded
//! at most once per thumbnail size.
//!
//! # Architecture
//!
//! ```text
//! file ─→ texture (decode) ─→ Pixels ───────────────┐
//!                          └→ Surface / Cube ─→ bridge (GPU) ─→ source::SourceImage
//!                                                                       │
//!              thumbnail worker ─→ cache (hit) or fit + resample + crop ┘
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Pixel buffers, resampling, and pure dimension math |
//! | [`chunk`] | Self-describing binary chunks; the cache entry body |
//! | [`texture`] | Pixel formats, compressed layers and containers, DDS and raster decoders |
//! | [`bridge`] | Turns compressed layers into pixels through a headless GPU round trip |
//! | [`source`] | One loaded image: mip levels or cube faces, alt composite, info record |
//! | [`thumbnail`] | Background thumbnail workers and the process-wide worker limit |
//! | [`cache`] | Cache keys, file identity, and the on-disk thumbnail store |
//! | [`display`] | The texture-host interface the viewer implements |
//! | [`config`] | `config.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Bottom-Up Pixel Rows
//!
//! Every [`imaging::PixelBuffer`] stores row 0 at the bottom, the way the
//! viewer's textures are addressed. Decoders flip top-down sources once, on
//! the way in; nothing downstream needs to care.
//!
//! ## GPU Decode Of Block Compression
//!
//! DXT1/3/5 data is uploaded to a headless [`wgpu`] device and drawn into an
//! RGBA8 target that is read back. The GPU's own decoder is the reference,
//! so there is no software BC decoder to keep in agreement with it.
//! Uncompressed DDS data never touches the GPU.
//!
//! ## Write-Once Cache
//!
//! The cache key covers the absolute path, file size, creation and
//! modification times, thumbnail size, and a format version. Any change to
//! the source produces a new key, so entries never need rewriting and are
//! never evicted. Delete the cache directory to reclaim space.
//!
//! ## Bounded Workers, No Queue
//!
//! At most `max(cores - 2, 2)` thumbnail workers run at once. A request that
//! finds every slot taken is refused rather than queued; the caller asks
//! again on its next pass, which for a viewer means "when the item is still
//! on screen".

pub mod bridge;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod display;
pub mod imaging;
pub mod output;
pub mod source;
pub mod texture;
pub mod thumbnail;

#[cfg(test)]
pub(crate) mod test_helpers;
