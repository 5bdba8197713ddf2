//! Content-addressed on-disk thumbnail cache.
//!
//! Generating a thumbnail means decoding the whole source, which for a
//! block-compressed DDS includes a GPU round trip. This module lets a
//! thumbnail worker skip all of that when the source file has not changed
//! since the thumbnail was last written.
//!
//! # Design
//!
//! ## Cache keys
//!
//! A key is the SHA-256 of:
//!
//! 1. [`CACHE_FORMAT_VERSION`]
//! 2. the absolute source path
//! 3. the file size, creation time and modification time ([`FileIdentity`])
//! 4. the thumbnail target width and height
//!
//! Keys are identity-based rather than content-based: hashing file contents
//! would cost as much I/O as decoding the source. Touching a file, resizing
//! thumbnails in `config.toml`, or moving the file all produce a new key.
//!
//! ## Storage
//!
//! One file per key, `<cache_dir>/<64 hex digits>.bin`, holding a single
//! picture in the [chunk format](crate::chunk). Entries are written once
//! (temp file, then a rename that refuses to clobber) and never rewritten.
//! An entry that fails to parse is [discarded](ThumbnailCache::discard) so
//! the next store can replace it.
//!
//! ## Limitations
//!
//! There is no eviction. Entries for deleted or modified sources stay on
//! disk until removed by hand; bumping [`CACHE_FORMAT_VERSION`] orphans
//! every existing entry.

use crate::chunk::{self, ChunkError};
use crate::imaging::PixelBuffer;
use crate::thumbnail::ThumbnailOutcome;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Version of the cache entry format. Part of every key, so bumping it
/// invalidates all existing entries.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Extension of cache entry files.
const ENTRY_EXTENSION: &str = "bin";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt cache entry: {0}")]
    Chunk(#[from] ChunkError),
}

/// The parts of a file's metadata that stand in for its content.
///
/// Times are nanoseconds since the Unix epoch; a time the platform does not
/// report is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileIdentity {
    pub size: u64,
    pub created: u128,
    pub modified: u128,
}

impl FileIdentity {
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            size: meta.len(),
            created: epoch_nanos(meta.created()),
            modified: epoch_nanos(meta.modified()),
        })
    }
}

fn epoch_nanos(time: io::Result<SystemTime>) -> u128 {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos())
}

/// A 256-bit cache key as 64 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 key for the thumbnail of `path` at `target` size.
///
/// Relative paths are made absolute against the current directory so the
/// same file always maps to the same key.
pub fn hash_thumbnail_key(path: &Path, identity: &FileIdentity, target: (u32, u32)) -> CacheKey {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(CACHE_FORMAT_VERSION.to_le_bytes());
    hasher.update(absolute.as_os_str().as_encoded_bytes());
    hasher.update(b"\0");
    hasher.update(identity.size.to_le_bytes());
    hasher.update(identity.created.to_le_bytes());
    hasher.update(identity.modified.to_le_bytes());
    hasher.update(target.0.to_le_bytes());
    hasher.update(target.1.to_le_bytes());
    CacheKey(format!("{:x}", hasher.finalize()))
}

/// Directory of cache entries.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
}

impl ThumbnailCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXTENSION}"))
    }

    /// The cached thumbnail for `key`, or `None` if there is no entry.
    pub fn load(&self, key: &CacheKey) -> Result<Option<PixelBuffer>, CacheError> {
        let bytes = match std::fs::read(self.entry_path(key)) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(chunk::load_picture(&bytes)?))
    }

    /// Write `picture` under `key` unless an entry already exists.
    ///
    /// Returns whether a new entry was written. The entry appears atomically:
    /// readers see either no file or the complete one. The temp file is
    /// removed on every error path.
    pub fn store(&self, key: &CacheKey, picture: &PixelBuffer) -> Result<bool, CacheError> {
        let bytes = chunk::save_picture(picture)?;
        std::fs::create_dir_all(&self.dir)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        match tmp.persist_noclobber(self.entry_path(key)) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(key = %key, "cache entry already present");
                Ok(false)
            }
            Err(e) => Err(e.error.into()),
        }
    }

    /// Remove the entry for `key`, if any.
    pub fn discard(&self, key: &CacheKey) -> Result<(), CacheError> {
        match std::fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Per-run tally of thumbnail outcomes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailStats {
    pub cached: u32,
    pub generated: u32,
    pub failed: u32,
}

impl ThumbnailStats {
    pub fn record(&mut self, outcome: ThumbnailOutcome) {
        match outcome {
            ThumbnailOutcome::Cached => self.cached += 1,
            ThumbnailOutcome::Generated => self.generated += 1,
            ThumbnailOutcome::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.cached + self.generated + self.failed
    }
}

impl fmt::Display for ThumbnailStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cached, {} generated, {} failed",
            self.cached, self.generated, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Pixel;
    use std::fs;
    use tempfile::TempDir;

    fn identity() -> FileIdentity {
        FileIdentity {
            size: 1024,
            created: 1_700_000_000_000_000_000,
            modified: 1_700_000_100_000_000_000,
        }
    }

    fn picture() -> PixelBuffer {
        PixelBuffer::new(4, 2, Pixel::new(1, 2, 3, 4))
    }

    // =========================================================================
    // Keys
    // =========================================================================

    #[test]
    fn key_is_deterministic_hex() {
        let a = hash_thumbnail_key(Path::new("/photos/a.dds"), &identity(), (256, 144));
        let b = hash_thumbnail_key(Path::new("/photos/a.dds"), &identity(), (256, 144));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn key_varies_with_every_input() {
        let base = hash_thumbnail_key(Path::new("/a.png"), &identity(), (256, 144));

        let moved = hash_thumbnail_key(Path::new("/b.png"), &identity(), (256, 144));
        let resized = hash_thumbnail_key(
            Path::new("/a.png"),
            &FileIdentity {
                size: 2048,
                ..identity()
            },
            (256, 144),
        );
        let recreated = hash_thumbnail_key(
            Path::new("/a.png"),
            &FileIdentity {
                created: 1,
                ..identity()
            },
            (256, 144),
        );
        let touched = hash_thumbnail_key(
            Path::new("/a.png"),
            &FileIdentity {
                modified: 1,
                ..identity()
            },
            (256, 144),
        );
        let wider = hash_thumbnail_key(Path::new("/a.png"), &identity(), (257, 144));
        let taller = hash_thumbnail_key(Path::new("/a.png"), &identity(), (256, 145));

        for other in [moved, resized, recreated, touched, wider, taller] {
            assert_ne!(base, other);
        }
    }

    #[test]
    fn relative_and_absolute_paths_share_a_key() {
        let cwd = std::env::current_dir().unwrap();
        let rel = hash_thumbnail_key(Path::new("img.png"), &identity(), (8, 8));
        let abs = hash_thumbnail_key(&cwd.join("img.png"), &identity(), (8, 8));
        assert_eq!(rel, abs);
    }

    #[test]
    fn identity_reads_size_and_times() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.bin");
        fs::write(&path, b"hello").unwrap();
        let id = FileIdentity::of(&path).unwrap();
        assert_eq!(id.size, 5);
        assert!(id.modified > 0);
        assert_eq!(id, FileIdentity::of(&path).unwrap());
    }

    #[test]
    fn identity_of_missing_file_is_error() {
        assert!(FileIdentity::of(Path::new("/nonexistent/texview")).is_err());
    }

    // =========================================================================
    // Store / load
    // =========================================================================

    #[test]
    fn entry_path_is_hex_dot_bin() {
        let cache = ThumbnailCache::new("/cache");
        let key = hash_thumbnail_key(Path::new("/a.png"), &identity(), (8, 8));
        let path = cache.entry_path(&key);
        assert_eq!(path.parent(), Some(Path::new("/cache")));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("bin"));
        assert_eq!(path.file_stem().unwrap().len(), 64);
    }

    #[test]
    fn store_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(tmp.path().join("nested/cache"));
        let key = hash_thumbnail_key(Path::new("/a.png"), &identity(), (4, 2));

        assert!(cache.store(&key, &picture()).unwrap());
        assert_eq!(cache.load(&key).unwrap(), Some(picture()));
    }

    #[test]
    fn store_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(tmp.path());
        let key = hash_thumbnail_key(Path::new("/a.png"), &identity(), (4, 2));

        assert!(cache.store(&key, &picture()).unwrap());
        let other = PixelBuffer::new(4, 2, Pixel::WHITE);
        assert!(!cache.store(&key, &other).unwrap());
        assert_eq!(cache.load(&key).unwrap(), Some(picture()));
    }

    #[test]
    fn store_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(tmp.path());
        let key = hash_thumbnail_key(Path::new("/a.png"), &identity(), (4, 2));
        cache.store(&key, &picture()).unwrap();

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn store_rejects_empty_picture() {
        let tmp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(tmp.path());
        let key = hash_thumbnail_key(Path::new("/a.png"), &identity(), (4, 2));
        assert!(matches!(
            cache.store(&key, &PixelBuffer::default()),
            Err(CacheError::Chunk(_))
        ));
        assert!(!cache.entry_path(&key).exists());
    }

    #[test]
    fn load_missing_entry_is_none() {
        let tmp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(tmp.path());
        let key = hash_thumbnail_key(Path::new("/a.png"), &identity(), (4, 2));
        assert_eq!(cache.load(&key).unwrap(), None);
    }

    #[test]
    fn load_corrupt_entry_is_error() {
        let tmp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(tmp.path());
        let key = hash_thumbnail_key(Path::new("/a.png"), &identity(), (4, 2));
        fs::write(cache.entry_path(&key), b"not a chunk").unwrap();
        assert!(matches!(cache.load(&key), Err(CacheError::Chunk(_))));
    }

    #[test]
    fn discarded_corrupt_entry_can_be_replaced() {
        let tmp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(tmp.path());
        let key = hash_thumbnail_key(Path::new("/a.png"), &identity(), (4, 2));
        fs::write(cache.entry_path(&key), b"not a chunk").unwrap();
        assert!(!cache.store(&key, &picture()).unwrap());

        cache.discard(&key).unwrap();
        assert_eq!(cache.load(&key).unwrap(), None);
        assert!(cache.store(&key, &picture()).unwrap());
        assert_eq!(cache.load(&key).unwrap(), Some(picture()));
    }

    #[test]
    fn discard_missing_entry_is_ok() {
        let tmp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(tmp.path());
        let key = hash_thumbnail_key(Path::new("/a.png"), &identity(), (4, 2));
        cache.discard(&key).unwrap();
    }

    #[test]
    fn concurrent_stores_write_one_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(tmp.path());
        let key = hash_thumbnail_key(Path::new("/a.png"), &identity(), (4, 2));

        let written = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8u8)
                .map(|i| {
                    let (cache, key) = (&cache, &key);
                    s.spawn(move || {
                        let shade = PixelBuffer::new(4, 2, Pixel::new(i, i, i, 255));
                        cache.store(key, &shade).unwrap()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().is_ok_and(|w| w))
                .filter(|&w| w)
                .count()
        });
        assert_eq!(written, 1);

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1, "{names:?}");
    }

    #[test]
    fn blocked_store_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(tmp.path());
        let key = hash_thumbnail_key(Path::new("/a.png"), &identity(), (4, 2));
        // A directory squatting on the entry path blocks the final rename.
        fs::create_dir(cache.entry_path(&key)).unwrap();
        fs::write(cache.entry_path(&key).join("occupant"), b"").unwrap();

        let _ = cache.store(&key, &picture());

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1, "{names:?}");
    }

    // =========================================================================
    // ThumbnailStats
    // =========================================================================

    #[test]
    fn stats_record_and_display() {
        let mut s = ThumbnailStats::default();
        s.record(ThumbnailOutcome::Cached);
        s.record(ThumbnailOutcome::Cached);
        s.record(ThumbnailOutcome::Generated);
        s.record(ThumbnailOutcome::Failed);
        assert_eq!(s.total(), 4);
        assert_eq!(format!("{}", s), "2 cached, 1 generated, 1 failed");
    }
}
