//! Background thumbnail generation.
//!
//! A [`SourceImage`] asks for its thumbnail with
//! [`SourceImage::request_thumbnail`]. If the [`WorkerGovernor`] admits the
//! request a worker thread runs [`ThumbnailPipeline::generate`] for the
//! image's path; otherwise the request is simply not taken and the caller
//! may ask again later. Nothing is queued.
//!
//! ## Worker procedure
//!
//! ```text
//! file identity ─→ cache key ─→ cache hit?  ── yes ─→ done (Cached)
//!                                  │ no
//!                                  ▼
//!            decode into a private SourceImage (own decode session)
//!                                  ▼
//!            fit to target ─→ resample ─→ centre-crop (transparent pad)
//!                                  ▼
//!            store in cache (best effort) ─→ done (Generated)
//! ```
//!
//! Any failure along the way leaves the thumbnail invalid; it is logged and
//! never propagated to the owner.
//!
//! ## Handoff
//!
//! The worker's last act is setting a done flag with release ordering. The
//! owner polls it with acquire ordering (see
//! [`SourceImage::poll_thumbnail`]) and only then joins the worker, which by
//! then has already returned. Dropping a `SourceImage` with a worker in
//! flight blocks until that worker finishes; there is no cancellation.

mod governor;

pub use governor::{WorkerGovernor, WorkerPermit, worker_limit};

use crate::bridge::{BridgeError, DecodeBridge};
use crate::cache::{FileIdentity, ThumbnailCache, hash_thumbnail_key};
use crate::display::{TextureHost, TextureId};
use crate::imaging::{Pixel, PixelBuffer, PixelError, ResampleFilter, thumbnail_fit_dimensions};
use crate::source::{LoadError, SourceImage};
use crate::texture::{DecodeError, decode_file};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, warn};

/// Filter used for every thumbnail.
pub const THUMBNAIL_FILTER: ResampleFilter = ResampleFilter::Bilinear;

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("cannot stat source: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("cannot open decode session: {0}")]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Pixels(#[from] PixelError),
}

/// How a finished worker got its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailOutcome {
    Cached,
    Generated,
    Failed,
}

/// What the owner sees when it polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailStatus {
    NotRequested,
    Running,
    Ready,
    Failed,
}

/// Everything a worker needs. Cheap to clone; clones share the governor,
/// cache and bridge.
#[derive(Clone)]
pub struct ThumbnailPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    governor: WorkerGovernor,
    cache: ThumbnailCache,
    bridge: Arc<dyn DecodeBridge>,
    target: (u32, u32),
}

impl ThumbnailPipeline {
    pub fn new(
        governor: WorkerGovernor,
        cache: ThumbnailCache,
        bridge: Arc<dyn DecodeBridge>,
        target: (u32, u32),
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                governor,
                cache,
                bridge,
                target,
            }),
        }
    }

    pub fn governor(&self) -> &WorkerGovernor {
        &self.inner.governor
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.inner.cache
    }

    /// Thumbnail size as (width, height).
    pub fn target(&self) -> (u32, u32) {
        self.inner.target
    }

    /// Produce the thumbnail for `path` on the calling thread.
    ///
    /// Never fails: problems are logged and reported as
    /// [`ThumbnailOutcome::Failed`] with an empty buffer.
    pub fn generate(&self, path: &Path) -> (PixelBuffer, ThumbnailOutcome) {
        match self.try_generate(path) {
            Ok(result) => result,
            Err(e) => {
                warn!(path = %path.display(), "thumbnail failed: {e}");
                (PixelBuffer::default(), ThumbnailOutcome::Failed)
            }
        }
    }

    fn try_generate(&self, path: &Path) -> Result<(PixelBuffer, ThumbnailOutcome), ThumbnailError> {
        let identity = FileIdentity::of(path)?;
        let key = hash_thumbnail_key(path, &identity, self.inner.target);
        let cache = &self.inner.cache;

        match cache.load(&key) {
            Ok(Some(picture)) => {
                debug!(path = %path.display(), key = %key, "thumbnail cache hit");
                return Ok((picture, ThumbnailOutcome::Cached));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(key = %key, "unreadable cache entry, regenerating: {e}");
                if let Err(e) = cache.discard(&key) {
                    warn!(key = %key, "cannot remove cache entry: {e}");
                }
            }
        }

        let picture = self.render(path)?;
        match cache.store(&key, &picture) {
            Ok(_) => debug!(path = %path.display(), key = %key, "thumbnail generated"),
            Err(e) => warn!(key = %key, "cannot write cache entry: {e}"),
        }
        Ok((picture, ThumbnailOutcome::Generated))
    }

    fn render(&self, path: &Path) -> Result<PixelBuffer, ThumbnailError> {
        let (kind, decoded) = decode_file(path)?;
        let mut image = SourceImage::new(path);
        {
            let session = if decoded.needs_hardware() {
                Some(self.inner.bridge.open_session()?)
            } else {
                None
            };
            let bridge = session.as_deref().unwrap_or(self.inner.bridge.as_ref());
            image.load_decoded(kind, decoded, bridge)?;
        }
        let mut picture = image.into_base().ok_or(PixelError::Empty)?;

        let (target_w, target_h) = self.inner.target;
        let (w, h) = thumbnail_fit_dimensions((picture.width(), picture.height()), self.inner.target);
        picture.resample(w, h, THUMBNAIL_FILTER)?;
        picture.crop(target_w, target_h, Pixel::TRANSPARENT)?;
        Ok(picture)
    }
}

struct Worker {
    done: Arc<AtomicBool>,
    handle: JoinHandle<(PixelBuffer, ThumbnailOutcome)>,
}

/// Sets the done flag when dropped, so a panicking worker still reports.
struct DoneSignal(Arc<AtomicBool>);

impl Drop for DoneSignal {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Per-image thumbnail bookkeeping.
#[derive(Default)]
pub(crate) struct ThumbnailState {
    requested: bool,
    picture: PixelBuffer,
    outcome: Option<ThumbnailOutcome>,
    texture: Option<TextureId>,
    worker: Option<Worker>,
}

impl ThumbnailState {
    fn request(&mut self, path: &Path, pipeline: &ThumbnailPipeline) -> bool {
        if self.requested {
            return true;
        }
        let Some(permit) = pipeline.governor().try_admit() else {
            debug!(path = %path.display(), "thumbnail deferred, all workers busy");
            return false;
        };

        let done = Arc::new(AtomicBool::new(false));
        let signal = DoneSignal(Arc::clone(&done));
        let worker_pipeline = pipeline.clone();
        let worker_path: PathBuf = path.to_path_buf();
        let spawned = thread::Builder::new()
            .name("thumbnail".into())
            .spawn(move || {
                // Dropped in reverse order: the slot is freed, then done is set.
                let _signal = signal;
                let _permit = permit;
                worker_pipeline.generate(&worker_path)
            });

        match spawned {
            Ok(handle) => {
                self.requested = true;
                self.worker = Some(Worker { done, handle });
                true
            }
            Err(e) => {
                warn!(path = %path.display(), "cannot start thumbnail worker: {e}");
                false
            }
        }
    }

    fn poll(&mut self) -> ThumbnailStatus {
        let finished = |w: &Worker| w.done.load(Ordering::Acquire);
        if self.worker.as_ref().is_some_and(|w| !finished(w)) {
            return ThumbnailStatus::Running;
        }
        if let Some(worker) = self.worker.take() {
            match worker.handle.join() {
                Ok((picture, outcome)) => {
                    self.picture = picture;
                    self.outcome = Some(outcome);
                }
                Err(_) => {
                    warn!("thumbnail worker panicked");
                    self.outcome = Some(ThumbnailOutcome::Failed);
                }
            }
        }
        self.status()
    }

    fn status(&self) -> ThumbnailStatus {
        if !self.requested {
            ThumbnailStatus::NotRequested
        } else if self.worker.is_some() {
            ThumbnailStatus::Running
        } else if self.picture.is_valid() {
            ThumbnailStatus::Ready
        } else {
            ThumbnailStatus::Failed
        }
    }

    fn unrequest(&mut self) -> bool {
        if !self.requested || self.worker.is_some() || self.picture.is_valid() {
            return false;
        }
        self.requested = false;
        self.outcome = None;
        true
    }
}

impl Drop for ThumbnailState {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            debug!("waiting for thumbnail worker");
            if worker.handle.join().is_err() {
                warn!("thumbnail worker panicked");
            }
        }
    }
}

impl SourceImage {
    /// Ask for a thumbnail in the background.
    ///
    /// Returns `true` if a request is in place (new or earlier), `false` if
    /// every worker slot is taken. A refused request is forgotten; call again
    /// later to retry.
    pub fn request_thumbnail(&mut self, pipeline: &ThumbnailPipeline) -> bool {
        let path = self.path().to_path_buf();
        self.thumbnail.request(&path, pipeline)
    }

    /// Check on the worker without blocking. Collects its result the first
    /// time it is seen finished.
    pub fn poll_thumbnail(&mut self) -> ThumbnailStatus {
        self.thumbnail.poll()
    }

    /// Texture for the finished thumbnail, or `None` while it is not
    /// available. Uploads on first use.
    pub fn bind_thumbnail(&mut self, host: &mut dyn TextureHost) -> Option<TextureId> {
        if self.thumbnail.poll() != ThumbnailStatus::Ready {
            return None;
        }
        let state = &mut self.thumbnail;
        if state.texture.is_none() {
            state.texture = host.upload(&state.picture);
        }
        state.texture
    }

    pub fn unbind_thumbnail(&mut self, host: &mut dyn TextureHost) {
        if let Some(id) = self.thumbnail.texture.take() {
            host.release(id);
        }
    }

    /// Forget a request that finished without a thumbnail so it can be made
    /// again. Returns whether the request was reset.
    pub fn unrequest_thumbnail(&mut self) -> bool {
        self.thumbnail.unrequest()
    }

    pub fn is_thumbnail_requested(&self) -> bool {
        self.thumbnail.requested
    }

    /// True from admission until the finished worker has been polled.
    pub fn is_thumbnail_running(&self) -> bool {
        self.thumbnail.worker.is_some()
    }

    /// The collected thumbnail, if one was produced.
    pub fn thumbnail(&self) -> Option<&PixelBuffer> {
        self.thumbnail
            .picture
            .is_valid()
            .then_some(&self.thumbnail.picture)
    }

    pub fn thumbnail_outcome(&self) -> Option<ThumbnailOutcome> {
        self.thumbnail.outcome
    }
}
