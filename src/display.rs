//! The display side's texture handles.
//!
//! Whatever draws images on screen implements [`TextureHost`]. This crate
//! only ever uploads finished pixel buffers and releases what it uploaded;
//! it never assumes a particular graphics API.

use crate::imaging::PixelBuffer;
use std::num::NonZeroU64;

/// Handle to a texture owned by a [`TextureHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(NonZeroU64);

impl TextureId {
    /// `None` for zero, the host's "no texture" value.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

pub trait TextureHost {
    /// Upload `picture`, returning `None` if the host could not create a
    /// texture.
    fn upload(&mut self, picture: &PixelBuffer) -> Option<TextureId>;

    fn release(&mut self, id: TextureId);
}
