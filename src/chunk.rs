//! Self-describing binary chunk format.
//!
//! A chunk is a little-endian `u32` id, a `u32` payload length, and the
//! payload itself. Payloads may contain nested chunks, so a stream is a tree
//! that a reader can walk without knowing every id: unknown chunks are
//! skipped by length.
//!
//! The only tree this crate writes is a single picture:
//!
//! ```text
//! PICTURE
//! ├── PROPERTIES  format: u32, width: u32, height: u32
//! └── PIXELS      width * height * 4 bytes, bottom row first
//! ```
//!
//! It is the body of every thumbnail cache file (see [`crate::cache`]).

use crate::imaging::{BYTES_PER_PIXEL, Pixel, PixelBuffer, PixelError};
use thiserror::Error;

pub const PICTURE: u32 = 0x0100;
pub const PROPERTIES: u32 = 0x0101;
pub const PIXELS: u32 = 0x0102;

/// Pixel format tag stored in `PROPERTIES`. Only 8-bit RGBA exists.
pub const FORMAT_RGBA8: u32 = 1;

const HEADER_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("chunk stream truncated at byte {0}")]
    Truncated(usize),
    #[error("expected chunk {expected:#06x}, found {found:#06x}")]
    UnexpectedChunk { expected: u32, found: u32 },
    #[error("missing chunk {0:#06x}")]
    MissingChunk(u32),
    #[error("unsupported pixel format tag {0}")]
    UnsupportedFormat(u32),
    #[error("chunk {0:#06x} exceeds 4 GiB")]
    TooLarge(u32),
    #[error("unbalanced chunk nesting")]
    Unbalanced,
    #[error("invalid picture: {0}")]
    Picture(#[from] PixelError),
}

/// Builds a chunk tree into a byte vector, back-patching lengths when each
/// chunk is closed.
#[derive(Debug, Default)]
pub struct ChunkWriter {
    buf: Vec<u8>,
    open: Vec<(u32, usize)>,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, id: u32) {
        self.buf.extend_from_slice(&id.to_le_bytes());
        self.open.push((id, self.buf.len()));
        self.buf.extend_from_slice(&0u32.to_le_bytes());
    }

    pub fn end(&mut self) -> Result<(), ChunkError> {
        let (id, size_at) = self.open.pop().ok_or(ChunkError::Unbalanced)?;
        let len = self.buf.len() - size_at - 4;
        let len = u32::try_from(len).map_err(|_| ChunkError::TooLarge(id))?;
        self.buf[size_at..size_at + 4].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Close out the stream. Every `begin` must have a matching `end`.
    pub fn finish(self) -> Result<Vec<u8>, ChunkError> {
        if !self.open.is_empty() {
            return Err(ChunkError::Unbalanced);
        }
        Ok(self.buf)
    }
}

/// One parsed chunk borrowing its payload from the stream.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub id: u32,
    pub payload: &'a [u8],
    offset: usize,
}

impl<'a> Chunk<'a> {
    /// Nested chunks inside the payload.
    pub fn children(&self) -> ChunkReader<'a> {
        ChunkReader {
            data: self.payload,
            pos: 0,
            base: self.offset + HEADER_LEN,
        }
    }

    /// First direct child with `id`.
    pub fn child(&self, id: u32) -> Result<Chunk<'a>, ChunkError> {
        for chunk in self.children() {
            let chunk = chunk?;
            if chunk.id == id {
                return Ok(chunk);
            }
        }
        Err(ChunkError::MissingChunk(id))
    }

    /// Little-endian `u32` at `index * 4` within the payload.
    pub fn u32_at(&self, index: usize) -> Result<u32, ChunkError> {
        let start = index * 4;
        self.payload
            .get(start..start + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or(ChunkError::Truncated(self.offset + HEADER_LEN + start))
    }
}

/// Iterates sibling chunks in a byte slice.
#[derive(Debug, Clone)]
pub struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ChunkReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }
}

impl<'a> Iterator for ChunkReader<'a> {
    type Item = Result<Chunk<'a>, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let offset = self.pos;
        let Some(header) = self.data.get(offset..offset + HEADER_LEN) else {
            self.pos = self.data.len();
            return Some(Err(ChunkError::Truncated(self.base + offset)));
        };
        let id = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let start = offset + HEADER_LEN;
        let Some(payload) = self.data.get(start..start + len) else {
            self.pos = self.data.len();
            return Some(Err(ChunkError::Truncated(self.base + self.data.len())));
        };
        self.pos = start + len;
        Some(Ok(Chunk {
            id,
            payload,
            offset: self.base + offset,
        }))
    }
}

/// Serialize a picture as a `PICTURE` chunk tree.
pub fn save_picture(picture: &PixelBuffer) -> Result<Vec<u8>, ChunkError> {
    if !picture.is_valid() {
        return Err(PixelError::Empty.into());
    }
    let mut w = ChunkWriter::new();
    w.begin(PICTURE);
    w.begin(PROPERTIES);
    w.write_u32(FORMAT_RGBA8);
    w.write_u32(picture.width());
    w.write_u32(picture.height());
    w.end()?;
    w.begin(PIXELS);
    w.write_bytes(picture.as_bytes());
    w.end()?;
    w.end()?;
    w.finish()
}

/// Parse a picture written by [`save_picture`].
pub fn load_picture(bytes: &[u8]) -> Result<PixelBuffer, ChunkError> {
    let root = ChunkReader::new(bytes)
        .next()
        .ok_or(ChunkError::MissingChunk(PICTURE))??;
    if root.id != PICTURE {
        return Err(ChunkError::UnexpectedChunk {
            expected: PICTURE,
            found: root.id,
        });
    }

    let props = root.child(PROPERTIES)?;
    let format = props.u32_at(0)?;
    if format != FORMAT_RGBA8 {
        return Err(ChunkError::UnsupportedFormat(format));
    }
    let width = props.u32_at(1)?;
    let height = props.u32_at(2)?;

    let pixels = root.child(PIXELS)?;
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or(PixelError::InvalidDimensions { width, height })?;
    if pixels.payload.len() != expected {
        return Err(PixelError::LengthMismatch {
            expected,
            actual: pixels.payload.len(),
        }
        .into());
    }
    let data: Vec<Pixel> = bytemuck::cast_slice(pixels.payload).to_vec();
    Ok(PixelBuffer::from_pixels(width, height, data)?)
}
