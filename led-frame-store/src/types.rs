//! Core types for the frame store library
//!
//! This module defines the decoded in-memory representation handed to callers
//! and the error taxonomy shared by every store operation. Nothing here performs
//! I/O.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for frame store operations
pub type Result<T> = std::result::Result<T, FrameStoreError>;

/// Size in bytes of one encoded color triple
pub const COLOR_TRIPLE_SIZE: usize = 3;

/// One LED or fiber color, stored in green, red, blue order on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorTriple {
    pub g: u8,
    pub r: u8,
    pub b: u8,
}

impl ColorTriple {
    /// Build a triple from on-disk (g, r, b) order
    pub const fn new(g: u8, r: u8, b: u8) -> Self {
        Self { g, r, b }
    }

    /// Build a triple from conventional (r, g, b) order
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { g, r, b }
    }

    /// Bytes in on-disk order
    pub const fn to_bytes(self) -> [u8; COLOR_TRIPLE_SIZE] {
        [self.g, self.r, self.b]
    }

    pub const fn from_bytes(bytes: [u8; COLOR_TRIPLE_SIZE]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }

    pub fn is_off(&self) -> bool {
        self.g == 0 && self.r == 0 && self.b == 0
    }
}

impl fmt::Display for ColorTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G={:03}, R={:03}, B={:03}", self.g, self.r, self.b)
    }
}

/// A single decoded frame
///
/// Records are owned by the caller once returned. The store never keeps a
/// reference to a record it has handed out; [`crate::FrameStore::next_into`]
/// overwrites a caller-owned buffer in place instead of allocating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Playback time marker, non-decreasing across the file
    pub timestamp: u64,
    /// Whether the consumer should cross-fade from the previous frame
    pub fade: bool,
    /// One color per fiber channel
    pub fiber_colors: Vec<ColorTriple>,
    /// One color sequence per strip, each sized to that strip's LED count
    pub strip_colors: Vec<Vec<ColorTriple>>,
}

impl FrameRecord {
    /// Total number of color triples held by this record
    pub fn color_count(&self) -> usize {
        self.fiber_colors.len() + self.strip_colors.iter().map(Vec::len).sum::<usize>()
    }

    /// Color of a single LED, if the strip and LED exist
    pub fn led(&self, strip: usize, led: usize) -> Option<ColorTriple> {
        self.strip_colors.get(strip)?.get(led).copied()
    }
}

/// Errors that can occur while opening or reading a frame store
#[derive(Debug, thiserror::Error)]
pub enum FrameStoreError {
    #[error("Malformed control record: {0}")]
    MalformedControl(String),

    #[error("Frame layout overflow: {0}")]
    LayoutOverflow(String),

    #[error("Frame file length {file_len} is not a multiple of record size {record_size}")]
    TruncatedFrameFile { file_len: u64, record_size: usize },

    #[error("Frame read failed at record {index}: {source}")]
    IoFailure {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("End of frame stream")]
    EndOfStream,

    #[error("No frame at or before timestamp {0}")]
    NotFound(u64),

    #[error("Index {index} out of range (limit {limit})")]
    IndexOutOfRange { index: usize, limit: usize },

    #[error("Frame store is closed")]
    StoreClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameStoreError {
    /// Whether the session can continue after this error
    ///
    /// `EndOfStream` and `NotFound` are expected outcomes; `IndexOutOfRange`
    /// and `StoreClosed` are caller mistakes that leave the store untouched.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameStoreError::EndOfStream
                | FrameStoreError::NotFound(_)
                | FrameStoreError::IndexOutOfRange { .. }
                | FrameStoreError::StoreClosed
        )
    }

    /// True for the normal sequential termination signal
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, FrameStoreError::EndOfStream)
    }
}
