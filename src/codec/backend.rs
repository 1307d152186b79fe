//! Codec trait and the decoded source type it hands out.
//!
//! The conversion pipeline never touches pixels itself. It opens a source,
//! asks how many frames it has, and asks for encoded bytes, all through the
//! [`Codec`] trait. The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec); tests use a recording mock.

use super::params::Quality;
use crate::format::Format;
use image::Frame;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Frame {index} out of range (source has {count} frames)")]
    FrameOutOfRange { index: usize, count: usize },
}

/// Pixel size of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A decoded source image: its detected container and every frame.
///
/// Read-only once opened. Frames are full-canvas RGBA with their display
/// delay; a still image is a single frame with no delay.
pub struct SourceImage {
    path: PathBuf,
    format: Option<Format>,
    frames: Vec<Frame>,
    loop_count: u16,
}

impl SourceImage {
    pub fn new(path: impl Into<PathBuf>, format: Option<Format>, frames: Vec<Frame>) -> Self {
        Self {
            path: path.into(),
            format,
            frames,
            loop_count: 0,
        }
    }

    /// Set how often the animation plays, as stored by the container.
    pub fn with_loop_count(mut self, loop_count: u16) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Detected container format, if it is one we know.
    pub fn format(&self) -> Option<Format> {
        self.format
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Result<&Frame, CodecError> {
        self.frames.get(index).ok_or(CodecError::FrameOutOfRange {
            index,
            count: self.frames.len(),
        })
    }

    pub fn dimensions(&self, index: usize) -> Option<Dimensions> {
        self.frames.get(index).map(|f| Dimensions {
            width: f.buffer().width(),
            height: f.buffer().height(),
        })
    }

    /// Container loop count; 0 repeats forever.
    pub fn loop_count(&self) -> u16 {
        self.loop_count
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("frames", &self.frames.len())
            .field("loop_count", &self.loop_count)
            .finish()
    }
}

/// The narrow interface the pipeline uses to read and write images.
///
/// Implementations must be `Sync`: one codec is shared by every worker of a
/// batch.
pub trait Codec: Sync {
    /// Open and decode a source. Fails when the file is missing, unreadable,
    /// or not an image this codec understands.
    fn open(&self, path: &Path) -> Result<SourceImage, CodecError>;

    /// Number of frames in an opened source (at least 1).
    fn frame_count(&self, source: &SourceImage) -> usize {
        source.frame_count()
    }

    /// Encode one frame as a still image in `format`.
    fn encode_frame(
        &self,
        source: &SourceImage,
        index: usize,
        format: Format,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError>;

    /// Encode every frame, keeping per-frame timing, into an animation
    /// container.
    fn encode_animated(
        &self,
        source: &SourceImage,
        format: Format,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError>;
}
