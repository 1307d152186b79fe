//! A single conversion: one source, one target, one outcome.
//!
//! [`execute`] opens the source through the codec, resolves the effective
//! animation mode from the frame count and the target's capability row, and
//! writes one file, one file per frame, or nothing:
//!
//! | Mode | Writes |
//! |---|---|
//! | `SingleFrame` | frame 0 as `name.ext` |
//! | `AnimatedPassthrough` | every frame with timing as `name.ext` |
//! | `FrameSplit` | `name_0000.ext` … one per frame |
//! | `Skip` | nothing |
//!
//! Every failure (unreadable source, encode error, write error, no free
//! output name, even a panic inside the codec) is turned into a
//! [`ConversionOutcome::Failed`] for this job only. A failed frame split
//! removes the frames it already wrote.

use crate::codec::{Codec, CodecError, Quality, SourceImage};
use crate::format::{Format, FormatError};
use crate::naming::{OutputShape, PathClaims, PathCollision};
use crate::policy::{self, AnimationPolicy, EffectiveMode};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error(transparent)]
    UnknownFormat(#[from] FormatError),
    #[error("Source unreadable: {0}")]
    SourceUnreadable(#[source] CodecError),
    #[error("Encoding failed: {0}")]
    Encode(#[source] CodecError),
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    PathCollision(#[from] PathCollision),
    #[error("Conversion panicked: {0}")]
    Internal(String),
}

/// Serializable tag for each [`ConversionError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownFormat,
    SourceUnreadable,
    EncodeError,
    IoError,
    PathCollision,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::UnknownFormat => "unknown format",
            ErrorKind::SourceUnreadable => "source unreadable",
            ErrorKind::EncodeError => "encode error",
            ErrorKind::IoError => "write error",
            ErrorKind::PathCollision => "path collision",
            ErrorKind::Internal => "internal error",
        })
    }
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::UnknownFormat(_) => ErrorKind::UnknownFormat,
            ConversionError::SourceUnreadable(_) => ErrorKind::SourceUnreadable,
            ConversionError::Encode(_) => ErrorKind::EncodeError,
            ConversionError::Io { .. } => ErrorKind::IoError,
            ConversionError::PathCollision(_) => ErrorKind::PathCollision,
            ConversionError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// What every job in a batch converts to. Immutable and shared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub format: Format,
    /// Only honored when the format's capability row says so.
    pub quality: Quality,
    pub animation: AnimationPolicy,
}

impl TargetSpec {
    pub fn new(format: Format, quality: Quality, animation: AnimationPolicy) -> Self {
        Self {
            format,
            quality,
            animation,
        }
    }

    /// Build a target from a format identifier such as `"jpg"` or `"WEBP"`.
    pub fn parse(
        identifier: &str,
        quality: Quality,
        animation: AnimationPolicy,
    ) -> Result<Self, ConversionError> {
        Ok(Self::new(identifier.parse()?, quality, animation))
    }
}

/// The unit of work: one source converted to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub target: TargetSpec,
    /// Where outputs go; `None` means next to the source.
    pub output_dir: Option<PathBuf>,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>, target: TargetSpec, output_dir: Option<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target,
            output_dir,
        }
    }
}

/// Why a job produced no output without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Animated source, still-only target, and the policy said skip.
    AnimationUnsupported,
    /// The batch was cancelled before this job was dispatched.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::AnimationUnsupported => "target format does not support animation",
            SkipReason::Cancelled => "batch cancelled before this job started",
        })
    }
}

/// The single terminal result of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Success {
        outputs: Vec<PathBuf>,
        mode: EffectiveMode,
        source_frames: usize,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

impl ConversionOutcome {
    pub fn failed(error: &ConversionError) -> Self {
        ConversionOutcome::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ConversionOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ConversionOutcome::Failed { .. })
    }

    /// Files written by the job (empty unless it succeeded).
    pub fn outputs(&self) -> &[PathBuf] {
        match self {
            ConversionOutcome::Success { outputs, .. } => outputs,
            _ => &[],
        }
    }
}

/// Run one job to its outcome. Never panics and never returns an error:
/// every failure becomes [`ConversionOutcome::Failed`].
pub fn execute(job: &ConversionJob, codec: &impl Codec, claims: &PathClaims) -> ConversionOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| run(job, codec, claims)))
        .unwrap_or_else(|payload| Err(ConversionError::Internal(panic_message(&*payload))));

    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(source = %job.source.display(), kind = %e.kind(), "conversion failed: {e}");
            ConversionOutcome::failed(&e)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn run(
    job: &ConversionJob,
    codec: &impl Codec,
    claims: &PathClaims,
) -> Result<ConversionOutcome, ConversionError> {
    let source = codec
        .open(&job.source)
        .map_err(ConversionError::SourceUnreadable)?;
    let frames = codec.frame_count(&source);
    let TargetSpec {
        format,
        quality,
        animation,
    } = job.target;
    let mode = policy::resolve(frames, format.capabilities().supports_animation, animation);
    debug!(source = %job.source.display(), frames, %mode, target = %format, "resolved mode");

    let output_dir = job.output_dir.as_deref();
    let outputs = match mode {
        EffectiveMode::Skip => {
            return Ok(ConversionOutcome::Skipped {
                reason: SkipReason::AnimationUnsupported,
            });
        }
        EffectiveMode::SingleFrame => {
            let bytes = codec
                .encode_frame(&source, 0, format, quality)
                .map_err(ConversionError::Encode)?;
            let paths = claims.claim(&job.source, format, output_dir, OutputShape::Single)?;
            write_output(&paths[0], &bytes)?;
            paths
        }
        EffectiveMode::AnimatedPassthrough => {
            let bytes = codec
                .encode_animated(&source, format, quality)
                .map_err(ConversionError::Encode)?;
            let paths = claims.claim(&job.source, format, output_dir, OutputShape::Single)?;
            write_output(&paths[0], &bytes)?;
            paths
        }
        EffectiveMode::FrameSplit => {
            let paths =
                claims.claim(&job.source, format, output_dir, OutputShape::Frames(frames))?;
            write_frames(codec, &source, &paths, format, quality)?;
            paths
        }
    };

    Ok(ConversionOutcome::Success {
        outputs,
        mode,
        source_frames: frames,
    })
}

/// Write one output file, creating its directory. A partially written file
/// is removed on failure.
fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ConversionError> {
    let io_error = |source| ConversionError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    if let Err(e) = std::fs::write(path, bytes) {
        let _ = std::fs::remove_file(path);
        return Err(io_error(e));
    }
    Ok(())
}

/// Encode and write frames one at a time, so only one encoded frame is held
/// in memory. On failure the frames already written are removed.
fn write_frames(
    codec: &impl Codec,
    source: &SourceImage,
    paths: &[PathBuf],
    format: Format,
    quality: Quality,
) -> Result<(), ConversionError> {
    for (index, path) in paths.iter().enumerate() {
        let result = codec
            .encode_frame(source, index, format, quality)
            .map_err(ConversionError::Encode)
            .and_then(|bytes| write_output(path, &bytes));
        if let Err(e) = result {
            for written in &paths[..index] {
                let _ = std::fs::remove_file(written);
            }
            return Err(e);
        }
    }
    Ok(())
}
