//! Output path derivation and batch-wide collision avoidance.
//!
//! ## Naming
//!
//! An output name is the source file name with its extension replaced by
//! the target format's canonical extension. Frame-split outputs get a
//! zero-padded frame suffix before the extension:
//!
//! ```text
//! photos/dawn.png   → photos/dawn.jpg
//! photos/spin.gif   → photos/spin_0000.jpg, photos/spin_0001.jpg, ...
//! ```
//!
//! The directory is the override when one is given, else the source's own
//! directory.
//!
//! ## Collisions
//!
//! [`PathClaims`] is the batch-scoped registry of paths already handed out.
//! When the plain name is taken, a `_N` counter is appended to the base name
//! (before any frame suffix), so every file of one job shares the same base:
//!
//! ```text
//! a/dawn.png → out/dawn.jpg
//! b/dawn.gif → out/dawn_1.jpg
//! c/dawn.bmp → out/dawn_2_0000.jpg, out/dawn_2_0001.jpg
//! ```
//!
//! A path counts as taken when another job already claimed it, when it is
//! one of the batch's reserved source paths, or (unless overwriting is
//! allowed) when a file already exists there.

use crate::format::Format;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Highest `_N` counter tried before giving up.
pub const MAX_DISAMBIGUATION: u32 = 9999;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No free output path for {} after {attempts} attempts", base.display())]
pub struct PathCollision {
    /// The undisambiguated first candidate.
    pub base: PathBuf,
    pub attempts: u32,
}

/// Directory outputs for `source` land in.
pub fn output_dir(source: &Path, override_dir: Option<&Path>) -> PathBuf {
    match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
    }
}

/// Source file name without its extension.
fn base_name(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

fn build_path(
    dir: &Path,
    base: &str,
    counter: Option<u32>,
    frame_index: Option<usize>,
    format: Format,
) -> PathBuf {
    let mut name = base.to_string();
    if let Some(n) = counter {
        name.push_str(&format!("_{n}"));
    }
    if let Some(i) = frame_index {
        name.push_str(&format!("_{i:04}"));
    }
    name.push('.');
    name.push_str(format.extension());
    dir.join(name)
}

/// Derive the undisambiguated destination path for one output file.
///
/// `frame_index` is only given for frame-split outputs.
pub fn resolve(
    source: &Path,
    format: Format,
    override_dir: Option<&Path>,
    frame_index: Option<usize>,
) -> PathBuf {
    build_path(
        &output_dir(source, override_dir),
        &base_name(source),
        None,
        frame_index,
        format,
    )
}

/// The file set one job will write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    /// One output file.
    Single,
    /// One indexed file per frame.
    Frames(usize),
}

/// Batch-scoped registry of output paths already handed out.
#[derive(Debug, Default)]
pub struct PathClaims {
    claimed: Mutex<HashSet<PathBuf>>,
    reserved: HashSet<PathBuf>,
    overwrite_existing: bool,
}

impl PathClaims {
    pub fn new(overwrite_existing: bool) -> Self {
        Self {
            overwrite_existing,
            ..Self::default()
        }
    }

    /// Mark paths no job may ever write to (the batch's own sources).
    pub fn with_reserved(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.reserved.extend(paths);
        self
    }

    /// Number of output paths claimed so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_free(&self, claimed: &HashSet<PathBuf>, source: &Path, path: &Path) -> bool {
        path != source
            && !claimed.contains(path)
            && !self.reserved.contains(path)
            && (self.overwrite_existing || !path.exists())
    }

    /// Atomically claim every path of one job's output set.
    ///
    /// All returned paths share one base name; for [`OutputShape::Frames`]
    /// they are ordered by frame index. Either the whole set is claimed or
    /// nothing is.
    pub fn claim(
        &self,
        source: &Path,
        format: Format,
        override_dir: Option<&Path>,
        shape: OutputShape,
    ) -> Result<Vec<PathBuf>, PathCollision> {
        let dir = output_dir(source, override_dir);
        let base = base_name(source);
        let candidates = |counter: Option<u32>| -> Vec<PathBuf> {
            match shape {
                OutputShape::Single => vec![build_path(&dir, &base, counter, None, format)],
                OutputShape::Frames(n) => (0..n)
                    .map(|i| build_path(&dir, &base, counter, Some(i), format))
                    .collect(),
            }
        };

        let mut claimed = self.lock();
        for attempt in 0..=MAX_DISAMBIGUATION {
            let counter = (attempt > 0).then_some(attempt);
            let paths = candidates(counter);
            if paths.iter().all(|p| self.is_free(&claimed, source, p)) {
                claimed.extend(paths.iter().cloned());
                return Ok(paths);
            }
        }

        Err(PathCollision {
            base: build_path(&dir, &base, None, None, format),
            attempts: MAX_DISAMBIGUATION + 1,
        })
    }
}
