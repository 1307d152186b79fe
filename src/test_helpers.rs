//! Shared test utilities: synthetic fixture images and report lookups.
//!
//! Fixtures are generated on the fly with the `image` encoders so tests never
//! depend on checked-in binaries.
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let gif = tmp.path().join("spin.gif");
//! write_animated_gif(&gif, 10, 16, 16);
//! ```

use crate::batch::BatchReport;
use crate::job::ConversionOutcome;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat, Rgba, RgbaImage};
use std::path::{Path, PathBuf};

// =========================================================================
// Fixture images
// =========================================================================

/// A half-transparent checkerboard, so alpha handling is observable.
pub fn checker_rgba(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            Rgba([(x % 256) as u8, (y % 256) as u8, 200, 255])
        } else {
            Rgba([30, 60, 90, 0])
        }
    })
}

/// Write a PNG regardless of the extension `path` carries.
pub fn write_png(path: &Path, width: u32, height: u32) {
    checker_rgba(width, height)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

/// Write a looping GIF with `frames` visibly different frames, 80ms each.
pub fn write_animated_gif(path: &Path, frames: usize, width: u32, height: u32) {
    write_timed_gif(path, &vec![80; frames], Repeat::Infinite, width, height);
}

/// Write a GIF with one frame per entry of `delays_ms` and the given repeat.
///
/// Delays should be multiples of 10ms; GIF stores centiseconds.
pub fn write_timed_gif(path: &Path, delays_ms: &[u32], repeat: Repeat, width: u32, height: u32) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(repeat).unwrap();
    let frames = delays_ms.iter().enumerate().map(|(i, &delay)| {
        let shade = (i * 40 % 256) as u8;
        let buffer = RgbaImage::from_pixel(width, height, Rgba([shade, 255 - shade, 0, 255]));
        Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(delay, 1))
    });
    encoder.encode_frames(frames).unwrap();
}

/// Create an empty placeholder file (enough for the mock codec).
pub fn touch(path: &Path) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"").unwrap();
    path.to_path_buf()
}

// =========================================================================
// Report lookups (panic with a clear message on miss)
// =========================================================================

/// Outcome recorded for the job whose source is `source`.
pub fn outcome_for<'a>(report: &'a BatchReport, source: &Path) -> &'a ConversionOutcome {
    report
        .entries()
        .iter()
        .find(|e| e.job.source == source)
        .map(|e| &e.outcome)
        .unwrap_or_else(|| {
            let sources: Vec<_> = report.entries().iter().map(|e| &e.job.source).collect();
            panic!(
                "no outcome for {}. Available: {sources:?}",
                source.display()
            )
        })
}

/// Output paths of a successful outcome. Panics on any other outcome.
pub fn success_outputs(outcome: &ConversionOutcome) -> &[PathBuf] {
    match outcome {
        ConversionOutcome::Success { outputs, .. } => outputs,
        other => panic!("expected success, got {other:?}"),
    }
}
