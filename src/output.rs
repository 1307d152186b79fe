//! CLI output formatting for batch conversions.
//!
//! # Output Format
//!
//! ## Convert
//!
//! One header line per settled job, in completion order, prefixed with a
//! running `[completed/total]` counter. Frame splits list their files as
//! indented context lines.
//!
//! ```text
//! [1/5] dawn.png → dawn.jpg
//! [2/5] spin.gif → 3 files (frame split, 3 frames)
//!     spin_0000.png
//!     spin_0001.png
//!     spin_0002.png
//! [3/5] photo.gif → photo.webp (animated, 5 frames)
//! [4/5] broken.png ✗ Source unreadable: Failed to decode ...
//! [5/5] clip.gif ⤼ skipped: target format does not support animation
//! Converted 3, skipped 1, failed 1 (2 animated)
//! ```
//!
//! ## Formats
//!
//! ```text
//! Format  Extensions            Animation  Quality  Alpha
//! JPEG    jpg, jpeg, jpe, jfif  no         yes      no
//! ...
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns lines) for testability and a
//! `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::batch::{BatchEvent, BatchSummary};
use crate::format::Format;
use crate::job::ConversionOutcome;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Display name of a path: its file name, or the whole path if it has none.
fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `[  3/120]`: completed count right-aligned to the width of the total.
fn progress_prefix(completed: usize, total: usize) -> String {
    let width = total.to_string().len();
    format!("[{completed:>width$}/{total}]")
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

// ============================================================================
// Convert output
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    let prefix = progress_prefix(event.completed, event.total);
    let source = file_label(&event.job.source);

    match &event.outcome {
        ConversionOutcome::Success {
            outputs,
            mode,
            source_frames,
        } => {
            let detail = if *source_frames > 1 {
                format!(" ({mode}, {source_frames} frames)")
            } else {
                String::new()
            };
            match outputs.as_slice() {
                [single] => vec![format!(
                    "{prefix} {source} \u{2192} {}{detail}",
                    file_label(single)
                )],
                many => {
                    let mut lines = vec![format!(
                        "{prefix} {source} \u{2192} {} files{detail}",
                        many.len()
                    )];
                    lines.extend(
                        many.iter()
                            .map(|p| format!("{}{}", indent(1), file_label(p))),
                    );
                    lines
                }
            }
        }
        ConversionOutcome::Skipped { reason } => {
            vec![format!("{prefix} {source} \u{293c} skipped: {reason}")]
        }
        // The message already names the kind.
        ConversionOutcome::Failed { message, .. } => {
            vec![format!("{prefix} {source} \u{2717} {message}")]
        }
    }
}

/// Print a batch event to stdout.
pub fn print_batch_event(event: &BatchEvent) {
    for line in format_batch_event(event) {
        println!("{}", line);
    }
}

/// One-line batch totals.
pub fn format_summary(summary: &BatchSummary) -> String {
    let mut line = format!(
        "Converted {}, skipped {}, failed {}",
        summary.succeeded, summary.skipped, summary.failed
    );
    if summary.animated > 0 {
        line.push_str(&format!(" ({} animated)", summary.animated));
    }
    line
}

pub fn print_summary(summary: &BatchSummary) {
    println!("{}", format_summary(summary));
}

// ============================================================================
// Formats output
// ============================================================================

/// The capability table as aligned text rows, header first.
pub fn format_capability_table() -> Vec<String> {
    let header = ["Format", "Extensions", "Animation", "Quality", "Alpha"];
    let rows: Vec<[String; 5]> = Format::ALL
        .iter()
        .map(|format| {
            let caps = format.capabilities();
            [
                format.name().to_string(),
                format.extensions().join(", "),
                yes_no(caps.supports_animation).to_string(),
                yes_no(caps.supports_quality).to_string(),
                yes_no(caps.supports_alpha).to_string(),
            ]
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|col| {
            rows.iter()
                .map(|row| row[col].len())
                .chain(std::iter::once(header[col].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let render = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(header.to_vec())];
    lines.extend(
        rows.iter()
            .map(|row| render(row.iter().map(String::as_str).collect())),
    );
    lines
}

pub fn print_capability_table() {
    for line in format_capability_table() {
        println!("{}", line);
    }
}
