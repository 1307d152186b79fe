//! # Image Convert
//!
//! Batch conversion of raster images between JPEG, PNG, GIF, BMP, TIFF, WebP
//! and ICO, with explicit handling of animated sources.
//!
//! # Architecture: Jobs In, One Report Out
//!
//! ```text
//! paths ──► expand_sources ──► ConversionJob × N ──► BatchRunner ──► BatchReport
//!                                                      │
//!                                  worker: open → resolve mode → claim paths → encode → write
//! ```
//!
//! Every job settles to exactly one [`job::ConversionOutcome`]: success with
//! the files written, skipped with a reason, or failed with an error kind.
//! A bad file never stops the batch; only caller mistakes (no sources, zero
//! workers, an invalid config) are errors.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`format`] | Closed set of target formats and their capability row (animation, quality, alpha) |
//! | [`policy`] | Pure mapping of frame count × target capability × requested policy to an effective mode |
//! | [`naming`] | Output path resolution, `_N` disambiguation and the batch-wide claim registry |
//! | [`codec`] | `Codec` trait, decoded `SourceImage`, quality mapping, pure-Rust backend |
//! | [`job`] | `TargetSpec`, `ConversionJob`, outcomes, and `execute` for one job |
//! | [`batch`] | Worker pool, cancellation, progress events, report aggregation |
//! | [`config`] | `image-convert.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting for progress, summaries and the format table |
//!
//! # Design Decisions
//!
//! ## Animation Is a Policy, Not an Accident
//!
//! A GIF converted to JPEG silently losing its animation is the classic
//! converter surprise. Here the outcome is decided up front by
//! [`policy::resolve`]: targets that can animate (GIF, WebP) keep the
//! animation, and for the rest the caller picks first frame, one file per
//! frame, or skip. The chosen mode is recorded in every success outcome.
//!
//! ## Sources Are Never Overwritten
//!
//! Output names come from the source's base name and the target's canonical
//! extension. Every source in the batch is reserved, and names already
//! handed out or present on disk get a `_1`, `_2`, … suffix. Two workers can
//! never be given the same path because claims go through one lock.
//!
//! ## Pure-Rust Codecs
//!
//! Decoding and still encoding use the `image` crate. Lossy and animated WebP
//! go through libwebp via the `webp` crate, because the `image` WebP encoder
//! is lossless-only and cannot write animations.

pub mod batch;
pub mod codec;
pub mod config;
pub mod format;
pub mod job;
pub mod naming;
pub mod output;
pub mod policy;

#[cfg(test)]
pub(crate) mod test_helpers;
