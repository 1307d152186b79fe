//! Batch orchestration: many jobs, a bounded worker pool, one report.
//!
//! ```text
//!  sources ──expand──► jobs ──► rayon pool (N workers) ──(index, outcome)──► collector
//!                                   │ job::execute                               │
//!                                   └── PathClaims (shared, locked)              ▼
//!                                                                   BatchReport + BatchEvents
//! ```
//!
//! Workers never touch the report. Each one sends its `(index, outcome)` pair
//! over a channel to the single collector, which appends it to the report and
//! forwards a [`BatchEvent`] to the front end. The collector also enforces
//! the report invariant: exactly one entry per submitted job, whatever
//! happens to individual jobs.
//!
//! ## Cancellation
//!
//! [`CancelToken::cancel`] stops dispatch. Jobs already running finish
//! normally; jobs picked up afterwards are recorded as
//! `Skipped { reason: Cancelled }` without touching the codec. Output paths
//! already claimed stay claimed.
//!
//! ## Directory inputs
//!
//! [`expand_sources`] turns a directory argument into one job per image file
//! directly inside it, writing to a sibling `<dirname>_converted/` directory.

use crate::codec::Codec;
use crate::format::Format;
use crate::job::{self, ConversionJob, ConversionOutcome, ErrorKind, SkipReason, TargetSpec};
use crate::naming::PathClaims;
use rayon::prelude::*;
use serde::Serialize;
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Suffix appended to a directory's name to form its output directory.
pub const CONVERTED_DIR_SUFFIX: &str = "_converted";

/// Caller-contract violations. Per-file problems never show up here.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("No source images to convert")]
    EmptyBatch,
    #[error("Concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Shared flag that stops a running batch from dispatching more jobs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for wiring to a signal handler.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }

    /// Cancel on the first Ctrl-C. A second Ctrl-C exits with status 130.
    pub fn cancel_on_interrupt(&self) -> std::io::Result<()> {
        // Handlers run in registration order: the exit check sees the flag
        // before the first interrupt sets it.
        flag::register_conditional_shutdown(SIGINT, 130, self.flag())?;
        flag::register(SIGINT, self.flag())?;
        Ok(())
    }
}

/// Progress notification sent to the front end as each job settles.
#[derive(Debug, Clone)]
pub struct BatchEvent {
    /// Jobs settled so far, including this one.
    pub completed: usize,
    pub total: usize,
    /// Position of the job in submission order.
    pub index: usize,
    pub job: ConversionJob,
    pub outcome: ConversionOutcome,
}

/// One report row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    pub index: usize,
    pub job: ConversionJob,
    pub outcome: ConversionOutcome,
}

/// Counters over a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Successful jobs whose source had more than one frame.
    pub animated: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

/// Per-job outcomes of one batch, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reorder entries to match the order jobs were submitted.
    pub fn into_submission_order(mut self) -> Self {
        self.entries.sort_by_key(|e| e.index);
        self
    }

    pub fn summary(&self) -> BatchSummary {
        self.entries
            .iter()
            .fold(BatchSummary::default(), |mut summary, entry| {
                match &entry.outcome {
                    ConversionOutcome::Success { source_frames, .. } => {
                        summary.succeeded += 1;
                        if *source_frames > 1 {
                            summary.animated += 1;
                        }
                    }
                    ConversionOutcome::Skipped { .. } => summary.skipped += 1,
                    ConversionOutcome::Failed { .. } => summary.failed += 1,
                }
                summary
            })
    }

    /// Pretty JSON with the summary followed by every entry.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Document<'a> {
            summary: BatchSummary,
            entries: &'a [BatchEntry],
        }
        serde_json::to_string_pretty(&Document {
            summary: self.summary(),
            entries: &self.entries,
        })
    }
}

/// Runs batches of jobs against one codec.
pub struct BatchRunner<'a, C: Codec> {
    codec: &'a C,
    overwrite_existing: bool,
    cancel: CancelToken,
    events: Option<Sender<BatchEvent>>,
}

impl<'a, C: Codec> BatchRunner<'a, C> {
    pub fn new(codec: &'a C) -> Self {
        Self {
            codec,
            overwrite_existing: false,
            cancel: CancelToken::new(),
            events: None,
        }
    }

    /// Allow replacing files that already exist on disk (never batch sources).
    pub fn overwrite_existing(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Forward a [`BatchEvent`] per settled job. The sender is dropped when
    /// the runner is, which ends a printer loop reading the other side.
    pub fn with_events(mut self, events: Sender<BatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run `jobs` on `concurrency` workers and wait for all of them.
    ///
    /// The report has exactly one entry per job. Only a zero concurrency or
    /// a failure to start the pool is an error.
    pub fn run(
        &self,
        jobs: Vec<ConversionJob>,
        concurrency: usize,
    ) -> Result<BatchReport, BatchError> {
        if concurrency == 0 {
            return Err(BatchError::InvalidConcurrency(concurrency));
        }
        if jobs.is_empty() {
            return Ok(BatchReport::default());
        }

        info!(jobs = jobs.len(), concurrency, "starting batch");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("convert-{i}"))
            .build()?;
        let claims = PathClaims::new(self.overwrite_existing)
            .with_reserved(jobs.iter().map(|j| j.source.clone()));
        let (tx, rx) = mpsc::channel();

        let report = std::thread::scope(|scope| {
            let (jobs, claims, pool) = (&jobs, &claims, &pool);
            scope.spawn(move || {
                pool.install(|| {
                    jobs.par_iter()
                        .enumerate()
                        .for_each_with(tx, |tx, (index, job)| {
                            let outcome = self.dispatch(job, claims);
                            let _ = tx.send((index, outcome));
                        });
                });
            });
            self.collect(jobs, rx)
        });

        let summary = report.summary();
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch finished"
        );
        Ok(report)
    }

    /// Expand `sources`, build one job per image and run them.
    pub fn submit(
        &self,
        sources: &[PathBuf],
        target: TargetSpec,
        output_dir: Option<&Path>,
        concurrency: usize,
    ) -> Result<BatchReport, BatchError> {
        if concurrency == 0 {
            return Err(BatchError::InvalidConcurrency(concurrency));
        }
        let jobs: Vec<ConversionJob> = expand_sources(sources, output_dir)?
            .into_iter()
            .map(|(source, dir)| ConversionJob::new(source, target, dir))
            .collect();
        if jobs.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        self.run(jobs, concurrency)
    }

    fn dispatch(&self, job: &ConversionJob, claims: &PathClaims) -> ConversionOutcome {
        if self.cancel.is_cancelled() {
            debug!(source = %job.source.display(), "not dispatched, batch cancelled");
            return ConversionOutcome::Skipped {
                reason: SkipReason::Cancelled,
            };
        }
        job::execute(job, self.codec, claims)
    }

    /// Drain worker results into the report until every worker has hung up.
    fn collect(
        &self,
        jobs: &[ConversionJob],
        rx: Receiver<(usize, ConversionOutcome)>,
    ) -> BatchReport {
        let total = jobs.len();
        let mut settled = vec![false; total];
        let mut report = BatchReport {
            entries: Vec::with_capacity(total),
        };

        for (index, outcome) in rx {
            if settled[index] {
                warn!(index, "ignoring second outcome for job");
                continue;
            }
            settled[index] = true;
            self.record(&mut report, jobs, index, outcome);
        }

        // A worker that died without reporting still owes an outcome.
        for index in (0..total).filter(|&i| !settled[i]) {
            let outcome = ConversionOutcome::Failed {
                kind: ErrorKind::Internal,
                message: "worker exited without reporting an outcome".to_string(),
            };
            self.record(&mut report, jobs, index, outcome);
        }

        let cancelled = report
            .entries
            .iter()
            .filter(|e| {
                matches!(
                    e.outcome,
                    ConversionOutcome::Skipped {
                        reason: SkipReason::Cancelled
                    }
                )
            })
            .count();
        if cancelled > 0 {
            warn!(cancelled, "batch cancelled, remaining jobs skipped");
        }
        report
    }

    fn record(
        &self,
        report: &mut BatchReport,
        jobs: &[ConversionJob],
        index: usize,
        outcome: ConversionOutcome,
    ) {
        let job = jobs[index].clone();
        if let Some(events) = &self.events {
            let _ = events.send(BatchEvent {
                completed: report.entries.len() + 1,
                total: jobs.len(),
                index,
                job: job.clone(),
                outcome: outcome.clone(),
            });
        }
        report.entries.push(BatchEntry {
            index,
            job,
            outcome,
        });
    }
}

/// Convert `sources` with default runner settings.
pub fn submit_batch(
    codec: &impl Codec,
    sources: &[PathBuf],
    target: TargetSpec,
    output_dir: Option<&Path>,
    concurrency: usize,
) -> Result<BatchReport, BatchError> {
    BatchRunner::new(codec).submit(sources, target, output_dir, concurrency)
}

/// Turn command-line paths into `(source, output_dir)` pairs.
///
/// Files pass through unchanged (even missing ones, which then fail as
/// unreadable). A directory contributes the image files directly inside it,
/// sorted by name, with outputs in `<base>/<dirname>_converted` where base
/// is `output_dir` or the directory's parent.
pub fn expand_sources(
    sources: &[PathBuf],
    output_dir: Option<&Path>,
) -> Result<Vec<(PathBuf, Option<PathBuf>)>, BatchError> {
    let mut expanded = Vec::new();
    for source in sources {
        if !source.is_dir() {
            expanded.push((source.clone(), output_dir.map(Path::to_path_buf)));
            continue;
        }

        let converted = converted_dir(source, output_dir);
        let before = expanded.len();
        for entry in WalkDir::new(source)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| BatchError::ReadDir {
                path: source.clone(),
                source: e,
            })?;
            if entry.file_type().is_file() && is_image_file(entry.path()) {
                expanded.push((entry.into_path(), Some(converted.clone())));
            }
        }
        debug!(
            dir = %source.display(),
            images = expanded.len() - before,
            "expanded directory"
        );
    }
    Ok(expanded)
}

fn converted_dir(dir: &Path, output_dir: Option<&Path>) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "images".to_string());
    let base = output_dir
        .map(Path::to_path_buf)
        .or_else(|| dir.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    base.join(format!("{name}{CONVERTED_DIR_SUFFIX}"))
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(Format::from_extension)
        .is_some()
}
