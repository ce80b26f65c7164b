//! Reading, transpiling and writing many files.
//!
//! Paths are computed by the caller; this module only does the IO around
//! [`Transpiler::transpile`] and keeps going when a file fails.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::error::{ConvertError, Diagnostics};
use crate::pipeline::{TranspileReport, Transpiler};

/// One file to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileJob {
    /// GitBook source file.
    pub source: PathBuf,
    /// Where the MDX goes.
    pub output: PathBuf,
}

impl FileJob {
    /// Pairs a source with its output path.
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
        }
    }
}

/// Destination for converted documents.
pub trait OutputSink: Send + Sync {
    /// Stores `text` at `path`.
    fn write(&self, path: &Path, text: &str) -> std::io::Result<()>;
}

/// Writes to the filesystem, creating parent directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSink;

impl OutputSink for FsSink {
    fn write(&self, path: &Path, text: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)
    }
}

/// Options for [`run_batch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Convert files on the rayon pool instead of one after another.
    pub parallel: bool,
    /// Size of a dedicated pool. Defaults to rayon's global pool.
    pub max_threads: Option<usize>,
}

/// A file that was converted and written.
#[derive(Debug, Clone)]
pub struct Converted {
    /// Where the output went.
    pub output: PathBuf,
    /// Stage counters.
    pub report: TranspileReport,
    /// Recovered problems.
    pub diagnostics: Diagnostics,
}

/// Outcome for one job.
#[derive(Debug)]
pub struct FileOutcome {
    /// Source path of the job.
    pub source: PathBuf,
    /// Conversion result.
    pub result: Result<Converted, ConvertError>,
}

/// Aggregate numbers for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Jobs submitted.
    pub total: usize,
    /// Jobs written successfully.
    pub succeeded: usize,
    /// Jobs that failed to read or write.
    pub failed: usize,
    /// Wall-clock time.
    pub elapsed: Duration,
}

/// Result of [`run_batch`], in job order.
#[derive(Debug)]
pub struct BatchReport {
    /// One outcome per job.
    pub files: Vec<FileOutcome>,
    /// Totals.
    pub stats: BatchStats,
}

impl BatchReport {
    /// Outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &ConvertError)> {
        self.files
            .iter()
            .filter_map(|file| file.result.as_ref().err().map(|err| (file.source.as_path(), err)))
    }
}

/// Converts a single job.
pub fn convert_file(
    job: &FileJob,
    transpiler: &Transpiler,
    sink: &dyn OutputSink,
) -> Result<Converted, ConvertError> {
    let raw = fs::read_to_string(&job.source).map_err(|source| ConvertError::Read {
        path: job.source.clone(),
        source,
    })?;
    let output = transpiler.transpile(&job.source, &raw);
    sink.write(&job.output, &output.text)
        .map_err(|source| ConvertError::Write {
            path: job.output.clone(),
            source,
        })?;
    Ok(Converted {
        output: job.output.clone(),
        report: output.report,
        diagnostics: output.diagnostics,
    })
}

/// Converts every job. Failures are recorded per file; the batch never
/// stops early.
pub fn run_batch(
    jobs: Vec<FileJob>,
    transpiler: &Transpiler,
    sink: &dyn OutputSink,
    options: BatchOptions,
) -> BatchReport {
    let start = Instant::now();
    let total = jobs.len();
    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let process = |job: FileJob| -> FileOutcome {
        let result = convert_file(&job, transpiler, sink);
        match &result {
            Ok(_) => succeeded.fetch_add(1, Ordering::Relaxed),
            Err(err) => {
                log::warn!("{err}");
                failed.fetch_add(1, Ordering::Relaxed)
            }
        };
        FileOutcome {
            source: job.source,
            result,
        }
    };

    let files: Vec<FileOutcome> = if options.parallel {
        let pool = options.max_threads.and_then(|threads| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .ok()
        });
        if let Some(pool) = pool {
            pool.install(|| jobs.into_par_iter().map(process).collect())
        } else {
            jobs.into_par_iter().map(process).collect()
        }
    } else {
        jobs.into_iter().map(process).collect()
    };

    let stats = BatchStats {
        total,
        succeeded: succeeded.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
        elapsed: start.elapsed(),
    };
    log::debug!(
        "batch finished: {}/{} converted in {:?}",
        stats.succeeded,
        stats.total,
        stats.elapsed
    );
    BatchReport { files, stats }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_source_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let job = FileJob::new(dir.path().join("missing.md"), dir.path().join("out.mdx"));
        let report = run_batch(vec![job], &Transpiler::default(), &FsSink, BatchOptions::default());
        assert_eq!(report.stats.failed, 1);
        assert!(matches!(
            report.files[0].result,
            Err(ConvertError::Read { .. })
        ));
    }

    #[test]
    fn sink_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c.mdx");
        FsSink.write(&target, "x").unwrap();
        assert_eq!(fs::read_to_string(target).unwrap(), "x");
    }
}
