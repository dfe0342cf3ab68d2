use crate::config::types::{Result, TestboxError};
use crate::driver::{ResultSink, RunStats, TestReport};
use crate::provider::naming::{extension_of, INPUT_EXTENSION, OUTPUT_EXTENSION};
use crate::provider::ProviderSpec;
use std::collections::{HashSet, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Completions the progress rate is averaged over
const RATE_WINDOW: usize = 10;

/// `output` with `.zip` appended unless it already ends in `.zip`.
pub fn archive_output_path(output: &Path) -> PathBuf {
    let name = output.to_string_lossy();
    if extension_of(&name).as_deref() == Some("zip") {
        output.to_path_buf()
    } else {
        PathBuf::from(format!("{}.zip", name))
    }
}

/// Tests-per-second over the most recent completions
#[derive(Debug, Default)]
struct RollingRate {
    completions: VecDeque<Instant>,
}

impl RollingRate {
    fn tick(&mut self, now: Instant) {
        if self.completions.len() == RATE_WINDOW {
            self.completions.pop_front();
        }
        self.completions.push_back(now);
    }

    fn per_second(&self) -> Option<f64> {
        let (first, last) = (self.completions.front()?, self.completions.back()?);
        let span = last.duration_since(*first).as_secs_f64();
        (span > 0.0).then(|| (self.completions.len() - 1) as f64 / span)
    }
}

/// Packs every finished test into a zip archive as `in/<name>.in` (the
/// input) and `out/<name>.out` (what the program printed).
pub struct ArchiveSink {
    path: PathBuf,
    writer: ZipWriter<File>,
    written: HashSet<String>,
    keep_failed: bool,
    progress: Box<dyn Write + Send>,
    rate: RollingRate,
}

impl ArchiveSink {
    /// Create the archive; an existing file is never overwritten.
    pub fn create(path: &Path, keep_failed: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => TestboxError::Setup(format!(
                    "refusing to overwrite existing file {}",
                    path.display()
                )),
                _ => TestboxError::Setup(format!("cannot create {}: {}", path.display(), e)),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: ZipWriter::new(file),
            written: HashSet::new(),
            keep_failed,
            progress: Box::new(io::stdout()),
            rate: RollingRate::default(),
        })
    }

    /// Send the progress line somewhere other than stdout.
    pub fn with_progress(mut self, progress: Box<dyn Write + Send>) -> Self {
        self.progress = progress;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add one deflated entry. A name that was already written is skipped.
    pub fn write_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if !self.written.insert(name.to_string()) {
            log::warn!("{}: duplicate entry {} skipped", self.path.display(), name);
            return Ok(());
        }
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(name, options)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    /// Write the central directory and close the file.
    pub fn finish(mut self) -> Result<PathBuf> {
        writeln!(self.progress)?;
        self.writer.finish()?;
        log::info!(
            "{}: {} entries written",
            self.path.display(),
            self.written.len()
        );
        Ok(self.path)
    }

    fn show_progress(&mut self, stats: &RunStats) -> Result<()> {
        self.rate.tick(Instant::now());
        write!(
            self.progress,
            "\r{} tests done, {} errors.",
            stats.done, stats.errors
        )?;
        if let Some(rate) = self.rate.per_second() {
            write!(self.progress, " {:.1} tests/s", rate)?;
        }
        self.progress.flush()?;
        Ok(())
    }
}

impl ResultSink for ArchiveSink {
    fn begin_source(&mut self, spec: &ProviderSpec) -> Result<()> {
        writeln!(self.progress, "\nProcessing tests from {}", spec)?;
        Ok(())
    }

    fn record(&mut self, report: &TestReport<'_>) -> Result<()> {
        let name = report.test.name();
        if report.result.verdict.is_failure() {
            writeln!(
                self.progress,
                "\nError when doing test {} ({})",
                name, report.result.verdict
            )?;
            if !self.keep_failed {
                return self.show_progress(&report.stats);
            }
        }

        let input = report.test.input_data()?;
        self.write_entry(&format!("in/{}.{}", name, INPUT_EXTENSION), input)?;
        self.write_entry(
            &format!("out/{}.{}", name, OUTPUT_EXTENSION),
            &report.result.output,
        )?;
        self.show_progress(&report.stats)
    }
}
