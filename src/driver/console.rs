use crate::config::types::Result;
use crate::driver::{ResultSink, RunStats, TestReport};
use crate::provider::ProviderSpec;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Prints one line per test for an interactive checking session.
///
/// Failing tests can be copied into a folder for later inspection and can
/// pause the session until Enter is pressed.
pub struct ConsoleReporter<W: Write + Send> {
    out: W,
    save_failed: Option<PathBuf>,
    wait_after_error: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            save_failed: None,
            wait_after_error: false,
        }
    }

    /// Copy failing tests into `folder`, created on first use.
    pub fn save_failed_to(mut self, folder: Option<PathBuf>) -> Self {
        self.save_failed = folder;
        self
    }

    pub fn wait_after_error(mut self, wait: bool) -> Self {
        self.wait_after_error = wait;
        self
    }

    pub fn summary(&mut self, stats: &RunStats) -> Result<()> {
        writeln!(self.out, "{} tests, {} failed", stats.done, stats.errors)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn save_failed_test(&self, report: &TestReport<'_>) -> Result<()> {
        let Some(folder) = &self.save_failed else {
            return Ok(());
        };
        std::fs::create_dir_all(folder)?;
        let input = report.test.save_input(folder)?;
        log::debug!("saved {}", input.display());
        if report.test.has_model_output() {
            report.test.save_model_output(folder)?;
        }
        Ok(())
    }

    fn wait_for_enter(&mut self) -> Result<()> {
        write!(self.out, "Press Enter to continue...")?;
        self.out.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(())
    }
}

impl<W: Write + Send> ResultSink for ConsoleReporter<W> {
    fn begin_source(&mut self, spec: &ProviderSpec) -> Result<()> {
        writeln!(self.out, "Processing tests from {}", spec)?;
        Ok(())
    }

    fn record(&mut self, report: &TestReport<'_>) -> Result<()> {
        let result = report.result;
        writeln!(
            self.out,
            "{} {} {:.3}s",
            report.test.name(),
            result.verdict,
            result.elapsed_secs()
        )?;

        if result.verdict.is_failure() {
            if let Some(explanation) = report.runner.explain(report.test, result)? {
                writeln!(self.out, "{}", explanation)?;
            }
            self.save_failed_test(report)?;
            if self.wait_after_error {
                self.wait_for_enter()?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}
