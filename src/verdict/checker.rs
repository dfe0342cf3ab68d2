use crate::config::types::{Result, TestboxError};
use crate::core::supervisor::ProcessSupervisor;
use crate::verdict::compare::Comparator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// External checker executable.
///
/// Invoked as `checker <input> <output> <model>` with the three byte streams
/// staged in a scratch directory. Exit code 0 accepts the output; anything
/// else rejects it, with the checker's stdout as the explanation.
pub struct CheckerProgram {
    path: PathBuf,
    supervisor: Arc<ProcessSupervisor>,
    time_limit: Option<Duration>,
}

/// Checker exit code plus whatever it printed
struct CheckerReport {
    accepted: bool,
    message: String,
}

impl CheckerProgram {
    pub fn new(
        path: impl Into<PathBuf>,
        supervisor: Arc<ProcessSupervisor>,
        time_limit: Option<Duration>,
    ) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(TestboxError::Setup(format!(
                "checker not found: {}",
                path.display()
            )));
        }
        Ok(Self {
            path,
            supervisor,
            time_limit,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn invoke(&self, input: &[u8], output: &[u8], model: &[u8]) -> Result<CheckerReport> {
        let scratch = tempfile::Builder::new().prefix("testbox-checker").tempdir()?;
        let staged = [
            ("input.txt", input),
            ("output.txt", output),
            ("model.txt", model),
        ];

        let mut command = vec![self.path.to_string_lossy().into_owned()];
        for (name, data) in staged {
            let file = scratch.path().join(name);
            std::fs::write(&file, data)?;
            command.push(file.to_string_lossy().into_owned());
        }

        let (outcome, stdout) = self
            .supervisor
            .capture(&command, b"", self.time_limit)
            .map_err(|e| TestboxError::Checker(e.to_string()))?;

        if outcome.killed {
            return Err(TestboxError::Checker(format!(
                "{} exceeded its time limit",
                self.path.display()
            )));
        }

        Ok(CheckerReport {
            accepted: outcome.exit_code == Some(0),
            message: String::from_utf8_lossy(&stdout).trim().to_string(),
        })
    }
}

impl Comparator for CheckerProgram {
    fn name(&self) -> &str {
        "checker"
    }

    fn matches(&self, input: &[u8], output: &[u8], model: &[u8]) -> Result<bool> {
        Ok(self.invoke(input, output, model)?.accepted)
    }

    fn explain(&self, input: &[u8], output: &[u8], model: &[u8]) -> Result<Option<String>> {
        let report = self.invoke(input, output, model)?;
        if report.accepted {
            return Ok(None);
        }
        if report.message.is_empty() {
            Ok(Some(format!("rejected by {}", self.path.display())))
        } else {
            Ok(Some(report.message))
        }
    }
}
