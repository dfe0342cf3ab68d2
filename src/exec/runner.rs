use crate::config::types::{Result, RunResult, TestboxError};
use crate::core::supervisor::ProcessSupervisor;
use crate::provider::Test;
use crate::verdict::compare::Comparator;
use crate::verdict::verdict::{RunEvidence, VerdictClassifier, VerdictPolicy};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Runs the candidate program on one test and classifies the result.
pub struct Runner {
    command: Vec<String>,
    supervisor: Arc<ProcessSupervisor>,
    comparator: Arc<dyn Comparator>,
    policy: VerdictPolicy,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("command", &self.command)
            .field("comparator", &self.comparator.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Runner {
    /// Build a runner for `program`.
    ///
    /// The interpreter for the program is resolved here, so a `wrapper`
    /// prefix (a timing tool, say) ends up wrapping the interpreter call
    /// rather than the bare script.
    pub fn new(
        program: &Path,
        wrapper: &[String],
        supervisor: Arc<ProcessSupervisor>,
        comparator: Arc<dyn Comparator>,
        policy: VerdictPolicy,
    ) -> Result<Self> {
        if !program.is_file() {
            return Err(TestboxError::Setup(format!(
                "program not found: {}",
                program.display()
            )));
        }

        let target = vec![program.to_string_lossy().into_owned()];
        let mut command = wrapper.to_vec();
        command.extend(supervisor.interpreters().resolve(&target)?);
        log::debug!("candidate command: {:?}", command);

        Ok(Self {
            command,
            supervisor,
            comparator,
            policy,
        })
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.policy.time_limit
    }

    pub fn comparator(&self) -> &Arc<dyn Comparator> {
        &self.comparator
    }

    /// Run one test.
    ///
    /// Whatever the program does becomes the verdict. An `Err` means the
    /// test itself could not be produced or the run could not be started.
    pub fn run(&self, test: &Test) -> Result<RunResult> {
        let input = test.input_data()?;
        let mut output = Vec::new();
        let outcome = self
            .supervisor
            .run(&self.command, input, &mut output, self.policy.time_limit)?;

        let evidence = RunEvidence {
            exit_code: outcome.exit_code,
            elapsed: outcome.elapsed,
            output: &output,
        };
        let verdict =
            VerdictClassifier::classify(&evidence, test, &self.policy, self.comparator.as_ref())?;
        log::debug!(
            "{}: {} after {:?} (exit {:?})",
            test.name(),
            verdict,
            outcome.elapsed,
            outcome.exit_code
        );

        Ok(RunResult {
            exit_code: outcome.exit_code,
            elapsed: outcome.elapsed,
            output,
            verdict,
        })
    }

    /// First-difference explanation for a run, if the test has a reference.
    pub fn explain(&self, test: &Test, result: &RunResult) -> Result<Option<String>> {
        if !test.has_model_output() {
            return Ok(None);
        }
        self.comparator
            .explain(test.input_data()?, &result.output, test.model_output_data()?)
    }
}
