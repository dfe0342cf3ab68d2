use crate::config::types::{Result, TestboxError};
use crate::core::supervisor::ProcessSupervisor;
use crate::provider::test::{Test, TestOrigin};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Generator program, optional model solution, and the supervisor that runs them.
#[derive(Debug)]
pub struct GeneratorSetup {
    generator: PathBuf,
    model_solution: Option<PathBuf>,
    supervisor: Arc<ProcessSupervisor>,
}

fn generation_error(test: &str, reason: String) -> TestboxError {
    log::error!("critical error in test {}: {}", test, reason);
    TestboxError::Generation {
        test: test.to_string(),
        reason,
    }
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(TestboxError::Setup(format!(
            "{} not found: {}",
            what,
            path.display()
        )))
    }
}

impl GeneratorSetup {
    pub fn new(
        generator: PathBuf,
        model_solution: Option<PathBuf>,
        supervisor: Arc<ProcessSupervisor>,
    ) -> Result<Self> {
        require_file(&generator, "generator")?;
        if let Some(model) = &model_solution {
            require_file(model, "model solution")?;
        }
        Ok(Self {
            generator,
            model_solution,
            supervisor,
        })
    }

    pub fn has_model_solution(&self) -> bool {
        self.model_solution.is_some()
    }

    /// Run the generator with the test index on stdin.
    ///
    /// A crash or an empty result invalidates the whole run, so both are
    /// [`TestboxError::Generation`].
    pub(crate) fn generate_input(&self, test: &str, index: u64) -> Result<Vec<u8>> {
        let seed = index.to_string();
        let (outcome, data) = self
            .supervisor
            .capture(&[path_arg(&self.generator)], seed.as_bytes(), None)?;

        if outcome.exit_code != Some(0) {
            return Err(generation_error(
                test,
                format!("generator crashed (exit code {:?})", outcome.exit_code),
            ));
        }
        if data.is_empty() {
            return Err(generation_error(test, "generator wrote no output".to_string()));
        }
        Ok(data)
    }

    /// Run the model solution on `input`.
    pub(crate) fn generate_model_output(&self, test: &str, input: &[u8]) -> Result<Vec<u8>> {
        let model = self
            .model_solution
            .as_ref()
            .ok_or_else(|| TestboxError::MissingModelOutput(test.to_string()))?;
        let (outcome, data) = self.supervisor.capture(&[path_arg(model)], input, None)?;

        if outcome.exit_code != Some(0) {
            return Err(generation_error(
                test,
                format!("model solution crashed (exit code {:?})", outcome.exit_code),
            ));
        }
        if data.is_empty() {
            return Err(generation_error(
                test,
                "model solution wrote no output".to_string(),
            ));
        }
        Ok(data)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Tests produced on demand by a generator program.
///
/// Test `i` (counting from 1) is named `<prefix><i><suffix>`. Without a
/// limit the sequence never ends; the driver decides when to stop pulling.
pub struct GeneratorProvider {
    setup: Arc<GeneratorSetup>,
    name_prefix: String,
    name_suffix: String,
    limit: Option<u64>,
}

impl GeneratorProvider {
    pub fn new(
        setup: GeneratorSetup,
        name_prefix: impl Into<String>,
        name_suffix: impl Into<String>,
        limit: Option<u64>,
    ) -> Self {
        Self {
            setup: Arc::new(setup),
            name_prefix: name_prefix.into(),
            name_suffix: name_suffix.into(),
            limit,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn test_name(&self, index: u64) -> String {
        format!("{}{}{}", self.name_prefix, index, self.name_suffix)
    }

    pub fn tests(&self) -> impl Iterator<Item = Test> + '_ {
        let limit = self.limit;
        (1u64..)
            .take_while(move |index| limit.map_or(true, |limit| *index <= limit))
            .map(move |index| {
                Test::new(
                    self.test_name(index),
                    TestOrigin::Generated {
                        setup: Arc::clone(&self.setup),
                        index,
                    },
                )
            })
    }
}
