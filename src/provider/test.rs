use crate::config::types::{Result, TestboxError};
use crate::provider::archive::{read_entry, SharedArchive};
use crate::provider::generator::GeneratorSetup;
use once_cell::unsync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a test's bytes come from
pub(crate) enum TestOrigin {
    Archive {
        archive: SharedArchive,
        input_entry: String,
        output_entry: Option<String>,
    },
    Folder {
        input_path: PathBuf,
        output_path: Option<PathBuf>,
    },
    Generated {
        setup: Arc<GeneratorSetup>,
        index: u64,
    },
}

/// One test case: a name, its input, and optionally a reference output.
///
/// Input and model output are produced on first access and cached for the
/// lifetime of the test; later accesses never regenerate them. A test is
/// owned by exactly one worker, so the caches are not synchronized.
pub struct Test {
    name: String,
    origin: TestOrigin,
    input: OnceCell<Vec<u8>>,
    model_output: OnceCell<Vec<u8>>,
}

impl Test {
    pub(crate) fn new(name: String, origin: TestOrigin) -> Self {
        Self {
            name,
            origin,
            input: OnceCell::new(),
            model_output: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_model_output(&self) -> bool {
        match &self.origin {
            TestOrigin::Archive { output_entry, .. } => output_entry.is_some(),
            TestOrigin::Folder { output_path, .. } => output_path.is_some(),
            TestOrigin::Generated { setup, .. } => setup.has_model_solution(),
        }
    }

    pub fn input_data(&self) -> Result<&[u8]> {
        self.input
            .get_or_try_init(|| match &self.origin {
                TestOrigin::Archive {
                    archive,
                    input_entry,
                    ..
                } => read_entry(archive, input_entry),
                TestOrigin::Folder { input_path, .. } => Ok(std::fs::read(input_path)?),
                TestOrigin::Generated { setup, index } => setup.generate_input(&self.name, *index),
            })
            .map(Vec::as_slice)
    }

    /// Reference output; an error when [`Test::has_model_output`] is false.
    pub fn model_output_data(&self) -> Result<&[u8]> {
        if !self.has_model_output() {
            return Err(TestboxError::MissingModelOutput(self.name.clone()));
        }

        self.model_output
            .get_or_try_init(|| match &self.origin {
                TestOrigin::Archive { archive, output_entry, .. } => match output_entry {
                    Some(entry) => read_entry(archive, entry),
                    None => Err(TestboxError::MissingModelOutput(self.name.clone())),
                },
                TestOrigin::Folder { output_path, .. } => match output_path {
                    Some(path) => Ok(std::fs::read(path)?),
                    None => Err(TestboxError::MissingModelOutput(self.name.clone())),
                },
                TestOrigin::Generated { setup, .. } => {
                    let input = self.input_data()?;
                    setup.generate_model_output(&self.name, input)
                }
            })
            .map(Vec::as_slice)
    }

    /// Write the input to `<folder>/<name>.in`.
    pub fn save_input(&self, folder: &Path) -> Result<PathBuf> {
        let path = folder.join(format!("{}.in", self.name));
        std::fs::write(&path, self.input_data()?)?;
        Ok(path)
    }

    /// Write the model output to `<folder>/<name>.out`.
    pub fn save_model_output(&self, folder: &Path) -> Result<PathBuf> {
        let path = folder.join(format!("{}.out", self.name));
        std::fs::write(&path, self.model_output_data()?)?;
        Ok(path)
    }
}

impl std::fmt::Debug for Test {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Test")
            .field("name", &self.name)
            .field("has_model_output", &self.has_model_output())
            .field("input_cached", &self.input.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder_test(dir: &Path, with_output: bool) -> Test {
        let input_path = dir.join("t1.in");
        std::fs::write(&input_path, b"1 2\n").unwrap();
        let output_path = if with_output {
            let path = dir.join("t1.out");
            std::fs::write(&path, b"3\n").unwrap();
            Some(path)
        } else {
            None
        };
        Test::new(
            "t1".to_string(),
            TestOrigin::Folder {
                input_path,
                output_path,
            },
        )
    }

    #[test]
    fn input_is_read_once_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let test = folder_test(dir.path(), true);

        assert_eq!(test.input_data().unwrap(), b"1 2\n");
        std::fs::write(dir.path().join("t1.in"), b"changed").unwrap();
        assert_eq!(test.input_data().unwrap(), b"1 2\n");
        assert_eq!(test.model_output_data().unwrap(), b"3\n");
    }

    #[test]
    fn missing_model_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let test = folder_test(dir.path(), false);

        assert!(!test.has_model_output());
        assert!(matches!(
            test.model_output_data(),
            Err(TestboxError::MissingModelOutput(name)) if name == "t1"
        ));
    }

    #[test]
    fn saves_into_folder() {
        let dir = tempfile::tempdir().unwrap();
        let test = folder_test(dir.path(), true);
        let saved = tempfile::tempdir().unwrap();

        let input = test.save_input(saved.path()).unwrap();
        let output = test.save_model_output(saved.path()).unwrap();
        assert_eq!(std::fs::read(input).unwrap(), b"1 2\n");
        assert_eq!(std::fs::read(output).unwrap(), b"3\n");
    }
}
