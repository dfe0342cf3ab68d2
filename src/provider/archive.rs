use crate::config::types::{Result, TestboxError};
use crate::provider::naming::{
    extension_of, model_output_path, sort_tests, test_name_of, INPUT_EXTENSION, OUTPUT_EXTENSION,
};
use crate::provider::test::{Test, TestOrigin};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use zip::ZipArchive;

/// Zip archive shared by every test drawn from it.
pub type SharedArchive = Arc<Mutex<ZipArchive<File>>>;

/// Read one entry of a shared archive into memory.
pub(crate) fn read_entry(archive: &SharedArchive, name: &str) -> Result<Vec<u8>> {
    let mut archive = archive
        .lock()
        .map_err(|_| TestboxError::Archive("archive lock poisoned".to_string()))?;
    let mut entry = archive.by_name(name)?;
    let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry.read_to_end(&mut data)?;
    Ok(data)
}

/// Tests stored as `*.in` / `*.out` entries of a zip archive
pub struct ArchiveProvider {
    path: PathBuf,
    archive: SharedArchive,
    inputs: Vec<String>,
    outputs: HashSet<String>,
}

impl ArchiveProvider {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(TestboxError::Setup(format!(
                "archive not found: {}",
                path.display()
            )));
        }

        let file = File::open(path)?;
        let archive = ZipArchive::new(file).map_err(|e| {
            TestboxError::Setup(format!("{} is not a readable zip: {}", path.display(), e))
        })?;

        let mut inputs = Vec::new();
        let mut outputs = HashSet::new();
        for name in archive.file_names() {
            match extension_of(name).as_deref() {
                Some(INPUT_EXTENSION) => inputs.push(name.to_string()),
                Some(OUTPUT_EXTENSION) => {
                    outputs.insert(name.to_string());
                }
                _ => {}
            }
        }
        sort_tests(&mut inputs);
        log::debug!(
            "{}: {} inputs, {} outputs",
            path.display(),
            inputs.len(),
            outputs.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            archive: Arc::new(Mutex::new(archive)),
            inputs,
            outputs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn tests(&self) -> impl Iterator<Item = Test> + '_ {
        self.inputs.iter().map(move |input| {
            let candidate = model_output_path(input);
            let output_entry = self.outputs.contains(&candidate).then_some(candidate);
            Test::new(
                test_name_of(input),
                TestOrigin::Archive {
                    archive: Arc::clone(&self.archive),
                    input_entry: input.clone(),
                    output_entry,
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(dir: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join("tests.zip");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn pairs_inputs_with_outputs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = build_zip(
            dir.path(),
            &[
                ("in/a10.in", b"10"),
                ("in/a2.in", b"2"),
                ("out/a2.out", b"4"),
                ("in/a1ocen.in", b"1"),
                ("README", b"ignored"),
            ],
        );

        let provider = ArchiveProvider::open(&path).unwrap();
        let tests: Vec<Test> = provider.tests().collect();
        let names: Vec<&str> = tests.iter().map(Test::name).collect();
        assert_eq!(names, ["a2", "a10", "a1ocen"]);

        assert!(tests[0].has_model_output());
        assert_eq!(tests[0].input_data().unwrap(), b"2");
        assert_eq!(tests[0].model_output_data().unwrap(), b"4");
        assert!(!tests[1].has_model_output());
    }

    #[test]
    fn missing_archive_is_a_setup_error() {
        let result = ArchiveProvider::open(Path::new("/nonexistent/tests.zip"));
        assert!(matches!(result, Err(TestboxError::Setup(_))));
    }

    #[test]
    fn garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();
        assert!(ArchiveProvider::open(&path).is_err());
    }
}
