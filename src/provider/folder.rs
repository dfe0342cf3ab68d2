use crate::config::types::{Result, TestboxError};
use crate::provider::naming::{extension_of, model_output_path, sort_tests, test_name_of, INPUT_EXTENSION};
use crate::provider::test::{Test, TestOrigin};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Tests stored as `*.in` files anywhere below a directory
pub struct FolderProvider {
    root: PathBuf,
    inputs: Vec<String>,
}

impl FolderProvider {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(TestboxError::Setup(format!(
                "folder not found: {}",
                root.display()
            )));
        }

        let mut inputs = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_string_lossy().into_owned();
            if extension_of(&path).as_deref() == Some(INPUT_EXTENSION) {
                inputs.push(path);
            }
        }
        sort_tests(&mut inputs);
        log::debug!("{}: {} inputs", root.display(), inputs.len());

        Ok(Self {
            root: root.to_path_buf(),
            inputs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn tests(&self) -> impl Iterator<Item = Test> + '_ {
        self.inputs.iter().map(|input| {
            let candidate = PathBuf::from(model_output_path(input));
            let output_path = candidate.is_file().then_some(candidate);
            Test::new(
                test_name_of(input),
                TestOrigin::Folder {
                    input_path: PathBuf::from(input),
                    output_path,
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str, data: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    #[test]
    fn walks_subdirectories_and_pairs_outputs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "in/t2.in", b"two");
        touch(dir.path(), "in/t10.in", b"ten");
        touch(dir.path(), "out/t2.out", b"2");
        touch(dir.path(), "extra/t1.IN", b"one");
        touch(dir.path(), "extra/t1.out", b"1");
        touch(dir.path(), "notes.txt", b"skip");

        let provider = FolderProvider::open(dir.path()).unwrap();
        assert_eq!(provider.len(), 3);

        let tests: Vec<Test> = provider.tests().collect();
        let names: Vec<&str> = tests.iter().map(Test::name).collect();
        assert_eq!(names, ["t1", "t2", "t10"]);

        assert_eq!(tests[0].model_output_data().unwrap(), b"1");
        assert_eq!(tests[1].input_data().unwrap(), b"two");
        assert_eq!(tests[1].model_output_data().unwrap(), b"2");
        assert!(!tests[2].has_model_output());
    }

    #[test]
    fn missing_folder_is_a_setup_error() {
        let result = FolderProvider::open(Path::new("/nonexistent/testbox-folder"));
        assert!(matches!(result, Err(TestboxError::Setup(_))));
    }
}
