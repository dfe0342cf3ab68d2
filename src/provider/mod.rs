//! Test sources.
//!
//! A provider turns an archive, a directory tree, or a generator program into
//! an ordered, lazy sequence of [`Test`]s. The set of sources is closed:
//! [`ProviderSpec`] names what to open, [`TestProvider`] is the opened source.

pub mod archive;
pub mod folder;
pub mod generator;
pub mod naming;
pub mod test;

pub use test::Test;

use crate::config::types::{Result, TestboxError};
use crate::core::supervisor::ProcessSupervisor;
use archive::ArchiveProvider;
use folder::FolderProvider;
use generator::{GeneratorProvider, GeneratorSetup};
use std::fmt;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use zip::ZipArchive;

/// Generator-backed source description
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSpec {
    pub generator: PathBuf,
    pub model_solution: Option<PathBuf>,
    pub name_prefix: String,
    pub name_suffix: String,
    pub limit: Option<u64>,
}

/// A test source to open
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderSpec {
    Archive(PathBuf),
    Folder(PathBuf),
    Generator(GeneratorSpec),
}

impl fmt::Display for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderSpec::Archive(path) => write!(f, "archive {}", path.display()),
            ProviderSpec::Folder(path) => write!(f, "folder {}", path.display()),
            ProviderSpec::Generator(spec) => write!(f, "generator {}", spec.generator.display()),
        }
    }
}

impl ProviderSpec {
    /// Check that the source exists, and that an archive is a readable zip,
    /// without reading any tests.
    pub fn verify(&self) -> Result<()> {
        let missing = |what: &str, path: &PathBuf| {
            TestboxError::Setup(format!("{} not found: {}", what, path.display()))
        };
        match self {
            ProviderSpec::Archive(path) if !path.is_file() => Err(missing("archive", path)),
            ProviderSpec::Archive(path) => {
                ZipArchive::new(File::open(path)?).map_err(|e| {
                    TestboxError::Setup(format!("{} is not a readable zip: {}", path.display(), e))
                })?;
                Ok(())
            }
            ProviderSpec::Folder(path) if !path.is_dir() => Err(missing("folder", path)),
            ProviderSpec::Generator(spec) => {
                if !spec.generator.is_file() {
                    return Err(missing("generator", &spec.generator));
                }
                match &spec.model_solution {
                    Some(model) if !model.is_file() => Err(missing("model solution", model)),
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    pub fn open(&self, supervisor: &Arc<ProcessSupervisor>) -> Result<TestProvider> {
        Ok(match self {
            ProviderSpec::Archive(path) => TestProvider::Archive(ArchiveProvider::open(path)?),
            ProviderSpec::Folder(path) => TestProvider::Folder(FolderProvider::open(path)?),
            ProviderSpec::Generator(spec) => {
                let setup = GeneratorSetup::new(
                    spec.generator.clone(),
                    spec.model_solution.clone(),
                    Arc::clone(supervisor),
                )?;
                TestProvider::Generator(GeneratorProvider::new(
                    setup,
                    spec.name_prefix.clone(),
                    spec.name_suffix.clone(),
                    spec.limit,
                ))
            }
        })
    }
}

/// An opened test source
pub enum TestProvider {
    Archive(ArchiveProvider),
    Folder(FolderProvider),
    Generator(GeneratorProvider),
}

impl TestProvider {
    /// Tests in run order. Generator sources may be endless.
    pub fn tests(&self) -> Box<dyn Iterator<Item = Test> + '_> {
        match self {
            TestProvider::Archive(provider) => Box::new(provider.tests()),
            TestProvider::Folder(provider) => Box::new(provider.tests()),
            TestProvider::Generator(provider) => Box::new(provider.tests()),
        }
    }
}
