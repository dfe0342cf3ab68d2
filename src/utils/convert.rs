/// Tar to zip conversion of test packages
use crate::config::types::{Result, TestboxError};
use crate::driver::archive::ArchiveSink;
use crate::provider::naming::extension_of;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Default output: the tar path with its extension replaced by `.zip`.
pub fn default_zip_path(tar_path: &Path) -> PathBuf {
    tar_path.with_extension("zip")
}

/// Copy every regular file of `tar_path` into a new zip archive.
///
/// Directories, links and special entries are skipped. Returns the number
/// of files copied. Progress goes to `progress` as a `\r`-rewritten line.
pub fn tar_to_zip(
    tar_path: &Path,
    zip_path: &Path,
    progress: &mut dyn Write,
) -> Result<usize> {
    if extension_of(&tar_path.to_string_lossy()).as_deref() != Some("tar") {
        return Err(TestboxError::Setup(format!(
            "not a .tar file: {}",
            tar_path.display()
        )));
    }
    if !tar_path.is_file() {
        return Err(TestboxError::Setup(format!(
            "file not found: {}",
            tar_path.display()
        )));
    }
    if extension_of(&zip_path.to_string_lossy()).as_deref() != Some("zip") {
        return Err(TestboxError::Setup(format!(
            "output must have a .zip extension: {}",
            zip_path.display()
        )));
    }

    let mut sink =
        ArchiveSink::create(zip_path, false)?.with_progress(Box::new(std::io::sink()));
    let copied = match copy_entries(tar_path, &mut sink, progress) {
        Ok(copied) => copied,
        Err(err) => {
            drop(sink);
            if let Err(e) = std::fs::remove_file(zip_path) {
                log::warn!("could not remove {}: {}", zip_path.display(), e);
            }
            return Err(err);
        }
    };
    sink.finish()?;

    log::info!(
        "{} -> {}: {} files",
        tar_path.display(),
        zip_path.display(),
        copied
    );
    Ok(copied)
}

fn copy_entries(
    tar_path: &Path,
    sink: &mut ArchiveSink,
    progress: &mut dyn Write,
) -> Result<usize> {
    let mut source = tar::Archive::new(File::open(tar_path)?);
    let entries = source.entries().map_err(|e| invalid_tar(tar_path, e))?;

    let mut copied = 0usize;
    for entry in entries {
        let mut entry = entry.map_err(|e| invalid_tar(tar_path, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut data)?;

        sink.write_entry(&name, &data)?;
        copied += 1;
        write!(progress, "\r{} files copied.", copied)?;
        progress.flush()?;
    }
    Ok(copied)
}

fn invalid_tar(path: &Path, err: std::io::Error) -> TestboxError {
    TestboxError::Archive(format!("{} is not a valid tar file: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::ZipArchive;

    fn build_tar(path: &Path, files: &[(&str, &[u8])]) {
        let mut builder = tar::Builder::new(File::create(path).unwrap());
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        let mut dir_header = tar::Header::new_gnu();
        dir_header.set_entry_type(tar::EntryType::Directory);
        dir_header.set_size(0);
        dir_header.set_mode(0o755);
        dir_header.set_cksum();
        builder
            .append_data(&mut dir_header, "in", std::io::empty())
            .unwrap();
        builder.finish().unwrap();
    }

    #[test]
    fn copies_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("pack.tar");
        build_tar(&tar_path, &[("in/a1.in", b"1 2\n"), ("out/a1.out", b"3\n")]);

        let zip_path = default_zip_path(&tar_path);
        assert_eq!(zip_path, dir.path().join("pack.zip"));

        let mut progress = Vec::new();
        assert_eq!(tar_to_zip(&tar_path, &zip_path, &mut progress).unwrap(), 2);
        assert!(String::from_utf8(progress).unwrap().ends_with("\r2 files copied."));

        let mut archive = ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut data = Vec::new();
        archive
            .by_name("out/a1.out")
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        assert_eq!(data, b"3\n");
    }

    #[test]
    fn rejects_wrong_extensions_and_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("pack.tar");
        build_tar(&tar_path, &[("in/a1.in", b"1\n")]);
        let mut progress = Vec::new();

        let not_zip = dir.path().join("pack.7z");
        assert!(tar_to_zip(&tar_path, &not_zip, &mut progress).is_err());

        let not_tar = dir.path().join("pack.tgz");
        std::fs::write(&not_tar, b"x").unwrap();
        assert!(tar_to_zip(&not_tar, &dir.path().join("o.zip"), &mut progress).is_err());

        let existing = dir.path().join("taken.zip");
        std::fs::write(&existing, b"keep").unwrap();
        assert!(matches!(
            tar_to_zip(&tar_path, &existing, &mut progress),
            Err(TestboxError::Setup(_))
        ));
        assert_eq!(std::fs::read(&existing).unwrap(), b"keep");
    }
}
