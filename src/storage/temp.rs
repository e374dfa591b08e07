//! # Scoped Temp Files
//!
//! File-backed stores keep their elements in a temp file they exclusively
//! own. `TempFile` wraps `tempfile::NamedTempFile`, so the file is deleted
//! when the owner is dropped on any exit path, error paths included. The
//! explicit [`TempFile::release`] deletes it eagerly and reports failures.
//!
//! ## Layout
//!
//! The file is a raw flat array: `len` bytes, pre-zeroed by `set_len`, no
//! header. Duplication copies those bytes at the OS level with
//! `std::fs::copy`, which uses `copy_file_range` on Linux and avoids
//! re-marshalling elements.

use std::fs::File;
use std::path::{Path, PathBuf};

use eyre::Result;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::{TEMP_FILE_PREFIX, TEMP_FILE_SUFFIX};
use crate::error::StorageIoExt;

#[derive(Debug)]
pub struct TempFile {
    file: NamedTempFile,
    len: u64,
}

impl TempFile {
    /// Creates a zero-filled temp file of `len` bytes in `dir`, or in the OS
    /// temp directory when `dir` is `None`.
    pub fn create_zeroed(dir: Option<&Path>, len: u64) -> Result<Self> {
        let file = Self::builder_tempfile(dir)?;

        file.as_file().set_len(len).storage_io(|| {
            format!(
                "failed to size temp file '{}' to {} bytes",
                file.path().display(),
                len
            )
        })?;

        debug!(path = %file.path().display(), len, "created temp file");

        Ok(Self { file, len })
    }

    /// Byte-for-byte copy of this file into a fresh temp file beside it.
    ///
    /// Callers must write back any buffered state first.
    pub fn copy(&self) -> Result<Self> {
        let file = Self::builder_tempfile(self.path().parent())?;

        let copied = std::fs::copy(self.path(), file.path()).storage_io(|| {
            format!(
                "failed to copy '{}' to '{}'",
                self.path().display(),
                file.path().display()
            )
        })?;

        if copied != self.len {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("copied {} of {} bytes", copied, self.len),
            ))
            .storage_io(|| format!("short copy of '{}'", self.path().display()));
        }

        debug!(
            from = %self.path().display(),
            to = %file.path().display(),
            bytes = copied,
            "copied temp file"
        );

        Ok(Self {
            file,
            len: self.len,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn file(&self) -> &File {
        self.file.as_file()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flushes file data to disk.
    pub fn sync(&self) -> Result<()> {
        self.file
            .as_file()
            .sync_data()
            .storage_io(|| format!("failed to sync '{}'", self.path().display()))
    }

    /// Deletes the file now.
    pub fn release(self) -> Result<()> {
        let path: PathBuf = self.file.path().to_path_buf();
        self.file
            .close()
            .storage_io(|| format!("failed to delete temp file '{}'", path.display()))?;
        debug!(path = %path.display(), "released temp file");
        Ok(())
    }

    fn builder_tempfile(dir: Option<&Path>) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_FILE_PREFIX).suffix(TEMP_FILE_SUFFIX);

        match dir {
            Some(dir) => builder
                .tempfile_in(dir)
                .storage_io(|| format!("failed to create temp file in '{}'", dir.display())),
            None => builder
                .tempfile()
                .storage_io(|| "failed to create temp file in the system temp directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};
    use tempfile::tempdir;

    #[test]
    fn create_zeroed_sets_length() {
        let dir = tempdir().unwrap();

        let temp = TempFile::create_zeroed(Some(dir.path()), 4096).unwrap();

        assert_eq!(temp.len(), 4096);
        assert_eq!(std::fs::metadata(temp.path()).unwrap().len(), 4096);
        assert!(temp.path().starts_with(dir.path()));
    }

    #[test]
    fn copy_is_independent() {
        let dir = tempdir().unwrap();
        let temp = TempFile::create_zeroed(Some(dir.path()), 16).unwrap();

        let mut file = temp.file();
        file.write_all(&[0xAB; 16]).unwrap();

        let copy = temp.copy().unwrap();
        assert_ne!(copy.path(), temp.path());

        file.seek(SeekFrom::Start(0)).unwrap();
        file.write_all(&[0x00; 16]).unwrap();

        let mut bytes = Vec::new();
        copy.file().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0xAB; 16]);
    }

    #[test]
    fn release_deletes_file() {
        let dir = tempdir().unwrap();
        let temp = TempFile::create_zeroed(Some(dir.path()), 8).unwrap();
        let path = temp.path().to_path_buf();

        temp.release().unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn drop_deletes_file() {
        let dir = tempdir().unwrap();
        let path = {
            let temp = TempFile::create_zeroed(Some(dir.path()), 8).unwrap();
            temp.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[test]
    fn missing_directory_is_storage_io() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let err = TempFile::create_zeroed(Some(&missing), 8).unwrap_err();

        assert!(crate::StoreError::of(&err).unwrap().is_storage_io());
    }
}
