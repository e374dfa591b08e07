//! # Page Devices
//!
//! `PageDevice` is the copy-based interface the page cache reads and writes
//! through. Keeping it separate from the cache lets eviction behaviour be
//! exercised against [`MemPageDevice`] without touching the filesystem.
//!
//! ```text
//! fn read_page(&self, page_no: u64, buf: &mut [u8]) -> Result<()>;
//! fn write_page(&mut self, page_no: u64, data: &[u8]) -> Result<()>;
//! ```
//!
//! Pages are numbered from zero and are `page_bytes()` long, except the last
//! page, which covers whatever remains of the device and may be shorter.

use std::cell::Cell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use eyre::{ensure, Result};

use crate::error::StorageIoExt;
use crate::storage::TempFile;

pub trait PageDevice: Send {
    fn page_bytes(&self) -> usize;

    /// Total device length in bytes.
    fn byte_len(&self) -> u64;

    fn page_count(&self) -> u64 {
        self.byte_len().div_ceil(self.page_bytes() as u64)
    }

    /// Length of `page_no`; only the last page may be short.
    fn page_len(&self, page_no: u64) -> Result<usize> {
        ensure!(
            page_no < self.page_count(),
            "page {} out of bounds (page_count={})",
            page_no,
            self.page_count()
        );
        let start = page_no * self.page_bytes() as u64;
        Ok((self.byte_len() - start).min(self.page_bytes() as u64) as usize)
    }

    /// Fills `buf` with the contents of `page_no`. `buf.len()` equals
    /// `page_len(page_no)`.
    fn read_page(&self, page_no: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes `data` over `page_no`. `data.len()` equals `page_len(page_no)`.
    fn write_page(&mut self, page_no: u64, data: &[u8]) -> Result<()>;

    /// Flushes written pages to durable storage.
    fn sync(&self) -> Result<()>;
}

/// Page device over a store's temp file.
#[derive(Debug)]
pub struct FilePageDevice {
    temp: TempFile,
    page_bytes: usize,
}

impl FilePageDevice {
    pub fn new(temp: TempFile, page_bytes: usize) -> Self {
        Self { temp, page_bytes }
    }

    pub fn temp(&self) -> &TempFile {
        &self.temp
    }

    pub fn into_temp(self) -> TempFile {
        self.temp
    }

    fn file(&self) -> &File {
        self.temp.file()
    }
}

impl PageDevice for FilePageDevice {
    fn page_bytes(&self) -> usize {
        self.page_bytes
    }

    fn byte_len(&self) -> u64 {
        self.temp.len()
    }

    fn read_page(&self, page_no: u64, buf: &mut [u8]) -> Result<()> {
        let offset = page_no * self.page_bytes as u64;
        let len = buf.len();
        let context = || {
            format!(
                "failed to read page {} ({} bytes at offset {}) from '{}'",
                page_no,
                len,
                offset,
                self.temp.path().display()
            )
        };

        let mut file = self.file();
        file.seek(SeekFrom::Start(offset)).storage_io(context)?;
        file.read_exact(buf).storage_io(context)
    }

    fn write_page(&mut self, page_no: u64, data: &[u8]) -> Result<()> {
        let offset = page_no * self.page_bytes as u64;
        let context = || {
            format!(
                "failed to write page {} ({} bytes at offset {}) to '{}'",
                page_no,
                data.len(),
                offset,
                self.temp.path().display()
            )
        };

        let mut file = self.file();
        file.seek(SeekFrom::Start(offset)).storage_io(context)?;
        file.write_all(data).storage_io(context)
    }

    fn sync(&self) -> Result<()> {
        self.temp.sync()
    }
}

/// In-memory page device that counts reads and writes.
#[derive(Debug, Clone)]
pub struct MemPageDevice {
    bytes: Vec<u8>,
    page_bytes: usize,
    reads: Cell<usize>,
    writes: usize,
}

impl MemPageDevice {
    pub fn new(byte_len: usize, page_bytes: usize) -> Self {
        Self {
            bytes: vec![0; byte_len],
            page_bytes,
            reads: Cell::new(0),
            writes: 0,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl PageDevice for MemPageDevice {
    fn page_bytes(&self) -> usize {
        self.page_bytes
    }

    fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_page(&self, page_no: u64, buf: &mut [u8]) -> Result<()> {
        let start = page_no as usize * self.page_bytes;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        self.reads.set(self.reads.get() + 1);
        Ok(())
    }

    fn write_page(&mut self, page_no: u64, data: &[u8]) -> Result<()> {
        let start = page_no as usize * self.page_bytes;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn last_page_is_short() {
        let device = MemPageDevice::new(100, 32);

        assert_eq!(device.page_count(), 4);
        assert_eq!(device.page_len(0).unwrap(), 32);
        assert_eq!(device.page_len(3).unwrap(), 4);
        assert!(device.page_len(4).is_err());
    }

    #[test]
    fn file_device_round_trips_pages() {
        let dir = tempdir().unwrap();
        let temp = TempFile::create_zeroed(Some(dir.path()), 96).unwrap();
        let mut device = FilePageDevice::new(temp, 32);

        device.write_page(1, &[7u8; 32]).unwrap();

        let mut buf = [0u8; 32];
        device.read_page(1, &mut buf).unwrap();
        assert_eq!(buf, [7u8; 32]);

        device.read_page(2, &mut buf).unwrap();
        assert_eq!(buf, [0u8; 32]);
    }

    #[test]
    fn file_device_read_past_end_is_storage_io() {
        let dir = tempdir().unwrap();
        let temp = TempFile::create_zeroed(Some(dir.path()), 32).unwrap();
        let device = FilePageDevice::new(temp, 32);

        let mut buf = [0u8; 32];
        let err = device.read_page(5, &mut buf).unwrap_err();

        assert!(crate::StoreError::of(&err).unwrap().is_storage_io());
    }
}
