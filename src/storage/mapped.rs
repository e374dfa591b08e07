//! # Memory-Mapped File Store
//!
//! `MappedFileStore` uses the same flat temp-file layout as the paged store
//! but maps the file into the address space and marshals elements directly
//! in mapped memory. The OS page cache does eviction and write-back, which
//! is markedly faster than manual paging and needs no bookkeeping here.
//!
//! ## Windows
//!
//! A single mapping may not be able to span a very large file, so the file is
//! mapped in bounded windows:
//!
//! ```text
//! unit   = lcm(element_bytes, MAP_ALIGNMENT)
//! window = max(1, map_window_bytes / unit) × unit
//!
//! Offset 0:          window 0  (window bytes)
//! Offset window:     window 1
//! ...
//! Offset k×window:   window k  (remainder of the file)
//! ```
//!
//! Every window starts at a multiple of `MAP_ALIGNMENT`, as mapping offsets
//! must, and holds an integral number of elements, so an element never
//! spans two windows.
//!
//! ## Safety Model
//!
//! Mapped memory stays valid for as long as the `MmapMut` lives; the windows
//! are owned by the store and dropped before the temp file is deleted. `get`
//! borrows `&self` and `set` borrows `&mut self`, so the borrow checker rules
//! out a write racing a read within the process.
//!
//! ## Platform Behavior
//!
//! - Linux/macOS: `mmap(MAP_SHARED)`, `msync` on flush
//! - Windows: `CreateFileMapping` / `MapViewOfFile`, `FlushViewOfFile`

use std::marker::PhantomData;
use std::path::Path;

use eyre::Result;
use memmap2::{MmapMut, MmapOptions};
use tracing::debug;

use crate::codec::{decode_from_bytes, encode_to_bytes, ElementCodec};
use crate::config::{StoreConfig, MAP_ALIGNMENT};
use crate::error::{StorageIoExt, StoreError};
use crate::storage::{
    byte_len, check_index, element_bytes, BackendKind, IndexedStore, TempFile, ThreadSafety,
};

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Window span for `element_bytes` within `budget`. `None` on overflow.
pub fn window_bytes_for(element_bytes: usize, budget: u64) -> Option<u64> {
    let element_bytes = element_bytes as u64;
    let unit = (element_bytes / gcd(element_bytes, MAP_ALIGNMENT)).checked_mul(MAP_ALIGNMENT)?;
    (budget / unit).max(1).checked_mul(unit)
}

#[derive(Debug)]
pub struct MappedFileStore<T: ElementCodec> {
    len: u64,
    element_bytes: usize,
    window_bytes: u64,
    config: StoreConfig,
    // declared before `temp` so mappings are dropped before the file is deleted
    windows: Vec<MmapMut>,
    temp: TempFile,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ElementCodec> MappedFileStore<T> {
    /// Creates a zero-filled store of `len` elements in a new mapped temp file.
    pub fn create(len: u64, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let element_bytes = element_bytes::<T>(BackendKind::MappedFile, len)?;
        let file_len = byte_len(len, element_bytes)?;

        let temp = TempFile::create_zeroed(config.temp_dir.as_deref(), file_len)?;
        let store = Self::map(temp, len, element_bytes, config)?;

        debug!(
            len,
            element_bytes,
            windows = store.windows.len(),
            path = %store.temp.path().display(),
            "created mapped file store"
        );

        Ok(store)
    }

    fn map(temp: TempFile, len: u64, element_bytes: usize, config: &StoreConfig) -> Result<Self> {
        let window_bytes = window_bytes_for(element_bytes, config.map_window_bytes)
            .ok_or_else(|| StoreError::capacity(len, "mapping window size overflows u64"))?;

        let file_len = temp.len();
        let window_count = file_len.div_ceil(window_bytes);
        let mut windows = Vec::with_capacity(window_count as usize);

        for window in 0..window_count {
            let offset = window * window_bytes;
            let span = (file_len - offset).min(window_bytes) as usize;

            // SAFETY: MmapOptions::map_mut is unsafe because the mapped file may be
            // modified externally. This is safe because:
            // 1. The temp file was created by this store with a random name and is
            //    not shared with other processes
            // 2. offset is a multiple of MAP_ALIGNMENT and offset + span <= file_len
            // 3. The mapping is owned by this store and dropped before the file
            // 4. All access goes through get()/set(), which bounds-check the index
            let mmap = unsafe {
                MmapOptions::new()
                    .offset(offset)
                    .len(span)
                    .map_mut(temp.file())
                    .storage_io(|| {
                        format!(
                            "failed to map window {} ({} bytes at offset {}) of '{}'",
                            window,
                            span,
                            offset,
                            temp.path().display()
                        )
                    })?
            };
            windows.push(mmap);
        }

        Ok(Self {
            len,
            element_bytes,
            window_bytes,
            config: config.clone(),
            windows,
            temp,
            _marker: PhantomData,
        })
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn window_bytes(&self) -> u64 {
        self.window_bytes
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Writes dirty mapped pages back to the file.
    pub fn flush(&self) -> Result<()> {
        for (window, mmap) in self.windows.iter().enumerate() {
            mmap.flush().storage_io(|| {
                format!(
                    "failed to flush window {} of '{}'",
                    window,
                    self.temp.path().display()
                )
            })?;
        }
        Ok(())
    }

    fn locate(&self, index: u64) -> (usize, usize) {
        let offset = index * self.element_bytes as u64;
        let window = (offset / self.window_bytes) as usize;
        let in_window = (offset % self.window_bytes) as usize;
        (window, in_window)
    }
}

impl<T: ElementCodec> IndexedStore<T> for MappedFileStore<T> {
    fn size(&self) -> u64 {
        self.len
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::MappedFile
    }

    fn thread_safety(&self) -> ThreadSafety {
        ThreadSafety::Concurrent
    }

    fn get(&self, index: u64, out: &mut T) -> Result<()> {
        check_index(index, self.len)?;
        let (window, at) = self.locate(index);
        decode_from_bytes(&self.windows[window][at..at + self.element_bytes], out);
        Ok(())
    }

    fn set(&mut self, index: u64, value: &T) -> Result<()> {
        check_index(index, self.len)?;
        let (window, at) = self.locate(index);
        encode_to_bytes(value, &mut self.windows[window][at..at + self.element_bytes]);
        Ok(())
    }

    fn duplicate(&self) -> Result<Self> {
        self.flush()?;
        let copy = self.temp.copy()?;
        let store = Self::map(copy, self.len, self.element_bytes, &self.config)?;
        debug!(len = self.len, path = %store.path().display(), "duplicated mapped file store");
        Ok(store)
    }

    fn allocate(&self) -> Result<Self> {
        let config = StoreConfig {
            temp_dir: self
                .config
                .temp_dir
                .clone()
                .or_else(|| self.path().parent().map(Path::to_path_buf)),
            ..self.config.clone()
        };
        Self::create(self.len, &config)
    }

    fn release(self) -> Result<()> {
        let Self { windows, temp, .. } = self;
        drop(windows);
        temp.release()
    }
}
