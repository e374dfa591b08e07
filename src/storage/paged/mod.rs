//! # Paged File Store
//!
//! `PagedFileStore` keeps its elements in a temp file and reads and writes
//! them through a tiny page cache, so stores far larger than memory need only
//! `ways × page_bytes` of RAM.
//!
//! ## File Layout
//!
//! ```text
//! Offset 0:                  element 0   (element_bytes)
//! Offset element_bytes:      element 1
//! ...
//! Offset (N-1)*element_bytes element N-1
//! ```
//!
//! No header. The file is pre-zeroed to `N × element_bytes` at construction.
//!
//! ## Pages
//!
//! The page size is the largest multiple of `element_bytes` within the page
//! byte budget (at least one element), so an element never straddles two
//! pages:
//!
//! ```text
//! page_no   = (index × element_bytes) / page_bytes
//! in_page   = (index × element_bytes) % page_bytes
//! ```
//!
//! ## Concurrency
//!
//! The page cache is mutable state touched by `get` as well as `set`. It sits
//! behind a `parking_lot::Mutex` held for the whole operation, so operations
//! on one instance are mutually exclusive end-to-end and the store reports
//! [`ThreadSafety::Serialized`].
//!
//! ## Submodules
//!
//! - `device`: `PageDevice` trait, file and in-memory devices
//! - `policy`: `EvictionPolicy` trait, LRU and SIEVE
//! - `cache`: generic N-way write-back `PageCache`

mod cache;
mod device;
mod policy;

use std::marker::PhantomData;
use std::path::Path;

use eyre::Result;
use parking_lot::Mutex;
use tracing::debug;

use crate::codec::{decode_from_bytes, encode_to_bytes, ElementCodec};
use crate::config::StoreConfig;
use crate::storage::{
    byte_len, check_index, element_bytes, BackendKind, IndexedStore, TempFile, ThreadSafety,
};

pub use cache::{CacheStats, PageCache};
pub use device::{FilePageDevice, MemPageDevice, PageDevice};
pub use policy::{AnyPolicy, EvictionPolicy, LruPolicy, SievePolicy};

type FileCache = PageCache<FilePageDevice, AnyPolicy>;

/// Page size for `element_bytes` within `budget`: the largest multiple of the
/// element width that fits, never less than one element.
pub fn page_bytes_for(element_bytes: usize, budget: usize) -> usize {
    (budget / element_bytes).max(1) * element_bytes
}

pub struct PagedFileStore<T: ElementCodec> {
    len: u64,
    element_bytes: usize,
    page_bytes: usize,
    config: StoreConfig,
    cache: Mutex<FileCache>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ElementCodec> PagedFileStore<T> {
    /// Creates a zero-filled store of `len` elements backed by a new temp file.
    pub fn create(len: u64, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let element_bytes = element_bytes::<T>(BackendKind::PagedFile, len)?;
        let file_len = byte_len(len, element_bytes)?;

        let temp = TempFile::create_zeroed(config.temp_dir.as_deref(), file_len)?;
        let store = Self::from_temp(temp, len, element_bytes, config);

        debug!(
            len,
            element_bytes,
            page_bytes = store.page_bytes,
            ways = config.cache_ways,
            path = %store.path_display(),
            "created paged file store"
        );

        Ok(store)
    }

    fn from_temp(temp: TempFile, len: u64, element_bytes: usize, config: &StoreConfig) -> Self {
        let page_bytes = page_bytes_for(element_bytes, config.page_bytes);
        let device = FilePageDevice::new(temp, page_bytes);
        let policy = AnyPolicy::new(config.eviction, config.cache_ways);

        Self {
            len,
            element_bytes,
            page_bytes,
            config: config.clone(),
            cache: Mutex::new(PageCache::new(device, config.cache_ways, policy)),
            _marker: PhantomData,
        }
    }

    pub fn page_bytes(&self) -> usize {
        self.page_bytes
    }

    pub fn page_count(&self) -> u64 {
        self.cache.lock().device().page_count()
    }

    pub fn element_bytes(&self) -> usize {
        self.element_bytes
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Pages currently held by the cache.
    pub fn resident_pages(&self) -> Vec<u64> {
        self.cache.lock().resident_pages()
    }

    /// Path of the backing temp file.
    pub fn path(&self) -> std::path::PathBuf {
        self.cache.lock().device().temp().path().to_path_buf()
    }

    /// Writes back dirty pages and syncs the file.
    pub fn flush(&self) -> Result<()> {
        self.cache.lock().sync()
    }

    fn locate(&self, index: u64) -> (u64, usize) {
        let offset = index * self.element_bytes as u64;
        let page_no = offset / self.page_bytes as u64;
        let in_page = (offset % self.page_bytes as u64) as usize;
        (page_no, in_page)
    }

    fn path_display(&self) -> String {
        self.path().display().to_string()
    }
}

impl<T: ElementCodec> std::fmt::Debug for PagedFileStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedFileStore")
            .field("len", &self.len)
            .field("element_bytes", &self.element_bytes)
            .field("page_bytes", &self.page_bytes)
            .field("ways", &self.config.cache_ways)
            .finish_non_exhaustive()
    }
}

impl<T: ElementCodec> IndexedStore<T> for PagedFileStore<T> {
    fn size(&self) -> u64 {
        self.len
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::PagedFile
    }

    fn thread_safety(&self) -> ThreadSafety {
        ThreadSafety::Serialized
    }

    fn get(&self, index: u64, out: &mut T) -> Result<()> {
        check_index(index, self.len)?;
        let (page_no, in_page) = self.locate(index);

        let mut cache = self.cache.lock();
        let page = cache.page(page_no)?;
        decode_from_bytes(&page[in_page..in_page + self.element_bytes], out);
        Ok(())
    }

    fn set(&mut self, index: u64, value: &T) -> Result<()> {
        check_index(index, self.len)?;
        let (page_no, in_page) = self.locate(index);

        let cache = self.cache.get_mut();
        let page = cache.page_mut(page_no)?;
        encode_to_bytes(value, &mut page[in_page..in_page + self.element_bytes]);
        Ok(())
    }

    fn duplicate(&self) -> Result<Self> {
        let copy = {
            let mut cache = self.cache.lock();
            cache.flush()?;
            cache.device().temp().copy()?
        };

        let store = Self::from_temp(copy, self.len, self.element_bytes, &self.config);
        debug!(len = self.len, path = %store.path_display(), "duplicated paged file store");
        Ok(store)
    }

    fn allocate(&self) -> Result<Self> {
        let dir = self.path().parent().map(Path::to_path_buf);
        let config = StoreConfig {
            temp_dir: self.config.temp_dir.clone().or(dir),
            ..self.config.clone()
        };
        Self::create(self.len, &config)
    }

    fn release(self) -> Result<()> {
        self.cache.into_inner().into_device().into_temp().release()
    }
}
