//! # Store Builder
//!
//! `StoreBuilder` chains backend selection and tuning settings before
//! allocating a store:
//!
//! ```ignore
//! let store = StoreBuilder::new()
//!     .backend(Backend::PagedFile)
//!     .temp_dir("/scratch")
//!     .page_bytes(16 * 1024)
//!     .cache_ways(4)
//!     .eviction(EvictionKind::Sieve)
//!     .allocate::<[f64; 2]>(1_000_000)?;
//! ```
//!
//! ## Options
//!
//! | Option            | Default   | Used by                          |
//! |-------------------|-----------|----------------------------------|
//! | backend           | Heap      | all                              |
//! | temp_dir          | OS temp   | paged file, mapped file          |
//! | page_bytes        | 64 KiB    | paged file                       |
//! | cache_ways        | 2         | paged file                       |
//! | eviction          | Lru       | paged file                       |
//! | map_window_bytes  | 1 GiB     | mapped file                      |
//! | max_segment_slots | 16M slots | heap                             |
//! | insert_batch_rows | 500       | relational                       |
//!
//! Settings a backend does not use are ignored. The builder can be reused:
//! `allocate` borrows it, so several stores can share one configuration.

use std::path::PathBuf;

use eyre::Result;

use crate::codec::ElementCodec;
use crate::config::{EvictionKind, StoreConfig};
use crate::dispatch::{allocate_with, Backend};
use crate::storage::AnyStore;

#[derive(Debug, Clone)]
pub struct StoreBuilder {
    backend: Backend,
    config: StoreConfig,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            backend: Backend::Heap,
            config: StoreConfig::default(),
        }
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Directory for file-backed stores' temp files.
    pub fn temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn page_bytes(mut self, page_bytes: usize) -> Self {
        self.config.page_bytes = page_bytes;
        self
    }

    pub fn cache_ways(mut self, ways: usize) -> Self {
        self.config.cache_ways = ways;
        self
    }

    pub fn eviction(mut self, eviction: EvictionKind) -> Self {
        self.config.eviction = eviction;
        self
    }

    pub fn map_window_bytes(mut self, bytes: u64) -> Self {
        self.config.map_window_bytes = bytes;
        self
    }

    pub fn max_segment_slots(mut self, slots: usize) -> Self {
        self.config.max_segment_slots = slots;
        self
    }

    pub fn insert_batch_rows(mut self, rows: usize) -> Self {
        self.config.insert_batch_rows = rows;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Allocates a zero-filled store of `count` elements.
    pub fn allocate<T: ElementCodec>(&self, count: u64) -> Result<AnyStore<T>> {
        allocate_with(self.backend.clone(), count, &self.config)
    }
}
