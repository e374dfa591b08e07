//! # Store Configuration
//!
//! Numeric defaults live in [`constants`]; per-store settings live in
//! [`StoreConfig`], which [`crate::StoreBuilder`] fills in fluently.
//!
//! ## Why Centralization?
//!
//! Page size, cache ways, window span and batch sizes interact: a page must
//! hold an integral number of elements, a mapping window must start at an
//! aligned offset, and a batched insert must stay under SQLite's bound
//! parameter limit. Keeping the defaults together lets the compile-time
//! assertions in [`constants`] catch mismatches.

pub mod constants;
pub use constants::*;

use std::path::PathBuf;

/// Eviction policy used by the paged file store's page cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionKind {
    /// Evict the least recently used buffer.
    #[default]
    Lru,
    /// Second-chance eviction with a rotating hand and a visited bit.
    Sieve,
}

/// Settings shared by every backend. Fields that a backend does not use are
/// ignored by it.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory for temp files. `None` means the OS temp directory.
    pub temp_dir: Option<PathBuf>,
    /// Page byte budget for the paged file store.
    pub page_bytes: usize,
    /// Number of page buffers in the paged file store's cache.
    pub cache_ways: usize,
    pub eviction: EvictionKind,
    /// Maximum span of one mapping window for the mapped file store.
    pub map_window_bytes: u64,
    /// Maximum primitive slots per heap segment.
    pub max_segment_slots: usize,
    /// Maximum rows per INSERT during relational zero-fill.
    pub insert_batch_rows: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            page_bytes: DEFAULT_PAGE_BYTES,
            cache_ways: DEFAULT_CACHE_WAYS,
            eviction: EvictionKind::Lru,
            map_window_bytes: DEFAULT_MAP_WINDOW_BYTES,
            max_segment_slots: DEFAULT_MAX_SEGMENT_SLOTS,
            insert_batch_rows: DEFAULT_INSERT_BATCH_ROWS,
        }
    }
}

impl StoreConfig {
    pub(crate) fn validate(&self) -> eyre::Result<()> {
        eyre::ensure!(
            self.page_bytes >= MIN_PAGE_BYTES,
            "page byte budget {} is below the minimum of {}",
            self.page_bytes,
            MIN_PAGE_BYTES
        );
        eyre::ensure!(
            (1..=MAX_CACHE_WAYS).contains(&self.cache_ways),
            "cache ways {} must be within 1..={}",
            self.cache_ways,
            MAX_CACHE_WAYS
        );
        eyre::ensure!(
            self.map_window_bytes >= MAP_ALIGNMENT,
            "map window of {} bytes is smaller than the mapping alignment {}",
            self.map_window_bytes,
            MAP_ALIGNMENT
        );
        eyre::ensure!(self.max_segment_slots > 0, "segment slot ceiling must be positive");
        eyre::ensure!(self.insert_batch_rows > 0, "insert batch size must be positive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_cache_ways() {
        let config = StoreConfig {
            cache_ways: 0,
            ..StoreConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache ways 0"));
    }

    #[test]
    fn rejects_tiny_page_budget() {
        let config = StoreConfig {
            page_bytes: 8,
            ..StoreConfig::default()
        };

        assert!(config.validate().is_err());
    }
}
