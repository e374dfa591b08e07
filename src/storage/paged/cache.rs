//! # N-Way Page Cache
//!
//! A small write-back cache of whole pages in front of a [`PageDevice`].
//!
//! ## Buffers
//!
//! The cache owns exactly `ways` page buffers, allocated up front:
//!
//! ```text
//! PageBuffer {
//!     data: Box<[u8]>,        // page_bytes long
//!     page_no: Option<u64>,   // resident page, None when empty
//!     len: usize,             // valid bytes (last page may be short)
//!     dirty: bool,            // must be written back before reuse
//! }
//! ```
//!
//! ## Lookup
//!
//! 1. If a buffer holds the target page: hit, touch it, done.
//! 2. Otherwise pick an empty buffer, or ask the policy for a victim.
//! 3. If the victim is dirty, write it back to the device.
//! 4. Read the target page into the buffer and mark it resident.
//!
//! `page_mut()` marks the buffer dirty; nothing is written to the device
//! until the buffer is evicted or `flush()` runs.
//!
//! ## Locality
//!
//! With the default two ways the cache assumes strong locality. A working set
//! spanning more pages than ways thrashes: every access evicts, writes back if
//! dirty, and reloads. That is the accepted price of a tiny fixed footprint.
//!
//! ## Failure
//!
//! A failed write-back leaves the victim resident and dirty, so nothing is
//! lost. A failed read leaves the buffer empty. Either way the error
//! propagates; nothing is retried.

use eyre::Result;
use tracing::trace;

use super::device::PageDevice;
use super::policy::EvictionPolicy;

#[derive(Debug)]
struct PageBuffer {
    data: Box<[u8]>,
    page_no: Option<u64>,
    len: usize,
    dirty: bool,
}

impl PageBuffer {
    fn new(page_bytes: usize) -> Self {
        Self {
            data: vec![0u8; page_bytes].into_boxed_slice(),
            page_no: None,
            len: 0,
            dirty: false,
        }
    }

    fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }
}

/// Hit/miss counters, cumulative since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub write_backs: u64,
}

pub struct PageCache<D: PageDevice, P: EvictionPolicy> {
    device: D,
    policy: P,
    buffers: Vec<PageBuffer>,
    stats: CacheStats,
}

impl<D: PageDevice, P: EvictionPolicy> PageCache<D, P> {
    /// Creates a cache with one buffer per way. `policy` must have been built
    /// for the same number of ways.
    pub fn new(device: D, ways: usize, policy: P) -> Self {
        let page_bytes = device.page_bytes();
        let buffers = (0..ways.max(1)).map(|_| PageBuffer::new(page_bytes)).collect();

        Self {
            device,
            policy,
            buffers,
            stats: CacheStats::default(),
        }
    }

    pub fn ways(&self) -> usize {
        self.buffers.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// Pages currently resident, in way order.
    pub fn resident_pages(&self) -> Vec<u64> {
        self.buffers.iter().filter_map(|b| b.page_no).collect()
    }

    pub fn is_dirty(&self, page_no: u64) -> bool {
        self.buffers
            .iter()
            .any(|b| b.page_no == Some(page_no) && b.dirty)
    }

    pub fn page(&mut self, page_no: u64) -> Result<&[u8]> {
        let way = self.locate(page_no)?;
        Ok(self.buffers[way].bytes())
    }

    pub fn page_mut(&mut self, page_no: u64) -> Result<&mut [u8]> {
        let way = self.locate(page_no)?;
        let buffer = &mut self.buffers[way];
        buffer.dirty = true;
        Ok(buffer.bytes_mut())
    }

    /// Writes back every dirty buffer. Returns the number written.
    pub fn flush(&mut self) -> Result<usize> {
        let mut flushed = 0;
        for way in 0..self.buffers.len() {
            if self.write_back(way)? {
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    /// Writes back dirty buffers and syncs the device.
    pub fn sync(&mut self) -> Result<()> {
        self.flush()?;
        self.device.sync()
    }

    fn locate(&mut self, page_no: u64) -> Result<usize> {
        if let Some(way) = self.buffers.iter().position(|b| b.page_no == Some(page_no)) {
            self.stats.hits += 1;
            self.policy.touch(way);
            return Ok(way);
        }

        self.stats.misses += 1;
        let len = self.device.page_len(page_no)?;

        let way = match self.buffers.iter().position(|b| b.page_no.is_none()) {
            Some(empty) => empty,
            None => self.policy.victim(),
        };

        self.write_back(way)?;

        if let Some(evicted) = self.buffers[way].page_no.take() {
            self.stats.evictions += 1;
            trace!(evicted, loaded = page_no, way, "evicted page");
        }

        let buffer = &mut self.buffers[way];
        buffer.len = len;
        self.device.read_page(page_no, &mut buffer.data[..len])?;
        buffer.page_no = Some(page_no);
        buffer.dirty = false;

        self.policy.admit(way);
        Ok(way)
    }

    fn write_back(&mut self, way: usize) -> Result<bool> {
        let buffer = &mut self.buffers[way];
        let page_no = match buffer.page_no {
            Some(page_no) if buffer.dirty => page_no,
            _ => return Ok(false),
        };

        self.device.write_page(page_no, &buffer.data[..buffer.len])?;
        buffer.dirty = false;
        self.stats.write_backs += 1;
        trace!(page_no, way, "wrote back page");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::device::MemPageDevice;
    use super::super::policy::{LruPolicy, SievePolicy};
    use super::*;

    fn lru_cache(
        byte_len: usize,
        page_bytes: usize,
        ways: usize,
    ) -> PageCache<MemPageDevice, LruPolicy> {
        PageCache::new(MemPageDevice::new(byte_len, page_bytes), ways, LruPolicy::new(ways))
    }

    #[test]
    fn hit_after_first_load() {
        let mut cache = lru_cache(256, 64, 2);

        cache.page(1).unwrap();
        cache.page(1).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(cache.device().reads(), 1);
    }

    #[test]
    fn two_pages_never_thrash() {
        let mut cache = lru_cache(256, 64, 2);

        for _ in 0..10 {
            cache.page(0).unwrap();
            cache.page(3).unwrap();
        }

        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn three_pages_thrash_two_ways() {
        let mut cache = lru_cache(256, 64, 2);

        for _ in 0..3 {
            cache.page(0).unwrap();
            cache.page(1).unwrap();
            cache.page(2).unwrap();
        }

        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.stats().misses, 9);
        assert_eq!(cache.stats().evictions, 7);
    }

    #[test]
    fn dirty_page_written_back_on_eviction() {
        let mut cache = lru_cache(256, 64, 2);

        cache.page_mut(0).unwrap()[5] = 0xAA;
        assert!(cache.is_dirty(0));
        assert_eq!(cache.device().bytes()[5], 0);

        cache.page(1).unwrap();
        cache.page(2).unwrap();

        assert_eq!(cache.device().bytes()[5], 0xAA);
        assert_eq!(cache.stats().write_backs, 1);
        assert_eq!(cache.resident_pages(), vec![2, 1]);
    }

    #[test]
    fn evicted_page_reloads_with_written_value() {
        let mut cache = lru_cache(64 * 5, 64, 2);

        for page in 0..5u64 {
            cache.page_mut(page).unwrap()[0] = page as u8 + 1;
        }

        for page in 0..5u64 {
            assert_eq!(cache.page(page).unwrap()[0], page as u8 + 1);
        }
    }

    #[test]
    fn clean_eviction_skips_write() {
        let mut cache = lru_cache(256, 64, 2);

        cache.page(0).unwrap();
        cache.page(1).unwrap();
        cache.page(2).unwrap();

        assert_eq!(cache.device().writes(), 0);
    }

    #[test]
    fn flush_writes_all_dirty_buffers_once() {
        let mut cache = lru_cache(256, 64, 2);
        cache.page_mut(0).unwrap()[0] = 1;
        cache.page_mut(1).unwrap()[0] = 2;

        assert_eq!(cache.flush().unwrap(), 2);
        assert_eq!(cache.flush().unwrap(), 0);
        assert_eq!(cache.device().bytes()[64], 2);
        assert!(!cache.is_dirty(0));
    }

    #[test]
    fn short_last_page() {
        let mut cache = lru_cache(100, 64, 2);

        assert_eq!(cache.page(1).unwrap().len(), 36);
        cache.page_mut(1).unwrap()[35] = 9;
        cache.flush().unwrap();

        assert_eq!(cache.device().bytes()[99], 9);
    }

    #[test]
    fn out_of_bounds_page_is_error() {
        let mut cache = lru_cache(128, 64, 2);
        assert!(cache.page(2).is_err());
    }

    #[test]
    fn more_ways_hold_larger_working_set() {
        let mut cache = lru_cache(64 * 4, 64, 4);

        for _ in 0..5 {
            for page in 0..4 {
                cache.page(page).unwrap();
            }
        }

        assert_eq!(cache.stats().misses, 4);
    }

    #[test]
    fn sieve_keeps_hot_page_through_scan() {
        let mut cache = PageCache::new(MemPageDevice::new(64 * 8, 64), 2, SievePolicy::new(2));

        cache.page(0).unwrap();
        for page in 1..8 {
            cache.page(0).unwrap();
            cache.page(page).unwrap();
        }

        assert!(cache.resident_pages().contains(&0));
    }
}
