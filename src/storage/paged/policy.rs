//! # Eviction Policies
//!
//! The page cache owns a fixed number of buffers ("ways") and asks an
//! `EvictionPolicy` which one to reuse when a page misses and every way is
//! occupied. Policies only see way indices, never page contents, so they can
//! be tested on their own.
//!
//! ## LRU
//!
//! `LruPolicy` stamps each way with a logical clock on every touch and evicts
//! the smallest stamp. With two ways this is the classic "flip the LRU
//! pointer" cache: a working set of two pages never misses, a working set of
//! three or more pages misses on every access.
//!
//! ## SIEVE
//!
//! `SievePolicy` keeps a visited bit per way and a rotating hand:
//!
//! - On load: clear the visited bit
//! - On access: set the visited bit
//! - On eviction: scan from the hand
//!   - visited: clear the bit, move on (second chance)
//!   - not visited: evict this way and move the hand past it
//!
//! Pages touched once during a sweep lose their bit and go first, which keeps
//! a hot page resident through a sequential pass.

use crate::config::EvictionKind;

pub trait EvictionPolicy: Send {
    /// Records an access to `way`.
    fn touch(&mut self, way: usize);

    /// Records that a page was just loaded into `way`.
    fn admit(&mut self, way: usize) {
        self.touch(way);
    }

    /// Chooses the way to evict. Called only when every way holds a page.
    fn victim(&mut self) -> usize;

    /// Forgets all history.
    fn reset(&mut self);
}

#[derive(Debug, Clone)]
pub struct LruPolicy {
    stamps: Vec<u64>,
    clock: u64,
}

impl LruPolicy {
    pub fn new(ways: usize) -> Self {
        Self {
            stamps: vec![0; ways],
            clock: 0,
        }
    }
}

impl EvictionPolicy for LruPolicy {
    fn touch(&mut self, way: usize) {
        self.clock += 1;
        self.stamps[way] = self.clock;
    }

    fn victim(&mut self) -> usize {
        self.stamps
            .iter()
            .enumerate()
            .min_by_key(|(_, stamp)| **stamp)
            .map(|(way, _)| way)
            .unwrap_or(0)
    }

    fn reset(&mut self) {
        self.stamps.fill(0);
        self.clock = 0;
    }
}

#[derive(Debug, Clone)]
pub struct SievePolicy {
    visited: Vec<bool>,
    hand: usize,
}

impl SievePolicy {
    pub fn new(ways: usize) -> Self {
        Self {
            visited: vec![false; ways],
            hand: 0,
        }
    }
}

impl EvictionPolicy for SievePolicy {
    fn touch(&mut self, way: usize) {
        self.visited[way] = true;
    }

    fn admit(&mut self, way: usize) {
        self.visited[way] = false;
    }

    fn victim(&mut self) -> usize {
        if self.visited.is_empty() {
            return 0;
        }

        // terminates within two sweeps: the first clears every bit
        loop {
            if self.visited[self.hand] {
                self.visited[self.hand] = false;
                self.hand = (self.hand + 1) % self.visited.len();
                continue;
            }
            let way = self.hand;
            self.hand = (way + 1) % self.visited.len();
            return way;
        }
    }

    fn reset(&mut self) {
        self.visited.fill(false);
        self.hand = 0;
    }
}

/// Runtime-selected policy, so stores can carry one concrete cache type.
#[derive(Debug, Clone)]
pub enum AnyPolicy {
    Lru(LruPolicy),
    Sieve(SievePolicy),
}

impl AnyPolicy {
    pub fn new(kind: EvictionKind, ways: usize) -> Self {
        match kind {
            EvictionKind::Lru => AnyPolicy::Lru(LruPolicy::new(ways)),
            EvictionKind::Sieve => AnyPolicy::Sieve(SievePolicy::new(ways)),
        }
    }
}

impl EvictionPolicy for AnyPolicy {
    fn touch(&mut self, way: usize) {
        match self {
            AnyPolicy::Lru(p) => p.touch(way),
            AnyPolicy::Sieve(p) => p.touch(way),
        }
    }

    fn admit(&mut self, way: usize) {
        match self {
            AnyPolicy::Lru(p) => p.admit(way),
            AnyPolicy::Sieve(p) => p.admit(way),
        }
    }

    fn victim(&mut self) -> usize {
        match self {
            AnyPolicy::Lru(p) => p.victim(),
            AnyPolicy::Sieve(p) => p.victim(),
        }
    }

    fn reset(&mut self) {
        match self {
            AnyPolicy::Lru(p) => p.reset(),
            AnyPolicy::Sieve(p) => p.reset(),
        }
    }
}
