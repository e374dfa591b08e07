//! # Sharded Heap Store
//!
//! `HeapStore` keeps elements as flat runs of primitive slots in ordinary heap
//! allocations. A single contiguous allocation cannot hold every store the
//! index range allows, so elements are split across segments:
//!
//! ```text
//! elements_per_segment = max_segment_slots / SLOTS
//!
//! segment = index / elements_per_segment
//! offset  = (index % elements_per_segment) × SLOTS
//!
//! segments[0]: [s0 s1 .. | s0 s1 .. | ...]   elements 0..eps
//! segments[1]: [s0 s1 .. | ...]              elements eps..2×eps
//! ...
//! segments[k]: trimmed to the elements it holds
//! ```
//!
//! The codec encodes straight into and decodes straight out of the segment
//! slice, so access is O(1) with no I/O and no intermediate buffer.
//!
//! ## Parallel Writes
//!
//! `set` takes `&mut self`. For parallel fills, [`HeapStore::segments_mut`]
//! splits the store into one [`SegmentMut`] per segment; each is `Send` and
//! covers a disjoint index range, so writers can run on separate threads
//! without locks.

use std::marker::PhantomData;

use eyre::Result;
use tracing::debug;

use crate::codec::{ElementCodec, ElementShape};
use crate::config::{StoreConfig, MAX_SEGMENTS};
use crate::error::StoreError;
use crate::storage::{check_index, BackendKind, IndexedStore, ThreadSafety};

#[derive(Debug, Clone)]
pub struct HeapStore<T: ElementCodec> {
    len: u64,
    elements_per_segment: u64,
    max_segment_slots: usize,
    segments: Vec<Box<[T::Slot]>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ElementCodec> HeapStore<T> {
    /// Creates a zero-filled store of `len` elements.
    pub fn create(len: u64, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let store = Self::with_segment_slots(len, config.max_segment_slots)?;

        debug!(
            len,
            segments = store.segments.len(),
            elements_per_segment = store.elements_per_segment,
            "created heap store"
        );

        Ok(store)
    }

    fn with_segment_slots(len: u64, max_segment_slots: usize) -> Result<Self> {
        let shape = ElementShape::of::<T>();
        if shape.slots == 0 {
            return Err(StoreError::unsupported(
                shape,
                BackendKind::Heap,
                "element has no slots",
            ));
        }

        let elements_per_segment = (max_segment_slots / T::SLOTS) as u64;
        if elements_per_segment == 0 {
            return Err(StoreError::capacity(
                len,
                format!(
                    "an element of {} slots exceeds the segment ceiling of {}",
                    T::SLOTS,
                    max_segment_slots
                ),
            ));
        }

        let segment_count = len.div_ceil(elements_per_segment);
        if segment_count > MAX_SEGMENTS {
            return Err(StoreError::capacity(
                len,
                format!("needs {} segments, limit is {}", segment_count, MAX_SEGMENTS),
            ));
        }

        let mut segments = Vec::with_capacity(segment_count as usize);
        let mut remaining = len;
        for _ in 0..segment_count {
            let held = remaining.min(elements_per_segment);
            let slots = held as usize * T::SLOTS;
            segments.push(vec![T::Slot::default(); slots].into_boxed_slice());
            remaining -= held;
        }

        Ok(Self {
            len,
            elements_per_segment,
            max_segment_slots,
            segments,
            _marker: PhantomData,
        })
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn elements_per_segment(&self) -> u64 {
        self.elements_per_segment
    }

    /// Splits the store into disjoint per-segment writers.
    pub fn segments_mut(&mut self) -> Vec<SegmentMut<'_, T>> {
        let eps = self.elements_per_segment;
        self.segments
            .iter_mut()
            .enumerate()
            .map(|(n, slots)| SegmentMut {
                first: n as u64 * eps,
                len: (slots.len() / T::SLOTS) as u64,
                slots,
                _marker: PhantomData,
            })
            .collect()
    }

    #[inline]
    fn locate(&self, index: u64) -> (usize, usize) {
        let segment = (index / self.elements_per_segment) as usize;
        let offset = (index % self.elements_per_segment) as usize * T::SLOTS;
        (segment, offset)
    }
}

impl<T: ElementCodec> IndexedStore<T> for HeapStore<T> {
    fn size(&self) -> u64 {
        self.len
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Heap
    }

    fn thread_safety(&self) -> ThreadSafety {
        ThreadSafety::Concurrent
    }

    #[inline]
    fn get(&self, index: u64, out: &mut T) -> Result<()> {
        check_index(index, self.len)?;
        let (segment, offset) = self.locate(index);
        out.decode(&self.segments[segment], offset);
        Ok(())
    }

    #[inline]
    fn set(&mut self, index: u64, value: &T) -> Result<()> {
        check_index(index, self.len)?;
        let (segment, offset) = self.locate(index);
        value.encode(&mut self.segments[segment], offset);
        Ok(())
    }

    fn duplicate(&self) -> Result<Self> {
        Ok(self.clone())
    }

    fn allocate(&self) -> Result<Self> {
        Self::with_segment_slots(self.len, self.max_segment_slots)
    }

    fn release(self) -> Result<()> {
        Ok(())
    }
}

/// Exclusive view of one heap segment, addressed by store-wide indices.
#[derive(Debug)]
pub struct SegmentMut<'a, T: ElementCodec> {
    first: u64,
    len: u64,
    slots: &'a mut [T::Slot],
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: ElementCodec> SegmentMut<'a, T> {
    /// Store-wide index range covered by this segment.
    pub fn range(&self) -> std::ops::Range<u64> {
        self.first..self.first + self.len
    }

    pub fn get(&self, index: u64, out: &mut T) -> Result<()> {
        let offset = self.offset(index)?;
        out.decode(&*self.slots, offset);
        Ok(())
    }

    pub fn set(&mut self, index: u64, value: &T) -> Result<()> {
        let offset = self.offset(index)?;
        value.encode(&mut *self.slots, offset);
        Ok(())
    }

    fn offset(&self, index: u64) -> Result<usize> {
        if !self.range().contains(&index) {
            return Err(StoreError::SegmentIndexOutOfRange {
                index,
                start: self.first,
                end: self.first + self.len,
            }
            .into());
        }
        Ok((index - self.first) as usize * T::SLOTS)
    }
}
