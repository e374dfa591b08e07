//! # Storage Module
//!
//! This module provides the interchangeable indexed stores. Every backend
//! implements [`IndexedStore`], so numeric code written against the trait
//! runs unchanged over heap memory, a temp file, or a SQLite table.
//!
//! ## Backends
//!
//! | Backend            | Type                | Blocks on I/O | Thread safety |
//! |--------------------|---------------------|---------------|---------------|
//! | Sharded heap       | [`HeapStore`]       | never         | Concurrent    |
//! | Paged temp file    | [`PagedFileStore`]  | yes           | Serialized    |
//! | Mapped temp file   | [`MappedFileStore`] | page faults   | Concurrent    |
//! | SQLite rows        | [`RelationalStore`] | yes           | Serialized    |
//!
//! [`AnyStore`] wraps all four behind one enum so callers can pick a backend
//! at runtime without generics over the store type.
//!
//! ## Store Contract
//!
//! ```text
//! size()                 -> u64        fixed at construction
//! get(index, &mut out)   -> Result<()> IndexOutOfRange if index >= size
//! set(index, &value)     -> Result<()> IndexOutOfRange if index >= size
//! duplicate()            -> Result<Self>  independent deep copy
//! allocate()             -> Result<Self>  same shape/size/backend, all zeros
//! release(self)          -> Result<()>    deletes temp file / drops table
//! ```
//!
//! `get` borrows `&self` and `set` borrows `&mut self`. Backends with shared
//! mutable state behind `get` (the page cache, the SQLite connection) guard
//! it with a `parking_lot::Mutex`, and report [`ThreadSafety::Serialized`].
//!
//! ## Resource Ownership
//!
//! Heap segments are ordinary allocations. File stores own a
//! `tempfile::NamedTempFile` and relational stores own their table; both are
//! released by `release()`, which reports failures, or on drop, which logs
//! them. A store that fails half-way through construction releases what it
//! created before returning the error.

mod any;
mod heap;
mod mapped;
pub mod paged;
mod relational;
mod temp;

use std::fmt;

use eyre::Result;

use crate::codec::{ElementCodec, ElementShape};
use crate::error::StoreError;

pub use any::AnyStore;
pub use heap::{HeapStore, SegmentMut};
pub use mapped::MappedFileStore;
pub use paged::PagedFileStore;
pub use relational::{RelationalStore, RowScratch, SharedConnection};
pub use temp::TempFile;

/// Backend family of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Heap,
    PagedFile,
    MappedFile,
    Relational,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Heap => "heap",
            BackendKind::PagedFile => "paged-file",
            BackendKind::MappedFile => "mapped-file",
            BackendKind::Relational => "relational",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a store tolerates use from several threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadSafety {
    /// Reads from many threads proceed in parallel; distinct indices touch
    /// disjoint memory and there is no shared cache state.
    Concurrent,
    /// Every operation holds the instance exclusively from start to finish.
    /// Sharing across threads is sound but gives no parallelism.
    Serialized,
}

/// Uniform positional access over a fixed number of fixed-shape elements.
pub trait IndexedStore<T: ElementCodec>: Sized + Send {
    fn size(&self) -> u64;

    fn shape(&self) -> ElementShape {
        ElementShape::of::<T>()
    }

    fn backend_kind(&self) -> BackendKind;

    fn thread_safety(&self) -> ThreadSafety;

    /// Decodes the element at `index` into `out`.
    fn get(&self, index: u64, out: &mut T) -> Result<()>;

    /// Encodes `value` at `index`.
    fn set(&mut self, index: u64, value: &T) -> Result<()>;

    /// Fully independent deep copy with its own memory, file or table.
    fn duplicate(&self) -> Result<Self>;

    /// Fresh zero-valued store with the same shape, size and backend.
    fn allocate(&self) -> Result<Self>;

    /// Releases the backing resource, reporting any failure.
    fn release(self) -> Result<()>;

    /// Convenience wrapper around [`IndexedStore::get`].
    fn read(&self, index: u64) -> Result<T> {
        let mut out = T::default();
        self.get(index, &mut out)?;
        Ok(out)
    }
}

#[inline]
pub(crate) fn check_index(index: u64, size: u64) -> Result<()> {
    if index >= size {
        return Err(StoreError::IndexOutOfRange { index, size }.into());
    }
    Ok(())
}

/// Byte length of `count` elements of `element_bytes`, or `CapacityExceeded`.
pub(crate) fn byte_len(count: u64, element_bytes: usize) -> Result<u64> {
    count
        .checked_mul(element_bytes as u64)
        .ok_or_else(|| StoreError::capacity(count, "byte length overflows u64"))
}

/// Element byte width of `T`, rejecting empty shapes.
pub(crate) fn element_bytes<T: ElementCodec>(backend: BackendKind, count: u64) -> Result<usize> {
    let shape = ElementShape::of::<T>();
    if shape.slots == 0 {
        return Err(StoreError::unsupported(shape, backend, "element has no slots"));
    }
    shape
        .byte_width()
        .ok_or_else(|| StoreError::capacity(count, "element byte width overflows usize"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_index_rejects_boundary() {
        assert!(check_index(4, 5).is_ok());

        let err = check_index(5, 5).unwrap_err();
        let store_err = StoreError::of(&err).unwrap();
        assert!(store_err.is_index_out_of_range());
        assert_eq!(err.to_string(), "index 5 out of range for store of size 5");
    }

    #[test]
    fn check_index_rejects_wrapped_negative() {
        let minus_one = -1i64 as u64;
        assert!(StoreError::of(&check_index(minus_one, 5).unwrap_err())
            .unwrap()
            .is_index_out_of_range());
    }

    #[test]
    fn byte_len_overflow_is_capacity_error() {
        let err = byte_len(u64::MAX, 16).unwrap_err();
        assert!(StoreError::of(&err).unwrap().is_capacity_exceeded());
        assert_eq!(byte_len(5, 16).unwrap(), 80);
    }

    #[test]
    fn empty_shape_is_unsupported() {
        let err = element_bytes::<[f64; 0]>(BackendKind::PagedFile, 10).unwrap_err();
        assert!(StoreError::of(&err).unwrap().is_unsupported_shape());
        assert_eq!(element_bytes::<[f64; 3]>(BackendKind::PagedFile, 10).unwrap(), 24);
    }
}
