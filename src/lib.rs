//! # idxstore - Interchangeable Indexed Stores
//!
//! idxstore gives numeric code one positional interface over fixed-size
//! collections of fixed-shape elements, wherever those elements live:
//!
//! - **Heap**: sharded in-memory segments, O(1) access, no I/O
//! - **Paged file**: a temp file behind a tiny N-way page cache, for stores
//!   far larger than RAM
//! - **Mapped file**: the same temp file mapped in aligned windows, the OS
//!   does the caching
//! - **Relational**: one SQLite row per element on a caller-owned connection
//!
//! ## Quick Start
//!
//! ```ignore
//! use idxstore::{allocate, Backend, IndexedStore};
//!
//! let mut store = allocate::<[f64; 2]>(Backend::PagedFile, 1_000_000)?;
//! store.set(0, &[1.0, 2.0])?;
//!
//! let copy = store.duplicate()?;
//! store.set(0, &[0.0, 0.0])?;
//! assert_eq!(copy.read(0)?, [1.0, 2.0]);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │   allocate() / StoreBuilder  →  AnyStore<T> │
//! ├─────────────────────────────────────────────┤
//! │        IndexedStore<T: ElementCodec>        │
//! ├──────────┬────────────┬────────────┬────────┤
//! │   Heap   │ Paged file │ Mapped file│ SQLite │
//! │ segments │ page cache │  windows   │  rows  │
//! ├──────────┴────────────┴────────────┴────────┤
//! │   ElementCodec: element ⇄ flat slot buffer  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Element Model
//!
//! An element declares one primitive slot kind (`u8`, `i16`, `i32`, `i64`,
//! `u64`, `f32`, `f64`) and a slot count, and marshals itself into and out of
//! a flat slot buffer. Primitives and fixed arrays implement
//! [`ElementCodec`] out of the box; [`codec::Bytes`] stores any element as
//! raw bytes.
//!
//! ## Errors
//!
//! Every fallible call returns `eyre::Result`. The failures callers need to
//! branch on are carried as a [`StoreError`] inside the report:
//!
//! ```ignore
//! match store.get(i, &mut out) {
//!     Err(e) if StoreError::of(&e).is_some_and(StoreError::is_index_out_of_range) => ...,
//!     other => other?,
//! }
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events and installs no subscriber.
//!
//! ## Module Overview
//!
//! - [`codec`]: element codec contract, element shapes, byte fallback
//! - [`storage`]: the `IndexedStore` trait and the four backends
//! - [`dispatch`]: capability probing and runtime backend selection
//! - [`config`]: defaults and per-store settings
//! - [`error`]: the store error taxonomy

mod builder;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod storage;

pub use builder::StoreBuilder;
pub use codec::{Bytes, ElementCodec, ElementShape, PrimitiveKind, Slot};
pub use config::{EvictionKind, StoreConfig};
pub use dispatch::{allocate, allocate_with, Backend, Capability};
pub use error::StoreError;
pub use storage::{
    AnyStore, BackendKind, HeapStore, IndexedStore, MappedFileStore, PagedFileStore,
    RelationalStore, RowScratch, SegmentMut, SharedConnection, ThreadSafety,
};
