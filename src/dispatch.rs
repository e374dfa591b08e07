//! # Backend Dispatch
//!
//! Maps an element codec onto one of the concrete stores at runtime.
//!
//! ## Capabilities
//!
//! The slot kind of a codec decides its capability with a single match:
//!
//! | Slot kind | Capability      |
//! |-----------|-----------------|
//! | `f64`     | `Doubles`       |
//! | `f32`     | `Floats`        |
//! | `i64`     | `Longs`         |
//! | `u64`     | `UnsignedLongs` |
//! | `i32`     | `Ints`          |
//! | `i16`     | `Shorts`        |
//! | `u8`      | `Bytes`         |
//!
//! `Bytes` is the universal fallback and comes last: any codec wrapped in
//! [`crate::codec::Bytes`] lands there, and every backend accepts it.
//!
//! ## Support Matrix
//!
//! Heap and file backends accept every capability. The relational backend
//! rejects `UnsignedLongs`, which do not fit SQLite's signed INTEGER, and
//! every backend rejects shapes with zero slots.

use std::fmt;

use eyre::Result;
use tracing::debug;

use crate::codec::{ElementCodec, ElementShape, PrimitiveKind};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::storage::{
    AnyStore, BackendKind, HeapStore, MappedFileStore, PagedFileStore, RelationalStore,
    SharedConnection,
};

/// Where a store's elements live.
#[derive(Clone)]
pub enum Backend {
    Heap,
    PagedFile,
    MappedFile,
    /// Rows in a new table on this caller-owned connection.
    Relational(SharedConnection),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Heap => BackendKind::Heap,
            Backend::PagedFile => BackendKind::PagedFile,
            Backend::MappedFile => BackendKind::MappedFile,
            Backend::Relational(_) => BackendKind::Relational,
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind().name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Doubles,
    Floats,
    Longs,
    UnsignedLongs,
    Ints,
    Shorts,
    Bytes,
}

impl Capability {
    pub fn probe(shape: ElementShape) -> Capability {
        match shape.kind {
            PrimitiveKind::F64 => Capability::Doubles,
            PrimitiveKind::F32 => Capability::Floats,
            PrimitiveKind::I64 => Capability::Longs,
            PrimitiveKind::U64 => Capability::UnsignedLongs,
            PrimitiveKind::I32 => Capability::Ints,
            PrimitiveKind::I16 => Capability::Shorts,
            PrimitiveKind::U8 => Capability::Bytes,
        }
    }

    pub fn of<T: ElementCodec>() -> Capability {
        Self::probe(ElementShape::of::<T>())
    }

    pub fn supported_by(&self, backend: BackendKind) -> bool {
        !matches!(
            (self, backend),
            (Capability::UnsignedLongs, BackendKind::Relational)
        )
    }
}

/// Checks that `backend` can hold elements of `shape`.
pub fn validate(shape: ElementShape, backend: BackendKind) -> Result<Capability> {
    if shape.slots == 0 {
        return Err(StoreError::unsupported(shape, backend, "element has no slots"));
    }

    let capability = Capability::probe(shape);
    if !capability.supported_by(backend) {
        return Err(StoreError::unsupported(
            shape,
            backend,
            "slot kind does not fit SQLite's signed 64-bit INTEGER",
        ));
    }
    Ok(capability)
}

/// Allocates a zero-filled store of `count` elements with default settings.
pub fn allocate<T: ElementCodec>(backend: Backend, count: u64) -> Result<AnyStore<T>> {
    allocate_with(backend, count, &StoreConfig::default())
}

/// Allocates a zero-filled store of `count` elements with `config`.
pub fn allocate_with<T: ElementCodec>(
    backend: Backend,
    count: u64,
    config: &StoreConfig,
) -> Result<AnyStore<T>> {
    let capability = validate(ElementShape::of::<T>(), backend.kind())?;
    debug!(backend = ?backend, count, ?capability, "allocating store");

    let store = match backend {
        Backend::Heap => AnyStore::Heap(HeapStore::create(count, config)?),
        Backend::PagedFile => AnyStore::PagedFile(PagedFileStore::create(count, config)?),
        Backend::MappedFile => AnyStore::MappedFile(MappedFileStore::create(count, config)?),
        Backend::Relational(conn) => {
            AnyStore::Relational(RelationalStore::create(conn, count, config)?)
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Bytes;
    use crate::storage::IndexedStore;

    #[test]
    fn probe_matches_slot_kind() {
        assert_eq!(Capability::of::<f64>(), Capability::Doubles);
        assert_eq!(Capability::of::<[f32; 4]>(), Capability::Floats);
        assert_eq!(Capability::of::<[i64; 2]>(), Capability::Longs);
        assert_eq!(Capability::of::<u64>(), Capability::UnsignedLongs);
        assert_eq!(Capability::of::<i32>(), Capability::Ints);
        assert_eq!(Capability::of::<[i16; 3]>(), Capability::Shorts);
        assert_eq!(Capability::of::<Bytes<[u64; 2]>>(), Capability::Bytes);
    }

    #[test]
    fn relational_rejects_unsigned_longs() {
        let shape = ElementShape::new(PrimitiveKind::U64, 2);

        assert!(validate(shape, BackendKind::Heap).is_ok());
        let err = validate(shape, BackendKind::Relational).unwrap_err();
        assert!(StoreError::of(&err).unwrap().is_unsupported_shape());
    }

    #[test]
    fn zero_slots_rejected_everywhere() {
        let shape = ElementShape::new(PrimitiveKind::F64, 0);
        for backend in [
            BackendKind::Heap,
            BackendKind::PagedFile,
            BackendKind::MappedFile,
            BackendKind::Relational,
        ] {
            assert!(validate(shape, backend).is_err());
        }
    }

    #[test]
    fn allocate_builds_requested_backend() {
        let store = allocate::<[f64; 2]>(Backend::Heap, 5).unwrap();

        assert_eq!(store.backend_kind(), BackendKind::Heap);
        assert_eq!(store.size(), 5);
        assert_eq!(store.read(4).unwrap(), [0.0, 0.0]);
    }
}
