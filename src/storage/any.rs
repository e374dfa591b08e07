//! Runtime-selected store.
//!
//! `AnyStore` is an enum rather than a trait object because `IndexedStore`
//! returns `Self` from `duplicate` and `allocate`. Each variant delegates
//! directly to its concrete store.

use eyre::Result;

use crate::codec::ElementCodec;
use crate::storage::{
    BackendKind, HeapStore, IndexedStore, MappedFileStore, PagedFileStore, RelationalStore,
    ThreadSafety,
};

#[derive(Debug)]
pub enum AnyStore<T: ElementCodec> {
    Heap(HeapStore<T>),
    PagedFile(PagedFileStore<T>),
    MappedFile(MappedFileStore<T>),
    Relational(RelationalStore<T>),
}

macro_rules! delegate {
    ($self:expr, $store:ident => $body:expr) => {
        match $self {
            AnyStore::Heap($store) => $body,
            AnyStore::PagedFile($store) => $body,
            AnyStore::MappedFile($store) => $body,
            AnyStore::Relational($store) => $body,
        }
    };
}

macro_rules! delegate_wrap {
    ($self:expr, $store:ident => $body:expr) => {
        match $self {
            AnyStore::Heap($store) => $body.map(AnyStore::Heap),
            AnyStore::PagedFile($store) => $body.map(AnyStore::PagedFile),
            AnyStore::MappedFile($store) => $body.map(AnyStore::MappedFile),
            AnyStore::Relational($store) => $body.map(AnyStore::Relational),
        }
    };
}

impl<T: ElementCodec> AnyStore<T> {
    pub fn as_heap(&self) -> Option<&HeapStore<T>> {
        match self {
            AnyStore::Heap(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_heap_mut(&mut self) -> Option<&mut HeapStore<T>> {
        match self {
            AnyStore::Heap(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_paged(&self) -> Option<&PagedFileStore<T>> {
        match self {
            AnyStore::PagedFile(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapped(&self) -> Option<&MappedFileStore<T>> {
        match self {
            AnyStore::MappedFile(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_relational(&self) -> Option<&RelationalStore<T>> {
        match self {
            AnyStore::Relational(s) => Some(s),
            _ => None,
        }
    }
}

impl<T: ElementCodec> IndexedStore<T> for AnyStore<T> {
    fn size(&self) -> u64 {
        delegate!(self, s => s.size())
    }

    fn backend_kind(&self) -> BackendKind {
        delegate!(self, s => s.backend_kind())
    }

    fn thread_safety(&self) -> ThreadSafety {
        delegate!(self, s => s.thread_safety())
    }

    #[inline]
    fn get(&self, index: u64, out: &mut T) -> Result<()> {
        delegate!(self, s => s.get(index, out))
    }

    #[inline]
    fn set(&mut self, index: u64, value: &T) -> Result<()> {
        delegate!(self, s => s.set(index, value))
    }

    fn duplicate(&self) -> Result<Self> {
        delegate_wrap!(self, s => s.duplicate())
    }

    fn allocate(&self) -> Result<Self> {
        delegate_wrap!(self, s => s.allocate())
    }

    fn release(self) -> Result<()> {
        delegate!(self, s => s.release())
    }
}

impl<T: ElementCodec> From<HeapStore<T>> for AnyStore<T> {
    fn from(store: HeapStore<T>) -> Self {
        AnyStore::Heap(store)
    }
}

impl<T: ElementCodec> From<PagedFileStore<T>> for AnyStore<T> {
    fn from(store: PagedFileStore<T>) -> Self {
        AnyStore::PagedFile(store)
    }
}

impl<T: ElementCodec> From<MappedFileStore<T>> for AnyStore<T> {
    fn from(store: MappedFileStore<T>) -> Self {
        AnyStore::MappedFile(store)
    }
}

impl<T: ElementCodec> From<RelationalStore<T>> for AnyStore<T> {
    fn from(store: RelationalStore<T>) -> Self {
        AnyStore::Relational(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    #[test]
    fn delegates_to_variant() {
        let heap = HeapStore::<[i32; 2]>::create(4, &StoreConfig::default()).unwrap();
        let mut store = AnyStore::from(heap);

        store.set(3, &[1, 2]).unwrap();

        assert_eq!(store.backend_kind(), BackendKind::Heap);
        assert_eq!(store.thread_safety(), ThreadSafety::Concurrent);
        assert_eq!(store.read(3).unwrap(), [1, 2]);
        assert!(store.as_heap().is_some());
        assert!(store.as_paged().is_none());
    }

    #[test]
    fn duplicate_keeps_variant() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            temp_dir: Some(dir.path().to_path_buf()),
            ..StoreConfig::default()
        };
        let store = AnyStore::from(PagedFileStore::<f64>::create(8, &config).unwrap());

        let copy = store.duplicate().unwrap();
        let fresh = store.allocate().unwrap();

        assert!(copy.as_paged().is_some());
        assert_eq!(fresh.backend_kind(), BackendKind::PagedFile);
        assert_eq!(fresh.size(), 8);
    }
}
