//! # Store Errors
//!
//! Every public operation returns `eyre::Result`, the same carrier the rest of
//! the storage layer uses for rich context. The failures callers need to tell
//! apart are raised as a typed [`StoreError`] inside the report, so they can
//! be recovered with [`StoreError::of`] (or `report.downcast_ref()`):
//!
//! | Variant                   | Cause                                   | Retry? |
//! |---------------------------|-----------------------------------------|--------|
//! | `IndexOutOfRange`         | `index >= size`                         | never  |
//! | `SegmentIndexOutOfRange`  | index outside a segment writer's range  | never  |
//! | `CapacityExceeded`        | count/shape not representable           | never  |
//! | `UnsupportedElementShape` | backend cannot store the codec's slots  | never  |
//! | `StorageIo`               | file, mmap or SQLite failure            | never  |
//!
//! I/O failures propagate uniformly from every backend, including the
//! relational one: a failed statement is an error, not a log line.

use std::error::Error as StdError;

use thiserror::Error;

use crate::codec::ElementShape;
use crate::storage::BackendKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("index {index} out of range for store of size {size}")]
    IndexOutOfRange { index: u64, size: u64 },

    #[error("index {index} outside segment range {start}..{end}")]
    SegmentIndexOutOfRange { index: u64, start: u64, end: u64 },

    #[error("cannot represent {count} elements: {reason}")]
    CapacityExceeded { count: u64, reason: String },

    #[error("element shape {shape} is not supported by the {backend} backend: {reason}")]
    UnsupportedElementShape {
        shape: ElementShape,
        backend: BackendKind,
        reason: &'static str,
    },

    #[error("storage I/O failure: {context}")]
    StorageIo {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

impl StoreError {
    /// Returns the typed store error carried by `report`, if any.
    pub fn of(report: &eyre::Report) -> Option<&StoreError> {
        report.downcast_ref::<StoreError>()
    }

    pub fn is_index_out_of_range(&self) -> bool {
        matches!(
            self,
            StoreError::IndexOutOfRange { .. } | StoreError::SegmentIndexOutOfRange { .. }
        )
    }

    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, StoreError::CapacityExceeded { .. })
    }

    pub fn is_unsupported_shape(&self) -> bool {
        matches!(self, StoreError::UnsupportedElementShape { .. })
    }

    pub fn is_storage_io(&self) -> bool {
        matches!(self, StoreError::StorageIo { .. })
    }

    pub(crate) fn capacity(count: u64, reason: impl Into<String>) -> eyre::Report {
        eyre::Report::new(StoreError::CapacityExceeded {
            count,
            reason: reason.into(),
        })
    }

    pub(crate) fn unsupported(
        shape: ElementShape,
        backend: BackendKind,
        reason: &'static str,
    ) -> eyre::Report {
        eyre::Report::new(StoreError::UnsupportedElementShape {
            shape,
            backend,
            reason,
        })
    }
}

/// Converts a foreign error into [`StoreError::StorageIo`] with context,
/// mirroring `eyre::WrapErr::wrap_err_with`.
pub trait StorageIoExt<T> {
    fn storage_io<C, F>(self, context: F) -> eyre::Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> StorageIoExt<T> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn storage_io<C, F>(self, context: F) -> eyre::Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|source| {
            eyre::Report::new(StoreError::StorageIo {
                context: context().into(),
                source: Box::new(source),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn storage_io_keeps_context_and_source() {
        let result: Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));

        let report = result.storage_io(|| "failed to open page file").unwrap_err();
        let err = StoreError::of(&report).unwrap();

        assert!(err.is_storage_io());
        assert!(report.to_string().contains("failed to open page file"));
        assert_eq!(err.source().unwrap().to_string(), "denied");
    }

    #[test]
    fn capacity_error_is_recoverable_from_report() {
        let report = StoreError::capacity(u64::MAX, "byte length overflows u64");

        assert!(StoreError::of(&report).unwrap().is_capacity_exceeded());
        assert!(report.to_string().contains("byte length overflows u64"));
    }

    #[test]
    fn foreign_reports_are_not_store_errors() {
        let report = eyre::eyre!("something else");
        assert!(StoreError::of(&report).is_none());
    }
}
