//! # Store Configuration Constants
//!
//! This module centralizes every numeric default used by the store backends,
//! grouping interdependent values together and documenting their relationships.
//!
//! ## Dependency Graph
//!
//! ```text
//! DEFAULT_MAX_SEGMENT_SLOTS (1 << 24 slots)
//!       │
//!       └─> elements_per_segment = max_segment_slots / SLOTS
//!             MAX_SEGMENTS bounds the segment table length
//!
//! DEFAULT_PAGE_BYTES (64 KiB)
//!       │
//!       ├─> MIN_PAGE_BYTES (must be <=)
//!       │
//!       └─> page_bytes = largest multiple of element_bytes <= budget
//!             (at least one element per page)
//!
//! DEFAULT_CACHE_WAYS (2)
//!       │
//!       └─> MAX_CACHE_WAYS (must be <=)
//!
//! MAP_ALIGNMENT (64 KiB)
//!       │
//!       └─> DEFAULT_MAP_WINDOW_BYTES (must be a multiple)
//!             window = multiple of lcm(element_bytes, MAP_ALIGNMENT)
//!
//! SQLITE_MAX_PARAMS (999)
//!       │
//!       ├─> MAX_RELATIONAL_COLUMNS (id + columns must fit in one statement)
//!       │
//!       └─> rows_per_batch = min(insert_batch_rows, SQLITE_MAX_PARAMS / (1 + SLOTS))
//! ```
//!
//! ## Critical Invariants
//!
//! Enforced by compile-time assertions:
//!
//! 1. `MIN_PAGE_BYTES <= DEFAULT_PAGE_BYTES`
//! 2. `DEFAULT_CACHE_WAYS <= MAX_CACHE_WAYS`
//! 3. `DEFAULT_MAP_WINDOW_BYTES % MAP_ALIGNMENT == 0`
//! 4. `MAX_RELATIONAL_COLUMNS + 1 <= SQLITE_MAX_PARAMS`

// ============================================================================
// HEAP SEGMENT CONFIGURATION
// ============================================================================

/// Default ceiling on primitive slots held by one heap segment.
///
/// A segment is one contiguous allocation. Keeping it bounded means large
/// stores never request a single allocation larger than 128 MiB of f64s.
pub const DEFAULT_MAX_SEGMENT_SLOTS: usize = 1 << 24;

/// Maximum number of segments a heap store may own.
pub const MAX_SEGMENTS: u64 = i32::MAX as u64;

// ============================================================================
// PAGED FILE CONFIGURATION
// ============================================================================

/// Default page byte budget for the manually paged file store.
/// The effective page size is the largest multiple of the element byte
/// width that fits in this budget.
pub const DEFAULT_PAGE_BYTES: usize = 64 * 1024;

/// Smallest page byte budget accepted by the builder.
pub const MIN_PAGE_BYTES: usize = 64;

/// Default number of page buffers held by the page cache.
pub const DEFAULT_CACHE_WAYS: usize = 2;

/// Upper bound on page buffers; beyond this a heap or mapped store is the
/// better fit.
pub const MAX_CACHE_WAYS: usize = 64;

const _: () = assert!(
    MIN_PAGE_BYTES <= DEFAULT_PAGE_BYTES,
    "MIN_PAGE_BYTES must be <= DEFAULT_PAGE_BYTES"
);

const _: () = assert!(
    DEFAULT_CACHE_WAYS >= 1 && DEFAULT_CACHE_WAYS <= MAX_CACHE_WAYS,
    "DEFAULT_CACHE_WAYS must be within 1..=MAX_CACHE_WAYS"
);

// ============================================================================
// MEMORY-MAPPED FILE CONFIGURATION
// ============================================================================

/// Alignment of mapping window offsets. 64 KiB covers the allocation
/// granularity of Windows and every common page size on Unix.
pub const MAP_ALIGNMENT: u64 = 64 * 1024;

/// Default span of one mapping window (1 GiB).
pub const DEFAULT_MAP_WINDOW_BYTES: u64 = 1 << 30;

const _: () = assert!(
    DEFAULT_MAP_WINDOW_BYTES % MAP_ALIGNMENT == 0,
    "DEFAULT_MAP_WINDOW_BYTES must be a multiple of MAP_ALIGNMENT"
);

// ============================================================================
// RELATIONAL STORE CONFIGURATION
// ============================================================================

/// Conservative bound on bound parameters per statement. SQLite builds
/// before 3.32 default SQLITE_MAX_VARIABLE_NUMBER to 999.
pub const SQLITE_MAX_PARAMS: usize = 999;

/// Maximum value columns per row.
pub const MAX_RELATIONAL_COLUMNS: usize = 512;

/// Default cap on rows per multi-row INSERT during zero-fill.
pub const DEFAULT_INSERT_BATCH_ROWS: usize = 500;

/// Attempts at drawing a fresh random table name before giving up.
pub const TABLE_NAME_ATTEMPTS: usize = 16;

/// Prefix of generated table names.
pub const TABLE_NAME_PREFIX: &str = "ixs_";

const _: () = assert!(
    MAX_RELATIONAL_COLUMNS < SQLITE_MAX_PARAMS,
    "id plus all value columns must fit in one statement"
);

// ============================================================================
// TEMP FILES
// ============================================================================

/// Prefix of temp files created by file-backed stores.
pub const TEMP_FILE_PREFIX: &str = "idxstore-";

/// Suffix of temp files created by file-backed stores.
pub const TEMP_FILE_SUFFIX: &str = ".ixd";
