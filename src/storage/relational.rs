//! # Relational Row Store
//!
//! `RelationalStore` keeps one SQLite row per element and one column per
//! slot:
//!
//! ```text
//! CREATE TABLE "ixs_3fa85f6457174562" (
//!     id INTEGER PRIMARY KEY,   -- element index
//!     v0 REAL,                  -- slot 0
//!     v1 REAL,                  -- slot 1
//!     ...
//! )
//! ```
//!
//! Access is strictly positional: `get` is a select by id, `set` an update by
//! id. There is no query planning.
//!
//! ## Table Naming
//!
//! Each store draws a random name and issues a plain `CREATE TABLE`. SQLite
//! rejects the statement atomically if the name is taken, in which case a new
//! name is drawn. There is no separate existence check to race against.
//!
//! ## Zero-Fill
//!
//! All N rows are inserted at construction in multi-row batches inside one
//! savepoint, which nests in a transaction the caller already has open on the
//! connection. A batch binds `rows × (1 + SLOTS)` parameters and stays under
//! `SQLITE_MAX_PARAMS`.
//!
//! ## Duplication
//!
//! A duplicate gets a new table with the same schema, filled server-side with
//! `INSERT INTO copy SELECT * FROM source`; no row crosses into Rust.
//!
//! ## Connection
//!
//! The connection is supplied by the caller as a [`SharedConnection`] and is
//! never opened or closed here. Every operation locks it for its whole
//! duration, so the store reports [`ThreadSafety::Serialized`].
//!
//! ## Float Values
//!
//! SQLite stores a NaN REAL as NULL, which float slots read back as NaN.
//! REAL columns keep integral values as integers, so `-0.0` reads back as
//! `0.0`.
//!
//! ## Errors
//!
//! Every SQLite failure propagates as `StorageIo`. A store that fails during
//! construction drops the table it created before returning the error, and a
//! store dropped without `release()` drops its table then.

use std::marker::PhantomData;
use std::sync::Arc;

use eyre::Result;
use parking_lot::Mutex;
use rusqlite::types::{FromSqlError, Value};
use rusqlite::{params_from_iter, Connection, ErrorCode, Row};
use smallvec::smallvec;
use tracing::{debug, warn};

use crate::codec::{ElementCodec, ElementShape, Slot, SlotScratch, SqlAffinity};
use crate::config::{
    StoreConfig, MAX_RELATIONAL_COLUMNS, SQLITE_MAX_PARAMS, TABLE_NAME_ATTEMPTS, TABLE_NAME_PREFIX,
};
use crate::error::{StorageIoExt, StoreError};
use crate::storage::{check_index, BackendKind, IndexedStore, ThreadSafety};

/// Caller-owned SQLite connection shared by relational stores.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Caller-owned scratch for decoding rows without allocating per call.
#[derive(Debug, Clone)]
pub struct RowScratch<T: ElementCodec> {
    slots: Vec<T::Slot>,
}

impl<T: ElementCodec> RowScratch<T> {
    pub fn new() -> Self {
        Self {
            slots: vec![T::Slot::default(); T::SLOTS],
        }
    }
}

impl<T: ElementCodec> Default for RowScratch<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct RelationalStore<T: ElementCodec> {
    conn: SharedConnection,
    table: String,
    len: u64,
    config: StoreConfig,
    released: bool,
    _marker: PhantomData<fn() -> T>,
}

/// Column affinity for `T`, or `UnsupportedElementShape`.
pub(crate) fn affinity_of<T: ElementCodec>() -> Result<SqlAffinity> {
    let shape = ElementShape::of::<T>();
    let unsupported = |reason| StoreError::unsupported(shape, BackendKind::Relational, reason);

    if shape.slots == 0 {
        return Err(unsupported("element has no slots"));
    }
    if shape.slots > MAX_RELATIONAL_COLUMNS {
        return Err(unsupported("element has more slots than the column limit"));
    }
    shape
        .kind
        .sql_affinity()
        .ok_or_else(|| unsupported("slot kind does not fit SQLite's signed 64-bit INTEGER"))
}

fn quoted(table: &str) -> String {
    format!("\"{}\"", table)
}

fn value_columns(slots: usize) -> String {
    (0..slots).map(|i| format!("v{}", i)).collect::<Vec<_>>().join(", ")
}

fn is_name_clash(err: &rusqlite::Error) -> bool {
    let (code, msg) = match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => (e.code, msg.as_str()),
        rusqlite::Error::SqlInputError { error, msg, .. } => (error.code, msg.as_str()),
        _ => return false,
    };
    code == ErrorCode::Unknown && msg.contains("already exists")
}

fn random_table_name() -> String {
    format!("{}{:016x}", TABLE_NAME_PREFIX, rand::random::<u64>())
}

/// Creates a fresh table with a random name and returns the name.
fn create_table(conn: &Connection, slots: usize, affinity: SqlAffinity) -> Result<String> {
    create_table_named(conn, slots, affinity, random_table_name)
}

/// Creates a table named by the first name from `next_name` that is not
/// taken, trying at most `TABLE_NAME_ATTEMPTS` names.
fn create_table_named(
    conn: &Connection,
    slots: usize,
    affinity: SqlAffinity,
    mut next_name: impl FnMut() -> String,
) -> Result<String> {
    let columns = (0..slots)
        .map(|i| format!("v{} {}", i, affinity.as_sql()))
        .collect::<Vec<_>>()
        .join(", ");

    for _ in 0..TABLE_NAME_ATTEMPTS {
        let table = next_name();
        let sql = format!(
            "CREATE TABLE {} (id INTEGER PRIMARY KEY, {})",
            quoted(&table),
            columns
        );

        match conn.execute(&sql, []) {
            Ok(_) => return Ok(table),
            Err(e) if is_name_clash(&e) => {
                debug!(table = %table, "table name taken, drawing another");
            }
            Err(e) => {
                return Err(e).storage_io(|| format!("failed to create table {}", table));
            }
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        "every generated table name was taken",
    ))
    .storage_io(|| format!("gave up after {} table name attempts", TABLE_NAME_ATTEMPTS))
}

fn multi_row_insert(table: &str, slots: usize, rows: usize) -> String {
    let row = format!("({})", vec!["?"; slots + 1].join(", "));
    format!(
        "INSERT INTO {} (id, {}) VALUES {}",
        quoted(table),
        value_columns(slots),
        vec![row.as_str(); rows].join(", ")
    )
}

fn read_slot<S: Slot>(row: &Row<'_>, column: usize) -> rusqlite::Result<S> {
    let value = row.get_ref(column)?;
    S::from_sql_value(value).map_err(|e| match e {
        FromSqlError::InvalidType => {
            rusqlite::Error::InvalidColumnType(column, format!("v{}", column), value.data_type())
        }
        other => {
            rusqlite::Error::FromSqlConversionFailure(column, value.data_type(), Box::new(other))
        }
    })
}

impl<T: ElementCodec> RelationalStore<T> {
    /// Creates a table of `len` zero-valued rows on `conn`.
    pub fn create(conn: SharedConnection, len: u64, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let affinity = affinity_of::<T>()?;
        if i64::try_from(len).is_err() {
            return Err(StoreError::capacity(len, "row ids are signed 64-bit"));
        }

        let table = create_table(&conn.lock(), T::SLOTS, affinity)?;

        // from here on, dropping `store` drops the table
        let store = Self {
            conn,
            table,
            len,
            config: config.clone(),
            released: false,
            _marker: PhantomData,
        };
        store.zero_fill()?;

        debug!(table = %store.table, len, slots = T::SLOTS, "created relational store");
        Ok(store)
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn connection(&self) -> &SharedConnection {
        &self.conn
    }

    /// Decodes the row at `index` into `out` using caller-owned scratch.
    pub fn get_with_scratch(
        &self,
        index: u64,
        out: &mut T,
        scratch: &mut RowScratch<T>,
    ) -> Result<()> {
        check_index(index, self.len)?;
        self.read_row(index, &mut scratch.slots)?;
        out.decode(&scratch.slots, 0);
        Ok(())
    }

    fn rows_per_batch(&self) -> usize {
        (SQLITE_MAX_PARAMS / (T::SLOTS + 1))
            .min(self.config.insert_batch_rows)
            .max(1)
    }

    fn zero_fill(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        let zero = T::Slot::default()
            .to_sql_value()
            .storage_io(|| "failed to convert zero slot")?;
        let batch = self.rows_per_batch() as u64;

        // a savepoint nests inside any transaction the caller has open
        let sp = conn
            .savepoint()
            .storage_io(|| format!("failed to begin zero-fill of {}", self.table))?;

        let mut params: Vec<Value> = Vec::with_capacity(batch as usize * (T::SLOTS + 1));
        let mut start = 0u64;
        while start < self.len {
            let rows = (self.len - start).min(batch);

            params.clear();
            for id in start..start + rows {
                params.push(Value::Integer(id as i64));
                params.extend(std::iter::repeat(zero.clone()).take(T::SLOTS));
            }

            let sql = multi_row_insert(&self.table, T::SLOTS, rows as usize);
            sp.prepare_cached(&sql)
                .and_then(|mut stmt| stmt.execute(params_from_iter(params.iter())))
                .storage_io(|| {
                    format!(
                        "failed to insert rows {}..{} into {}",
                        start,
                        start + rows,
                        self.table
                    )
                })?;

            start += rows;
        }

        sp.commit()
            .storage_io(|| format!("failed to commit zero-fill of {}", self.table))
    }

    fn read_row(&self, index: u64, slots: &mut [T::Slot]) -> Result<()> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            value_columns(T::SLOTS),
            quoted(&self.table)
        );

        conn.prepare_cached(&sql)
            .and_then(|mut stmt| {
                stmt.query_row([index as i64], |row| {
                    for (column, slot) in slots.iter_mut().enumerate() {
                        *slot = read_slot(row, column)?;
                    }
                    Ok(())
                })
            })
            .storage_io(|| format!("failed to read row {} of {}", index, self.table))
    }

    fn write_row(&self, index: u64, slots: &[T::Slot]) -> Result<()> {
        let conn = self.conn.lock();
        let assignments = (0..T::SLOTS)
            .map(|i| format!("v{} = ?{}", i, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            quoted(&self.table),
            assignments,
            T::SLOTS + 1
        );

        let mut params = Vec::with_capacity(T::SLOTS + 1);
        for slot in slots {
            params.push(
                slot.to_sql_value()
                    .storage_io(|| format!("failed to convert slot for row {}", index))?,
            );
        }
        params.push(Value::Integer(index as i64));

        let changed = conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(params.iter())))
            .storage_io(|| format!("failed to update row {} of {}", index, self.table))?;

        if changed != 1 {
            return Err(rusqlite::Error::QueryReturnedNoRows)
                .storage_io(|| format!("row {} of {} is missing", index, self.table));
        }
        Ok(())
    }

    fn copy_from(&self, source: &str) -> Result<()> {
        let conn = self.conn.lock();
        let target = quoted(&self.table);

        conn.execute(&format!("DELETE FROM {}", target), [])
            .and_then(|_| {
                conn.execute(
                    &format!("INSERT INTO {} SELECT * FROM {}", target, quoted(source)),
                    [],
                )
            })
            .storage_io(|| format!("failed to copy {} into {}", source, self.table))?;
        Ok(())
    }

    fn drop_table(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.conn
            .lock()
            .execute(&format!("DROP TABLE IF EXISTS {}", quoted(&self.table)), [])
            .storage_io(|| format!("failed to drop table {}", self.table))?;
        self.released = true;
        debug!(table = %self.table, "dropped relational store table");
        Ok(())
    }
}

impl<T: ElementCodec> IndexedStore<T> for RelationalStore<T> {
    fn size(&self) -> u64 {
        self.len
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn thread_safety(&self) -> ThreadSafety {
        ThreadSafety::Serialized
    }

    fn get(&self, index: u64, out: &mut T) -> Result<()> {
        check_index(index, self.len)?;
        let mut scratch: SlotScratch<T::Slot> = smallvec![T::Slot::default(); T::SLOTS];
        self.read_row(index, &mut scratch)?;
        out.decode(&scratch, 0);
        Ok(())
    }

    fn set(&mut self, index: u64, value: &T) -> Result<()> {
        check_index(index, self.len)?;
        let mut scratch: SlotScratch<T::Slot> = smallvec![T::Slot::default(); T::SLOTS];
        value.encode(&mut scratch, 0);
        self.write_row(index, &scratch)
    }

    fn duplicate(&self) -> Result<Self> {
        let affinity = affinity_of::<T>()?;
        let table = create_table(&self.conn.lock(), T::SLOTS, affinity)?;

        let copy = Self {
            conn: Arc::clone(&self.conn),
            table,
            len: self.len,
            config: self.config.clone(),
            released: false,
            _marker: PhantomData,
        };
        copy.copy_from(&self.table)?;

        debug!(from = %self.table, to = %copy.table, "duplicated relational store");
        Ok(copy)
    }

    fn allocate(&self) -> Result<Self> {
        Self::create(Arc::clone(&self.conn), self.len, &self.config)
    }

    fn release(mut self) -> Result<()> {
        self.drop_table()
    }
}

impl<T: ElementCodec> Drop for RelationalStore<T> {
    fn drop(&mut self) {
        if let Err(e) = self.drop_table() {
            warn!(table = %self.table, error = %e, "failed to drop table of discarded store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> SharedConnection {
        Arc::new(Mutex::new(Connection::open_in_memory().unwrap()))
    }

    fn create<T: ElementCodec>(conn: &SharedConnection, len: u64) -> RelationalStore<T> {
        RelationalStore::create(conn.clone(), len, &StoreConfig::default()).unwrap()
    }

    fn table_exists(conn: &SharedConnection, table: &str) -> bool {
        conn.lock()
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get::<_, i64>(0),
            )
            .unwrap()
            == 1
    }

    fn table_count(conn: &SharedConnection) -> i64 {
        conn.lock()
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap()
    }

    fn row_count(conn: &SharedConnection, table: &str) -> i64 {
        let sql = format!("SELECT count(*) FROM {}", quoted(table));
        conn.lock().query_row(&sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn creates_zero_filled_rows() {
        let conn = connection();
        let store = create::<[f64; 2]>(&conn, 1234);

        assert!(table_exists(&conn, store.table_name()));
        assert_eq!(row_count(&conn, store.table_name()), 1234);
        assert_eq!(store.read(1233).unwrap(), [0.0, 0.0]);
    }

    #[test]
    fn batch_respects_parameter_limit() {
        let conn = connection();
        let store = create::<[i64; 32]>(&conn, 100);

        assert_eq!(store.rows_per_batch(), SQLITE_MAX_PARAMS / 33);
        assert!(store.rows_per_batch() * 33 <= SQLITE_MAX_PARAMS);
        assert_eq!(row_count(&conn, store.table_name()), 100);
        assert_eq!(store.read(99).unwrap(), [0i64; 32]);
    }

    #[test]
    fn schema_uses_kind_affinity() {
        let conn = connection();
        let store = create::<[i16; 3]>(&conn, 1);

        let sql: String = conn
            .lock()
            .query_row(
                "SELECT sql FROM sqlite_master WHERE name = ?1",
                [store.table_name()],
                |row| row.get(0),
            )
            .unwrap();
        assert!(sql.contains("v2 INTEGER"));
    }

    #[test]
    fn scratch_reuse_across_reads() {
        let conn = connection();
        let mut store = create::<[f32; 3]>(&conn, 10);
        store.set(4, &[1.0, 2.0, 3.0]).unwrap();
        store.set(5, &[4.0, 5.0, 6.0]).unwrap();

        let mut scratch = RowScratch::new();
        let mut out = [0.0f32; 3];
        store.get_with_scratch(4, &mut out, &mut scratch).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0]);
        store.get_with_scratch(5, &mut out, &mut scratch).unwrap();
        assert_eq!(out, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn negative_zero_reads_back_as_zero() {
        let conn = connection();
        let mut store = create::<[f64; 2]>(&conn, 2);

        store.set(1, &[-0.0, 1.0]).unwrap();
        let value = store.read(1).unwrap();

        assert_eq!(value, [0.0, 1.0]);
        assert!(value[0].is_sign_positive());
    }

    #[test]
    fn u64_slots_are_unsupported() {
        let config = StoreConfig::default();
        let err = RelationalStore::<u64>::create(connection(), 4, &config).unwrap_err();
        assert!(StoreError::of(&err).unwrap().is_unsupported_shape());
    }

    #[test]
    fn release_drops_table() {
        let conn = connection();
        let store = create::<i64>(&conn, 3);
        let table = store.table_name().to_string();

        store.release().unwrap();

        assert!(!table_exists(&conn, &table));
    }

    #[test]
    fn drop_drops_table() {
        let conn = connection();
        let table = {
            let store = create::<i64>(&conn, 3);
            store.table_name().to_string()
        };

        assert!(!table_exists(&conn, &table));
    }

    #[test]
    fn sql_failure_propagates() {
        let conn = connection();
        let mut store = create::<f64>(&conn, 3);

        let sql = format!("DROP TABLE {}", quoted(store.table_name()));
        conn.lock().execute(&sql, []).unwrap();

        let err = store.set(1, &1.0).unwrap_err();
        assert!(StoreError::of(&err).unwrap().is_storage_io());
        let err = store.read(1).unwrap_err();
        assert!(StoreError::of(&err).unwrap().is_storage_io());
    }

    #[test]
    fn name_clash_detection() {
        let conn = connection();
        conn.lock().execute("CREATE TABLE t (id INTEGER)", []).unwrap();
        let err = conn.lock().execute("CREATE TABLE t (id INTEGER)", []).unwrap_err();

        assert!(is_name_clash(&err));
    }

    #[test]
    fn taken_name_draws_another() {
        let conn = connection();
        conn.lock().execute("CREATE TABLE ixs_taken (id INTEGER)", []).unwrap();

        let mut names = ["ixs_taken", "ixs_taken", "ixs_free"].into_iter();
        let table = create_table_named(&conn.lock(), 2, SqlAffinity::Real, || {
            names.next().unwrap().to_string()
        })
        .unwrap();

        assert_eq!(table, "ixs_free");
        assert!(table_exists(&conn, "ixs_free"));
    }

    #[test]
    fn gives_up_when_every_name_is_taken() {
        let conn = connection();
        conn.lock().execute("CREATE TABLE ixs_taken (id INTEGER)", []).unwrap();

        let err = create_table_named(&conn.lock(), 1, SqlAffinity::Integer, || {
            "ixs_taken".to_string()
        })
        .unwrap_err();

        assert!(StoreError::of(&err).unwrap().is_storage_io());
        assert_eq!(table_count(&conn), 1);
    }

    #[test]
    fn create_inside_caller_transaction() {
        let conn = connection();
        conn.lock().execute_batch("BEGIN").unwrap();

        let mut store = create::<[i32; 2]>(&conn, 50);
        store.set(49, &[4, 9]).unwrap();
        let copy = store.duplicate().unwrap();

        conn.lock().execute_batch("COMMIT").unwrap();

        assert_eq!(row_count(&conn, store.table_name()), 50);
        assert_eq!(copy.read(49).unwrap(), [4, 9]);
    }

    #[test]
    fn failed_zero_fill_drops_table() {
        let conn = connection();
        {
            let conn = conn.lock();
            conn.execute("CREATE TABLE caller_data (x INTEGER)", []).unwrap();
            let pages: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0)).unwrap();
            // room for the new table's root page only
            conn.execute_batch(&format!("PRAGMA max_page_count = {}", pages + 1))
                .unwrap();
        }

        let config = StoreConfig::default();
        let err = RelationalStore::<[f64; 8]>::create(conn.clone(), 20_000, &config).unwrap_err();

        assert!(StoreError::of(&err).unwrap().is_storage_io());
        assert_eq!(table_count(&conn), 1);
        assert!(table_exists(&conn, "caller_data"));
    }
}
