//! # Primitive Slots
//!
//! A slot is one primitive component of an element. Every slot type is a
//! plain fixed-width number, so it can be viewed as native-endian bytes
//! through `zerocopy` without any unsafe code, and converted to and from a
//! SQLite value for the relational backend.

use std::fmt;

use rusqlite::types::{FromSqlError, FromSqlResult, Value, ValueRef};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// The primitive kind of an element's slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    U8,
    I16,
    I32,
    I64,
    U64,
    F32,
    F64,
}

/// Declared type of a relational value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlAffinity {
    Integer,
    Real,
}

impl SqlAffinity {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlAffinity::Integer => "INTEGER",
            SqlAffinity::Real => "REAL",
        }
    }
}

impl PrimitiveKind {
    /// Byte width of one slot of this kind.
    pub fn width(&self) -> usize {
        match self {
            PrimitiveKind::U8 => 1,
            PrimitiveKind::I16 => 2,
            PrimitiveKind::I32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
        }
    }

    /// Column affinity in SQLite, or `None` when SQLite's signed 64-bit
    /// INTEGER cannot hold every value of the kind.
    pub fn sql_affinity(&self) -> Option<SqlAffinity> {
        match self {
            PrimitiveKind::U8 | PrimitiveKind::I16 | PrimitiveKind::I32 | PrimitiveKind::I64 => {
                Some(SqlAffinity::Integer)
            }
            PrimitiveKind::F32 | PrimitiveKind::F64 => Some(SqlAffinity::Real),
            PrimitiveKind::U64 => None,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fixed-width primitive usable as an element slot.
///
/// `Default` is the zero value every store is initialized to.
pub trait Slot:
    Copy
    + Default
    + PartialEq
    + fmt::Debug
    + Send
    + Sync
    + IntoBytes
    + FromBytes
    + Immutable
    + KnownLayout
    + 'static
{
    const KIND: PrimitiveKind;

    fn to_sql_value(self) -> rusqlite::Result<Value>;

    fn from_sql_value(value: ValueRef<'_>) -> FromSqlResult<Self>;
}

macro_rules! integer_slot {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Slot for $ty {
                const KIND: PrimitiveKind = PrimitiveKind::$kind;

                #[inline]
                fn to_sql_value(self) -> rusqlite::Result<Value> {
                    i64::try_from(self)
                        .map(Value::Integer)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
                }

                #[inline]
                fn from_sql_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    match value {
                        ValueRef::Integer(i) => {
                            <$ty>::try_from(i).map_err(|_| FromSqlError::OutOfRange(i))
                        }
                        _ => Err(FromSqlError::InvalidType),
                    }
                }
            }
        )*
    };
}

macro_rules! float_slot {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Slot for $ty {
                const KIND: PrimitiveKind = PrimitiveKind::$kind;

                #[inline]
                fn to_sql_value(self) -> rusqlite::Result<Value> {
                    Ok(Value::Real(f64::from(self)))
                }

                #[inline]
                fn from_sql_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    match value {
                        ValueRef::Real(f) => Ok(f as $ty),
                        ValueRef::Integer(i) => Ok(i as $ty),
                        // SQLite stores NaN as NULL
                        ValueRef::Null => Ok(<$ty>::NAN),
                        _ => Err(FromSqlError::InvalidType),
                    }
                }
            }
        )*
    };
}

integer_slot! {
    u8 => U8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u64 => U64,
}

float_slot! {
    f32 => F32,
    f64 => F64,
}
