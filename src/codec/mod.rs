//! # Element Codec
//!
//! Every store is generic over "any fixed-shape numeric value". An element
//! type declares, once, which primitive kind its slots are and how many it
//! needs, then marshals itself into and out of a caller-owned flat buffer:
//!
//! ```text
//! struct Complex { re: f64, im: f64 }
//!
//! impl ElementCodec for Complex {
//!     type Slot = f64;
//!     const SLOTS: usize = 2;
//!     fn encode(&self, buf: &mut [f64], offset: usize) {
//!         buf[offset] = self.re;
//!         buf[offset + 1] = self.im;
//!     }
//!     fn decode(&mut self, buf: &[f64], offset: usize) {
//!         self.re = buf[offset];
//!         self.im = buf[offset + 1];
//!     }
//! }
//! ```
//!
//! There is no error path: the buffer is always sized by the store, which
//! knows `SLOTS` up front.
//!
//! ## Byte Layout
//!
//! File-backed stores persist an element as its slots in declared order,
//! native-endian, with no padding or header. [`encode_to_bytes`] and
//! [`decode_from_bytes`] perform that conversion through a stack scratch
//! buffer, viewing the slots as bytes with `zerocopy`.
//!
//! ## Byte Fallback
//!
//! [`Bytes`] re-expresses any codec as `u8` slots. It is the universal
//! capability: any element can be stored as its raw bytes when a backend
//! should not see its native kind.

mod slot;

use std::fmt;

use smallvec::{smallvec, SmallVec};
use zerocopy::IntoBytes;

pub use slot::{PrimitiveKind, Slot, SqlAffinity};

/// Slots kept inline before a scratch buffer spills to the heap.
pub const INLINE_SLOTS: usize = 16;

/// Stack-first scratch buffer for one element's slots.
pub type SlotScratch<S> = SmallVec<[S; INLINE_SLOTS]>;

/// Marshalling contract shared by every store backend.
///
/// `Default` must produce the element's zero value, which is what a fresh
/// store reads back at every index.
pub trait ElementCodec: Clone + Default + Send + Sync + 'static {
    type Slot: Slot;

    /// Slots per element.
    const SLOTS: usize;

    /// Writes `SLOTS` slots starting at `buf[offset]`.
    fn encode(&self, buf: &mut [Self::Slot], offset: usize);

    /// Reads `SLOTS` slots starting at `buf[offset]`.
    fn decode(&mut self, buf: &[Self::Slot], offset: usize);
}

/// The fixed set of primitive components describing one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementShape {
    pub kind: PrimitiveKind,
    pub slots: usize,
}

impl ElementShape {
    pub fn new(kind: PrimitiveKind, slots: usize) -> Self {
        Self { kind, slots }
    }

    pub fn of<T: ElementCodec>() -> Self {
        Self {
            kind: <T::Slot as Slot>::KIND,
            slots: T::SLOTS,
        }
    }

    /// Bytes per element, or `None` if the product overflows.
    pub fn byte_width(&self) -> Option<usize> {
        self.slots.checked_mul(self.kind.width())
    }
}

impl fmt::Display for ElementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.slots, self.kind)
    }
}

macro_rules! scalar_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ElementCodec for $ty {
                type Slot = $ty;
                const SLOTS: usize = 1;

                #[inline]
                fn encode(&self, buf: &mut [$ty], offset: usize) {
                    buf[offset] = *self;
                }

                #[inline]
                fn decode(&mut self, buf: &[$ty], offset: usize) {
                    *self = buf[offset];
                }
            }
        )*
    };
}

scalar_codec!(u8, i16, i32, i64, u64, f32, f64);

impl<S: Slot, const N: usize> ElementCodec for [S; N]
where
    [S; N]: Default,
{
    type Slot = S;
    const SLOTS: usize = N;

    #[inline]
    fn encode(&self, buf: &mut [S], offset: usize) {
        buf[offset..offset + N].copy_from_slice(self);
    }

    #[inline]
    fn decode(&mut self, buf: &[S], offset: usize) {
        self.copy_from_slice(&buf[offset..offset + N]);
    }
}

/// Byte-fallback adapter: stores any element as its raw native-endian bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytes<T>(pub T);

impl<T: ElementCodec> ElementCodec for Bytes<T> {
    type Slot = u8;
    const SLOTS: usize = T::SLOTS * std::mem::size_of::<T::Slot>();

    fn encode(&self, buf: &mut [u8], offset: usize) {
        encode_to_bytes(&self.0, &mut buf[offset..offset + Self::SLOTS]);
    }

    fn decode(&mut self, buf: &[u8], offset: usize) {
        decode_from_bytes(&buf[offset..offset + Self::SLOTS], &mut self.0);
    }
}

/// Encodes `value` as its native-endian slot bytes into `dst`, which must be
/// exactly `SLOTS * width` bytes long.
#[inline]
pub fn encode_to_bytes<T: ElementCodec>(value: &T, dst: &mut [u8]) {
    let mut scratch: SlotScratch<T::Slot> = smallvec![T::Slot::default(); T::SLOTS];
    value.encode(&mut scratch, 0);
    dst.copy_from_slice(scratch.as_slice().as_bytes());
}

/// Decodes an element from native-endian slot bytes written by
/// [`encode_to_bytes`].
#[inline]
pub fn decode_from_bytes<T: ElementCodec>(src: &[u8], out: &mut T) {
    let mut scratch: SlotScratch<T::Slot> = smallvec![T::Slot::default(); T::SLOTS];
    scratch.as_mut_slice().as_mut_bytes().copy_from_slice(src);
    out.decode(&scratch, 0);
}
