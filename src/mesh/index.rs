//! Index types for mesh elements.
//!
//! Raw vertices and triangles are addressed through thin typed wrappers so a
//! triangle id can never be passed where a vertex is expected. The wrappers
//! are generic over the storage width: GPU index buffers are frequently
//! 16-bit, while offline tools prefer 32 or 64 bits.
//!
//! A width bounds how many elements can be addressed. Callers check element
//! counts with [`MeshIndex::fits`] before building ids, since
//! [`MeshIndex::from_usize`] only guards the conversion in debug builds.

use std::fmt::{self, Debug};
use std::hash::Hash;

/// Integer types usable as mesh element indices.
pub trait MeshIndex: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {
    /// Largest index that can be stored.
    const MAX: Self;

    /// Name of the integer type, for error messages.
    const NAME: &'static str;

    /// Convert from `usize`.
    ///
    /// # Panics
    /// Debug builds panic if the value does not fit.
    fn from_usize(v: usize) -> Self;

    /// Convert to `usize`.
    fn to_usize(self) -> usize;

    /// Whether `count` elements can all be addressed with this width.
    fn fits(count: usize) -> bool {
        count.checked_sub(1).map_or(true, |last| last <= Self::MAX.to_usize())
    }
}

macro_rules! impl_mesh_index {
    ($ty:ty) => {
        impl MeshIndex for $ty {
            const MAX: Self = <$ty>::MAX;
            const NAME: &'static str = stringify!($ty);

            #[inline]
            fn from_usize(v: usize) -> Self {
                debug_assert!(<$ty>::try_from(v).is_ok(), "index {} too large for {}", v, Self::NAME);
                v as $ty
            }

            #[inline]
            fn to_usize(self) -> usize {
                self as usize
            }
        }
    };
}

impl_mesh_index!(u16);
impl_mesh_index!(u32);
impl_mesh_index!(u64);

/// A raw vertex index: one entry in every per-vertex buffer.
///
/// Unified identities are expressed as `VertexId`s too, naming the first raw
/// vertex that carries the shared key.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct VertexId<I: MeshIndex = u32>(I);

/// Index of a triangle in a [`MeshGraph`](crate::graph::MeshGraph).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TriangleId<I: MeshIndex = u32>(I);

macro_rules! impl_index_type {
    ($name:ident, $display:literal) => {
        impl<I: MeshIndex> $name<I> {
            /// Create an id from a position in its buffer.
            #[inline]
            pub fn new(index: usize) -> Self {
                Self(I::from_usize(index))
            }

            /// Position in the buffer.
            #[inline]
            pub fn index(self) -> usize {
                self.0.to_usize()
            }
        }

        impl<I: MeshIndex> Debug for $name<I> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $display, self.index())
            }
        }
    };
}

impl_index_type!(VertexId, "V");
impl_index_type!(TriangleId, "T");
