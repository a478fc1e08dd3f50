//! `PersistentId` and `DenseIndex`: the two ways of addressing a cell
//!
//! A hierarchical mesh addresses its cells in two unrelated ways:
//! - [`PersistentId`] names a tree node (leaf or not) and stays valid across
//!   structural adaptation. Ids are never reused.
//! - [`DenseIndex`] is a position in a field array. Only leaves have one, and
//!   it is recomputed by the mapper after every adaptation.
//!
//! Keeping them as distinct types makes it a compile error to index a resized
//! field with an identity key, or to use a stale array position as a map key.

use std::{fmt, num::NonZeroU64};

use crate::mesh_error::AmrError;

/// Stable identity of a tree node across adaptation steps.
///
/// # Memory layout
/// This type is `repr(transparent)` over `NonZeroU64`, so `Option<PersistentId>`
/// is the same size as a `u64`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct PersistentId(NonZeroU64);

static_assertions::assert_eq_size!(PersistentId, u64);
static_assertions::assert_eq_size!(Option<PersistentId>, u64);

impl PersistentId {
    /// Creates a new `PersistentId` from a raw `u64` value.
    ///
    /// # Errors
    ///
    /// Returns [`AmrError::InvalidPersistentId`] if `raw == 0`; 0 is reserved
    /// as an invalid or sentinel value.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use amr_transfer::topology::point::PersistentId;
    /// let p = PersistentId::new(1).unwrap();
    /// assert_eq!(p.get(), 1);
    /// ```
    #[inline]
    pub fn new(raw: u64) -> Result<Self, AmrError> {
        NonZeroU64::new(raw)
            .map(PersistentId)
            .ok_or(AmrError::InvalidPersistentId)
    }

    /// Returns the inner `u64` value of this `PersistentId`.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for PersistentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PersistentId").field(&self.get()).finish()
    }
}

/// Prints only the raw integer.
impl fmt::Display for PersistentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Position of a leaf in a dense field array.
///
/// Valid only between two adaptations of the mesh it was computed for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DenseIndex(usize);

impl DenseIndex {
    #[inline]
    pub const fn new(raw: usize) -> Self {
        DenseIndex(raw)
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for DenseIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
