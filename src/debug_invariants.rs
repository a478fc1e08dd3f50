//! Structural self-checks for the forest and the leaf mapper.
//!
//! [`Forest`](crate::forest::Forest) checks that its coordinate index and
//! arena agree, that every parent link points at a live node one level up
//! which lists the child back, and that refined cells have exactly `2^D`
//! children. [`LeafIndexMapper`](crate::data::mapper::LeafIndexMapper)
//! checks that its dense indices are a bijection onto `0..size`.
//!
//! The checks run after every structural change in debug builds, and in
//! release builds with the `strict-invariants` feature.

use crate::mesh_error::AmrError;

/// A structure that can verify its own consistency.
pub trait DebugInvariants {
    /// Panic on a broken invariant when checks are compiled in.
    fn debug_assert_invariants(&self);
    /// Report the first broken invariant as [`AmrError::InvariantViolation`].
    fn validate_invariants(&self) -> Result<(), AmrError>;
}

/// Run a `validate_invariants` call and panic with `context` if it fails.
/// Expands to nothing unless `debug_assertions` or `strict-invariants` is on.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $context:literal) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants"))]
        if let Err(err) = $check {
            panic!(concat!("invariant check failed in ", $context, ": {}"), err);
        }
    };
}
