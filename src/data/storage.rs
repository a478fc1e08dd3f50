//! Dense storage for cell fields.
//!
//! The adaptation engine reads and writes the field only through
//! [`FieldStorage`], by [`DenseIndex`], and resizes it once per adaptation.
//! `Vec<f64>` implements it directly; [`VecStorage`] is a thin owned wrapper
//! for callers that want a distinct type.

use core::fmt::{self, Debug};

use crate::mesh_error::AmrError;
use crate::topology::point::DenseIndex;

/// Contiguous, indexable storage for one `f64` per leaf.
pub trait FieldStorage: Debug {
    /// Construct a buffer of `len`, filled with `fill`.
    fn with_len(len: usize, fill: f64) -> Self
    where
        Self: Sized;

    /// Current length in elements.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resize to `new_len`, filling new cells with `fill`.
    fn resize(&mut self, new_len: usize, fill: f64);

    /// Entire read-only buffer.
    fn as_slice(&self) -> &[f64];

    /// Entire mutable buffer.
    fn as_mut_slice(&mut self) -> &mut [f64];

    /// Value at `index`.
    fn get(&self, index: DenseIndex) -> Result<f64, AmrError> {
        let len = self.len();
        self.as_slice()
            .get(index.get())
            .copied()
            .ok_or(AmrError::IndexOutOfBounds {
                index: index.get(),
                len,
            })
    }

    /// Overwrite the value at `index`.
    fn set(&mut self, index: DenseIndex, value: f64) -> Result<(), AmrError> {
        let len = self.len();
        let slot = self
            .as_mut_slice()
            .get_mut(index.get())
            .ok_or(AmrError::IndexOutOfBounds {
                index: index.get(),
                len,
            })?;
        *slot = value;
        Ok(())
    }
}

impl FieldStorage for Vec<f64> {
    fn with_len(len: usize, fill: f64) -> Self {
        vec![fill; len]
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn resize(&mut self, new_len: usize, fill: f64) {
        Vec::resize(self, new_len, fill);
    }

    fn as_slice(&self) -> &[f64] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        self
    }
}

/// `Vec`-backed field storage.
#[derive(Clone, Default, PartialEq)]
pub struct VecStorage(pub(crate) Vec<f64>);

impl Debug for VecStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VecStorage")
            .field("len", &self.0.len())
            .finish()
    }
}

impl FieldStorage for VecStorage {
    fn with_len(len: usize, fill: f64) -> Self {
        Self(vec![fill; len])
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn resize(&mut self, new_len: usize, fill: f64) {
        self.0.resize(new_len, fill);
    }

    fn as_slice(&self) -> &[f64] {
        &self.0
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.0
    }
}

impl From<Vec<f64>> for VecStorage {
    fn from(v: Vec<f64>) -> Self {
        Self(v)
    }
}
