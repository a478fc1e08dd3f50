//! AmrError: Unified error type for amr-transfer public APIs
//!
//! Every fallible operation in the crate (mesh queries, mapper lookups,
//! field access, and the adaptation protocol) reports through this type so a
//! failed adaptation step can be propagated with `?` to the caller.

use crate::topology::mesh::AdaptPhase;
use crate::topology::point::PersistentId;
use thiserror::Error;

/// Unified error type for amr-transfer operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmrError {
    /// Attempted to construct a PersistentId with a zero value (invalid).
    #[error("PersistentId must be non-zero (0 is reserved as invalid/sentinel)")]
    InvalidPersistentId,
    /// The cell is not (or no longer) part of the mesh.
    #[error("unknown cell `{0}`")]
    UnknownCell(PersistentId),
    /// A dense index was requested for a cell that is not a leaf.
    #[error("cell `{0}` is not a leaf and has no dense index")]
    NotALeaf(PersistentId),
    /// The mapper has no dense index for this leaf (stale mapper).
    #[error("leaf `{0}` is not covered by the mapper; was `update` called after adaptation?")]
    UnmappedCell(PersistentId),
    /// An adaptation protocol operation was invoked in the wrong phase.
    #[error("adaptation protocol violation: `{operation}` is not allowed in phase {phase:?}")]
    ProtocolViolation {
        operation: &'static str,
        phase: AdaptPhase,
    },
    /// A cell created by adaptation has a parent that did not exist before it.
    #[error("cell `{cell}` was created under parent `{parent}` which has no restricted value")]
    MissingParentRestriction {
        cell: PersistentId,
        parent: PersistentId,
    },
    /// A root cell appeared during adaptation; it has nothing to inherit from.
    #[error("new root cell `{0}` has no restricted value to inherit")]
    NoRestrictionSource(PersistentId),
    /// A cell above level 0 has no parent.
    #[error("cell `{0}` has level > 0 but no parent")]
    OrphanCell(PersistentId),
    /// `level_min` must not exceed `level_max`.
    #[error("invalid level bounds: level_min {min} > level_max {max}")]
    InvalidLevelBounds { min: u8, max: u8 },
    /// The field does not have one entry per mapped leaf.
    #[error("field has {field} entries but the mapper covers {mapper} leaves")]
    FieldSizeMismatch { field: usize, mapper: usize },
    /// A dense index outside the field.
    #[error("dense index {index} out of bounds for field of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    /// A forest needs at least one root cell per axis.
    #[error("forest extent must be non-zero along every axis")]
    InvalidExtent,
    /// Adaptation options failed validation.
    #[error("invalid adaptation options: {0}")]
    InvalidOptions(String),
    /// Structural invariant of a mesh or mapper was broken.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
