//! The mesh collaborator seen by the adaptation engine.
//!
//! [`AdaptiveMesh`] is the read/mark/adapt surface the engine needs from a
//! hierarchical mesh: leaf and level iteration, per-cell queries, face
//! intersections, persistent ids, and the three-phase
//! `prepare` → `adapt` → `finalize` protocol tracked by [`AdaptPhase`].

use std::fmt::Debug;
use std::hash::Hash;

use crate::mesh_error::AmrError;
use crate::topology::point::PersistentId;

/// Refinement request for a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i8)]
pub enum Mark {
    Coarsen = -1,
    #[default]
    Keep = 0,
    Refine = 1,
}

/// One face contact of a cell.
///
/// A face shared with several finer cells yields one intersection per finer
/// cell, all carrying the same `face` number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intersection<C> {
    /// Local face number of the inside cell.
    pub face: usize,
    /// Cell on the other side, `None` on the domain boundary.
    pub neighbor: Option<C>,
}

impl<C> Intersection<C> {
    pub fn boundary(face: usize) -> Self {
        Self {
            face,
            neighbor: None,
        }
    }

    pub fn interior(face: usize, neighbor: C) -> Self {
        Self {
            face,
            neighbor: Some(neighbor),
        }
    }
}

/// State of the structural adaptation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdaptPhase {
    /// Marks may be placed; no structural change in progress.
    #[default]
    Idle,
    /// `prepare` was called; the mesh is waiting for `adapt`.
    Prepared,
    /// `adapt` ran; old bookkeeping is kept until `finalize`.
    Committed,
}

impl AdaptPhase {
    /// Check that marks may be placed.
    pub fn require_idle(self, operation: &'static str) -> Result<(), AmrError> {
        match self {
            AdaptPhase::Idle => Ok(()),
            phase => Err(AmrError::ProtocolViolation { operation, phase }),
        }
    }

    /// `Idle -> Prepared`; calling it again while prepared is a no-op.
    pub fn begin_prepare(&mut self) -> Result<(), AmrError> {
        match *self {
            AdaptPhase::Idle | AdaptPhase::Prepared => {
                *self = AdaptPhase::Prepared;
                Ok(())
            }
            phase => Err(AmrError::ProtocolViolation {
                operation: "prepare",
                phase,
            }),
        }
    }

    /// `Prepared -> Committed`.
    pub fn begin_commit(&mut self) -> Result<(), AmrError> {
        match *self {
            AdaptPhase::Prepared => {
                *self = AdaptPhase::Committed;
                Ok(())
            }
            phase => Err(AmrError::ProtocolViolation {
                operation: "adapt",
                phase,
            }),
        }
    }

    /// `Committed -> Idle`.
    pub fn begin_finalize(&mut self) -> Result<(), AmrError> {
        match *self {
            AdaptPhase::Committed => {
                *self = AdaptPhase::Idle;
                Ok(())
            }
            phase => Err(AmrError::ProtocolViolation {
                operation: "finalize",
                phase,
            }),
        }
    }
}

/// A hierarchically refinable mesh of cells.
///
/// Cells are addressed by the handle type [`AdaptiveMesh::Cell`]; handles of
/// cells that survive an adaptation remain usable, and
/// [`AdaptiveMesh::persistent_id`] gives each node an identity that never
/// changes and is never reused.
pub trait AdaptiveMesh {
    type Cell: Copy + Eq + Hash + Debug;

    /// All leaf cells, in the order a mapper should number them.
    fn leaves(&self) -> Vec<Self::Cell>;

    /// All cells (leaf or not) on `level`.
    fn level_cells(&self, level: u8) -> Vec<Self::Cell>;

    /// Deepest level present in the tree.
    fn max_level(&self) -> u8;

    fn level(&self, cell: Self::Cell) -> Result<u8, AmrError>;

    fn is_leaf(&self, cell: Self::Cell) -> Result<bool, AmrError>;

    /// `false` for cells produced by a closure (balancing) refinement rather
    /// than a requested one.
    fn is_regular(&self, cell: Self::Cell) -> Result<bool, AmrError>;

    /// Parent cell, `None` on level 0.
    fn parent(&self, cell: Self::Cell) -> Result<Option<Self::Cell>, AmrError>;

    /// Face contacts of `cell`.
    fn intersections(&self, cell: Self::Cell) -> Result<Vec<Intersection<Self::Cell>>, AmrError>;

    fn persistent_id(&self, cell: Self::Cell) -> Result<PersistentId, AmrError>;

    /// Request refinement or coarsening of a leaf. Only allowed while idle; a
    /// later mark replaces an earlier one.
    fn mark(&mut self, mark: Mark, cell: Self::Cell) -> Result<(), AmrError>;

    /// Current protocol phase.
    fn phase(&self) -> AdaptPhase;

    /// Announce an upcoming structural change.
    fn prepare(&mut self) -> Result<(), AmrError>;

    /// Perform the marked refinement/coarsening; returns whether the leaf set changed.
    fn adapt(&mut self) -> Result<bool, AmrError>;

    /// Release bookkeeping for cells removed by the last `adapt`.
    fn finalize(&mut self) -> Result<(), AmrError>;
}
