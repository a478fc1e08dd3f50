#![cfg_attr(docsrs, feature(doc_cfg))]
//! # amr-transfer
//!
//! amr-transfer decides where a hierarchically refinable finite-volume mesh
//! should be refined or coarsened and carries a cell-centred scalar field
//! across that change. It is written against a small mesh trait, so the same
//! engine runs on any tree-structured mesh that can report leaves, levels,
//! face neighbours and persistent node ids.
//!
//! ## Features
//! - Face-jump indicator with range-relative refine/coarsen thresholds
//! - Refinement propagated one layer to face neighbours, bounded by level limits
//! - Restriction of the leaf field onto every tree node, keyed by persistent id
//! - Top-down prolongation onto the adapted tree, including multi-level refinement
//! - An explicit `prepare` → `adapt` → `finalize` protocol with guarded phases
//! - An in-memory line/quad/octree [`forest::Forest`] with 2:1 balance closure
//!
//! ## Usage
//!
//! ```rust
//! use amr_transfer::prelude::*;
//!
//! let mut forest = LineForest::new([4]).unwrap();
//! let mut mapper = LeafIndexMapper::new(&forest).unwrap();
//! let mut field = vec![0.0, 0.0, 10.0, 10.0];
//!
//! let changed = adapt_step(&mut forest, &mut mapper, &mut field, 0, 2).unwrap();
//! assert!(changed);
//! assert_eq!(field, vec![0.0, 0.0, 0.0, 0.0, 10.0, 10.0, 10.0, 10.0]);
//! ```
//!
//! ## Determinism
//!
//! Leaves, levels and faces are visited in a fixed tree order, so the same
//! mesh and field always produce the same marks and the same transferred field.

pub mod adapt;
pub mod data;
pub mod debug_invariants;
pub mod forest;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::adapt::{AdaptOptions, AdaptReport, adapt_step, adapt_step_with};
    pub use crate::data::mapper::{CellMapper, LeafIndexMapper};
    pub use crate::data::storage::{FieldStorage, VecStorage};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::forest::{Forest, LineForest, OctForest, QuadForest, TreeCell};
    pub use crate::mesh_error::AmrError;
    pub use crate::topology::mesh::{AdaptPhase, AdaptiveMesh, Intersection, Mark};
    pub use crate::topology::point::{DenseIndex, PersistentId};
}
