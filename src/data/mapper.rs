//! Leaf ↔ dense index numbering.
//!
//! A mapper assigns every current leaf a [`DenseIndex`] in `[0, size)`. The
//! numbering is only valid until the mesh adapts; [`CellMapper::update`] must
//! be called after every structural change before the field is touched again.

use hashbrown::HashMap;

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::AmrError;
use crate::topology::mesh::AdaptiveMesh;
use crate::topology::point::{DenseIndex, PersistentId};

/// Numbering of the leaves of a mesh `M`.
pub trait CellMapper<M: AdaptiveMesh> {
    /// Dense index of a leaf.
    fn map(&self, mesh: &M, cell: M::Cell) -> Result<DenseIndex, AmrError>;

    /// Recompute the numbering for the current leaves of `mesh`.
    fn update(&mut self, mesh: &M) -> Result<(), AmrError>;

    /// Number of numbered leaves.
    fn size(&self) -> usize;
}

/// Numbers leaves in [`AdaptiveMesh::leaves`] order, keyed by persistent id.
#[derive(Debug, Clone, Default)]
pub struct LeafIndexMapper {
    indices: HashMap<PersistentId, DenseIndex>,
}

impl LeafIndexMapper {
    /// Build a mapper for the current leaves of `mesh`.
    pub fn new<M: AdaptiveMesh>(mesh: &M) -> Result<Self, AmrError> {
        let mut mapper = Self::default();
        mapper.update(mesh)?;
        Ok(mapper)
    }

    /// Leaves in dense index order.
    pub fn ordered(&self) -> Vec<PersistentId> {
        let mut pairs: Vec<_> = self.indices.iter().map(|(&id, &idx)| (idx, id)).collect();
        pairs.sort_unstable();
        pairs.into_iter().map(|(_, id)| id).collect()
    }
}

impl<M: AdaptiveMesh> CellMapper<M> for LeafIndexMapper {
    fn map(&self, mesh: &M, cell: M::Cell) -> Result<DenseIndex, AmrError> {
        let id = mesh.persistent_id(cell)?;
        // A leaf refined since the last update still has an entry here.
        if !mesh.is_leaf(cell)? {
            return Err(AmrError::NotALeaf(id));
        }
        self.indices
            .get(&id)
            .copied()
            .ok_or(AmrError::UnmappedCell(id))
    }

    fn update(&mut self, mesh: &M) -> Result<(), AmrError> {
        self.indices.clear();
        for (position, leaf) in mesh.leaves().into_iter().enumerate() {
            let id = mesh.persistent_id(leaf)?;
            self.indices.insert(id, DenseIndex::new(position));
        }
        crate::debug_invariants!(self.validate_invariants(), "LeafIndexMapper after update");
        Ok(())
    }

    fn size(&self) -> usize {
        self.indices.len()
    }
}

impl DebugInvariants for LeafIndexMapper {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "LeafIndexMapper");
    }

    /// Dense indices must be exactly `0..size`, each used once.
    fn validate_invariants(&self) -> Result<(), AmrError> {
        let mut seen = vec![false; self.indices.len()];
        for (id, index) in &self.indices {
            match seen.get_mut(index.get()) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(AmrError::InvariantViolation(format!(
                        "leaf {id} has dense index {index} outside 0..{} or shared",
                        self.indices.len()
                    )));
                }
            }
        }
        Ok(())
    }
}
