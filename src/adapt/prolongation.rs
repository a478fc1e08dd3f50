//! Top-down reconstruction of the leaf field after the mesh changed.

use crate::adapt::restriction::{RestrictedValue, RestrictionMap};
use crate::data::mapper::CellMapper;
use crate::data::storage::FieldStorage;
use crate::mesh_error::AmrError;
use crate::topology::mesh::AdaptiveMesh;

/// How the leaves of the new tree received their values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProlongationStats {
    /// Leaves that existed before (kept or coarsened-to) and take their restricted value.
    pub restored: usize,
    /// New leaves that copied their parent's value.
    pub injected: usize,
    /// New interior nodes that got an entry so their own children can inherit.
    pub synthesized: usize,
}

impl ProlongationStats {
    pub fn leaves(&self) -> usize {
        self.restored + self.injected
    }
}

/// Assign a value to every leaf of the adapted mesh.
///
/// `field` must already be sized for the new leaves and `mapper` updated.
/// Nodes present in `restriction` keep their restricted mean; new nodes take
/// their parent's mean unchanged. Levels are walked shallowest first so a
/// new interior node's entry exists before its children are reached.
pub fn prolongate<M, P, F>(
    mesh: &M,
    mapper: &P,
    field: &mut F,
    restriction: &mut RestrictionMap,
) -> Result<ProlongationStats, AmrError>
where
    M: AdaptiveMesh,
    P: CellMapper<M>,
    F: FieldStorage,
{
    let mut stats = ProlongationStats::default();
    for level in 0..=mesh.max_level() {
        for cell in mesh.level_cells(level) {
            let id = mesh.persistent_id(cell)?;
            let is_leaf = mesh.is_leaf(cell)?;

            if let Some(mean) = restriction.average(id) {
                if is_leaf {
                    field.set(mapper.map(mesh, cell)?, mean)?;
                    stats.restored += 1;
                }
                continue;
            }

            let parent = match mesh.parent(cell)? {
                Some(parent) => mesh.persistent_id(parent)?,
                None if level == 0 => return Err(AmrError::NoRestrictionSource(id)),
                None => return Err(AmrError::OrphanCell(id)),
            };
            let inherited = restriction
                .average(parent)
                .ok_or(AmrError::MissingParentRestriction { cell: id, parent })?;
            if is_leaf {
                field.set(mapper.map(mesh, cell)?, inherited)?;
                stats.injected += 1;
            } else {
                log::trace!("new interior cell {id} inherits {inherited} from {parent}");
                restriction.insert(id, RestrictedValue::single(inherited));
                stats.synthesized += 1;
            }
        }
    }
    log::debug!(
        "prolongation: {} restored, {} injected, {} synthesized",
        stats.restored,
        stats.injected,
        stats.synthesized
    );
    Ok(stats)
}
