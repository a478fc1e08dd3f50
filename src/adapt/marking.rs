//! Refine/coarsen marking from range-relative indicator thresholds.

use hashbrown::HashSet;

use crate::adapt::AdaptOptions;
use crate::adapt::indicator::IndicatorField;
use crate::data::mapper::CellMapper;
use crate::mesh_error::AmrError;
use crate::topology::mesh::{AdaptiveMesh, Mark};

/// Counts of the marks placed by one marking pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkSummary {
    /// Leaves whose own indicator asked for refinement.
    pub refined: usize,
    /// Additional leaves refined because a face neighbour was.
    pub propagated: usize,
    /// Leaves marked for coarsening.
    pub coarsened: usize,
    /// Leaves above the refine threshold that were held back by `level_max`.
    pub capped: usize,
}

impl MarkSummary {
    pub fn is_empty(&self) -> bool {
        self.refined + self.propagated + self.coarsened == 0
    }
}

/// Place refine/coarsen marks on the leaves of `mesh`.
///
/// A leaf is refined when its indicator exceeds `refine_tol * range` and it
/// is below `level_max` or irregular; its leaf face neighbours are then
/// refined too. A leaf is coarsened when its indicator is below
/// `coarsen_tol * range` and it is above `level_min`, unless it received a
/// refine mark in this pass. A zero range marks nothing.
pub fn mark_cells<M, P>(
    mesh: &mut M,
    mapper: &P,
    indicators: &IndicatorField,
    options: &AdaptOptions,
) -> Result<MarkSummary, AmrError>
where
    M: AdaptiveMesh,
    P: CellMapper<M>,
{
    let mut summary = MarkSummary::default();
    let range = indicators.range();
    if range <= 0.0 {
        log::debug!("uniform field (range {range}); no cells marked");
        return Ok(summary);
    }
    let refine_threshold = options.refine_tol * range;
    let coarsen_threshold = options.coarsen_tol * range;

    let leaves = mesh.leaves();
    let mut refining: HashSet<M::Cell> = HashSet::new();
    for &leaf in &leaves {
        let indicator = indicators.get(mapper.map(mesh, leaf)?)?;
        if indicator <= refine_threshold {
            continue;
        }
        if mesh.level(leaf)? >= options.level_max && mesh.is_regular(leaf)? {
            summary.capped += 1;
            continue;
        }
        mesh.mark(Mark::Refine, leaf)?;
        if !refining.insert(leaf) {
            // Already marked as a neighbour of an earlier leaf.
            summary.propagated -= 1;
        }
        summary.refined += 1;
        if !options.propagate_refinement {
            continue;
        }
        for intersection in mesh.intersections(leaf)? {
            let Some(neighbor) = intersection.neighbor else {
                continue;
            };
            if mesh.is_leaf(neighbor)? {
                mesh.mark(Mark::Refine, neighbor)?;
                if refining.insert(neighbor) {
                    summary.propagated += 1;
                }
            }
        }
    }

    for &leaf in &leaves {
        if refining.contains(&leaf) {
            continue;
        }
        let indicator = indicators.get(mapper.map(mesh, leaf)?)?;
        if indicator < coarsen_threshold && mesh.level(leaf)? > options.level_min {
            mesh.mark(Mark::Coarsen, leaf)?;
            summary.coarsened += 1;
        }
    }

    log::debug!(
        "marked {} refine ({} by propagation), {} coarsen, {} capped at level {}",
        summary.refined + summary.propagated,
        summary.propagated,
        summary.coarsened,
        summary.capped,
        options.level_max
    );
    Ok(summary)
}
