//! Indicator-driven adaptivity with value transfer.
//!
//! One call to [`adapt_step`] runs the whole cycle on a leaf field:
//! 1. [`indicator::compute_indicators`] measures face jumps and the field range.
//! 2. [`marking::mark_cells`] turns them into refine/coarsen requests.
//! 3. [`restriction::build_restriction_map`] stores a mean for every tree node
//!    under its persistent id, before any dense index is invalidated.
//! 4. The mesh runs `prepare` → `adapt`; the mapper is renumbered and the
//!    field resized.
//! 5. [`prolongation::prolongate`] fills every new leaf from the restriction
//!    map, then the mesh is finalized.

pub mod indicator;
pub mod marking;
pub mod prolongation;
pub mod restriction;

use serde::{Deserialize, Serialize};

use crate::data::mapper::CellMapper;
use crate::data::storage::FieldStorage;
use crate::mesh_error::AmrError;
use crate::topology::mesh::AdaptiveMesh;

pub use indicator::{INDICATOR_SENTINEL, IndicatorField, compute_indicators};
pub use marking::{MarkSummary, mark_cells};
pub use prolongation::{ProlongationStats, prolongate};
pub use restriction::{RestrictedValue, RestrictionMap, build_restriction_map};

/// Configuration for the adaptivity driver.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptOptions {
    /// Fraction of the field range above which a leaf is refined.
    pub refine_tol: f64,
    /// Fraction of the field range below which a leaf is coarsened.
    pub coarsen_tol: f64,
    /// Leaves on this level or coarser are never coarsened.
    pub level_min: u8,
    /// Regular leaves on this level or finer are never refined.
    pub level_max: u8,
    /// Also refine the leaf face neighbours of every refined leaf.
    pub propagate_refinement: bool,
}

impl Default for AdaptOptions {
    fn default() -> Self {
        Self {
            refine_tol: 0.05,
            coarsen_tol: 0.001,
            level_min: 0,
            level_max: 5,
            propagate_refinement: true,
        }
    }
}

impl AdaptOptions {
    /// Default tolerances with the given level bounds.
    pub fn with_levels(level_min: u8, level_max: u8) -> Self {
        Self {
            level_min,
            level_max,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), AmrError> {
        if self.level_min > self.level_max {
            return Err(AmrError::InvalidLevelBounds {
                min: self.level_min,
                max: self.level_max,
            });
        }
        for (name, tol) in [("refine_tol", self.refine_tol), ("coarsen_tol", self.coarsen_tol)] {
            if !tol.is_finite() || tol < 0.0 {
                return Err(AmrError::InvalidOptions(format!(
                    "{name} must be finite and non-negative, got {tol}"
                )));
            }
        }
        if self.coarsen_tol >= self.refine_tol {
            return Err(AmrError::InvalidOptions(format!(
                "coarsen_tol ({}) must be below refine_tol ({})",
                self.coarsen_tol, self.refine_tol
            )));
        }
        Ok(())
    }
}

/// Summary of one adaptation step.
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptReport {
    /// Whether the mesh reported a structural change.
    pub changed: bool,
    /// Leaf count before adaptation.
    pub leaves_before: usize,
    /// Leaf count after adaptation (and field length).
    pub leaves_after: usize,
    /// `max - min` of the field before adaptation.
    pub range: f64,
    /// Marks that were requested.
    pub marks: MarkSummary,
    /// Number of tree nodes that received a restricted value.
    pub restricted: usize,
    /// How the new leaves were filled.
    pub prolongation: ProlongationStats,
}

/// Adapt `mesh` to `field` with the default tolerances.
///
/// Returns whether the mesh changed. On return `mapper` numbers the new
/// leaves and `field` holds one value per new leaf.
pub fn adapt_step<M, P, F>(
    mesh: &mut M,
    mapper: &mut P,
    field: &mut F,
    level_min: u8,
    level_max: u8,
) -> Result<bool, AmrError>
where
    M: AdaptiveMesh,
    P: CellMapper<M>,
    F: FieldStorage,
{
    let options = AdaptOptions::with_levels(level_min, level_max);
    Ok(adapt_step_with(mesh, mapper, field, &options)?.changed)
}

/// Adapt `mesh` to `field` with explicit options.
///
/// Any error aborts the step; the mesh may then be left mid-protocol and
/// must not be adapted again.
pub fn adapt_step_with<M, P, F>(
    mesh: &mut M,
    mapper: &mut P,
    field: &mut F,
    options: &AdaptOptions,
) -> Result<AdaptReport, AmrError>
where
    M: AdaptiveMesh,
    P: CellMapper<M>,
    F: FieldStorage,
{
    options.validate()?;
    mesh.phase().require_idle("adapt_step")?;
    if field.len() != mapper.size() {
        return Err(AmrError::FieldSizeMismatch {
            field: field.len(),
            mapper: mapper.size(),
        });
    }
    let leaves_before = field.len();

    let indicators = compute_indicators(mesh, mapper, field)?;
    let range = indicators.range();
    log::debug!(
        "field range [{}, {}] over {leaves_before} leaves",
        indicators.min,
        indicators.max
    );
    let marks = mark_cells(mesh, mapper, &indicators, options)?;
    let mut restriction = build_restriction_map(mesh, mapper, field)?;
    let restricted = restriction.len();

    mesh.prepare()?;
    let changed = mesh.adapt()?;
    mapper.update(mesh)?;
    field.resize(mapper.size(), 0.0);

    let prolongation = prolongate(mesh, mapper, field, &mut restriction)?;
    mesh.finalize()?;

    let leaves_after = field.len();
    log::debug!("adapt step: changed={changed}, leaves {leaves_before} -> {leaves_after}");
    Ok(AdaptReport {
        changed,
        leaves_before,
        leaves_after,
        range,
        marks,
        restricted,
        prolongation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mapper::LeafIndexMapper;
    use crate::forest::LineForest;
    use crate::topology::mesh::{AdaptPhase, Mark};

    #[test]
    fn default_options_validate() {
        AdaptOptions::default().validate().unwrap();
        assert_eq!(
            AdaptOptions::with_levels(3, 1).validate(),
            Err(AmrError::InvalidLevelBounds { min: 3, max: 1 })
        );
        let swapped = AdaptOptions {
            refine_tol: 0.001,
            coarsen_tol: 0.05,
            ..AdaptOptions::default()
        };
        assert!(matches!(swapped.validate(), Err(AmrError::InvalidOptions(_))));
        let nan = AdaptOptions {
            refine_tol: f64::NAN,
            ..AdaptOptions::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: AdaptOptions =
            serde_json::from_str(r#"{"level_max": 3, "refine_tol": 0.1}"#).unwrap();
        assert_eq!(opts.level_max, 3);
        assert_eq!(opts.refine_tol, 0.1);
        assert_eq!(opts.coarsen_tol, 0.001);
        assert!(opts.propagate_refinement);
        let back: AdaptOptions = serde_json::from_str(&serde_json::to_string(&opts).unwrap()).unwrap();
        assert_eq!(back, opts);
    }

    #[test]
    fn field_size_must_match_mapper() {
        let mut forest = LineForest::new([3]).unwrap();
        let mut mapper = LeafIndexMapper::new(&forest).unwrap();
        let mut field = vec![0.0; 2];
        assert_eq!(
            adapt_step(&mut forest, &mut mapper, &mut field, 0, 2),
            Err(AmrError::FieldSizeMismatch { field: 2, mapper: 3 })
        );
        assert_eq!(forest.phase(), AdaptPhase::Idle);
    }

    #[test]
    fn step_is_rejected_while_mesh_is_mid_protocol() {
        let mut forest = LineForest::new([2]).unwrap();
        let mut mapper = LeafIndexMapper::new(&forest).unwrap();
        let mut field = vec![0.0, 1.0];
        forest.prepare().unwrap();
        assert!(matches!(
            adapt_step(&mut forest, &mut mapper, &mut field, 0, 2),
            Err(AmrError::ProtocolViolation {
                operation: "adapt_step",
                phase: AdaptPhase::Prepared
            })
        ));
    }

    #[test]
    fn report_counts_refinement_and_coarsening() {
        let mut forest = LineForest::new([4]).unwrap();
        forest.global_refine(1).unwrap();
        let mut mapper = LeafIndexMapper::new(&forest).unwrap();
        let mut field = vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0];

        let report = adapt_step_with(
            &mut forest,
            &mut mapper,
            &mut field,
            &AdaptOptions::with_levels(0, 2),
        )
        .unwrap();

        assert!(report.changed);
        assert_eq!(report.range, 1.0);
        assert_eq!(report.marks.refined, 2);
        assert_eq!(report.marks.propagated, 2);
        assert_eq!(report.marks.coarsened, 4);
        // Leaves 0-1 coarsen into their root; leaves 2-3 border the new
        // level-2 cells and stay. Leaves 4-7 split into eight.
        assert_eq!(report.leaves_after, 11);
        assert_eq!(field.len(), 11);
        assert_eq!(
            field,
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]
        );
        assert_eq!(report.prolongation.leaves(), 11);
        assert!(forest.leaves().iter().all(|&l| forest.mark_of(l).unwrap() == Mark::Keep));
    }
}
