//! Jump indicator: the largest absolute value difference across any face of a leaf.

use crate::data::mapper::CellMapper;
use crate::data::storage::FieldStorage;
use crate::mesh_error::AmrError;
use crate::topology::mesh::AdaptiveMesh;
use crate::topology::point::DenseIndex;

/// Indicator of a leaf that has no leaf neighbour.
pub const INDICATOR_SENTINEL: f64 = -1e100;

/// Per-leaf indicators together with the field range they were computed on.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorField {
    /// One indicator per dense index.
    pub values: Vec<f64>,
    /// Smallest field value over all leaves.
    pub min: f64,
    /// Largest field value over all leaves.
    pub max: f64,
    /// Number of leaf-leaf faces evaluated; each shared face counts once.
    pub face_visits: usize,
}

impl IndicatorField {
    /// `max - min`, or 0 for an empty mesh.
    pub fn range(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.max - self.min
        }
    }

    pub fn get(&self, index: DenseIndex) -> Result<f64, AmrError> {
        self.values
            .as_slice()
            .get(index.get())
            .copied()
            .ok_or(AmrError::IndexOutOfBounds {
                index: index.get(),
                len: self.values.len(),
            })
    }
}

/// Compute the face-jump indicator of every leaf.
///
/// A face is evaluated from its finer side, or, between two leaves on the
/// same level, from the leaf with the smaller dense index. The jump updates
/// both leaves through a running maximum.
pub fn compute_indicators<M, P, F>(
    mesh: &M,
    mapper: &P,
    field: &F,
) -> Result<IndicatorField, AmrError>
where
    M: AdaptiveMesh,
    P: CellMapper<M>,
    F: FieldStorage,
{
    let mut values = vec![INDICATOR_SENTINEL; field.len()];
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    let mut face_visits = 0;

    for leaf in mesh.leaves() {
        let i = mapper.map(mesh, leaf)?;
        let inside = field.get(i)?;
        max = max.max(inside);
        min = min.min(inside);
        let level = mesh.level(leaf)?;

        for intersection in mesh.intersections(leaf)? {
            let Some(outside) = intersection.neighbor else {
                continue;
            };
            if !mesh.is_leaf(outside)? {
                continue;
            }
            let j = mapper.map(mesh, outside)?;
            let outside_level = mesh.level(outside)?;
            if level > outside_level || (level == outside_level && i < j) {
                let delta = (field.get(j)? - inside).abs();
                values[i.get()] = values[i.get()].max(delta);
                values[j.get()] = values[j.get()].max(delta);
                face_visits += 1;
            }
        }
    }

    Ok(IndicatorField {
        values,
        min,
        max,
        face_visits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mapper::LeafIndexMapper;
    use crate::forest::{LineForest, QuadForest, TreeCell};
    use crate::topology::mesh::Mark;

    #[test]
    fn jump_marks_both_sides_of_the_face() {
        let forest = LineForest::new([4]).unwrap();
        let mapper = LeafIndexMapper::new(&forest).unwrap();
        let field = vec![0.0, 0.0, 10.0, 10.0];
        let ind = compute_indicators(&forest, &mapper, &field).unwrap();
        assert_eq!(ind.values, vec![0.0, 10.0, 10.0, 0.0]);
        assert_eq!(ind.range(), 10.0);
        assert_eq!(ind.face_visits, 3);
    }

    #[test]
    fn isolated_leaf_keeps_sentinel() {
        let forest = LineForest::new([1]).unwrap();
        let mapper = LeafIndexMapper::new(&forest).unwrap();
        let ind = compute_indicators(&forest, &mapper, &vec![3.0]).unwrap();
        assert_eq!(ind.values, vec![INDICATOR_SENTINEL]);
        assert_eq!(ind.range(), 0.0);
        assert_eq!(ind.face_visits, 0);
    }

    #[test]
    fn coarse_fine_faces_are_counted_once() {
        let mut forest = QuadForest::new([2, 1]).unwrap();
        let left = forest.find(&TreeCell { level: 0, coords: [0, 0] }).unwrap();
        forest.mark(Mark::Refine, left).unwrap();
        forest.prepare().unwrap();
        forest.adapt().unwrap();
        forest.finalize().unwrap();

        let mapper = LeafIndexMapper::new(&forest).unwrap();
        let mut field = vec![1.0; 5];
        let right = forest.find(&TreeCell { level: 0, coords: [1, 0] }).unwrap();
        field[mapper.map(&forest, right).unwrap().get()] = 4.0;

        let ind = compute_indicators(&forest, &mapper, &field).unwrap();
        // 4 sibling faces + 2 faces between the fine children and the right root.
        assert_eq!(ind.face_visits, 6);
        assert_eq!(ind.get(mapper.map(&forest, right).unwrap()).unwrap(), 3.0);
        let upper_right_child = forest.find(&TreeCell { level: 1, coords: [1, 1] }).unwrap();
        let lower_left_child = forest.find(&TreeCell { level: 1, coords: [0, 0] }).unwrap();
        assert_eq!(ind.get(mapper.map(&forest, upper_right_child).unwrap()).unwrap(), 3.0);
        assert_eq!(ind.get(mapper.map(&forest, lower_left_child).unwrap()).unwrap(), 0.0);
    }

    #[test]
    fn stale_mapper_is_an_error() {
        let mut forest = LineForest::new([2]).unwrap();
        let mapper = LeafIndexMapper::new(&forest).unwrap();
        forest.global_refine(1).unwrap();
        let field = vec![0.0; 2];
        assert!(matches!(
            compute_indicators(&forest, &mapper, &field),
            Err(AmrError::UnmappedCell(_))
        ));
    }
}
