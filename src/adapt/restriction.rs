//! Bottom-up restriction of the leaf field onto every tree node.
//!
//! Before the mesh changes, each node gets a [`RestrictedValue`] keyed by its
//! [`PersistentId`]: leaves carry their own value, and every parent carries
//! the mean of its children's means. Children count equally no matter how
//! many leaves they cover; this is an unweighted hierarchical mean, not a
//! volume average, and must stay that way for results to be reproducible.

use hashbrown::HashMap;

use crate::data::mapper::CellMapper;
use crate::data::storage::FieldStorage;
use crate::mesh_error::AmrError;
use crate::topology::mesh::AdaptiveMesh;
use crate::topology::point::PersistentId;

/// Running mean of a node's contributions.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RestrictedValue {
    /// Sum of the contributions.
    pub value: f64,
    /// Number of contributions, at least 1.
    pub count: u32,
}

impl RestrictedValue {
    /// A single contribution.
    pub fn single(value: f64) -> Self {
        Self { value, count: 1 }
    }

    /// `value / count`.
    pub fn average(&self) -> f64 {
        self.value / f64::from(self.count)
    }

    fn accumulate(&mut self, contribution: f64) {
        self.value += contribution;
        self.count += 1;
    }
}

/// Restricted values of the nodes of one tree, keyed by persistent id.
#[derive(Debug, Clone, Default)]
pub struct RestrictionMap {
    entries: HashMap<PersistentId, RestrictedValue>,
}

impl RestrictionMap {
    pub fn get(&self, id: PersistentId) -> Option<&RestrictedValue> {
        self.entries.get(&id)
    }

    /// Mean value of a node, if it has an entry.
    pub fn average(&self, id: PersistentId) -> Option<f64> {
        self.get(id).map(RestrictedValue::average)
    }

    pub fn insert(&mut self, id: PersistentId, value: RestrictedValue) -> Option<RestrictedValue> {
        self.entries.insert(id, value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PersistentId, &RestrictedValue)> {
        self.entries.iter().map(|(&id, value)| (id, value))
    }

    /// Add a child's mean to a parent's entry, creating it if needed.
    fn contribute(&mut self, parent: PersistentId, child_mean: f64) {
        self.entries
            .entry(parent)
            .and_modify(|rv| rv.accumulate(child_mean))
            .or_insert_with(|| RestrictedValue::single(child_mean));
    }
}

/// Restrict the leaf field onto every node of the current tree.
///
/// Levels are visited deepest first, so a node's entry is complete before it
/// contributes to its parent. A leaf's own value replaces anything already
/// stored for it.
pub fn build_restriction_map<M, P, F>(
    mesh: &M,
    mapper: &P,
    field: &F,
) -> Result<RestrictionMap, AmrError>
where
    M: AdaptiveMesh,
    P: CellMapper<M>,
    F: FieldStorage,
{
    let mut map = RestrictionMap::default();
    for level in (0..=mesh.max_level()).rev() {
        for cell in mesh.level_cells(level) {
            let id = mesh.persistent_id(cell)?;
            if mesh.is_leaf(cell)? {
                let value = field.get(mapper.map(mesh, cell)?)?;
                map.insert(id, RestrictedValue::single(value));
            }
            let Some(mean) = map.average(id) else {
                continue;
            };
            match mesh.parent(cell)? {
                Some(parent) => map.contribute(mesh.persistent_id(parent)?, mean),
                None if level > 0 => return Err(AmrError::OrphanCell(id)),
                None => {}
            }
        }
    }
    if map.is_empty() {
        log::debug!("mesh has no cells; nothing restricted");
    } else {
        log::debug!("restricted field onto {} tree nodes", map.len());
    }
    Ok(map)
}
