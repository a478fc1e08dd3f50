//! Line/quad/oct-tree AMR forest with persistent cell identities.
//!
//! A [`Forest`] starts from a macro grid of level-0 root cells and refines
//! each cell into `2^D` children. Nodes live in an arena keyed by
//! [`PersistentId`]; parent/child links are ids into that arena, so a
//! structural change only inserts or retires arena entries and every
//! surviving id keeps pointing at the same node.
//!
//! The forest implements [`AdaptiveMesh`]: marks are applied by
//! [`AdaptiveMesh::adapt`], which refines, restores 2:1 face balance by
//! closure refinement (closure children are irregular), and coarsens complete
//! families whose children all asked for it.

use hashbrown::HashMap;
use itertools::Itertools;

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::AmrError;
use crate::topology::mesh::{AdaptPhase, AdaptiveMesh, Intersection, Mark};
use crate::topology::point::PersistentId;

/// Deepest level a forest cell may reach. Forests with a wide macro grid
/// stop earlier, see [`Forest::depth_limit`].
pub const MAX_FOREST_LEVEL: u8 = 24;

/// A cell position in a quadtree/octree forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeCell<const D: usize> {
    /// Refinement level (0 is root).
    pub level: u8,
    /// Integer coordinates at the given level.
    pub coords: [u32; D],
}

impl<const D: usize> TreeCell<D> {
    /// Returns the parent cell, or `None` for a root.
    pub fn parent(&self) -> Option<Self> {
        if self.level == 0 {
            None
        } else {
            let mut coords = self.coords;
            for coord in &mut coords {
                *coord /= 2;
            }
            Some(Self {
                level: self.level - 1,
                coords,
            })
        }
    }

    /// Returns the `2^D` children of this cell, axis 0 varying fastest.
    pub fn children(&self) -> Vec<Self> {
        let count = 1usize << D;
        let mut children = Vec::with_capacity(count);
        for idx in 0..count {
            let mut coords = [0u32; D];
            for axis in 0..D {
                let bit = (idx >> axis) & 1;
                coords[axis] = self.coords[axis] * 2 + bit as u32;
            }
            children.push(Self {
                level: self.level + 1,
                coords,
            });
        }
        children
    }

    /// Same-level cell across `face` (`2 * axis + side`, side 0 = lower), if
    /// it lies inside a domain of `extent` roots.
    fn across(&self, face: usize, extent: &[u32; D]) -> Option<Self> {
        let axis = face / 2;
        let upper = face % 2 == 1;
        let cells_on_axis = extent[axis] << self.level;
        let mut coords = self.coords;
        if upper {
            if coords[axis] + 1 >= cells_on_axis {
                return None;
            }
            coords[axis] += 1;
        } else {
            if coords[axis] == 0 {
                return None;
            }
            coords[axis] -= 1;
        }
        Some(Self {
            level: self.level,
            coords,
        })
    }
}

#[derive(Debug, Clone)]
struct ForestNode<const D: usize> {
    cell: TreeCell<D>,
    parent: Option<PersistentId>,
    children: Vec<PersistentId>,
    regular: bool,
    mark: Mark,
}

impl<const D: usize> ForestNode<D> {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Forest of `D`-dimensional refinement trees over a rectangular macro grid.
#[derive(Debug, Clone)]
pub struct Forest<const D: usize> {
    extent: [u32; D],
    nodes: HashMap<PersistentId, ForestNode<D>>,
    index: HashMap<TreeCell<D>, PersistentId>,
    roots: Vec<PersistentId>,
    /// Nodes removed by the last `adapt`, released on `finalize`.
    retired: HashMap<PersistentId, ForestNode<D>>,
    next_id: u64,
    /// Deepest level whose coordinates `extent << level` still fit in `u32`.
    depth_limit: u8,
    phase: AdaptPhase,
}

/// A forest of binary trees (`D = 1`).
pub type LineForest = Forest<1>;
/// A quadtree forest (`D = 2`).
pub type QuadForest = Forest<2>;
/// An octree forest (`D = 3`).
pub type OctForest = Forest<3>;

impl<const D: usize> Forest<D> {
    /// Create a forest whose macro grid has `extent[axis]` roots along each axis.
    pub fn new(extent: [u32; D]) -> Result<Self, AmrError> {
        if D == 0 || extent.iter().any(|&n| n == 0) {
            return Err(AmrError::InvalidExtent);
        }
        let depth_limit = extent
            .iter()
            .map(|n| n.leading_zeros())
            .min()
            .map_or(0, |bits| bits.min(u32::from(MAX_FOREST_LEVEL)) as u8);
        let mut forest = Self {
            extent,
            nodes: HashMap::new(),
            index: HashMap::new(),
            roots: Vec::new(),
            retired: HashMap::new(),
            next_id: 1,
            depth_limit,
            phase: AdaptPhase::Idle,
        };
        let total: usize = extent.iter().map(|&n| n as usize).product();
        for linear in 0..total {
            let mut rest = linear;
            let mut coords = [0u32; D];
            for axis in 0..D {
                let n = extent[axis] as usize;
                coords[axis] = (rest % n) as u32;
                rest /= n;
            }
            let id = forest.insert(TreeCell { level: 0, coords }, None, true)?;
            forest.roots.push(id);
        }
        Ok(forest)
    }

    /// Number of roots along each axis.
    pub fn extent(&self) -> [u32; D] {
        self.extent
    }

    /// Deepest level a cell of this forest can be refined to.
    pub fn depth_limit(&self) -> u8 {
        self.depth_limit
    }

    /// Return the number of leaf cells.
    pub fn leaf_count(&self) -> usize {
        self.nodes.values().filter(|node| node.is_leaf()).count()
    }

    /// Return the number of live tree nodes (leaf or not).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Tree position of a live cell.
    pub fn cell(&self, id: PersistentId) -> Result<TreeCell<D>, AmrError> {
        Ok(self.node(id)?.cell)
    }

    /// Live cell at a tree position, if any.
    pub fn find(&self, cell: &TreeCell<D>) -> Option<PersistentId> {
        self.index.get(cell).copied()
    }

    /// Children of a live cell (empty for leaves).
    pub fn children(&self, id: PersistentId) -> Result<&[PersistentId], AmrError> {
        Ok(&self.node(id)?.children)
    }

    /// Pending mark of a cell.
    pub fn mark_of(&self, id: PersistentId) -> Result<Mark, AmrError> {
        Ok(self.node(id)?.mark)
    }

    /// Cell center, in units where every root cell has side 1.
    pub fn center(&self, id: PersistentId) -> Result<[f64; D], AmrError> {
        let cell = self.cell(id)?;
        let width = 1.0 / f64::from(1u32 << cell.level);
        let mut center = [0.0; D];
        for axis in 0..D {
            center[axis] = (f64::from(cell.coords[axis]) + 0.5) * width;
        }
        Ok(center)
    }

    /// Refine every leaf `times` times, running the full adaptation protocol.
    pub fn global_refine(&mut self, times: u8) -> Result<(), AmrError> {
        for _ in 0..times {
            for leaf in self.leaves() {
                self.mark(Mark::Refine, leaf)?;
            }
            self.prepare()?;
            self.adapt()?;
            self.finalize()?;
        }
        Ok(())
    }

    fn node(&self, id: PersistentId) -> Result<&ForestNode<D>, AmrError> {
        self.nodes.get(&id).ok_or(AmrError::UnknownCell(id))
    }

    fn node_mut(&mut self, id: PersistentId) -> Result<&mut ForestNode<D>, AmrError> {
        self.nodes.get_mut(&id).ok_or(AmrError::UnknownCell(id))
    }

    fn insert(
        &mut self,
        cell: TreeCell<D>,
        parent: Option<PersistentId>,
        regular: bool,
    ) -> Result<PersistentId, AmrError> {
        let id = PersistentId::new(self.next_id)?;
        self.next_id += 1;
        self.nodes.insert(
            id,
            ForestNode {
                cell,
                parent,
                children: Vec::new(),
                regular,
                mark: Mark::Keep,
            },
        );
        self.index.insert(cell, id);
        Ok(id)
    }

    /// Depth-first walk over the live tree, roots in macro-grid order.
    fn depth_first(&self) -> Vec<PersistentId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<PersistentId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    /// Split a leaf into its `2^D` children. Returns `false` if the leaf is
    /// already at [`Forest::depth_limit`].
    fn refine_leaf(&mut self, id: PersistentId, regular: bool) -> Result<bool, AmrError> {
        let cell = {
            let node = self.node(id)?;
            if !node.is_leaf() {
                return Ok(false);
            }
            node.cell
        };
        if cell.level >= self.depth_limit {
            log::warn!("cell {id} is at the deepest supported level {}; not refined", self.depth_limit);
            return Ok(false);
        }
        let mut children = Vec::with_capacity(1 << D);
        for child in cell.children() {
            children.push(self.insert(child, Some(id), regular)?);
        }
        self.node_mut(id)?.children = children;
        Ok(true)
    }

    /// Leaf descendants of `id` whose `face` side touches the boundary of `id`.
    fn leaves_on_face(&self, id: PersistentId, face: usize, out: &mut Vec<PersistentId>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if node.is_leaf() {
            out.push(id);
            return;
        }
        let axis = face / 2;
        let upper = face % 2 == 1;
        for (idx, child) in node.children.iter().enumerate() {
            let bit = (idx >> axis) & 1 == 1;
            if bit == upper {
                self.leaves_on_face(*child, face, out);
            }
        }
    }

    /// Refine leaves until no two face-adjacent leaves differ by more than one level.
    fn balance(&mut self) -> Result<usize, AmrError> {
        let mut closure = 0;
        loop {
            let mut coarse = Vec::new();
            for leaf in self.leaves() {
                let level = self.node(leaf)?.cell.level;
                for intersection in self.intersections(leaf)? {
                    if let Some(neighbor) = intersection.neighbor {
                        if self.node(neighbor)?.cell.level + 1 < level {
                            coarse.push(neighbor);
                        }
                    }
                }
            }
            if coarse.is_empty() {
                return Ok(closure);
            }
            for id in coarse.into_iter().unique() {
                if self.refine_leaf(id, false)? {
                    closure += 1;
                }
            }
        }
    }

    /// Parents whose children are all leaves marked for coarsening and whose
    /// removal keeps 2:1 balance with the current tree.
    fn coarsenable_parents(&self) -> Result<Vec<PersistentId>, AmrError> {
        let mut parents = Vec::new();
        for id in self.depth_first() {
            let node = self.node(id)?;
            if node.is_leaf() {
                continue;
            }
            let mut ok = true;
            for child in &node.children {
                let child_node = self.node(*child)?;
                if !child_node.is_leaf() || child_node.mark != Mark::Coarsen {
                    ok = false;
                    break;
                }
                for intersection in self.intersections(*child)? {
                    if let Some(neighbor) = intersection.neighbor {
                        if self.node(neighbor)?.cell.level > child_node.cell.level {
                            ok = false;
                        }
                    }
                }
                if !ok {
                    break;
                }
            }
            if ok {
                parents.push(id);
            }
        }
        Ok(parents)
    }

    fn coarsen_family(&mut self, parent: PersistentId) -> Result<(), AmrError> {
        let children = std::mem::take(&mut self.node_mut(parent)?.children);
        for child in children {
            if let Some(node) = self.nodes.remove(&child) {
                self.index.remove(&node.cell);
                self.retired.insert(child, node);
            }
        }
        Ok(())
    }
}

impl<const D: usize> AdaptiveMesh for Forest<D> {
    type Cell = PersistentId;

    fn leaves(&self) -> Vec<PersistentId> {
        self.depth_first()
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|node| node.is_leaf()))
            .collect()
    }

    fn level_cells(&self, level: u8) -> Vec<PersistentId> {
        self.depth_first()
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|node| node.cell.level == level))
            .collect()
    }

    fn max_level(&self) -> u8 {
        self.nodes
            .values()
            .map(|node| node.cell.level)
            .max()
            .unwrap_or(0)
    }

    fn level(&self, cell: PersistentId) -> Result<u8, AmrError> {
        Ok(self.node(cell)?.cell.level)
    }

    fn is_leaf(&self, cell: PersistentId) -> Result<bool, AmrError> {
        Ok(self.node(cell)?.is_leaf())
    }

    fn is_regular(&self, cell: PersistentId) -> Result<bool, AmrError> {
        Ok(self.node(cell)?.regular)
    }

    fn parent(&self, cell: PersistentId) -> Result<Option<PersistentId>, AmrError> {
        Ok(self.node(cell)?.parent)
    }

    fn intersections(
        &self,
        cell: PersistentId,
    ) -> Result<Vec<Intersection<PersistentId>>, AmrError> {
        let inside = self.node(cell)?.cell;
        let mut out = Vec::with_capacity(2 * D);
        for face in 0..2 * D {
            let Some(outside) = inside.across(face, &self.extent) else {
                out.push(Intersection::boundary(face));
                continue;
            };
            if let Some(&same_level) = self.index.get(&outside) {
                // The neighbour's side facing us is the opposite face.
                let mut finer = Vec::new();
                self.leaves_on_face(same_level, face ^ 1, &mut finer);
                out.extend(finer.into_iter().map(|n| Intersection::interior(face, n)));
                continue;
            }
            let mut ancestor = outside.parent();
            let mut found = None;
            while let Some(candidate) = ancestor {
                if let Some(&id) = self.index.get(&candidate) {
                    found = Some(id);
                    break;
                }
                ancestor = candidate.parent();
            }
            match found {
                Some(id) => out.push(Intersection::interior(face, id)),
                None => {
                    return Err(AmrError::InvariantViolation(format!(
                        "no cell covers the neighbour of {cell} across face {face}"
                    )));
                }
            }
        }
        Ok(out)
    }

    fn persistent_id(&self, cell: PersistentId) -> Result<PersistentId, AmrError> {
        self.node(cell)?;
        Ok(cell)
    }

    fn mark(&mut self, mark: Mark, cell: PersistentId) -> Result<(), AmrError> {
        self.phase.require_idle("mark")?;
        let node = self.node_mut(cell)?;
        if !node.is_leaf() {
            return Err(AmrError::NotALeaf(cell));
        }
        node.mark = mark;
        Ok(())
    }

    fn phase(&self) -> AdaptPhase {
        self.phase
    }

    fn prepare(&mut self) -> Result<(), AmrError> {
        self.phase.begin_prepare()
    }

    fn adapt(&mut self) -> Result<bool, AmrError> {
        self.phase.begin_commit()?;

        let marked: Vec<PersistentId> = self
            .leaves()
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.mark == Mark::Refine))
            .collect();
        let mut refined = 0;
        for id in marked {
            if self.refine_leaf(id, true)? {
                refined += 1;
            }
        }
        let closure = self.balance()?;

        let parents = self.coarsenable_parents()?;
        let coarsened = parents.len();
        for parent in parents {
            self.coarsen_family(parent)?;
        }

        for node in self.nodes.values_mut() {
            node.mark = Mark::Keep;
        }

        log::debug!(
            "forest adapt: {refined} refined, {closure} closure, {coarsened} coarsened, {} leaves",
            self.leaf_count()
        );
        crate::debug_invariants!(self.validate_invariants(), "forest after adapt");
        Ok(refined + closure + coarsened > 0)
    }

    fn finalize(&mut self) -> Result<(), AmrError> {
        self.phase.begin_finalize()?;
        if !self.retired.is_empty() {
            log::trace!("releasing {} retired forest nodes", self.retired.len());
        }
        self.retired.clear();
        Ok(())
    }
}

impl<const D: usize> DebugInvariants for Forest<D> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Forest");
    }

    fn validate_invariants(&self) -> Result<(), AmrError> {
        let fail = |msg: String| Err(AmrError::InvariantViolation(msg));
        if self.index.len() != self.nodes.len() {
            return fail(format!(
                "index has {} cells but arena has {} nodes",
                self.index.len(),
                self.nodes.len()
            ));
        }
        for (&id, node) in &self.nodes {
            if self.index.get(&node.cell) != Some(&id) {
                return fail(format!("cell {id} is not indexed at {:?}", node.cell));
            }
            match node.parent {
                None if node.cell.level != 0 => return fail(format!("cell {id} has no parent")),
                None => {}
                Some(parent) => {
                    let Some(parent_node) = self.nodes.get(&parent) else {
                        return fail(format!("parent {parent} of {id} is not live"));
                    };
                    if Some(parent_node.cell) != node.cell.parent() {
                        return fail(format!("parent {parent} of {id} has the wrong position"));
                    }
                    if !parent_node.children.contains(&id) {
                        return fail(format!("parent {parent} does not list child {id}"));
                    }
                }
            }
            if !node.children.is_empty() && node.children.len() != 1 << D {
                return fail(format!("cell {id} has {} children", node.children.len()));
            }
        }
        if self.roots.iter().any(|root| !self.nodes.contains_key(root)) {
            return fail("a root cell is missing".into());
        }
        Ok(())
    }
}
