//! Constraint graph over cell hyperedges.
//!
//! Every cell contributes its constraint sets (hyperedges): one 4-edge set for
//! a rigid cell, two opposite-edge pairs for a shear cell. Hyperedges that
//! share a boundary edge must move together, so the connected components of
//! the "shares an edge" relation are the independent joints of the mechanism.
//! Their count is the mechanism's degrees of freedom.
//!
//! The graph is a snapshot: ids it hands out ([`ComponentId`], cell ids) are
//! valid for the grid revision it was built from.

use crate::algs::non_shearing::NonShearingArea;
use crate::mech_error::MechError;
use crate::topology::cell_type::CellKind;
use crate::topology::grid::Grid;
use crate::topology::point::{CellId, EdgeId};
use hashbrown::HashMap;
use once_cell::sync::OnceCell;
use rand::Rng;
use std::fmt;

/// Index of a component within one [`ConstraintGraph`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub usize);

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One constraint set of one cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hyperedge {
    pub cell: CellId,
    pub kind: CellKind,
    pub edges: Vec<EdgeId>,
}

#[derive(Clone, Debug, Default)]
pub struct ConstraintGraph {
    hyperedges: Vec<Hyperedge>,
    components: Vec<Vec<usize>>,
    component_of: Vec<ComponentId>,
    /// Owners of every edge in the component (merge candidates live here).
    cells_of: Vec<Vec<CellId>>,
    /// Cells with at least one hyperedge in the component.
    members_of: Vec<Vec<CellId>>,
    by_cell: HashMap<CellId, Vec<usize>>,
    pub(crate) areas: Vec<OnceCell<Vec<NonShearingArea>>>,
}

impl ConstraintGraph {
    /// Build the graph for `grid`.
    ///
    /// Hyperedges are taken in cell order. Each one starts a new component that
    /// absorbs every existing component sharing an edge with it; since existing
    /// components are already closed, one absorption pass per hyperedge yields
    /// the transitive closure.
    pub fn build(grid: &Grid) -> Self {
        let mut hyperedges = Vec::new();
        let mut by_cell: HashMap<CellId, Vec<usize>> = HashMap::new();
        for (cid, cell) in grid.cells() {
            for set in cell.constraints() {
                by_cell.entry(cid).or_default().push(hyperedges.len());
                hyperedges.push(Hyperedge {
                    cell: cid,
                    kind: cell.kind(),
                    edges: set.clone(),
                });
            }
        }

        let mut slots: Vec<Vec<usize>> = Vec::new();
        let mut edge_slot: HashMap<EdgeId, usize> = HashMap::new();
        for (h, hyper) in hyperedges.iter().enumerate() {
            let mut touching: Vec<usize> = hyper
                .edges
                .iter()
                .filter_map(|e| edge_slot.get(e).copied())
                .collect();
            touching.sort_unstable();
            touching.dedup();

            let mut merged = vec![h];
            for t in touching {
                merged.append(&mut slots[t]);
            }
            let slot = slots.len();
            for &m in &merged {
                for &e in &hyperedges[m].edges {
                    edge_slot.insert(e, slot);
                }
            }
            slots.push(merged);
        }

        let mut components: Vec<Vec<usize>> = slots.into_iter().filter(|s| !s.is_empty()).collect();
        for c in &mut components {
            c.sort_unstable();
        }
        components.sort_by_key(|c| c[0]);

        let mut component_of = vec![ComponentId(0); hyperedges.len()];
        for (ci, c) in components.iter().enumerate() {
            for &h in c {
                component_of[h] = ComponentId(ci);
            }
        }

        let mut cells_of = Vec::with_capacity(components.len());
        let mut members_of = Vec::with_capacity(components.len());
        for c in &components {
            let mut owners: Vec<CellId> = c
                .iter()
                .flat_map(|&h| hyperedges[h].edges.iter())
                .flat_map(|&e| grid[e].owners().iter().copied())
                .collect();
            owners.sort_unstable();
            owners.dedup();
            cells_of.push(owners);

            let mut members: Vec<CellId> = c.iter().map(|&h| hyperedges[h].cell).collect();
            members.sort_unstable();
            members.dedup();
            members_of.push(members);
        }

        let areas = (0..components.len()).map(|_| OnceCell::new()).collect();
        log::debug!(
            "constraint graph: {} hyperedges, {} components",
            hyperedges.len(),
            components.len()
        );
        Self {
            hyperedges,
            components,
            component_of,
            cells_of,
            members_of,
            by_cell,
            areas,
        }
    }

    /// Degrees of freedom: number of components.
    #[inline]
    pub fn dof(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub fn hyperedge_count(&self) -> usize {
        self.hyperedges.len()
    }

    pub fn hyperedges(&self) -> &[Hyperedge] {
        &self.hyperedges
    }

    pub fn components(&self) -> impl Iterator<Item = ComponentId> + use<> {
        (0..self.components.len()).map(ComponentId)
    }

    pub(crate) fn check(&self, c: ComponentId) -> Result<(), MechError> {
        if c.0 < self.components.len() {
            Ok(())
        } else {
            Err(MechError::UnknownComponent(c.0))
        }
    }

    /// Hyperedges of component `c`.
    pub fn component(&self, c: ComponentId) -> Result<impl Iterator<Item = &Hyperedge>, MechError> {
        self.check(c)?;
        Ok(self.components[c.0].iter().map(|&h| &self.hyperedges[h]))
    }

    /// Components that `cell`'s hyperedges belong to (one per hyperedge).
    pub fn components_of_cell(&self, cell: CellId) -> Vec<ComponentId> {
        self.by_cell
            .get(&cell)
            .map(|hs| hs.iter().map(|&h| self.component_of[h]).collect())
            .unwrap_or_default()
    }

    /// Every cell owning an edge of `c`'s hyperedges.
    pub fn cells_of(&self, c: ComponentId) -> Result<&[CellId], MechError> {
        self.check(c)?;
        Ok(&self.cells_of[c.0])
    }

    /// Cells with at least one hyperedge in `c`.
    pub fn member_cells(&self, c: ComponentId) -> Result<&[CellId], MechError> {
        self.check(c)?;
        Ok(&self.members_of[c.0])
    }

    /// Cells whose edges appear in both components: converting one of them to
    /// a rigid cell fuses `a` and `b`.
    pub fn merge_candidates(&self, a: ComponentId, b: ComponentId) -> Result<Vec<CellId>, MechError> {
        let cb = self.cells_of(b)?;
        Ok(self
            .cells_of(a)?
            .iter()
            .copied()
            .filter(|c| cb.binary_search(c).is_ok())
            .collect())
    }

    /// Rigid cells whose 4-edge hyperedge lies in `c`.
    pub fn split_candidates(&self, c: ComponentId) -> Result<Vec<CellId>, MechError> {
        Ok(self
            .component(c)?
            .filter(|h| h.kind == CellKind::Rigid && h.edges.len() == 4)
            .map(|h| h.cell)
            .collect())
    }

    /// Whether every hyperedge of `cell` lies in `c`.
    pub fn is_non_shearing(&self, cell: CellId, c: ComponentId) -> bool {
        self.by_cell
            .get(&cell)
            .is_some_and(|hs| hs.iter().all(|&h| self.component_of[h] == c))
    }

    /// Two distinct random components, or `None` when there are fewer than two.
    pub fn try_pick_random_components<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Option<(ComponentId, ComponentId)> {
        let n = self.components.len();
        if n < 2 {
            return None;
        }
        let a = rng.gen_range(0..n);
        let b = (a + rng.gen_range(1..n)) % n;
        Some((ComponentId(a), ComponentId(b)))
    }
}
