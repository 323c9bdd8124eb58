//! Non-shearing areas and component splitting.
//!
//! A cell is non-shearing with respect to a component when all its hyperedges
//! already belong to that component: it adds no motion of its own. Maximal
//! 4-connected clusters of such cells behave as one rigid block, and they are
//! where a component can be cut apart again.

use crate::algs::constraint_graph::{ComponentId, ConstraintGraph};
use crate::geometry::vector::distance;
use crate::mech_error::MechError;
use crate::topology::cell_type::CellKind;
use crate::topology::grid::Grid;
use crate::topology::point::{CellId, GridPoint, VertexId};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Axis along which [`split_component_at`] converts cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitAxis {
    /// Walk along ±x.
    Horizontal,
    /// Walk along ±y.
    Vertical,
    /// Not supported; always rejected.
    Corner,
}

impl SplitAxis {
    fn step(self) -> Option<(i32, i32)> {
        match self {
            SplitAxis::Horizontal => Some((1, 0)),
            SplitAxis::Vertical => Some((0, 1)),
            SplitAxis::Corner => None,
        }
    }
}

/// Maximal 4-connected cluster of non-shearing cells in one component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NonShearingArea {
    pub cells: Vec<CellId>,
    /// Smallest index vertex over the cluster.
    pub min: GridPoint,
    /// Largest index vertex over the cluster.
    pub max: GridPoint,
}

impl NonShearingArea {
    pub fn contains(&self, cell: CellId) -> bool {
        self.cells.contains(&cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Nearest attachment point of a non-shearing area to an anchor.
#[derive(Clone, Debug, PartialEq)]
pub struct AreaAttachment {
    /// Index into [`ConstraintGraph::non_shearing_areas`].
    pub area: usize,
    /// Bounding-box corner nearest to the anchor.
    pub corner: GridPoint,
    /// Area cell closest to that corner.
    pub cell: CellId,
    /// Corner vertex of `cell` closest to `corner`.
    pub vertex: VertexId,
    pub distance: f64,
}

const NEIGHBOURS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

fn flood_fill(grid: &Grid, graph: &ConstraintGraph, c: ComponentId) -> Vec<NonShearingArea> {
    let mut seeds: Vec<CellId> = grid
        .cells()
        .map(|(id, _)| id)
        .filter(|&id| graph.is_non_shearing(id, c))
        .collect();
    seeds.sort_by_key(|&id| grid[id].index());
    let candidates: HashSet<CellId> = seeds.iter().copied().collect();

    let mut seen: HashSet<CellId> = HashSet::new();
    let mut areas = Vec::new();
    for seed in seeds {
        if !seen.insert(seed) {
            continue;
        }
        let mut cells = Vec::new();
        let mut queue = VecDeque::from([seed]);
        while let Some(cell) = queue.pop_front() {
            cells.push(cell);
            for (dx, dy) in NEIGHBOURS {
                if let Some(n) = grid.grid_neighbor(cell, dx, dy) {
                    if candidates.contains(&n) && seen.insert(n) {
                        queue.push_back(n);
                    }
                }
            }
        }
        let first = grid[cells[0]].index();
        let (min, max) = cells.iter().map(|&id| grid[id].index()).fold(
            (first, first),
            |(lo, hi), p| {
                (
                    GridPoint::new(lo.x.min(p.x), lo.y.min(p.y)),
                    GridPoint::new(hi.x.max(p.x), hi.y.max(p.y)),
                )
            },
        );
        areas.push(NonShearingArea { cells, min, max });
    }
    areas
}

impl ConstraintGraph {
    /// Non-shearing areas of `c`, computed once per graph.
    pub fn non_shearing_areas(
        &self,
        grid: &Grid,
        c: ComponentId,
    ) -> Result<&[NonShearingArea], MechError> {
        self.check(c)?;
        Ok(self.areas[c.0].get_or_init(|| flood_fill(grid, self, c)))
    }

    /// Fraction of `c`'s member cells that are non-shearing.
    pub fn rigidity(&self, grid: &Grid, c: ComponentId) -> Result<f64, MechError> {
        let members = self.member_cells(c)?.len();
        if members == 0 {
            return Ok(0.0);
        }
        let inside: usize = self.non_shearing_areas(grid, c)?.iter().map(|a| a.len()).sum();
        Ok(inside as f64 / members as f64)
    }

    /// The non-shearing area of `c` with a bounding-box corner nearest to
    /// `anchor`, or `None` when `c` has no non-shearing cells.
    pub fn closest_non_shearing_area_to_anchor(
        &self,
        grid: &Grid,
        c: ComponentId,
        anchor: GridPoint,
    ) -> Result<Option<AreaAttachment>, MechError> {
        let target = anchor.to_vec();
        let mut best: Option<(usize, GridPoint, f64)> = None;
        for (ai, area) in self.non_shearing_areas(grid, c)?.iter().enumerate() {
            let [w, h] = grid[area.cells[0]].size();
            let corners = [
                area.min,
                GridPoint::new(area.max.x + w, area.min.y),
                area.max.offset(w, h),
                GridPoint::new(area.min.x, area.max.y + h),
            ];
            for corner in corners {
                let d = distance(corner.to_vec(), target);
                if best.is_none_or(|(_, _, bd)| d < bd) {
                    best = Some((ai, corner, d));
                }
            }
        }
        let Some((ai, corner, d)) = best else {
            return Ok(None);
        };
        let area = &self.non_shearing_areas(grid, c)?[ai];
        let mut pick: Option<(CellId, VertexId, f64)> = None;
        for &cell in &area.cells {
            for v in grid[cell].vertices() {
                let dv = distance(grid[v].initial(), corner.to_vec());
                if pick.is_none_or(|(_, _, bd)| dv < bd) {
                    pick = Some((cell, v, dv));
                }
            }
        }
        Ok(pick.map(|(cell, vertex, _)| AreaAttachment {
            area: ai,
            corner,
            cell,
            vertex,
            distance: d,
        }))
    }
}

/// Convert the rigid cells of `cell`'s non-shearing area that lie on the line
/// through `cell` along `axis` into shear cells, then rebuild the graph.
///
/// Returns the index positions of converted cells; empty when `cell` lies in
/// no non-shearing area of `c`.
pub fn split_component_at(
    grid: &mut Grid,
    c: ComponentId,
    cell: CellId,
    axis: SplitAxis,
) -> Result<Vec<GridPoint>, MechError> {
    let (dx, dy) = axis.step().ok_or(MechError::UnsupportedSplitAxis(axis))?;
    let mut line = Vec::new();
    {
        let graph = grid.constraint_graph();
        let areas = graph.non_shearing_areas(grid, c)?;
        let Some(area) = areas.iter().find(|a| a.contains(cell)) else {
            return Ok(Vec::new());
        };
        line.push(cell);
        for dir in [1, -1] {
            let mut at = cell;
            while let Some(n) = grid.grid_neighbor(at, dir * dx, dir * dy) {
                if !area.contains(n) {
                    break;
                }
                line.push(n);
                at = n;
            }
        }
    }
    let targets: Vec<GridPoint> = line
        .into_iter()
        .filter(|&id| grid[id].kind() == CellKind::Rigid)
        .map(|id| grid[id].index())
        .collect();
    for &p in &targets {
        grid.set_cell_kind(p, CellKind::Shear)?;
    }
    grid.build_constraint_graph();
    log::debug!("split along {axis:?} converted {} cells", targets.len());
    Ok(targets)
}

/// Turn shear cells that cannot shear (both hyperedges in one component) into
/// rigid cells. DoF is unchanged. Returns the converted positions.
pub fn promote_non_shearing_cells(grid: &mut Grid) -> Result<Vec<GridPoint>, MechError> {
    let targets: Vec<GridPoint> = {
        let graph = grid.constraint_graph();
        grid.cells()
            .filter(|(_, cell)| cell.kind() == CellKind::Shear)
            .filter(|(id, _)| {
                let comps = graph.components_of_cell(*id);
                comps.windows(2).all(|w| w[0] == w[1])
            })
            .map(|(_, cell)| cell.index())
            .collect()
    };
    for &p in &targets {
        grid.set_cell_kind(p, CellKind::Rigid)?;
    }
    Ok(targets)
}

impl Grid {
    /// Like [`Grid::encoding`], but shear cells that cannot shear read as `0`.
    pub fn effective_encoding(&self) -> String {
        let graph = self.constraint_graph();
        self.encode_with(|id, cell| match cell.kind() {
            CellKind::Rigid => '0',
            CellKind::Shear => {
                let comps = graph.components_of_cell(id);
                if comps.windows(2).all(|w| w[0] == w[1]) { '0' } else { '1' }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> GridPoint {
        GridPoint::new(x, y)
    }

    #[test]
    fn rigid_block_is_one_area() {
        let g = Grid::filled(3, 2, CellKind::Rigid).unwrap();
        let graph = g.constraint_graph();
        let areas = graph.non_shearing_areas(&g, ComponentId(0)).unwrap();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].len(), 6);
        assert_eq!((areas[0].min, areas[0].max), (p(0, 0), p(2, 1)));
        assert!((graph.rigidity(&g, ComponentId(0)).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn disconnected_rigid_islands_form_separate_areas() {
        // Rigid cells at both ends of a shear row share the vertical chain.
        let mut g = Grid::filled(3, 1, CellKind::Shear).unwrap();
        g.set_cell_kind(p(0, 0), CellKind::Rigid).unwrap();
        g.set_cell_kind(p(2, 0), CellKind::Rigid).unwrap();
        let graph = g.constraint_graph();
        let chain = graph.components_of_cell(g.cell_at(p(0, 0)).unwrap())[0];
        let areas = graph.non_shearing_areas(&g, chain).unwrap();
        assert_eq!(areas.len(), 2);
        let r = graph.rigidity(&g, chain).unwrap();
        assert!((r - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn split_reverts_merge() {
        let mut g = Grid::filled(2, 1, CellKind::Shear).unwrap();
        let before = g.dof();
        g.set_cell_kind(p(0, 0), CellKind::Rigid).unwrap();
        assert_eq!(g.dof(), before - 1);
        let cell = g.cell_at(p(0, 0)).unwrap();
        let comp = g.constraint_graph().components_of_cell(cell)[0];
        let changed = split_component_at(&mut g, comp, cell, SplitAxis::Horizontal).unwrap();
        assert_eq!(changed, vec![p(0, 0)]);
        assert_eq!(g.dof(), before);
    }

    #[test]
    fn split_walks_within_area_only() {
        let mut g = Grid::filled(4, 1, CellKind::Rigid).unwrap();
        g.set_cell_kind(p(3, 0), CellKind::Shear).unwrap();
        let cell = g.cell_at(p(1, 0)).unwrap();
        let comp = g.constraint_graph().components_of_cell(cell)[0];
        let mut changed = split_component_at(&mut g, comp, cell, SplitAxis::Horizontal).unwrap();
        changed.sort();
        assert_eq!(changed, vec![p(0, 0), p(1, 0), p(2, 0)]);
    }

    #[test]
    fn corner_axis_is_rejected() {
        let mut g = Grid::filled(1, 1, CellKind::Rigid).unwrap();
        let cell = g.cell_at(p(0, 0)).unwrap();
        let err = split_component_at(&mut g, ComponentId(0), cell, SplitAxis::Corner).unwrap_err();
        assert_eq!(err, MechError::UnsupportedSplitAxis(SplitAxis::Corner));
    }

    #[test]
    fn closest_area_corner() {
        let mut g = Grid::filled(4, 4, CellKind::Rigid).unwrap();
        g.add_cell(CellKind::Rigid, p(10, 10), [1, 1]).unwrap();
        let graph = g.constraint_graph();
        let comp = graph.components_of_cell(g.cell_at(p(0, 0)).unwrap())[0];
        let hit = graph
            .closest_non_shearing_area_to_anchor(&g, comp, p(6, 5))
            .unwrap()
            .unwrap();
        assert_eq!(hit.corner, p(4, 4));
        assert_eq!(g[hit.vertex].point(), p(4, 4));
        assert_eq!(g[hit.cell].index(), p(3, 3));
    }

    #[test]
    fn promotion_keeps_dof() {
        // A shear cell boxed in by rigid cells cannot shear.
        let mut g = Grid::filled(3, 3, CellKind::Rigid).unwrap();
        g.set_cell_kind(p(1, 1), CellKind::Shear).unwrap();
        let dof = g.dof();
        assert_eq!(g.effective_encoding(), "000000000");
        let changed = promote_non_shearing_cells(&mut g).unwrap();
        assert_eq!(changed, vec![p(1, 1)]);
        assert_eq!(g.dof(), dof);
        assert_eq!(g.encoding(), "000000000");
    }
}
