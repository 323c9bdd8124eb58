//! Arena of vertices, edges and cells on an integer grid.
//!
//! Cells own their four corner vertices and four boundary edges by id;
//! vertices and edges keep non-owning lists of the cells that use them. Every
//! mutation keeps both directions in sync, removes edges nobody owns and
//! removes vertices once their last owning cell is gone.
//!
//! The constraint graph is derived data. It is built lazily on first access
//! and dropped on every topology or cell-kind change.

use crate::algs::constraint_graph::ConstraintGraph;
use crate::debug_invariants::DebugInvariants;
use crate::geometry::Vec2;
use crate::mech_error::MechError;
use crate::topology::cache::InvalidateCache;
use crate::topology::cell_type::CellKind;
use crate::topology::point::{CellId, EdgeId, GridPoint, VertexId};
use hashbrown::HashMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// A grid vertex: immutable integer identity plus mutable floating position.
#[derive(Clone, Debug)]
pub struct Vertex {
    point: GridPoint,
    position: Vec2,
    anchor: bool,
    owners: Vec<CellId>,
}

impl Vertex {
    fn new(point: GridPoint) -> Self {
        Self {
            point,
            position: point.to_vec(),
            anchor: false,
            owners: Vec::new(),
        }
    }

    #[inline]
    pub fn point(&self) -> GridPoint {
        self.point
    }
    /// Undeformed position (the integer coordinates).
    #[inline]
    pub fn initial(&self) -> Vec2 {
        self.point.to_vec()
    }
    /// Current, possibly deformed, position.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }
    #[inline]
    pub fn is_anchor(&self) -> bool {
        self.anchor
    }
    /// Cells that use this vertex as a corner.
    #[inline]
    pub fn owners(&self) -> &[CellId] {
        &self.owners
    }
}

/// An undirected boundary edge.
#[derive(Clone, Debug)]
pub struct Edge {
    ends: [VertexId; 2],
    owners: Vec<CellId>,
}

impl Edge {
    #[inline]
    pub fn ends(&self) -> [VertexId; 2] {
        self.ends
    }
    #[inline]
    pub fn owners(&self) -> &[CellId] {
        &self.owners
    }
}

/// A quad cell. Corners run CCW from the index vertex:
/// `[index, index+(w,0), index+(w,h), index+(0,h)]`; edge `i` joins corner `i`
/// to corner `i+1`.
#[derive(Clone, Debug)]
pub struct Cell {
    kind: CellKind,
    index: GridPoint,
    size: [i32; 2],
    vertices: [VertexId; 4],
    edges: [EdgeId; 4],
    constraints: Vec<Vec<EdgeId>>,
}

impl Cell {
    #[inline]
    pub fn kind(&self) -> CellKind {
        self.kind
    }
    /// Position of the index vertex; also the cell's identity on the grid.
    #[inline]
    pub fn index(&self) -> GridPoint {
        self.index
    }
    #[inline]
    pub fn size(&self) -> [i32; 2] {
        self.size
    }
    #[inline]
    pub fn vertices(&self) -> [VertexId; 4] {
        self.vertices
    }
    #[inline]
    pub fn edges(&self) -> [EdgeId; 4] {
        self.edges
    }
    /// Hyperedges: one 4-edge set for rigid cells, two opposite pairs for shear cells.
    #[inline]
    pub fn constraints(&self) -> &[Vec<EdgeId>] {
        &self.constraints
    }
    /// Corner slot of `v`, if it belongs to this cell.
    pub fn slot_of(&self, v: VertexId) -> Option<usize> {
        self.vertices.iter().position(|&c| c == v)
    }
}

fn corner_points(index: GridPoint, size: [i32; 2]) -> [GridPoint; 4] {
    let [w, h] = size;
    [
        index,
        index.offset(w, 0),
        index.offset(w, h),
        index.offset(0, h),
    ]
}

fn edge_key(a: GridPoint, b: GridPoint) -> (GridPoint, GridPoint) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Slot storage with a free list; iteration follows slot order.
#[derive(Clone, Debug)]
struct Slots<T> {
    items: Vec<Option<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> Slots<T> {
    fn insert(&mut self, item: T) -> usize {
        self.len += 1;
        match self.free.pop() {
            Some(i) => {
                self.items[i] = Some(item);
                i
            }
            None => {
                self.items.push(Some(item));
                self.items.len() - 1
            }
        }
    }

    fn remove(&mut self, i: usize) -> Option<T> {
        let item = self.items.get_mut(i)?.take();
        if item.is_some() {
            self.free.push(i);
            self.len -= 1;
        }
        item
    }

    fn get(&self, i: usize) -> Option<&T> {
        self.items.get(i)?.as_ref()
    }

    fn get_mut(&mut self, i: usize) -> Option<&mut T> {
        self.items.get_mut(i)?.as_mut()
    }

    fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (i, t)))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut().filter_map(Option::as_mut)
    }
}

/// Snapshot of cell kinds and anchors, enough to rebuild a grid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub cells: Vec<(GridPoint, [i32; 2], CellKind)>,
    pub anchors: Vec<GridPoint>,
}

impl Layout {
    /// The same layout shifted by `(dx, dy)`.
    pub fn translated(&self, dx: i32, dy: i32) -> Layout {
        Layout {
            cells: self
                .cells
                .iter()
                .map(|&(p, s, k)| (p.offset(dx, dy), s, k))
                .collect(),
            anchors: self.anchors.iter().map(|a| a.offset(dx, dy)).collect(),
        }
    }

    /// Number of cells of `kind`.
    pub fn count(&self, kind: CellKind) -> usize {
        self.cells.iter().filter(|c| c.2 == kind).count()
    }
}

/// The grid topology model.
#[derive(Clone, Debug, Default)]
pub struct Grid {
    vertices: Slots<Vertex>,
    edges: Slots<Edge>,
    cells: Slots<Cell>,
    vertex_at: HashMap<GridPoint, VertexId>,
    edge_at: HashMap<(GridPoint, GridPoint), EdgeId>,
    cell_at: HashMap<GridPoint, CellId>,
    graph: OnceCell<ConstraintGraph>,
}

impl Index<VertexId> for Grid {
    type Output = Vertex;
    /// # Panics
    /// Panics if `id` does not name a live vertex.
    fn index(&self, id: VertexId) -> &Vertex {
        match self.vertices.get(id.slot()) {
            Some(v) => v,
            None => panic!("stale {id:?}"),
        }
    }
}

impl Index<EdgeId> for Grid {
    type Output = Edge;
    /// # Panics
    /// Panics if `id` does not name a live edge.
    fn index(&self, id: EdgeId) -> &Edge {
        match self.edges.get(id.slot()) {
            Some(e) => e,
            None => panic!("stale {id:?}"),
        }
    }
}

impl Index<CellId> for Grid {
    type Output = Cell;
    /// # Panics
    /// Panics if `id` does not name a live cell.
    fn index(&self, id: CellId) -> &Cell {
        match self.cells.get(id.slot()) {
            Some(c) => c,
            None => panic!("stale {id:?}"),
        }
    }
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid filled with `width x height` unit cells of `kind`, index vertices at
    /// `(0..width, 0..height)`.
    pub fn filled(width: i32, height: i32, kind: CellKind) -> Result<Self, MechError> {
        let mut grid = Grid::new();
        for y in 0..height {
            for x in 0..width {
                grid.add_cell(kind, GridPoint::new(x, y), [1, 1])?;
            }
        }
        Ok(grid)
    }

    // ---------------------------------------------------------------------
    // Counts and lookups
    // ---------------------------------------------------------------------

    pub fn vertex_count(&self) -> usize {
        self.vertices.len
    }
    pub fn edge_count(&self) -> usize {
        self.edges.len
    }
    pub fn cell_count(&self) -> usize {
        self.cells.len
    }
    pub fn is_empty(&self) -> bool {
        self.cells.len == 0
    }

    pub fn vertex_at(&self, p: GridPoint) -> Option<VertexId> {
        self.vertex_at.get(&p).copied()
    }
    pub fn cell_at(&self, p: GridPoint) -> Option<CellId> {
        self.cell_at.get(&p).copied()
    }
    pub fn get_vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.slot())
    }
    pub fn get_cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.slot())
    }
    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.slot())
    }

    /// Live vertices in slot order.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices
            .iter()
            .map(|(i, v)| (VertexId::from_slot(i), v))
    }
    /// Live edges in slot order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().map(|(i, e)| (EdgeId::from_slot(i), e))
    }
    /// Live cells in slot order.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> {
        self.cells.iter().map(|(i, c)| (CellId::from_slot(i), c))
    }

    /// Dense `0..vertex_count` numbering in slot order, used by exports and the
    /// path-fitting request.
    pub fn vertex_numbering(&self) -> HashMap<VertexId, usize> {
        self.vertices()
            .enumerate()
            .map(|(n, (id, _))| (id, n))
            .collect()
    }

    /// Corner slots of `cell` that are anchored.
    pub fn anchored_slots(&self, cell: CellId) -> [bool; 4] {
        self[cell].vertices.map(|v| self[v].anchor)
    }

    pub fn can_move(&self, cell: CellId) -> bool {
        self[cell].kind.can_move(self.anchored_slots(cell))
    }

    /// Cells sharing at least one vertex with `cell`, in corner order.
    pub fn cells_sharing_vertex(&self, cell: CellId) -> Vec<CellId> {
        let mut out = Vec::new();
        for v in self[cell].vertices {
            for &o in &self[v].owners {
                if o != cell && !out.contains(&o) {
                    out.push(o);
                }
            }
        }
        out
    }

    /// Cell one step away along the grid axes, using `cell`'s own size as stride.
    pub fn grid_neighbor(&self, cell: CellId, dx: i32, dy: i32) -> Option<CellId> {
        let c = &self[cell];
        self.cell_at(c.index.offset(dx * c.size[0], dy * c.size[1]))
    }

    /// Min and max index vertex over all cells.
    pub fn bounds(&self) -> Option<(GridPoint, GridPoint)> {
        let mut it = self.cells().map(|(_, c)| c.index);
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), p| {
            (
                GridPoint::new(lo.x.min(p.x), lo.y.min(p.y)),
                GridPoint::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }

    // ---------------------------------------------------------------------
    // Topology mutation
    // ---------------------------------------------------------------------

    /// Add a cell with its index vertex at `index`.
    ///
    /// A cell already at `index` is deleted first; anchors at its corners are
    /// carried over to the new cell.
    pub fn add_cell(
        &mut self,
        kind: CellKind,
        index: GridPoint,
        size: [i32; 2],
    ) -> Result<CellId, MechError> {
        if size[0] <= 0 || size[1] <= 0 {
            return Err(MechError::InvalidCell(format!(
                "cell at {index} has non-positive size {size:?}"
            )));
        }
        let mut carried = Vec::new();
        if let Some(old) = self.cell_at(index) {
            carried.extend(
                self[old]
                    .vertices
                    .iter()
                    .filter(|&&v| self[v].anchor)
                    .map(|&v| self[v].point),
            );
            self.delete_cell(index)?;
        }

        let corners = corner_points(index, size);
        let vertices = corners.map(|p| self.ensure_vertex(p));
        let edges = [0, 1, 2, 3].map(|i| self.ensure_edge(vertices[i], vertices[(i + 1) % 4]));
        let id = CellId::from_slot(self.cells.insert(Cell {
            kind,
            index,
            size,
            vertices,
            edges,
            constraints: kind.constraint_sets(edges),
        }));
        for v in vertices {
            if let Some(vx) = self.vertices.get_mut(v.slot()) {
                vx.owners.push(id);
            }
        }
        for e in edges {
            if let Some(ed) = self.edges.get_mut(e.slot()) {
                ed.owners.push(id);
            }
        }
        self.cell_at.insert(index, id);
        for p in carried {
            self.set_anchor(p, true);
        }
        self.invalidate_cache();
        crate::debug_invariants!(&*self, "after add_cell");
        Ok(id)
    }

    /// Add a cell from four explicit corners in any order.
    pub fn add_cell_from_vertices(
        &mut self,
        kind: CellKind,
        corners: [GridPoint; 4],
    ) -> Result<CellId, MechError> {
        let lo = GridPoint::new(
            corners.iter().map(|p| p.x).min().unwrap_or_default(),
            corners.iter().map(|p| p.y).min().unwrap_or_default(),
        );
        let hi = GridPoint::new(
            corners.iter().map(|p| p.x).max().unwrap_or_default(),
            corners.iter().map(|p| p.y).max().unwrap_or_default(),
        );
        let size = [hi.x - lo.x, hi.y - lo.y];
        let expected = corner_points(lo, size);
        if size[0] <= 0 || size[1] <= 0 || expected.iter().any(|p| !corners.contains(p)) {
            return Err(MechError::InvalidCell(format!(
                "corners {corners:?} are not an axis-aligned quad"
            )));
        }
        self.add_cell(kind, lo, size)
    }

    /// Remove the cell at `index`, dropping vertices and edges nobody else owns.
    pub fn delete_cell(&mut self, index: GridPoint) -> Result<CellKind, MechError> {
        let id = self
            .cell_at
            .remove(&index)
            .ok_or(MechError::UnknownCell(index))?;
        let cell = self
            .cells
            .remove(id.slot())
            .ok_or(MechError::UnknownCell(index))?;

        for e in cell.edges {
            let orphaned = match self.edges.get_mut(e.slot()) {
                Some(edge) => {
                    edge.owners.retain(|&c| c != id);
                    edge.owners.is_empty()
                }
                None => false,
            };
            if orphaned {
                self.remove_edge(e);
            }
        }
        for v in cell.vertices {
            let orphaned = match self.vertices.get_mut(v.slot()) {
                Some(vx) => {
                    vx.owners.retain(|&c| c != id);
                    vx.owners.is_empty()
                }
                None => false,
            };
            if orphaned {
                self.remove_vertex(v, &cell.edges);
            }
        }
        self.invalidate_cache();
        crate::debug_invariants!(&*self, "after delete_cell");
        Ok(cell.kind)
    }

    /// Change the kind of the cell at `index`, keeping its size and anchors.
    pub fn set_cell_kind(&mut self, index: GridPoint, kind: CellKind) -> Result<CellId, MechError> {
        let id = self.cell_at(index).ok_or(MechError::UnknownCell(index))?;
        if self[id].kind == kind {
            return Ok(id);
        }
        let size = self[id].size;
        self.add_cell(kind, index, size)
    }

    /// Remove every cell, vertex and edge.
    pub fn clear(&mut self) {
        *self = Grid::default();
    }

    fn ensure_vertex(&mut self, p: GridPoint) -> VertexId {
        if let Some(&id) = self.vertex_at.get(&p) {
            return id;
        }
        let id = VertexId::from_slot(self.vertices.insert(Vertex::new(p)));
        self.vertex_at.insert(p, id);
        id
    }

    fn ensure_edge(&mut self, a: VertexId, b: VertexId) -> EdgeId {
        let key = edge_key(self[a].point, self[b].point);
        if let Some(&id) = self.edge_at.get(&key) {
            return id;
        }
        let ends = if self[a].point <= self[b].point { [a, b] } else { [b, a] };
        let id = EdgeId::from_slot(self.edges.insert(Edge {
            ends,
            owners: Vec::new(),
        }));
        self.edge_at.insert(key, id);
        id
    }

    fn remove_edge(&mut self, id: EdgeId) {
        if let Some(edge) = self.edges.remove(id.slot()) {
            let key = edge_key(self[edge.ends[0]].point, self[edge.ends[1]].point);
            self.edge_at.remove(&key);
        }
    }

    /// Remove an orphaned vertex. Every edge touching it belonged to the cell
    /// that last owned it, so only that cell's `edges` need checking.
    fn remove_vertex(&mut self, id: VertexId, edges: &[EdgeId]) {
        for &e in edges {
            if self.get_edge(e).is_some_and(|ed| ed.ends.contains(&id)) {
                self.remove_edge(e);
            }
        }
        if let Some(v) = self.vertices.remove(id.slot()) {
            self.vertex_at.remove(&v.point);
        }
    }

    // ---------------------------------------------------------------------
    // Anchors
    // ---------------------------------------------------------------------

    /// Set the anchor flag of the vertex at `p`. Returns `false` (and does
    /// nothing) if no vertex exists there.
    pub fn set_anchor(&mut self, p: GridPoint, enabled: bool) -> bool {
        match self.vertex_at(p).and_then(|id| self.vertices.get_mut(id.slot())) {
            Some(v) => {
                v.anchor = enabled;
                true
            }
            None => false,
        }
    }

    /// Flip the anchor flag of the vertex at `p`, if one exists.
    pub fn toggle_anchor(&mut self, p: GridPoint) -> bool {
        match self.vertex_at(p).and_then(|id| self.vertices.get_mut(id.slot())) {
            Some(v) => {
                v.anchor = !v.anchor;
                true
            }
            None => false,
        }
    }

    pub fn clear_anchors(&mut self) {
        for v in self.vertices.iter_mut() {
            v.anchor = false;
        }
    }

    /// Anchored vertex positions in slot order.
    pub fn anchors(&self) -> Vec<GridPoint> {
        self.vertices()
            .filter(|(_, v)| v.anchor)
            .map(|(_, v)| v.point)
            .collect()
    }

    pub fn has_anchors(&self) -> bool {
        self.vertices().any(|(_, v)| v.anchor)
    }

    // ---------------------------------------------------------------------
    // Positions
    // ---------------------------------------------------------------------

    /// Move a vertex. Anchored vertices never move.
    pub(crate) fn set_position(&mut self, id: VertexId, pos: Vec2) {
        if let Some(v) = self.vertices.get_mut(id.slot()) {
            if !v.anchor {
                v.position = pos;
            }
        }
    }

    /// Current positions in slot order.
    pub fn positions(&self) -> Vec<(VertexId, Vec2)> {
        self.vertices().map(|(id, v)| (id, v.position)).collect()
    }

    /// Restore positions taken with [`Grid::positions`].
    pub fn restore_positions(&mut self, snapshot: &[(VertexId, Vec2)]) {
        for &(id, pos) in snapshot {
            if let Some(v) = self.vertices.get_mut(id.slot()) {
                v.position = pos;
            }
        }
    }

    /// Return every vertex to its integer coordinates.
    pub fn reset_deformation(&mut self) {
        for v in self.vertices.iter_mut() {
            v.position = v.point.to_vec();
        }
    }

    // ---------------------------------------------------------------------
    // Layout snapshots
    // ---------------------------------------------------------------------

    pub fn layout(&self) -> Layout {
        let mut cells: Vec<_> = self
            .cells()
            .map(|(_, c)| (c.index, c.size, c.kind))
            .collect();
        cells.sort_by_key(|c| c.0);
        let mut anchors = self.anchors();
        anchors.sort();
        Layout { cells, anchors }
    }

    /// Make the grid match `layout`, touching only cells that differ.
    pub fn apply_layout(&mut self, layout: &Layout) -> Result<(), MechError> {
        let wanted: HashMap<GridPoint, ([i32; 2], CellKind)> =
            layout.cells.iter().map(|&(p, s, k)| (p, (s, k))).collect();
        let stale: Vec<GridPoint> = self
            .cells()
            .map(|(_, c)| c.index)
            .filter(|p| !wanted.contains_key(p))
            .collect();
        for p in stale {
            self.delete_cell(p)?;
        }
        for &(p, size, kind) in &layout.cells {
            let same = self
                .cell_at(p)
                .is_some_and(|id| self[id].size == size && self[id].kind == kind);
            if !same {
                self.add_cell(kind, p, size)?;
            }
        }
        self.clear_anchors();
        for &a in &layout.anchors {
            self.set_anchor(a, true);
        }
        Ok(())
    }

    /// Rebuild a grid from a layout.
    pub fn from_layout(layout: &Layout) -> Result<Self, MechError> {
        let mut grid = Grid::new();
        grid.apply_layout(layout)?;
        Ok(grid)
    }

    /// Row-major cell code over the bounding box, bottom row first:
    /// `0` rigid, `1` shear, `-` empty.
    pub fn encoding(&self) -> String {
        self.encode_with(|_, c| match c.kind {
            CellKind::Rigid => '0',
            CellKind::Shear => '1',
        })
    }

    pub(crate) fn encode_with(&self, f: impl Fn(CellId, &Cell) -> char) -> String {
        let Some((lo, hi)) = self.bounds() else {
            return String::new();
        };
        let mut out = String::new();
        for y in lo.y..=hi.y {
            for x in lo.x..=hi.x {
                out.push(match self.cell_at(GridPoint::new(x, y)) {
                    Some(id) => f(id, &self[id]),
                    None => '-',
                });
            }
        }
        out
    }

    // ---------------------------------------------------------------------
    // Constraint graph
    // ---------------------------------------------------------------------

    /// The constraint graph for the current topology, built on first use.
    pub fn constraint_graph(&self) -> &ConstraintGraph {
        self.graph.get_or_init(|| ConstraintGraph::build(self))
    }

    /// Discard any cached graph and build a fresh one.
    pub fn build_constraint_graph(&mut self) -> &ConstraintGraph {
        self.invalidate_cache();
        self.constraint_graph()
    }

    /// Degrees of freedom: the number of constraint-graph components.
    pub fn dof(&self) -> usize {
        self.constraint_graph().dof()
    }
}

impl InvalidateCache for Grid {
    fn invalidate_cache(&mut self) {
        self.graph.take();
    }
}

impl DebugInvariants for Grid {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self, "Grid");
    }

    fn validate_invariants(&self) -> Result<(), MechError> {
        let fail = |msg: String| Err(MechError::Invariant(msg));
        for (cid, cell) in self.cells() {
            if self.cell_at.get(&cell.index) != Some(&cid) {
                return fail(format!("{cid:?} missing from position map"));
            }
            for v in cell.vertices {
                match self.get_vertex(v) {
                    Some(vx) if vx.owners.contains(&cid) => {}
                    _ => return fail(format!("{cid:?} not owned back by {v:?}")),
                }
            }
            for e in cell.edges {
                match self.get_edge(e) {
                    Some(ed) if ed.owners.contains(&cid) => {}
                    _ => return fail(format!("{cid:?} not owned back by {e:?}")),
                }
            }
        }
        for (vid, v) in self.vertices() {
            if v.owners.is_empty() {
                return fail(format!("orphaned {vid:?} at {}", v.point));
            }
            if self.vertex_at.get(&v.point) != Some(&vid) {
                return fail(format!("{vid:?} missing from position map"));
            }
            for &c in &v.owners {
                if !self.get_cell(c).is_some_and(|cell| cell.vertices.contains(&vid)) {
                    return fail(format!("{vid:?} lists non-owner {c:?}"));
                }
            }
        }
        for (eid, e) in self.edges() {
            if e.owners.is_empty() {
                return fail(format!("orphaned {eid:?}"));
            }
            if e.ends.iter().any(|&v| self.get_vertex(v).is_none()) {
                return fail(format!("{eid:?} ends at a removed vertex"));
            }
            for &c in &e.owners {
                if !self.get_cell(c).is_some_and(|cell| cell.edges.contains(&eid)) {
                    return fail(format!("{eid:?} lists non-owner {c:?}"));
                }
            }
        }
        if self.vertex_at.len() != self.vertex_count() || self.cell_at.len() != self.cell_count() {
            return fail("position maps out of sync".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> GridPoint {
        GridPoint::new(x, y)
    }

    #[test]
    fn add_cell_builds_ccw_corners_and_edges() {
        let mut g = Grid::new();
        let c = g.add_cell(CellKind::Rigid, p(2, 3), [1, 1]).unwrap();
        let pts = g[c].vertices().map(|v| g[v].point());
        assert_eq!(pts, [p(2, 3), p(3, 3), p(3, 4), p(2, 4)]);
        assert_eq!((g.vertex_count(), g.edge_count(), g.cell_count()), (4, 4, 1));
        let e0 = &g[g[c].edges()[0]];
        assert!(e0.ends().contains(&g[c].vertices()[0]));
        assert!(e0.ends().contains(&g[c].vertices()[1]));
    }

    #[test]
    fn neighbours_share_vertices_and_edges() {
        let mut g = Grid::new();
        g.add_cell(CellKind::Shear, p(0, 0), [1, 1]).unwrap();
        g.add_cell(CellKind::Shear, p(1, 0), [1, 1]).unwrap();
        assert_eq!(g.vertex_count(), 6);
        assert_eq!(g.edge_count(), 7);
        let shared = g.vertex_at(p(1, 0)).unwrap();
        assert_eq!(g[shared].owners().len(), 2);
        g.validate_invariants().unwrap();
    }

    #[test]
    fn delete_keeps_shared_vertices() {
        let mut g = Grid::new();
        g.add_cell(CellKind::Shear, p(0, 0), [1, 1]).unwrap();
        g.add_cell(CellKind::Rigid, p(1, 0), [1, 1]).unwrap();
        assert_eq!(g.delete_cell(p(1, 0)).unwrap(), CellKind::Rigid);
        assert_eq!((g.vertex_count(), g.edge_count(), g.cell_count()), (4, 4, 1));
        assert!(g.vertex_at(p(2, 0)).is_none());
        g.validate_invariants().unwrap();
        assert!(matches!(g.delete_cell(p(5, 5)), Err(MechError::UnknownCell(_))));
    }

    #[test]
    fn deleting_a_corner_cell_drops_its_private_edges() {
        let mut g = Grid::filled(2, 2, CellKind::Shear).unwrap();
        assert_eq!((g.vertex_count(), g.edge_count()), (9, 12));
        g.delete_cell(p(1, 1)).unwrap();
        assert_eq!((g.vertex_count(), g.edge_count(), g.cell_count()), (8, 10, 3));
        assert!(g.vertex_at(p(2, 2)).is_none());
        assert!(g.vertex_at(p(1, 2)).is_some());
        g.validate_invariants().unwrap();
        g.delete_cell(p(0, 0)).unwrap();
        g.delete_cell(p(1, 0)).unwrap();
        assert_eq!((g.vertex_count(), g.edge_count(), g.cell_count()), (4, 4, 1));
        g.validate_invariants().unwrap();
    }

    #[test]
    fn replacing_a_cell_keeps_anchors() {
        let mut g = Grid::new();
        g.add_cell(CellKind::Rigid, p(0, 0), [1, 1]).unwrap();
        assert!(g.set_anchor(p(0, 0), true));
        g.set_cell_kind(p(0, 0), CellKind::Shear).unwrap();
        assert_eq!(g.anchors(), vec![p(0, 0)]);
        assert_eq!(g[g.cell_at(p(0, 0)).unwrap()].kind(), CellKind::Shear);
        assert_eq!(g.cell_count(), 1);
    }

    #[test]
    fn anchor_on_missing_vertex_is_noop() {
        let mut g = Grid::new();
        g.add_cell(CellKind::Rigid, p(0, 0), [1, 1]).unwrap();
        assert!(!g.set_anchor(p(7, 7), true));
        assert!(!g.toggle_anchor(p(7, 7)));
        assert!(g.toggle_anchor(p(1, 1)));
        assert_eq!(g.anchors(), vec![p(1, 1)]);
        assert!(g.toggle_anchor(p(1, 1)));
        assert!(!g.has_anchors());
    }

    #[test]
    fn anchored_vertices_do_not_move() {
        let mut g = Grid::new();
        g.add_cell(CellKind::Rigid, p(0, 0), [1, 1]).unwrap();
        g.set_anchor(p(0, 0), true);
        let a = g.vertex_at(p(0, 0)).unwrap();
        let b = g.vertex_at(p(1, 0)).unwrap();
        g.set_position(a, [5.0, 5.0]);
        g.set_position(b, [5.0, 5.0]);
        assert_eq!(g[a].position(), [0.0, 0.0]);
        assert_eq!(g[b].position(), [5.0, 5.0]);
        g.reset_deformation();
        assert_eq!(g[b].position(), [1.0, 0.0]);
    }

    #[test]
    fn cell_from_unordered_corners() {
        let mut g = Grid::new();
        let c = g
            .add_cell_from_vertices(CellKind::Shear, [p(1, 1), p(0, 0), p(0, 1), p(1, 0)])
            .unwrap();
        assert_eq!(g[c].index(), p(0, 0));
        assert!(
            g.add_cell_from_vertices(CellKind::Shear, [p(0, 0), p(2, 0), p(1, 1), p(0, 1)])
                .is_err()
        );
    }

    #[test]
    fn layout_round_trip() {
        let mut g = Grid::filled(3, 2, CellKind::Shear).unwrap();
        g.set_cell_kind(p(1, 1), CellKind::Rigid).unwrap();
        g.set_anchor(p(0, 0), true);
        let snap = g.layout();
        g.set_cell_kind(p(1, 1), CellKind::Shear).unwrap();
        g.set_cell_kind(p(0, 0), CellKind::Rigid).unwrap();
        g.delete_cell(p(2, 1)).unwrap();
        g.set_anchor(p(0, 0), false);
        g.apply_layout(&snap).unwrap();
        assert_eq!(g.layout(), snap);
        g.validate_invariants().unwrap();
    }

    #[test]
    fn encoding_is_row_major() {
        let mut g = Grid::filled(2, 2, CellKind::Shear).unwrap();
        g.set_cell_kind(p(1, 0), CellKind::Rigid).unwrap();
        g.delete_cell(p(0, 1)).unwrap();
        assert_eq!(g.encoding(), "10-1");
    }

    #[test]
    fn graph_cache_invalidated_on_mutation() {
        let mut g = Grid::filled(2, 1, CellKind::Rigid).unwrap();
        assert_eq!(g.dof(), 1);
        g.set_cell_kind(p(0, 0), CellKind::Shear).unwrap();
        assert_eq!(g.dof(), 2);
    }
}
