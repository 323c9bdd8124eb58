//! Deformation propagation from one driven vertex.
//!
//! **Forward mode** seeds the driven vertex's first cell with the requested
//! offset, then runs a breadth-first wavefront: each scheduled cell takes the
//! corners already placed by earlier cells (plus its anchors) as fixed and
//! solves for the rest. Rigid cells are scheduled ahead of shear cells that
//! become reachable at the same time.
//!
//! **Inverse mode** handles a driven vertex whose cell is unanchored while the
//! grid is anchored elsewhere. It drives the nearest anchor's cell instead,
//! searching for the drive that brings the requested vertex to the right
//! distance from the anchor, then turns it to the right angle.
//!
//! Any failure restores the positions the grid had on entry.

use crate::geometry::vector::{
    Vec2, add, clamp_length, distance, norm, rotate, scale, signed_angle, sub, with_length,
};
use crate::kinematics::{KinematicsConfig, QuadState};
use crate::mech_error::MechError;
use crate::topology::grid::Grid;
use crate::topology::point::{CellId, GridPoint, VertexId};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

/// Tuning for [`deform`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Bound on the inverse-mode length search.
    pub max_search_iterations: usize,
    /// Inverse-mode search stops once the distance error is below this.
    pub length_tolerance: f64,
    pub kinematics: KinematicsConfig,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_search_iterations: 10,
            length_tolerance: 0.001,
            kinematics: KinematicsConfig::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PropagationMode {
    Forward,
    Inverse,
}

/// Outcome of a successful propagation.
#[derive(Clone, Debug, PartialEq)]
pub struct PropagationReport {
    pub mode: PropagationMode,
    /// Cells solved by the final forward pass.
    pub cells: usize,
    /// Distance between the driven vertex and the (range-clamped) target.
    pub residual: f64,
}

/// Move the vertex at `vertex` by `offset` and propagate the motion.
///
/// On error the grid's positions are restored. Collisions and unreachable
/// vertices are recoverable ([`MechError::is_recoverable`]); geometry-domain
/// errors are not.
pub fn deform(
    grid: &mut Grid,
    vertex: GridPoint,
    offset: Vec2,
    cfg: &PropagationConfig,
) -> Result<PropagationReport, MechError> {
    let moved = grid.vertex_at(vertex).ok_or(MechError::UnknownVertex(vertex))?;
    let start = *grid[moved]
        .owners()
        .first()
        .ok_or(MechError::Unreachable(vertex))?;

    let cell_anchored = grid.anchored_slots(start).iter().any(|a| *a);
    let mode = if cell_anchored || !grid.has_anchors() {
        PropagationMode::Forward
    } else {
        PropagationMode::Inverse
    };

    let snapshot = grid.positions();
    let target = add(grid[moved].position(), offset);
    let result = match mode {
        PropagationMode::Forward => forward(grid, start, moved, offset, cfg).map(|cells| {
            PropagationReport {
                mode,
                cells,
                residual: distance(grid[moved].position(), target),
            }
        }),
        PropagationMode::Inverse => inverse(grid, moved, offset, cfg),
    };
    match result {
        Ok(report) => {
            log::debug!(
                "{:?} propagation from {vertex} moved {} cells, residual {:.4}",
                report.mode,
                report.cells,
                report.residual
            );
            Ok(report)
        }
        Err(e) => {
            grid.restore_positions(&snapshot);
            if e.is_recoverable() {
                log::warn!("propagation from {vertex} rejected: {e}");
            }
            Err(e)
        }
    }
}

/// Seed `start` with the drive of `moved` and sweep the wavefront.
/// Returns the number of cells solved. Does not roll back on error.
pub(crate) fn forward(
    grid: &mut Grid,
    start: CellId,
    moved: VertexId,
    offset: Vec2,
    cfg: &PropagationConfig,
) -> Result<usize, MechError> {
    let slot = grid[start]
        .slot_of(moved)
        .ok_or(MechError::Unreachable(grid[moved].point()))?;
    let mut quad = QuadState::from_grid(grid, start);
    let fixed = quad.seed(slot, offset, &cfg.kinematics)?;
    quad.deform(&fixed, &cfg.kinematics)?;
    quad.write_back(grid, start);

    let mut placed: HashMap<VertexId, usize> = HashMap::new();
    let mut done: HashSet<CellId> = HashSet::new();
    let mut queued: HashSet<CellId> = HashSet::new();
    let mut queue: VecDeque<CellId> = VecDeque::new();
    let mut count = 0;

    let mut finish = |grid: &Grid,
                      cell: CellId,
                      placed: &mut HashMap<VertexId, usize>,
                      queue: &mut VecDeque<CellId>| {
        done.insert(cell);
        count += 1;
        for v in grid[cell].vertices() {
            let next = placed.len();
            placed.entry(v).or_insert(next);
        }
        let mut fresh: Vec<CellId> = grid
            .cells_sharing_vertex(cell)
            .into_iter()
            .filter(|n| !done.contains(n) && !queued.contains(n))
            .collect();
        fresh.sort_by_key(|&n| grid[n].kind().schedule_rank());
        for n in fresh {
            queued.insert(n);
            queue.push_back(n);
        }
    };

    finish(&*grid, start, &mut placed, &mut queue);
    while let Some(cell) = queue.pop_front() {
        let mut quad = QuadState::from_grid(grid, cell);
        let vs = grid[cell].vertices();
        let mut known: Vec<(usize, usize)> = (0..4)
            .filter_map(|s| placed.get(&vs[s]).map(|&order| (order, s)))
            .collect();
        known.sort_unstable();
        let mut fixed: Vec<usize> = known.into_iter().map(|(_, s)| s).collect();
        let anchored: Vec<usize> = (0..4)
            .filter(|&s| quad.anchors[s] && !fixed.contains(&s))
            .collect();
        fixed.extend(anchored);

        quad.deform(&fixed, &cfg.kinematics)?;
        quad.write_back(grid, cell);
        finish(&*grid, cell, &mut placed, &mut queue);
    }
    Ok(count)
}

#[derive(Copy, Clone, PartialEq)]
struct Frontier {
    dist: f64,
    vertex: VertexId,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Length of the shortest chain of cell-sharing vertices from `from` to `to`,
/// measured on undeformed positions.
pub fn chain_length(grid: &Grid, from: VertexId, to: VertexId) -> Option<f64> {
    let mut best: HashMap<VertexId, f64> = HashMap::new();
    let mut heap = BinaryHeap::new();
    best.insert(from, 0.0);
    heap.push(Frontier {
        dist: 0.0,
        vertex: from,
    });
    while let Some(Frontier { dist, vertex }) = heap.pop() {
        if vertex == to {
            return Some(dist);
        }
        if best.get(&vertex).is_some_and(|&b| dist > b) {
            continue;
        }
        let here = grid[vertex].initial();
        for &cell in grid[vertex].owners() {
            for n in grid[cell].vertices() {
                let d = dist + distance(here, grid[n].initial());
                if best.get(&n).is_none_or(|&b| d < b) {
                    best.insert(n, d);
                    heap.push(Frontier { dist: d, vertex: n });
                }
            }
        }
    }
    None
}

fn nearest<'a>(grid: &Grid, to: VertexId, among: impl IntoIterator<Item = &'a VertexId>) -> Option<VertexId> {
    let p = grid[to].initial();
    among
        .into_iter()
        .copied()
        .min_by(|&a, &b| {
            distance(grid[a].initial(), p).total_cmp(&distance(grid[b].initial(), p))
        })
}

fn inverse(
    grid: &mut Grid,
    moved: VertexId,
    offset: Vec2,
    cfg: &PropagationConfig,
) -> Result<PropagationReport, MechError> {
    let moved_point = grid[moved].point();
    let anchors: Vec<VertexId> = grid
        .vertices()
        .filter(|(_, v)| v.is_anchor())
        .map(|(id, _)| id)
        .collect();
    let anchor = nearest(grid, moved, &anchors).ok_or(MechError::Unreachable(moved_point))?;
    let range = chain_length(grid, anchor, moved).ok_or(MechError::Unreachable(moved_point))?;

    let near: Vec<VertexId> = grid[anchor]
        .owners()
        .iter()
        .flat_map(|&c| grid[c].vertices())
        .filter(|&v| v != anchor)
        .collect();
    let lever = nearest(grid, moved, &near).ok_or(MechError::Unreachable(moved_point))?;
    let anchored_cell = *grid[anchor]
        .owners()
        .iter()
        .find(|&&c| grid[c].slot_of(lever).is_some())
        .ok_or(MechError::Unreachable(moved_point))?;
    let max_diag = QuadState::from_grid(grid, anchored_cell).max_diagonal();

    let pivot = grid[anchor].position();
    let target = add(grid[moved].position(), offset);
    let corrected = clamp_length(sub(target, pivot), range);
    let want = norm(corrected);

    let lever_local = |g: &Grid| sub(g[lever].position(), pivot);
    let moved_local = |g: &Grid| sub(g[moved].position(), pivot);

    let start_lever = lever_local(grid);
    let (mut lower, mut upper) = if norm(moved_local(grid)) < want {
        (start_lever, with_length(start_lever, max_diag))
    } else {
        ([0.0, 0.0], start_lever)
    };
    let mut error = want - norm(moved_local(grid));
    let mut cells = 0;
    for _ in 0..cfg.max_search_iterations {
        if error.abs() <= cfg.length_tolerance {
            break;
        }
        let mid = add(lower, scale(sub(upper, lower), 0.5));
        let trial = grid.positions();
        let drive = sub(mid, lever_local(grid));
        match forward(grid, anchored_cell, lever, drive, cfg) {
            Ok(n) => cells = n,
            Err(e) if e.is_recoverable() => {
                grid.restore_positions(&trial);
                break;
            }
            Err(e) => return Err(e),
        }
        let reached = norm(moved_local(grid));
        if reached > want {
            upper = mid;
        } else {
            lower = mid;
        }
        let next_error = want - reached;
        if next_error.abs() > error.abs() {
            grid.restore_positions(&trial);
            break;
        }
        error = next_error;
    }

    let turn = signed_angle(moved_local(grid), corrected);
    let lever_now = lever_local(grid);
    let drive = sub(rotate(lever_now, turn), lever_now);
    cells = forward(grid, anchored_cell, lever, drive, cfg)?.max(cells);

    Ok(PropagationReport {
        mode: PropagationMode::Inverse,
        cells,
        residual: distance(grid[moved].position(), add(pivot, corrected)),
    })
}
