//! Per-cell kinematic solvers.
//!
//! A [`QuadState`] is a local copy of one cell's four corners: undeformed and
//! current positions plus anchor flags. The solvers place the free corners
//! from whichever corners are already known:
//!
//! | known corners            | rigid                    | shear                        |
//! |--------------------------|--------------------------|------------------------------|
//! | 1                        | translate                | translate                    |
//! | 2 sharing an edge        | rotate                   | rotate                       |
//! | 2 diagonal               | rotate                   | legs from the diagonal       |
//! | 3                        | parallelogram completion | parallelogram completion     |
//!
//! Edge lengths are taken from the undeformed corners, so every solve keeps
//! them unchanged; only angles vary.

use crate::geometry::vector::{
    EPS, Vec2, add, angle, clamp_length, norm, polar, rotate, signed_angle, sub, with_length,
};
use crate::mech_error::MechError;
use crate::topology::cell_type::CellKind;
use crate::topology::grid::Grid;
use crate::topology::point::{CellId, GridPoint};
use serde::{Deserialize, Serialize};

/// Tolerances for the local solvers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KinematicsConfig {
    /// A two-anchor shear cell refuses moves whose angle deviates from the
    /// undeformed angle by more than `90 - collision_tolerance_deg` degrees.
    pub collision_tolerance_deg: f64,
    /// Rounding slack accepted on a law-of-cosines argument before it is
    /// reported as a domain violation.
    pub cosine_slack: f64,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            collision_tolerance_deg: 5.0,
            cosine_slack: 1e-9,
        }
    }
}

#[inline]
fn next(i: usize) -> usize {
    (i + 1) % 4
}
#[inline]
fn prev(i: usize) -> usize {
    (i + 3) % 4
}
#[inline]
fn opposite(i: usize) -> usize {
    (i + 2) % 4
}
#[inline]
pub(crate) fn adjacent(i: usize, j: usize) -> bool {
    next(i) == j || prev(i) == j
}

/// Local geometric state of one cell.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadState {
    pub kind: CellKind,
    pub index: GridPoint,
    pub initial: [Vec2; 4],
    pub current: [Vec2; 4],
    pub anchors: [bool; 4],
    locked: [bool; 4],
}

impl QuadState {
    /// Unit-size state with index vertex at the origin; handy for tests.
    pub fn unit(kind: CellKind) -> Self {
        let initial = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        Self {
            kind,
            index: GridPoint::default(),
            initial,
            current: initial,
            anchors: [false; 4],
            locked: [false; 4],
        }
    }

    pub fn from_grid(grid: &Grid, cell: CellId) -> Self {
        let c = &grid[cell];
        let vs = c.vertices();
        Self {
            kind: c.kind(),
            index: c.index(),
            initial: vs.map(|v| grid[v].initial()),
            current: vs.map(|v| grid[v].position()),
            anchors: vs.map(|v| grid[v].is_anchor()),
            locked: [false; 4],
        }
    }

    /// Copy the current corners back to the grid. Anchors stay put.
    pub fn write_back(&self, grid: &mut Grid, cell: CellId) {
        let vs = grid[cell].vertices();
        for (slot, v) in vs.into_iter().enumerate() {
            grid.set_position(v, self.current[slot]);
        }
    }

    /// Length of the edges leaving corner 0 counter-clockwise (bottom/top).
    pub fn edge_len_ccw(&self) -> f64 {
        norm(sub(self.initial[1], self.initial[0]))
    }

    /// Length of the edges leaving corner 0 clockwise (left/right).
    pub fn edge_len_cw(&self) -> f64 {
        norm(sub(self.initial[3], self.initial[0]))
    }

    /// Undeformed length of the edge between adjacent slots `i` and `j`.
    pub fn edge_length(&self, i: usize, j: usize) -> f64 {
        if i.min(j) % 2 == 0 && (i.max(j) - i.min(j)) == 1 {
            self.edge_len_ccw()
        } else {
            self.edge_len_cw()
        }
    }

    pub fn max_diagonal(&self) -> f64 {
        self.kind.max_diagonal(self.edge_len_ccw(), self.edge_len_cw())
    }

    pub fn can_move(&self) -> bool {
        self.kind.can_move(self.anchors)
    }

    /// Current lengths of edges `[0-1, 1-2, 2-3, 3-0]`.
    pub fn edge_lengths(&self) -> [f64; 4] {
        [0, 1, 2, 3].map(|i| norm(sub(self.current[next(i)], self.current[i])))
    }

    fn anchor_slots(&self) -> Vec<usize> {
        (0..4).filter(|&i| self.anchors[i]).collect()
    }

    fn set(&mut self, slot: usize, p: Vec2) {
        if !self.anchors[slot] && !self.locked[slot] {
            self.current[slot] = p;
        }
    }

    /// Place the cell's first corners for a drive of `moved` by `offset`
    /// (relative to its current position). Returns the slots now fixed, in
    /// the order [`QuadState::deform`] expects; empty when the cell cannot
    /// follow the drive.
    pub fn seed(
        &mut self,
        moved: usize,
        offset: Vec2,
        cfg: &KinematicsConfig,
    ) -> Result<Vec<usize>, MechError> {
        self.locked = [false; 4];
        if self.anchors[moved] || !self.can_move() {
            return Ok(Vec::new());
        }
        let target = add(self.current[moved], offset);
        let anchors = self.anchor_slots();
        match anchors.as_slice() {
            [] => {
                self.set(moved, target);
                Ok(vec![moved])
            }
            &[a] => {
                let reach = if adjacent(a, moved) {
                    self.edge_length(a, moved)
                } else {
                    match self.kind {
                        CellKind::Rigid => self.edge_len_ccw().hypot(self.edge_len_cw()),
                        CellKind::Shear => self.max_diagonal(),
                    }
                };
                let local = sub(target, self.current[a]);
                let local = match (self.kind, adjacent(a, moved)) {
                    (CellKind::Shear, false) => clamp_length(local, reach),
                    _ => with_length(local, reach),
                };
                // A diagonal folded onto the anchor flattens the parallelogram.
                if self.kind == CellKind::Shear && !adjacent(a, moved) && norm(local) < EPS {
                    return Err(MechError::Collision(self.index));
                }
                self.set(moved, add(self.current[a], local));
                Ok(vec![a, moved])
            }
            &[a, b] if self.kind == CellKind::Shear => {
                let (diag_anchor, adj_anchor) = if opposite(moved) == a { (a, b) } else { (b, a) };
                let len = self.edge_length(adj_anchor, moved);
                let moved_edge = with_length(sub(target, self.current[adj_anchor]), len);
                let anchored_edge = sub(self.current[adj_anchor], self.current[diag_anchor]);
                let undeformed = sub(self.initial[moved], self.current[adj_anchor]);
                let deviation = (signed_angle(anchored_edge, moved_edge)
                    - signed_angle(anchored_edge, undeformed))
                .to_degrees();
                let band = 90.0 - cfg.collision_tolerance_deg;
                if deviation < -band || deviation > band {
                    return Err(MechError::Collision(self.index));
                }
                self.set(moved, add(self.current[adj_anchor], moved_edge));
                Ok(vec![a, b, moved])
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Place every corner not in `fixed` from the ones that are.
    pub fn deform(&mut self, fixed: &[usize], cfg: &KinematicsConfig) -> Result<(), MechError> {
        if !self.can_move() {
            return Ok(());
        }
        let mut known: Vec<usize> = Vec::with_capacity(4);
        for &f in fixed {
            if f < 4 && !known.contains(&f) {
                known.push(f);
            }
        }
        self.locked = [false; 4];
        for &k in &known {
            self.locked[k] = true;
        }
        let result = match known.as_slice() {
            [] => Ok(()),
            &[f] => {
                self.translate(f);
                Ok(())
            }
            &[f0, f1] if adjacent(f0, f1) || self.kind == CellKind::Rigid => self.rotate(f0, f1, cfg),
            &[f0, f1] => {
                let diag = sub(self.current[f1], self.current[f0]);
                self.place_from_diagonal(f0, diag, cfg)
            }
            &[_, _, _] => {
                let missing = (0..4).find(|i| !known.contains(i)).unwrap_or(0);
                self.complete_parallelogram(missing);
                Ok(())
            }
            _ => Ok(()),
        };
        self.locked = [false; 4];
        result
    }

    fn translate(&mut self, fixed: usize) {
        let offset = sub(self.current[fixed], self.initial[fixed]);
        for i in 0..4 {
            self.set(i, add(self.initial[i], offset));
        }
    }

    /// Rigid rotation about `f0` taken from how the `f0 -> f1` direction turned.
    fn rotate(&mut self, f0: usize, f1: usize, cfg: &KinematicsConfig) -> Result<(), MechError> {
        let theta = signed_angle(
            sub(self.initial[f1], self.initial[f0]),
            sub(self.current[f1], self.current[f0]),
        );
        let undeformed = sub(self.initial[opposite(f0)], self.initial[f0]);
        let rigid_len = self.edge_len_ccw().hypot(self.edge_len_cw());
        let diag = with_length(rotate(undeformed, theta), rigid_len);
        self.place_from_diagonal(f0, diag, cfg)
    }

    /// Place corners `k+1`, `k+2`, `k+3` from corner `k` and the diagonal
    /// `k -> k+2`, solving each leg with the law of cosines.
    fn place_from_diagonal(&mut self, k: usize, diag: Vec2, cfg: &KinematicsConfig) -> Result<(), MechError> {
        let (ccw, cw) = (self.edge_len_ccw(), self.edge_len_cw());
        let (len_ccw, len_cw) = if k % 2 == 1 { (cw, ccw) } else { (ccw, cw) };
        let leg_ccw = self.leg(diag, len_ccw, len_cw, -1.0, cfg)?;
        let leg_cw = self.leg(diag, len_cw, len_ccw, 1.0, cfg)?;
        let base = self.current[k];
        self.set(next(k), add(base, leg_ccw));
        self.set(opposite(k), add(base, diag));
        self.set(prev(k), add(base, leg_cw));
        Ok(())
    }

    /// Leg of length `adjacent` from the diagonal's start, in the triangle with
    /// sides `|diag|`, `adjacent` and `opposite`, turned to `side` of the diagonal.
    fn leg(
        &self,
        diag: Vec2,
        adjacent: f64,
        opposite: f64,
        side: f64,
        cfg: &KinematicsConfig,
    ) -> Result<Vec2, MechError> {
        let d = norm(diag);
        let cos = (adjacent * adjacent + d * d - opposite * opposite) / (2.0 * adjacent * d);
        if d < EPS || !cos.is_finite() || cos.abs() > 1.0 + cfg.cosine_slack {
            return Err(MechError::GeometryDomain {
                cell: self.index,
                argument: cos,
            });
        }
        let theta = cos.clamp(-1.0, 1.0).acos();
        Ok(polar(adjacent, angle(diag) + side * theta))
    }

    fn complete_parallelogram(&mut self, missing: usize) {
        let f = opposite(missing);
        let base = self.current[f];
        let p = add(
            base,
            add(
                sub(self.current[next(f)], base),
                sub(self.current[prev(f)], base),
            ),
        );
        self.set(missing, p);
    }
}
