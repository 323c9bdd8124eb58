//! A grid plus the motion it is meant to produce.
//!
//! The input target is the path the driven vertex follows; the output target
//! is the path a second vertex should trace as a result. Both are kept in
//! absolute coordinates and follow their vertex when the grid is rescaled or
//! translated.

use crate::algs::propagate::{self, PropagationConfig};
use crate::geometry::polyline::path_length;
use crate::geometry::vector::{Vec2, add, scale, sub};
use crate::mech_error::MechError;
use crate::topology::grid::Grid;
use crate::topology::point::GridPoint;
use serde::{Deserialize, Serialize};

/// A vertex and the path it should trace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedPath {
    pub vertex: GridPoint,
    pub points: Vec<Vec2>,
}

impl TrackedPath {
    pub fn new(vertex: GridPoint, points: Vec<Vec2>) -> Self {
        Self { vertex, points }
    }

    pub fn length(&self) -> f64 {
        path_length(&self.points)
    }

    /// Move the vertex to `vertex`, keeping each point's offset from it
    /// multiplied by `stretch`.
    pub fn retarget(&mut self, vertex: GridPoint, stretch: f64) {
        let old = self.vertex.to_vec();
        let new = vertex.to_vec();
        for p in &mut self.points {
            *p = add(new, scale(sub(*p, old), stretch));
        }
        self.vertex = vertex;
    }
}

/// How target paths react to a resolution change.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathScaling {
    /// Offsets from the tracked vertex scale with the grid.
    #[default]
    ScalePath,
    /// Paths move with their vertex; offsets keep their size.
    MovePaths,
}

/// Positions of the tracked vertices while driving the input path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Simulation {
    pub input: Vec<Vec2>,
    pub output: Vec<Vec2>,
    /// Waypoints the propagator could not reach (the pose was held).
    pub blocked: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Mechanism {
    pub grid: Grid,
    input: Option<TrackedPath>,
    output: Option<TrackedPath>,
}

impl Mechanism {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            input: None,
            output: None,
        }
    }

    pub fn input(&self) -> Option<&TrackedPath> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&TrackedPath> {
        self.output.as_ref()
    }

    /// Set the driven vertex and its path. The vertex must exist.
    pub fn set_input(&mut self, vertex: GridPoint, points: Vec<Vec2>) -> Result<(), MechError> {
        self.grid
            .vertex_at(vertex)
            .ok_or(MechError::UnknownVertex(vertex))?;
        self.input = Some(TrackedPath::new(vertex, points));
        Ok(())
    }

    /// Set the observed vertex and its path. The vertex must exist.
    pub fn set_output(&mut self, vertex: GridPoint, points: Vec<Vec2>) -> Result<(), MechError> {
        self.grid
            .vertex_at(vertex)
            .ok_or(MechError::UnknownVertex(vertex))?;
        self.output = Some(TrackedPath::new(vertex, points));
        Ok(())
    }

    /// Replace target paths without the existence check (used on rescaling and
    /// by the model reader).
    pub(crate) fn set_targets(&mut self, input: Option<TrackedPath>, output: Option<TrackedPath>) {
        self.input = input;
        self.output = output;
    }

    pub fn clear_targets(&mut self) {
        self.input = None;
        self.output = None;
    }

    pub fn reset_deformation(&mut self) {
        self.grid.reset_deformation();
    }

    /// Reset the deformation and drop the target paths.
    pub fn reset(&mut self) {
        self.reset_deformation();
        self.clear_targets();
    }

    /// Remove all cells and targets.
    pub fn clear(&mut self) {
        self.grid.clear();
        self.clear_targets();
    }

    fn rescale_targets(&mut self, mapping: impl Fn(GridPoint) -> GridPoint, stretch: f64) {
        for path in [self.input.as_mut(), self.output.as_mut()].into_iter().flatten() {
            let vertex = mapping(path.vertex);
            path.retarget(vertex, stretch);
        }
    }

    /// Refine the grid by `factor` (see [`Grid::scale`]).
    pub fn scale(&mut self, factor: i32, paths: PathScaling) -> Result<(), MechError> {
        self.grid.scale(factor)?;
        let stretch = match paths {
            PathScaling::ScalePath => factor as f64,
            PathScaling::MovePaths => 1.0,
        };
        self.rescale_targets(|p| p.scaled(factor), stretch);
        Ok(())
    }

    /// Coarsen the grid by `factor` (see [`Grid::decrease_scale`]).
    pub fn decrease_scale(&mut self, factor: i32, paths: PathScaling) -> Result<(), MechError> {
        self.grid.decrease_scale(factor)?;
        let stretch = match paths {
            PathScaling::ScalePath => 1.0 / factor as f64,
            PathScaling::MovePaths => 1.0,
        };
        self.rescale_targets(|p| p.coarsened(factor), stretch);
        Ok(())
    }

    /// Translate everything so the smallest cell index sits at the origin.
    pub fn move_to_coordinate_origin(&mut self) -> Result<(), MechError> {
        let Some((lo, _)) = self.grid.bounds() else {
            return Ok(());
        };
        if lo == GridPoint::default() {
            return Ok(());
        }
        let layout = self.grid.layout().translated(-lo.x, -lo.y);
        self.grid = Grid::from_layout(&layout)?;
        self.rescale_targets(|p| p.offset(-lo.x, -lo.y), 1.0);
        Ok(())
    }

    fn check_simulation_inputs(&self) -> Result<&TrackedPath, MechError> {
        if !self.grid.has_anchors() {
            return Err(MechError::Precondition("mechanism has no anchors"));
        }
        let input = self
            .input
            .as_ref()
            .ok_or(MechError::Precondition("no input vertex"))?;
        if input.points.is_empty() {
            return Err(MechError::Precondition("input path is empty"));
        }
        self.grid
            .vertex_at(input.vertex)
            .ok_or(MechError::UnknownVertex(input.vertex))?;
        Ok(input)
    }

    /// Drive the input vertex through its path with the propagator.
    ///
    /// Waypoints that cannot be reached (collision, unreachable) keep the
    /// previous pose. The grid is left in the final pose.
    pub fn simulate(&mut self, cfg: &PropagationConfig) -> Result<Simulation, MechError> {
        let input = self.check_simulation_inputs()?.clone();
        let observed = self.output.as_ref().map(|o| o.vertex);
        self.grid.reset_deformation();
        let driven = self
            .grid
            .vertex_at(input.vertex)
            .ok_or(MechError::UnknownVertex(input.vertex))?;
        let watch = observed.and_then(|p| self.grid.vertex_at(p));

        let mut sim = Simulation::default();
        for &waypoint in &input.points {
            let offset = sub(waypoint, self.grid[driven].position());
            match propagate::deform(&mut self.grid, input.vertex, offset, cfg) {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => sim.blocked += 1,
                Err(e) => return Err(e),
            }
            sim.input.push(self.grid[driven].position());
            if let Some(w) = watch {
                sim.output.push(self.grid[w].position());
            }
        }
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::cell_type::CellKind;

    fn p(x: i32, y: i32) -> GridPoint {
        GridPoint::new(x, y)
    }

    #[test]
    fn targets_require_existing_vertices() {
        let mut m = Mechanism::new(Grid::filled(2, 2, CellKind::Shear).unwrap());
        assert!(m.set_input(p(2, 2), vec![[2.0, 2.0]]).is_ok());
        assert_eq!(
            m.set_output(p(5, 5), vec![]),
            Err(MechError::UnknownVertex(p(5, 5)))
        );
    }

    #[test]
    fn scaling_moves_and_stretches_paths() {
        let mut m = Mechanism::new(Grid::filled(2, 2, CellKind::Shear).unwrap());
        m.set_input(p(1, 1), vec![[1.0, 1.0], [1.5, 1.0]]).unwrap();
        m.scale(2, PathScaling::ScalePath).unwrap();
        let input = m.input().unwrap();
        assert_eq!(input.vertex, p(2, 2));
        assert_eq!(input.points, vec![[2.0, 2.0], [3.0, 2.0]]);

        m.decrease_scale(2, PathScaling::MovePaths).unwrap();
        let input = m.input().unwrap();
        assert_eq!(input.vertex, p(1, 1));
        assert_eq!(input.points, vec![[1.0, 1.0], [2.0, 1.0]]);
    }

    #[test]
    fn move_to_origin_shifts_grid_and_paths() {
        let mut g = Grid::new();
        g.add_cell(CellKind::Rigid, p(3, 4), [1, 1]).unwrap();
        g.set_anchor(p(3, 4), true);
        let mut m = Mechanism::new(g);
        m.set_input(p(4, 5), vec![[4.0, 5.0], [4.0, 6.0]]).unwrap();
        m.move_to_coordinate_origin().unwrap();
        assert_eq!(m.grid.bounds(), Some((p(0, 0), p(0, 0))));
        assert_eq!(m.grid.anchors(), vec![p(0, 0)]);
        assert_eq!(m.input().unwrap().points, vec![[1.0, 1.0], [1.0, 2.0]]);
    }

    #[test]
    fn simulate_refuses_without_anchors() {
        let mut m = Mechanism::new(Grid::filled(1, 1, CellKind::Rigid).unwrap());
        m.set_input(p(1, 1), vec![[1.0, 1.0]]).unwrap();
        let err = m.simulate(&PropagationConfig::default()).unwrap_err();
        assert_eq!(err, MechError::Precondition("mechanism has no anchors"));
        m.grid.set_anchor(p(0, 0), true);
        m.set_input(p(1, 1), vec![]).unwrap();
        let err = m.simulate(&PropagationConfig::default()).unwrap_err();
        assert_eq!(err, MechError::Precondition("input path is empty"));
    }

    #[test]
    fn simulate_rotates_anchored_cell() {
        let mut m = Mechanism::new(Grid::filled(1, 1, CellKind::Rigid).unwrap());
        m.grid.set_anchor(p(0, 0), true);
        let s = 0.5f64.sqrt();
        m.set_input(p(1, 0), vec![[1.0, 0.0], [s, s], [0.0, 1.0]]).unwrap();
        m.set_output(p(1, 1), vec![]).unwrap();
        let sim = m.simulate(&PropagationConfig::default()).unwrap();
        assert_eq!(sim.blocked, 0);
        let last = sim.output.last().copied().unwrap();
        assert!((last[0] + 1.0).abs() < 1e-9 && (last[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn folding_a_shear_cell_flat_is_skipped() {
        let mut m = Mechanism::new(Grid::filled(1, 1, CellKind::Shear).unwrap());
        m.grid.set_anchor(p(0, 0), true);
        let path = vec![[1.0, 1.0], [0.5, 0.5], [0.0, 0.0], [1.0, 1.0]];
        m.set_input(p(1, 1), path).unwrap();
        let sim = m.simulate(&PropagationConfig::default()).unwrap();
        assert_eq!(sim.blocked, 1);
        assert_eq!(sim.input.len(), 4);
        // The pose from the previous waypoint is held.
        assert_eq!(sim.input[2], sim.input[1]);
        assert!(sim.input.iter().flatten().all(|c| c.is_finite()));
    }

    #[test]
    fn reset_clears_targets_and_pose() {
        let mut m = Mechanism::new(Grid::filled(1, 1, CellKind::Rigid).unwrap());
        m.grid.set_anchor(p(0, 0), true);
        m.set_input(p(1, 0), vec![[0.0, 1.0]]).unwrap();
        m.simulate(&PropagationConfig::default()).unwrap();
        m.reset();
        assert!(m.input().is_none());
        let v = m.grid.vertex_at(p(1, 0)).unwrap();
        assert_eq!(m.grid[v].position(), [1.0, 0.0]);
    }
}
