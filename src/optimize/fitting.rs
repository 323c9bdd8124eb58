//! The path-fitting seam.
//!
//! The optimizer never solves the mechanism itself. It hands a
//! [`FitRequest`] (the undeformed geometry, cell corners, anchors and target
//! paths) to a [`PathFitter`] and gets back one [`Frame`] of vertex positions
//! per input waypoint. Any solver can sit behind the trait; the crate ships
//! [`PropagationFitter`], which drives the grid with
//! [`deform`](crate::algs::propagate::deform).

use crate::algs::propagate::{self, PropagationConfig};
use crate::geometry::vector::{Vec2, sub};
use crate::mech_error::MechError;
use crate::topology::cell_type::CellKind;
use crate::topology::grid::Grid;
use crate::topology::point::GridPoint;

/// Positions of every vertex, in request order, at one waypoint.
pub type Frame = Vec<Vec2>;

/// One cell of a request: corner indices (CCW from the index vertex) and kind.
#[derive(Clone, Debug, PartialEq)]
pub struct FitCell {
    pub corners: [usize; 4],
    pub kind: CellKind,
}

/// Everything a fitter needs to simulate one topology.
#[derive(Clone, Debug, PartialEq)]
pub struct FitRequest {
    /// Undeformed positions, densely numbered.
    pub positions: Vec<Vec2>,
    pub cells: Vec<FitCell>,
    pub anchors: Vec<usize>,
    /// Index of the driven vertex.
    pub driven: usize,
    /// Waypoints of the driven vertex.
    pub path: Vec<Vec2>,
    /// Optional second constrained vertex and its path.
    pub secondary: Option<(usize, Vec<Vec2>)>,
}

impl FitRequest {
    /// Build a request from `grid` using its dense vertex numbering.
    ///
    /// The grid's current positions are ignored; the request always starts
    /// from the undeformed state.
    pub fn from_grid(
        grid: &Grid,
        driven: GridPoint,
        path: Vec<Vec2>,
        secondary: Option<(GridPoint, Vec<Vec2>)>,
    ) -> Result<Self, MechError> {
        let numbering = grid.vertex_numbering();
        let index_of = |p: GridPoint| -> Result<usize, MechError> {
            grid.vertex_at(p)
                .and_then(|v| numbering.get(&v).copied())
                .ok_or(MechError::UnknownVertex(p))
        };

        let positions = grid.vertices().map(|(_, v)| v.initial()).collect();
        let cells = grid
            .cells()
            .map(|(_, c)| FitCell {
                corners: c.vertices().map(|v| numbering[&v]),
                kind: c.kind(),
            })
            .collect();
        let anchors = grid
            .vertices()
            .filter(|(_, v)| v.is_anchor())
            .map(|(id, _)| numbering[&id])
            .collect();
        let secondary = match secondary {
            Some((p, pts)) => Some((index_of(p)?, pts)),
            None => None,
        };
        Ok(Self {
            positions,
            cells,
            anchors,
            driven: index_of(driven)?,
            path,
            secondary,
        })
    }

    fn point(&self, i: usize) -> Result<GridPoint, MechError> {
        let p = self
            .positions
            .get(i)
            .ok_or_else(|| MechError::Fitter(format!("vertex index {i} out of range")))?;
        Ok(GridPoint::new(p[0].round() as i32, p[1].round() as i32))
    }
}

/// A solver that realizes a target path on a topology.
pub trait PathFitter {
    /// One frame per waypoint of `request.path`, or an error.
    fn fit(&mut self, request: &FitRequest) -> Result<Vec<Frame>, MechError>;
}

impl<F: PathFitter + ?Sized> PathFitter for Box<F> {
    fn fit(&mut self, request: &FitRequest) -> Result<Vec<Frame>, MechError> {
        (**self).fit(request)
    }
}

/// Fits paths by driving the grid through each waypoint with the propagator.
///
/// Waypoints the propagator rejects (collision, unreachable) repeat the
/// previous frame. The secondary path is not enforced.
#[derive(Clone, Debug, Default)]
pub struct PropagationFitter {
    pub config: PropagationConfig,
}

impl PropagationFitter {
    pub fn new(config: PropagationConfig) -> Self {
        Self { config }
    }

    fn rebuild(request: &FitRequest) -> Result<(Grid, Vec<GridPoint>), MechError> {
        let points = (0..request.positions.len())
            .map(|i| request.point(i))
            .collect::<Result<Vec<_>, _>>()?;
        let mut grid = Grid::new();
        for cell in &request.cells {
            grid.add_cell_from_vertices(cell.kind, cell.corners.map(|i| points[i]))?;
        }
        for &a in &request.anchors {
            grid.set_anchor(request.point(a)?, true);
        }
        Ok((grid, points))
    }
}

impl PathFitter for PropagationFitter {
    fn fit(&mut self, request: &FitRequest) -> Result<Vec<Frame>, MechError> {
        let (mut grid, points) = Self::rebuild(request)?;
        let driven = request.point(request.driven)?;
        let ids = points
            .iter()
            .map(|&p| grid.vertex_at(p).ok_or(MechError::UnknownVertex(p)))
            .collect::<Result<Vec<_>, _>>()?;
        let driven_id = grid
            .vertex_at(driven)
            .ok_or(MechError::UnknownVertex(driven))?;

        let mut frames = Vec::with_capacity(request.path.len());
        let mut held = 0usize;
        for &waypoint in &request.path {
            let offset = sub(waypoint, grid[driven_id].position());
            match propagate::deform(&mut grid, driven, offset, &self.config) {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => held += 1,
                Err(e) => return Err(e),
            }
            frames.push(ids.iter().map(|&v| grid[v].position()).collect());
        }
        if held > 0 && held == request.path.len() {
            return Err(MechError::Degenerate(format!(
                "input vertex {driven} could not follow any of {held} waypoints"
            )));
        }
        if held > 0 {
            log::debug!("fitter held the pose at {held} of {} waypoints", request.path.len());
        }
        Ok(frames)
    }
}
