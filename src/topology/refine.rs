//! Uniform refinement: every cell becomes `factor x factor` cells of its kind.

use crate::mech_error::MechError;
use crate::topology::grid::{Grid, Layout};
use crate::topology::point::GridPoint;

/// Coarse cell index mapped to the fine cell indices that replace it.
pub type RefinementMap = Vec<(GridPoint, Vec<GridPoint>)>;

/// Refine `layout` by `factor`. Anchors move to `factor *` their position.
pub fn refine_layout(layout: &Layout, factor: i32) -> Result<(Layout, RefinementMap), MechError> {
    if factor < 1 {
        return Err(MechError::Precondition("refinement factor must be at least 1"));
    }
    let mut cells = Vec::with_capacity(layout.cells.len() * (factor * factor) as usize);
    let mut map = Vec::with_capacity(layout.cells.len());
    for &(index, size, kind) in &layout.cells {
        let base = index.scaled(factor);
        let fine: Vec<GridPoint> = (0..factor)
            .flat_map(|j| (0..factor).map(move |i| base.offset(i * size[0], j * size[1])))
            .collect();
        cells.extend(fine.iter().map(|&p| (p, size, kind)));
        map.push((index, fine));
    }
    let anchors = layout.anchors.iter().map(|a| a.scaled(factor)).collect();
    Ok((Layout { cells, anchors }, map))
}

impl Grid {
    /// Rebuild the grid at `factor` times its resolution.
    pub fn scale(&mut self, factor: i32) -> Result<RefinementMap, MechError> {
        let (layout, map) = refine_layout(&self.layout(), factor)?;
        *self = Grid::from_layout(&layout)?;
        Ok(map)
    }
}
