//! Coarsening: merge each `factor x factor` block of cells into one cell.
//!
//! The new kind is a plurality vote over rigid, shear and empty counts in the
//! block. Rigid or empty win only with a strict majority over both other
//! counts; everything else (including ties) becomes shear.

use crate::mech_error::MechError;
use crate::topology::cell_type::CellKind;
use crate::topology::grid::{Grid, Layout};
use crate::topology::point::GridPoint;
use std::collections::BTreeMap;

/// Coarse cell index mapped to the fine cells it replaces.
pub type CoarseningMap = Vec<(GridPoint, Vec<GridPoint>)>;

#[derive(Default)]
struct Block {
    rigid: usize,
    shear: usize,
    size: [i32; 2],
    fine: Vec<GridPoint>,
}

fn vote(block: &Block, capacity: usize) -> Option<CellKind> {
    let empty = capacity.saturating_sub(block.rigid + block.shear);
    if block.rigid > block.shear && block.rigid > empty {
        Some(CellKind::Rigid)
    } else if empty > block.rigid && empty > block.shear {
        None
    } else {
        Some(CellKind::Shear)
    }
}

/// Coarsen `layout` by `factor`. Anchors move to the floor of
/// `position / factor`; duplicates collapse.
pub fn coarsen_layout(layout: &Layout, factor: i32) -> Result<(Layout, CoarseningMap), MechError> {
    if factor < 1 {
        return Err(MechError::Precondition("coarsening factor must be at least 1"));
    }
    let mut blocks: BTreeMap<GridPoint, Block> = BTreeMap::new();
    for &(index, size, kind) in &layout.cells {
        let block = blocks.entry(index.coarsened(factor)).or_default();
        match kind {
            CellKind::Rigid => block.rigid += 1,
            CellKind::Shear => block.shear += 1,
        }
        block.size = size;
        block.fine.push(index);
    }

    let capacity = (factor * factor) as usize;
    let mut cells = Vec::with_capacity(blocks.len());
    let mut map = Vec::with_capacity(blocks.len());
    for (coarse, block) in blocks {
        if let Some(kind) = vote(&block, capacity) {
            cells.push((coarse, block.size, kind));
            map.push((coarse, block.fine));
        }
    }
    let mut anchors: Vec<GridPoint> = layout
        .anchors
        .iter()
        .map(|a| a.coarsened(factor))
        .collect();
    anchors.sort();
    anchors.dedup();
    Ok((Layout { cells, anchors }, map))
}

impl Grid {
    /// Rebuild the grid at `1 / factor` of its resolution.
    pub fn decrease_scale(&mut self, factor: i32) -> Result<CoarseningMap, MechError> {
        let (layout, map) = coarsen_layout(&self.layout(), factor)?;
        *self = Grid::from_layout(&layout)?;
        Ok(map)
    }
}
