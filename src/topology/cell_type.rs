//! Cell kinds and their per-kind dispatch table.
//!
//! Each cell is either rigid (fixed shape) or shear (parallelogram with a free
//! interior angle). The operations below are the non-geometric half of the
//! per-kind table; the kinematic half lives in [`crate::kinematics`].

use crate::topology::point::EdgeId;
use serde::{Deserialize, Serialize};

/// Unit cell kind.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellKind {
    /// All four edges move as one rigid body.
    Rigid,
    /// Opposite edges stay parallel and equal; the interior angle is free.
    #[default]
    Shear,
}

/// Rendering hints for a hosting editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StyleHint {
    pub fill_rgb: [u8; 3],
    /// Draw the cross brace that marks a rigid cell.
    pub braced: bool,
}

impl CellKind {
    /// One-letter tag used in the text model format.
    pub const fn tag(self) -> char {
        match self {
            CellKind::Rigid => 'r',
            CellKind::Shear => 's',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'r' | 'R' => Some(CellKind::Rigid),
            's' | 'S' => Some(CellKind::Shear),
            _ => None,
        }
    }

    /// Hyperedges for a cell whose boundary edges are
    /// `[bottom, right, top, left]` (CCW from the index vertex).
    pub fn constraint_sets(self, edges: [EdgeId; 4]) -> Vec<Vec<EdgeId>> {
        match self {
            CellKind::Rigid => vec![edges.to_vec()],
            CellKind::Shear => vec![vec![edges[1], edges[3]], vec![edges[0], edges[2]]],
        }
    }

    /// Number of hyperedges this kind contributes.
    pub const fn hyperedge_count(self) -> usize {
        match self {
            CellKind::Rigid => 1,
            CellKind::Shear => 2,
        }
    }

    /// Longest diagonal reachable for edge lengths `a` and `b`.
    pub fn max_diagonal(self, a: f64, b: f64) -> f64 {
        match self {
            CellKind::Rigid => a.hypot(b),
            CellKind::Shear => a + b,
        }
    }

    /// Whether a cell of this kind can move given its anchored corner slots.
    ///
    /// Rigid: fewer than two anchors. Shear: fewer than two anchors, or two
    /// anchors sharing an edge (two diagonal anchors lock the parallelogram).
    pub fn can_move(self, anchors: [bool; 4]) -> bool {
        let count = anchors.iter().filter(|a| **a).count();
        match self {
            CellKind::Rigid => count < 2,
            CellKind::Shear => {
                count < 2 || (count == 2 && anchors[0] != anchors[2] && anchors[1] != anchors[3])
            }
        }
    }

    pub const fn style(self) -> StyleHint {
        match self {
            CellKind::Rigid => StyleHint {
                fill_rgb: [0x5a, 0x5a, 0x5a],
                braced: true,
            },
            CellKind::Shear => StyleHint {
                fill_rgb: [0xf2, 0xf2, 0xf2],
                braced: false,
            },
        }
    }

    /// Propagation order: rigid cells are scheduled before shear cells.
    pub(crate) const fn schedule_rank(self) -> u8 {
        match self {
            CellKind::Rigid => 0,
            CellKind::Shear => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges() -> [EdgeId; 4] {
        [0, 1, 2, 3].map(EdgeId::from_slot)
    }

    #[test]
    fn rigid_has_one_four_edge_set() {
        let sets = CellKind::Rigid.constraint_sets(edges());
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].len(), 4);
    }

    #[test]
    fn shear_pairs_opposite_edges() {
        let e = edges();
        let sets = CellKind::Shear.constraint_sets(e);
        assert_eq!(sets, vec![vec![e[1], e[3]], vec![e[0], e[2]]]);
    }

    #[test]
    fn new_cells_default_to_shear() {
        assert_eq!(CellKind::default(), CellKind::Shear);
    }

    #[test]
    fn can_move_rules() {
        assert!(CellKind::Rigid.can_move([true, false, false, false]));
        assert!(!CellKind::Rigid.can_move([true, true, false, false]));
        assert!(CellKind::Shear.can_move([true, true, false, false]));
        assert!(CellKind::Shear.can_move([false, false, true, true]));
        assert!(CellKind::Shear.can_move([true, false, false, true]));
        assert!(!CellKind::Shear.can_move([true, false, true, false]));
        assert!(!CellKind::Shear.can_move([true, true, true, false]));
    }

    #[test]
    fn max_diagonal_by_kind() {
        assert!((CellKind::Rigid.max_diagonal(3.0, 4.0) - 5.0).abs() < 1e-12);
        assert!((CellKind::Shear.max_diagonal(3.0, 4.0) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn only_rigid_cells_are_braced() {
        assert!(CellKind::Rigid.style().braced);
        assert!(!CellKind::Shear.style().braced);
        assert_ne!(CellKind::Rigid.style().fill_rgb, CellKind::Shear.style().fill_rgb);
    }

    #[test]
    fn tags_round_trip() {
        for k in [CellKind::Rigid, CellKind::Shear] {
            assert_eq!(CellKind::from_tag(k.tag()), Some(k));
        }
        assert_eq!(CellKind::from_tag('x'), None);
    }
}
