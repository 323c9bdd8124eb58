mod util;

use metamech::prelude::*;
use proptest::prelude::*;
use util::gp;

#[test]
fn dof_of_uniform_blocks() {
    // Shear blocks: one joint per row plus one per column.
    for (w, h) in [(1, 1), (2, 1), (3, 2), (4, 4)] {
        let g = Grid::filled(w, h, CellKind::Shear).unwrap();
        assert_eq!(g.dof(), (w + h) as usize, "{w}x{h} shear");
        let r = Grid::filled(w, h, CellKind::Rigid).unwrap();
        assert_eq!(r.dof(), 1, "{w}x{h} rigid");
    }
}

#[test]
fn single_rigid_cell_scenarios() {
    let mut g = util::anchored(1, 1, CellKind::Rigid, &[(0, 0)]);
    let cell = g.cell_at(gp(0, 0)).unwrap();
    assert!(g.can_move(cell));
    assert_eq!(g.dof(), 1);
    g.set_anchor(gp(1, 0), true);
    assert!(!g.can_move(cell));
}

#[test]
fn merge_then_split_restores_dof() {
    for axis in [SplitAxis::Horizontal, SplitAxis::Vertical] {
        for y in 0..3 {
            for x in 0..3 {
                let mut g = Grid::filled(3, 3, CellKind::Shear).unwrap();
                let before = g.dof();
                g.set_cell_kind(gp(x, y), CellKind::Rigid).unwrap();
                assert_eq!(g.dof(), before - 1);
                let cell = g.cell_at(gp(x, y)).unwrap();
                let comp = g.constraint_graph().components_of_cell(cell)[0];
                split_component_at(&mut g, comp, cell, axis).unwrap();
                assert_eq!(g.dof(), before, "cell ({x}, {y}) along {axis:?}");
            }
        }
    }
}

#[test]
fn components_partition_hyperedges() {
    let mut g = Grid::filled(4, 3, CellKind::Shear).unwrap();
    g.set_cell_kind(gp(1, 1), CellKind::Rigid).unwrap();
    g.set_cell_kind(gp(3, 0), CellKind::Rigid).unwrap();
    let graph = g.constraint_graph();
    let total: usize = graph
        .components()
        .map(|c| graph.component(c).unwrap().count())
        .sum();
    assert_eq!(total, graph.hyperedge_count());
    for (id, cell) in g.cells() {
        let comps = graph.components_of_cell(id);
        assert_eq!(comps.len(), cell.constraints().len());
        for c in comps {
            assert!(graph.member_cells(c).unwrap().contains(&id));
            assert!(graph.cells_of(c).unwrap().contains(&id));
        }
    }
}

fn layout() -> impl Strategy<Value = Vec<Option<bool>>> {
    prop::collection::vec(prop::option::weighted(0.8, any::<bool>()), 16)
}

fn build(cells: &[Option<bool>]) -> Grid {
    let mut g = Grid::new();
    for (i, c) in cells.iter().enumerate() {
        if let Some(rigid) = c {
            let kind = if *rigid { CellKind::Rigid } else { CellKind::Shear };
            g.add_cell(kind, gp(i as i32 % 4, i as i32 / 4), [1, 1]).unwrap();
        }
    }
    g
}

proptest! {
    #[test]
    fn dof_is_bounded_by_hyperedges(cells in layout()) {
        let g = build(&cells);
        let graph = g.constraint_graph();
        prop_assert!(graph.dof() <= graph.hyperedge_count());
        prop_assert_eq!(graph.dof() == 0, g.is_empty());
        let expected: usize = g.cells().map(|(_, c)| c.kind().hyperedge_count()).sum();
        prop_assert_eq!(graph.hyperedge_count(), expected);
    }

    #[test]
    fn promotion_never_changes_dof(cells in layout()) {
        let mut g = build(&cells);
        let dof = g.dof();
        let encoding = g.effective_encoding();
        promote_non_shearing_cells(&mut g).unwrap();
        prop_assert_eq!(g.dof(), dof);
        prop_assert_eq!(g.encoding(), encoding);
    }

    #[test]
    fn rebuilt_graph_matches_cached(cells in layout()) {
        let mut g = build(&cells);
        let cached = g.dof();
        prop_assert_eq!(g.build_constraint_graph().dof(), cached);
    }
}
