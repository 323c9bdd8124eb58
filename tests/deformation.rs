mod util;

use metamech::algs::propagate::{PropagationMode, chain_length};
use metamech::geometry::vector::{distance, norm, sub};
use metamech::kinematics::{KinematicsConfig, QuadState};
use metamech::prelude::*;
use proptest::prelude::*;
use util::{assert_edge_lengths_kept, gp, pos};

const TOL: f64 = 1e-9;

/// Law of cosines: angle at `a` in the triangle with sides `ab`, `ac`, `bc`.
fn angle_from_sides(ab: f64, ac: f64, bc: f64) -> f64 {
    ((ab * ab + ac * ac - bc * bc) / (2.0 * ab * ac)).clamp(-1.0, 1.0).acos()
}

fn angle_between(a: [f64; 2], b: [f64; 2]) -> f64 {
    let cos = (a[0] * b[0] + a[1] * b[1]) / (norm(a) * norm(b));
    cos.clamp(-1.0, 1.0).acos()
}

fn check_shear_drive(offset: [f64; 2]) {
    let mut g = util::anchored(1, 1, CellKind::Shear, &[(0, 0)]);
    deform(&mut g, gp(1, 1), offset, &PropagationConfig::default()).unwrap();
    let v = [gp(0, 0), gp(1, 0), gp(1, 1), gp(0, 1)].map(|p| pos(&g, p));
    assert_eq!(v[0], [0.0, 0.0]);

    // Every side keeps unit length.
    for i in 0..4 {
        let l = distance(v[i], v[(i + 1) % 4]);
        assert!((l - 1.0).abs() < 1e-9, "side {i} has length {l}");
    }
    // Back-substitute: the legs open from the diagonal by the law-of-cosines angle.
    let diag = sub(v[2], v[0]);
    let d = norm(diag);
    let expected = angle_from_sides(1.0, d, 1.0);
    for leg in [v[1], v[3]] {
        let got = angle_between(leg, diag);
        assert!((got - expected).abs() < 1e-6, "leg angle {got} != {expected}");
    }
    // Legs lie on opposite sides of the diagonal.
    let side = |p: [f64; 2]| diag[0] * p[1] - diag[1] * p[0];
    assert!(side(v[1]) * side(v[3]) <= 1e-12);
}

#[test]
fn shear_cell_diagonal_drive_is_exact() {
    check_shear_drive([0.5, 0.5]);
    check_shear_drive([0.25, 0.25]);
    check_shear_drive([0.3, -0.2]);
}

#[test]
fn saturated_shear_drive_flattens_onto_the_diagonal() {
    let mut g = util::anchored(1, 1, CellKind::Shear, &[(0, 0)]);
    deform(&mut g, gp(1, 1), [0.5, 0.5], &PropagationConfig::default()).unwrap();
    let v2 = pos(&g, gp(1, 1));
    assert!((norm(v2) - 2.0).abs() < 1e-9);
}

#[test]
fn rigid_cell_rotates_about_single_anchor() {
    let mut g = util::anchored(1, 1, CellKind::Rigid, &[(0, 0)]);
    let report = deform(&mut g, gp(1, 0), [-1.0, 1.0], &PropagationConfig::default()).unwrap();
    assert_eq!(report.mode, PropagationMode::Forward);
    assert!(distance(pos(&g, gp(1, 1)), [-1.0, 1.0]) < TOL);
    assert_edge_lengths_kept(&g, TOL);
}

#[test]
fn rigid_block_moves_as_one_body() {
    let mut g = util::anchored(3, 2, CellKind::Rigid, &[(0, 0)]);
    deform(&mut g, gp(1, 0), [-1.0, 1.0], &PropagationConfig::default()).unwrap();
    // Quarter turn: (x, y) -> (-y, x).
    for (_, v) in g.vertices() {
        let p = v.point();
        let want = [-(p.y as f64), p.x as f64];
        assert!(distance(v.position(), want) < 1e-9, "{p:?} at {:?}", v.position());
    }
}

#[test]
fn unknown_and_isolated_vertices() {
    let mut g = Grid::filled(1, 1, CellKind::Rigid).unwrap();
    let err = deform(&mut g, gp(9, 9), [0.1, 0.0], &PropagationConfig::default()).unwrap_err();
    assert_eq!(err, MechError::UnknownVertex(gp(9, 9)));
}

#[test]
fn chain_length_between_corners() {
    let g = Grid::filled(2, 1, CellKind::Rigid).unwrap();
    let a = g.vertex_at(gp(0, 0)).unwrap();
    let b = g.vertex_at(gp(2, 1)).unwrap();
    // One diagonal and one side: no cell spans both columns.
    let len = chain_length(&g, a, b).unwrap();
    assert!((len - (1.0 + 2f64.sqrt())).abs() < 1e-9);
}

fn arb_kind() -> impl Strategy<Value = CellKind> {
    prop_oneof![Just(CellKind::Rigid), Just(CellKind::Shear)]
}

proptest! {
    #[test]
    fn local_solve_keeps_edge_lengths(
        kind in arb_kind(),
        anchor in prop::option::of(0usize..4),
        moved in 0usize..4,
        dx in -0.9f64..0.9,
        dy in -0.9f64..0.9,
    ) {
        prop_assume!(anchor != Some(moved));
        let cfg = KinematicsConfig::default();
        let mut q = QuadState::unit(kind);
        if let Some(a) = anchor {
            q.anchors[a] = true;
        }
        let fixed = q.seed(moved, [dx, dy], &cfg).unwrap();
        q.deform(&fixed, &cfg).unwrap();
        for l in q.edge_lengths() {
            prop_assert!((l - 1.0).abs() < 1e-7, "edge length {}", l);
        }
        if let Some(a) = anchor {
            prop_assert_eq!(q.current[a], q.initial[a]);
        }
    }

    #[test]
    fn anchored_shear_row_keeps_edge_lengths(
        w in 1i32..5,
        x in 0i32..5,
        dx in -0.8f64..0.8,
        dy in -0.8f64..0.8,
    ) {
        let x = x.min(w);
        let anchors: Vec<(i32, i32)> = (0..=w).map(|i| (i, 0)).collect();
        let mut g = util::anchored(w, 1, CellKind::Shear, &anchors);
        let before = g.positions();
        match deform(&mut g, gp(x, 1), [dx, dy], &PropagationConfig::default()) {
            Ok(_) => {}
            Err(e) => {
                prop_assert!(e.is_recoverable(), "fatal error {}", e);
                prop_assert_eq!(g.positions(), before);
            }
        }
        assert_edge_lengths_kept(&g, 1e-7);
        for i in 0..=w {
            prop_assert_eq!(pos(&g, gp(i, 0)), [i as f64, 0.0]);
        }
    }
}
