#![allow(dead_code)]
use metamech::geometry::vector::{Vec2, distance};
use metamech::mechanism::Mechanism;
use metamech::optimize::fitting::{FitRequest, Frame, PathFitter};
use metamech::prelude::*;

pub fn gp(x: i32, y: i32) -> GridPoint {
    GridPoint::new(x, y)
}

/// `w x h` grid of `kind` with anchors at `anchors`.
pub fn anchored(w: i32, h: i32, kind: CellKind, anchors: &[(i32, i32)]) -> Grid {
    let mut g = Grid::filled(w, h, kind).unwrap();
    for &(x, y) in anchors {
        assert!(g.set_anchor(gp(x, y), true), "no vertex at ({x}, {y})");
    }
    g
}

/// Current position of the vertex at `p`.
pub fn pos(g: &Grid, p: GridPoint) -> Vec2 {
    g[g.vertex_at(p).unwrap()].position()
}

/// Assert every cell edge kept its undeformed length.
pub fn assert_edge_lengths_kept(g: &Grid, tol: f64) {
    for (_, e) in g.edges() {
        let [a, b] = e.ends();
        let rest = distance(g[a].initial(), g[b].initial());
        let now = distance(g[a].position(), g[b].position());
        assert!(
            (rest - now).abs() < tol,
            "edge {:?}-{:?} changed length: {rest} -> {now}",
            g[a].point(),
            g[b].point()
        );
    }
}

/// Straight path from `from` to `to` with `n` samples.
pub fn line(from: Vec2, to: Vec2, n: usize) -> Vec<Vec2> {
    (0..n)
        .map(|i| {
            let t = i as f64 / (n - 1).max(1) as f64;
            [from[0] + (to[0] - from[0]) * t, from[1] + (to[1] - from[1]) * t]
        })
        .collect()
}

/// Fitter that lands the driven and secondary vertices exactly on their
/// paths and leaves everything else at rest.
pub struct EchoFitter;

impl PathFitter for EchoFitter {
    fn fit(&mut self, req: &FitRequest) -> Result<Vec<Frame>, MechError> {
        let (out, out_path) = req
            .secondary
            .as_ref()
            .ok_or_else(|| MechError::Fitter("echo fitter needs the output path".into()))?;
        Ok(req
            .path
            .iter()
            .zip(out_path)
            .map(|(&w, &o)| {
                let mut f = req.positions.clone();
                f[req.driven] = w;
                f[*out] = o;
                f
            })
            .collect())
    }
}

/// Mechanism over a `w x h` grid anchored at the origin, driving the
/// bottom-right vertex up and asking the top-right vertex to move left.
pub fn lever(w: i32, h: i32, kind: CellKind, samples: usize) -> Mechanism {
    let mut m = Mechanism::new(anchored(w, h, kind, &[(0, 0)]));
    let (wf, hf) = (w as f64, h as f64);
    m.set_input(gp(w, 0), line([wf, 0.0], [wf, 0.5], samples)).unwrap();
    m.set_output(gp(w, h), line([wf, hf], [wf - 0.5, hf], samples))
        .unwrap();
    m
}
