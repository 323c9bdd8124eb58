mod util;

use metamech::optimize::{EditKind, ScaleOrder, Verdict};
use metamech::prelude::*;
use util::*;

fn echo_config(iterations: usize) -> OptimizerConfig {
    OptimizerConfig {
        max_iterations: iterations,
        constrain_output: true,
        ..Default::default()
    }
}

#[test]
fn exact_fit_is_never_beaten() {
    let m = lever(1, 1, CellKind::Rigid, 5);
    let start = m.grid.encoding();
    let mut opt = Optimizer::new(m, echo_config(6)).unwrap();
    let report = opt.run(&mut EchoFitter).unwrap();

    assert_eq!(report.start_error, Some(0.0));
    assert_eq!(report.min_error, 0.0);
    assert_eq!(report.iterations, 6);
    assert_eq!(report.history.len(), 6);
    assert_eq!(report.accepted, 1);
    assert_eq!(report.rejected, 5);
    assert_eq!(report.degenerate, 0);
    assert_eq!(report.history[0].edit, EditKind::Initial);
    assert_eq!(report.history[0].verdict, Verdict::Accepted);
    // One degree of freedom is below the target band: only splits are tried.
    assert!(report.history[1..].iter().all(|r| r.edit == EditKind::Split));
    assert_eq!(opt.mechanism().grid.encoding(), start);
    assert_eq!(report.final_dof, 1);
}

#[test]
fn propagation_fitter_tracks_a_rotation() {
    let mut m = Mechanism::new(anchored(1, 1, CellKind::Rigid, &[(0, 0)]));
    let angles: Vec<f64> = (0..6).map(|i| 0.06 * i as f64).collect();
    let arc = |r: [f64; 2]| -> Vec<Vec2> {
        angles
            .iter()
            .map(|&t| {
                let (s, c) = t.sin_cos();
                [r[0] * c - r[1] * s, r[0] * s + r[1] * c]
            })
            .collect()
    };
    m.set_input(gp(1, 0), arc([1.0, 0.0])).unwrap();
    m.set_output(gp(1, 1), arc([1.0, 1.0])).unwrap();

    let cfg = OptimizerConfig {
        max_iterations: 4,
        ..Default::default()
    };
    let mut opt = Optimizer::new(m, cfg).unwrap();
    let report = opt.run(&mut PropagationFitter::default()).unwrap();
    let start = report.start_error.unwrap();
    assert!(start < 1e-6, "rigid rotation should be exact, got {start}");
    assert!(report.min_error <= start);
    assert_eq!(report.iterations, 4);
    assert_eq!(opt.state(), OptimizerState::Done);
}

#[test]
fn boxed_fitter_is_a_fitter() {
    let m = lever(2, 1, CellKind::Shear, 4);
    let mut fitter: Box<dyn PathFitter> = Box::new(EchoFitter);
    let report = Optimizer::new(m, echo_config(3))
        .unwrap()
        .run(&mut fitter)
        .unwrap();
    assert_eq!(report.iterations, 3);
}

#[test]
fn hierarchical_returns_full_resolution() {
    let m = lever(2, 2, CellKind::Rigid, 9);
    let full_input = m.input().cloned().unwrap();
    let cfg = HierarchicalConfig {
        num_scales: 1,
        order: ScaleOrder::CoarseToFine,
        min_path_samples: 4,
        max_path_samples: 6,
        path_resolutions: 2,
        max_restarts: 2,
        optimizer: echo_config(3),
        ..Default::default()
    };
    let (out, report) = optimize_hierarchical(m, &cfg, &mut EchoFitter).unwrap();

    assert_eq!(report.stages.len(), 4);
    let first = &report.stages[0];
    assert_eq!((first.halvings, first.samples, first.runs), (1, 4, 1));
    assert!(first.improved);
    // Nothing beats an exact fit, so later stages use up their restarts.
    assert!(report.stages[1..].iter().all(|s| !s.improved && s.runs == 2));
    assert_eq!(report.stages[3].halvings, 0);
    assert_eq!(report.best.as_ref().map(|b| b.min_error), Some(0.0));

    assert_eq!(out.grid.cell_count(), 4);
    assert_eq!(out.grid.anchors(), vec![gp(0, 0)]);
    assert_eq!(out.input(), Some(&full_input));
}
