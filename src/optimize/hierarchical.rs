//! Multi-resolution optimization.
//!
//! The mechanism is optimized at a coarse resolution first, then refined by a
//! factor of two per level and optimized again, each level seeded with the
//! previous level's result. Within a level the target paths are optimized at
//! an increasing number of samples. Anchors are re-derived at each level from
//! the full-resolution anchors, relative to the anchor nearest the origin.

use super::fitting::PathFitter;
use super::{OptimizationReport, Optimizer, OptimizerConfig};
use crate::geometry::polyline::resample;
use crate::mech_error::MechError;
use crate::mechanism::{Mechanism, PathScaling, TrackedPath};
use crate::topology::point::GridPoint;
use serde::{Deserialize, Serialize};

/// Direction of the resolution sweep.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleOrder {
    #[default]
    CoarseToFine,
    FineToCoarse,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalConfig {
    /// Number of halvings between the finest and coarsest level.
    pub num_scales: u32,
    pub order: ScaleOrder,
    pub min_path_samples: usize,
    pub max_path_samples: usize,
    /// Sample counts per level, spread evenly from min to max.
    pub path_resolutions: usize,
    /// A restart counts as progress only if it lowers the error by this much.
    pub min_improvement: f64,
    pub max_restarts: usize,
    pub optimizer: OptimizerConfig,
}

impl Default for HierarchicalConfig {
    fn default() -> Self {
        Self {
            num_scales: 2,
            order: ScaleOrder::CoarseToFine,
            min_path_samples: 10,
            max_path_samples: 40,
            path_resolutions: 3,
            min_improvement: 0.01,
            max_restarts: 10,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl HierarchicalConfig {
    fn sample_counts(&self) -> Vec<usize> {
        let n = self.path_resolutions.max(1);
        if n == 1 {
            return vec![self.max_path_samples];
        }
        let span = self.max_path_samples.saturating_sub(self.min_path_samples);
        (0..n)
            .map(|i| self.min_path_samples + span * i / (n - 1))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Halvings relative to the full resolution.
    pub halvings: u32,
    pub samples: usize,
    pub runs: usize,
    pub improved: bool,
    pub report: OptimizationReport,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalReport {
    pub stages: Vec<StageReport>,
    /// Report of the run whose topology was kept last.
    pub best: Option<OptimizationReport>,
}

/// Re-anchor `mech` for a grid `halvings` times coarser than the one
/// `anchors` were set on.
///
/// Offsets from `origin` (the anchor with the smallest `x + y`) are scaled
/// and rounded away from it: up when positive, down when negative.
fn reanchor(mech: &mut Mechanism, anchors: &[GridPoint], origin: GridPoint, halvings: u32) {
    let f = 0.5f64.powi(halvings as i32);
    let round = |d: i32| {
        let s = d as f64 * f;
        if s >= 0.0 { s.ceil() as i32 } else { s.floor() as i32 }
    };
    let base = origin.coarsened(1 << halvings);
    mech.grid.clear_anchors();
    let mut placed = 0;
    for a in anchors {
        let p = base.offset(round(a.x - origin.x), round(a.y - origin.y));
        if mech.grid.set_anchor(p, true) {
            placed += 1;
        }
    }
    log::debug!("re-anchored {placed}/{} anchors at 1/{}", anchors.len(), 1 << halvings);
}

/// Target for a level `halvings` times coarser than full resolution: the
/// tracked vertex is floor-divided and the path offsets shrink with it.
fn level_target(full: &TrackedPath, halvings: u32, samples: Option<usize>) -> TrackedPath {
    let mut path = full.clone();
    path.retarget(full.vertex.coarsened(1 << halvings), 0.5f64.powi(halvings as i32));
    if let Some(n) = samples {
        path.points = resample(&path.points, n);
    }
    path
}

/// Run the optimizer over several resolutions.
///
/// Returns the optimized mechanism (at full resolution for
/// [`ScaleOrder::CoarseToFine`], at the coarsest for
/// [`ScaleOrder::FineToCoarse`]) with its original target paths.
pub fn optimize_hierarchical<F: PathFitter + ?Sized>(
    mut mech: Mechanism,
    cfg: &HierarchicalConfig,
    fitter: &mut F,
) -> Result<(Mechanism, HierarchicalReport), MechError> {
    let anchors = mech.grid.anchors();
    let origin = anchors
        .iter()
        .copied()
        .min_by_key(|a| (a.taxicab(), a.x))
        .ok_or(MechError::Precondition("mechanism has no anchors"))?;
    let full_in = mech
        .input()
        .cloned()
        .ok_or(MechError::Precondition("no input vertex"))?;
    let full_out = mech
        .output()
        .cloned()
        .ok_or(MechError::Precondition("no output vertex"))?;

    let levels: Vec<u32> = match cfg.order {
        ScaleOrder::CoarseToFine => (0..=cfg.num_scales).rev().collect(),
        ScaleOrder::FineToCoarse => (0..=cfg.num_scales).collect(),
    };
    if cfg.order == ScaleOrder::CoarseToFine {
        for _ in 0..cfg.num_scales {
            mech.decrease_scale(2, PathScaling::ScalePath)?;
        }
    }

    let mut report = HierarchicalReport::default();
    let mut prior: Option<OptimizationReport> = None;
    let mut stage = 0u64;
    for (li, &halvings) in levels.iter().enumerate() {
        reanchor(&mut mech, &anchors, origin, halvings);
        for samples in cfg.sample_counts() {
            mech.set_targets(
                Some(level_target(&full_in, halvings, Some(samples))),
                Some(level_target(&full_out, halvings, Some(samples))),
            );

            let mut runs = 0;
            let mut improved = false;
            let mut last = None;
            while runs < cfg.max_restarts.max(1) {
                let opt_cfg = OptimizerConfig {
                    rng_seed: cfg.optimizer.rng_seed.wrapping_add(stage * 1000 + runs as u64),
                    ..cfg.optimizer.clone()
                };
                let mut opt = Optimizer::new(mech.clone(), opt_cfg)?;
                if let Some(p) = &prior {
                    opt = opt.seeded_from(p);
                }
                let run = opt.run(fitter)?;
                runs += 1;
                let gain = prior
                    .as_ref()
                    .map_or(f64::INFINITY, |p| p.min_error - run.min_error);
                last = Some(run.clone());
                if run.min_error.is_finite() && gain > cfg.min_improvement {
                    mech = opt.into_mechanism();
                    prior = Some(run);
                    improved = true;
                    break;
                }
                log::debug!("stage {stage} run {runs}: no improvement (gain {gain:.4}), restarting");
            }
            log::info!(
                "level 1/{} with {samples} samples: {runs} runs, improved {improved}",
                1 << halvings
            );
            if let Some(last) = last {
                report.stages.push(StageReport {
                    halvings,
                    samples,
                    runs,
                    improved,
                    report: last,
                });
            }
            stage += 1;
        }

        if li + 1 < levels.len() {
            match cfg.order {
                ScaleOrder::CoarseToFine => mech.scale(2, PathScaling::ScalePath)?,
                ScaleOrder::FineToCoarse => mech.decrease_scale(2, PathScaling::ScalePath)?,
            }
        }
    }

    let halvings = levels.last().copied().unwrap_or(0);
    mech.set_targets(
        Some(level_target(&full_in, halvings, None)),
        Some(level_target(&full_out, halvings, None)),
    );
    mech.reset_deformation();
    report.best = prior;
    Ok((mech, report))
}
