//! Topology optimization toward a target input/output motion.
//!
//! The [`Optimizer`] is a small state machine. Each iteration edits the
//! topology (merge two components, or split one), asks a [`PathFitter`] to
//! realize the input path on the edited grid, scores how far the realized
//! paths are from the targets, and keeps or reverts the edit. Simulated
//! annealing lets a worse edit through with a probability that falls as the
//! temperature cools.
//!
//! ```text
//! Idle -> AwaitingEvaluation -> AcceptReject -> Stepping -> AwaitingEvaluation -> ...
//!                                           \-> Done (iteration budget spent)
//! ```
//!
//! Callers can drive [`Optimizer::advance`] one transition at a time and stop
//! with [`Optimizer::cancel`] between calls; [`Optimizer::run`] loops to
//! completion.

pub mod fitting;
pub mod hierarchical;

use crate::algs::constraint_graph::ComponentId;
use crate::algs::non_shearing::{SplitAxis, split_component_at};
use crate::geometry::polyline::{path_length, pointwise_distance};
use crate::geometry::vector::Vec2;
use crate::mech_error::MechError;
use crate::mechanism::Mechanism;
use crate::topology::cell_type::CellKind;
use crate::topology::grid::Layout;
use fitting::{FitRequest, Frame, PathFitter};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub use fitting::{FitCell, PropagationFitter};
pub use hierarchical::{
    HierarchicalConfig, HierarchicalReport, ScaleOrder, StageReport, optimize_hierarchical,
};

/// Tuning for [`Optimizer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Evaluations per run (degenerate ones included).
    pub max_iterations: usize,
    /// At or below this many degrees of freedom, the next edit is a split.
    pub min_target_dof: usize,
    /// At or above this many degrees of freedom, the next edit is a merge.
    pub max_target_dof: usize,
    /// Smallest error decrease counted as an improvement.
    pub min_error_delta: f64,
    /// Realized paths shorter than this are degenerate.
    pub min_realized_length: f64,
    /// Normalized errors above this are degenerate.
    pub degenerate_error: f64,
    pub enable_annealing: bool,
    pub cooling_factor: f64,
    /// Initial temperature; `None` uses `max_iterations / 3`.
    pub start_temperature: Option<f64>,
    pub input_weight: f64,
    pub output_weight: f64,
    pub rng_seed: u64,
    /// Bound on the inner merge/split search.
    pub max_edit_attempts: usize,
    /// Also pass the output path to the fitter as a second constraint.
    pub constrain_output: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            min_target_dof: 4,
            max_target_dof: 6,
            min_error_delta: 0.001,
            min_realized_length: 0.001,
            degenerate_error: 30.0,
            enable_annealing: true,
            cooling_factor: 0.92,
            start_temperature: None,
            input_weight: 0.2,
            output_weight: 0.8,
            rng_seed: 0x5eed,
            max_edit_attempts: 64,
            constrain_output: false,
        }
    }
}

impl OptimizerConfig {
    fn temperature(&self, iteration: usize) -> f64 {
        let t0 = self
            .start_temperature
            .unwrap_or(self.max_iterations as f64 / 3.0);
        t0 * self.cooling_factor.powi(iteration as i32)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerState {
    Idle,
    Stepping,
    AwaitingEvaluation,
    AcceptReject,
    Done,
}

/// What happened to one evaluated topology.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    /// Worse, but let through by annealing.
    Annealed,
    Rejected,
    Degenerate,
}

/// The kind of edit that produced an evaluated topology.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditKind {
    Initial,
    Merge,
    Split,
}

/// Scores of one evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub input_error: f64,
    pub output_error: f64,
    /// Weighted sum of the normalized errors.
    pub error: f64,
    pub input_length: f64,
    pub output_length: f64,
    pub dof: usize,
}

impl Evaluation {
    /// Placeholder for a topology the fitter could not drive at all.
    fn failed(dof: usize) -> Self {
        Evaluation {
            input_error: f64::INFINITY,
            output_error: f64::INFINITY,
            error: f64::INFINITY,
            input_length: 0.0,
            output_length: 0.0,
            dof,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub iteration: usize,
    pub edit: EditKind,
    /// Whether the edit changed the degrees of freedom as intended.
    pub edit_applied: bool,
    pub evaluation: Evaluation,
    pub verdict: Verdict,
    pub temperature: f64,
    pub encoding: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Error of the first non-degenerate evaluation (or the seed's).
    pub start_error: Option<f64>,
    /// Best error reached; the returned topology has this error.
    pub min_error: f64,
    /// Error of the topology left in the grid at the end.
    pub final_error: f64,
    pub final_dof: usize,
    pub iterations: usize,
    pub accepted: usize,
    pub annealed: usize,
    pub rejected: usize,
    pub degenerate: usize,
    pub history: Vec<StepRecord>,
}

#[derive(Clone, Debug)]
struct Best {
    layout: Layout,
    error: f64,
}

/// Simulated-annealing topology search over one [`Mechanism`].
#[derive(Debug)]
pub struct Optimizer {
    config: OptimizerConfig,
    state: OptimizerState,
    mechanism: Mechanism,
    rng: SmallRng,
    report: OptimizationReport,
    /// Error of the topology currently in the grid.
    current_error: f64,
    best: Option<Best>,
    start: Layout,
    /// Minimum error carried in from a prior run.
    baseline: f64,
    /// Topology before the pending edit.
    before_edit: Layout,
    dof_before: usize,
    edit: EditKind,
    edit_applied: bool,
    pending: Option<Evaluation>,
}

impl Optimizer {
    /// Check the preconditions (anchors, input and output targets) and set up
    /// a run.
    pub fn new(mechanism: Mechanism, config: OptimizerConfig) -> Result<Self, MechError> {
        if !mechanism.grid.has_anchors() {
            return Err(MechError::Precondition("mechanism has no anchors"));
        }
        let input = mechanism
            .input()
            .ok_or(MechError::Precondition("no input vertex"))?;
        let output = mechanism
            .output()
            .ok_or(MechError::Precondition("no output vertex"))?;
        if input.points.is_empty() {
            return Err(MechError::Precondition("input path is empty"));
        }
        if output.points.len() != input.points.len() {
            return Err(MechError::PathLengthMismatch {
                expected: input.points.len(),
                found: output.points.len(),
            });
        }
        if input.length() <= 0.0 || output.length() <= 0.0 {
            return Err(MechError::Precondition("target paths must have positive length"));
        }
        for v in [input.vertex, output.vertex] {
            mechanism
                .grid
                .vertex_at(v)
                .ok_or(MechError::UnknownVertex(v))?;
        }

        let before_edit = mechanism.grid.layout();
        let dof_before = mechanism.grid.dof();
        Ok(Self {
            rng: SmallRng::seed_from_u64(config.rng_seed),
            config,
            state: OptimizerState::Idle,
            mechanism,
            report: OptimizationReport {
                min_error: f64::INFINITY,
                ..Default::default()
            },
            current_error: f64::INFINITY,
            best: None,
            start: before_edit.clone(),
            baseline: f64::INFINITY,
            before_edit,
            dof_before,
            edit: EditKind::Initial,
            edit_applied: false,
            pending: None,
        })
    }

    /// Continue from an earlier run: its start and minimum error become the
    /// baseline the first evaluation has to beat.
    pub fn seeded_from(mut self, prior: &OptimizationReport) -> Self {
        self.report.start_error = prior.start_error;
        self.report.min_error = prior.min_error;
        self.baseline = prior.min_error;
        self
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn mechanism(&self) -> &Mechanism {
        &self.mechanism
    }

    pub fn into_mechanism(self) -> Mechanism {
        self.mechanism
    }

    pub fn report(&self) -> &OptimizationReport {
        &self.report
    }

    /// Perform one state transition and return the new state.
    pub fn advance<F: PathFitter + ?Sized>(
        &mut self,
        fitter: &mut F,
    ) -> Result<OptimizerState, MechError> {
        self.state = match self.state {
            OptimizerState::Idle => {
                log::info!(
                    "optimizer start: {} cells, dof {}, {} iterations",
                    self.mechanism.grid.cell_count(),
                    self.dof_before,
                    self.config.max_iterations
                );
                OptimizerState::AwaitingEvaluation
            }
            OptimizerState::Stepping => {
                self.step()?;
                OptimizerState::AwaitingEvaluation
            }
            OptimizerState::AwaitingEvaluation => {
                let eval = match self.evaluate(fitter) {
                    Ok(eval) => eval,
                    Err(e) if e.is_recoverable() => {
                        log::warn!("iteration {}: fit failed: {e}", self.report.iterations);
                        Evaluation::failed(self.mechanism.grid.dof())
                    }
                    Err(e) => return Err(e),
                };
                self.report.iterations += 1;
                self.pending = Some(eval);
                OptimizerState::AcceptReject
            }
            OptimizerState::AcceptReject => {
                if let Some(eval) = self.pending.take() {
                    self.judge(eval)?;
                }
                if self.report.iterations >= self.config.max_iterations {
                    self.finish()?;
                    OptimizerState::Done
                } else {
                    OptimizerState::Stepping
                }
            }
            OptimizerState::Done => OptimizerState::Done,
        };
        Ok(self.state)
    }

    /// Advance until [`OptimizerState::Done`].
    pub fn run<F: PathFitter + ?Sized>(
        &mut self,
        fitter: &mut F,
    ) -> Result<OptimizationReport, MechError> {
        while self.advance(fitter)? != OptimizerState::Done {}
        Ok(self.report.clone())
    }

    /// Stop now. An unevaluated edit is reverted and the best topology seen
    /// so far is restored.
    pub fn cancel(&mut self) -> Result<OptimizationReport, MechError> {
        if matches!(
            self.state,
            OptimizerState::AwaitingEvaluation | OptimizerState::AcceptReject
        ) {
            self.pending = None;
            self.mechanism.grid.apply_layout(&self.before_edit)?;
        }
        if self.state != OptimizerState::Done {
            self.finish()?;
            self.state = OptimizerState::Done;
        }
        Ok(self.report.clone())
    }

    // ---------------------------------------------------------------------
    // Edits
    // ---------------------------------------------------------------------

    fn step(&mut self) -> Result<(), MechError> {
        let grid = &mut self.mechanism.grid;
        grid.reset_deformation();
        self.before_edit = grid.layout();
        self.dof_before = grid.dof();

        // Split is forced at the low end before the merge coin is thrown.
        let split = self.dof_before <= self.config.min_target_dof
            || !(self.dof_before >= self.config.max_target_dof || self.rng.gen_bool(0.5));
        let (edit, applied) = if split {
            (EditKind::Split, self.split_edit()?)
        } else {
            (EditKind::Merge, self.merge_edit()?)
        };
        if !applied {
            log::warn!(
                "no {edit:?} edit found from dof {} in {} attempts",
                self.dof_before,
                self.config.max_edit_attempts
            );
        }
        self.edit = edit;
        self.edit_applied = applied;
        Ok(())
    }

    /// Split random rigid cells until the degrees of freedom grow.
    fn split_edit(&mut self) -> Result<bool, MechError> {
        let grid = &mut self.mechanism.grid;
        if grid.cells().all(|(_, c)| c.kind() != CellKind::Rigid) {
            return Ok(false);
        }
        for _ in 0..self.config.max_edit_attempts {
            let graph = grid.constraint_graph();
            let c = ComponentId(self.rng.gen_range(0..graph.dof()));
            let candidates = graph.split_candidates(c)?;
            if candidates.is_empty() {
                continue;
            }
            let cell = candidates[self.rng.gen_range(0..candidates.len())];
            let axis = if self.rng.gen_bool(0.5) {
                SplitAxis::Horizontal
            } else {
                SplitAxis::Vertical
            };
            split_component_at(grid, c, cell, axis)?;
            if grid.dof() > self.dof_before {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Make random shared cells rigid until the degrees of freedom shrink.
    fn merge_edit(&mut self) -> Result<bool, MechError> {
        let grid = &mut self.mechanism.grid;
        for _ in 0..self.config.max_edit_attempts {
            let graph = grid.constraint_graph();
            let Some((a, b)) = graph.try_pick_random_components(&mut self.rng) else {
                return Ok(false);
            };
            let candidates: Vec<_> = graph
                .merge_candidates(a, b)?
                .into_iter()
                .filter(|&c| grid[c].kind() == CellKind::Shear)
                .collect();
            if candidates.is_empty() {
                continue;
            }
            let index = grid[candidates[self.rng.gen_range(0..candidates.len())]].index();
            grid.set_cell_kind(index, CellKind::Rigid)?;
            if grid.dof() < self.dof_before {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ---------------------------------------------------------------------
    // Evaluation
    // ---------------------------------------------------------------------

    fn evaluate<F: PathFitter + ?Sized>(&mut self, fitter: &mut F) -> Result<Evaluation, MechError> {
        self.mechanism.grid.reset_deformation();
        let grid = &self.mechanism.grid;
        let (input, output) = match (self.mechanism.input(), self.mechanism.output()) {
            (Some(i), Some(o)) => (i, o),
            _ => return Err(MechError::Precondition("targets were cleared")),
        };
        let secondary = self
            .config
            .constrain_output
            .then(|| (output.vertex, output.points.clone()));
        let request = FitRequest::from_grid(grid, input.vertex, input.points.clone(), secondary)?;
        let numbering = grid.vertex_numbering();
        let observed = grid
            .vertex_at(output.vertex)
            .and_then(|v| numbering.get(&v).copied())
            .ok_or(MechError::UnknownVertex(output.vertex))?;

        let frames = fitter.fit(&request)?;
        if frames.len() != input.points.len() {
            return Err(MechError::PathLengthMismatch {
                expected: input.points.len(),
                found: frames.len(),
            });
        }
        let realized_in = track(&frames, request.driven)?;
        let realized_out = track(&frames, observed)?;

        let input_error = pointwise_distance(&realized_in, &input.points)? / input.length();
        let output_error = pointwise_distance(&realized_out, &output.points)? / output.length();
        Ok(Evaluation {
            input_error,
            output_error,
            error: self.config.input_weight * input_error + self.config.output_weight * output_error,
            input_length: path_length(&realized_in),
            output_length: path_length(&realized_out),
            dof: grid.dof(),
        })
    }

    fn is_degenerate(&self, eval: &Evaluation) -> bool {
        eval.input_length < self.config.min_realized_length
            || eval.output_length < self.config.min_realized_length
            || eval.input_error > self.config.degenerate_error
            || eval.output_error > self.config.degenerate_error
            || !eval.error.is_finite()
    }

    fn judge(&mut self, eval: Evaluation) -> Result<(), MechError> {
        let iteration = self.report.iterations;
        let temperature = self.config.temperature(iteration);

        let verdict = if self.is_degenerate(&eval) {
            log::warn!(
                "iteration {iteration}: degenerate evaluation (lengths {:.4}/{:.4}, error {:.4})",
                eval.input_length,
                eval.output_length,
                eval.error
            );
            self.report.degenerate += 1;
            Verdict::Degenerate
        } else {
            if self.report.start_error.is_none() {
                self.report.start_error = Some(eval.error);
            }
            let gain = self.report.min_error - eval.error;
            let simpler = eval.dof < self.dof_before;
            let delta = self.config.min_error_delta;
            if gain > delta || (gain.abs() < delta && simpler) {
                Verdict::Accepted
            } else if self.config.enable_annealing && self.anneal(eval.error, temperature) {
                Verdict::Annealed
            } else {
                Verdict::Rejected
            }
        };

        match verdict {
            Verdict::Accepted => {
                self.report.accepted += 1;
                self.report.min_error = eval.error;
                self.current_error = eval.error;
                if self.best.as_ref().is_none_or(|b| eval.error < b.error) {
                    self.best = Some(Best {
                        layout: self.mechanism.grid.layout(),
                        error: eval.error,
                    });
                }
            }
            Verdict::Annealed => {
                self.report.annealed += 1;
                self.report.min_error = eval.error;
                self.current_error = eval.error;
            }
            Verdict::Rejected | Verdict::Degenerate => {
                if verdict == Verdict::Rejected {
                    self.report.rejected += 1;
                }
                self.mechanism.grid.apply_layout(&self.before_edit)?;
            }
        }

        log::debug!(
            "iteration {iteration}: {:?} {:?} error {:.4} (in {:.4}, out {:.4}) dof {} T {:.3}",
            self.edit,
            verdict,
            eval.error,
            eval.input_error,
            eval.output_error,
            eval.dof,
            temperature
        );
        self.report.history.push(StepRecord {
            iteration,
            edit: self.edit,
            edit_applied: self.edit_applied,
            encoding: self.mechanism.grid.encoding(),
            evaluation: eval,
            verdict,
            temperature,
        });
        Ok(())
    }

    /// Annealing test: accept with probability `1 / (1 + exp((1/error) / T))`.
    fn anneal(&mut self, error: f64, temperature: f64) -> bool {
        if temperature <= 0.0 || error <= 0.0 {
            return false;
        }
        let p = 1.0 / (1.0 + ((1.0 / error) / temperature).exp());
        self.rng.gen_range(0.0..1.0) < p
    }

    /// Restore the best topology if the current one is worse. Without any
    /// accepted topology, annealed moves are undone back to the start.
    fn finish(&mut self) -> Result<(), MechError> {
        self.mechanism.grid.reset_deformation();
        match &self.best {
            Some(best) => {
                if best.error < self.current_error {
                    self.mechanism.grid.apply_layout(&best.layout)?;
                    self.current_error = best.error;
                }
                self.report.min_error = best.error;
            }
            None if self.current_error.is_finite() => {
                self.mechanism.grid.apply_layout(&self.start)?;
                self.current_error = f64::INFINITY;
                self.report.min_error = self.baseline;
            }
            None => {}
        }
        self.report.final_error = self.current_error;
        self.report.final_dof = self.mechanism.grid.dof();
        log::info!(
            "optimizer done: {} iterations, min error {:.4}, dof {}, {} accepted / {} annealed / {} rejected / {} degenerate",
            self.report.iterations,
            self.report.min_error,
            self.report.final_dof,
            self.report.accepted,
            self.report.annealed,
            self.report.rejected,
            self.report.degenerate
        );
        Ok(())
    }
}

/// Positions of vertex `i` across all frames.
fn track(frames: &[Frame], i: usize) -> Result<Vec<Vec2>, MechError> {
    frames
        .iter()
        .map(|f| {
            f.get(i)
                .copied()
                .ok_or_else(|| MechError::Fitter(format!("frame lacks vertex {i}")))
        })
        .collect()
}
