#![cfg_attr(docsrs, feature(doc_cfg))]
//! # metamech
//!
//! metamech models planar metamaterial mechanisms built from a grid of square
//! cells. Each cell is either **rigid** (keeps its shape) or **shear** (a
//! parallelogram that keeps its edge lengths while its angles change). Cells
//! share vertices and edges with their neighbours, so a local deformation
//! travels through the grid.
//!
//! ## Features
//! - Grid topology arena with anchors, ownership back-references and
//!   resolution changes ([`topology`])
//! - Constraint-graph analysis: degrees of freedom, components, non-shearing
//!   areas and component splitting ([`algs::constraint_graph`],
//!   [`algs::non_shearing`])
//! - Per-cell kinematic solvers and breadth-first deformation propagation
//!   ([`kinematics`], [`algs::propagate`])
//! - Simulated-annealing topology optimization toward a target input/output
//!   motion, with a multi-resolution wrapper ([`optimize`])
//! - A plain-text model format ([`io`])
//!
//! ## Determinism
//!
//! All randomized decisions use `SmallRng` seeds drawn from configuration so runs are
//! reproducible. Grid iteration follows arena slot order, never hash order.
//! Unit tests fix seeds explicitly to ensure deterministic behavior.
//!
//! ## Invariant checking
//! Mutating grid operations verify ownership back-references in debug builds.
//! Enable the `check-invariants` feature to keep the checks in release builds.

pub mod algs;
pub mod debug_invariants;
pub mod geometry;
pub mod io;
pub mod kinematics;
pub mod mech_error;
pub mod mechanism;
pub mod optimize;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::constraint_graph::{ComponentId, ConstraintGraph};
    pub use crate::algs::non_shearing::{SplitAxis, promote_non_shearing_cells, split_component_at};
    pub use crate::algs::propagate::{PropagationConfig, deform};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::geometry::Vec2;
    pub use crate::io::{MechanismReader, MechanismWriter, ModelText};
    pub use crate::kinematics::KinematicsConfig;
    pub use crate::mech_error::MechError;
    pub use crate::mechanism::{Mechanism, PathScaling, TrackedPath};
    pub use crate::optimize::fitting::{FitRequest, Frame, PathFitter, PropagationFitter};
    pub use crate::optimize::{
        HierarchicalConfig, OptimizationReport, Optimizer, OptimizerConfig, OptimizerState,
        optimize_hierarchical,
    };
    pub use crate::topology::{CellKind, Grid, GridPoint, InvalidateCache, Layout};
}
