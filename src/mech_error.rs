//! MechError: unified error type for metamech public APIs
//!
//! Geometry-domain violations are fatal logic errors. Collisions, unreachable
//! vertices and degenerate trials are recoverable: callers roll back and try
//! another offset or layout.

use crate::topology::point::GridPoint;
use thiserror::Error;

/// Unified error type for metamech operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MechError {
    /// No vertex exists at the given integer grid position.
    #[error("no vertex at grid position {0}")]
    UnknownVertex(GridPoint),
    /// No cell has its index vertex at the given grid position.
    #[error("no cell at grid position {0}")]
    UnknownCell(GridPoint),
    /// Cell corners do not form an axis-aligned quad with positive size.
    #[error("invalid cell geometry: {0}")]
    InvalidCell(String),
    /// Law-of-cosines argument left [-1, 1]: the mechanism state is inconsistent.
    #[error("geometry domain violation in cell {cell}: cosine argument {argument}")]
    GeometryDomain { cell: GridPoint, argument: f64 },
    /// A shear cell with two anchors would invert.
    #[error("collision in cell {0}: parallelogram would invert")]
    Collision(GridPoint),
    /// No chain of cells connects the moved vertex to an anchor or deformed region.
    #[error("vertex {0} is not reachable by propagation")]
    Unreachable(GridPoint),
    /// Entry point called without the state it needs.
    #[error("precondition failed: {0}")]
    Precondition(&'static str),
    /// Realized and target paths must have the same number of samples.
    #[error("path sample count mismatch: expected {expected}, found {found}")]
    PathLengthMismatch { expected: usize, found: usize },
    /// The path-fitting collaborator failed or returned malformed frames.
    #[error("path fitter failed: {0}")]
    Fitter(String),
    /// The evaluation indicates a locked or broken mechanism.
    #[error("degenerate mechanism: {0}")]
    Degenerate(String),
    /// Split axis without defined semantics.
    #[error("split axis {0:?} is not supported")]
    UnsupportedSplitAxis(crate::algs::non_shearing::SplitAxis),
    /// A component id from a stale or different constraint graph.
    #[error("component {0} does not exist in the current constraint graph")]
    UnknownComponent(usize),
    /// Text model could not be parsed.
    #[error("model parse error: {0}")]
    ModelParse(String),
    /// I/O failure while reading or writing a model.
    #[error("I/O error: {0}")]
    Io(String),
    /// Grid invariant violated (only reported by `validate_invariants`).
    #[error("grid invariant violated: {0}")]
    Invariant(String),
}

impl MechError {
    /// Whether the caller may roll back and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MechError::Collision(_) | MechError::Unreachable(_) | MechError::Degenerate(_)
        )
    }
}

impl From<std::io::Error> for MechError {
    fn from(e: std::io::Error) -> Self {
        MechError::Io(e.to_string())
    }
}
