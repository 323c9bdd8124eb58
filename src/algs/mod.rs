//! Algorithms over the grid topology: the constraint graph, non-shearing
//! areas with component splitting, and deformation propagation.

pub mod constraint_graph;
pub mod non_shearing;
pub mod propagate;

pub use constraint_graph::{ComponentId, ConstraintGraph, Hyperedge};
pub use non_shearing::{
    AreaAttachment, NonShearingArea, SplitAxis, promote_non_shearing_cells, split_component_at,
};
pub use propagate::{PropagationConfig, PropagationMode, PropagationReport, deform};
