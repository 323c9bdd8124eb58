//! Grid topology model.
//!
//! This module provides the arena of vertices, edges and cells that every
//! other part of the crate works on:
//! - Integer identities and arena ids ([`point`])
//! - Cell kinds and their dispatch table ([`cell_type`])
//! - The [`Grid`] arena with ownership back-references and anchors
//! - Resolution changes ([`refine`], [`coarsen`])

pub mod cache;
pub mod cell_type;
pub mod coarsen;
pub mod grid;
pub mod point;
pub mod refine;

pub use cache::InvalidateCache;
pub use cell_type::CellKind;
pub use grid::{Cell, Edge, Grid, Layout, Vertex};
pub use point::{CellId, EdgeId, GridPoint, VertexId};
