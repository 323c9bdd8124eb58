//! Planar geometry used by the kinematic solvers and the optimizer's path metrics.

pub mod polyline;
pub mod vector;

pub use vector::Vec2;
