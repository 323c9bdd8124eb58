//! Identity types for grid entities.
//!
//! A [`GridPoint`] is the immutable integer coordinate that identifies a vertex
//! (and, for the cell's index vertex, the cell itself). Floating positions
//! change under deformation; identity never does.
//!
//! [`VertexId`], [`EdgeId`] and [`CellId`] are arena slots inside a
//! [`Grid`](crate::topology::grid::Grid). They are stable while the entity
//! lives; a slot may be reused after the entity is removed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer grid coordinate.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Multiply both coordinates by `factor`.
    #[inline]
    pub const fn scaled(self, factor: i32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Floor-divide both coordinates by `factor` (rounds toward negative infinity).
    #[inline]
    pub const fn coarsened(self, factor: i32) -> Self {
        Self {
            x: self.x.div_euclid(factor),
            y: self.y.div_euclid(factor),
        }
    }

    /// Floating position of this coordinate.
    #[inline]
    pub fn to_vec(self) -> [f64; 2] {
        [self.x as f64, self.y as f64]
    }

    /// Manhattan magnitude `x + y`, used to pick the anchor nearest the origin.
    #[inline]
    pub const fn taxicab(self) -> i64 {
        self.x as i64 + self.y as i64
    }
}

impl fmt::Debug for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GridPoint({}, {})", self.x, self.y)
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub(crate) const fn from_slot(slot: usize) -> Self {
                Self(slot as u32)
            }

            /// Arena slot index.
            #[inline]
            pub const fn slot(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }
    };
}

arena_id!(
    /// Arena slot of a vertex.
    VertexId
);
arena_id!(
    /// Arena slot of an edge.
    EdgeId
);
arena_id!(
    /// Arena slot of a cell.
    CellId
);
