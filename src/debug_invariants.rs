//! Invariant checking for the grid arena.
//!
//! Mutating operations call [`debug_invariants!`](crate::debug_invariants) after
//! they finish; the check compiles away in release builds unless the
//! `check-invariants` feature is on.

use crate::mech_error::MechError;

/// Structures with internal consistency rules (ownership back-references,
/// position maps) that can be verified on demand.
pub trait DebugInvariants {
    /// Panic on the first violated invariant when checking is enabled.
    fn debug_assert_invariants(&self);
    /// Return the first violated invariant as [`MechError::Invariant`].
    fn validate_invariants(&self) -> Result<(), MechError>;
}

/// Validate `$target` and panic with the given context on failure.
#[macro_export]
macro_rules! debug_invariants {
    ($target:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $crate::debug_invariants::DebugInvariants::validate_invariants($target) {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
