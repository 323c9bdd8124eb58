//! Cache invalidation for derived topology data.

/// Anything that caches data derived from the grid topology (constraint
/// graph, component cell sets, non-shearing areas) implements this.
pub trait InvalidateCache {
    /// Drop every cached derivation so the next query rebuilds it.
    fn invalidate_cache(&mut self);
}

impl<T: InvalidateCache + ?Sized> InvalidateCache for Box<T> {
    #[inline]
    fn invalidate_cache(&mut self) {
        (**self).invalidate_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::cell_type::CellKind;
    use crate::topology::grid::Grid;

    #[test]
    fn invalidation_forces_rebuild() {
        let mut g = Grid::filled(2, 2, CellKind::Shear).unwrap();
        let before = g.dof();
        g.invalidate_cache();
        assert_eq!(g.dof(), before);
        let mut boxed: Box<Grid> = Box::new(g);
        boxed.invalidate_cache();
        assert_eq!(boxed.dof(), before);
    }
}
