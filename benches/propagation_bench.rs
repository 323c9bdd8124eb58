use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use metamech::algs::propagate::{PropagationConfig, deform};
use metamech::topology::cell_type::CellKind;
use metamech::topology::grid::Grid;
use metamech::topology::point::GridPoint;

fn anchored(size: i32, kind: CellKind) -> Grid {
    let mut grid = Grid::filled(size, size, kind).expect("grid");
    grid.set_anchor(GridPoint::new(0, 0), true);
    grid
}

fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation");
    let cfg = PropagationConfig::default();

    for &size in &[4i32, 8, 16] {
        for kind in [CellKind::Rigid, CellKind::Shear] {
            let mut grid = anchored(size, kind);
            let driven = GridPoint::new(size, 0);
            let id = BenchmarkId::new(format!("{kind:?}"), size);
            group.bench_with_input(id, &size, |b, _| {
                b.iter(|| {
                    grid.reset_deformation();
                    let report = deform(&mut grid, driven, [0.0, 0.25], &cfg);
                    black_box(report.ok());
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_propagation);
criterion_main!(benches);
