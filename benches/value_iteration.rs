use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mdp_solvers::mdp::random;
use mdp_solvers::{Solution, Solver, SolverConfig, SparseValueIteration, ValueIteration};

// (states, actions, successors per state-action pair)
const SIZES: &[(usize, usize, usize)] = &[(100, 4, 8), (500, 4, 8), (1000, 8, 16)];

fn bench_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_iteration");
    group.sample_size(10);

    for &(ns, na, branching) in SIZES {
        // Seeded so every solver sees the same model.
        let mdp = random::generate(ns, na, 0.95, branching, 42).unwrap();
        let label = format!("{ns}x{na}");
        group.throughput(Throughput::Elements((ns * na) as u64));

        let solvers: [(&str, Box<dyn Solver<f32>>); 3] = [
            ("vi", Box::new(ValueIteration::default())),
            (
                "vi_parallel",
                Box::new(ValueIteration::new(SolverConfig::default().parallel(true))),
            ),
            ("spvi", Box::new(SparseValueIteration::default())),
        ];
        for (name, solver) in &solvers {
            group.bench_with_input(BenchmarkId::new(*name, &label), &mdp, |b, mdp| {
                b.iter(|| {
                    let solution: Solution<f32> = solver.solve(mdp, 0).unwrap();
                    solution.iterations
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_solvers);
criterion_main!(benches);
