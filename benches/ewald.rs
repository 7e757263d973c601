use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use longrange::{
    EwaldSolver, HalfNeighborList, Method, Particle, ParticleStore, Particles, RealSpaceEwald,
    SimulationBox, Tuner, Vector3,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Random neutral system of `n` charges in a cubic box
fn generate_particles(n: usize, length: f64) -> Particles {
    let mut rng = StdRng::seed_from_u64(1);
    (0..n)
        .map(|i| {
            let position = Vector3::from_fn(|_, _| rng.gen_range(0.0..length));
            Particle::new(position, if i % 2 == 0 { 1.0 } else { -1.0 })
        })
        .collect()
}

/// Single-pair kernel
fn bench_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair");
    let ewald = RealSpaceEwald::new(9.0, 0.3);
    let distance = Vector3::new(1.0, 2.0, 3.0);
    group.bench_function("energy", |b| {
        b.iter(|| ewald.pair_energy(black_box(-1.0), black_box(distance.norm())))
    });
    group.bench_function("force", |b| {
        b.iter(|| ewald.pair_force(black_box(-1.0), black_box(&distance)))
    });
    group.finish();
}

/// Full evaluations with tuned parameters for growing systems
fn bench_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver");
    group.sample_size(10);
    for n in [100, 1000] {
        let length = 20.0;
        let cell = SimulationBox::cube(length);
        let mut particles = generate_particles(n, length);
        let params = Tuner::default().tune(1e-5, n, &cell).unwrap();
        let list = HalfNeighborList::build(&particles.positions(n), &cell, params.r_max).unwrap();

        for (name, method) in [("direct", Method::Direct), ("spme", Method::Mesh)] {
            let mut solver = EwaldSolver::new(params, method, &cell).unwrap();
            group.bench_with_input(BenchmarkId::new(name, n), &n, |b, _| {
                b.iter(|| solver.compute(&mut particles, &cell, &list).unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_pair, bench_solvers);
criterion_main!(benches);
