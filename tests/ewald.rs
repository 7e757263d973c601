// Copyright 2023 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

use approx::assert_relative_eq;
use itertools::iproduct;
use longrange::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use statrs::function::erf::erfc;
use std::f64::consts::{PI, TAU};

/// Random neutral system of ±1 charges in a cubic box
fn random_neutral(num_pairs: usize, length: f64, seed: u64) -> Particles {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..2 * num_pairs)
        .map(|i| {
            let position = Vector3::from_fn(|_, _| rng.gen_range(0.0..length));
            Particle::new(position, if i % 2 == 0 { 1.0 } else { -1.0 })
        })
        .collect()
}

/// Brute-force Ewald energy with generous cutoffs, independent of the crate's kernels
fn reference_energy(particles: &Particles, length: f64, alpha: f64) -> f64 {
    let n = particles.len();
    let mut real = 0.0;
    for (i, j) in iproduct!(0..n, 0..n) {
        for (nx, ny, nz) in iproduct!(-3..=3, -3..=3, -3..=3) {
            if i == j && (nx, ny, nz) == (0, 0, 0) {
                continue;
            }
            let shift = Vector3::new(nx as f64, ny as f64, nz as f64) * length;
            let r = (particles[i].position - particles[j].position + shift).norm();
            real += 0.5 * particles[i].charge * particles[j].charge * erfc(alpha * r) / r;
        }
    }
    let volume = length.powi(3);
    let mut reciprocal = 0.0;
    for (kx, ky, kz) in iproduct!(-14..=14, -14..=14, -14..=14) {
        if (kx, ky, kz) == (0, 0, 0) {
            continue;
        }
        let k = Vector3::new(kx as f64, ky as f64, kz as f64) * (TAU / length);
        let k2 = k.norm_squared();
        let (s_cos, s_sin) = particles.iter().fold((0.0, 0.0), |(c, s), p| {
            let phase = k.dot(&p.position);
            (c + p.charge * phase.cos(), s + p.charge * phase.sin())
        });
        reciprocal += 2.0 * PI / volume * (-k2 / (4.0 * alpha * alpha)).exp() / k2
            * (s_cos * s_cos + s_sin * s_sin);
    }
    let self_energy: f64 = particles
        .iter()
        .map(|p| -alpha / PI.sqrt() * p.charge * p.charge)
        .sum();
    real + reciprocal + self_energy
}

#[test]
fn ion_pair_matches_reference_ewald() {
    let cell = SimulationBox::cube(10.0);
    let mut particles = Particles::from_iter([
        Particle::new(Vector3::new(4.5, 5.0, 5.0), 1.0),
        Particle::new(Vector3::new(5.5, 5.0, 5.0), -1.0),
    ]);
    let params = Tuner::default().tune(1e-6, 2, &cell).unwrap();
    assert_relative_eq!(params.alpha, 0.4707, epsilon = 1e-3);

    let reference = reference_energy(&particles, 10.0, params.alpha);
    for method in [Method::Direct, Method::Mesh] {
        let mut solver = EwaldSolver::new(params.with_mesh_width(64), method, &cell).unwrap();
        let energies = solver.compute(&mut particles, &cell, &PeriodicImages).unwrap();
        assert!(energies.total() < 0.0);
        assert_relative_eq!(energies.total(), reference, max_relative = 1e-5);
        assert!(particles[0].force.x > 0.0);
        assert!(particles[1].force.x < 0.0);
        assert_relative_eq!(particles.total_potential(), energies.total(), max_relative = 1e-10);
    }
}

#[test]
fn ion_pair_force_approaches_coulomb() {
    let length = 30.0;
    let separation: f64 = 1.5;
    let cell = SimulationBox::cube(length);
    let coulomb = 1.0 / separation.powi(2);

    let mut errors = Vec::new();
    for (r_max, k_max) in [(4.0, 1.0), (14.0, 3.5)] {
        let mut particles = Particles::from_iter([
            Particle::new(Vector3::new(14.0, 15.0, 15.0), 1.0),
            Particle::new(Vector3::new(14.0 + separation, 15.0, 15.0), -1.0),
        ]);
        let params = SplitParameters::new(0.35, r_max, &cell)
            .unwrap()
            .with_k_max(k_max);
        let mut solver = EwaldSolver::new(params, Method::Direct, &cell).unwrap();
        let list = HalfNeighborList::build(&particles.positions(2), &cell, r_max).unwrap();
        solver.compute(&mut particles, &cell, &list).unwrap();
        errors.push((particles[0].force.x - coulomb).abs() / coulomb);
        assert_relative_eq!(particles[0].force.x, -particles[1].force.x, epsilon = 1e-12);
    }
    // remaining difference is the tin-foil field of the periodic dipole images
    assert!(errors[1] < 2e-3, "relative error {}", errors[1]);
    assert!(errors[1] < errors[0]);
}

#[test]
fn neutral_system_has_no_net_force() {
    let length = 10.0;
    let cell = SimulationBox::cube(length);
    let params = SplitParameters::new(0.5, 4.5, &cell)
        .unwrap()
        .with_k_max(5.0)
        .with_mesh_width(32);

    let mut particles = random_neutral(20, length, 7);
    let list = HalfNeighborList::build(&particles.positions(40), &cell, params.r_max).unwrap();

    EwaldSolver::new(params, Method::Direct, &cell)
        .unwrap()
        .compute(&mut particles, &cell, &list)
        .unwrap();
    let max_force = particles.iter().map(|p| p.force.norm()).fold(0.0, f64::max);
    assert!(particles.net_force().norm() < 1e-10 * max_force.max(1.0));

    EwaldSolver::new(params, Method::Mesh, &cell)
        .unwrap()
        .compute(&mut particles, &cell, &list)
        .unwrap();
    let max_force = particles.iter().map(|p| p.force.norm()).fold(0.0, f64::max);
    assert!(particles.net_force().norm() < 1e-2 * max_force);
}

#[test]
fn mesh_converges_to_direct_sum() {
    let length = 10.0;
    let cell = SimulationBox::cube(length);
    let params = SplitParameters::new(0.5, 4.5, &cell).unwrap().with_k_max(6.0);
    let mut particles = random_neutral(10, length, 42);
    let list = HalfNeighborList::build(&particles.positions(20), &cell, params.r_max).unwrap();

    let direct = EwaldSolver::new(params, Method::Direct, &cell)
        .unwrap()
        .compute(&mut particles, &cell, &list)
        .unwrap()
        .reciprocal;

    let errors: Vec<f64> = [8, 16, 32]
        .into_iter()
        .map(|width| {
            let mesh = EwaldSolver::new(params.with_mesh_width(width), Method::Mesh, &cell)
                .unwrap()
                .compute(&mut particles, &cell, &list)
                .unwrap()
                .reciprocal;
            (mesh - direct).abs()
        })
        .collect();
    assert!(errors[0] > errors[1] && errors[1] > errors[2], "{errors:?}");
    assert!(errors[2] < 1e-3 * direct.abs());
}

#[test]
fn self_energy_is_independent_of_positions() {
    let cell = SimulationBox::cube(10.0);
    let params = SplitParameters::new(0.4, 4.0, &cell).unwrap();
    let mut solver = EwaldSolver::new(params, Method::Direct, &cell).unwrap();
    let mut a = random_neutral(5, 10.0, 1);
    let mut b = random_neutral(5, 10.0, 2);
    let list = |p: &Particles| HalfNeighborList::build(&p.positions(10), &cell, 4.0).unwrap();
    let (list_a, list_b) = (list(&a), list(&b));
    let self_a = solver.compute(&mut a, &cell, &list_a).unwrap().self_energy;
    let self_b = solver.compute(&mut b, &cell, &list_b).unwrap().self_energy;
    assert_relative_eq!(self_a, -10.0 * 0.4 / PI.sqrt(), epsilon = 1e-12);
    assert_relative_eq!(self_a, self_b);
}

#[test]
fn self_pairs_are_excluded() {
    let cell = SimulationBox::cube(10.0);
    let mut particles = random_neutral(2, 10.0, 3);
    let list = HalfNeighborList::from_pairs(4, [(0, 0), (0, 1), (2, 2), (2, 3)]);
    let params = SplitParameters::new(0.4, 4.0, &cell).unwrap();
    let energies = EwaldSolver::new(params, Method::Mesh, &cell)
        .unwrap()
        .compute(&mut particles, &cell, &list)
        .unwrap();
    assert!(energies.total().is_finite());
    assert!(particles.iter().all(|p| p.force.iter().all(|f| f.is_finite())));
}

/// Puts a ghost copy of particle 1 after the local particles and returns its
/// accumulated force and energy share to particle 1 on scatter.
struct GhostCopy {
    drain: bool,
}

impl DomainDecomposition<Particles> for GhostCopy {
    fn exchange_ghosts(&mut self, particles: &mut Particles, _cutoff: f64) -> Result<()> {
        let ghost = Particle::new(particles[1].position, particles[1].charge);
        particles.push_ghost(ghost);
        Ok(())
    }
    fn scatter_ghosts(&mut self, particles: &mut Particles) -> Result<()> {
        if self.drain {
            for ghost in particles.drain_ghosts() {
                particles.add_force(1, &ghost.force);
                particles.add_potential(1, ghost.potential);
            }
        }
        Ok(())
    }
}

#[test]
fn ghost_contributions_return_to_owner() {
    let cell = SimulationBox::cube(10.0);
    let params = SplitParameters::new(0.4, 4.0, &cell).unwrap();
    let mut solver = EwaldSolver::new(params, Method::Direct, &cell).unwrap();

    let mut plain = random_neutral(1, 2.0, 5);
    let expected = solver
        .compute(&mut plain, &cell, &HalfNeighborList::from_pairs(2, [(0, 1)]))
        .unwrap();

    let mut particles = plain.clone();
    let ghost_list = HalfNeighborList::from_pairs(2, [(0, 2)]);
    let energies = solver
        .compute_with(&mut particles, &cell, &ghost_list, &mut GhostCopy { drain: true })
        .unwrap();
    assert_relative_eq!(energies.total(), expected.total(), epsilon = 1e-12);
    assert_eq!(particles.num_total(), 2);
    for (p, q) in particles.iter().zip(plain.iter()) {
        assert_relative_eq!(p.force, q.force, epsilon = 1e-12);
        assert_relative_eq!(p.potential, q.potential, epsilon = 1e-12);
    }

    let mut leaky = GhostCopy { drain: false };
    let result = solver.compute_with(&mut particles, &cell, &ghost_list, &mut leaky);
    assert_eq!(
        result,
        Err(EwaldError::InvariantViolation {
            expected: 2,
            found: 3
        })
    );
}

#[test]
fn ghosts_are_scattered_after_failed_pair_sum() {
    let cell = SimulationBox::cube(10.0);
    let params = SplitParameters::new(0.4, 4.0, &cell).unwrap();
    let mut solver = EwaldSolver::new(params, Method::Direct, &cell).unwrap();
    let mut particles = Particles::from_iter([
        Particle::new(Vector3::new(5.0, 5.0, 5.0), 1.0),
        Particle::new(Vector3::new(5.0, 5.0, 5.0), -1.0),
    ]);
    let ghost_list = HalfNeighborList::from_pairs(2, [(0, 2)]);
    let mut domain = GhostCopy { drain: true };

    let result = solver.compute_with(&mut particles, &cell, &ghost_list, &mut domain);
    assert_eq!(result, Err(EwaldError::NumericalDegeneracy { i: 0, j: 2 }));
    assert_eq!(particles.num_total(), 2);

    // a corrected configuration evaluates normally afterwards
    particles[1].position = Vector3::new(6.0, 5.0, 5.0);
    assert!(solver
        .compute_with(&mut particles, &cell, &ghost_list, &mut domain)
        .is_ok());
    assert_eq!(particles.num_total(), 2);
}

#[derive(Clone, Debug)]
struct BrokenNetwork;

impl Communicator for BrokenNetwork {
    fn all_reduce_sum(&self, _buffer: &mut [f64]) -> Result<()> {
        Err(EwaldError::Collective("connection reset".into()))
    }
}

#[test]
fn failed_reduction_aborts_evaluation() {
    let cell = SimulationBox::cube(10.0);
    let params = SplitParameters::new(0.4, 4.0, &cell).unwrap();
    let mut particles = random_neutral(2, 10.0, 11);
    for method in [Method::Direct, Method::Mesh] {
        let mut solver = EwaldSolver::new(params, method, &cell)
            .unwrap()
            .with_communicator(Box::new(BrokenNetwork));
        assert!(matches!(
            solver.compute(&mut particles, &cell, &PeriodicImages),
            Err(EwaldError::Collective(_))
        ));
    }
}
