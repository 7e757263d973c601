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

//! # Particle storage
//!
//! The solvers read positions and charges through the [`ParticleStore`] trait and
//! write forces and potential energy shares back through it. Indices
//! `0..num_local()` are particles owned by this process; `num_local()..num_total()`
//! are ghost copies added by a domain decomposition.

use crate::Vector3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Access to particle data needed by the Ewald solvers
pub trait ParticleStore {
    /// Number of particles owned by this process
    fn num_local(&self) -> usize;

    /// Number of local plus ghost particles
    fn num_total(&self) -> usize {
        self.num_local()
    }

    /// Position of particle `index`
    fn position(&self, index: usize) -> Vector3;

    /// Charge of particle `index`
    fn charge(&self, index: usize) -> f64;

    /// Add to the force accumulator of particle `index`
    fn add_force(&mut self, index: usize, force: &Vector3);

    /// Add to the potential energy accumulator of particle `index`
    fn add_potential(&mut self, index: usize, potential: f64);

    /// Zero forces and potentials of all local and ghost particles
    fn reset_accumulators(&mut self);

    /// Copy positions of `0..count` into a contiguous vector
    fn positions(&self, count: usize) -> Vec<Vector3> {
        (0..count).map(|i| self.position(i)).collect()
    }

    /// Copy charges of `0..count` into a contiguous vector
    fn charges(&self, count: usize) -> Vec<f64> {
        (0..count).map(|i| self.charge(i)).collect()
    }
}

/// A point charge with force and potential accumulators
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Particle {
    pub position: Vector3,
    pub charge: f64,
    #[cfg_attr(feature = "serde", serde(skip, default = "Vector3::zeros"))]
    pub force: Vector3,
    /// Share of the total electrostatic energy carried by this particle
    #[cfg_attr(feature = "serde", serde(skip))]
    pub potential: f64,
}

impl Particle {
    pub fn new(position: Vector3, charge: f64) -> Self {
        Self {
            position,
            charge,
            force: Vector3::zeros(),
            potential: 0.0,
        }
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self::new(Vector3::zeros(), 0.0)
    }
}

/// Vector backed particle store with optional trailing ghost particles
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Particles {
    particles: Vec<Particle>,
    num_local: usize,
}

impl Particles {
    /// Store holding only local particles
    pub fn new(particles: Vec<Particle>) -> Self {
        let num_local = particles.len();
        Self {
            particles,
            num_local,
        }
    }

    /// Number of local particles
    pub fn len(&self) -> usize {
        self.num_local
    }

    pub fn is_empty(&self) -> bool {
        self.num_local == 0
    }

    /// Append a ghost copy after the local particles
    pub fn push_ghost(&mut self, ghost: Particle) {
        self.particles.push(ghost);
    }

    /// Remove and return all ghost particles
    pub fn drain_ghosts(&mut self) -> Vec<Particle> {
        self.particles.split_off(self.num_local)
    }

    /// Local particles
    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles[..self.num_local].iter()
    }

    /// Local and ghost particles
    pub fn all(&self) -> &[Particle] {
        &self.particles
    }

    /// Vector sum of the forces on all local particles
    pub fn net_force(&self) -> Vector3 {
        self.iter().map(|p| p.force).sum()
    }

    /// Sum of the potential energy shares of all local particles
    pub fn total_potential(&self) -> f64 {
        self.iter().map(|p| p.potential).sum()
    }
}

impl FromIterator<Particle> for Particles {
    fn from_iter<T: IntoIterator<Item = Particle>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Index<usize> for Particles {
    type Output = Particle;
    fn index(&self, index: usize) -> &Self::Output {
        &self.particles[index]
    }
}

impl IndexMut<usize> for Particles {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.particles[index]
    }
}

impl ParticleStore for Particles {
    fn num_local(&self) -> usize {
        self.num_local
    }
    fn num_total(&self) -> usize {
        self.particles.len()
    }
    #[inline]
    fn position(&self, index: usize) -> Vector3 {
        self.particles[index].position
    }
    #[inline]
    fn charge(&self, index: usize) -> f64 {
        self.particles[index].charge
    }
    fn add_force(&mut self, index: usize, force: &Vector3) {
        self.particles[index].force += force;
    }
    fn add_potential(&mut self, index: usize, potential: f64) {
        self.particles[index].potential += potential;
    }
    fn reset_accumulators(&mut self) {
        self.particles.iter_mut().for_each(|p| {
            p.force = Vector3::zeros();
            p.potential = 0.0;
        });
    }
}

/// Per-evaluation force and potential buffers
///
/// Each solver phase fills its own set of accumulators which are then added to
/// the particle store. Partial accumulators from different threads are combined
/// with [`Accumulators::merge`].
#[derive(Clone, Debug, PartialEq)]
pub struct Accumulators {
    pub forces: Vec<Vector3>,
    pub potentials: Vec<f64>,
}

impl Accumulators {
    /// Zeroed buffers for `len` particles
    pub fn zeros(len: usize) -> Self {
        Self {
            forces: vec![Vector3::zeros(); len],
            potentials: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.potentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.potentials.is_empty()
    }

    /// Element-wise sum of two equally sized accumulators
    pub fn merge(mut self, other: Self) -> Self {
        debug_assert_eq!(self.len(), other.len());
        self.forces
            .iter_mut()
            .zip(other.forces)
            .for_each(|(a, b)| *a += b);
        self.potentials
            .iter_mut()
            .zip(other.potentials)
            .for_each(|(a, b)| *a += b);
        self
    }

    /// Multiply all forces and potentials by `factor`
    pub fn scale(&mut self, factor: f64) {
        self.forces.iter_mut().for_each(|f| *f *= factor);
        self.potentials.iter_mut().for_each(|p| *p *= factor);
    }

    /// Sum of all potential energy shares
    pub fn energy(&self) -> f64 {
        self.potentials.iter().sum()
    }

    /// Add the buffers to the first `len()` particles of `store`
    pub fn apply_to<P: ParticleStore + ?Sized>(&self, store: &mut P) {
        for (i, (force, potential)) in self.forces.iter().zip(&self.potentials).enumerate() {
            store.add_force(i, force);
            store.add_potential(i, *potential);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ghost_bookkeeping() {
        let mut particles = Particles::from_iter([
            Particle::new(Vector3::new(1.0, 0.0, 0.0), 1.0),
            Particle::new(Vector3::new(2.0, 0.0, 0.0), -1.0),
        ]);
        particles.push_ghost(Particle::new(Vector3::new(11.0, 0.0, 0.0), 1.0));
        assert_eq!(particles.num_local(), 2);
        assert_eq!(particles.num_total(), 3);
        assert_eq!(particles.charges(3), vec![1.0, -1.0, 1.0]);

        particles.add_force(2, &Vector3::new(1.0, 2.0, 3.0));
        let ghosts = particles.drain_ghosts();
        assert_eq!(ghosts.len(), 1);
        assert_eq!(ghosts[0].force, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(particles.num_total(), 2);
    }

    #[test]
    fn test_accumulators() {
        let mut a = Accumulators::zeros(2);
        a.forces[0] = Vector3::new(1.0, 0.0, 0.0);
        a.potentials[1] = 2.0;
        let mut b = Accumulators::zeros(2);
        b.forces[0] = Vector3::new(0.0, 1.0, 0.0);
        b.potentials[1] = 1.0;
        let mut sum = a.merge(b);
        sum.scale(2.0);
        assert_eq!(sum.forces[0], Vector3::new(2.0, 2.0, 0.0));
        assert_eq!(sum.energy(), 6.0);

        let mut particles = Particles::from_iter([Particle::default(), Particle::default()]);
        sum.apply_to(&mut particles);
        assert_eq!(particles.total_potential(), 6.0);
        particles.reset_accumulators();
        assert_eq!(particles.net_force(), Vector3::zeros());
    }
}
