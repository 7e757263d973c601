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

//! # Ewald solver
//!
//! Assembles the real-space, reciprocal-space and self-energy contributions into
//! total energies, forces and per-particle energy shares.
//!
//! One evaluation runs the phases in this order:
//!
//! 1. ghost exchange through the [`DomainDecomposition`], then zeroing of all accumulators,
//! 2. real-space pairs, written to local and ghost particles,
//! 3. ghost scatter, also after a failed real-space phase; the store must now
//!    hold exactly its own local particles,
//! 4. reciprocal space and self energy for the local particles,
//! 5. global reduction of the real-space and self energies.

use crate::{
    cell::SimulationBox,
    comm::{Communicator, DomainDecomposition, SingleDomain, SingleProcess},
    config::Method,
    fft::SpectralTransform,
    neighbors::PairEnumeration,
    particles::{Accumulators, ParticleStore},
    realspace::RealSpaceEwald,
    reciprocal::{DirectEwald, MeshEwald, ReciprocalSolver},
    tuner::SplitParameters,
    EwaldError, Info, Result, SQRT_PI,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Energy contributions from one evaluation, including prefactor and permittivity
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Energies {
    pub real: f64,
    pub reciprocal: f64,
    pub self_energy: f64,
    /// Surface dipole term; not implemented and always zero
    pub dipole: f64,
}

impl Energies {
    pub fn total(&self) -> f64 {
        self.real + self.reciprocal + self.self_energy + self.dipole
    }
}

/// Self-interaction correction, -α/√π q², for the local particles
pub fn self_energy<P: ParticleStore + ?Sized>(particles: &P, alpha: f64) -> Accumulators {
    let mut accumulators = Accumulators::zeros(particles.num_local());
    for (i, potential) in accumulators.potentials.iter_mut().enumerate() {
        *potential = -alpha / SQRT_PI * particles.charge(i).powi(2);
    }
    accumulators
}

/// Ewald summation of electrostatic energies and forces in a periodic box
#[derive(Clone, Debug)]
pub struct EwaldSolver {
    parameters: SplitParameters,
    real_space: RealSpaceEwald,
    reciprocal: ReciprocalSolver,
    communicator: Box<dyn Communicator>,
}

impl EwaldSolver {
    /// Solver for a single process using the given reciprocal `method`.
    ///
    /// The mesh method requires a cubic `cell`.
    pub fn new(parameters: SplitParameters, method: Method, cell: &SimulationBox) -> Result<Self> {
        parameters.validate()?;
        let reciprocal = match method {
            Method::Direct => {
                ReciprocalSolver::Direct(DirectEwald::new(parameters.alpha, parameters.k_max))
            }
            Method::Mesh => {
                cell.cubic_length("smooth particle mesh Ewald")?;
                ReciprocalSolver::Mesh(MeshEwald::new(parameters.alpha, parameters.mesh_width)?)
            }
        };
        let solver = Self {
            parameters,
            real_space: RealSpaceEwald::new(parameters.r_max, parameters.alpha),
            reciprocal,
            communicator: Box::new(SingleProcess),
        };
        log::info!(
            "{} with α = {:.4}, r_max = {:.4}; cite {}",
            solver.reciprocal.long_name().unwrap_or_default(),
            parameters.alpha,
            parameters.r_max,
            solver.reciprocal.citation().unwrap_or_default()
        );
        Ok(solver)
    }

    /// Use `communicator` for global reductions
    pub fn with_communicator(mut self, communicator: Box<dyn Communicator>) -> Self {
        self.communicator = communicator;
        self
    }

    /// Use `transform` for the mesh method's Fourier transforms
    pub fn with_transform(mut self, transform: Box<dyn SpectralTransform>) -> Result<Self> {
        match &mut self.reciprocal {
            ReciprocalSolver::Mesh(mesh) => mesh.set_transform(transform),
            ReciprocalSolver::Direct(_) => {
                return Err(EwaldError::UnsupportedMode(
                    "spectral transforms are only used by the mesh method".into(),
                ))
            }
        }
        Ok(self)
    }

    pub fn parameters(&self) -> &SplitParameters {
        &self.parameters
    }

    pub fn real_space(&self) -> &RealSpaceEwald {
        &self.real_space
    }

    pub fn reciprocal(&self) -> &ReciprocalSolver {
        &self.reciprocal
    }

    /// Evaluate energies and accumulate forces and energy shares on a store without ghosts
    pub fn compute<P, E>(
        &mut self,
        particles: &mut P,
        cell: &SimulationBox,
        pairs: &E,
    ) -> Result<Energies>
    where
        P: ParticleStore + ?Sized,
        E: PairEnumeration + ?Sized,
    {
        self.compute_with(particles, cell, pairs, &mut SingleDomain)
    }

    /// Evaluate with ghost particles managed by `domain`.
    ///
    /// Forces and energy shares are written to the store's accumulators after
    /// zeroing them. Returned energies are summed over all ranks.
    pub fn compute_with<P, E, D>(
        &mut self,
        particles: &mut P,
        cell: &SimulationBox,
        pairs: &E,
        domain: &mut D,
    ) -> Result<Energies>
    where
        P: ParticleStore + ?Sized,
        E: PairEnumeration + ?Sized,
        D: DomainDecomposition<P> + ?Sized,
    {
        let scale = self.parameters.energy_scale();
        let num_local = particles.num_local();

        domain.exchange_ghosts(particles, self.parameters.r_max)?;
        particles.reset_accumulators();

        let real = self
            .real_space
            .compute(&*particles, cell, pairs)
            .map(|mut real| {
                real.scale(scale);
                real.apply_to(&mut *particles);
                real
            });
        // ghosts go back to their owners even when the pair sum failed
        let scattered = domain.scatter_ghosts(particles);
        let real = real?;
        scattered?;
        if particles.num_total() != num_local {
            return Err(EwaldError::InvariantViolation {
                expected: num_local,
                found: particles.num_total(),
            });
        }

        let (reciprocal_energy, mut reciprocal) =
            self.reciprocal
                .compute(&*particles, cell, self.communicator.as_ref())?;
        reciprocal.scale(scale);
        reciprocal.apply_to(particles);

        let mut self_term = self_energy(&*particles, self.parameters.alpha);
        self_term.scale(scale);
        self_term.apply_to(particles);

        let mut partial = [real.energy(), self_term.energy()];
        self.communicator.all_reduce_sum(&mut partial)?;

        let energies = Energies {
            real: partial[0],
            reciprocal: reciprocal_energy * scale,
            self_energy: partial[1],
            dipole: 0.0,
        };
        log::debug!(
            "Ewald energies: real {:.6e}, reciprocal {:.6e}, self {:.6e}, total {:.6e}",
            energies.real,
            energies.reciprocal,
            energies.self_energy,
            energies.total()
        );
        Ok(energies)
    }
}
