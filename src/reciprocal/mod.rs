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

//! # Reciprocal-space Ewald sum
//!
//! The smooth, long-ranged part of the Ewald split is evaluated in Fourier space,
//! either over explicit wave vectors ([`DirectEwald`], O(N K)) or on a mesh with
//! fast Fourier transforms ([`MeshEwald`], O(N + M³ log M)).

pub mod bspline;
mod direct;
mod spme;

pub use direct::DirectEwald;
pub use spme::MeshEwald;

use crate::{
    cell::SimulationBox, comm::Communicator, particles::Accumulators, particles::ParticleStore,
    Info, Result,
};

/// Reciprocal-space solver variant, chosen at construction
#[derive(Clone, Debug)]
pub enum ReciprocalSolver {
    Direct(DirectEwald),
    Mesh(MeshEwald),
}

impl ReciprocalSolver {
    /// Global reciprocal energy plus forces and energy shares for the local particles.
    ///
    /// Energies are in units of charge² / length, without prefactor.
    pub fn compute<P: ParticleStore + ?Sized>(
        &mut self,
        particles: &P,
        cell: &SimulationBox,
        communicator: &dyn Communicator,
    ) -> Result<(f64, Accumulators)> {
        match self {
            Self::Direct(direct) => direct.compute(particles, cell, communicator),
            Self::Mesh(mesh) => mesh.compute(particles, cell, communicator),
        }
    }

    fn info(&self) -> &dyn Info {
        match self {
            Self::Direct(direct) => direct,
            Self::Mesh(mesh) => mesh,
        }
    }
}

impl Info for ReciprocalSolver {
    fn short_name(&self) -> Option<&'static str> {
        self.info().short_name()
    }
    fn long_name(&self) -> Option<&'static str> {
        self.info().long_name()
    }
    fn citation(&self) -> Option<&'static str> {
        self.info().citation()
    }
}
