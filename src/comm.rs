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

//! # Distributed memory collaborators
//!
//! Interfaces to message passing and spatial decomposition. The solvers only need
//! a blocking sum over a fixed size buffer and a ghost exchange around the
//! real-space phase. Single process implementations are provided.

use crate::{particles::ParticleStore, Result};
use dyn_clone::DynClone;

/// Global reduction across distributed ranks
pub trait Communicator: DynClone + Send + Sync + std::fmt::Debug {
    /// In-place sum of `buffer` over all ranks.
    ///
    /// Blocks until every rank has contributed. A failure aborts the evaluation.
    fn all_reduce_sum(&self, buffer: &mut [f64]) -> Result<()>;
}

dyn_clone::clone_trait_object!(Communicator);

/// Communicator for a single process; reductions are no-ops
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn all_reduce_sum(&self, _buffer: &mut [f64]) -> Result<()> {
        Ok(())
    }
}

/// Spatial domain decomposition
///
/// Before the real-space phase, ghost copies of particles near sub-domain borders
/// are appended to the store so that every pair within the cutoff is visible
/// locally. Afterwards, forces and potentials accumulated on ghosts are sent back
/// to their owners and the ghosts removed, restoring `num_total() == num_local()`.
pub trait DomainDecomposition<P: ParticleStore + ?Sized> {
    /// Append ghost particles within `cutoff` of the sub-domain borders
    fn exchange_ghosts(&mut self, particles: &mut P, cutoff: f64) -> Result<()>;

    /// Return ghost contributions to their owners and drop the ghosts
    fn scatter_ghosts(&mut self, particles: &mut P) -> Result<()>;
}

/// Decomposition with a single domain holding all particles and no ghosts
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleDomain;

impl<P: ParticleStore + ?Sized> DomainDecomposition<P> for SingleDomain {
    fn exchange_ghosts(&mut self, _particles: &mut P, _cutoff: f64) -> Result<()> {
        Ok(())
    }
    fn scatter_ghosts(&mut self, _particles: &mut P) -> Result<()> {
        Ok(())
    }
}
