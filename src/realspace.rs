// Copyright 2023 Björn Stenqvist and Mikael Lund
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

//! # Real-space Ewald sum
//!
//! Screened Coulomb interactions, q<sub>i</sub>q<sub>j</sub> erfc(α r) / r, between
//! all pairs (and periodic images) closer than the real-space cutoff.
//! In terms of the reduced distance q = r / r<sub>c</sub> and η = α r<sub>c</sub>
//! the short-range function is S(q) = erfc(η q).

use crate::{
    cell::SimulationBox,
    neighbors::{PairConvention, PairEnumeration},
    particles::{Accumulators, ParticleStore},
    EwaldError, Result, Vector3, SQRT_PI,
};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

/// Pair distances below this are treated as coincident particles
pub const DEGENERACY_DISTANCE: f64 = 1e-10;

/// Scheme for real-space Ewald interactions
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct RealSpaceEwald {
    /// Real space cutoff distance
    cutoff: f64,
    alpha: f64,
    /// alpha * cutoff
    eta: f64,
}

impl RealSpaceEwald {
    /// Construct a new Ewald scheme with given cutoff and alpha.
    pub fn new(cutoff: f64, alpha: f64) -> Self {
        Self {
            cutoff,
            alpha,
            eta: alpha * cutoff,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Short-range function, S(q) = erfc(η q)
    #[inline]
    pub fn short_range_f0(&self, q: f64) -> f64 {
        erfc(self.eta * q)
    }

    /// First derivative with respect to q, S'(q) = -2η/√π exp(-η²q²)
    #[inline]
    pub fn short_range_f1(&self, q: f64) -> f64 {
        -2.0 * self.eta / SQRT_PI * f64::exp(-self.eta.powi(2) * q.powi(2))
    }

    /// Pair energy, z₁z₂ S(q) / r
    #[inline]
    pub fn pair_energy(&self, charge_product: f64, distance: f64) -> f64 {
        charge_product / distance * self.short_range_f0(distance / self.cutoff)
    }

    /// Force on the particle at `distance = r_i - r_j` from a partner,
    /// z₁z₂ r / r³ (S(q) - qS'(q)).
    #[inline]
    pub fn pair_force(&self, charge_product: f64, distance: &Vector3) -> Vector3 {
        let r = distance.norm();
        let q = r / self.cutoff;
        let screening = self.short_range_f0(q) - q * self.short_range_f1(q);
        distance * (charge_product / r.powi(3) * screening)
    }

    /// Forces and potential energy shares from all pairs within the cutoff.
    ///
    /// Only local particles `0..num_local()` start an enumeration, but partners
    /// may be ghosts, so the returned buffers cover `num_total()` particles.
    /// Energies are in units of charge² / length, without prefactor.
    pub fn compute<P, E>(
        &self,
        particles: &P,
        cell: &SimulationBox,
        pairs: &E,
    ) -> Result<Accumulators>
    where
        P: ParticleStore + ?Sized,
        E: PairEnumeration + ?Sized,
    {
        if pairs.convention() == PairConvention::Full {
            return Err(EwaldError::UnsupportedMode(
                "full neighbor lists; the real-space sum needs each pair listed once".into(),
            ));
        }
        let num_local = particles.num_local();
        let num_total = particles.num_total();
        pairs.check(cell, self.cutoff, num_local, num_total)?;

        let positions = particles.positions(num_total);
        let charges = particles.charges(num_total);
        let cutoff_squared = self.cutoff * self.cutoff;

        // thread-local buffers span ghosts too; merged once all pairs are visited
        let accumulators = (0..num_local)
            .into_par_iter()
            .try_fold(
                || Accumulators::zeros(num_total),
                |mut acc: Accumulators, i| -> Result<Accumulators> {
                    let mut visit = |j: usize, distance: Vector3, weight: f64| {
                        let distance_squared = distance.norm_squared();
                        if distance_squared > cutoff_squared {
                            return Ok(());
                        }
                        if distance_squared < DEGENERACY_DISTANCE.powi(2) {
                            if i == j {
                                return Ok(());
                            }
                            return Err(EwaldError::NumericalDegeneracy { i, j });
                        }
                        let charge_product = charges[i] * charges[j];
                        let energy =
                            weight * self.pair_energy(charge_product, distance_squared.sqrt());
                        let force = self.pair_force(charge_product, &distance) * weight;
                        acc.potentials[i] += 0.5 * energy;
                        acc.potentials[j] += 0.5 * energy;
                        acc.forces[i] += force;
                        acc.forces[j] -= force;
                        Ok(())
                    };
                    pairs.visit_pairs(i, &positions, cell, self.cutoff, &mut visit)?;
                    Ok(acc)
                },
            )
            .try_reduce(|| Accumulators::zeros(num_total), |a, b| Ok(a.merge(b)))?;

        log::trace!(
            "Real-space energy {:.6e} from {num_local} local particles",
            accumulators.energy()
        );
        Ok(accumulators)
    }
}

impl crate::Info for RealSpaceEwald {
    fn citation(&self) -> Option<&'static str> {
        Some("doi:10.1002/andp.19213690304")
    }
    fn short_name(&self) -> Option<&'static str> {
        Some("ewald")
    }
    fn long_name(&self) -> Option<&'static str> {
        Some("Real-space Ewald summation")
    }
}

impl crate::Cutoff for RealSpaceEwald {
    #[inline]
    fn cutoff(&self) -> f64 {
        self.cutoff
    }
}
