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

//! # Ewald split parameters
//!
//! The screening parameter α balances the work between real and reciprocal space.
//! For a target relative accuracy ε, with p = -ln ε, the optimum for N particles in
//! a cubic box of side L is (Fincham, <https://doi.org/10.1080/08927029408022180>)
//!
//! α = c √(p/π) N<sup>1/6</sup> / L,
//! r<sub>max</sub> = √p / α,
//! k<sub>max</sub> = 2α√p,
//!
//! where c is the relative cost of a reciprocal versus a real-space term.

use crate::{cell::SimulationBox, EwaldError, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Smallest mesh width that leaves room for a fourth-order B-spline stencil
pub const MIN_MESH_WIDTH: usize = 8;

/// Parameters splitting the Coulomb sum into real and reciprocal space
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct SplitParameters {
    /// Screening parameter, α (inverse length)
    pub alpha: f64,
    /// Real-space cutoff distance
    pub r_max: f64,
    /// Reciprocal space cutoff wavenumber, 2π/λ (inverse length)
    pub k_max: f64,
    /// Mesh points per axis for smooth particle mesh Ewald
    pub mesh_width: usize,
    /// Relative permittivity, εᵣ
    pub permittivity: f64,
    /// Energy prefactor, e.g. [`crate::ELECTRIC_PREFACTOR`] for kJ/mol
    pub prefactor: f64,
}

impl SplitParameters {
    /// Explicit α and r<sub>max</sub>, skipping tuning.
    ///
    /// The reciprocal cutoff and mesh width follow from the same accuracy,
    /// p = (α r<sub>max</sub>)², that the real-space cutoff implies.
    pub fn new(alpha: f64, r_max: f64, cell: &SimulationBox) -> Result<Self> {
        let p = (alpha * r_max).powi(2);
        let k_max = 2.0 * alpha * p.sqrt();
        let params = Self {
            alpha,
            r_max,
            k_max,
            mesh_width: mesh_width_for(k_max, cell.max_length()),
            permittivity: 1.0,
            prefactor: 1.0,
        };
        params.validate()?;
        Ok(params)
    }

    /// Set the reciprocal space cutoff wavenumber
    pub fn with_k_max(mut self, k_max: f64) -> Self {
        self.k_max = k_max;
        self
    }

    /// Set the mesh width used by the mesh solver
    pub fn with_mesh_width(mut self, mesh_width: usize) -> Self {
        self.mesh_width = mesh_width;
        self
    }

    /// Set the relative permittivity of the medium
    pub fn with_permittivity(mut self, permittivity: f64) -> Self {
        self.permittivity = permittivity;
        self
    }

    /// Set the energy prefactor
    pub fn with_prefactor(mut self, prefactor: f64) -> Self {
        self.prefactor = prefactor;
        self
    }

    /// Factor multiplying all energies, forces and potentials: prefactor / εᵣ
    pub fn energy_scale(&self) -> f64 {
        self.prefactor / self.permittivity
    }

    /// Check that all parameters are usable
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("alpha", self.alpha),
            ("r_max", self.r_max),
            ("k_max", self.k_max),
            ("permittivity", self.permittivity),
        ];
        if let Some((name, value)) = positive
            .iter()
            .find(|(_, value)| !value.is_finite() || *value <= 0.0)
        {
            return Err(EwaldError::configuration(format!(
                "{name} must be positive and finite, got {value}"
            )));
        }
        if !self.prefactor.is_finite() {
            return Err(EwaldError::configuration("prefactor must be finite"));
        }
        if self.mesh_width < 4 {
            return Err(EwaldError::configuration(format!(
                "mesh width {} is smaller than the B-spline stencil",
                self.mesh_width
            )));
        }
        Ok(())
    }
}

/// Mesh width resolving wavenumbers up to `k_max`, rounded up to a power of two
fn mesh_width_for(k_max: f64, length: f64) -> usize {
    let width = (2.0 * k_max * length / PI).ceil() as usize;
    width.max(MIN_MESH_WIDTH).next_power_of_two()
}

/// Derives split parameters from a target accuracy
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Tuner {
    /// Relative cost of reciprocal versus real-space terms, c
    pub execution_time_ratio: f64,
}

impl Default for Tuner {
    fn default() -> Self {
        Self {
            execution_time_ratio: 2.0,
        }
    }
}

impl Tuner {
    pub fn new(execution_time_ratio: f64) -> Self {
        Self {
            execution_time_ratio,
        }
    }

    /// Split parameters for relative `accuracy` with `num_particles` in a cubic `cell`
    pub fn tune(
        &self,
        accuracy: f64,
        num_particles: usize,
        cell: &SimulationBox,
    ) -> Result<SplitParameters> {
        let length = cell.cubic_length("parameter tuning")?;
        if !(accuracy > 0.0 && accuracy < 1.0) {
            return Err(EwaldError::configuration(format!(
                "accuracy must be in (0, 1), got {accuracy}"
            )));
        }
        if num_particles == 0 {
            return Err(EwaldError::configuration(
                "cannot tune for an empty system",
            ));
        }
        if !(self.execution_time_ratio > 0.0) {
            return Err(EwaldError::configuration(format!(
                "execution time ratio must be positive, got {}",
                self.execution_time_ratio
            )));
        }
        let p = -accuracy.ln();
        let alpha = self.execution_time_ratio
            * (p / PI).sqrt()
            * (num_particles as f64).powf(1.0 / 6.0)
            / length;
        let r_max = p.sqrt() / alpha;
        let k_max = 2.0 * alpha * p.sqrt();
        let params = SplitParameters {
            alpha,
            r_max,
            k_max,
            mesh_width: mesh_width_for(k_max, length),
            permittivity: 1.0,
            prefactor: 1.0,
        };
        params.validate()?;
        log::info!(
            "Tuned Ewald parameters for ε = {accuracy:e}, N = {num_particles}, L = {length}: \
             α = {alpha:.4}, r_max = {r_max:.4}, k_max = {k_max:.4}, mesh = {}",
            params.mesh_width
        );
        Ok(params)
    }
}
