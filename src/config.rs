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

//! # User configuration
//!
//! [`EwaldConfig`] collects everything needed to set up an [`EwaldSolver`] and can be
//! read from e.g. YAML when the `serde` feature is enabled:
//!
//! ~~~yaml
//! accuracy: 1.0e-5
//! method: mesh
//! permittivity: 80.0
//! ~~~
//!
//! Either give a target `accuracy` and let the [`Tuner`] pick α and the cutoffs,
//! or give `alpha` and `cutoff` explicitly.

use crate::{
    cell::SimulationBox, neighbors::PairConvention, solver::EwaldSolver, tuner::SplitParameters,
    tuner::Tuner, EwaldError,
};
use anyhow::Context;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reciprocal-space method
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Method {
    /// Explicit sum over wave vectors
    Direct,
    /// Smooth particle mesh Ewald
    #[default]
    Mesh,
}

/// Settings for an Ewald calculation
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct EwaldConfig {
    /// Target relative accuracy used for tuning
    pub accuracy: f64,
    /// Screening parameter; requires `cutoff`
    pub alpha: Option<f64>,
    /// Real-space cutoff; requires `alpha`
    pub cutoff: Option<f64>,
    /// Reciprocal cutoff wavenumber
    pub k_max: Option<f64>,
    /// Mesh points per axis
    pub mesh_width: Option<usize>,
    /// Relative permittivity of the medium
    pub permittivity: f64,
    /// Energy prefactor, e.g. [`crate::ELECTRIC_PREFACTOR`]
    pub prefactor: f64,
    pub method: Method,
    /// Relative cost of reciprocal versus real-space terms used for tuning
    pub execution_time_ratio: f64,
    pub neighbor_convention: PairConvention,
    /// Surface dipole correction; not implemented
    pub dipole_correction: bool,
}

impl Default for EwaldConfig {
    fn default() -> Self {
        Self {
            accuracy: 1e-5,
            alpha: None,
            cutoff: None,
            k_max: None,
            mesh_width: None,
            permittivity: 1.0,
            prefactor: 1.0,
            method: Method::default(),
            execution_time_ratio: Tuner::default().execution_time_ratio,
            neighbor_convention: PairConvention::default(),
            dipole_correction: false,
        }
    }
}

impl EwaldConfig {
    /// Reject modes that are not implemented
    fn check_modes(&self) -> Result<(), EwaldError> {
        if self.dipole_correction {
            return Err(EwaldError::UnsupportedMode(
                "surface dipole correction".into(),
            ));
        }
        if self.neighbor_convention == PairConvention::Full {
            return Err(EwaldError::UnsupportedMode(
                "full neighbor lists; use a half list".into(),
            ));
        }
        Ok(())
    }

    /// Resolve split parameters for `num_particles` in `cell`
    pub fn split_parameters(
        &self,
        num_particles: usize,
        cell: &SimulationBox,
    ) -> anyhow::Result<SplitParameters> {
        self.check_modes()?;
        let params = match (self.alpha, self.cutoff) {
            (Some(alpha), Some(cutoff)) => SplitParameters::new(alpha, cutoff, cell)
                .context("Invalid explicit Ewald parameters")?,
            (None, None) => Tuner::new(self.execution_time_ratio)
                .tune(self.accuracy, num_particles, cell)
                .context("Failed to tune Ewald parameters")?,
            _ => {
                return Err(
                    EwaldError::configuration("alpha and cutoff must be given together").into(),
                )
            }
        };
        let mut params = params
            .with_permittivity(self.permittivity)
            .with_prefactor(self.prefactor);
        if let Some(k_max) = self.k_max {
            params = params.with_k_max(k_max);
        }
        if let Some(mesh_width) = self.mesh_width {
            params = params.with_mesh_width(mesh_width);
        }
        params.validate().context("Invalid Ewald parameters")?;
        Ok(params)
    }

    /// Set up a solver for `num_particles` in `cell`
    pub fn build(&self, num_particles: usize, cell: &SimulationBox) -> anyhow::Result<EwaldSolver> {
        let params = self.split_parameters(num_particles, cell)?;
        EwaldSolver::new(params, self.method, cell).context("Failed to set up Ewald solver")
    }
}
