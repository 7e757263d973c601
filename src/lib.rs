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

//! # Longrange
//!
//! Long-range electrostatics for periodic systems of point charges using
//! Ewald summation. The conditionally convergent lattice sum is split into
//!
//! - a short-ranged, erfc-screened real-space part ([`realspace`]),
//! - a smooth reciprocal-space part, evaluated either by an explicit
//!   structure factor sum or by smooth particle mesh Ewald ([`reciprocal`]),
//! - and a self-energy correction,
//!
//! which are assembled by the [`EwaldSolver`].
//!
//! ## Examples
//! ~~~
//! use longrange::*;
//! let cell = SimulationBox::cube(10.0);
//! let mut particles = Particles::from_iter([
//!     Particle::new(Vector3::new(4.5, 5.0, 5.0), 1.0),
//!     Particle::new(Vector3::new(5.5, 5.0, 5.0), -1.0),
//! ]);
//! let params = Tuner::default().tune(1e-6, particles.len(), &cell).unwrap();
//! let mut solver = EwaldSolver::new(params, Method::Direct, &cell).unwrap();
//! let energies = solver.compute(&mut particles, &cell, &PeriodicImages).unwrap();
//! assert!(energies.total() < 0.0);
//! assert!(particles[0].force.x > 0.0); // pulled towards the negative charge
//! ~~~

#[cfg(test)]
extern crate approx;

/// A point in 3D space
pub type Vector3 = nalgebra::Vector3<f64>;
/// Complex number used for structure factors and spectral amplitudes
pub type Complex = num::Complex<f64>;

pub mod cell;
pub mod comm;
pub mod config;
mod error;
pub mod fft;
pub mod neighbors;
pub mod parallel;
pub mod particles;
pub mod realspace;
pub mod reciprocal;
pub mod solver;
pub mod tuner;

pub use cell::SimulationBox;
pub use comm::{Communicator, DomainDecomposition, SingleDomain, SingleProcess};
pub use config::{EwaldConfig, Method};
pub use error::{EwaldError, Result};
pub use fft::{RustFftTransform, SpectralTransform};
pub use neighbors::{HalfNeighborList, PairConvention, PairEnumeration, PeriodicImages};
pub use particles::{Accumulators, Particle, ParticleStore, Particles};
pub use realspace::RealSpaceEwald;
pub use reciprocal::ReciprocalSolver;
pub use solver::{Energies, EwaldSolver};
pub use tuner::{SplitParameters, Tuner};

use physical_constants::{AVOGADRO_CONSTANT, ELEMENTARY_CHARGE, VACUUM_ELECTRIC_PERMITTIVITY};
use std::f64::consts::PI;

/// Square root of pi
pub(crate) const SQRT_PI: f64 = 1.7724538509055159;

/// Electrostatic prefactor, e²/4πε₀ × 10⁷ × NA (Å × kJ / mol).
///
/// Energies computed by this crate are in units of (input charge)² / (input length)
/// times the prefactor set in [`SplitParameters`]. Use this constant as prefactor to
/// get energies in kJ/mol when charges are in units of the elementary charge and
/// lengths are in ångström.
///
/// Examples:
/// ```
/// use longrange::ELECTRIC_PREFACTOR;
/// let z1 = 1.0;                    // unit-less charge number
/// let z2 = -1.0;                   // unit-less charge number
/// let r = 7.0;                     // separation in angstrom
/// let rel_dielectric_const = 80.0; // relative dielectric constant
/// let energy = ELECTRIC_PREFACTOR * z1 * z2 / (rel_dielectric_const * r);
/// assert_eq!(energy, -2.48099031507825); // in kJ/mol
/// ```
pub const ELECTRIC_PREFACTOR: f64 =
    ELEMENTARY_CHARGE * ELEMENTARY_CHARGE * 1.0e10 * AVOGADRO_CONSTANT * 1e-3
        / (4.0 * PI * VACUUM_ELECTRIC_PERMITTIVITY);

/// Defines a cutoff distance
pub trait Cutoff {
    /// Squared cutoff distance
    fn cutoff_squared(&self) -> f64 {
        self.cutoff().powi(2)
    }

    /// Cutoff distance
    fn cutoff(&self) -> f64;
}

/// Descriptive information about a method
pub trait Info {
    /// Short, lowercase name
    fn short_name(&self) -> Option<&'static str> {
        None
    }
    /// Long, human readable name
    fn long_name(&self) -> Option<&'static str> {
        None
    }
    /// Literature reference, e.g. a DOI
    fn citation(&self) -> Option<&'static str> {
        None
    }
}
