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

//! # Smooth particle mesh Ewald
//!
//! Charges are spread onto a cubic mesh of M³ points with fourth-order B-splines,
//! the mesh is convolved with the influence function
//!
//! C(**m**) = |b(m<sub>x</sub>)|² |b(m<sub>y</sub>)|² |b(m<sub>z</sub>)|² exp(-π²m²/α²) / (πVm²)
//!
//! in Fourier space, and forces are interpolated back from the resulting mesh
//! potential using the analytical spline derivatives. See
//! Essmann et al., <https://doi.org/10.1063/1.470117>.

use super::bspline::{euler_factor, Stencil};
use crate::{
    cell::SimulationBox,
    comm::Communicator,
    fft::{RustFftTransform, SpectralTransform},
    parallel::sum_buffers,
    particles::{Accumulators, ParticleStore},
    Complex, EwaldError, Result, Vector3,
};
use itertools::iproduct;
use rayon::prelude::*;
use std::f64::consts::PI;

/// Cached influence function for one (α, L, M)
#[derive(Clone, Debug, PartialEq)]
struct Influence {
    length: f64,
    values: Vec<f64>,
}

impl Influence {
    fn new(alpha: f64, length: f64, width: usize) -> Self {
        let volume = length.powi(3);
        let euler: Vec<f64> = (0..width).map(|k| euler_factor(k, width)).collect();
        let alias = |k: usize| {
            if k > width / 2 {
                k as f64 - width as f64
            } else {
                k as f64
            }
        };
        let values = iproduct!(0..width, 0..width, 0..width)
            .map(|(kz, ky, kx)| {
                if (kx, ky, kz) == (0, 0, 0) {
                    return 0.0;
                }
                let m2 =
                    (alias(kx).powi(2) + alias(ky).powi(2) + alias(kz).powi(2)) / length.powi(2);
                euler[kx] * euler[ky] * euler[kz] * f64::exp(-PI * PI * m2 / (alpha * alpha))
                    / (PI * volume * m2)
            })
            .collect();
        Self { length, values }
    }
}

/// Charge assignment stencils along x, y and z for one particle
struct ParticleStencil([Stencil; 3]);

impl ParticleStencil {
    fn new(position: &Vector3, cell: &SimulationBox, spacing: f64, width: usize) -> Self {
        let u = cell.wrap(position) / spacing;
        Self([
            Stencil::new(u.x, width),
            Stencil::new(u.y, width),
            Stencil::new(u.z, width),
        ])
    }

    /// Mesh index, W(tx) W(ty) W(tz) and the gradient of the weight product in mesh units
    fn points(&self, width: usize) -> impl Iterator<Item = (usize, f64, Vector3)> + '_ {
        let [x, y, z] = &self.0;
        iproduct!(0..4, 0..4, 0..4).map(move |(c, b, a)| {
            let index = (z.indices[c] * width + y.indices[b]) * width + x.indices[a];
            let (wx, wy, wz) = (x.weights[a], y.weights[b], z.weights[c]);
            let gradient = Vector3::new(
                x.derivatives[a] * wy * wz,
                wx * y.derivatives[b] * wz,
                wx * wy * z.derivatives[c],
            );
            (index, wx * wy * wz, gradient)
        })
    }
}

/// Smooth particle mesh Ewald reciprocal solver for cubic boxes
#[derive(Clone, Debug)]
pub struct MeshEwald {
    alpha: f64,
    /// Mesh points per axis, M
    width: usize,
    transform: Box<dyn SpectralTransform>,
    influence: Option<Influence>,
}

impl MeshEwald {
    /// Mesh solver using the `rustfft` backend
    pub fn new(alpha: f64, width: usize) -> Result<Self> {
        if width < super::bspline::ORDER {
            return Err(EwaldError::configuration(format!(
                "mesh width {width} is smaller than the spline order"
            )));
        }
        Ok(Self {
            alpha,
            width,
            transform: Box::new(RustFftTransform::new()),
            influence: None,
        })
    }

    /// Replace the spectral transform backend
    pub fn with_transform(mut self, transform: Box<dyn SpectralTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn set_transform(&mut self, transform: Box<dyn SpectralTransform>) {
        self.transform = transform;
    }

    pub fn mesh_width(&self) -> usize {
        self.width
    }

    fn influence(&mut self, length: f64) -> &Influence {
        if self.influence.as_ref().is_some_and(|c| c.length != length) {
            self.influence = None;
        }
        let (alpha, width) = (self.alpha, self.width);
        self.influence.get_or_insert_with(|| {
            log::debug!("Computing influence function on a {width}³ mesh");
            Influence::new(alpha, length, width)
        })
    }

    /// Charge density on the mesh from the local particles
    fn spread(&self, positions: &[Vector3], charges: &[f64], cell: &SimulationBox) -> Vec<f64> {
        let width = self.width;
        let spacing = cell.max_length() / width as f64;
        (0..positions.len())
            .into_par_iter()
            .fold(
                || vec![0.0; width.pow(3)],
                |mut mesh, i| {
                    let stencil = ParticleStencil::new(&positions[i], cell, spacing, width);
                    for (index, weight, _) in stencil.points(width) {
                        mesh[index] += charges[i] * weight;
                    }
                    mesh
                },
            )
            .reduce(|| vec![0.0; width.pow(3)], sum_buffers)
    }

    /// Reciprocal energy and per-particle forces and energy shares of local particles.
    ///
    /// The charge mesh is summed over all ranks before the transform, so the
    /// returned energy is global.
    pub fn compute<P: ParticleStore + ?Sized>(
        &mut self,
        particles: &P,
        cell: &SimulationBox,
        communicator: &dyn Communicator,
    ) -> Result<(f64, Accumulators)> {
        let length = cell.cubic_length("smooth particle mesh Ewald")?;
        let width = self.width;
        let spacing = length / width as f64;
        let num_local = particles.num_local();
        let positions = particles.positions(num_local);
        let charges = particles.charges(num_local);

        let mut density = self.spread(&positions, &charges, cell);
        communicator.all_reduce_sum(&mut density)?;
        log::trace!("Spread {num_local} charges onto {width}³ mesh");

        let mut mesh: Vec<Complex> = density.iter().map(|&q| Complex::new(q, 0.0)).collect();
        self.transform.forward(&mut mesh, width)?;

        let influence = &self.influence(length).values;
        let energy = 0.5
            * mesh
                .par_iter()
                .zip(influence.par_iter())
                .map(|(amplitude, c)| c * amplitude.norm_sqr())
                .sum::<f64>();
        mesh.par_iter_mut()
            .zip(influence.par_iter())
            .for_each(|(amplitude, c)| *amplitude *= *c);

        self.transform.inverse(&mut mesh, width)?;
        let potential: Vec<f64> = mesh.iter().map(|value| value.re).collect();

        let (forces, potentials) = (0..num_local)
            .into_par_iter()
            .map(|i| {
                let stencil = ParticleStencil::new(&positions[i], cell, spacing, width);
                let (gradient, phi) = stencil.points(width).fold(
                    (Vector3::zeros(), 0.0),
                    |(gradient, phi), (index, weight, weight_gradient)| {
                        (
                            gradient + weight_gradient * potential[index],
                            phi + weight * potential[index],
                        )
                    },
                );
                (-gradient * (charges[i] / spacing), 0.5 * charges[i] * phi)
            })
            .unzip();

        Ok((energy, Accumulators { forces, potentials }))
    }
}

impl crate::Info for MeshEwald {
    fn short_name(&self) -> Option<&'static str> {
        Some("spme")
    }
    fn long_name(&self) -> Option<&'static str> {
        Some("Smooth particle mesh Ewald")
    }
    fn citation(&self) -> Option<&'static str> {
        Some("doi:10.1063/1.470117")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        comm::SingleProcess,
        particles::{Particle, Particles},
        reciprocal::direct::DirectEwald,
    };
    use approx::assert_relative_eq;

    fn dipole() -> Particles {
        Particles::from_iter([
            Particle::new(Vector3::new(3.1, 4.2, 5.3), 1.0),
            Particle::new(Vector3::new(5.6, 3.7, 6.4), -1.0),
        ])
    }

    #[test]
    fn test_influence_function() {
        let influence = Influence::new(0.5, 10.0, 8);
        assert_eq!(influence.values.len(), 512);
        assert_eq!(influence.values[0], 0.0);
        // C(k) = C(-k) through aliasing: index 1 and 7 along x
        assert_relative_eq!(influence.values[1], influence.values[7], epsilon = 1e-15);
        assert!(influence.values.iter().all(|c| *c >= 0.0));
    }

    #[test]
    fn test_charge_is_conserved_on_mesh() {
        let cell = SimulationBox::cube(10.0);
        let mesh = MeshEwald::new(0.5, 8).unwrap();
        let positions = [Vector3::new(9.99, 0.01, 5.0), Vector3::new(-1.0, 4.0, 12.0)];
        let density = mesh.spread(&positions, &[1.5, -0.5], &cell);
        assert_relative_eq!(density.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_energy_matches_direct_sum() {
        let cell = SimulationBox::cube(10.0);
        let particles = dipole();
        let (direct, _) = DirectEwald::new(0.5, 6.0)
            .compute(&particles, &cell, &SingleProcess)
            .unwrap();
        let (energy, acc) = MeshEwald::new(0.5, 32)
            .unwrap()
            .compute(&particles, &cell, &SingleProcess)
            .unwrap();
        assert_relative_eq!(energy, direct, max_relative = 1e-3);
        assert_relative_eq!(acc.energy(), energy, max_relative = 1e-10);
    }

    #[test]
    fn test_non_cubic_box() {
        let cell = SimulationBox::new(10.0, 10.0, 11.0).unwrap();
        assert!(matches!(
            MeshEwald::new(0.5, 8)
                .unwrap()
                .compute(&dipole(), &cell, &SingleProcess),
            Err(EwaldError::Configuration(_))
        ));
        assert!(MeshEwald::new(0.5, 2).is_err());
    }
}
