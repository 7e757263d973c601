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

//! # Direct reciprocal-space Ewald sum
//!
//! The structure factor S(**k**) = Σ q<sub>j</sub> exp(i**k**·**r**<sub>j</sub>) is
//! tabulated for all wave vectors **k** = 2π(k<sub>x</sub>/L<sub>x</sub>,
//! k<sub>y</sub>/L<sub>y</sub>, k<sub>z</sub>/L<sub>z</sub>) with integer indices
//! in \[-k, k\]³, excluding the origin. With
//! A(k) = 4π/V exp(-k²/4α²)/k² the energy is ½ Σ A |S|².

use crate::{
    cell::SimulationBox, comm::Communicator, parallel::sum_buffers, particles::Accumulators,
    particles::ParticleStore, Complex, Result, Vector3,
};
use itertools::iproduct;
use rayon::prelude::*;
use std::f64::consts::{PI, TAU};

/// Wave vector with its table index and energy coefficient A(k)
#[derive(Clone, Debug, PartialEq)]
struct WaveVector {
    /// Offset indices, k + (kx, ky, kz)
    offsets: [usize; 3],
    /// Index into the structure factor table
    index: usize,
    k: Vector3,
    coefficient: f64,
}

/// Wave vectors for one box and α
#[derive(Clone, Debug, PartialEq)]
struct WaveVectors {
    lengths: Vector3,
    max_index: usize,
    vectors: Vec<WaveVector>,
}

impl WaveVectors {
    fn new(cell: &SimulationBox, alpha: f64, max_index: usize) -> Self {
        let lengths = *cell.lengths();
        let k = max_index as i64;
        let width = 2 * max_index + 1;
        let volume = cell.volume();
        let vectors = iproduct!(-k..=k, -k..=k, -k..=k)
            .filter(|&index| index != (0, 0, 0))
            .map(|(kz, ky, kx)| {
                let offsets = [(kx + k) as usize, (ky + k) as usize, (kz + k) as usize];
                let wave = Vector3::new(
                    TAU * kx as f64 / lengths.x,
                    TAU * ky as f64 / lengths.y,
                    TAU * kz as f64 / lengths.z,
                );
                let k2 = wave.norm_squared();
                WaveVector {
                    offsets,
                    index: (offsets[2] * width + offsets[1]) * width + offsets[0],
                    k: wave,
                    coefficient: 4.0 * PI / volume * f64::exp(-k2 / (4.0 * alpha * alpha)) / k2,
                }
            })
            .collect();
        Self {
            lengths,
            max_index,
            vectors,
        }
    }

    /// Table entries: one cosine and one sine sum per index in \[-k, k\]³
    fn table_len(&self) -> usize {
        2 * (2 * self.max_index + 1).pow(3)
    }
}

/// exp(i n 2π x / L) for n in -k..=k along each axis
struct Phases {
    axes: [Vec<Complex>; 3],
}

impl Phases {
    fn new(position: &Vector3, lengths: &Vector3, max_index: usize) -> Self {
        let axis = |x: f64, l: f64| {
            let step = Complex::from_polar(1.0, TAU * x / l);
            let mut phases = vec![Complex::new(1.0, 0.0); 2 * max_index + 1];
            for n in 1..=max_index {
                phases[max_index + n] = phases[max_index + n - 1] * step;
                phases[max_index - n] = phases[max_index + n].conj();
            }
            phases
        };
        Self {
            axes: [
                axis(position.x, lengths.x),
                axis(position.y, lengths.y),
                axis(position.z, lengths.z),
            ],
        }
    }

    /// exp(i**k**·**r**) as (cos, sin)
    #[inline]
    fn get(&self, offsets: &[usize; 3]) -> Complex {
        self.axes[0][offsets[0]] * self.axes[1][offsets[1]] * self.axes[2][offsets[2]]
    }
}

/// Ewald reciprocal sum over explicit wave vectors
#[derive(Clone, Debug, PartialEq)]
pub struct DirectEwald {
    alpha: f64,
    /// Cutoff wavenumber
    k_max: f64,
    /// Reused while the box is unchanged
    waves: Option<WaveVectors>,
}

impl DirectEwald {
    pub fn new(alpha: f64, k_max: f64) -> Self {
        Self {
            alpha,
            k_max,
            waves: None,
        }
    }

    /// Number of wave indices per axis for `cell`: ⌈k<sub>max</sub> L<sub>max</sub> / 2π⌉ + 1
    pub fn max_index(&self, cell: &SimulationBox) -> usize {
        (self.k_max * cell.max_length() / TAU).ceil() as usize + 1
    }

    fn wave_vectors(&mut self, cell: &SimulationBox) -> &WaveVectors {
        let max_index = self.max_index(cell);
        let stale = self
            .waves
            .as_ref()
            .map_or(true, |w| w.lengths != *cell.lengths() || w.max_index != max_index);
        if stale {
            log::debug!(
                "Building {} wave vectors for box {:?}",
                (2 * max_index + 1).pow(3) - 1,
                cell.lengths().as_slice()
            );
            self.waves = None;
        }
        let alpha = self.alpha;
        self.waves
            .get_or_insert_with(|| WaveVectors::new(cell, alpha, max_index))
    }

    /// Reciprocal energy and per-particle forces and energy shares of local particles.
    ///
    /// The structure factor table is summed over all ranks before use, so the
    /// returned energy is global.
    pub fn compute<P: ParticleStore + ?Sized>(
        &mut self,
        particles: &P,
        cell: &SimulationBox,
        communicator: &dyn Communicator,
    ) -> Result<(f64, Accumulators)> {
        let num_local = particles.num_local();
        let positions = particles.positions(num_local);
        let charges = particles.charges(num_local);
        let waves = self.wave_vectors(cell);
        let max_index = waves.max_index;
        let lengths = waves.lengths;
        let table_len = waves.table_len();

        let mut table = (0..num_local)
            .into_par_iter()
            .fold(
                || vec![0.0; table_len],
                |mut table, i| {
                    let phases = Phases::new(&positions[i], &lengths, max_index);
                    for wave in &waves.vectors {
                        let phase = phases.get(&wave.offsets) * charges[i];
                        table[2 * wave.index] += phase.re;
                        table[2 * wave.index + 1] += phase.im;
                    }
                    table
                },
            )
            .reduce(|| vec![0.0; table_len], sum_buffers);

        communicator.all_reduce_sum(&mut table)?;

        let energy = 0.5
            * waves
                .vectors
                .iter()
                .map(|w| {
                    w.coefficient * (table[2 * w.index].powi(2) + table[2 * w.index + 1].powi(2))
                })
                .sum::<f64>();

        let (forces, potentials) = (0..num_local)
            .into_par_iter()
            .map(|i| {
                let phases = Phases::new(&positions[i], &lengths, max_index);
                let mut force = Vector3::zeros();
                let mut potential = 0.0;
                for wave in &waves.vectors {
                    let phase = phases.get(&wave.offsets);
                    let (s_cos, s_sin) = (table[2 * wave.index], table[2 * wave.index + 1]);
                    force += wave.k * (wave.coefficient * (s_cos * phase.im - s_sin * phase.re));
                    potential += wave.coefficient * (s_cos * phase.re + s_sin * phase.im);
                }
                (force * charges[i], 0.5 * charges[i] * potential)
            })
            .unzip();

        Ok((energy, Accumulators { forces, potentials }))
    }
}

impl crate::Info for DirectEwald {
    fn short_name(&self) -> Option<&'static str> {
        Some("ewald-direct")
    }
    fn long_name(&self) -> Option<&'static str> {
        Some("Ewald summation over explicit wave vectors")
    }
    fn citation(&self) -> Option<&'static str> {
        Some("doi:10.1002/andp.19213690304")
    }
}
