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

//! # Spectral transforms
//!
//! Three dimensional discrete Fourier transforms over a cubic grid of side `M`,
//! stored with x running fastest: `index = (z * M + y) * M + x`.
//! The mesh solver only talks to the [`SpectralTransform`] trait so that other
//! backends (GPU, distributed) can be plugged in at construction time.

use crate::{Complex, EwaldError, Result};
use dyn_clone::DynClone;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Forward and inverse 3D complex DFT over a cubic grid.
///
/// Conventions:
/// - forward: X(k) = Σ x(n) exp(-2πi k·n / M)
/// - inverse: x(n) = Σ X(k) exp(+2πi k·n / M), **not** normalized
pub trait SpectralTransform: DynClone + Send + Sync + std::fmt::Debug {
    /// In-place forward transform of `data` with `width³` elements
    fn forward(&mut self, data: &mut [Complex], width: usize) -> Result<()>;

    /// In-place unnormalized inverse transform of `data` with `width³` elements
    fn inverse(&mut self, data: &mut [Complex], width: usize) -> Result<()>;
}

dyn_clone::clone_trait_object!(SpectralTransform);

/// Planned 1D transforms for one grid width
#[derive(Clone)]
struct Plans {
    width: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

/// CPU backend using `rustfft`, applying 1D transforms along each axis in parallel
#[derive(Clone, Default)]
pub struct RustFftTransform {
    plans: Option<Plans>,
}

impl std::fmt::Debug for RustFftTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustFftTransform")
            .field("width", &self.plans.as_ref().map(|p| p.width))
            .finish()
    }
}

impl RustFftTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans for `width`, reusing the cached ones when the width is unchanged
    fn plans(&mut self, width: usize) -> Plans {
        match &self.plans {
            Some(plans) if plans.width == width => plans.clone(),
            _ => {
                let mut planner = FftPlanner::new();
                let plans = Plans {
                    width,
                    forward: planner.plan_fft_forward(width),
                    inverse: planner.plan_fft_inverse(width),
                };
                self.plans = Some(plans.clone());
                plans
            }
        }
    }

    fn transform(&mut self, data: &mut [Complex], width: usize, inverse: bool) -> Result<()> {
        if width == 0 || data.len() != width.pow(3) {
            return Err(EwaldError::Transform(format!(
                "buffer of length {} is not a cube of side {width}",
                data.len()
            )));
        }
        let plans = self.plans(width);
        let fft = if inverse { plans.inverse } else { plans.forward };

        // x lines are contiguous
        data.par_chunks_mut(width).for_each(|line| fft.process(line));

        // y lines: gather each z-plane column-wise into a scratch plane
        data.par_chunks_mut(width * width).for_each(|plane| {
            let mut scratch = transpose(plane, width);
            scratch.chunks_mut(width).for_each(|line| fft.process(line));
            plane.copy_from_slice(&transpose(&scratch, width));
        });

        // z lines: strided by width² for every (y, x)
        let lines: Vec<Vec<Complex>> = (0..width * width)
            .into_par_iter()
            .map(|column| {
                let mut line: Vec<Complex> = (0..width)
                    .map(|z| data[z * width * width + column])
                    .collect();
                fft.process(&mut line);
                line
            })
            .collect();
        for (column, line) in lines.into_iter().enumerate() {
            for (z, value) in line.into_iter().enumerate() {
                data[z * width * width + column] = value;
            }
        }
        Ok(())
    }
}

/// Transpose a square `width x width` plane
fn transpose(plane: &[Complex], width: usize) -> Vec<Complex> {
    let mut out = vec![Complex::default(); plane.len()];
    for (row, col) in itertools::iproduct!(0..width, 0..width) {
        out[col * width + row] = plane[row * width + col];
    }
    out
}

impl SpectralTransform for RustFftTransform {
    fn forward(&mut self, data: &mut [Complex], width: usize) -> Result<()> {
        self.transform(data, width, false)
    }
    fn inverse(&mut self, data: &mut [Complex], width: usize) -> Result<()> {
        self.transform(data, width, true)
    }
}
