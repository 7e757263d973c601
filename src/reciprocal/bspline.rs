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

//! Fourth-order cardinal B-splines for charge assignment.
//!
//! The centered spline W(t) = B(2 - |t|) is supported on -2 < t < 2 where the
//! half-spline B is piecewise cubic on \[0, 2\]. A particle at mesh coordinate u
//! touches the four points floor(u) - 1 ..= floor(u) + 2.

use std::f64::consts::TAU;

/// Interpolation order: number of mesh points per axis touched by a particle
pub const ORDER: usize = 4;

/// Half-spline B(s) on \[0, 2\]
#[inline]
pub fn cardinal(s: f64) -> f64 {
    if (0.0..1.0).contains(&s) {
        s.powi(3) / 6.0
    } else if (1.0..=2.0).contains(&s) {
        -0.5 * s.powi(3) + 2.0 * s * s - 2.0 * s + 2.0 / 3.0
    } else {
        0.0
    }
}

/// Derivative of [`cardinal`]
#[inline]
pub fn cardinal_derivative(s: f64) -> f64 {
    if (0.0..1.0).contains(&s) {
        0.5 * s * s
    } else if (1.0..=2.0).contains(&s) {
        -1.5 * s * s + 4.0 * s - 2.0
    } else {
        0.0
    }
}

/// Centered assignment weight, W(t) = B(2 - |t|)
#[inline]
pub fn weight(t: f64) -> f64 {
    cardinal(2.0 - t.abs())
}

/// dW/dt
#[inline]
pub fn weight_derivative(t: f64) -> f64 {
    -t.signum() * cardinal_derivative(2.0 - t.abs())
}

/// Euler exponential spline factor |b(k)|² for wave index `k` on a mesh of `width` points
pub fn euler_factor(k: usize, width: usize) -> f64 {
    let theta = TAU * k as f64 / width as f64;
    let denominator: crate::Complex = (0..ORDER - 1)
        .map(|l| {
            let s = usize::min(ORDER - (l + 1), l + 1) as f64;
            crate::Complex::from_polar(cardinal(s), theta * l as f64)
        })
        .sum();
    1.0 / denominator.norm_sqr()
}

/// Mesh points and weights along one axis for a particle at mesh coordinate `u`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stencil {
    /// Periodically wrapped mesh indices
    pub indices: [usize; ORDER],
    pub weights: [f64; ORDER],
    /// dW/du at each mesh point
    pub derivatives: [f64; ORDER],
}

impl Stencil {
    pub fn new(u: f64, width: usize) -> Self {
        let first = u.floor() as i64 - 1;
        let mut stencil = Self {
            indices: [0; ORDER],
            weights: [0.0; ORDER],
            derivatives: [0.0; ORDER],
        };
        for l in 0..ORDER {
            let g = first + l as i64;
            let t = u - g as f64;
            stencil.indices[l] = g.rem_euclid(width as i64) as usize;
            stencil.weights[l] = weight(t);
            stencil.derivatives[l] = weight_derivative(t);
        }
        stencil
    }
}
