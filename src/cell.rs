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

//! # Periodic simulation box
//!
//! Orthorhombic cell with periodic boundaries in all three dimensions.
//! The origin of the box is at (0, 0, 0); particles outside `[0, L)` are
//! handled through wrapping and the minimum image convention.

use crate::{EwaldError, Result, Vector3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Relative tolerance when comparing side lengths for cubic symmetry
const CUBIC_TOLERANCE: f64 = 1e-10;

/// Orthorhombic, fully periodic simulation box
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct SimulationBox {
    /// Side lengths (lx, ly, lz)
    lengths: Vector3,
}

impl SimulationBox {
    /// Orthorhombic box with side lengths `lx`, `ly`, `lz`.
    pub fn new(lx: f64, ly: f64, lz: f64) -> Result<Self> {
        if [lx, ly, lz].iter().any(|l| !l.is_finite() || *l <= 0.0) {
            return Err(EwaldError::configuration(format!(
                "box lengths must be positive and finite, got ({lx}, {ly}, {lz})"
            )));
        }
        Ok(Self {
            lengths: Vector3::new(lx, ly, lz),
        })
    }

    /// Cubic box with side length `length`
    ///
    /// # Panics
    /// If `length` is not positive.
    pub fn cube(length: f64) -> Self {
        assert!(length > 0.0, "box length must be positive");
        Self {
            lengths: Vector3::repeat(length),
        }
    }

    /// Side lengths
    pub fn lengths(&self) -> &Vector3 {
        &self.lengths
    }

    /// Box volume
    pub fn volume(&self) -> f64 {
        self.lengths.product()
    }

    /// Longest side
    pub fn max_length(&self) -> f64 {
        self.lengths.max()
    }

    /// Shortest side
    pub fn min_length(&self) -> f64 {
        self.lengths.min()
    }

    /// True if all three sides are equal
    pub fn is_cubic(&self) -> bool {
        let (lx, ly, lz) = (self.lengths.x, self.lengths.y, self.lengths.z);
        let tol = CUBIC_TOLERANCE * lx;
        (lx - ly).abs() <= tol && (lx - lz).abs() <= tol
    }

    /// Side length of a cubic box or a `Configuration` error naming `purpose`.
    pub fn cubic_length(&self, purpose: &str) -> Result<f64> {
        if self.is_cubic() {
            Ok(self.lengths.x)
        } else {
            Err(EwaldError::configuration(format!(
                "{purpose} requires a cubic box, got {} x {} x {}",
                self.lengths.x, self.lengths.y, self.lengths.z
            )))
        }
    }

    /// Wrap a position into the primary cell, `[0, L)` along each axis
    pub fn wrap(&self, position: &Vector3) -> Vector3 {
        position.zip_map(&self.lengths, |x, l| x.rem_euclid(l))
    }

    /// Minimum image of a separation vector
    pub fn minimum_image(&self, distance: &Vector3) -> Vector3 {
        distance.zip_map(&self.lengths, |d, l| d - l * (d / l).round())
    }
}
