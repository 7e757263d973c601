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

use thiserror::Error;

/// Errors that abort an Ewald force evaluation.
///
/// None of these are retried internally: positions and charges are owned by the
/// caller and a second attempt with the same input gives the same outcome.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EwaldError {
    /// Invalid setup, e.g. a non-cubic box for the mesh solver
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A requested mode that is not implemented
    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),

    /// Two distinct particles at (numerically) zero separation
    #[error("Particles {i} and {j} coincide; pair distance is zero")]
    NumericalDegeneracy { i: usize, j: usize },

    /// Internal bookkeeping is broken and solver state may be corrupt
    #[error("Internal invariant violated: expected {expected} particles after ghost scatter, found {found}")]
    InvariantViolation { expected: usize, found: usize },

    /// A global reduction across ranks failed
    #[error("Collective reduction failed: {0}")]
    Collective(String),

    /// The spectral transform backend failed
    #[error("Spectral transform failed: {0}")]
    Transform(String),
}

impl EwaldError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, EwaldError>;
