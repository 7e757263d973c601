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

//! # Shared accumulation under data parallelism
//!
//! Parallel loops run on [`rayon`]. Writes that may hit the same element from
//! different work items go to thread-local partial buffers, which are combined
//! in a `reduce` step: [`sum_buffers`] for structure factors and charge meshes,
//! [`Accumulators::merge`](crate::particles::Accumulators::merge) for pair forces.
//! Floating point addition is not associative, so results may differ in the
//! last bits between thread counts.

/// Element-wise sum of two equally sized buffers; used as a `rayon` reduce operator.
pub fn sum_buffers<T: Copy + std::ops::AddAssign>(mut a: Vec<T>, b: Vec<T>) -> Vec<T> {
    debug_assert_eq!(a.len(), b.len());
    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
    a
}
