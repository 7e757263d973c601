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

//! # Pair enumeration for the real-space sum
//!
//! The real-space corrector visits particle pairs through a [`PairEnumeration`]
//! strategy. Two are provided:
//!
//! - [`HalfNeighborList`]: precomputed list where each unordered pair appears once.
//!   Separations use the minimum image convention, so the cutoff must not exceed
//!   half the shortest box side.
//! - [`PeriodicImages`]: brute-force search over all pairs and all periodic images
//!   within the cutoff. Works for any cutoff, including cutoffs longer than the box.

use crate::{cell::SimulationBox, EwaldError, Result, Vector3};
use itertools::iproduct;
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How pairs are listed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PairConvention {
    /// Each unordered pair once; both particles are updated (Newton's third law)
    #[default]
    Half,
    /// Each pair twice, once from either side
    Full,
}

/// Callback receiving partner index `j`, separation `r_i - r_j` of the image, and
/// an energy weight (½ for interactions of a particle with its own images).
pub type PairVisitor<'a> = dyn FnMut(usize, Vector3, f64) -> Result<()> + 'a;

/// Strategy for enumerating the partners of a particle
pub trait PairEnumeration: Sync {
    /// Listing convention; only [`PairConvention::Half`] is supported by the solvers
    fn convention(&self) -> PairConvention {
        PairConvention::Half
    }

    /// Check that the strategy is usable for the given geometry and particle counts
    fn check(
        &self,
        _cell: &SimulationBox,
        _cutoff: f64,
        _num_local: usize,
        _num_total: usize,
    ) -> Result<()> {
        Ok(())
    }

    /// Visit all partners of local particle `i`.
    ///
    /// `positions` holds local particles followed by ghosts.
    fn visit_pairs(
        &self,
        i: usize,
        positions: &[Vector3],
        cell: &SimulationBox,
        cutoff: f64,
        visit: &mut PairVisitor,
    ) -> Result<()>;
}

/// Half neighbor list: partners `j` of each local particle `i`, each unordered pair once
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HalfNeighborList {
    neighbors: Vec<Vec<usize>>,
}

impl HalfNeighborList {
    /// List from explicit `(i, j)` pairs where `i < num_local`.
    ///
    /// Self pairs `(i, i)` are excluded here, before any distance is evaluated.
    /// Pairs whose first index is not a local particle are dropped as well.
    pub fn from_pairs(
        num_local: usize,
        pairs: impl IntoIterator<Item = (usize, usize)>,
    ) -> Self {
        let mut neighbors = vec![Vec::new(); num_local];
        for (i, j) in pairs {
            if i == j {
                log::warn!("Excluding self pair ({i}, {i}) from neighbor list");
                continue;
            }
            match neighbors.get_mut(i) {
                Some(partners) => partners.push(j),
                None => log::warn!(
                    "Excluding pair ({i}, {j}); {i} is not one of {num_local} local particles"
                ),
            }
        }
        Self { neighbors }
    }

    /// Build by minimum image search over all pairs `j > i` within `cutoff`
    pub fn build(positions: &[Vector3], cell: &SimulationBox, cutoff: f64) -> Result<Self> {
        check_minimum_image(cell, cutoff)?;
        let cutoff_squared = cutoff * cutoff;
        let neighbors = (0..positions.len())
            .into_par_iter()
            .map(|i| {
                ((i + 1)..positions.len())
                    .filter(|&j| {
                        cell.minimum_image(&(positions[i] - positions[j]))
                            .norm_squared()
                            <= cutoff_squared
                    })
                    .collect()
            })
            .collect();
        Ok(Self { neighbors })
    }

    /// Partners of particle `i`
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    /// Total number of listed pairs
    pub fn num_pairs(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum()
    }
}

fn check_minimum_image(cell: &SimulationBox, cutoff: f64) -> Result<()> {
    if cutoff > 0.5 * cell.min_length() {
        return Err(EwaldError::configuration(format!(
            "cutoff {cutoff} exceeds half the shortest box side ({}); \
             use periodic image enumeration",
            0.5 * cell.min_length()
        )));
    }
    Ok(())
}

impl PairEnumeration for HalfNeighborList {
    fn check(
        &self,
        cell: &SimulationBox,
        cutoff: f64,
        num_local: usize,
        num_total: usize,
    ) -> Result<()> {
        check_minimum_image(cell, cutoff)?;
        if self.neighbors.len() < num_local {
            return Err(EwaldError::configuration(format!(
                "neighbor list covers {} particles but {num_local} are local",
                self.neighbors.len()
            )));
        }
        if let Some(j) = self.neighbors.iter().flatten().find(|&&j| j >= num_total) {
            return Err(EwaldError::configuration(format!(
                "neighbor index {j} out of range for {num_total} particles"
            )));
        }
        Ok(())
    }

    fn visit_pairs(
        &self,
        i: usize,
        positions: &[Vector3],
        cell: &SimulationBox,
        _cutoff: f64,
        visit: &mut PairVisitor,
    ) -> Result<()> {
        for &j in &self.neighbors[i] {
            visit(j, cell.minimum_image(&(positions[i] - positions[j])), 1.0)?;
        }
        Ok(())
    }
}

/// Brute-force enumeration of all pairs and periodic images within the cutoff.
///
/// Particle `i` visits every `j >= i` and every image shift up to
/// ⌈r<sub>max</sub>/L⌉ box lengths per axis. The unshifted image of `i` with
/// itself is never generated. Cost is O(N²) so this is meant for small systems
/// and reference calculations.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PeriodicImages;

impl PairEnumeration for PeriodicImages {
    fn check(
        &self,
        _cell: &SimulationBox,
        _cutoff: f64,
        num_local: usize,
        num_total: usize,
    ) -> Result<()> {
        if num_total != num_local {
            return Err(EwaldError::configuration(
                "periodic image enumeration cannot be combined with ghost particles",
            ));
        }
        Ok(())
    }

    fn visit_pairs(
        &self,
        i: usize,
        positions: &[Vector3],
        cell: &SimulationBox,
        cutoff: f64,
        visit: &mut PairVisitor,
    ) -> Result<()> {
        let lengths = cell.lengths();
        let shells = lengths.map(|l| (cutoff / l).ceil() as i32);
        let cutoff_squared = cutoff * cutoff;
        for j in i..positions.len() {
            let separation = cell.minimum_image(&(positions[i] - positions[j]));
            let weight = if j == i { 0.5 } else { 1.0 };
            for (nx, ny, nz) in iproduct!(
                -shells.x..=shells.x,
                -shells.y..=shells.y,
                -shells.z..=shells.z
            ) {
                if j == i && nx == 0 && ny == 0 && nz == 0 {
                    continue;
                }
                let shift = Vector3::new(
                    nx as f64 * lengths.x,
                    ny as f64 * lengths.y,
                    nz as f64 * lengths.z,
                );
                let image = separation + shift;
                if image.norm_squared() <= cutoff_squared {
                    visit(j, image, weight)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(
        pairs: &impl PairEnumeration,
        i: usize,
        positions: &[Vector3],
        cell: &SimulationBox,
        cutoff: f64,
    ) -> Vec<(usize, Vector3, f64)> {
        let mut visited = Vec::new();
        pairs
            .visit_pairs(i, positions, cell, cutoff, &mut |j, r, w| {
                visited.push((j, r, w));
                Ok(())
            })
            .unwrap();
        visited
    }

    #[test]
    fn test_half_list_excludes_self_pairs() {
        let list = HalfNeighborList::from_pairs(3, [(0, 1), (1, 1), (1, 2), (2, 2)]);
        assert_eq!(list.num_pairs(), 2);
        assert_eq!(list.neighbors(1), &[2]);
        assert!(list.neighbors(2).is_empty());
    }

    #[test]
    fn test_half_list_drops_non_local_pairs() {
        let list = HalfNeighborList::from_pairs(2, [(0, 1), (2, 0), (5, 1), (1, 3)]);
        assert_eq!(list.num_pairs(), 2);
        assert_eq!(list.neighbors(0), &[1]);
        assert_eq!(list.neighbors(1), &[3]);
    }

    #[test]
    fn test_half_list_build() {
        let cell = SimulationBox::cube(10.0);
        let positions = vec![
            Vector3::new(0.5, 5.0, 5.0),
            Vector3::new(9.5, 5.0, 5.0),
            Vector3::new(5.0, 5.0, 5.0),
        ];
        let list = HalfNeighborList::build(&positions, &cell, 2.0).unwrap();
        assert_eq!(list.num_pairs(), 1);
        let visited = collect(&list, 0, &positions, &cell, 2.0);
        assert_eq!(visited.len(), 1);
        assert_eq!(visited[0].0, 1);
        approx::assert_relative_eq!(visited[0].1.x, 1.0, epsilon = 1e-12);

        assert!(matches!(
            HalfNeighborList::build(&positions, &cell, 6.0),
            Err(EwaldError::Configuration(_))
        ));
        assert!(list.check(&cell, 2.0, 4, 4).is_err());
    }

    #[test]
    fn test_periodic_images() {
        let cell = SimulationBox::cube(4.0);
        let positions = vec![Vector3::new(1.0, 1.0, 1.0)];
        // Single particle with cutoff 4.0 sees its 6 nearest images at distance 4
        let visited = collect(&PeriodicImages, 0, &positions, &cell, 4.0);
        assert_eq!(visited.len(), 6);
        assert!(visited.iter().all(|(j, r, w)| *j == 0 && *w == 0.5 && r.norm() > 3.9));

        let positions = vec![Vector3::new(1.0, 1.0, 1.0), Vector3::new(2.0, 1.0, 1.0)];
        let visited = collect(&PeriodicImages, 0, &positions, &cell, 3.5);
        // partner at distance 1 and 3, no self images within 3.5
        assert_eq!(visited.len(), 2);
        assert!(visited.iter().all(|(j, _, w)| *j == 1 && *w == 1.0));
        assert!(PeriodicImages.check(&cell, 3.5, 2, 3).is_err());
    }
}
