// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Biased random walks in three dimensions.  Every walker starts at
//! the displacement and takes `steps` moves drawn from a finite move
//! set.  After each move its x and y are binned into the viewport, in
//! the slice for the current time bucket ("temporal" tracking) or in
//! the single slice ("cumulative" tracking).  Positions outside the
//! frame are skipped.

use num::Complex;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::errors::{LatticeError, Result};
use crate::lattice::{LatticeResult, WalkLattice};
use crate::planes::Viewport;
use crate::workers::{default_threads, for_each_shard, shard_seeds};

type Vector = [f64; 3];

fn dot(a: &Vector, b: &Vector) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

// Tolerance for the orthonormality check on a basis.
const BASIS_SLACK: f64 = 1e-9;

/// The moves a walker may make.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveSet {
    moves: Vec<Vector>,
}

impl MoveSet {
    /// Any non-empty set of finite moves.
    pub fn new(moves: Vec<Vector>) -> Result<MoveSet> {
        if moves.is_empty() {
            return Err(LatticeError::InvalidConfig("move set is empty".to_string()));
        }
        if moves.iter().flatten().any(|v| !v.is_finite()) {
            return Err(LatticeError::InvalidConfig(
                "move set holds a non-finite component".to_string(),
            ));
        }
        Ok(MoveSet { moves })
    }

    /// A step forward and back along each vector of an orthonormal basis.
    pub fn from_basis(basis: [Vector; 3]) -> Result<MoveSet> {
        for (i, a) in basis.iter().enumerate() {
            for (j, b) in basis.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                if !((dot(a, b) - expected).abs() < BASIS_SLACK) {
                    return Err(LatticeError::InvalidConfig(
                        "basis is not orthonormal".to_string(),
                    ));
                }
            }
        }
        let moves = basis
            .iter()
            .flat_map(|v| vec![*v, [-v[0], -v[1], -v[2]]])
            .collect();
        MoveSet::new(moves)
    }

    /// The six unit steps of the cubic lattice.
    pub fn six_connected() -> MoveSet {
        MoveSet {
            moves: vec![
                [1.0, 0.0, 0.0],
                [-1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, -1.0, 0.0],
                [0.0, 0.0, 1.0],
                [0.0, 0.0, -1.0],
            ],
        }
    }

    /// The moves.
    pub fn moves(&self) -> &[Vector] {
        &self.moves
    }

    /// Selection weights: `1 + bias * (move . direction)`, floored at
    /// zero, with `direction` normalised.
    fn weights(&self, bias: f64, direction: &Vector) -> Result<Vec<f64>> {
        if bias == 0.0 {
            return Ok(vec![1.0; self.moves.len()]);
        }
        let norm = dot(direction, direction).sqrt();
        if !(norm > 0.0) || !norm.is_finite() {
            return Err(LatticeError::InvalidConfig(
                "a biased walk needs a non-zero bias direction".to_string(),
            ));
        }
        let unit = [direction[0] / norm, direction[1] / norm, direction[2] / norm];
        Ok(self
            .moves
            .iter()
            .map(|m| (1.0 + bias * dot(m, &unit)).max(0.0))
            .collect())
    }
}

/// How occupancy is split over time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Tracking {
    /// One slice per `slice_steps` elapsed steps.
    Temporal {
        /// Steps per slice.
        slice_steps: usize,
    },
    /// A single slice holding every step.
    Cumulative,
}

/// Knobs for a random-walk lattice.
#[derive(Clone, Debug, PartialEq)]
pub struct WalkConfig {
    /// Independent walkers.
    pub walkers: usize,
    /// Moves per walker.
    pub steps: usize,
    /// The move set.
    pub moves: MoveSet,
    /// How strongly moves along `bias_direction` are favoured.
    pub bias: f64,
    /// The favoured direction.
    pub bias_direction: Vector,
    /// Where every walker starts.
    pub displacement: Vector,
    /// Time slicing.
    pub tracking: Tracking,
    /// Seed for the walkers' generators.
    pub seed: u64,
    /// Worker threads.
    pub threads: usize,
}

impl Default for WalkConfig {
    fn default() -> Self {
        WalkConfig {
            walkers: 1,
            steps: 10_000,
            moves: MoveSet::six_connected(),
            bias: 0.0,
            bias_direction: [0.0, 0.0, 1.0],
            displacement: [0.0, 0.0, 0.0],
            tracking: Tracking::Cumulative,
            seed: 0,
            threads: default_threads(),
        }
    }
}

impl WalkConfig {
    fn slices(&self) -> Result<(usize, usize)> {
        match self.tracking {
            Tracking::Cumulative => Ok((1, self.steps.max(1))),
            Tracking::Temporal { slice_steps: 0 } => Err(LatticeError::InvalidConfig(
                "temporal tracking needs at least one step per slice".to_string(),
            )),
            Tracking::Temporal { slice_steps } => {
                Ok(((self.steps + slice_steps - 1) / slice_steps, slice_steps))
            }
        }
    }
}

/// Add one visit to a cell, refusing to wrap.
fn bump(cell: &mut u32) -> bool {
    match cell.checked_add(1) {
        Some(next) => {
            *cell = next;
            true
        }
        None => false,
    }
}

fn overflow_at(viewport: &Viewport, index: usize) -> LatticeError {
    let len = viewport.len();
    let (slice, offset) = (index / len, index % len);
    LatticeError::CounterOverflow {
        x: offset % viewport.pixels_x(),
        y: offset / viewport.pixels_x(),
        slice,
    }
}

/// Run the walkers and bin their paths.  Repeatable for a given seed
/// whatever the thread count.
pub fn random_walk_3d(viewport: &Viewport, config: &WalkConfig) -> Result<WalkLattice> {
    if config.steps == 0 || config.walkers == 0 {
        return Err(LatticeError::InvalidConfig(
            "a walk needs at least one walker and one step".to_string(),
        ));
    }
    if !config.bias.is_finite() || config.displacement.iter().any(|v| !v.is_finite()) {
        return Err(LatticeError::InvalidConfig(
            "bias and displacement must be finite".to_string(),
        ));
    }
    let (slices, slice_steps) = config.slices()?;
    let weights = config.moves.weights(config.bias, &config.bias_direction)?;
    let choose = WeightedIndex::new(&weights)
        .map_err(|e| LatticeError::InvalidConfig(format!("move weights: {}", e)))?;
    let moves = config.moves.moves();
    let len = viewport.len() * slices;
    debug!(
        walkers = config.walkers,
        steps = config.steps,
        slices,
        "computing random walk lattice"
    );

    let seeds = shard_seeds(config.seed, config.walkers);
    let regions = for_each_shard(&seeds, config.threads, || vec![0u32; len], |region, _, &seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut position = config.displacement;
        for step in 0..config.steps {
            let m = &moves[choose.sample(&mut rng)];
            position = [position[0] + m[0], position[1] + m[1], position[2] + m[2]];
            if let Some(offset) = viewport.point_to_offset(&Complex::new(position[0], position[1])) {
                let index = (step / slice_steps) * viewport.len() + offset;
                if !bump(&mut region[index]) {
                    return Err(overflow_at(viewport, index));
                }
            }
        }
        Ok(())
    })?;

    let mut lattice = vec![0u32; len];
    for region in &regions {
        for (index, (total, count)) in lattice.iter_mut().zip(region).enumerate() {
            *total = total
                .checked_add(*count)
                .ok_or_else(|| overflow_at(viewport, index))?;
        }
    }
    LatticeResult::new(viewport, slices, lattice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::with_pixels((-50.0, 50.0), (-50.0, 50.0), 100, 100).unwrap()
    }

    fn config(walkers: usize, steps: usize, bias: f64, seed: u64) -> WalkConfig {
        WalkConfig {
            walkers,
            steps,
            moves: MoveSet::six_connected(),
            bias,
            bias_direction: [1.0, 0.0, 0.0],
            displacement: [5.0, -5.0, 0.0],
            tracking: Tracking::Cumulative,
            seed,
            threads: 4,
        }
    }

    fn centroid(vp: &Viewport, lattice: &WalkLattice) -> (f64, f64) {
        let (mut sx, mut sy, mut total) = (0.0, 0.0, 0.0);
        for x in 0..vp.pixels_x() {
            for y in 0..vp.pixels_y() {
                let count = f64::from(*lattice.get(x, y).unwrap());
                let p = vp.pixel_to_param(x, y);
                sx += count * p.re;
                sy += count * p.im;
                total += count;
            }
        }
        (sx / total, sy / total)
    }

    #[test]
    fn unbiased_walk_centres_on_its_start() {
        let vp = viewport();
        let lattice = random_walk_3d(&vp, &config(400, 1000, 0.0, 17)).unwrap();
        let (cx, cy) = centroid(&vp, &lattice);
        assert!((cx - 5.0).abs() < 3.0, "centroid x {}", cx);
        assert!((cy + 5.0).abs() < 3.0, "centroid y {}", cy);
    }

    #[test]
    fn bias_drags_the_walk_along_its_direction() {
        let vp = viewport();
        let lattice = random_walk_3d(&vp, &config(200, 200, 0.5, 17)).unwrap();
        let (cx, cy) = centroid(&vp, &lattice);
        assert!(cx > 10.0, "centroid x {}", cx);
        assert!((cy + 5.0).abs() < 3.0, "centroid y {}", cy);
    }

    #[test]
    fn temporal_slices_sum_to_the_cumulative_lattice() {
        let vp = viewport();
        let cumulative = random_walk_3d(&vp, &config(20, 250, 0.0, 3)).unwrap();
        let temporal = random_walk_3d(
            &vp,
            &WalkConfig {
                tracking: Tracking::Temporal { slice_steps: 100 },
                ..config(20, 250, 0.0, 3)
            },
        )
        .unwrap();
        assert_eq!(temporal.shape(), (100, 100, 3));
        let mut merged = vec![0u32; vp.len()];
        for s in 0..3 {
            for (total, count) in merged.iter_mut().zip(temporal.slice(s).unwrap()) {
                *total += count;
            }
        }
        assert_eq!(&merged[..], cumulative.buffer());
        // A short walk from the middle never leaves the frame.
        assert_eq!(cumulative.buffer().iter().map(|&c| u64::from(c)).sum::<u64>(), 20 * 250);
        // The last slice only holds the final 50 steps of each walker.
        assert_eq!(temporal.slice(2).unwrap().iter().sum::<u32>(), 20 * 50);
    }

    #[test]
    fn walks_are_repeatable_for_any_thread_count() {
        let vp = viewport();
        let one = random_walk_3d(&vp, &WalkConfig { threads: 1, ..config(12, 300, 0.3, 5) }).unwrap();
        let many = random_walk_3d(&vp, &WalkConfig { threads: 7, ..config(12, 300, 0.3, 5) }).unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn basis_moves_and_validation() {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let rotated = MoveSet::from_basis([[s, s, 0.0], [-s, s, 0.0], [0.0, 0.0, 1.0]]).unwrap();
        assert_eq!(rotated.moves().len(), 6);
        assert_eq!(rotated.moves()[1], [-s, -s, 0.0]);
        assert!(MoveSet::from_basis([[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]).is_err());
        assert!(MoveSet::new(vec![]).is_err());
    }

    #[test]
    fn bad_configurations_are_rejected() {
        let vp = viewport();
        let no_direction = WalkConfig {
            bias_direction: [0.0, 0.0, 0.0],
            ..config(1, 10, 0.5, 0)
        };
        assert!(random_walk_3d(&vp, &no_direction).is_err());
        let zero_slices = WalkConfig {
            tracking: Tracking::Temporal { slice_steps: 0 },
            ..config(1, 10, 0.0, 0)
        };
        assert!(random_walk_3d(&vp, &zero_slices).is_err());
        assert!(random_walk_3d(&vp, &config(0, 10, 0.0, 0)).is_err());
    }

    #[test]
    fn full_counters_report_overflow() {
        let mut cell = std::u32::MAX - 1;
        assert!(bump(&mut cell));
        assert!(!bump(&mut cell));
        assert_eq!(cell, std::u32::MAX);

        let vp = Viewport::with_pixels((0.0, 4.0), (0.0, 2.0), 4, 2).unwrap();
        assert_eq!(
            overflow_at(&vp, 8 + 6),
            LatticeError::CounterOverflow { x: 2, y: 1, slice: 1 }
        );
    }
}
