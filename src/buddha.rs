// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Buddhabrot accumulation.
//!
//! The Buddhabrot takes the orbits that *escape* and plots every
//! point they pass through.  It runs in two passes:
//!
//! 1. Sampling: draw random parameters from the viewport, keep only
//!    those whose orbit escapes within the sampling cap and touches
//!    the frame on the way out.  The survivors form an immutable
//!    `OrbitSamplePool`.
//! 2. Accumulation: for each exposure (an iteration cap), replay every
//!    pooled orbit from scratch and add one to each cell it lands in.
//!
//! Each exposure comes back as its own `HistogramLayer`; stacking them
//! into the red, green and blue of a Nebulabrot is the renderer's job.
//!
//! Many orbits hit the same cells at the same time, so each worker
//! counts into a private histogram and the partial histograms are
//! summed at the end.

use num::Complex;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::errors::{LatticeError, Result};
use crate::lattice::{HistogramLayer, LatticeResult};
use crate::maps::IterationMap;
use crate::planes::Viewport;
use crate::workers::{default_threads, for_each_shard, shard_seeds};

// Candidates drawn per sampling shard.
const SAMPLES_PER_SHARD: usize = 4096;

// Pool members replayed per accumulation job.
const ORBITS_PER_JOB: usize = 256;

/// How the sample pool is drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingConfig {
    /// Candidate parameters to draw.
    pub samples: usize,
    /// Steps a candidate gets to escape.
    pub maxiter: u32,
    /// The escape radius.
    pub horizon: f64,
    /// Seed for the candidate generator.
    pub seed: u64,
    /// Worker threads.
    pub threads: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            samples: 1_000_000,
            maxiter: 10_000,
            horizon: 1.0e6,
            seed: 0,
            threads: default_threads(),
        }
    }
}

/// The exposures to accumulate.
#[derive(Clone, Debug, PartialEq)]
pub struct ExposureConfig {
    /// One histogram layer per entry, in this order.
    pub maxiters: Vec<u32>,
    /// The escape radius used while replaying orbits.
    pub horizon: f64,
    /// Worker threads.
    pub threads: usize,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        ExposureConfig {
            maxiters: vec![100, 1_000, 10_000],
            horizon: 1.0e6,
            threads: default_threads(),
        }
    }
}

/// Parameters known to escape under `map` within `maxiter` steps.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitSamplePool {
    points: Vec<Complex<f64>>,
    map: IterationMap,
}

impl OrbitSamplePool {
    /// Keep the candidates whose orbits escape and visit the frame,
    /// preserving their order.
    pub fn from_candidates<I>(
        candidates: I,
        viewport: &Viewport,
        map: &IterationMap,
        maxiter: u32,
        horizon: f64,
    ) -> OrbitSamplePool
    where
        I: IntoIterator<Item = Complex<f64>>,
    {
        let points = candidates
            .into_iter()
            .filter(|c| escapes_through_frame(viewport, map, *c, maxiter, horizon))
            .collect();
        OrbitSamplePool { points, map: *map }
    }

    /// The pooled parameters.
    pub fn points(&self) -> &[Complex<f64>] {
        &self.points
    }

    /// Pool size.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no candidate survived.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The map the pool was drawn under.
    pub fn map(&self) -> &IterationMap {
        &self.map
    }
}

/// True when the orbit of `c` escapes `horizon` within `maxiter` steps
/// and at least one of the states before escape lies in the frame.
fn escapes_through_frame(
    viewport: &Viewport,
    map: &IterationMap,
    c: Complex<f64>,
    maxiter: u32,
    horizon: f64,
) -> bool {
    let horizon = horizon * horizon;
    let mut z = map.critical_point();
    let mut visited = false;
    for _ in 0..maxiter {
        z = map.step(z, c);
        if !(z.norm_sqr() <= horizon) {
            return visited;
        }
        visited = visited || viewport.point_to_offset(&z).is_some();
    }
    false
}

/// Draw `config.samples` parameters uniformly over the viewport and
/// keep those that escape.  Repeatable for a given seed whatever the
/// thread count.
pub fn sample_pool(
    viewport: &Viewport,
    map: &IterationMap,
    config: &SamplingConfig,
) -> Result<OrbitSamplePool> {
    if !(config.horizon > 0.0) {
        return Err(LatticeError::InvalidConfig(
            "sampling horizon must be positive".to_string(),
        ));
    }
    let shards = (config.samples + SAMPLES_PER_SHARD - 1) / SAMPLES_PER_SHARD;
    let jobs: Vec<(u64, usize)> = shard_seeds(config.seed, shards)
        .into_iter()
        .enumerate()
        .map(|(shard, seed)| {
            let drawn = shard * SAMPLES_PER_SHARD;
            (seed, SAMPLES_PER_SHARD.min(config.samples - drawn))
        })
        .collect();

    let (leftlower, rightupper) = (viewport.leftlower(), viewport.rightupper());
    let re = Uniform::new(leftlower.re, rightupper.re);
    let im = Uniform::new(leftlower.im, rightupper.im);

    let partials = for_each_shard(
        &jobs,
        config.threads,
        Vec::<(usize, Vec<Complex<f64>>)>::new,
        |found, index, &(seed, count)| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut points: Vec<Complex<f64>> = vec![];
            for _ in 0..count {
                let c = Complex::new(re.sample(&mut rng), im.sample(&mut rng));
                if escapes_through_frame(viewport, map, c, config.maxiter, config.horizon) {
                    points.push(c);
                }
            }
            found.push((index, points));
            Ok(())
        },
    )?;

    let mut shards: Vec<(usize, Vec<Complex<f64>>)> = partials.into_iter().flatten().collect();
    shards.sort_by_key(|&(index, _)| index);
    let points: Vec<Complex<f64>> = shards.into_iter().flat_map(|(_, points)| points).collect();
    info!(
        candidates = config.samples,
        pooled = points.len(),
        "buddhabrot sample pool drawn"
    );

    Ok(OrbitSamplePool { points, map: *map })
}

/// This is the 'primary' helper function, in that its purpose is to
/// take a point, a plane, and a buffer, and plot the orbit of that
/// point up to `maxiter` steps or until it passes the horizon.  States
/// outside the frame are skipped, never clamped.  Returns the number
/// of hits recorded.
fn plot(
    viewport: &Viewport,
    map: &IterationMap,
    c: Complex<f64>,
    maxiter: u32,
    horizon: f64,
    buffer: &mut [u64],
) -> u64 {
    let horizon = horizon * horizon;
    let mut z = map.critical_point();
    let mut hits = 0;
    for _ in 0..maxiter {
        z = map.step(z, c);
        if !(z.norm_sqr() <= horizon) {
            break;
        }
        if let Some(offset) = viewport.point_to_offset(&z) {
            buffer[offset] += 1;
            hits += 1;
        }
    }
    hits
}

/// Given a collection of planes, merge them all into a single plane by
/// summing cell by cell.
fn render_merge(len: usize, regions: Vec<Vec<u64>>) -> Vec<u64> {
    let mut ret = vec![0u64; len];
    for region in &regions {
        for (total, count) in ret.iter_mut().zip(region) {
            *total += count;
        }
    }
    ret
}

/// Accumulate one exposure: replay every pooled orbit up to `maxiter`.
pub fn accumulate_layer(
    viewport: &Viewport,
    pool: &OrbitSamplePool,
    maxiter: u32,
    horizon: f64,
    threads: usize,
) -> Result<HistogramLayer> {
    debug!(maxiter, orbits = pool.len(), "accumulating buddhabrot exposure");
    let jobs: Vec<&[Complex<f64>]> = pool.points.chunks(ORBITS_PER_JOB).collect();
    let map = pool.map();
    let regions = for_each_shard(
        &jobs,
        threads,
        || vec![0u64; viewport.len()],
        |region, _, orbits| {
            for c in orbits.iter() {
                plot(viewport, map, *c, maxiter, horizon, region);
            }
            Ok(())
        },
    )?;
    LatticeResult::new(viewport, 1, render_merge(viewport.len(), regions))
}

/// Accumulate every exposure in `config.maxiters`, one layer each, in
/// the order requested.
pub fn accumulate(
    viewport: &Viewport,
    pool: &OrbitSamplePool,
    config: &ExposureConfig,
) -> Result<Vec<HistogramLayer>> {
    if config.maxiters.is_empty() {
        return Err(LatticeError::InvalidConfig(
            "at least one exposure is required".to_string(),
        ));
    }
    if !(config.horizon > 0.0) {
        return Err(LatticeError::InvalidConfig(
            "exposure horizon must be positive".to_string(),
        ));
    }
    config
        .maxiters
        .iter()
        .map(|&maxiter| accumulate_layer(viewport, pool, maxiter, config.horizon, config.threads))
        .collect()
}

/// Sample a pool and accumulate every exposure from it.
pub fn buddhabrot(
    viewport: &Viewport,
    map: &IterationMap,
    sampling: &SamplingConfig,
    exposures: &ExposureConfig,
) -> Result<Vec<HistogramLayer>> {
    let pool = sample_pool(viewport, map, sampling)?;
    accumulate(viewport, &pool, exposures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::escape_time;

    fn viewport() -> Viewport {
        Viewport::build((-1.75, 0.85), (-1.10, 1.10), 5.0, 4.0, 6.0).unwrap()
    }

    fn sampling(samples: usize, seed: u64, threads: usize) -> SamplingConfig {
        SamplingConfig {
            samples,
            maxiter: 200,
            horizon: 1.0e6,
            seed,
            threads,
        }
    }

    #[test]
    fn pool_holds_only_escaping_parameters() {
        let vp = viewport();
        let map = IterationMap::mandelbrot();
        let pool = sample_pool(&vp, &map, &sampling(5000, 11, 4)).unwrap();
        assert!(!pool.is_empty());
        assert!(pool.len() < 5000);
        for c in pool.points() {
            assert!(escape_time(&map, map.critical_point(), *c, 200, 1.0e6).is_some());
            assert!(c.re >= -1.75 && c.re < 0.85 && c.im >= -1.10 && c.im < 1.10);
        }
    }

    #[test]
    fn pool_is_repeatable_for_a_seed_and_any_thread_count() {
        let vp = viewport();
        let map = IterationMap::mandelbrot();
        let a = sample_pool(&vp, &map, &sampling(9000, 3, 1)).unwrap();
        let b = sample_pool(&vp, &map, &sampling(9000, 3, 5)).unwrap();
        let c = sample_pool(&vp, &map, &sampling(9000, 4, 5)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn from_candidates_drops_captive_orbits() {
        let vp = viewport();
        let map = IterationMap::mandelbrot();
        let candidates = vec![
            Complex::new(0.0, 0.0),
            Complex::new(0.3, 0.0),
            Complex::new(-1.0, 0.0),
            Complex::new(0.5, 0.5),
        ];
        let pool = OrbitSamplePool::from_candidates(candidates, &vp, &map, 1000, 4.0);
        assert_eq!(pool.points(), &[Complex::new(0.3, 0.0), Complex::new(0.5, 0.5)][..]);
    }

    #[test]
    fn histogram_counts_every_in_frame_visit_and_no_more() {
        let vp = viewport();
        let map = IterationMap::mandelbrot();
        let pool = sample_pool(&vp, &map, &sampling(3000, 5, 3)).unwrap();
        let maxiter = 150;
        let layer = accumulate_layer(&vp, &pool, maxiter, 1.0e6, 3).unwrap();

        let mut scratch = vec![0u64; vp.len()];
        let events: u64 = pool
            .points()
            .iter()
            .map(|c| plot(&vp, &map, *c, maxiter, 1.0e6, &mut scratch))
            .sum();
        let total: u64 = layer.buffer().iter().sum();
        assert_eq!(total, events);
        assert!(total <= pool.len() as u64 * u64::from(maxiter));
        assert_eq!(layer.buffer(), &scratch[..]);
    }

    #[test]
    fn exposures_are_monotone_per_cell() {
        let vp = viewport();
        let map = IterationMap::mandelbrot();
        let pool = sample_pool(&vp, &map, &sampling(4000, 9, 4)).unwrap();
        let config = ExposureConfig {
            maxiters: vec![20, 60, 200],
            horizon: 1.0e6,
            threads: 4,
        };
        let layers = accumulate(&vp, &pool, &config).unwrap();
        assert_eq!(layers.len(), 3);
        for pair in layers.windows(2) {
            for (low, high) in pair[0].buffer().iter().zip(pair[1].buffer()) {
                assert!(high >= low);
            }
        }
    }

    #[test]
    fn contended_cells_lose_no_hits() {
        // A 2x2 frame and one orbit repeated many times: every worker
        // hammers the same four cells.
        let vp = Viewport::with_pixels((-2.0, 2.0), (-2.0, 2.0), 2, 2).unwrap();
        let map = IterationMap::mandelbrot();
        let pool = OrbitSamplePool::from_candidates(
            std::iter::repeat(Complex::new(0.4, 0.1)).take(20_000),
            &vp,
            &map,
            1000,
            2.0,
        );
        assert_eq!(pool.len(), 20_000);
        let reference = accumulate_layer(&vp, &pool, 1000, 2.0, 1).unwrap();
        for &threads in &[2, 8, 32] {
            let contended = accumulate_layer(&vp, &pool, 1000, 2.0, threads).unwrap();
            assert_eq!(contended, reference);
        }
        let per_orbit = plot(&vp, &map, Complex::new(0.4, 0.1), 1000, 2.0, &mut [0; 4]);
        assert_eq!(reference.buffer().iter().sum::<u64>(), 20_000 * per_orbit);
    }

    #[test]
    fn empty_exposure_list_is_rejected() {
        let vp = viewport();
        let pool = OrbitSamplePool::from_candidates(vec![], &vp, &IterationMap::mandelbrot(), 10, 2.0);
        let config = ExposureConfig {
            maxiters: vec![],
            horizon: 2.0,
            threads: 1,
        };
        assert!(accumulate(&vp, &pool, &config).is_err());
    }

    #[test]
    fn end_to_end_layers_share_sizing() {
        let vp = viewport();
        let layers = buddhabrot(
            &vp,
            &IterationMap::mandelbrot(),
            &sampling(2000, 1, 2),
            &ExposureConfig {
                maxiters: vec![10, 100],
                horizon: 1.0e6,
                threads: 2,
            },
        )
        .unwrap();
        for layer in &layers {
            assert_eq!(layer.shape(), (30, 24, 1));
            assert_eq!((layer.width, layer.height, layer.dpi), (5.0, 4.0, 6.0));
        }
    }
}
