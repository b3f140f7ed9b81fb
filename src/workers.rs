// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Scoped-thread plumbing shared by every accumulator.  Two shapes of
//! work exist: filling disjoint rows of an output buffer, and draining
//! a queue of independent jobs into per-worker partial results that
//! the caller reduces afterwards.

use crossbeam::thread::ScopedJoinHandle;
use itertools::iproduct;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::errors::{LatticeError, Result};
use crate::planes::Viewport;

/// The default worker count: one per logical CPU.
pub fn default_threads() -> usize {
    num_cpus::get()
}

pub(crate) fn check_threads(threads: usize) -> Result<usize> {
    if threads == 0 {
        return Err(LatticeError::InvalidConfig(
            "thread count must be at least 1".to_string(),
        ));
    }
    Ok(threads)
}

/// Derive one seed per shard from a single caller-supplied seed, so
/// that a run is repeatable no matter how many threads pick the
/// shards up.
pub(crate) fn shard_seeds(seed: u64, shards: usize) -> Vec<u64> {
    let mut master = StdRng::seed_from_u64(seed);
    (0..shards).map(|_| master.gen::<u64>()).collect()
}

/// Evaluate `pixel(x, y)` for every pixel of the viewport.  The buffer
/// is cut into bands of whole rows, one per worker, so no two workers
/// ever touch the same cell.
pub(crate) fn fill_rows<T, F>(viewport: &Viewport, threads: usize, pixel: F) -> Result<Vec<T>>
where
    T: Clone + Default + Send,
    F: Fn(usize, usize) -> Result<T> + Sync,
{
    let threads = check_threads(threads)?;
    let columns = viewport.pixels_x();
    let rows = viewport.pixels_y();
    let rows_per_band = (rows + threads - 1) / threads;

    let mut buffer = vec![T::default(); viewport.len()];
    let pixel = &pixel;
    let outcome = crossbeam::scope(|spawner| {
        let handles: Vec<ScopedJoinHandle<Result<()>>> = buffer
            .chunks_mut(rows_per_band * columns)
            .enumerate()
            .map(|(band, region)| {
                spawner.spawn(move |_| {
                    let first = band * rows_per_band;
                    let last = first + region.len() / columns;
                    for (cell, (y, x)) in region.iter_mut().zip(iproduct!(first..last, 0..columns)) {
                        *cell = pixel(x, y)?;
                    }
                    Ok(())
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| LatticeError::WorkerPanic).and_then(|r| r))
            .collect::<Result<()>>()
    });
    outcome.map_err(|_| LatticeError::WorkerPanic)??;
    Ok(buffer)
}

/// Hand `jobs` out to `threads` workers through a shared queue.  Each
/// worker folds the jobs it wins into its own accumulator, created by
/// `init`; the accumulators come back for the caller to reduce.  The
/// job's index in `jobs` is passed along so callers can restore order.
pub(crate) fn for_each_shard<J, A, I, F>(
    jobs: &[J],
    threads: usize,
    init: I,
    work: F,
) -> Result<Vec<A>>
where
    J: Sync,
    A: Send,
    I: Fn() -> A + Sync,
    F: Fn(&mut A, usize, &J) -> Result<()> + Sync,
{
    let threads = check_threads(threads)?.min(jobs.len().max(1));
    let queue = Mutex::new(jobs.iter().enumerate());
    let (queue, init, work) = (&queue, &init, &work);

    let outcome = crossbeam::scope(|spawner| {
        let handles: Vec<ScopedJoinHandle<Result<A>>> = (0..threads)
            .map(|_| {
                spawner.spawn(move |_| {
                    let mut partial = init();
                    loop {
                        let job = match queue.lock() {
                            Ok(mut jobs) => jobs.next(),
                            Err(_) => return Err(LatticeError::WorkerPanic),
                        };
                        match job {
                            Some((index, job)) => work(&mut partial, index, job)?,
                            None => break,
                        }
                    }
                    Ok(partial)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| LatticeError::WorkerPanic).and_then(|r| r))
            .collect::<Result<Vec<A>>>()
    });
    outcome.map_err(|_| LatticeError::WorkerPanic)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rows_visits_every_pixel_once_for_any_thread_count() {
        let vp = Viewport::with_pixels((0.0, 1.0), (0.0, 1.0), 7, 5).unwrap();
        for threads in 1..9 {
            let buffer = fill_rows(&vp, threads, |x, y| Ok((x, y))).unwrap();
            for (offset, &(x, y)) in buffer.iter().enumerate() {
                assert_eq!(offset, y * 7 + x);
            }
        }
    }

    #[test]
    fn fill_rows_propagates_pixel_failures() {
        let vp = Viewport::with_pixels((0.0, 1.0), (0.0, 1.0), 4, 4).unwrap();
        let result = fill_rows(&vp, 3, |x, y| {
            if (x, y) == (2, 3) {
                Err(LatticeError::NonFiniteResult { x, y })
            } else {
                Ok(0u8)
            }
        });
        assert_eq!(result, Err(LatticeError::NonFiniteResult { x: 2, y: 3 }));
    }

    #[test]
    fn zero_threads_is_a_configuration_error() {
        let vp = Viewport::with_pixels((0.0, 1.0), (0.0, 1.0), 2, 2).unwrap();
        assert!(fill_rows(&vp, 0, |_, _| Ok(0u8)).is_err());
        assert!(for_each_shard(&[1, 2], 0, || 0, |_: &mut i32, _, _| Ok(())).is_err());
    }

    #[test]
    fn every_shard_is_folded_exactly_once() {
        let jobs: Vec<u64> = (1..=1000).collect();
        let partials = for_each_shard(&jobs, 6, || 0u64, |sum, _, job| {
            *sum += *job;
            Ok(())
        })
        .unwrap();
        assert!(partials.len() <= 6);
        assert_eq!(partials.iter().sum::<u64>(), 500_500);
    }

    #[test]
    fn shard_seeds_are_repeatable() {
        assert_eq!(shard_seeds(7, 4), shard_seeds(7, 4));
        assert_ne!(shard_seeds(7, 4), shard_seeds(8, 4));
        assert_eq!(shard_seeds(7, 4)[..2], shard_seeds(7, 2)[..]);
    }
}
