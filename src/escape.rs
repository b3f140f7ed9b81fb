// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Escape-time fields.  For every pixel, count the steps an orbit
//! takes to leave the divergence radius.  Mandelbrot mode varies the
//! parameter across the picture and starts from the map's critical
//! point; Julia mode fixes the parameter and varies the starting
//! state.  An orbit that never leaves is recorded as `None`.

use num::{Complex, One};
use tracing::debug;

use crate::errors::{LatticeError, Result};
use crate::lattice::{DistanceField, EscapeField, LatticeResult};
use crate::maps::IterationMap;
use crate::planes::Viewport;
use crate::workers::{default_threads, fill_rows, for_each_shard};

/// Knobs for an escape-time field.
#[derive(Clone, Debug, PartialEq)]
pub struct EscapeConfig {
    /// Steps to try before declaring a pixel a member of the set.
    pub maxiter: u32,
    /// Overrides the map's own divergence radius.
    pub radius: Option<f64>,
    /// Worker threads.
    pub threads: usize,
}

impl Default for EscapeConfig {
    fn default() -> Self {
        EscapeConfig {
            maxiter: 500,
            radius: None,
            threads: default_threads(),
        }
    }
}

impl EscapeConfig {
    fn radius_for(&self, map: &IterationMap) -> Result<f64> {
        match self.radius {
            None => Ok(map.divergence_radius()),
            Some(radius) if radius > 0.0 && radius.is_finite() => Ok(radius),
            Some(radius) => Err(LatticeError::InvalidConfig(format!(
                "escape radius must be finite and positive, got {}",
                radius
            ))),
        }
    }
}

/// This is our classic iterator function, which either returns the
/// number of steps it took for the orbit of `z0` to pass `radius`, or
/// it returns nothing at all.  A state already outside counts as
/// escaping after zero steps.  NaN and infinities count as outside.
#[inline]
pub fn escape_time(
    map: &IterationMap,
    z0: Complex<f64>,
    c: Complex<f64>,
    maxiter: u32,
    radius: f64,
) -> Option<u32> {
    let horizon = radius * radius;
    let mut z = z0;
    if !(z.norm_sqr() <= horizon) {
        return Some(0);
    }
    for i in 1..=maxiter {
        z = map.step(z, c);
        if !(z.norm_sqr() <= horizon) {
            return Some(i);
        }
    }
    None
}

/// The Mandelbrot-type field of `map` over `viewport`: each pixel is a
/// parameter `c`, each orbit starts at the map's critical point.
pub fn mandelbrot(
    viewport: &Viewport,
    map: &IterationMap,
    config: &EscapeConfig,
) -> Result<EscapeField> {
    debug!(
        map = %map,
        columns = viewport.pixels_x(),
        rows = viewport.pixels_y(),
        maxiter = config.maxiter,
        "computing mandelbrot field"
    );
    let radius = config.radius_for(map)?;
    let z0 = map.critical_point();
    let buffer = fill_rows(viewport, config.threads, |x, y| {
        Ok(escape_time(map, z0, viewport.pixel_to_param(x, y), config.maxiter, radius))
    })?;
    LatticeResult::new(viewport, 1, buffer)
}

/// The Julia-type field of `map` for the fixed parameter `c`: each
/// pixel is a starting state.
pub fn julia(
    c: Complex<f64>,
    viewport: &Viewport,
    map: &IterationMap,
    config: &EscapeConfig,
) -> Result<EscapeField> {
    debug!(
        map = %map,
        c = %c,
        columns = viewport.pixels_x(),
        rows = viewport.pixels_y(),
        maxiter = config.maxiter,
        "computing julia field"
    );
    let radius = config.radius_for(map)?;
    let buffer = fill_rows(viewport, config.threads, |x, y| {
        Ok(escape_time(map, viewport.pixel_to_param(x, y), c, config.maxiter, radius))
    })?;
    LatticeResult::new(viewport, 1, buffer)
}

/// Distance from `z0` to the Julia set of `map` at `c`, estimated as
/// `|z| ln |z| / |dz/dz0|` at the step the orbit escapes.  `None` when
/// the orbit stays within `radius` for `maxiter` steps.  An estimate
/// that is not finite, or that a small radius drives below zero, is
/// reported as zero.
pub fn distance_estimate(
    map: &IterationMap,
    z0: Complex<f64>,
    c: Complex<f64>,
    maxiter: u32,
    radius: f64,
) -> Option<f64> {
    let horizon = radius * radius;
    let estimate = |z: Complex<f64>, dz: Complex<f64>| {
        let modulus = z.norm();
        let d = modulus * modulus.ln() / dz.norm();
        Some(if d.is_finite() { d.max(0.0) } else { 0.0 })
    };

    let mut z = z0;
    let mut dz = Complex::one();
    if !(z.norm_sqr() <= horizon) {
        return estimate(z, dz);
    }
    for _ in 0..maxiter {
        dz = map.derivative(z, c) * dz;
        z = map.step(z, c);
        if !(z.norm_sqr() <= horizon) {
            return estimate(z, dz);
        }
    }
    None
}

/// The Julia field of `map` at `c` as distance estimates rather than
/// step counts.  Captive pixels are `None`, exactly as in `julia`.
pub fn julia_distance(
    c: Complex<f64>,
    viewport: &Viewport,
    map: &IterationMap,
    config: &EscapeConfig,
) -> Result<DistanceField> {
    debug!(
        map = %map,
        c = %c,
        columns = viewport.pixels_x(),
        rows = viewport.pixels_y(),
        maxiter = config.maxiter,
        "computing julia distance field"
    );
    let radius = config.radius_for(map)?;
    let buffer = fill_rows(viewport, config.threads, |x, y| {
        Ok(distance_estimate(map, viewport.pixel_to_param(x, y), c, config.maxiter, radius))
    })?;
    LatticeResult::new(viewport, 1, buffer)
}

/// A finite run of Julia fields, one per parameter, for animation.
/// Nothing is computed until a frame is asked for, and every frame is
/// independent of the others.
#[derive(Clone, Debug)]
pub struct JuliaSeries {
    params: Vec<Complex<f64>>,
    viewport: Viewport,
    map: IterationMap,
    config: EscapeConfig,
}

impl JuliaSeries {
    /// One frame per entry of `params`, in order.
    pub fn new(
        params: Vec<Complex<f64>>,
        viewport: Viewport,
        map: IterationMap,
        config: EscapeConfig,
    ) -> Self {
        JuliaSeries {
            params,
            viewport,
            map,
            config,
        }
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True when there are no frames.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The parameters, in frame order.
    pub fn params(&self) -> &[Complex<f64>] {
        &self.params
    }

    /// Compute frame `index` alone.
    pub fn frame(&self, index: usize) -> Option<Result<EscapeField>> {
        self.params
            .get(index)
            .map(|&c| julia(c, &self.viewport, &self.map, &self.config))
    }

    /// Walk the frames in order.  Each call starts again from the first.
    pub fn iter(&self) -> Frames<'_> {
        Frames {
            series: self,
            next: 0,
        }
    }

    /// Compute every frame, spreading whole frames across the
    /// configured threads.  Frames come back in parameter order.
    pub fn compute_all(&self) -> Result<Vec<EscapeField>> {
        self.config.radius_for(&self.map)?;
        let single = EscapeConfig {
            threads: 1,
            ..self.config.clone()
        };
        let partials = for_each_shard(
            &self.params,
            self.config.threads,
            Vec::<(usize, EscapeField)>::new,
            |done, index, c| {
                done.push((index, julia(*c, &self.viewport, &self.map, &single)?));
                Ok(())
            },
        )?;
        let mut frames: Vec<(usize, EscapeField)> = partials.into_iter().flatten().collect();
        frames.sort_by_key(|&(index, _)| index);
        Ok(frames.into_iter().map(|(_, frame)| frame).collect())
    }
}

/// Lazy iterator over the frames of a `JuliaSeries`.
pub struct Frames<'a> {
    series: &'a JuliaSeries,
    next: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<EscapeField>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.series.frame(self.next)?;
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.series.len() - self.next;
        (left, Some(left))
    }
}

impl<'a> ExactSizeIterator for Frames<'a> {}
