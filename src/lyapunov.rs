// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lyapunov fractals ("Markus-Lyapunov").  Each pixel supplies two
//! growth rates, one per axis.  A forced string over `A` and `B`
//! picks, step by step, which rate drives the logistic map.  After a
//! warm-up the mean of `ln |r (1 - 2x)|` is the pixel's exponent:
//! negative where the orbit settles, positive where it is chaotic.

use tracing::debug;

use crate::errors::{LatticeError, Result};
use crate::lattice::{LatticeResult, LyapunovLattice};
use crate::maps::{logistic, logistic_derivative};
use crate::planes::Viewport;
use crate::workers::{default_threads, fill_rows};

/// Which axis drives a given step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Symbol {
    /// The pixel's x coordinate.
    A,
    /// The pixel's y coordinate.
    B,
}

/// Parse a forced string such as `"AAABA"`.
pub fn parse_sequence(sequence: &str) -> Result<Vec<Symbol>> {
    if sequence.is_empty() {
        return Err(LatticeError::InvalidConfig(
            "forced sequence is empty".to_string(),
        ));
    }
    sequence
        .chars()
        .map(|symbol| match symbol {
            'A' => Ok(Symbol::A),
            'B' => Ok(Symbol::B),
            other => Err(LatticeError::InvalidConfig(format!(
                "forced sequence may only hold A and B, found '{}'",
                other
            ))),
        })
        .collect()
}

/// Knobs for a Lyapunov lattice.
#[derive(Clone, Debug, PartialEq)]
pub struct LyapunovConfig {
    /// The forced string, cycled for as long as the orbit runs.
    pub sequence: String,
    /// Steps that count toward the exponent.
    pub maxiter: u32,
    /// Warm-up length as a multiple of `maxiter`.
    pub warmup_ratio: f64,
    /// Fail on the first non-finite pixel instead of marking it.
    pub strict: bool,
    /// Swap the axes of the finished lattice.
    pub transpose: bool,
    /// Worker threads.
    pub threads: usize,
}

impl Default for LyapunovConfig {
    fn default() -> Self {
        LyapunovConfig {
            sequence: "AB".to_string(),
            maxiter: 100,
            warmup_ratio: 3.0,
            strict: false,
            transpose: false,
            threads: default_threads(),
        }
    }
}

impl LyapunovConfig {
    fn warmup(&self) -> Result<u64> {
        if !(self.warmup_ratio >= 0.0) || !self.warmup_ratio.is_finite() {
            return Err(LatticeError::InvalidConfig(format!(
                "warm-up ratio must be finite and non-negative, got {}",
                self.warmup_ratio
            )));
        }
        Ok((self.warmup_ratio * f64::from(self.maxiter)).round() as u64)
    }
}

/// The exponent for one pair of rates, or `None` when it is not
/// finite or `symbols` is empty.  With `clamp` set, a slope of exactly zero is lifted to the
/// smallest positive double instead of sending the sum to `-inf`.
pub fn exponent(
    r_a: f64,
    r_b: f64,
    symbols: &[Symbol],
    maxiter: u32,
    warmup: u64,
    clamp: bool,
) -> Option<f64> {
    if symbols.is_empty() {
        return None;
    }
    let rate = |n: u64| match symbols[(n % symbols.len() as u64) as usize] {
        Symbol::A => r_a,
        Symbol::B => r_b,
    };

    let mut x = 0.5;
    let mut n = 0u64;
    while n < warmup {
        x = logistic(rate(n), x);
        n += 1;
    }

    let mut sum = 0.0;
    for _ in 0..maxiter {
        let r = rate(n);
        x = logistic(r, x);
        let mut slope = logistic_derivative(r, x).abs();
        if slope == 0.0 {
            if !clamp {
                return None;
            }
            slope = std::f64::MIN_POSITIVE;
        }
        sum += slope.ln();
        n += 1;
    }

    let lambda = sum / f64::from(maxiter);
    if lambda.is_finite() {
        Some(lambda)
    } else {
        None
    }
}

/// The Lyapunov lattice over `viewport`; pixel `(i, j)` uses the rates
/// `(x, y)` of `pixel_to_param(i, j)`.
pub fn lyapunov(viewport: &Viewport, config: &LyapunovConfig) -> Result<LyapunovLattice> {
    let symbols = parse_sequence(&config.sequence)?;
    if config.maxiter == 0 {
        return Err(LatticeError::InvalidConfig(
            "maxiter must be at least 1".to_string(),
        ));
    }
    let warmup = config.warmup()?;
    debug!(
        sequence = %config.sequence,
        columns = viewport.pixels_x(),
        rows = viewport.pixels_y(),
        maxiter = config.maxiter,
        warmup,
        "computing lyapunov lattice"
    );

    let buffer = fill_rows(viewport, config.threads, |x, y| {
        let r = viewport.pixel_to_param(x, y);
        match exponent(r.re, r.im, &symbols, config.maxiter, warmup, !config.strict) {
            None if config.strict => Err(LatticeError::NonFiniteResult { x, y }),
            lambda => Ok(lambda),
        }
    })?;
    let lattice = LatticeResult::new(viewport, 1, buffer)?;
    Ok(if config.transpose {
        lattice.transpose()
    } else {
        lattice
    })
}
