#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lattice engine for pictures of dynamical systems.
//!
//! Every computation here frames a rectangle of parameter space with a
//! `Viewport`, runs an iterated system at each cell (or along random
//! orbits and walks that land in cells), and hands back a
//! `LatticeResult`: a flat numeric buffer plus the width, height and
//! dpi the picture should be drawn at.  Colouring and drawing are
//! somebody else's job.
//!
//! * `escape` counts how long each orbit takes to leave a disc, for
//!   Mandelbrot-type and Julia-type sets under any `IterationMap`,
//!   and can estimate each pixel's distance to a Julia set instead.
//! * `buddha` plots the orbits that escape instead, building one
//!   histogram per iteration cap (the Buddhabrot and Nebulabrot).
//! * `lyapunov` measures the mean stretching of a logistic map driven
//!   by a forced `A`/`B` string (Markus-Lyapunov fractals).
//! * `walk` bins the paths of biased 3-D random walkers, optionally
//!   one slice per span of time.

pub mod buddha;
pub mod errors;
pub mod escape;
pub mod lattice;
pub mod lyapunov;
pub mod maps;
pub mod planes;
pub mod walk;
mod workers;

pub use buddha::{
    accumulate, accumulate_layer, buddhabrot, sample_pool, ExposureConfig, OrbitSamplePool,
    SamplingConfig,
};
pub use errors::{LatticeError, Result};
pub use escape::{
    distance_estimate, escape_time, julia, julia_distance, mandelbrot, EscapeConfig, JuliaSeries,
};
pub use lattice::{
    DistanceField, EscapeField, HistogramLayer, LatticeResult, LyapunovLattice, WalkLattice,
};
pub use lyapunov::{lyapunov, LyapunovConfig};
pub use maps::IterationMap;
pub use planes::{Pixel, Viewport};
pub use walk::{random_walk_3d, MoveSet, Tracking, WalkConfig};
pub use workers::default_threads;
