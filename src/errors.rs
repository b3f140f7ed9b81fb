// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The failures a lattice computation can report.  Divergence of an
//! orbit is never one of them: that is data, not an error.

use failure::Fail;

/// Everything that can go wrong while framing, computing, or persisting
/// a lattice.
#[derive(Debug, Fail, PartialEq)]
pub enum LatticeError {
    /// The parameter rectangle is empty or inverted.
    #[fail(
        display = "Invalid bounds: x [{}, {}], y [{}, {}]; max must exceed min",
        x_min, x_max, y_min, y_max
    )]
    InvalidBounds {
        /// Left edge.
        x_min: f64,
        /// Right edge.
        x_max: f64,
        /// Bottom edge.
        y_min: f64,
        /// Top edge.
        y_max: f64,
    },

    /// `width * dpi` or `height * dpi` is not a positive integer.
    #[fail(
        display = "Invalid resolution: {}x{} at {} dpi does not give a positive integral grid",
        width, height, dpi
    )]
    InvalidResolution {
        /// Physical width.
        width: f64,
        /// Physical height.
        height: f64,
        /// Dots per unit.
        dpi: f64,
    },

    /// A pixel produced NaN or an infinity where a finite value was
    /// required.  Only raised in strict mode.
    #[fail(display = "Non-finite result at pixel ({}, {})", x, y)]
    NonFiniteResult {
        /// Column.
        x: usize,
        /// Row.
        y: usize,
    },

    /// An occupancy counter would have wrapped.
    #[fail(display = "Occupancy counter overflow at ({}, {}) in slice {}", x, y, slice)]
    CounterOverflow {
        /// Column.
        x: usize,
        /// Row.
        y: usize,
        /// Time slice.
        slice: usize,
    },

    /// A configuration value is out of its legal range.
    #[fail(display = "Invalid configuration: {}", _0)]
    InvalidConfig(String),

    /// A worker thread panicked before finishing its share.
    #[fail(display = "A worker thread panicked")]
    WorkerPanic,

    /// Saving or loading a lattice result failed.
    #[fail(display = "Persistence failure: {}", _0)]
    Persistence(String),
}

impl From<std::io::Error> for LatticeError {
    fn from(err: std::io::Error) -> Self {
        LatticeError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for LatticeError {
    fn from(err: serde_json::Error) -> Self {
        LatticeError::Persistence(err.to_string())
    }
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, LatticeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        let err = LatticeError::NonFiniteResult { x: 3, y: 7 };
        assert_eq!(format!("{}", err), "Non-finite result at pixel (3, 7)");

        let err = LatticeError::InvalidConfig("empty sequence".to_string());
        assert!(format!("{}", err).contains("empty sequence"));
    }

    #[test]
    fn io_errors_become_persistence_failures() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        match LatticeError::from(io) {
            LatticeError::Persistence(msg) => assert!(msg.contains("gone")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
