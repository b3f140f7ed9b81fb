// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The lattice result: the one thing every computation hands back.  A
//! flat buffer in row-major order (x fastest, then y, then slice),
//! plus the sizing metadata the renderer needs to lay out its output.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::errors::{LatticeError, Result};
use crate::planes::Viewport;

/// A computed lattice and the sizing it was framed with.  Read-only
/// once returned; recomputation means a new value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatticeResult<T> {
    buffer: Vec<T>,
    columns: usize,
    rows: usize,
    slices: usize,
    /// Physical width, passed through from the viewport.
    pub width: f64,
    /// Physical height, passed through from the viewport.
    pub height: f64,
    /// Dots per unit, passed through from the viewport.
    pub dpi: f64,
}

/// Escape-time counts; `None` marks a pixel that never escaped.
pub type EscapeField = LatticeResult<Option<u32>>;

/// Buddhabrot hit counts for one exposure.
pub type HistogramLayer = LatticeResult<u64>;

/// Distance estimates; `None` marks a pixel whose orbit never escaped.
pub type DistanceField = LatticeResult<Option<f64>>;

/// Lyapunov exponents; `None` marks a pixel whose exponent was not finite.
pub type LyapunovLattice = LatticeResult<Option<f64>>;

/// Random-walk occupancy, one slice per time bucket.
pub type WalkLattice = LatticeResult<u32>;

impl<T> LatticeResult<T> {
    /// Wrap a buffer shaped like `viewport`, with `slices` layers.
    pub fn new(viewport: &Viewport, slices: usize, buffer: Vec<T>) -> Result<Self> {
        if buffer.len() != viewport.len() * slices {
            return Err(LatticeError::InvalidConfig(format!(
                "buffer of {} cells does not fit {}x{}x{}",
                buffer.len(),
                viewport.pixels_x(),
                viewport.pixels_y(),
                slices
            )));
        }
        Ok(LatticeResult {
            buffer,
            columns: viewport.pixels_x(),
            rows: viewport.pixels_y(),
            slices,
            width: viewport.sizing().width,
            height: viewport.sizing().height,
            dpi: viewport.sizing().dpi,
        })
    }

    /// Columns, rows, slices.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.columns, self.rows, self.slices)
    }

    /// The whole buffer.
    pub fn buffer(&self) -> &[T] {
        &self.buffer
    }

    /// Take the buffer back out.
    pub fn into_buffer(self) -> Vec<T> {
        self.buffer
    }

    /// The cell at column `x`, row `y` of the first slice.
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        self.get3(x, y, 0)
    }

    /// The cell at column `x`, row `y` of slice `s`.
    pub fn get3(&self, x: usize, y: usize, s: usize) -> Option<&T> {
        if x >= self.columns || y >= self.rows || s >= self.slices {
            return None;
        }
        self.buffer
            .get((s * self.rows + y) * self.columns + x)
    }

    /// One slice as a row-major 2-D grid.
    pub fn slice(&self, s: usize) -> Option<&[T]> {
        let len = self.columns * self.rows;
        if s >= self.slices {
            return None;
        }
        Some(&self.buffer[s * len..(s + 1) * len])
    }

    /// Swap rows and columns of every slice.  Sizing metadata is left
    /// as it was.
    pub fn transpose(self) -> Self
    where
        T: Clone,
    {
        let (columns, rows) = (self.columns, self.rows);
        let mut buffer = Vec::with_capacity(self.buffer.len());
        for s in 0..self.slices {
            let base = s * columns * rows;
            for x in 0..columns {
                for y in 0..rows {
                    buffer.push(self.buffer[base + y * columns + x].clone());
                }
            }
        }
        LatticeResult {
            buffer,
            columns: rows,
            rows: columns,
            ..self
        }
    }
}

impl<T: Serialize> LatticeResult<T> {
    /// Persist the lattice so it can be re-rendered without recomputing.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let output = BufWriter::new(File::create(path)?);
        serde_json::to_writer(output, self)?;
        Ok(())
    }
}

impl<T: DeserializeOwned> LatticeResult<T> {
    /// Read back a lattice written by `save`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let input = BufReader::new(File::open(path)?);
        let lattice: LatticeResult<T> = serde_json::from_reader(input)?;
        if lattice.buffer.len() != lattice.columns * lattice.rows * lattice.slices {
            return Err(LatticeError::Persistence(
                "stored buffer does not match its shape".to_string(),
            ));
        }
        Ok(lattice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::build((-1.0, 1.0), (-1.0, 1.0), 3.0, 2.0, 1.0).unwrap()
    }

    #[test]
    fn new_rejects_misshapen_buffers() {
        assert!(LatticeResult::new(&viewport(), 1, vec![0u32; 5]).is_err());
        assert!(LatticeResult::new(&viewport(), 2, vec![0u32; 12]).is_ok());
    }

    #[test]
    fn indexing_is_row_major_by_slice() {
        let lattice = LatticeResult::new(&viewport(), 2, (0..12).collect::<Vec<u32>>()).unwrap();
        assert_eq!(lattice.shape(), (3, 2, 2));
        assert_eq!(lattice.get(2, 0), Some(&2));
        assert_eq!(lattice.get(0, 1), Some(&3));
        assert_eq!(lattice.get3(1, 1, 1), Some(&10));
        assert_eq!(lattice.get(3, 0), None);
        assert_eq!(lattice.slice(1), Some(&[6, 7, 8, 9, 10, 11][..]));
        assert_eq!(lattice.slice(2), None);
    }

    #[test]
    fn transpose_swaps_axes() {
        let lattice = LatticeResult::new(&viewport(), 1, (0..6).collect::<Vec<u32>>()).unwrap();
        let t = lattice.clone().transpose();
        assert_eq!(t.shape(), (2, 3, 1));
        for x in 0..3 {
            for y in 0..2 {
                assert_eq!(lattice.get(x, y), t.get(y, x));
            }
        }
        assert_eq!(t.width, 3.0);
    }

    #[test]
    fn save_then_load_preserves_sentinels_and_sizing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.json");
        let lattice =
            LatticeResult::new(&viewport(), 1, vec![Some(3u32), None, Some(0), None, Some(9), None])
                .unwrap();
        lattice.save(&path).unwrap();
        let back: EscapeField = LatticeResult::load(&path).unwrap();
        assert_eq!(back, lattice);
        assert_eq!((back.width, back.height, back.dpi), (3.0, 2.0, 1.0));
    }

    #[test]
    fn load_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing: Result<WalkLattice> = LatticeResult::load(dir.path().join("nope.json"));
        match missing {
            Err(LatticeError::Persistence(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
    }
}
