// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the Viewport struct, which describes a relationship
//! between a rectangle on the integral plane with an origin at 0,0,
//! and a rectangle on the real plane with an arbitrary pair of
//! corners defining the leftlower and rightupper corners of the real
//! plane.  Every lattice in this crate is framed by one.
use num::Complex;

use crate::errors::{LatticeError, Result};

/// Describes the width and height of an integral plane that is assumed to start at
/// 0,0 and all values are assumed to be non-negative integers.
#[derive(Copy, Clone, Debug, PartialEq)]
struct IntegralPlane(usize, usize);

/// Describes the lower-left corner and upper-right corner of the
/// Complex plane, treating the real part of each value as the
/// x-component and the imaginary part of each value as the
/// y-component.
#[derive(Copy, Clone, Debug, PartialEq)]
struct ComplexPlane(Complex<f64>, Complex<f64>);

/// Describes the x, y of a point in a region.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// The physical size of the picture the lattice will become.  The
/// core never reads these; they ride along for the renderer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sizing {
    /// Physical width.
    pub width: f64,
    /// Physical height.
    pub height: f64,
    /// Dots per unit of width and height.
    pub dpi: f64,
}

/// Maps a pixel grid onto a rectangle of parameter space and back.
/// Immutable once built; read it through the accessors.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    // The right-upper hand corner of the integral cartesian plane.
    // The left-lower is assumed to be at 0,0
    integral_plane: IntegralPlane,
    // The two coordinates defining the complex cartesian plane,
    // left-lower and right-upper
    complex_plane: ComplexPlane,
    // Passed through untouched to the lattice result.
    sizing: Sizing,
    // Width and height of one pixel in parameter units.
    steps: (f64, f64),
    // The multipliers of the complex plane to the integral plane.
    grid_factors: (f64, f64),
}

// Tolerance for deciding that width * dpi landed on an integer.
const INTEGRAL_SLACK: f64 = 1e-9;

fn pixel_count(extent: f64, dpi: f64) -> Option<usize> {
    let n = extent * dpi;
    let rounded = n.round();
    if n.is_finite() && rounded >= 1.0 && (n - rounded).abs() < INTEGRAL_SLACK {
        Some(rounded as usize)
    } else {
        None
    }
}

impl Viewport {
    /// Frame `x_bounds` by `y_bounds` as a grid of `width * dpi` by
    /// `height * dpi` pixels.
    pub fn build(
        x_bounds: (f64, f64),
        y_bounds: (f64, f64),
        width: f64,
        height: f64,
        dpi: f64,
    ) -> Result<Viewport> {
        let (x_min, x_max) = x_bounds;
        let (y_min, y_max) = y_bounds;

        // Written this way round so that NaN bounds are rejected too.
        if !(x_max > x_min) || !(y_max > y_min) || !(x_max - x_min).is_finite()
            || !(y_max - y_min).is_finite()
        {
            return Err(LatticeError::InvalidBounds {
                x_min,
                x_max,
                y_min,
                y_max,
            });
        }

        let resolution = || LatticeError::InvalidResolution { width, height, dpi };
        let pixels_x = pixel_count(width, dpi).ok_or_else(resolution)?;
        let pixels_y = pixel_count(height, dpi).ok_or_else(resolution)?;

        Ok(Viewport {
            integral_plane: IntegralPlane(pixels_x, pixels_y),
            complex_plane: ComplexPlane(Complex::new(x_min, y_min), Complex::new(x_max, y_max)),
            sizing: Sizing { width, height, dpi },
            steps: (
                (x_max - x_min) / (pixels_x as f64),
                (y_max - y_min) / (pixels_y as f64),
            ),
            grid_factors: (
                (pixels_x as f64) / (x_max - x_min),
                (pixels_y as f64) / (y_max - y_min),
            ),
        })
    }

    /// Frame a rectangle with an explicit pixel grid, at one dot per
    /// unit.
    pub fn with_pixels(
        x_bounds: (f64, f64),
        y_bounds: (f64, f64),
        pixels_x: usize,
        pixels_y: usize,
    ) -> Result<Viewport> {
        Viewport::build(x_bounds, y_bounds, pixels_x as f64, pixels_y as f64, 1.0)
    }

    /// Number of columns.
    pub fn pixels_x(&self) -> usize {
        self.integral_plane.0
    }

    /// Number of rows.
    pub fn pixels_y(&self) -> usize {
        self.integral_plane.1
    }

    /// The total number of points in the integral grid.  Used to
    /// calculate memory needs.
    pub fn len(&self) -> usize {
        self.integral_plane.0 * self.integral_plane.1
    }

    /// True when the integral grid holds no points.
    pub fn is_empty(&self) -> bool {
        self.integral_plane.0 == 0 || self.integral_plane.1 == 0
    }

    /// The physical size the lattice will be drawn at.
    pub fn sizing(&self) -> Sizing {
        self.sizing
    }

    /// The lower-left corner of the parameter rectangle.
    pub fn leftlower(&self) -> Complex<f64> {
        self.complex_plane.0
    }

    /// The upper-right corner of the parameter rectangle.
    pub fn rightupper(&self) -> Complex<f64> {
        self.complex_plane.1
    }

    /// Given a pixel on the integral cartesian plane, map it to the
    /// lower-left corner of its cell on the complex cartesian plane.
    pub fn pixel_to_param(&self, i: usize, j: usize) -> Complex<f64> {
        Complex::new(
            self.complex_plane.0.re + (i as f64) * self.steps.0,
            self.complex_plane.0.im + (j as f64) * self.steps.1,
        )
    }

    /// Same as `pixel_to_param`, taking a `Pixel`.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        self.pixel_to_param(pixel.0, pixel.1)
    }

    /// Given a point on the complex plane, the pixel whose cell holds
    /// it, or None when the point lies outside the rectangle.  Points
    /// outside are never clamped onto the border.
    pub fn point_to_pixel(&self, point: &Complex<f64>) -> Option<Pixel> {
        let left = (point.re - self.complex_plane.0.re) * self.grid_factors.0;
        let top = (point.im - self.complex_plane.0.im) * self.grid_factors.1;
        // Negated comparisons so NaN falls outside.
        if !(left >= 0.0 && left < self.integral_plane.0 as f64)
            || !(top >= 0.0 && top < self.integral_plane.1 as f64)
        {
            return None;
        }
        Some(Pixel(left as usize, top as usize))
    }

    /// Since the Buddhabrot actually tracks the progress of a complex
    /// number as it orbits, we have to map those complex numbers back
    /// to the pixel plane.  This function takes a point, maps it to
    /// pixel coordinates, then returns the row-major offset from the
    /// root of the lattice buffer.
    pub fn point_to_offset(&self, point: &Complex<f64>) -> Option<usize> {
        self.point_to_pixel(point)
            .map(|Pixel(x, y)| y * self.integral_plane.0 + x)
    }
}
