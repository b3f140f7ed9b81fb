// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The iteration maps.  Each one takes the current state `z` and the
//! parameter `c` and produces the next state.  None of them keep any
//! state of their own, so a single value can be shared by every worker.
//!
//! Overflow and NaN are not treated as faults here: a step is free to
//! produce them, and the evaluators read any non-finite modulus as
//! divergence.

use num::{Complex, One};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// A dynamical system `z -> f(z, c)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum IterationMap {
    /// `z^n + c`.  `n` may be any real number.
    Power(f64),
    /// `c * cos(z)`.
    Cosine,
    /// Magnetic model I: `((z^2 + c - 1) / (2z + c - 2))^2`.
    Magnetic1,
    /// Magnetic model II:
    /// `((z^3 + 3(c-1)z + (c-1)(c-2)) / (3z^2 + 3(c-2)z + (c-1)(c-2) + 1))^2`.
    Magnetic2,
    /// The logistic map `c * z * (1 - z)`.
    Logistic,
}

// Beyond this, integral exponents go through powf rather than
// repeated squaring.
const MAX_INTEGRAL_EXPONENT: f64 = 64.0;

fn power(z: Complex<f64>, n: f64) -> Complex<f64> {
    if n.fract() == 0.0 && n.abs() <= MAX_INTEGRAL_EXPONENT {
        let raised = num::pow(z, n.abs() as usize);
        if n < 0.0 {
            raised.inv()
        } else {
            raised
        }
    } else {
        z.powf(n)
    }
}

impl IterationMap {
    /// The quadratic map, `z^2 + c`.
    pub fn mandelbrot() -> IterationMap {
        IterationMap::Power(2.0)
    }

    /// Advance one step.
    #[inline]
    pub fn step(&self, z: Complex<f64>, c: Complex<f64>) -> Complex<f64> {
        let one = Complex::one();
        match *self {
            IterationMap::Power(n) if n == 2.0 => z * z + c,
            IterationMap::Power(n) => power(z, n) + c,
            IterationMap::Cosine => c * z.cos(),
            IterationMap::Magnetic1 => {
                let q = (z * z + c - one) / (z * 2.0 + c - 2.0);
                q * q
            }
            IterationMap::Magnetic2 => {
                let (c1, c2) = (c - one, c - 2.0);
                let q = (z * z * z + z * c1 * 3.0 + c1 * c2)
                    / (z * z * 3.0 + z * c2 * 3.0 + c1 * c2 + one);
                q * q
            }
            IterationMap::Logistic => c * z * (one - z),
        }
    }

    /// `d f / d z` at `(z, c)`.
    pub fn derivative(&self, z: Complex<f64>, c: Complex<f64>) -> Complex<f64> {
        let one = Complex::one();
        match *self {
            IterationMap::Power(n) => power(z, n - 1.0) * n,
            IterationMap::Cosine => -c * z.sin(),
            IterationMap::Magnetic1 => {
                let (u, v) = (z * z + c - one, z * 2.0 + c - 2.0);
                let (du, dv) = (z * 2.0, Complex::new(2.0, 0.0));
                let q = u / v;
                q * 2.0 * (du * v - u * dv) / (v * v)
            }
            IterationMap::Magnetic2 => {
                let (c1, c2) = (c - one, c - 2.0);
                let u = z * z * z + z * c1 * 3.0 + c1 * c2;
                let v = z * z * 3.0 + z * c2 * 3.0 + c1 * c2 + one;
                let du = z * z * 3.0 + c1 * 3.0;
                let dv = z * 6.0 + c2 * 3.0;
                let q = u / v;
                q * 2.0 * (du * v - u * dv) / (v * v)
            }
            IterationMap::Logistic => c * (one - z * 2.0),
        }
    }

    /// The state a Mandelbrot-mode orbit starts from: a critical point
    /// of the map.
    pub fn critical_point(&self) -> Complex<f64> {
        match *self {
            IterationMap::Logistic => Complex::new(0.5, 0.0),
            _ => Complex::new(0.0, 0.0),
        }
    }

    /// The modulus past which a state is taken to have escaped.
    pub fn divergence_radius(&self) -> f64 {
        match *self {
            IterationMap::Power(_) => 2.0,
            IterationMap::Cosine => 10.0 * PI,
            IterationMap::Magnetic1 | IterationMap::Magnetic2 => 100.0,
            IterationMap::Logistic => 8.0,
        }
    }
}

impl Default for IterationMap {
    fn default() -> Self {
        IterationMap::mandelbrot()
    }
}

impl fmt::Display for IterationMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            IterationMap::Power(n) => write!(f, "power:{}", n),
            IterationMap::Cosine => write!(f, "cosine"),
            IterationMap::Magnetic1 => write!(f, "magnetic1"),
            IterationMap::Magnetic2 => write!(f, "magnetic2"),
            IterationMap::Logistic => write!(f, "logistic"),
        }
    }
}

impl FromStr for IterationMap {
    type Err = String;

    /// Accepts `power`, `power:N`, `cosine`, `magnetic1`, `magnetic2`
    /// and `logistic`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, ':');
        let name = parts.next().unwrap_or("");
        let arg = parts.next();
        match (name, arg) {
            ("power", None) => Ok(IterationMap::mandelbrot()),
            ("power", Some(n)) => match f64::from_str(n) {
                Ok(n) if n.is_finite() => Ok(IterationMap::Power(n)),
                _ => Err(format!("Could not parse exponent '{}'", n)),
            },
            ("cosine", None) => Ok(IterationMap::Cosine),
            ("magnetic1", None) => Ok(IterationMap::Magnetic1),
            ("magnetic2", None) => Ok(IterationMap::Magnetic2),
            ("logistic", None) => Ok(IterationMap::Logistic),
            _ => Err(format!("Unknown iteration map '{}'", s)),
        }
    }
}

/// One step of the real logistic map.
#[inline]
pub fn logistic(r: f64, x: f64) -> f64 {
    r * x * (1.0 - x)
}

/// `d/dx` of the real logistic map.
#[inline]
pub fn logistic_derivative(r: f64, x: f64) -> f64 {
    r * (1.0 - 2.0 * x)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [IterationMap; 6] = [
        IterationMap::Power(2.0),
        IterationMap::Power(3.0),
        IterationMap::Cosine,
        IterationMap::Magnetic1,
        IterationMap::Magnetic2,
        IterationMap::Logistic,
    ];

    fn close(a: Complex<f64>, b: Complex<f64>, tolerance: f64) -> bool {
        (a - b).norm() <= tolerance * (1.0 + b.norm())
    }

    #[test]
    fn quadratic_step() {
        let map = IterationMap::mandelbrot();
        let z = Complex::new(1.0, 1.0);
        assert_eq!(map.step(z, Complex::new(0.5, 0.0)), Complex::new(0.5, 2.0));
    }

    #[test]
    fn power_exponent_is_a_parameter() {
        let z = Complex::new(0.5, -0.25);
        let c = Complex::new(-0.1, 0.2);
        assert!(close(IterationMap::Power(3.0).step(z, c), z * z * z + c, 1e-12));
        assert!(close(IterationMap::Power(-2.0).step(z, c), (z * z).inv() + c, 1e-12));
        assert!(close(IterationMap::Power(2.5).step(z, c), z.powf(2.5) + c, 1e-12));
        assert!(close(IterationMap::Power(2.0).step(z, c), power(z, 2.0) + c, 1e-12));
    }

    #[test]
    fn magnetic_maps_fix_one() {
        // z = 1 is a fixed point of both magnetic families.
        let c = Complex::new(1.7, 0.4);
        let one = Complex::new(1.0, 0.0);
        assert!(close(IterationMap::Magnetic1.step(one, c), one, 1e-12));
        assert!(close(IterationMap::Magnetic2.step(one, c), one, 1e-12));
    }

    #[test]
    fn cosine_and_logistic_steps() {
        let z = Complex::new(0.3, 0.1);
        let c = Complex::new(1.5, 0.5);
        assert!(close(IterationMap::Cosine.step(z, c), c * z.cos(), 1e-12));
        assert!(close(
            IterationMap::Logistic.step(Complex::new(0.25, 0.0), Complex::new(4.0, 0.0)),
            Complex::new(0.75, 0.0),
            1e-12
        ));
        assert_eq!(logistic(4.0, 0.25), 0.75);
        assert_eq!(logistic_derivative(4.0, 0.25), 2.0);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let z = Complex::new(0.37, -0.21);
        let c = Complex::new(0.8, 0.45);
        let h = 1e-6;
        for map in ALL.iter() {
            let dz = Complex::new(h, 0.0);
            let numeric = (map.step(z + dz, c) - map.step(z - dz, c)) / (2.0 * h);
            assert!(
                close(map.derivative(z, c), numeric, 1e-5),
                "{}: {} vs {}",
                map,
                map.derivative(z, c),
                numeric
            );
        }
    }

    #[test]
    fn overflow_is_not_a_fault() {
        let huge = Complex::new(1e300, 1e300);
        for map in ALL.iter() {
            let next = map.step(huge, Complex::new(0.5, 0.5));
            // Whatever comes out, the escape test must see it as outside.
            assert!(!(next.norm_sqr() <= 1e6), "{}", map);
        }
        let pole = IterationMap::Magnetic1.step(Complex::new(0.0, 0.0), Complex::new(2.0, 0.0));
        assert!(!(pole.norm_sqr() <= 100.0));
    }

    #[test]
    fn parses_map_names() {
        assert_eq!("power".parse(), Ok(IterationMap::Power(2.0)));
        assert_eq!("power:3".parse(), Ok(IterationMap::Power(3.0)));
        assert_eq!("cosine".parse(), Ok(IterationMap::Cosine));
        assert_eq!("magnetic2".parse(), Ok(IterationMap::Magnetic2));
        assert!("power:x".parse::<IterationMap>().is_err());
        assert!("sine".parse::<IterationMap>().is_err());
        for map in ALL.iter() {
            assert_eq!(map.to_string().parse(), Ok(*map));
        }
    }
}
