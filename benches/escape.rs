// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use num::Complex;

use complex_dynamics::buddha::{sample_pool, accumulate_layer, SamplingConfig};
use complex_dynamics::{escape_time, mandelbrot, EscapeConfig, IterationMap, Viewport};

fn bench_escape_time_captive(c: &mut Criterion) {
    let map = IterationMap::mandelbrot();
    let point = Complex::new(-0.1, 0.1);
    c.bench_function("escape_time_captive_1000", |b| {
        b.iter(|| escape_time(&map, Complex::new(0.0, 0.0), black_box(point), 1000, 2.0))
    });
}

fn bench_mandelbrot_field(c: &mut Criterion) {
    let vp = Viewport::with_pixels((-1.7, 0.75), (-1.25, 1.25), 160, 160).unwrap();
    let map = IterationMap::mandelbrot();
    let config = EscapeConfig {
        maxiter: 200,
        radius: None,
        threads: 1,
    };
    c.bench_function("mandelbrot_160x160", |b| {
        b.iter(|| mandelbrot(black_box(&vp), &map, &config))
    });
}

fn bench_buddhabrot_layer(c: &mut Criterion) {
    let vp = Viewport::with_pixels((-1.75, 0.85), (-1.1, 1.1), 64, 64).unwrap();
    let map = IterationMap::mandelbrot();
    let sampling = SamplingConfig {
        samples: 5000,
        maxiter: 200,
        horizon: 4.0,
        seed: 7,
        threads: 1,
    };
    let pool = sample_pool(&vp, &map, &sampling).unwrap();
    c.bench_function("buddhabrot_layer_200", |b| {
        b.iter(|| accumulate_layer(black_box(&vp), &pool, 200, 4.0, 1))
    });
}

criterion_group!(
    benches,
    bench_escape_time_captive,
    bench_mandelbrot_field,
    bench_buddhabrot_layer
);
criterion_main!(benches);
