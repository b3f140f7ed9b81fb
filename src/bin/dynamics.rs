// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use num::Complex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use complex_dynamics::{
    accumulate, default_threads, julia, julia_distance, lyapunov, mandelbrot, random_walk_3d, sample_pool, EscapeConfig,
    ExposureConfig, IterationMap, JuliaSeries, LatticeError, LatticeResult, LyapunovConfig,
    MoveSet, Result, SamplingConfig, Tracking, Viewport, WalkConfig,
};

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_complex(s: &str) -> Option<Complex<f64>> {
    parse_pair(s, ',').map(|(re, im)| Complex { re, im })
}

fn parse_triple(s: &str) -> Option<[f64; 3]> {
    let parts: Vec<f64> = s
        .split(',')
        .map(f64::from_str)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match parts[..] {
        [x, y, z] => Some([x, y, z]),
        _ => None,
    }
}

fn parse_list<T: FromStr>(s: &str) -> Option<Vec<T>> {
    s.split(',').map(|v| T::from_str(v.trim()).ok()).collect()
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> std::result::Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> std::result::Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_map(s: String) -> std::result::Result<(), String> {
    IterationMap::from_str(&s).map(|_| ())
}

const OUTPUT: &str = "output";
const XBOUNDS: &str = "xbounds";
const YBOUNDS: &str = "ybounds";
const SIZE: &str = "size";
const DPI: &str = "dpi";
const THREADS: &str = "threads";
const MAP: &str = "map";
const MAXITER: &str = "maxiter";
const RADIUS: &str = "radius";
const PARAM: &str = "c";
const PARAM_END: &str = "to";
const FRAMES: &str = "frames";
const DISTANCE: &str = "distance";
const SAMPLES: &str = "samples";
const SAMPLE_MAXITER: &str = "sample-maxiter";
const HORIZON: &str = "horizon";
const EXPOSURES: &str = "exposures";
const SEED: &str = "seed";
const SEQUENCE: &str = "sequence";
const WARMUP_RATIO: &str = "warmup-ratio";
const STRICT: &str = "strict";
const TRANSPOSE: &str = "transpose";
const WALKERS: &str = "walkers";
const STEPS: &str = "steps";
const BIAS: &str = "bias";
const BIAS_DIRECTION: &str = "bias-direction";
const DISPLACEMENT: &str = "displacement";
const SLICE_STEPS: &str = "slice-steps";

fn number<'a, 'b>(name: &'a str, default: &'a str, help: &'a str) -> Arg<'a, 'b> {
    Arg::with_name(name)
        .long(name)
        .takes_value(true)
        .allow_hyphen_values(true)
        .default_value(default)
        .validator(|s| match f64::from_str(&s) {
            Ok(v) if v.is_finite() => Ok(()),
            _ => Err(format!("Could not parse '{}' as a number", s)),
        })
        .help(help)
}

fn count<'a, 'b>(name: &'a str, default: &'a str, help: &'a str) -> Arg<'a, 'b> {
    Arg::with_name(name)
        .long(name)
        .takes_value(true)
        .default_value(default)
        .validator(|s| match u64::from_str(&s) {
            Ok(_) => Ok(()),
            Err(_) => Err(format!("Could not parse '{}' as a count", s)),
        })
        .help(help)
}

fn framing<'a, 'b>(x: &'a str, y: &'a str) -> Vec<Arg<'a, 'b>> {
    let max_threads = num_cpus::get().max(1) * 4;

    vec![
        Arg::with_name(OUTPUT)
            .required(true)
            .long(OUTPUT)
            .short("o")
            .takes_value(true)
            .help("Output file for the lattice"),
        Arg::with_name(XBOUNDS)
            .long(XBOUNDS)
            .short("x")
            .takes_value(true)
            .allow_hyphen_values(true)
            .default_value(x)
            .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse x bounds"))
            .help("Left and right edges of the parameter rectangle"),
        Arg::with_name(YBOUNDS)
            .long(YBOUNDS)
            .short("y")
            .takes_value(true)
            .allow_hyphen_values(true)
            .default_value(y)
            .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse y bounds"))
            .help("Bottom and top edges of the parameter rectangle"),
        Arg::with_name(SIZE)
            .long(SIZE)
            .short("s")
            .takes_value(true)
            .default_value("5x5")
            .validator(|s| validate_pair::<f64>(&s, 'x', "Could not parse output size"))
            .help("Physical width and height of the output"),
        Arg::with_name(DPI)
            .long(DPI)
            .short("d")
            .takes_value(true)
            .default_value("100")
            .validator(|s| validate_range(&s, 1.0, 10_000.0, "Could not parse dpi", "dpi must be between 1 and 10000"))
            .help("Dots per unit of width and height"),
        Arg::with_name(THREADS)
            .long(THREADS)
            .short("t")
            .takes_value(true)
            .validator(move |s| {
                validate_range(
                    &s,
                    1,
                    max_threads,
                    "Could not parse thread count",
                    &format!("Thread count must be between 1 and {}", max_threads),
                )
            })
            .help("Number of threads to use in solver; defaults to one per core"),
    ]
}

fn map_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name(MAP)
        .long(MAP)
        .short("m")
        .takes_value(true)
        .default_value("power:2")
        .validator(validate_map)
        .help("Iteration map: power[:N], cosine, magnetic1, magnetic2 or logistic")
}

fn radius_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name(RADIUS)
        .long(RADIUS)
        .takes_value(true)
        .allow_hyphen_values(true)
        .help("Escape radius override")
}

fn args<'a>() -> ArgMatches<'a> {
    App::new("dynamics")
        .version("0.1.0")
        .about("Computes lattices for escape-time, Buddhabrot, Lyapunov and random-walk pictures")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("mandelbrot")
                .about("Escape-time field over parameter space")
                .args(&framing("-1.70,0.75", "-1.25,1.25"))
                .arg(map_arg())
                .arg(count(MAXITER, "500", "Steps before a pixel counts as captive"))
                .arg(radius_arg()),
        )
        .subcommand(
            SubCommand::with_name("julia")
                .about("Escape-time field over starting states for a fixed parameter")
                .args(&framing("-1.5,1.5", "-1.5,1.5"))
                .arg(map_arg())
                .arg(count(MAXITER, "500", "Steps before a pixel counts as captive"))
                .arg(radius_arg())
                .arg(
                    Arg::with_name(PARAM)
                        .long(PARAM)
                        .short("c")
                        .required(true)
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse parameter"))
                        .help("The fixed parameter, as re,im"),
                )
                .arg(
                    Arg::with_name(DISTANCE)
                        .long(DISTANCE)
                        .conflicts_with(PARAM_END)
                        .help("Write distance estimates instead of step counts"),
                )
                .arg(
                    Arg::with_name(PARAM_END)
                        .long(PARAM_END)
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .requires(FRAMES)
                        .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse final parameter"))
                        .help("Final parameter of an animation series"),
                )
                .arg(
                    Arg::with_name(FRAMES)
                        .long(FRAMES)
                        .takes_value(true)
                        .requires(PARAM_END)
                        .validator(|s| validate_range(&s, 2, 100_000, "Could not parse frame count", "Frame count must be between 2 and 100000"))
                        .help("Frames in the series, one file each"),
                ),
        )
        .subcommand(
            SubCommand::with_name("buddhabrot")
                .about("Orbit-density histograms, one per exposure")
                .args(&framing("-1.75,0.85", "-1.10,1.10"))
                .arg(map_arg())
                .arg(count(SAMPLES, "100000", "Candidate parameters to draw"))
                .arg(count(SAMPLE_MAXITER, "1000", "Steps a candidate gets to escape"))
                .arg(number(HORIZON, "1e6", "Escape radius"))
                .arg(
                    Arg::with_name(EXPOSURES)
                        .long(EXPOSURES)
                        .short("e")
                        .takes_value(true)
                        .default_value("100,1000,10000")
                        .validator(|s| match parse_list::<u32>(&s) {
                            Some(_) => Ok(()),
                            None => Err("Could not parse exposure list".to_string()),
                        })
                        .help("Iteration caps, one histogram layer each"),
                )
                .arg(count(SEED, "0", "Seed for the candidate generator")),
        )
        .subcommand(
            SubCommand::with_name("lyapunov")
                .about("Lyapunov exponents of a forced logistic map")
                .args(&framing("2.60,4.0", "2.45,4.0"))
                .arg(
                    Arg::with_name(SEQUENCE)
                        .long(SEQUENCE)
                        .takes_value(true)
                        .default_value("AB")
                        .help("Forced string over A and B"),
                )
                .arg(count(MAXITER, "100", "Steps that count toward the exponent"))
                .arg(number(WARMUP_RATIO, "3", "Warm-up length as a multiple of maxiter"))
                .arg(Arg::with_name(STRICT).long(STRICT).help("Fail on the first non-finite pixel"))
                .arg(Arg::with_name(TRANSPOSE).long(TRANSPOSE).help("Swap the axes of the lattice")),
        )
        .subcommand(
            SubCommand::with_name("walk")
                .about("Occupancy of biased 3-D random walks")
                .args(&framing("-100,100", "-100,100"))
                .arg(count(WALKERS, "1", "Independent walkers"))
                .arg(count(STEPS, "10000", "Moves per walker"))
                .arg(number(BIAS, "0", "Preference for moves along the bias direction"))
                .arg(
                    Arg::with_name(BIAS_DIRECTION)
                        .long(BIAS_DIRECTION)
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .default_value("0,0,1")
                        .help("Favoured direction, as x,y,z"),
                )
                .arg(
                    Arg::with_name(DISPLACEMENT)
                        .long(DISPLACEMENT)
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .default_value("0,0,0")
                        .help("Starting point, as x,y,z"),
                )
                .arg(
                    Arg::with_name(SLICE_STEPS)
                        .long(SLICE_STEPS)
                        .takes_value(true)
                        .help("Steps per time slice; omit for a single cumulative slice"),
                )
                .arg(count(SEED, "0", "Seed for the walkers")),
        )
        .get_matches()
}

fn bad(what: &str) -> LatticeError {
    LatticeError::InvalidConfig(format!("could not parse {}", what))
}

fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    matches
        .value_of(name)
        .and_then(|s| T::from_str(s).ok())
        .ok_or_else(|| bad(name))
}

fn viewport(matches: &ArgMatches) -> Result<Viewport> {
    let pair = |name: &str, sep: char| {
        matches
            .value_of(name)
            .and_then(|s| parse_pair::<f64>(s, sep))
            .ok_or_else(|| bad(name))
    };
    let (width, height) = pair(SIZE, 'x')?;
    Viewport::build(pair(XBOUNDS, ',')?, pair(YBOUNDS, ',')?, width, height, value(matches, DPI)?)
}

fn threads(matches: &ArgMatches) -> Result<usize> {
    match matches.value_of(THREADS) {
        None => Ok(default_threads()),
        Some(_) => value(matches, THREADS),
    }
}

fn radius(matches: &ArgMatches) -> Result<Option<f64>> {
    match matches.value_of(RADIUS) {
        None => Ok(None),
        Some(s) => f64::from_str(s).map(Some).map_err(|_| bad(RADIUS)),
    }
}

/// `out.json` with suffix `100` becomes `out-100.json`.
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}-{}", stem, suffix),
    };
    path.with_file_name(name)
}

fn save<T: Serialize>(lattice: &LatticeResult<T>, path: &Path) -> Result<()> {
    lattice.save(path)?;
    let (columns, rows, slices) = lattice.shape();
    info!(path = %path.display(), columns, rows, slices, "lattice written");
    Ok(())
}

fn run_escape(matches: &ArgMatches, is_julia: bool) -> Result<()> {
    let vp = viewport(matches)?;
    let map: IterationMap = value(matches, MAP)?;
    let config = EscapeConfig {
        maxiter: value(matches, MAXITER)?,
        radius: radius(matches)?,
        threads: threads(matches)?,
    };
    let output = Path::new(matches.value_of(OUTPUT).ok_or_else(|| bad(OUTPUT))?);

    if !is_julia {
        return save(&mandelbrot(&vp, &map, &config)?, output);
    }

    let c = matches
        .value_of(PARAM)
        .and_then(parse_complex)
        .ok_or_else(|| bad(PARAM))?;
    match matches.value_of(PARAM_END) {
        None if matches.is_present(DISTANCE) => {
            save(&julia_distance(c, &vp, &map, &config)?, output)
        }
        None => save(&julia(c, &vp, &map, &config)?, output),
        Some(end) => {
            let end = parse_complex(end).ok_or_else(|| bad(PARAM_END))?;
            let frames: usize = value(matches, FRAMES)?;
            let params = (0..frames)
                .map(|i| c + (end - c) * (i as f64 / (frames - 1) as f64))
                .collect();
            let series = JuliaSeries::new(params, vp, map, config);
            for (i, frame) in series.compute_all()?.iter().enumerate() {
                save(frame, &suffixed(output, &format!("{:05}", i)))?;
            }
            Ok(())
        }
    }
}

fn run_buddhabrot(matches: &ArgMatches) -> Result<()> {
    let vp = viewport(matches)?;
    let map: IterationMap = value(matches, MAP)?;
    let threads = threads(matches)?;
    let horizon = value(matches, HORIZON)?;
    let sampling = SamplingConfig {
        samples: value(matches, SAMPLES)?,
        maxiter: value(matches, SAMPLE_MAXITER)?,
        horizon,
        seed: value(matches, SEED)?,
        threads,
    };
    let exposures = ExposureConfig {
        maxiters: matches
            .value_of(EXPOSURES)
            .and_then(parse_list)
            .ok_or_else(|| bad(EXPOSURES))?,
        horizon,
        threads,
    };
    let output = Path::new(matches.value_of(OUTPUT).ok_or_else(|| bad(OUTPUT))?);

    let pool = sample_pool(&vp, &map, &sampling)?;
    let layers = accumulate(&vp, &pool, &exposures)?;
    for (layer, maxiter) in layers.iter().zip(&exposures.maxiters) {
        save(layer, &suffixed(output, &maxiter.to_string()))?;
    }
    Ok(())
}

fn run_lyapunov(matches: &ArgMatches) -> Result<()> {
    let vp = viewport(matches)?;
    let config = LyapunovConfig {
        sequence: matches.value_of(SEQUENCE).unwrap_or("AB").to_string(),
        maxiter: value(matches, MAXITER)?,
        warmup_ratio: value(matches, WARMUP_RATIO)?,
        strict: matches.is_present(STRICT),
        transpose: matches.is_present(TRANSPOSE),
        threads: threads(matches)?,
    };
    let output = Path::new(matches.value_of(OUTPUT).ok_or_else(|| bad(OUTPUT))?);
    save(&lyapunov(&vp, &config)?, output)
}

fn run_walk(matches: &ArgMatches) -> Result<()> {
    let vp = viewport(matches)?;
    let triple = |name: &str| {
        matches
            .value_of(name)
            .and_then(parse_triple)
            .ok_or_else(|| bad(name))
    };
    let tracking = match matches.value_of(SLICE_STEPS) {
        None => Tracking::Cumulative,
        Some(_) => Tracking::Temporal {
            slice_steps: value(matches, SLICE_STEPS)?,
        },
    };
    let config = WalkConfig {
        walkers: value(matches, WALKERS)?,
        steps: value(matches, STEPS)?,
        moves: MoveSet::six_connected(),
        bias: value(matches, BIAS)?,
        bias_direction: triple(BIAS_DIRECTION)?,
        displacement: triple(DISPLACEMENT)?,
        tracking,
        seed: value(matches, SEED)?,
        threads: threads(matches)?,
    };
    let output = Path::new(matches.value_of(OUTPUT).ok_or_else(|| bad(OUTPUT))?);
    save(&random_walk_3d(&vp, &config)?, output)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("complex_dynamics=info,dynamics=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = args();
    let outcome = match matches.subcommand() {
        ("mandelbrot", Some(sub)) => run_escape(sub, false),
        ("julia", Some(sub)) => run_escape(sub, true),
        ("buddhabrot", Some(sub)) => run_buddhabrot(sub),
        ("lyapunov", Some(sub)) => run_lyapunov(sub),
        ("walk", Some(sub)) => run_walk(sub),
        _ => Err(LatticeError::InvalidConfig("no computation requested".to_string())),
    };

    if let Err(e) = outcome {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
