//! Billiard orbit runner
//!
//! Builds a billiard from a settings file, iterates an orbit, optionally
//! expands singularity preimages, and prints the result as JSON.
//!
//! Usage: billiard [--settings FILE] [--start X,Y | --chord T0,T1] [OPTIONS]

use billiard_core::billiard::{Billiard, BilliardState};
use billiard_core::geometry::Segment;
use billiard_core::hyperbolic_models::HyperPoint;
use billiard_core::inner::{InnerState, PhaseMode};
use billiard_core::logging::{init_logging, LoggingOptions};
use billiard_core::outer::OuterState;
use billiard_core::settings::{BilliardSettings, Duality, Plane};
use billiard_core::{BilliardError, Point};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::f64::consts::PI;
use tracing::info;

#[derive(Serialize)]
struct OrbitReport {
    settings: BilliardSettings,
    states: Vec<BilliardState>,
    points: Vec<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stopped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preimages: Option<Vec<Vec<Segment>>>,
}

fn parse_pair(value: &str) -> Option<(f64, f64)> {
    let mut parts = value.split(',').map(|s| s.trim().parse::<f64>());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(a)), Some(Ok(b)), None) => Some((a, b)),
        _ => None,
    }
}

fn random_start(
    billiard: &Billiard,
    settings: &BilliardSettings,
    rng: &mut StdRng,
) -> Result<BilliardState, BilliardError> {
    match billiard {
        Billiard::Inner(inner) => {
            let t = rng.gen::<f64>();
            let angle = rng.gen_range(0.1..PI - 0.1);
            let state = InnerState::from_phase(inner.table(), t, angle, PhaseMode::Angle)?;
            Ok(BilliardState::Inner(state))
        }
        Billiard::Outer(outer) => {
            let table = outer.table();
            let reach = table
                .sample(256)
                .iter()
                .map(|p| p.modulus())
                .fold(0.0, f64::max);
            if outer.plane() == Plane::Hyperbolic && reach >= 0.95 {
                return Err(BilliardError::Config(
                    "table reaches too close to the ideal boundary for a random start".into(),
                ));
            }
            loop {
                let theta = rng.gen_range(0.0..2.0 * PI);
                let state = match outer.plane() {
                    Plane::Affine => {
                        let z = Point::polar(rng.gen_range(1.5 * reach..4.0 * reach), theta);
                        if table.contains(z) {
                            continue;
                        }
                        OuterState::Affine(z)
                    }
                    Plane::Hyperbolic => {
                        let r = rng.gen_range(reach.max(0.5)..0.95);
                        let z = Point::polar(r, theta);
                        if table.contains(z) {
                            continue;
                        }
                        OuterState::Hyperbolic(HyperPoint::poincare(z)?.converted(settings.model))
                    }
                };
                return Ok(BilliardState::Outer(state));
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let mut settings_path: Option<String> = None;
    let mut start: Option<(f64, f64)> = None;
    let mut chord: Option<(f64, f64)> = None;
    let mut iterations: Option<usize> = None;
    let mut preimages: Option<usize> = None;
    let mut seed = 42u64;
    let mut output_file: Option<String> = None;
    let mut logging = LoggingOptions::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--settings" | "-s" => {
                if i + 1 < args.len() {
                    settings_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--start" => {
                if i + 1 < args.len() {
                    start = parse_pair(&args[i + 1]);
                    i += 1;
                }
            }
            "--chord" => {
                if i + 1 < args.len() {
                    chord = parse_pair(&args[i + 1]);
                    i += 1;
                }
            }
            "--iterations" | "-n" => {
                if i + 1 < args.len() {
                    iterations = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--preimages" | "-p" => {
                if i + 1 < args.len() {
                    preimages = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--seed" => {
                if i + 1 < args.len() {
                    seed = args[i + 1].parse().unwrap_or(seed);
                    i += 1;
                }
            }
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    output_file = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--log-level" => {
                if i + 1 < args.len() {
                    logging.level = args[i + 1].clone();
                    i += 1;
                }
            }
            "--json-logs" => logging.json = true,
            "--log-dir" => {
                if i + 1 < args.len() {
                    logging.log_dir = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: billiard [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --settings FILE     JSON settings");
                println!("                          (default: inner billiard in the unit circle)");
                println!("  --start X,Y             Outer billiard start point");
                println!("  --chord T0,T1           Inner billiard start chord");
                println!("  -n, --iterations NUM    Orbit length (default: from settings)");
                println!("  -p, --preimages NUM     Also expand NUM singularity batches");
                println!("  --seed NUM              Seed for a random start (default: 42)");
                println!("  -o, --output FILE       Write JSON here instead of stdout");
                println!("  --log-level FILTER      Log filter directive (default: info)");
                println!("  --json-logs             Log as JSON");
                println!("  --log-dir DIR           Also log to daily files in DIR");
                println!("  -h, --help              Show this help");
                return Ok(());
            }
            other => {
                eprintln!("Ignoring unknown argument {:?}", other);
            }
        }
        i += 1;
    }

    let _guard = init_logging(&logging)?;

    let mut settings = match &settings_path {
        Some(path) => BilliardSettings::load(path)?,
        None => BilliardSettings::default(),
    };
    if let Some(n) = iterations {
        settings.iterations = n;
    }
    let billiard = Billiard::from_settings(&settings)?;

    let initial = match (settings.duality, chord, start) {
        (Duality::Inner, Some((t0, t1)), _) => BilliardState::Inner(InnerState::new(t0, t1)),
        (Duality::Outer, _, Some((x, y))) => match settings.plane {
            Plane::Affine => BilliardState::Outer(OuterState::Affine(Point::new(x, y))),
            Plane::Hyperbolic => BilliardState::Outer(OuterState::Hyperbolic(HyperPoint::new(
                Point::new(x, y),
                settings.model,
            )?)),
        },
        _ => {
            let mut rng = StdRng::seed_from_u64(seed);
            random_start(&billiard, &settings, &mut rng)?
        }
    };
    info!(?initial, iterations = settings.iterations, "playing orbit");

    let orbit = billiard.play(initial, settings.iterations);
    let points = billiard.orbit_points(&orbit, settings.model);

    let preimages = match (preimages, &billiard) {
        (Some(n), Billiard::Outer(outer)) => Some(outer.iterate_preimages(n)?),
        (Some(_), Billiard::Inner(_)) => {
            return Err(BilliardError::UnsupportedConfiguration(
                "preimages are only defined for outer billiards".into(),
            )
            .into())
        }
        (None, _) => None,
    };

    let report = OrbitReport {
        settings,
        states: orbit.states,
        points,
        stopped: orbit.error.map(|e| e.to_string()),
        preimages,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match output_file {
        Some(path) => {
            std::fs::write(&path, json)?;
            info!(path = %path, "report written");
        }
        None => println!("{}", json),
    }
    Ok(())
}
