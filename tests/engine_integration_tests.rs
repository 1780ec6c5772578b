//! End-to-end tests for the billiard engine
//!
//! Builds billiards from settings the way the CLI does and checks whole
//! orbits, preimage expansion, and the worker pool.

use billiard_core::arc_region::ArcRegion;
use billiard_core::billiard::{Billiard, BilliardState};
use billiard_core::geometry::Segment;
use billiard_core::hyperbolic_models::{HyperPoint, HyperbolicModel};
use billiard_core::inner::InnerState;
use billiard_core::mobius::MobiusTransformation;
use billiard_core::outer::OuterState;
use billiard_core::settings::{BilliardSettings, Duality, Plane, TableSpec};
use billiard_core::table::{LpCircle, Side, Table};
use billiard_core::worker::{SingularityRequest, SingularityWorker};
use billiard_core::{signed_angle, BilliardError, Point};
use std::f64::consts::PI;
use std::time::Duration;

fn hyperbolic_triangle_settings() -> BilliardSettings {
    BilliardSettings {
        duality: Duality::Outer,
        plane: Plane::Hyperbolic,
        table: TableSpec::Polygon {
            vertices: (0..3)
                .map(|i| Point::polar(0.1, i as f64 * 2.0 * PI / 3.0 + PI / 2.0))
                .collect(),
        },
        ..Default::default()
    }
}

#[test]
fn test_circle_diameter_orbit() {
    let billiard = Billiard::from_settings(&BilliardSettings::default()).unwrap();
    let orbit = billiard.play(BilliardState::Inner(InnerState::new(0.25, 0.75)), 20);
    assert!(orbit.is_complete(), "orbit stopped: {:?}", orbit.error);
    assert_eq!(orbit.len(), 21);

    for state in &orbit.states {
        let BilliardState::Inner(chord) = state else {
            panic!("inner billiard produced {:?}", state);
        };
        let gap = (chord.end_time - chord.start_time).rem_euclid(1.0);
        assert!((gap - 0.5).abs() < 1e-6, "chord {:?} is not a diameter", chord);
    }
}

#[test]
fn test_hyperbolic_triangle_preimages() {
    let billiard = Billiard::from_settings(&hyperbolic_triangle_settings()).unwrap();
    let Billiard::Outer(outer) = &billiard else {
        panic!("expected an outer billiard");
    };

    // A point far from the origin still has a well-defined orbit.
    let start = BilliardState::Outer(OuterState::Hyperbolic(
        HyperPoint::from_true_polar(4.0, 0.3, HyperbolicModel::Poincare).unwrap(),
    ));
    let orbit = billiard.play(start, 10);
    assert!(orbit.len() > 1);

    let batches = outer.iterate_preimages(10).unwrap();
    assert_eq!(batches.len(), 10);
    assert!(batches.iter().any(|b| !b.is_empty()));
}

#[test]
fn test_reflection_flips_tangential_angle() {
    let table = LpCircle::new(2.0).unwrap();
    let billiard = Billiard::from_settings(&BilliardSettings::default()).unwrap();
    let state = InnerState::new(0.1, 0.45);
    let BilliardState::Inner(next) = billiard.step(&BilliardState::Inner(state)).unwrap() else {
        panic!("inner billiard left the inner phase space");
    };

    let exit = table.point(state.end_time);
    // Arriving: the chord points out of the table, right of the tangent.
    let entry = table.point(state.start_time);
    let incoming = table.tangential_angle(state.end_time, entry, Side::Left);
    // Leaving: back into the table, left of the tangent.
    let outgoing = signed_angle(
        (table.point(next.end_time) - exit).heading() - table.tangent_heading(state.end_time),
    );
    assert!(incoming < 0.0 && outgoing > 0.0);
    assert!((incoming + outgoing).abs() < 1e-6);
}

#[test]
fn test_square_orientation_grid() {
    let corners = [
        Point::new(-0.5, -0.5),
        Point::new(0.5, -0.5),
        Point::new(0.5, 0.5),
        Point::new(-0.5, 0.5),
    ];
    let sides = |order: &[usize]| -> ArcRegion {
        let segments = (0..4)
            .map(|i| Segment::line(corners[order[i]], corners[order[(i + 1) % 4]]).unwrap())
            .collect();
        ArcRegion::new(segments).unwrap()
    };
    let ccw = sides(&[0, 1, 2, 3]);
    let cw = sides(&[3, 2, 1, 0]);

    assert!(ccw.contains_point(Point::ZERO));
    assert!(!ccw.contains_point(Point::new(2.0, 2.0)));
    for i in -8..=8 {
        for j in -8..=8 {
            let p = Point::new(i as f64 * 0.13, j as f64 * 0.13);
            assert_eq!(ccw.contains_point(p), cw.contains_point(p), "disagree at {}", p);
        }
    }
}

#[test]
fn test_compose_with_inverse_is_identity() {
    let m = MobiusTransformation::point_reflection(Point::new(0.2, -0.3))
        .unwrap()
        .compose(&MobiusTransformation::rotation(0.7));
    let id = m.compose(&m.inverse());
    for k in 0..16 {
        let z = Point::polar(0.9 * k as f64 / 16.0, k as f64);
        assert!(id.apply(z).approx_eq(z, 1e-9));
    }
}

#[test]
fn test_settings_file_drives_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("square.json");
    BilliardSettings {
        duality: Duality::Outer,
        table: TableSpec::RegularPolygon {
            sides: 4,
            radius: 2f64.sqrt(),
            rotation: PI / 4.0,
        },
        iterations: 12,
        ..Default::default()
    }
    .save(&path)
    .unwrap();

    let settings = BilliardSettings::load(&path).unwrap();
    let billiard = Billiard::from_settings(&settings).unwrap();
    let orbit = billiard.play(
        BilliardState::Outer(OuterState::Affine(Point::new(0.5, 2.5))),
        settings.iterations,
    );
    assert!(orbit.is_complete());
    assert_eq!(orbit.len(), 13);
}

#[test]
fn test_orbit_stops_inside_table() {
    let settings = BilliardSettings {
        duality: Duality::Outer,
        table: TableSpec::Ellipse { a: 2.0, b: 1.0 },
        ..Default::default()
    };
    let billiard = Billiard::from_settings(&settings).unwrap();
    let orbit = billiard.play(BilliardState::Outer(OuterState::Affine(Point::new(0.1, 0.1))), 5);
    assert_eq!(orbit.len(), 1);
    assert!(matches!(orbit.error, Some(BilliardError::PointInsideTable(_))));
}

#[test]
fn test_worker_matches_direct_expansion() {
    let settings = hyperbolic_triangle_settings();
    let worker = SingularityWorker::spawn(2);
    worker
        .submit(SingularityRequest {
            id: 42,
            table: settings.table.clone(),
            plane: Plane::Hyperbolic,
            affine_horizon: settings.affine_horizon,
            frontier: Vec::new(),
            iterations: 3,
        })
        .unwrap();

    let mut last = None;
    while let Some(response) = worker.recv_timeout(Duration::from_secs(30)) {
        let done = !response.still_working;
        last = Some(response);
        if done {
            break;
        }
    }
    let last = last.expect("worker never answered");
    assert_eq!(last.id, 42);
    assert!(last.error.is_none());

    let Billiard::Outer(outer) = Billiard::from_settings(&settings).unwrap() else {
        panic!("expected an outer billiard");
    };
    let segments: usize = outer.iterate_preimages(3).unwrap().iter().map(|b| b.len()).sum();
    assert_eq!(last.singularities.len(), segments * 9);
    assert_eq!(worker.stats().submitted, 1);
    worker.shutdown();
}
