//! Property tests for grid indexing and hull construction.
//!
//! Run with: `cargo test --test hull_properties`

use explore_tracker::{cell_for, center_of, compute_hull, extend_hull, GpsPoint};
use proptest::prelude::*;

const CELL_SIZE: f64 = 0.0005;

fn cross(o: &GpsPoint, a: &GpsPoint, b: &GpsPoint) -> f64 {
    (a.longitude - o.longitude) * (b.latitude - o.latitude)
        - (a.latitude - o.latitude) * (b.longitude - o.longitude)
}

fn point() -> impl Strategy<Value = GpsPoint> {
    (-1.0f64..1.0, -1.0f64..1.0).prop_map(|(lat, lng)| GpsPoint::new(45.0 + lat, 7.0 + lng))
}

proptest! {
    #[test]
    fn cell_center_within_half_cell(p in point(), origin in point()) {
        let cell = cell_for(&p, &origin, CELL_SIZE);
        let center = center_of(&cell, &origin, CELL_SIZE);
        let tolerance = CELL_SIZE / 2.0 + 1e-9;
        prop_assert!((center.latitude - p.latitude).abs() <= tolerance);
        prop_assert!((center.longitude - p.longitude).abs() <= tolerance);
        prop_assert_eq!(cell_for(&center, &origin, CELL_SIZE), cell);
    }

    #[test]
    fn hull_encloses_every_point(points in prop::collection::vec(point(), 3..60)) {
        let hull = compute_hull(&points);
        prop_assume!(hull.len() >= 3);
        for i in 0..hull.len() {
            let a = &hull[i];
            let b = &hull[(i + 1) % hull.len()];
            for p in &points {
                prop_assert!(cross(a, b, p) >= -1e-9);
            }
        }
    }

    #[test]
    fn hull_has_no_collinear_runs(points in prop::collection::vec(point(), 3..60)) {
        let hull = compute_hull(&points);
        prop_assume!(hull.len() >= 3);
        for i in 0..hull.len() {
            let turn = cross(
                &hull[i],
                &hull[(i + 1) % hull.len()],
                &hull[(i + 2) % hull.len()],
            );
            prop_assert!(turn > 0.0);
        }
    }

    #[test]
    fn hull_ignores_input_order(mut points in prop::collection::vec(point(), 3..40)) {
        let first = compute_hull(&points);
        points.reverse();
        prop_assert_eq!(compute_hull(&points), first);
    }

    #[test]
    fn incremental_hull_matches_full(
        points in prop::collection::vec(point(), 3..60),
        split in 0usize..60,
    ) {
        let split = split.min(points.len());
        let partial = compute_hull(&points[..split]);
        prop_assert_eq!(extend_hull(&partial, &points[split..]), compute_hull(&points));
    }
}
