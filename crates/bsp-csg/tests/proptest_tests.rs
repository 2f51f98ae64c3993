//! Property-based tests for the boolean operations using the `proptest` crate.

mod common;

use proptest::prelude::*;

use bsp_csg::primitives::cuboid;
use bsp_csg::{Engine, Solid, Transform};
use nalgebra::{Matrix4, Vector3};

use common::{is_closed, same_surface};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// Box corners on a quarter-unit grid, so coincident faces come up often.
fn arb_grid_box() -> impl Strategy<Value = ([f64; 3], [f64; 3])> {
    (
        prop::array::uniform3(-8i32..8),
        prop::array::uniform3(1i32..8),
    )
        .prop_map(|(min, size)| {
            let min = min.map(|c| f64::from(c) * 0.25);
            let max = [
                min[0] + f64::from(size[0]) * 0.25,
                min[1] + f64::from(size[1]) * 0.25,
                min[2] + f64::from(size[2]) * 0.25,
            ];
            (min, max)
        })
}

/// Rotation about z, in radians.
fn arb_angle() -> impl Strategy<Value = f64> {
    -std::f64::consts::PI..std::f64::consts::PI
}

/// Rotations about z whose snapped cube corners, and the faces between
/// them, stay more than a few epsilons away from every quarter-grid corner
/// and plane. Closer contacts sit at the precision limit, where a face may
/// be treated as touching one of the boxes on one side and not the other.
fn arb_clear_angle() -> impl Strategy<Value = f64> {
    prop::sample::select(vec![0.1, 0.2, 0.7, 1.0, 2.1, 2.6, -0.7, -2.2])
}

fn box_volume((min, max): ([f64; 3], [f64; 3])) -> f64 {
    (max[0] - min[0]) * (max[1] - min[1]) * (max[2] - min[2])
}

fn overlap_volume(a: ([f64; 3], [f64; 3]), b: ([f64; 3], [f64; 3])) -> f64 {
    (0..3)
        .map(|i| (a.1[i].min(b.1[i]) - a.0[i].max(b.0[i])).max(0.0))
        .product()
}

fn solid((min, max): ([f64; 3], [f64; 3])) -> Solid {
    cuboid(min, max)
}

const TOL: f64 = 1e-9;

// ---------------------------------------------------------------------------
// 1. Volumes of grid boxes match inclusion-exclusion exactly
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn grid_box_volumes(a in arb_grid_box(), b in arb_grid_box()) {
        let engine = Engine::default();
        let solids = [solid(a), solid(b)];
        let both = overlap_volume(a, b);

        let intersection = engine.intersect(None, &solids).unwrap();
        prop_assert!((intersection.volume() - both).abs() < TOL,
            "intersection {} != {}", intersection.volume(), both);

        let union = engine.union(None, &solids).unwrap();
        let expected = box_volume(a) + box_volume(b) - both;
        prop_assert!((union.volume() - expected).abs() < TOL,
            "union {} != {}", union.volume(), expected);
        prop_assert!(is_closed(&union));

        let difference = engine.subtract(None, &solids).unwrap();
        let expected = box_volume(a) - both;
        prop_assert!((difference.volume() - expected).abs() < TOL,
            "difference {} != {}", difference.volume(), expected);
        prop_assert!(is_closed(&difference));
    }
}

// ---------------------------------------------------------------------------
// 2. Intersection and union commute up to fragmentation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn grid_box_commutativity(a in arb_grid_box(), b in arb_grid_box()) {
        let engine = Engine::default();
        let ab = [solid(a), solid(b)];
        let ba = [solid(b), solid(a)];

        let forward = engine.intersect(None, &ab).unwrap();
        let backward = engine.intersect(None, &ba).unwrap();
        prop_assert!(same_surface(&forward, &backward));

        let forward = engine.union(None, &ab).unwrap();
        let backward = engine.union(None, &ba).unwrap();
        prop_assert!(same_surface(&forward, &backward));
    }
}

// ---------------------------------------------------------------------------
// 3. Rotated operands still satisfy inclusion-exclusion
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn rotated_box_inclusion_exclusion(a in arb_grid_box(), angle in arb_angle()) {
        let engine = Engine::default();
        let rotation = Matrix4::new_rotation(Vector3::z() * angle);
        let b = cuboid([-1.0; 3], [1.0; 3]).with_transform(Transform::from_matrix(rotation));
        let solids = [solid(a), b];

        let both = engine.intersect(None, &solids).unwrap().volume();
        let union = engine.union(None, &solids).unwrap().volume();
        let only_a = engine.subtract(None, &solids).unwrap().volume();

        // Quantizing the rotated corners moves them by up to half an epsilon.
        prop_assert!((union - (box_volume(a) + 8.0 - both)).abs() < 0.05,
            "union {} vs {}", union, box_volume(a) + 8.0 - both);
        prop_assert!((only_a - (box_volume(a) - both)).abs() < 0.05,
            "difference {} vs {}", only_a, box_volume(a) - both);
    }
}

// ---------------------------------------------------------------------------
// 4. Rotated operands give closed results
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn rotated_box_results_are_closed(a in arb_grid_box(), angle in arb_clear_angle()) {
        let engine = Engine::default();
        let rotation = Matrix4::new_rotation(Vector3::z() * angle);
        let b = cuboid([-1.0; 3], [1.0; 3]).with_transform(Transform::from_matrix(rotation));
        let solids = [solid(a), b];

        let intersection = engine.intersect(None, &solids).unwrap();
        prop_assert!(is_closed(&intersection), "intersection at {} rad is open", angle);
        let union = engine.union(None, &solids).unwrap();
        prop_assert!(is_closed(&union), "union at {} rad is open", angle);
        let difference = engine.subtract(None, &solids).unwrap();
        prop_assert!(is_closed(&difference), "difference at {} rad is open", angle);

        prop_assert!((intersection.volume() + difference.volume() - box_volume(a)).abs() < 0.05);
    }
}
