//! End-to-end persistence behavior: generate, flush, reload, and compare.

use std::collections::HashSet;
use std::sync::Arc;

use roadgen::{GenConfig, HeightSource, Point, RoadMap};

struct Flat(f32);

impl HeightSource for Flat {
    fn sample(&self, _x: i32, _y: i32) -> f32 {
        self.0
    }
}

/// Short roads and a sparse spawn rate keep full-region passes quick.
fn test_config() -> GenConfig {
    GenConfig {
        min_road_length: 64,
        max_road_length: 128,
        road_chance: 1.0 / 2000.0,
        max_branches: 4,
        ..GenConfig::default()
    }
}

#[test]
fn networks_roundtrip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let gen = Flat(30.0);

    let generated = {
        let map = RoadMap::new(dir.path(), 3, test_config());
        let region = map.get_region(&gen, 0, 0);
        assert!(region.is_fully_generated());
        assert!(
            !region.networks().is_empty(),
            "flat terrain at this spawn rate yields networks"
        );
        map.flush();
        region
    };

    // A fresh map must serve the region straight from disk.
    let map = RoadMap::new(dir.path(), 3, test_config());
    let reloaded = map.get_region(&gen, 0, 0);
    assert!(reloaded.is_fully_generated());
    assert_eq!(reloaded.quad_mask(), generated.quad_mask());
    assert_eq!(reloaded.networks().len(), generated.networks().len());

    let origins: HashSet<Point> = generated
        .networks()
        .iter()
        .map(|n| n.origin_point())
        .collect();
    for n in reloaded.networks() {
        assert!(origins.contains(&n.origin_point()));
        let original = generated
            .networks()
            .iter()
            .find(|o| o.origin_point() == n.origin_point())
            .unwrap();
        assert_eq!(n.roads().len(), original.roads().len());
        for (ra, rb) in n.roads().iter().zip(original.roads()) {
            assert_eq!(ra.level, rb.level);
            assert_eq!(ra.vertices().len(), rb.vertices().len());
            for (va, vb) in ra.vertices().iter().zip(rb.vertices()) {
                // Positions and flags survive exactly; angles and
                // integrity are fixed-point with three decimals.
                assert_eq!((va.x, va.y, va.radius, va.color), (vb.x, vb.y, vb.radius, vb.color));
                assert_eq!(va.flags, vb.flags);
                assert!((va.theta - vb.theta).abs() <= 0.001);
                assert!((va.x_angle - vb.x_angle).abs() <= 0.001);
                assert!((va.integrity - vb.integrity).abs() <= 0.001);
            }
        }
    }
}

#[test]
fn network_lookup_by_origin() {
    let dir = tempfile::tempdir().unwrap();
    let gen = Flat(30.0);
    let map = RoadMap::new(dir.path(), 3, test_config());
    let region = map.get_region(&gen, 0, 0);
    map.flush();

    for n in region.networks() {
        let o = n.origin_point();
        let found = map.get_network(o.x, o.y).expect("cached network by origin");
        assert_eq!(found.origin_point(), o);
        assert_eq!(
            (found.min_x, found.max_x, found.min_y, found.max_y),
            (n.min_x, n.max_x, n.min_y, n.max_y)
        );
    }
}

#[test]
fn straddling_networks_agree_across_regions() {
    let gen = Flat(30.0);
    let mut straddlers = 0;

    for seed in 1..=5 {
        let dir = tempfile::tempdir().unwrap();
        let map = RoadMap::new(dir.path(), seed, test_config());
        let a = map.get_region(&gen, 0, 0);
        let b = map.get_region(&gen, 1, 0);

        for n in a.networks() {
            if !n.overlaps_region(1, 0) {
                continue;
            }
            straddlers += 1;
            let twin = b
                .networks()
                .iter()
                .find(|m| m.origin_point() == n.origin_point())
                .expect("straddling network present in both regions");
            assert_eq!(twin.roads().len(), n.roads().len());
            for (ra, rb) in twin.roads().iter().zip(n.roads()) {
                assert_eq!(ra.vertices(), rb.vertices());
            }
        }
        for m in b.networks() {
            if m.overlaps_region(0, 0) {
                assert!(
                    a.networks()
                        .iter()
                        .any(|n| n.origin_point() == m.origin_point()),
                    "straddling network missing from the first region"
                );
            }
        }
    }
    assert!(straddlers > 0, "no border-straddling network in 5 seeds");
}

#[test]
fn long_road_straddlers_shared_across_regions() {
    // A narrow land corridor forces long roads along the x axis, so
    // networks routinely reach across the region border. Every network
    // overlapping both regions must be listed by both, as the same
    // shared object.
    struct Corridor;
    impl HeightSource for Corridor {
        fn sample(&self, _x: i32, y: i32) -> f32 {
            if y.abs() <= 64 {
                30.0
            } else {
                -20.0
            }
        }
    }
    let config = GenConfig {
        min_road_length: 560,
        max_road_length: 768,
        road_chance: 1.0 / 250.0,
        max_branches: 2,
        ..GenConfig::default()
    };
    let mut straddlers = 0;

    for seed in 1..=3 {
        let dir = tempfile::tempdir().unwrap();
        let map = RoadMap::new(dir.path(), seed, config.clone());
        let a = map.get_region(&Corridor, 0, 0);
        let b = map.get_region(&Corridor, 1, 0);

        for n in a.networks() {
            if !n.overlaps_region(1, 0) {
                continue;
            }
            straddlers += 1;
            let twin = b
                .networks()
                .iter()
                .find(|m| m.origin_point() == n.origin_point())
                .unwrap_or_else(|| {
                    let o = n.origin_point();
                    panic!(
                        "network {o} (x {}..{}) overlaps region (1, 0) but is not listed there",
                        n.min_x, n.max_x
                    )
                });
            assert!(Arc::ptr_eq(twin, n), "straddler is a copy, not shared");
        }
        for m in b.networks() {
            if m.overlaps_region(0, 0) {
                assert!(
                    a.networks().iter().any(|n| Arc::ptr_eq(n, m)),
                    "straddling network missing from the first region"
                );
            }
        }
    }
    assert!(straddlers > 0, "no road crossed the border in 3 seeds");
}

#[test]
fn ocean_world_stays_empty_without_regenerating() {
    let dir = tempfile::tempdir().unwrap();
    let ocean = Flat(-10.0);

    {
        let map = RoadMap::new(dir.path(), 9, test_config());
        let region = map.get_region(&ocean, 0, 0);
        assert!(region.networks().is_empty());
        assert!(region.is_fully_generated());
        map.flush();
    }

    // No networks means no network files at all.
    assert!(!dir.path().join("networks").join("9").exists());

    // The empty result is trusted on reload because the quad mask marks
    // the region as fully generated.
    let map = RoadMap::new(dir.path(), 9, test_config());
    let reloaded = map.get_region(&ocean, 0, 0);
    assert!(reloaded.networks().is_empty());
    assert!(reloaded.is_fully_generated());
}

#[test]
fn seeds_produce_disjoint_storage() {
    let dir = tempfile::tempdir().unwrap();
    let gen = Flat(30.0);
    let map = RoadMap::new(dir.path(), 1, test_config());
    map.get_region(&gen, 0, 0);
    map.flush();
    assert!(dir.path().join("regions").join("1").exists());

    map.set_seed(2);
    map.get_region(&gen, 0, 0);
    map.flush();
    assert!(dir.path().join("regions").join("2").exists());

    map.delete_saves().unwrap();
    assert!(!dir.path().join("regions").exists());
    assert!(!dir.path().join("networks").exists());
}
