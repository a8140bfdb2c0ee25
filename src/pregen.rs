//! Bulk pre-generation of regions around a center.
//!
//! Walks a diamond-shaped pattern of region offsets sorted by distance
//! from the center, skipping regions already on disk, and generates the
//! rest. With fewer than two worker threads the walk runs inline on the
//! calling thread; otherwise a scoped worker pool drains a shared queue,
//! each worker owning its own [`RoadGenerator`]. Both modes visit the
//! exact same set of regions.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::generator::RoadGenerator;
use crate::height::HeightSource;
use crate::map::RoadMap;

/// Pre-generates regions around `(cx, cy)`, blocking until done.
///
/// This is the blocking variant; it occupies the calling thread for the
/// whole walk even when a worker pool does the generation. Callers that
/// must stay responsive use [`run_background`] instead.
pub fn run<H: HeightSource + ?Sized>(map: &RoadMap, gen: &H, cx: i16, cy: i16) {
    let start = Instant::now();
    let config = map.config().clone();
    let offsets = sorted_offsets(config.pregen_radius, config.pregen_skew);
    if config.debug_pregen_shape {
        log_shape(&offsets, config.pregen_radius);
    }

    let pending: Vec<(i16, i16)> = offsets
        .iter()
        .map(|&(dx, dy)| (cx + dx, cy + dy))
        .filter(|&(x, y)| !map.region_on_disk(x, y))
        .collect();
    log::info!(
        "pre-generating {} of {} regions around ({cx}, {cy})",
        pending.len(),
        offsets.len()
    );

    let generated = if config.pregen_thread_count < 2 {
        let mut generator = RoadGenerator::new(config);
        for &(x, y) in &pending {
            map.generate_detached(&mut generator, gen, x, y);
        }
        pending.len()
    } else {
        let (tx, rx) = crossbeam_channel::unbounded();
        for t in &pending {
            let _ = tx.send(*t);
        }
        drop(tx);
        let done = AtomicUsize::new(0);
        thread::scope(|s| {
            for _ in 0..config.pregen_thread_count {
                let rx = rx.clone();
                let config = config.clone();
                let done = &done;
                s.spawn(move || {
                    let mut generator = RoadGenerator::new(config);
                    for (x, y) in rx {
                        map.generate_detached(&mut generator, gen, x, y);
                        done.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        done.load(Ordering::Relaxed)
    };
    log::info!("pre-generated {generated} regions in {:?}", start.elapsed());
}

/// Like [`run`], but parks the wait on the map's background worker so
/// the caller returns immediately.
pub fn run_background<H>(map: Arc<RoadMap>, gen: Arc<H>, cx: i16, cy: i16)
where
    H: HeightSource + Send + Sync + 'static,
{
    let m = Arc::clone(&map);
    map.submit_background(Box::new(move || run(&m, &*gen, cx, cy)));
}

/// Region offsets covered by the pattern, sorted by ascending distance
/// from the center (ties broken by coordinate, so the order is total).
///
/// At zero skew the shape is the diamond `|x| + |y| <= radius`; the skew
/// term bulges the diagonals outward toward a full square.
pub fn sorted_offsets(radius: i32, skew: f32) -> Vec<(i16, i16)> {
    let r = radius as f32;
    let bulge = skew * r.sqrt();
    let mut out = Vec::new();
    for x in -radius..=radius {
        for y in -radius..=radius {
            let fx = x.abs() as f32;
            let fy = y.abs() as f32;
            if fx + fy <= r + bulge * fx.min(fy).sqrt() {
                out.push((x as i16, y as i16));
            }
        }
    }
    out.sort_by(|a, b| {
        let da = (a.0 as i32).pow(2) + (a.1 as i32).pow(2);
        let db = (b.0 as i32).pow(2) + (b.1 as i32).pow(2);
        da.cmp(&db).then(a.cmp(b))
    });
    out
}

fn log_shape(offsets: &[(i16, i16)], radius: i32) {
    let set: HashSet<(i16, i16)> = offsets.iter().copied().collect();
    let mut shape = String::new();
    for y in -radius..=radius {
        shape.push('\n');
        for x in -radius..=radius {
            shape.push(if set.contains(&(x as i16, y as i16)) {
                '#'
            } else {
                ' '
            });
        }
    }
    log::info!("pre-generation shape:{shape}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenConfig;

    struct Flat(f32);

    impl HeightSource for Flat {
        fn sample(&self, _x: i32, _y: i32) -> f32 {
            self.0
        }
    }

    fn quiet_config(threads: usize) -> GenConfig {
        GenConfig {
            road_chance: 0.0,
            pregen_radius: 2,
            pregen_thread_count: threads,
            ..GenConfig::default()
        }
    }

    #[test]
    fn test_offsets_sorted_and_symmetric() {
        let offsets = sorted_offsets(15, 0.25);
        assert_eq!(offsets[0], (0, 0));
        let set: HashSet<(i16, i16)> = offsets.iter().copied().collect();
        let mut prev = 0;
        for &(x, y) in &offsets {
            let d = (x as i32).pow(2) + (y as i32).pow(2);
            assert!(d >= prev);
            prev = d;
            // Four-fold and diagonal symmetry.
            assert!(set.contains(&(-x, y)));
            assert!(set.contains(&(x, -y)));
            assert!(set.contains(&(y, x)));
        }
    }

    #[test]
    fn test_zero_skew_is_diamond() {
        let offsets = sorted_offsets(3, 0.0);
        for &(x, y) in &offsets {
            assert!(x.abs() + y.abs() <= 3);
        }
        assert!(offsets.contains(&(3, 0)));
        assert!(!offsets.contains(&(2, 2)));
    }

    #[test]
    fn test_pregen_writes_regions() {
        let dir = tempfile::tempdir().unwrap();
        let map = RoadMap::new(dir.path(), 5, quiet_config(1));
        run(&map, &Flat(30.0), 0, 0);
        for (dx, dy) in sorted_offsets(2, GenConfig::default().pregen_skew) {
            assert!(map.region_on_disk(dx, dy), "missing region ({dx}, {dy})");
        }
    }

    #[test]
    fn test_threaded_matches_inline() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        run(&RoadMap::new(a.path(), 5, quiet_config(1)), &Flat(30.0), 0, 0);
        run(&RoadMap::new(b.path(), 5, quiet_config(4)), &Flat(30.0), 0, 0);
        let list = |p: &std::path::Path| -> Vec<String> {
            let mut names: Vec<String> = std::fs::read_dir(p.join("regions").join("5"))
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        };
        assert_eq!(list(a.path()), list(b.path()));
    }

    #[test]
    fn test_background_run_returns_before_finishing() {
        let dir = tempfile::tempdir().unwrap();
        let map = Arc::new(RoadMap::new(dir.path(), 5, quiet_config(2)));
        run_background(Arc::clone(&map), Arc::new(Flat(30.0)), 0, 0);
        // The walk is parked on the map's worker; flushing waits it out.
        map.flush();
        for (dx, dy) in sorted_offsets(2, GenConfig::default().pregen_skew) {
            assert!(map.region_on_disk(dx, dy), "missing region ({dx}, {dy})");
        }
    }

    #[test]
    fn test_pregen_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let map = RoadMap::new(dir.path(), 5, quiet_config(1));
        run(&map, &Flat(30.0), 0, 0);
        let modified = |x: i16| {
            std::fs::metadata(crate::io::region_path(dir.path(), 5, x, 0))
                .unwrap()
                .modified()
                .unwrap()
        };
        let before = modified(0);
        run(&map, &Flat(30.0), 0, 0);
        assert_eq!(modified(0), before);
    }
}
