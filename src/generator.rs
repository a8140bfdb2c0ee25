//! Road network generation.
//!
//! A [`RoadGenerator`] fills regions quad by quad. Each chunk of a quad
//! rolls a deterministic, feature-seeded chance to host a network origin;
//! a winning roll snaps the origin to nearby suitable terrain, traces a
//! main road toward a random heading, and then grows branch roads back
//! into the network's own vertex graph.
//!
//! Generation radiates far enough beyond the region's own bounds to
//! reach the origin quad of any network able to overlap it, and every
//! network is published to the map's origin-keyed identity cache the
//! moment it is built, so a road that straddles a region border is the
//! same object no matter which side asked for it first. All randomness
//! flows from the per-chunk feature seed; the same seed and terrain
//! always yield the same networks.

use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};
use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::astar::{AStar, Destination};
use crate::config::GenConfig;
use crate::graph::VertexGraph;
use crate::height::HeightSource;
use crate::map::RoadMap;
use crate::network::RoadNetwork;
use crate::point::{feature_seed, Point};
use crate::region::{self, RoadRegion};
use crate::road::{Road, RoadVertex, VertexFlags};
use crate::smoothness::SmoothnessGraph;

/// Half-width of the origin snap scan, in blocks.
const SCAN_RADIUS: i32 = 32;
/// Minimum gap between a branch origin and the existing network body.
const BRANCH_GAP: f64 = 32.0;
/// Quads beyond the center quad covered by one generation pass. The
/// resulting three-quad ring into the neighbors spans 1536 blocks: the
/// longest road ([`Road::MAX_DISTANCE`]) plus the endpoint snap scan,
/// so any origin whose network can overlap this region is inside the
/// window.
const QUAD_RADIUS: i32 = 5;

/// Per-level stroke colors, main road first.
const LEVEL_COLORS: [u32; 3] = [0x40_4040, 0x80_8040, 0x69_6932];
/// Per-level stroke radii, main road first.
const LEVEL_RADII: [u8; 3] = [3, 2, 2];
/// Fraction of a stroke's pixels that survive rendering.
const INTEGRITY: f32 = 0.65;

/// Stateful road generator.
///
/// Holds the search scratch state and the roughness cache, so a generator
/// serves one pass at a time; concurrent passes each own a generator.
pub struct RoadGenerator {
    config: GenConfig,
    astar: AStar,
    smoothness: SmoothnessGraph,
}

impl RoadGenerator {
    /// Creates a generator with the given settings.
    pub fn new(config: GenConfig) -> Self {
        let astar = AStar::new(&config);
        Self {
            config,
            astar,
            smoothness: SmoothnessGraph::new(),
        }
    }

    /// The settings this generator was built with.
    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    /// Completes the ungenerated quads of a region.
    ///
    /// Walks the quad window around the region's center quad. Own quads
    /// are generated and marked. Quads owned by a neighboring region are
    /// generated into that neighbor's own record when it does not have
    /// them yet, then copied across, so border-straddling networks are
    /// listed by every region they overlap. With `partial` generation the
    /// neighbor keeps the result: its quads are marked and the mutated
    /// neighbor is handed back to the map; otherwise the neighbor record
    /// is discarded and regenerated (identically, via the identity cache)
    /// when its own turn comes.
    pub fn generate_region<H: HeightSource + ?Sized>(
        &mut self,
        map: &RoadMap,
        gen: &H,
        mut region: RoadRegion,
        partial: bool,
    ) -> RoadRegion {
        let start = Instant::now();
        let cqx = region::center_quad(region.x);
        let cqy = region::center_quad(region.y);
        let mut neighbors: HashMap<(i16, i16), RoadRegion> = HashMap::new();
        let mut dirty: Vec<(i16, i16)> = Vec::new();

        for qx in (cqx - QUAD_RADIUS)..(cqx + QUAD_RADIUS) {
            for qy in (cqy - QUAD_RADIUS)..(cqy + QUAD_RADIUS) {
                let owner = (region::quad_to_region(qx), region::quad_to_region(qy));
                if owner == (region.x, region.y) {
                    if !region.has_quad(qx, qy) {
                        self.generate_quad(map, gen, &mut region, qx, qy);
                        region.set_quad_generated(qx, qy);
                    }
                } else {
                    let neighbor = neighbors
                        .entry(owner)
                        .or_insert_with(|| map.load_partial(owner.0, owner.1));
                    if !neighbor.has_quad(qx, qy) {
                        self.generate_quad(map, gen, neighbor, qx, qy);
                        if partial {
                            neighbor.set_quad_generated(qx, qy);
                            if !dirty.contains(&owner) {
                                dirty.push(owner);
                            }
                        }
                    }
                    neighbor.copy_quad_into(&mut region, qx, qy);
                }
            }
        }

        if partial {
            for owner in dirty {
                if let Some(neighbor) = neighbors.remove(&owner) {
                    map.store_partial(neighbor);
                }
            }
        }

        region.prune();
        self.smoothness.clear();
        log::debug!(
            "generated region ({}, {}): {} networks in {:?}",
            region.x,
            region.y,
            region.networks().len(),
            start.elapsed()
        );
        region
    }

    /// Rolls every chunk of one quad for network origins.
    ///
    /// A winning roll snaps its origin and first consults the map's
    /// identity cache: an origin generated by an earlier pass (from
    /// either side of a border) is reused as-is, never rebuilt. New
    /// networks are published back to the map before being added.
    fn generate_quad<H: HeightSource + ?Sized>(
        &mut self,
        map: &RoadMap,
        gen: &H,
        region: &mut RoadRegion,
        qx: i32,
        qy: i32,
    ) {
        let seed = map.seed();
        let c0x = region::quad_to_chunk(qx);
        let c0y = region::quad_to_chunk(qy);
        for cx in c0x..c0x + region::QUAD_CHUNKS {
            for cy in c0y..c0y + region::QUAD_CHUNKS {
                let mut rng = SmallRng::seed_from_u64(feature_seed(seed, cx, cy));
                if rng.gen::<f32>() >= self.config.road_chance {
                    continue;
                }
                let x = region::chunk_center(cx);
                let y = region::chunk_center(cy);
                let Some(origin) = self.nearest_suitable(gen, x, y) else {
                    continue;
                };
                if let Some(existing) = map.get_network(origin.x, origin.y) {
                    region.add_network(existing);
                    continue;
                }
                if let Some(network) =
                    self.generate_network(gen, &mut rng, origin, region.networks())
                {
                    let network = Arc::new(network);
                    map.publish_network(&network);
                    region.add_network(network);
                }
            }
        }
    }

    /// Generates a network anchored at the snapped origin `src`, or
    /// `None` when the terrain offers no suitable destination, the
    /// planned road sits too close to an existing one, or no path
    /// exists.
    fn generate_network<H: HeightSource + ?Sized>(
        &mut self,
        gen: &H,
        rng: &mut SmallRng,
        src: Point,
        existing: &[Arc<RoadNetwork>],
    ) -> Option<RoadNetwork> {
        let heading = rng.gen_range(0.0..TAU);
        let length = rng.gen_range(self.config.min_road_length..=self.config.max_road_length);
        let dx = src.x + (length as f32 * heading.cos()) as i32;
        let dy = src.y + (length as f32 * heading.sin()) as i32;
        let dest = self.nearest_suitable(gen, dx, dy)?;

        let span = src.distance(dest) as f32;
        let mid = Vec2::new(
            (src.x + dest.x) as f32 * 0.5,
            (src.y + dest.y) as f32 * 0.5,
        );
        if too_close(mid, span, existing) {
            return None;
        }

        let path = self
            .astar
            .search(gen, &mut self.smoothness, src, &Destination::point(dest))?;
        let main = trace(&path, 0);

        let mut graph = VertexGraph::new();
        graph.plot(&main);
        let mut roads = vec![main];

        if span >= 32.0 {
            self.generate_branches(gen, rng, &mut roads, &mut graph, mid, span);
        }
        Some(RoadNetwork::new(roads, graph))
    }

    /// Grows up to `max_branches` branch roads into the network's graph.
    ///
    /// Branch origins are picked on a ring a quarter to half of the main
    /// road's radius from its midpoint, biased perpendicular to the
    /// road's broad heading, and must fall inside the [`branch_zone`].
    fn generate_branches<H: HeightSource + ?Sized>(
        &mut self,
        gen: &H,
        rng: &mut SmallRng,
        roads: &mut Vec<Road>,
        graph: &mut VertexGraph,
        mid: Vec2,
        span: f32,
    ) {
        let main = &roads[0];
        let broad = main.broad_angle();
        let radius = span * 0.5;
        let zone = branch_zone(main);

        for _ in 0..self.config.max_branches {
            let side = if rng.gen::<bool>() {
                FRAC_PI_2
            } else {
                -FRAC_PI_2
            };
            let angle = broad + side + rng.gen_range(-FRAC_PI_4..FRAC_PI_4);
            let r = rng.gen_range(radius * 0.25..radius * 0.5);
            let at = mid + Vec2::from_angle(angle) * r;
            if at.x < zone.0 || at.y < zone.1 || at.x > zone.2 || at.y > zone.3 {
                continue;
            }
            let Some(src) = self.nearest_suitable(gen, at.x as i32, at.y as i32) else {
                continue;
            };
            if graph.distance(src.x, src.y, BRANCH_GAP) < BRANCH_GAP {
                continue;
            }
            let Some(dest) = graph.target(src.x, src.y) else {
                continue;
            };
            let level = dest.road_level();
            let Some(path) = self.astar.search(gen, &mut self.smoothness, src, &dest) else {
                continue;
            };
            let mut road = trace(&path, level);
            road.last_mut().add_flag(VertexFlags::INTERSECTION);
            graph.plot(&road);
            roads.push(road);
        }
    }

    /// Snaps `(x, y)` to the best nearby road-worthy cell.
    ///
    /// A candidate that itself lands in the water is rejected outright,
    /// never snapped ashore. Otherwise this scans a square of half-width
    /// [`SCAN_RADIUS`] on the search lattice, rejecting ocean and heights
    /// far above the mountain cutoff, and weighting the rest by roughness
    /// plus the elevation-band penalty. A weight of zero cannot be
    /// beaten, so it returns immediately.
    fn nearest_suitable<H: HeightSource + ?Sized>(
        &mut self,
        gen: &H,
        x: i32,
        y: i32,
    ) -> Option<Point> {
        if gen.sample(x, y) < 0.0 {
            return None;
        }
        let mut best = f32::MAX;
        let mut found = None;
        for dx in (-SCAN_RADIUS..=SCAN_RADIUS).step_by(Road::STEP as usize) {
            for dy in (-SCAN_RADIUS..=SCAN_RADIUS).step_by(Road::STEP as usize) {
                let px = x + dx;
                let py = y + dy;
                let h = gen.sample(px, py);
                if h < 0.0 || h > self.config.mountain_cutoff + 20.0 {
                    continue;
                }
                let mut weight = self.smoothness.sd(gen, px, py) * 100.0;
                if h < self.config.shoreline_cutoff {
                    let b = self.config.shoreline_cutoff - h;
                    weight += b * b;
                } else if h > self.config.mountain_cutoff {
                    let b = h - self.config.mountain_cutoff;
                    weight += b * b;
                }
                if weight <= 0.0 {
                    return Some(Point::new(px, py));
                }
                if weight < best {
                    best = weight;
                    found = Some(Point::new(px, py));
                }
            }
        }
        found
    }
}

/// Bounding zone for branch origins: the main road's box grown square
/// (the short side expanded to match the long one, correcting for the
/// razor-thin box of a straight road) and padded by a tenth.
fn branch_zone(main: &Road) -> (f32, f32, f32, f32) {
    let w = (main.max_x - main.min_x) as f32;
    let h = (main.max_y - main.min_y) as f32;
    let long = w.max(h);
    let gx = (long - w) * 0.5 + 0.1 * long;
    let gy = (long - h) * 0.5 + 0.1 * long;
    (
        main.min_x as f32 - gx,
        main.min_y as f32 - gy,
        main.max_x as f32 + gx,
        main.max_y as f32 + gy,
    )
}

/// Whether a planned road's midpoint sits within 70% of the combined
/// half-lengths of any existing main road.
fn too_close(mid: Vec2, span: f32, existing: &[Arc<RoadNetwork>]) -> bool {
    for n in existing {
        let m = n.main_road();
        let other = Vec2::new(
            (m.min_x + m.max_x) as f32 * 0.5,
            (m.min_y + m.max_y) as f32 * 0.5,
        );
        if mid.distance(other) < 0.7 * (span * 0.5 + m.distance() as f32 * 0.5) {
            return true;
        }
    }
    false
}

/// Decorates a search path into a renderable road.
///
/// Interior vertices look two points ahead and behind for their turn
/// angle `theta` and heading `x_angle`; endpoints carry the `-1.0`
/// sentinel. Thetas are then smoothed with a ±1 moving average over the
/// interior, and sharp turns are flagged as bends.
fn trace(path: &[Point], level: u8) -> Road {
    let li = level.min(2) as usize;
    let n = path.len();
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    let mut vertices = Vec::with_capacity(n);

    for (j, p) in path.iter().enumerate() {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);

        let (theta, x_angle) = if j == 0 || j == n - 1 {
            (-1.0, -1.0)
        } else {
            let prev = if j >= 2 { path[j - 2] } else { path[j - 1] };
            let next = if j + 2 < n { path[j + 2] } else { path[n - 1] };
            let a1 = ((prev.y - p.y) as f32).atan2((prev.x - p.x) as f32);
            let a2 = ((next.y - p.y) as f32).atan2((next.x - p.x) as f32);
            let mut t = a2 - a1;
            if t < 0.0 {
                t += TAU;
            }
            (t, a2)
        };

        let mut flags = VertexFlags::empty();
        if j == 0 {
            flags |= VertexFlags::START;
        }
        if j == n - 1 {
            flags |= VertexFlags::END;
        }
        if flags.is_empty() {
            flags = VertexFlags::MIDPOINT;
        }

        vertices.push(RoadVertex {
            x: p.x,
            y: p.y,
            radius: LEVEL_RADII[li],
            color: LEVEL_COLORS[li],
            integrity: INTEGRITY,
            theta,
            x_angle,
            flags,
        });
    }

    smooth_angles(&mut vertices);
    for v in &mut vertices {
        if v.theta >= 0.0 && (v.theta - PI).abs() > FRAC_PI_4 {
            v.add_flag(VertexFlags::BEND);
        }
    }
    Road::new(level, min_x, min_y, max_x, max_y, vertices)
}

/// Averages each interior theta with its immediate neighbors. The first
/// and last interior vertices keep their raw value so the endpoint
/// sentinels never bleed into the average.
fn smooth_angles(vertices: &mut [RoadVertex]) {
    let n = vertices.len();
    if n < 5 {
        return;
    }
    let thetas: Vec<f32> = vertices.iter().map(|v| v.theta).collect();
    for (j, v) in vertices.iter_mut().enumerate().take(n - 2).skip(2) {
        v.theta = (thetas[j - 1] + thetas[j] + thetas[j + 1]) / 3.0;
    }
}
