//! Cost-based path search over the terrain lattice.
//!
//! This is deliberately *not* strict A*: on top of the straight-line
//! heuristic the priority carries a curve bias, slope and roughness
//! penalties, and elevation-band penalties, and cells are re-opened
//! without a decrease-key discipline. The produced roads wander the way
//! the terrain suggests, which is the point; upgrading to an admissible
//! search would straighten them out.
//!
//! The search walks a lattice with stride 2 in 8 directions (orthogonal
//! steps cost 2, diagonal 2.83). Absence of a path is an expected, silent
//! outcome: the caller simply skips that road.

use std::collections::{BinaryHeap, HashMap};

use crate::config::GenConfig;
use crate::graph::VertexGraph;
use crate::height::HeightSource;
use crate::point::{distance, pack, Point};
use crate::region;
use crate::road::Road;
use crate::smoothness::SmoothnessGraph;

/// Where a search is headed.
///
/// Either a fixed terrain point, or the nearest vertex of another road
/// network's [`VertexGraph`] (how branches find the road they join).
#[derive(Debug, Clone, Copy)]
pub enum Destination<'a> {
    /// A fixed terrain point.
    Point {
        /// The target point.
        point: Point,
        /// Level assigned to the road being traced.
        level: u8,
    },
    /// The nearest plotted vertex of an existing network.
    Nearest {
        /// The index of the network being joined.
        graph: &'a VertexGraph,
        /// Level assigned to the road being traced.
        level: u8,
    },
}

impl<'a> Destination<'a> {
    /// A fixed-point destination for a main road.
    pub fn point(point: Point) -> Destination<'static> {
        Destination::Point { point, level: 0 }
    }

    /// A nearest-vertex destination at the given branch level.
    pub fn nearest(graph: &'a VertexGraph, level: u8) -> Destination<'a> {
        Destination::Nearest { graph, level }
    }

    /// Distance from `(x, y)` to this destination.
    ///
    /// For nearest-vertex destinations the scan may short-circuit once a
    /// value below `min` is found.
    pub fn distance(&self, x: i32, y: i32, min: f64) -> f64 {
        match self {
            Destination::Point { point, .. } => distance(x, y, point.x, point.y),
            Destination::Nearest { graph, .. } => graph.distance(x, y, min),
        }
    }

    /// The branch level of the road being traced toward this destination.
    pub fn road_level(&self) -> u8 {
        match self {
            Destination::Point { level, .. } | Destination::Nearest { level, .. } => *level,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    priority: f64,
    x: i32,
    y: i32,
    height: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: BinaryHeap is a max-heap, we want lowest priority out.
        other.priority.total_cmp(&self.priority)
    }
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    px: i32,
    py: i32,
    f: f64,
    g: f64,
}

/// Orthogonal and diagonal lattice steps with their costs.
const DIRECTIONS: [(i32, i32, f64); 8] = [
    (-2, 0, 2.0),
    (2, 0, 2.0),
    (0, 2, 2.0),
    (0, -2, 2.0),
    (-2, 2, 2.83),
    (-2, -2, 2.83),
    (2, 2, 2.83),
    (2, -2, 2.83),
];

const CLOSED_SIDE: usize = (region::LEN / 2) as usize;

/// Reusable search state.
///
/// The open set, closed bitset, and per-cell records are mutated in place
/// during a search, so one `AStar` must never be shared between
/// concurrent searches; each worker owns its own.
pub struct AStar {
    open: BinaryHeap<Candidate>,
    closed: Vec<u64>,
    cells: HashMap<u64, Cell>,
    shoreline_cutoff: f32,
    mountain_cutoff: f32,
}

impl AStar {
    /// Creates search state sized for one region worth of lattice.
    pub fn new(config: &GenConfig) -> Self {
        Self {
            open: BinaryHeap::new(),
            closed: vec![0; CLOSED_SIDE * CLOSED_SIDE / 64],
            cells: HashMap::new(),
            shoreline_cutoff: config.shoreline_cutoff,
            mountain_cutoff: config.mountain_cutoff,
        }
    }

    fn reset(&mut self) {
        self.open.clear();
        self.closed.fill(0);
        self.cells.clear();
    }

    /// Traces a path from `src` toward `dest`.
    ///
    /// Returns the points in order from source to destination, or `None`
    /// when the open set empties or the node budget runs out. The last
    /// point lies within distance 2 of the destination.
    pub fn search<H: HeightSource + ?Sized>(
        &mut self,
        gen: &H,
        smoothness: &mut SmoothnessGraph,
        src: Point,
        dest: &Destination<'_>,
    ) -> Option<Vec<Point>> {
        self.reset();
        let mut x = src.x;
        let mut y = src.y;
        let mut height = gen.sample(x, y);

        self.cells.insert(
            pack(x, y),
            Cell {
                px: x,
                py: y,
                f: 0.0,
                g: 0.0,
            },
        );
        self.push_open(0.0, x, y, height);

        let mut len = 0;
        while let Some(c) = self.open.pop() {
            if len >= Road::MAX_LENGTH {
                break;
            }
            len += 1;
            x = c.x;
            y = c.y;
            height = c.height;
            self.close(x, y);

            for &(dx, dy, d) in &DIRECTIONS {
                if let Some(found) =
                    self.check_direction(gen, smoothness, dest, height, d, x, y, x + dx, y + dy)
                {
                    return Some(self.trace_path(found));
                }
            }
        }
        None
    }

    /// Considers one neighbor. Returns the goal cell on arrival.
    #[allow(clippy::too_many_arguments)]
    fn check_direction<H: HeightSource + ?Sized>(
        &mut self,
        gen: &H,
        smoothness: &mut SmoothnessGraph,
        dest: &Destination<'_>,
        src_height: f32,
        d: f64,
        px: i32,
        py: i32,
        x: i32,
        y: i32,
    ) -> Option<Point> {
        let h = dest.distance(x, y, 2.0);
        if h < 2.0 {
            self.set_parent(x, y, px, py);
            return Some(Point::new(x, y));
        }
        if self.is_closed(x, y) {
            return None;
        }
        let height = gen.sample(x, y);
        if height < 0.0 {
            return None; // ocean
        }
        let dh = (src_height - height).abs();
        if dh < 2.0 {
            let existing = self.cells.get(&pack(x, y)).copied();
            let g = self
                .cells
                .get(&pack(px, py))
                .map(|c| c.g)
                .unwrap_or(0.0)
                + d;
            let curve = curve_bias(x, y);
            let sd = smoothness.sd(gen, x, y) as f64;
            let mut f = g + h + curve + (dh as f64 * dh as f64) * 3.0 + sd * 2.0;
            if height < self.shoreline_cutoff {
                let b = (self.shoreline_cutoff - height) as f64;
                f += b * b;
            } else if height > self.mountain_cutoff {
                let b = (height - self.mountain_cutoff) as f64;
                f += b * b;
            }
            if existing.map_or(true, |c| c.f > f) {
                self.push_open(f, x, y, height);
                self.cells.insert(pack(x, y), Cell { px, py, f, g });
            }
        }
        None
    }

    fn push_open(&mut self, priority: f64, x: i32, y: i32, height: f32) {
        self.open.push(Candidate {
            priority,
            x,
            y,
            height,
        });
    }

    fn closed_index(x: i32, y: i32) -> usize {
        let rx = ((x & (region::LEN - 1)) >> 1) as usize;
        let ry = ((y & (region::LEN - 1)) >> 1) as usize;
        rx * CLOSED_SIDE + ry
    }

    fn close(&mut self, x: i32, y: i32) {
        let i = Self::closed_index(x, y);
        self.closed[i / 64] |= 1 << (i % 64);
    }

    fn is_closed(&self, x: i32, y: i32) -> bool {
        let i = Self::closed_index(x, y);
        self.closed[i / 64] & (1 << (i % 64)) != 0
    }

    fn set_parent(&mut self, x: i32, y: i32, px: i32, py: i32) {
        let cell = self.cells.entry(pack(x, y)).or_insert(Cell {
            px,
            py,
            f: 0.0,
            g: 0.0,
        });
        cell.px = px;
        cell.py = py;
    }

    /// Walks parent pointers from the goal back to the source, then
    /// reverses into source-to-destination order.
    fn trace_path(&self, found: Point) -> Vec<Point> {
        let mut x = found.x;
        let mut y = found.y;
        let mut cell = self.cells[&pack(x, y)];
        let mut path = Vec::new();
        while !(cell.px == x && cell.py == y) {
            path.push(Point::new(x, y));
            x = cell.px;
            y = cell.py;
            cell = self.cells[&pack(x, y)];
        }
        path.push(Point::new(x, y));
        path.reverse();
        path
    }
}

/// Deterministic low-amplitude perturbation keeping paths from running
/// perfectly straight. Integer overflow wraps on purpose.
fn curve_bias(x: i32, y: i32) -> f64 {
    (x.wrapping_mul(y) as f64).sin()
}
