//! Per-network spatial index over placed road vertices.
//!
//! Every road of a network is "plotted" into a [`VertexGraph`]: a uniform
//! grid hash over vertex positions. The graph answers nearest-distance
//! queries, which the search uses both as the goal test when a branch road
//! terminates on another road's vertex chain, and to reject candidate
//! origins that already sit inside a network's body.

use std::collections::HashMap;
use std::io;

use crate::astar::Destination;
use crate::io::{ByteReader, ByteWriter, StoreResult};
use crate::point::{distance, pack};
use crate::road::Road;

/// Grid cell size in blocks, as a power of two.
const CELL_SHIFT: i32 = 6;
const CELL: i32 = 1 << CELL_SHIFT;

#[derive(Debug, Clone, Copy)]
struct Entry {
    x: i32,
    y: i32,
    level: u8,
}

/// Spatial index over the vertices of one network.
#[derive(Debug, Default)]
pub struct VertexGraph {
    cells: HashMap<u64, Vec<Entry>>,
    // Cell-space bounds of everything plotted, for bounding ring scans.
    min_cx: i32,
    min_cy: i32,
    max_cx: i32,
    max_cy: i32,
    len: usize,
}

impl VertexGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            cells: HashMap::new(),
            min_cx: i32::MAX,
            min_cy: i32::MAX,
            max_cx: i32::MIN,
            max_cy: i32::MIN,
            len: 0,
        }
    }

    /// Number of plotted vertices.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been plotted yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts every vertex of a road.
    pub fn plot(&mut self, road: &Road) {
        for v in road.vertices() {
            self.insert(v.x, v.y, road.level);
        }
    }

    fn insert(&mut self, x: i32, y: i32, level: u8) {
        let cx = x >> CELL_SHIFT;
        let cy = y >> CELL_SHIFT;
        self.cells
            .entry(pack(cx, cy))
            .or_default()
            .push(Entry { x, y, level });
        self.min_cx = self.min_cx.min(cx);
        self.min_cy = self.min_cy.min(cy);
        self.max_cx = self.max_cx.max(cx);
        self.max_cy = self.max_cy.max(cy);
        self.len += 1;
    }

    /// Distance to the nearest plotted vertex.
    ///
    /// Short-circuits as soon as any vertex closer than `min` is found;
    /// the returned value is then merely *a* distance below `min`, not
    /// necessarily the smallest. Returns `f64::MAX` on an empty graph.
    pub fn distance(&self, x: i32, y: i32, min: f64) -> f64 {
        self.scan(x, y, min).0
    }

    /// A search destination targeting the nearest vertex of this graph.
    ///
    /// The destination's road level is one below the level of the vertex
    /// closest to `(x, y)`, clamped to the deepest branch level. Returns
    /// `None` on an empty graph.
    pub fn target(&self, x: i32, y: i32) -> Option<Destination<'_>> {
        let (_, entry) = self.scan(x, y, f64::NEG_INFINITY);
        entry.map(|e| Destination::nearest(self, (e.level + 1).min(2)))
    }

    /// Ring scan outward from the query cell. Each ring of grid cells is
    /// exhausted before moving outward, and the scan stops once the best
    /// distance cannot be beaten by any farther ring.
    fn scan(&self, x: i32, y: i32, min: f64) -> (f64, Option<Entry>) {
        if self.len == 0 {
            return (f64::MAX, None);
        }
        let cx = x >> CELL_SHIFT;
        let cy = y >> CELL_SHIFT;
        let max_r = (cx - self.min_cx)
            .abs()
            .max((cx - self.max_cx).abs())
            .max((cy - self.min_cy).abs())
            .max((cy - self.max_cy).abs());
        let mut best = f64::MAX;
        let mut found = None;
        for r in 0..=max_r {
            self.scan_ring(cx, cy, r, x, y, &mut best, &mut found);
            if best < min {
                return (best, found);
            }
            // Cells in ring r + 1 hold no vertex closer than r cell widths.
            if best <= (r as f64) * CELL as f64 {
                break;
            }
        }
        (best, found)
    }

    fn scan_ring(
        &self,
        cx: i32,
        cy: i32,
        r: i32,
        x: i32,
        y: i32,
        best: &mut f64,
        found: &mut Option<Entry>,
    ) {
        let mut visit = |ux: i32, uy: i32| {
            if let Some(entries) = self.cells.get(&pack(ux, uy)) {
                for e in entries {
                    let d = distance(x, y, e.x, e.y);
                    if d < *best {
                        *best = d;
                        *found = Some(*e);
                    }
                }
            }
        };
        if r == 0 {
            visit(cx, cy);
            return;
        }
        for ux in (cx - r)..=(cx + r) {
            visit(ux, cy - r);
            visit(ux, cy + r);
        }
        for uy in (cy - r + 1)..(cy + r) {
            visit(cx - r, uy);
            visit(cx + r, uy);
        }
    }

    pub(crate) fn write_to<W: io::Write>(&self, w: &mut ByteWriter<W>) -> io::Result<()> {
        w.write_i32(self.len as i32)?;
        for entries in self.cells.values() {
            for e in entries {
                w.write_i32(e.x)?;
                w.write_i32(e.y)?;
                w.write_u8(e.level)?;
            }
        }
        Ok(())
    }

    pub(crate) fn read_from<R: io::Read>(r: &mut ByteReader<R>) -> StoreResult<Self> {
        let count = r.read_count("vertex index")?;
        let mut graph = Self::new();
        for _ in 0..count {
            let x = r.read_i32()?;
            let y = r.read_i32()?;
            let level = r.read_u8()?;
            graph.insert(x, y, level);
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::road::{RoadVertex, VertexFlags};

    fn road(level: u8, points: &[(i32, i32)]) -> Road {
        let vertices: Vec<RoadVertex> = points
            .iter()
            .map(|&(x, y)| RoadVertex {
                x,
                y,
                radius: 3,
                color: 0,
                integrity: 1.0,
                theta: -1.0,
                x_angle: -1.0,
                flags: VertexFlags::MIDPOINT,
            })
            .collect();
        let min_x = points.iter().map(|p| p.0).min().unwrap();
        let min_y = points.iter().map(|p| p.1).min().unwrap();
        let max_x = points.iter().map(|p| p.0).max().unwrap();
        let max_y = points.iter().map(|p| p.1).max().unwrap();
        Road::new(level, min_x, min_y, max_x, max_y, vertices)
    }

    #[test]
    fn test_empty_graph() {
        let graph = VertexGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.distance(0, 0, 1.0), f64::MAX);
        assert!(graph.target(0, 0).is_none());
    }

    #[test]
    fn test_nearest_distance() {
        let mut graph = VertexGraph::new();
        graph.plot(&road(0, &[(0, 0), (2, 0), (4, 0)]));
        assert_eq!(graph.distance(4, 3, 0.5), 3.0);
        assert_eq!(graph.distance(0, 0, 0.5), 0.0);
        // Far queries still resolve across many empty rings.
        assert_eq!(graph.distance(4, 1000, 0.5), 1000.0);
    }

    #[test]
    fn test_short_circuit_below_min() {
        let mut graph = VertexGraph::new();
        graph.plot(&road(0, &[(0, 0), (1000, 1000)]));
        let d = graph.distance(1, 0, 10.0);
        assert!(d < 10.0);
    }

    #[test]
    fn test_target_level() {
        let mut graph = VertexGraph::new();
        graph.plot(&road(0, &[(0, 0), (2, 0)]));
        let dest = graph.target(1, 1).unwrap();
        assert_eq!(dest.road_level(), 1);

        let mut deep = VertexGraph::new();
        deep.plot(&road(2, &[(0, 0)]));
        // Never exceeds the deepest branch level.
        assert_eq!(deep.target(0, 0).unwrap().road_level(), 2);
    }

    #[test]
    fn test_roundtrip() {
        let mut graph = VertexGraph::new();
        graph.plot(&road(0, &[(0, 0), (2, 0), (-100, 250)]));
        graph.plot(&road(1, &[(64, 64)]));
        let mut buf = Vec::new();
        graph.write_to(&mut ByteWriter::new(&mut buf)).unwrap();
        let out = VertexGraph::read_from(&mut ByteReader::new(buf.as_slice())).unwrap();
        assert_eq!(out.len(), graph.len());
        for &(x, y) in &[(1, 1), (-90, 240), (70, 70), (500, -500)] {
            assert_eq!(out.distance(x, y, 0.0), graph.distance(x, y, 0.0));
        }
    }
}
