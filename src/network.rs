//! Road networks: a main road plus its branches, sharing one vertex index.

use std::io;
use std::path::Path;

use crate::graph::VertexGraph;
use crate::io::{network_path, ByteReader, ByteWriter, StoreError, StoreResult};
use crate::point::Point;
use crate::region;
use crate::road::{Road, RoadVertex};

/// One or more roads produced from a single origin.
///
/// Index 0 is always the main road; subsequent roads are branches whose
/// last vertex is flagged [`crate::road::VertexFlags::INTERSECTION`] where
/// they meet it. A network is immutable once built: if it is ever
/// invalidated it is regenerated wholesale, never patched.
///
/// Identity is the origin vertex's world coordinate, which also keys the
/// on-disk file.
#[derive(Debug)]
pub struct RoadNetwork {
    /// Minimum x of the union of all road boxes.
    pub min_x: i32,
    /// Maximum x of the union of all road boxes.
    pub max_x: i32,
    /// Minimum y of the union of all road boxes.
    pub min_y: i32,
    /// Maximum y of the union of all road boxes.
    pub max_y: i32,
    roads: Vec<Road>,
    graph: VertexGraph,
}

impl RoadNetwork {
    /// Builds a network from its roads and their plotted vertex graph.
    ///
    /// Panics if the road list or the main road is empty: that indicates a
    /// builder defect, not a terrain condition, and must never be
    /// persisted.
    pub fn new(roads: Vec<Road>, graph: VertexGraph) -> Self {
        assert!(!roads.is_empty(), "network built with no roads");
        assert!(
            !roads[0].vertices().is_empty(),
            "network built with an empty main road"
        );
        let mut min_x = i32::MAX;
        let mut max_x = i32::MIN;
        let mut min_y = i32::MAX;
        let mut max_y = i32::MIN;
        for r in &roads {
            min_x = min_x.min(r.min_x);
            max_x = max_x.max(r.max_x);
            min_y = min_y.min(r.min_y);
            max_y = max_y.max(r.max_y);
        }
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            roads,
            graph,
        }
    }

    /// The roads, main road first.
    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    /// The main road.
    pub fn main_road(&self) -> &Road {
        &self.roads[0]
    }

    /// The origin vertex, which is this network's identity.
    pub fn origin(&self) -> &RoadVertex {
        self.main_road().first()
    }

    /// The origin as a point key.
    pub fn origin_point(&self) -> Point {
        let o = self.origin();
        Point::new(o.x, o.y)
    }

    /// The main road's terminal vertex.
    pub fn dest(&self) -> &RoadVertex {
        self.main_road().last()
    }

    /// The shared vertex index.
    pub fn graph(&self) -> &VertexGraph {
        &self.graph
    }

    /// Whether the padded bounding box contains a point.
    pub fn contains_point(&self, x: i32, y: i32, padding: i32) -> bool {
        x > self.min_x - padding
            && x < self.max_x + padding
            && y > self.min_y - padding
            && y < self.max_y + padding
    }

    /// Distance from `(x, y)` to the nearest vertex of this network.
    pub fn distance_from(&self, x: i32, y: i32, min: f64) -> f64 {
        self.graph.distance(x, y, min)
    }

    /// Like [`RoadNetwork::distance_from`], but `f64::MAX` outside the
    /// padded bounding box, skipping the index walk entirely.
    pub fn check_distance(&self, x: i32, y: i32, min: f64) -> f64 {
        if self.contains_point(x, y, Road::PADDING) {
            return self.distance_from(x, y, min);
        }
        f64::MAX
    }

    /// Whether the main road overlaps the given region.
    pub fn is_in_region(&self, rx: i16, ry: i16) -> bool {
        self.main_road().is_in_region(rx, ry)
    }

    /// Whether this network's bounding box overlaps the given region.
    pub fn overlaps_region(&self, rx: i16, ry: i16) -> bool {
        let x1 = region::region_to_abs(rx);
        let y1 = region::region_to_abs(ry);
        self.min_x < x1 + region::LEN
            && self.max_x >= x1
            && self.min_y < y1 + region::LEN
            && self.max_y >= y1
    }

    /// Whether the origin lies inside the given quad.
    pub fn is_in_quad(&self, qx: i32, qy: i32) -> bool {
        let o = self.origin();
        let x1 = region::quad_to_abs(qx);
        let y1 = region::quad_to_abs(qy);
        o.x >= x1 && o.x < x1 + region::QUAD_BLOCKS && o.y >= y1 && o.y < y1 + region::QUAD_BLOCKS
    }

    pub(crate) fn write_to<W: io::Write>(&self, w: &mut ByteWriter<W>) -> io::Result<()> {
        w.write_i32(self.min_x)?;
        w.write_i32(self.max_x)?;
        w.write_i32(self.min_y)?;
        w.write_i32(self.max_y)?;
        w.write_i32(self.roads.len() as i32)?;
        for r in &self.roads {
            r.write_to(w)?;
        }
        self.graph.write_to(w)
    }

    pub(crate) fn read_from<R: io::Read>(r: &mut ByteReader<R>) -> StoreResult<Self> {
        let min_x = r.read_i32()?;
        let max_x = r.read_i32()?;
        let min_y = r.read_i32()?;
        let max_y = r.read_i32()?;
        let count = r.read_count("road")?;
        if count == 0 {
            return Err(StoreError::Corrupt("network record with no roads".into()));
        }
        let mut roads = Vec::with_capacity(count);
        for _ in 0..count {
            roads.push(Road::read_from(r)?);
        }
        let graph = VertexGraph::read_from(r)?;
        Ok(Self {
            min_x,
            max_x,
            min_y,
            max_y,
            roads,
            graph,
        })
    }

    /// Persists this network under its origin key.
    pub fn save_to_disk(&self, root: &Path, seed: i64) -> StoreResult<()> {
        let o = self.origin();
        let mut w = ByteWriter::create(&network_path(root, seed, o.x, o.y))?;
        self.write_to(&mut w)?;
        w.finish()?;
        Ok(())
    }

    /// Loads a network by origin key. `None` when no file exists.
    pub fn load_from_disk(root: &Path, seed: i64, x: i32, y: i32) -> StoreResult<Option<Self>> {
        let path = network_path(root, seed, x, y);
        let mut r = match ByteReader::open(&path) {
            Ok(r) => r,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(Self::read_from(&mut r)?))
    }
}
