//! Fixed-size square regions of world space and their coordinate math.
//!
//! The world is tiled into regions of [`LEN`]×[`LEN`] blocks, centered so
//! region `(0, 0)` spans `[-1024, 1024)` on both axes. Every transform
//! here rounds toward negative infinity on both directions, so the math
//! is seam-free at negative coordinates.
//!
//! Each region is partitioned into 4×4 quads which are generated (and
//! marked as such) independently, so a partially generated region is a
//! legal, mergeable state.

use std::io as stdio;
use std::path::Path;
use std::sync::Arc;

use crate::io::{region_path, ByteReader, ByteWriter, StoreResult};
use crate::network::RoadNetwork;

/// Side length of a region, in blocks.
pub const LEN: i32 = 2048;
/// Side length of a region, in chunks.
pub const CHUNK_LEN: i32 = LEN / 16;
/// Centering offset: region (0, 0) starts at this world coordinate.
pub const OFFSET: i32 = -LEN / 2;
/// [`OFFSET`] in chunk coordinates.
pub const CHUNK_OFFSET: i32 = OFFSET / 16;
/// Quads per region axis.
pub const QUADS: i32 = 4;
/// Side length of a quad, in blocks.
pub const QUAD_BLOCKS: i32 = LEN / QUADS;
/// Side length of a quad, in chunks.
pub const QUAD_CHUNKS: i32 = CHUNK_LEN / QUADS;

const MASK: i32 = LEN - 1;
const SHIFT: i32 = LEN.trailing_zeros() as i32;
const QUAD_SHIFT: i32 = QUAD_BLOCKS.trailing_zeros() as i32;

/// World coordinate to offset within its region, in `0..LEN`.
pub fn rel_coord(c: i32) -> i32 {
    (c - OFFSET) & MASK
}

/// World coordinate to region coordinate.
pub fn region_coord(c: i32) -> i16 {
    ((c - OFFSET) >> SHIFT) as i16
}

/// Region coordinate to the world coordinate of its lower corner.
pub fn region_to_abs(r: i16) -> i32 {
    (r as i32) * LEN + OFFSET
}

/// World coordinate to global quad coordinate.
pub fn quad_coord(c: i32) -> i32 {
    (c - OFFSET) >> QUAD_SHIFT
}

/// Global quad coordinate to the region that owns it.
pub fn quad_to_region(q: i32) -> i16 {
    (q >> 2) as i16
}

/// Global quad coordinate to the world coordinate of its lower corner.
pub fn quad_to_abs(q: i32) -> i32 {
    q * QUAD_BLOCKS + OFFSET
}

/// Global quad coordinate to the chunk coordinate of its lower corner.
pub fn quad_to_chunk(q: i32) -> i32 {
    q * QUAD_CHUNKS + CHUNK_OFFSET
}

/// Region coordinate to the chunk coordinate of its lower corner.
pub fn first_chunk(r: i16) -> i32 {
    (r as i32) * CHUNK_LEN + CHUNK_OFFSET
}

/// The center quad of a region, around which generation radiates.
pub fn center_quad(r: i16) -> i32 {
    (r as i32) * QUADS + QUADS / 2
}

/// World coordinate to chunk coordinate.
pub fn block_to_chunk(c: i32) -> i32 {
    c >> 4
}

/// Chunk coordinate to the world coordinate of its center block.
pub fn chunk_center(c: i32) -> i32 {
    (c << 4) + 8
}

/// A region of world space holding the networks that overlap it.
///
/// Networks are shared (`Arc`) between all regions their bounds overlap;
/// the vertex data in each copy is therefore identical by construction.
#[derive(Debug, Clone, Default)]
pub struct RoadRegion {
    /// Region x coordinate.
    pub x: i16,
    /// Region y coordinate.
    pub y: i16,
    quads: u16,
    networks: Vec<Arc<RoadNetwork>>,
}

impl RoadRegion {
    /// Creates an empty, ungenerated region.
    pub fn new(x: i16, y: i16) -> Self {
        Self {
            x,
            y,
            quads: 0,
            networks: Vec::new(),
        }
    }

    /// The networks overlapping this region.
    pub fn networks(&self) -> &[Arc<RoadNetwork>] {
        &self.networks
    }

    /// Whether a world point lies within this region's bounds.
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        let ax = region_to_abs(self.x);
        let ay = region_to_abs(self.y);
        x >= ax && x < ax + LEN && y >= ay && y < ay + LEN
    }

    /// Whether the given quad of this region has been generated.
    ///
    /// `qx`/`qy` are global quad coordinates; quads owned by other regions
    /// read as ungenerated.
    pub fn has_quad(&self, qx: i32, qy: i32) -> bool {
        match self.quad_bit(qx, qy) {
            Some(bit) => self.quads & bit != 0,
            None => false,
        }
    }

    /// Marks the given quad of this region as generated.
    pub fn set_quad_generated(&mut self, qx: i32, qy: i32) {
        if let Some(bit) = self.quad_bit(qx, qy) {
            self.quads |= bit;
        }
    }

    fn quad_bit(&self, qx: i32, qy: i32) -> Option<u16> {
        let lx = qx - (self.x as i32) * QUADS;
        let ly = qy - (self.y as i32) * QUADS;
        if (0..QUADS).contains(&lx) && (0..QUADS).contains(&ly) {
            Some(1 << (lx * QUADS + ly))
        } else {
            None
        }
    }

    /// Whether all 16 quads have been generated.
    pub fn is_fully_generated(&self) -> bool {
        self.quads == u16::MAX
    }

    /// The raw per-quad generated mask.
    pub fn quad_mask(&self) -> u16 {
        self.quads
    }

    /// Adds a network unless one with the same origin is already present.
    pub fn add_network(&mut self, network: Arc<RoadNetwork>) {
        let origin = network.origin_point();
        if !self.networks.iter().any(|n| n.origin_point() == origin) {
            self.networks.push(network);
        }
    }

    /// Copies the networks originating in the given quad into `other`.
    pub fn copy_quad_into(&self, other: &mut RoadRegion, qx: i32, qy: i32) {
        for n in &self.networks {
            if n.is_in_quad(qx, qy) {
                other.add_network(Arc::clone(n));
            }
        }
    }

    /// Drops networks whose bounds no longer overlap this region.
    pub fn prune(&mut self) {
        let (x, y) = (self.x, self.y);
        self.networks.retain(|n| n.overlaps_region(x, y));
    }

    pub(crate) fn write_to<W: stdio::Write>(&self, w: &mut ByteWriter<W>) -> stdio::Result<()> {
        w.write_i16(self.x)?;
        w.write_i16(self.y)?;
        w.write_u16(self.quads)?;
        w.write_i32(self.networks.len() as i32)?;
        for n in &self.networks {
            n.write_to(w)?;
        }
        Ok(())
    }

    pub(crate) fn read_from<R: stdio::Read>(r: &mut ByteReader<R>) -> StoreResult<Self> {
        let x = r.read_i16()?;
        let y = r.read_i16()?;
        let quads = r.read_u16()?;
        let count = r.read_count("network")?;
        let mut networks = Vec::with_capacity(count);
        for _ in 0..count {
            networks.push(Arc::new(RoadNetwork::read_from(r)?));
        }
        Ok(Self {
            x,
            y,
            quads,
            networks,
        })
    }

    /// Persists this region.
    pub fn save_to_disk(&self, root: &Path, seed: i64) -> StoreResult<()> {
        let mut w = ByteWriter::create(&region_path(root, seed, self.x, self.y))?;
        self.write_to(&mut w)?;
        w.finish()?;
        Ok(())
    }

    /// Loads a region from disk. `None` when no file exists.
    pub fn load_from_disk(root: &Path, seed: i64, x: i16, y: i16) -> StoreResult<Option<Self>> {
        let path = region_path(root, seed, x, y);
        let mut r = match ByteReader::open(&path) {
            Ok(r) => r,
            Err(e) if e.kind() == stdio::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(Self::read_from(&mut r)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VertexGraph;
    use crate::road::{Road, RoadVertex, VertexFlags};

    fn network(points: &[(i32, i32)]) -> Arc<RoadNetwork> {
        let vertices: Vec<RoadVertex> = points
            .iter()
            .map(|&(x, y)| RoadVertex {
                x,
                y,
                radius: 3,
                color: 0,
                integrity: 0.65,
                theta: -1.0,
                x_angle: -1.0,
                flags: VertexFlags::MIDPOINT,
            })
            .collect();
        let road = Road::new(
            0,
            points.iter().map(|p| p.0).min().unwrap(),
            points.iter().map(|p| p.1).min().unwrap(),
            points.iter().map(|p| p.0).max().unwrap(),
            points.iter().map(|p| p.1).max().unwrap(),
            vertices,
        );
        let mut graph = VertexGraph::new();
        graph.plot(&road);
        Arc::new(RoadNetwork::new(vec![road], graph))
    }

    #[test]
    fn test_region_coord_floor_at_negatives() {
        assert_eq!(region_coord(-1024), 0);
        assert_eq!(region_coord(-1025), -1);
        assert_eq!(region_coord(1023), 0);
        assert_eq!(region_coord(1024), 1);
        assert_eq!(region_to_abs(0), -1024);
        assert_eq!(region_to_abs(-1), -3072);
    }

    #[test]
    fn test_transform_inverse_and_monotonic() {
        let mut prev = i16::MIN;
        for c in (-100_000..100_000).step_by(97) {
            let r = region_coord(c);
            let back = region_to_abs(r);
            assert!(back <= c && c < back + LEN, "c = {c}");
            assert!(r >= prev);
            prev = r;
        }
    }

    #[test]
    fn test_quad_math() {
        assert_eq!(quad_coord(-1024), 0);
        assert_eq!(quad_coord(1023), 3);
        assert_eq!(quad_coord(1024), 4);
        assert_eq!(quad_to_region(3), 0);
        assert_eq!(quad_to_region(4), 1);
        assert_eq!(quad_to_region(-1), -1);
        assert_eq!(quad_to_abs(0), -1024);
        assert_eq!(quad_to_chunk(0), -64);
        assert_eq!(quad_to_chunk(4), quad_to_chunk(0) + CHUNK_LEN);
        for c in (-10_000..10_000).step_by(13) {
            assert_eq!(quad_to_region(quad_coord(c)), region_coord(c));
        }
    }

    #[test]
    fn test_chunk_math() {
        assert_eq!(block_to_chunk(-1024), -64);
        assert_eq!(block_to_chunk(-1), -1);
        assert_eq!(block_to_chunk(15), 0);
        assert_eq!(chunk_center(0), 8);
        assert_eq!(first_chunk(0), -64);
        assert_eq!(first_chunk(1), 64);
    }

    #[test]
    fn test_quad_mask() {
        let mut r = RoadRegion::new(0, 0);
        assert!(!r.is_fully_generated());
        for qx in 0..QUADS {
            for qy in 0..QUADS {
                assert!(!r.has_quad(qx, qy));
                r.set_quad_generated(qx, qy);
                assert!(r.has_quad(qx, qy));
            }
        }
        assert!(r.is_fully_generated());
        // Quads of other regions are never owned.
        assert!(!r.has_quad(-1, 0));
        assert!(!r.has_quad(4, 0));
    }

    #[test]
    fn test_add_network_dedupes_by_origin() {
        let mut r = RoadRegion::new(0, 0);
        let n = network(&[(0, 0), (10, 0)]);
        r.add_network(Arc::clone(&n));
        r.add_network(n);
        assert_eq!(r.networks().len(), 1);
    }

    #[test]
    fn test_copy_quad_and_prune() {
        let mut a = RoadRegion::new(0, 0);
        // Origin in quad (3, 2) of region (0, 0), straddling into region (1, 0).
        let straddler = network(&[(1000, 0), (1100, 0)]);
        let q = quad_coord(1000);
        assert_eq!(q, 3);
        a.add_network(Arc::clone(&straddler));

        let mut b = RoadRegion::new(1, 0);
        a.copy_quad_into(&mut b, q, quad_coord(0));
        assert_eq!(b.networks().len(), 1);
        b.prune();
        assert_eq!(b.networks().len(), 1);

        // A network fully inside region (0, 0) is pruned from (1, 0).
        let mut b2 = RoadRegion::new(1, 0);
        b2.add_network(network(&[(0, 600), (10, 600)]));
        b2.prune();
        assert!(b2.networks().is_empty());
    }

    #[test]
    fn test_roundtrip_preserves_mask() {
        let mut r = RoadRegion::new(-2, 5);
        r.set_quad_generated(-8, 20);
        r.add_network(network(&[(-4000, 10_300), (-3900, 10_300)]));
        let mut buf = Vec::new();
        r.write_to(&mut ByteWriter::new(&mut buf)).unwrap();
        let out = RoadRegion::read_from(&mut ByteReader::new(buf.as_slice())).unwrap();
        assert_eq!((out.x, out.y), (-2, 5));
        assert_eq!(out.quad_mask(), r.quad_mask());
        assert_eq!(out.networks().len(), 1);
        assert!(!out.is_fully_generated());
    }

    #[test]
    fn test_empty_but_unmarked_region_regenerates() {
        // Zero networks with an incomplete mask is "not yet generated",
        // never "confirmed empty".
        let r = RoadRegion::new(0, 0);
        let mut buf = Vec::new();
        r.write_to(&mut ByteWriter::new(&mut buf)).unwrap();
        let out = RoadRegion::read_from(&mut ByteReader::new(buf.as_slice())).unwrap();
        assert!(out.networks().is_empty());
        assert!(!out.is_fully_generated());
    }
}
