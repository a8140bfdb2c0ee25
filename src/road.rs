//! Roads and the vertices they are sampled from.

use std::io;

use bitflags::bitflags;

use crate::io::{ByteReader, ByteWriter, StoreResult};
use crate::region;

bitflags! {
    /// Structural role flags for a road vertex.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VertexFlags: u16 {
        /// First vertex of a road.
        const START = 1;
        /// Last vertex of a road.
        const END = 1 << 1;
        /// Any interior vertex.
        const MIDPOINT = 1 << 2;
        /// Vertex where a branch meets another road.
        const INTERSECTION = 1 << 3;
        /// Vertex at a sharp change of heading.
        const BEND = 1 << 4;
    }
}

/// A sample point along a road.
///
/// Vertices carry enough data to render the road without re-deriving
/// anything from terrain: a stroke radius, a packed RGB color, an
/// "integrity" (the probability that a given pixel along the stroke is
/// drawn, giving an eroded gravel look), the turn angle `theta` and the
/// heading `x_angle`. Angles are `-1.0` at road endpoints where no
/// neighboring pair exists to compute them from.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadVertex {
    /// Absolute world x.
    pub x: i32,
    /// Absolute world y.
    pub y: i32,
    /// Stroke radius in blocks.
    pub radius: u8,
    /// Packed `0xRRGGBB` color.
    pub color: u32,
    /// Probability that a pixel of the stroke is drawn, in `0.0..=1.0`.
    pub integrity: f32,
    /// Turn angle between the two neighboring vertices, in radians.
    pub theta: f32,
    /// Heading toward the next vertex, in radians.
    pub x_angle: f32,
    /// Structural role flags.
    pub flags: VertexFlags,
}

impl RoadVertex {
    /// Checks whether all given flags are set.
    pub fn has_flag(&self, flag: VertexFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Sets the given flags.
    pub fn add_flag(&mut self, flag: VertexFlags) {
        self.flags |= flag;
    }

    /// Clears the given flags.
    pub fn remove_flag(&mut self, flag: VertexFlags) {
        self.flags &= !flag;
    }

    pub(crate) fn write_to<W: io::Write>(&self, w: &mut ByteWriter<W>) -> io::Result<()> {
        w.write_i32(self.x)?;
        w.write_i32(self.y)?;
        w.write_u8(self.radius)?;
        w.write_u32(self.color)?;
        w.write_fixed(self.integrity)?;
        w.write_fixed(self.theta)?;
        w.write_fixed(self.x_angle)?;
        w.write_u16(self.flags.bits())
    }

    pub(crate) fn read_from<R: io::Read>(r: &mut ByteReader<R>) -> io::Result<Self> {
        Ok(Self {
            x: r.read_i32()?,
            y: r.read_i32()?,
            radius: r.read_u8()?,
            color: r.read_u32()?,
            integrity: r.read_fixed()?,
            theta: r.read_fixed()?,
            x_angle: r.read_fixed()?,
            flags: VertexFlags::from_bits_retain(r.read_u16()?),
        })
    }
}

/// An ordered polyline of vertices with a branch level.
///
/// Level 0 is a main road; levels 1 and 2 are branch depths. The bounding
/// box contains every vertex exactly, with no implicit padding; queries
/// that want slack pass it explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Road {
    /// Branch depth: 0 = main road, 1/2 = branches.
    pub level: u8,
    /// Minimum x over all vertices.
    pub min_x: i32,
    /// Minimum y over all vertices.
    pub min_y: i32,
    /// Maximum x over all vertices.
    pub max_x: i32,
    /// Maximum y over all vertices.
    pub max_y: i32,
    vertices: Vec<RoadVertex>,
}

impl Road {
    /// Longest straight-line span a road may attempt, in blocks.
    pub const MAX_DISTANCE: i32 = region::LEN / 2;
    /// Node budget for a single search.
    pub const MAX_LENGTH: i32 = region::LEN;
    /// Lattice stride the search operates on.
    pub const STEP: i32 = 2;
    /// Default padding for overlap queries, in blocks.
    pub const PADDING: i32 = 32;

    /// Builds a road from decorated vertices, asserting it is non-empty.
    pub fn new(level: u8, min_x: i32, min_y: i32, max_x: i32, max_y: i32, vertices: Vec<RoadVertex>) -> Self {
        assert!(!vertices.is_empty(), "road built with no vertices");
        Self {
            level,
            min_x,
            min_y,
            max_x,
            max_y,
            vertices,
        }
    }

    /// The vertices from start to end.
    pub fn vertices(&self) -> &[RoadVertex] {
        &self.vertices
    }

    #[cfg(test)]
    pub(crate) fn vertices_mut(&mut self) -> &mut [RoadVertex] {
        &mut self.vertices
    }

    /// Approximate road length: one lattice step per vertex.
    pub fn length(&self) -> i32 {
        self.vertices.len() as i32 * Self::STEP
    }

    /// Diagonal of the bounding box.
    pub fn distance(&self) -> i32 {
        let dx = (self.min_x - self.max_x) as f64;
        let dy = (self.min_y - self.max_y) as f64;
        (dx * dx + dy * dy).sqrt() as i32
    }

    /// Overall heading from the first to the last vertex, in radians.
    pub fn broad_angle(&self) -> f32 {
        let s = self.first();
        let e = self.last();
        ((e.y - s.y) as f32).atan2((e.x - s.x) as f32)
    }

    /// Whether the padded bounding box contains a point.
    pub fn contains_point(&self, x: i32, y: i32, padding: i32) -> bool {
        x > self.min_x - padding
            && x < self.max_x + padding
            && y > self.min_y - padding
            && y < self.max_y + padding
    }

    /// Whether the bounding box overlaps the given region.
    pub fn is_in_region(&self, rx: i16, ry: i16) -> bool {
        let x1 = region::region_to_abs(rx);
        let y1 = region::region_to_abs(ry);
        rects_overlap(
            x1,
            y1,
            x1 + region::LEN,
            y1 + region::LEN,
            self.min_x,
            self.min_y,
            self.max_x,
            self.max_y,
        )
    }

    /// First vertex (the start).
    pub fn first(&self) -> &RoadVertex {
        &self.vertices[0]
    }

    /// Last vertex (the end).
    pub fn last(&self) -> &RoadVertex {
        &self.vertices[self.vertices.len() - 1]
    }

    pub(crate) fn last_mut(&mut self) -> &mut RoadVertex {
        let i = self.vertices.len() - 1;
        &mut self.vertices[i]
    }

    pub(crate) fn write_to<W: io::Write>(&self, w: &mut ByteWriter<W>) -> io::Result<()> {
        w.write_u8(self.level)?;
        w.write_i32(self.min_x)?;
        w.write_i32(self.min_y)?;
        w.write_i32(self.max_x)?;
        w.write_i32(self.max_y)?;
        w.write_i32(self.vertices.len() as i32)?;
        for v in &self.vertices {
            v.write_to(w)?;
        }
        Ok(())
    }

    pub(crate) fn read_from<R: io::Read>(r: &mut ByteReader<R>) -> StoreResult<Self> {
        let level = r.read_u8()?;
        let min_x = r.read_i32()?;
        let min_y = r.read_i32()?;
        let max_x = r.read_i32()?;
        let max_y = r.read_i32()?;
        let count = r.read_count("vertex")?;
        let mut vertices = Vec::with_capacity(count);
        for _ in 0..count {
            vertices.push(RoadVertex::read_from(r)?);
        }
        Ok(Self {
            level,
            min_x,
            min_y,
            max_x,
            max_y,
            vertices,
        })
    }
}

fn rects_overlap(
    a_min_x: i32,
    a_min_y: i32,
    a_max_x: i32,
    a_max_y: i32,
    b_min_x: i32,
    b_min_y: i32,
    b_max_x: i32,
    b_max_y: i32,
) -> bool {
    a_min_x <= b_max_x && a_max_x >= b_min_x && a_min_y <= b_max_y && a_max_y >= b_min_y
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: i32, y: i32) -> RoadVertex {
        RoadVertex {
            x,
            y,
            radius: 3,
            color: 0x40_4040,
            integrity: 0.65,
            theta: -1.0,
            x_angle: -1.0,
            flags: VertexFlags::MIDPOINT,
        }
    }

    fn road(points: &[(i32, i32)]) -> Road {
        let min_x = points.iter().map(|p| p.0).min().unwrap();
        let min_y = points.iter().map(|p| p.1).min().unwrap();
        let max_x = points.iter().map(|p| p.0).max().unwrap();
        let max_y = points.iter().map(|p| p.1).max().unwrap();
        Road::new(
            0,
            min_x,
            min_y,
            max_x,
            max_y,
            points.iter().map(|&(x, y)| vertex(x, y)).collect(),
        )
    }

    #[test]
    fn test_flags() {
        let mut v = vertex(0, 0);
        v.add_flag(VertexFlags::INTERSECTION);
        assert!(v.has_flag(VertexFlags::INTERSECTION));
        assert!(v.has_flag(VertexFlags::MIDPOINT));
        v.remove_flag(VertexFlags::MIDPOINT);
        assert!(!v.has_flag(VertexFlags::MIDPOINT));
    }

    #[test]
    fn test_length_and_angle() {
        let r = road(&[(0, 0), (2, 0), (4, 0), (6, 0)]);
        assert_eq!(r.length(), 8);
        assert_eq!(r.broad_angle(), 0.0);
    }

    #[test]
    fn test_contains_point_padding_explicit() {
        let r = road(&[(0, 0), (10, 10)]);
        assert!(!r.contains_point(-5, 0, 0));
        assert!(r.contains_point(-5, 0, 10));
        assert!(r.contains_point(5, 5, 0));
    }

    #[test]
    #[should_panic(expected = "no vertices")]
    fn test_empty_road_panics() {
        let _ = Road::new(0, 0, 0, 0, 0, Vec::new());
    }

    #[test]
    fn test_region_overlap() {
        // Region (0, 0) spans [-1024, 1024) on both axes.
        let inside = road(&[(0, 0), (10, 10)]);
        assert!(inside.is_in_region(0, 0));
        assert!(!inside.is_in_region(2, 2));
        let straddling = road(&[(1000, 0), (1100, 0)]);
        assert!(straddling.is_in_region(0, 0));
        assert!(straddling.is_in_region(1, 0));
    }

    #[test]
    fn test_roundtrip_quantizes_angles() {
        let mut r = road(&[(0, 0), (2, 2), (4, 4)]);
        r.vertices_mut()[1].theta = 1.23456;
        r.vertices_mut()[1].x_angle = -0.98765;
        let mut buf = Vec::new();
        r.write_to(&mut ByteWriter::new(&mut buf)).unwrap();
        let out = Road::read_from(&mut ByteReader::new(buf.as_slice())).unwrap();
        assert_eq!(out.level, r.level);
        assert_eq!(out.min_x, r.min_x);
        assert_eq!(out.vertices().len(), r.vertices().len());
        for (a, b) in out.vertices().iter().zip(r.vertices()) {
            assert_eq!((a.x, a.y, a.radius, a.color, a.flags), (b.x, b.y, b.radius, b.color, b.flags));
            assert!((a.theta - b.theta).abs() <= 0.001);
            assert!((a.x_angle - b.x_angle).abs() <= 0.001);
            assert!((a.integrity - b.integrity).abs() <= 0.001);
        }
    }
}
