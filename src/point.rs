//! Integer world coordinates and seed derivation helpers.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An integer `(x, y)` world coordinate.
///
/// Points are value types: cheap to copy, hashable, and usable as map keys
/// via [`Point::packed`], which folds both axes into a single 64-bit key
/// (high 32 bits = x, low 32 bits = y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// World x coordinate.
    pub x: i32,
    /// World y coordinate.
    pub y: i32,
}

impl Point {
    /// Creates a new point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Packs this point into a single 64-bit key.
    pub const fn packed(self) -> u64 {
        pack(self.x, self.y)
    }

    /// Recovers a point from a packed 64-bit key.
    pub const fn unpack(key: u64) -> Self {
        Self {
            x: (key >> 32) as i32,
            y: key as i32,
        }
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Point) -> f64 {
        distance(self.x, self.y, other.x, other.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Packs two 32-bit coordinates into one 64-bit key.
pub const fn pack(x: i32, y: i32) -> u64 {
    ((x as u32 as u64) << 32) | (y as u32 as u64)
}

/// Euclidean distance between two coordinates.
pub fn distance(x1: i32, y1: i32, x2: i32, y2: i32) -> f64 {
    let dx = (x1 - x2) as f64;
    let dy = (y1 - y2) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Derives a per-chunk feature seed from a world seed.
///
/// The multipliers keep nearby chunks decorrelated while staying fully
/// deterministic for a given world seed.
pub fn feature_seed(base: i64, chunk_x: i32, chunk_y: i32) -> u64 {
    (chunk_x as i64)
        .wrapping_mul(341_873_128_712)
        .wrapping_add((chunk_y as i64).wrapping_mul(132_897_987_541))
        .wrapping_add(base) as u64
}
