//! Memoized local terrain roughness.
//!
//! The search penalizes rough ground, but measuring roughness means taking
//! several height samples per queried cell. [`SmoothnessGraph`] amortizes
//! that: per 16×16 chunk it samples a sparse 7×7 lattice at stride 4,
//! computes the standard deviation of a plus-shaped neighborhood at the
//! corners of each interior 4×4 block, and bilinearly interpolates the
//! values in between. Each block is computed at most once.
//!
//! The graph is not persisted. It is cleared when a generation pass ends,
//! since raw height sampling is cheap relative to the search itself.

use std::collections::HashMap;

use crate::height::HeightSource;
use crate::point::pack;

const STRIDE: i32 = 4;

/// Chunk-cached roughness values with bilinear interior interpolation.
#[derive(Default)]
pub struct SmoothnessGraph {
    chunks: HashMap<u64, ChunkData>,
}

/// Per-chunk storage. A 17×17 value grid (the extra row/column carries the
/// shared upper corner of the last 4×4 block) plus the sparse 7×7 sample
/// lattice. NaN marks the not-yet-computed cells, so a legitimate zero
/// (flat terrain, sea-level samples) never triggers a recompute.
struct ChunkData {
    values: [f32; 17 * 17],
    samples: [f32; 7 * 7],
}

impl Default for ChunkData {
    fn default() -> Self {
        Self {
            values: [f32::NAN; 17 * 17],
            samples: [f32::NAN; 7 * 7],
        }
    }
}

impl ChunkData {
    fn get(&self, rx: i32, ry: i32) -> f32 {
        self.values[(rx * 17 + ry) as usize]
    }

    fn set(&mut self, rx: i32, ry: i32, v: f32) {
        self.values[(rx * 17 + ry) as usize] = v;
    }

    fn sample(&self, rx: i32, ry: i32) -> f32 {
        self.samples[(((rx + STRIDE) / STRIDE) * 7 + ((ry + STRIDE) / STRIDE)) as usize]
    }

    fn set_sample(&mut self, rx: i32, ry: i32, v: f32) {
        self.samples[(((rx + STRIDE) / STRIDE) * 7 + ((ry + STRIDE) / STRIDE)) as usize] = v;
    }
}

impl SmoothnessGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the interpolated roughness at a world coordinate.
    pub fn sd<H: HeightSource + ?Sized>(&mut self, gen: &H, x: i32, y: i32) -> f32 {
        let cx = x >> 4;
        let cy = y >> 4;
        let rx = x & 15;
        let ry = y & 15;
        let lx = rx & !3;
        let ly = ry & !3;
        let data = self.chunks.entry(pack(cx, cy)).or_default();
        if data.get(lx + 1, ly + 1).is_nan() {
            Self::compute(gen, data, cx, cy, lx, ly);
        }
        data.get(rx, ry)
    }

    /// Fills the 4×4 block anchored at `(lx, ly)` of chunk `(cx, cy)`.
    fn compute<H: HeightSource + ?Sized>(
        gen: &H,
        data: &mut ChunkData,
        cx: i32,
        cy: i32,
        lx: i32,
        ly: i32,
    ) {
        let ux = lx + STRIDE;
        let uy = ly + STRIDE;
        // Gather height samples around all four corners. The outermost
        // corners of the sampling area are never read by the plus-shaped
        // neighborhoods, so they are skipped.
        let mut sx = lx - STRIDE;
        while sx <= ux + STRIDE {
            let mut sy = ly - STRIDE;
            while sy <= uy + STRIDE {
                let corner = (sx == lx - STRIDE || sx == ux + STRIDE)
                    && (sy == ly - STRIDE || sy == uy + STRIDE);
                if !corner && data.sample(sx, sy).is_nan() {
                    data.set_sample(sx, sy, gen.sample((cx << 4) + sx, (cy << 4) + sy));
                }
                sy += STRIDE;
            }
            sx += STRIDE;
        }

        data.set(lx, ly, corner_sd(data, lx, ly));
        data.set(ux, uy, corner_sd(data, ux, uy));
        data.set(lx, uy, corner_sd(data, lx, uy));
        data.set(ux, ly, corner_sd(data, ux, ly));

        // Interpolate the two bounding columns, then across the rows.
        for &col in &[lx, ux] {
            let a = data.get(col, ly);
            let b = data.get(col, uy);
            data.set(col, ly + 1, lerp(a, b, 0.25));
            data.set(col, ly + 2, lerp(a, b, 0.5));
            data.set(col, ly + 3, lerp(a, b, 0.75));
        }
        for row in ly..=uy {
            let a = data.get(lx, row);
            let b = data.get(ux, row);
            data.set(lx + 1, row, lerp(a, b, 0.25));
            data.set(lx + 2, row, lerp(a, b, 0.5));
            data.set(lx + 3, row, lerp(a, b, 0.75));
        }
    }

    /// Drops all cached chunks.
    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}

fn corner_sd(data: &ChunkData, rx: i32, ry: i32) -> f32 {
    std_dev(&[
        data.sample(rx, ry),
        data.sample(rx, ry + STRIDE),
        data.sample(rx, ry - STRIDE),
        data.sample(rx + STRIDE, ry),
        data.sample(rx - STRIDE, ry),
    ])
}

fn std_dev(values: &[f32]) -> f32 {
    let len = values.len() as f32;
    let mean = values.iter().sum::<f32>() / len;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / len;
    variance.sqrt()
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
