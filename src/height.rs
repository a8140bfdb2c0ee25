//! Height sources: the terrain collaborator the generator samples.
//!
//! Road generation never produces terrain; it consumes a height field
//! through the [`HeightSource`] trait. Heights are in blocks, with
//! negative values read as ocean.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

/// A deterministic height field over integer world coordinates.
///
/// Implementations must be pure for a given seed: `sample(x, y)` called
/// twice with the same arguments returns the same height. Samples may be
/// served from a cache, but the observable values never change.
pub trait HeightSource: Sync {
    /// Samples the height at a world coordinate.
    fn sample(&self, x: i32, y: i32) -> f32;
}

impl<T: HeightSource + ?Sized> HeightSource for &T {
    fn sample(&self, x: i32, y: i32) -> f32 {
        (**self).sample(x, y)
    }
}

/// Seeded noise-based heightmap with an optional cached viewport window.
///
/// Terrain is a fractal simplex base with a finer "groove" layer summed on
/// top, scaled so typical land sits between 0 and ~48 blocks. A viewer can
/// call [`NoiseHeightmap::generate`] to materialize the visible window;
/// subsequent samples inside it are array reads, and scrolling reuses the
/// overlapping portion of the previous window.
pub struct NoiseHeightmap {
    primary: FastNoiseLite,
    grooves: FastNoiseLite,
    height_scale: f32,
    surface_scale: f32,
    window: Option<Window>,
}

struct Window {
    x0: i32,
    y0: i32,
    width: i32,
    height: i32,
    data: Vec<f32>,
}

impl NoiseHeightmap {
    /// Creates a heightmap for the given seed with default scaling.
    pub fn new(seed: i32) -> Self {
        Self::with_frequency(seed, 0.00125, 0.02)
    }

    /// Creates a heightmap with explicit base and groove frequencies.
    pub fn with_frequency(seed: i32, frequency: f32, groove_frequency: f32) -> Self {
        let mut primary = FastNoiseLite::with_seed(seed);
        primary.set_noise_type(Some(NoiseType::OpenSimplex2));
        primary.set_frequency(Some(frequency));
        primary.set_fractal_type(Some(FractalType::FBm));
        primary.set_fractal_octaves(Some(3));

        let mut grooves = FastNoiseLite::with_seed(seed.wrapping_add(1));
        grooves.set_noise_type(Some(NoiseType::Value));
        grooves.set_frequency(Some(groove_frequency));

        Self {
            primary,
            grooves,
            height_scale: 96.0,
            surface_scale: 0.5,
            window: None,
        }
    }

    fn noise(&self, x: i32, y: i32) -> f32 {
        let x = x as f32;
        let y = y as f32;
        let n = self.primary.get_noise_2d(x, y) + self.grooves.get_noise_2d(x, y) * 0.1;
        let n = n * self.height_scale;
        // Land is flattened toward sea level; ocean depth is left as-is.
        if n > 0.0 {
            n * self.surface_scale
        } else {
            n
        }
    }

    /// Materializes a `width`×`height` window anchored at `(x0, y0)`.
    ///
    /// Regions of the previous window that still overlap are copied rather
    /// than recomputed, so scrolling the viewport costs only the newly
    /// exposed strip.
    pub fn generate(&mut self, x0: i32, y0: i32, width: i32, height: i32) -> &[f32] {
        let mut data = vec![0.0; (width * height) as usize];
        match &self.window {
            Some(prev) => {
                let dx = x0 - prev.x0;
                let dy = y0 - prev.y0;
                for x in 0..width {
                    let px = x + dx;
                    for y in 0..height {
                        let py = y + dy;
                        let i = (x * height + y) as usize;
                        if px >= 0 && px < prev.width && py >= 0 && py < prev.height {
                            data[i] = prev.data[(px * prev.height + py) as usize];
                        } else {
                            data[i] = self.noise(x0 + x, y0 + y);
                        }
                    }
                }
            }
            None => {
                for x in 0..width {
                    for y in 0..height {
                        data[(x * height + y) as usize] = self.noise(x0 + x, y0 + y);
                    }
                }
            }
        }
        let w = self.window.insert(Window {
            x0,
            y0,
            width,
            height,
            data,
        });
        &w.data
    }

    /// Drops the cached window.
    pub fn clear_window(&mut self) {
        self.window = None;
    }
}

impl HeightSource for NoiseHeightmap {
    fn sample(&self, x: i32, y: i32) -> f32 {
        if let Some(w) = &self.window {
            let rx = x - w.x0;
            let ry = y - w.y0;
            if rx >= 0 && rx < w.width && ry >= 0 && ry < w.height {
                return w.data[(rx * w.height + ry) as usize];
            }
        }
        self.noise(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_deterministic() {
        let a = NoiseHeightmap::new(42);
        let b = NoiseHeightmap::new(42);
        for x in -50..50 {
            assert_eq!(a.sample(x * 31, x * 17), b.sample(x * 31, x * 17));
        }
    }

    #[test]
    fn test_seed_changes_terrain() {
        let a = NoiseHeightmap::new(1);
        let b = NoiseHeightmap::new(2);
        let differs = (-50..50).any(|x| a.sample(x * 31, x * 17) != b.sample(x * 31, x * 17));
        assert!(differs);
    }

    #[test]
    fn test_window_matches_direct_samples() {
        let mut gen = NoiseHeightmap::new(7);
        let direct: Vec<f32> = (0..16)
            .flat_map(|x| (0..16).map(move |y| (x, y)))
            .map(|(x, y)| gen.sample(100 + x, 200 + y))
            .collect();
        gen.generate(100, 200, 16, 16);
        for x in 0..16 {
            for y in 0..16 {
                assert_eq!(
                    gen.sample(100 + x, 200 + y),
                    direct[(x * 16 + y) as usize]
                );
            }
        }
    }

    #[test]
    fn test_window_scroll_reuses_values() {
        let mut gen = NoiseHeightmap::new(7);
        gen.generate(0, 0, 32, 32);
        let before = gen.sample(20, 20);
        gen.generate(8, 8, 32, 32);
        assert_eq!(gen.sample(20, 20), before);
    }
}
