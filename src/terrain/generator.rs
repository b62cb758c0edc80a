//! Noise-driven height pyramids for chunk columns

use noise::{Fbm, MultiFractal, Simplex};
use serde::{Deserialize, Serialize};

use super::pyramid::HeightPyramid;
use crate::core::types::{IVec2, Vec3};

/// Parameters controlling terrain height fields
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub seed: u32,
    pub resolution: usize, // Pyramid base samples per chunk side (power of two)
    pub amplitude: f32,    // Height variation around `height`
    pub height: f32,       // Mean terrain height
    pub period: f32,       // Noise frequency per base sample
    pub octaves: u32,      // FBM octaves (detail levels)
    pub persistence: f32,  // FBM persistence (0.5 typical)
    pub lacunarity: f32,   // FBM lacunarity (2.0 typical)
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            resolution: 128,
            amplitude: 16.0,
            height: 16.0,
            period: 1.0 / 128.0,
            octaves: 3,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Builds one [`HeightPyramid`] per xz chunk column from a shared noise source
pub struct TerrainGenerator {
    params: TerrainParams,
    noise: Fbm<Simplex>,
}

impl TerrainGenerator {
    /// Create a new terrain generator with the given parameters
    pub fn new(params: TerrainParams) -> Self {
        let noise = Fbm::<Simplex>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self { params, noise }
    }

    /// Get terrain parameters
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Pyramid for the chunk column at `(column.x, column.y)` in xz.
    ///
    /// Columns are offset by whole pyramid widths in noise space, so
    /// neighboring chunks meet without seams.
    pub fn column_pyramid(&self, column: IVec2) -> HeightPyramid {
        let resolution = self.params.resolution;
        let shift = Vec3::new(
            column.x as f32 * resolution as f32,
            self.params.height,
            column.y as f32 * resolution as f32,
        );
        HeightPyramid::build(
            resolution,
            self.params.amplitude,
            self.params.period,
            shift,
            &self.noise,
        )
    }
}
