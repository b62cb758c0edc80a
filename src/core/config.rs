//! World configuration, loaded from and saved to JSON

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::Error;
use super::types::Result;
use crate::render::buffer::COPY_ALIGNMENT;
use crate::terrain::material::WATER;
use crate::terrain::{MaterialRamp, TerrainParams};
use crate::voxel::svo::{Material, MAX_DEPTH, TWIG_LEVELS};

/// Everything needed to generate and host a world
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunks along x
    pub width: u32,
    /// Chunks along y
    pub height: u32,
    /// Chunks along z
    pub depth: u32,
    /// Edge length of one chunk in world units
    pub chunk_size: f32,
    pub tree_depth: u32,
    pub terrain: TerrainParams,
    pub materials: MaterialRamp,
    /// World y below which empty space fills with `water_material`
    pub sea_level: f32,
    pub water_material: Material,
    /// Device buffers per array kind
    pub regions: usize,
    pub initial_region_bytes: usize,
    pub max_region_bytes: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 4,
            height: 1,
            depth: 4,
            chunk_size: 128.0,
            tree_depth: 7,
            terrain: TerrainParams::default(),
            materials: MaterialRamp::default(),
            sea_level: 6.0,
            water_material: WATER,
            regions: 2,
            initial_region_bytes: 4096,
            max_region_bytes: i32::MAX as usize,
        }
    }
}

impl WorldConfig {
    /// Read a config file; absent fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Number of chunks in the grid
    pub fn chunk_count(&self) -> usize {
        (self.width * self.height * self.depth) as usize
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));

        if !self.terrain.resolution.is_power_of_two() {
            return fail(format!("terrain resolution {} is not a power of two", self.terrain.resolution));
        }
        if self.tree_depth < TWIG_LEVELS {
            return fail(format!("tree depth {} is below the brick depth {TWIG_LEVELS}", self.tree_depth));
        }
        if self.tree_depth > MAX_DEPTH {
            return fail(format!("tree depth {} exceeds {MAX_DEPTH}", self.tree_depth));
        }
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return fail(format!("grid {}x{}x{} has no chunks", self.width, self.height, self.depth));
        }
        if !(self.chunk_size > 0.0) {
            return fail(format!("chunk size {} is not positive", self.chunk_size));
        }
        if self.regions == 0 {
            return fail("at least one region per buffer kind is needed".into());
        }
        if self.initial_region_bytes == 0 || self.initial_region_bytes % COPY_ALIGNMENT != 0 {
            return fail(format!(
                "initial region size {} is not a positive multiple of {COPY_ALIGNMENT}",
                self.initial_region_bytes
            ));
        }
        if self.max_region_bytes < self.initial_region_bytes {
            return fail(format!(
                "maximum region size {} is below the initial size {}",
                self.max_region_bytes, self.initial_region_bytes
            ));
        }
        self.materials.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_count(), 16);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/world.json");

        let config = WorldConfig {
            width: 2,
            sea_level: -3.0,
            terrain: TerrainParams {
                seed: 7,
                ..Default::default()
            },
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(WorldConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "width": 3, "terrain": { "seed": 99 } }"#).unwrap();

        let config = WorldConfig::load(&path).unwrap();
        assert_eq!(config.width, 3);
        assert_eq!(config.terrain.seed, 99);
        assert_eq!(config.terrain.resolution, 128);
        assert_eq!(config.tree_depth, 7);
    }

    #[test]
    fn test_load_reports_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ width: ").unwrap();
        assert!(matches!(WorldConfig::load(&path), Err(Error::Json(_))));
        assert!(matches!(
            WorldConfig::load(&dir.path().join("absent.json")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_validate_rejects() {
        let cases = [
            WorldConfig {
                terrain: TerrainParams {
                    resolution: 100,
                    ..Default::default()
                },
                ..Default::default()
            },
            WorldConfig { tree_depth: 1, ..Default::default() },
            WorldConfig { tree_depth: 40, ..Default::default() },
            WorldConfig { tree_depth: MAX_DEPTH + 1, ..Default::default() },
            WorldConfig { height: 0, ..Default::default() },
            WorldConfig { regions: 0, ..Default::default() },
            WorldConfig { initial_region_bytes: 6, ..Default::default() },
            WorldConfig {
                initial_region_bytes: 64,
                max_region_bytes: 32,
                ..Default::default()
            },
            WorldConfig {
                materials: MaterialRamp { bands: Vec::new() },
                ..Default::default()
            },
        ];

        for config in cases {
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{config:?}");
        }
    }
}
