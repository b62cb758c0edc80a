//! Material ids and the height-to-material ramp

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::voxel::svo::node::Material;

/// Empty space
pub const EMPTY: Material = 0;
pub const GRASS: Material = 1;
pub const DIRT: Material = 2;
pub const STONE: Material = 3;
pub const SAND: Material = 4;
pub const SNOW: Material = 5;
pub const WATER: Material = 6;

/// Heights up to `upto` (normalized) take `material`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialBand {
    pub upto: f32,
    pub material: Material,
}

/// Monotonic bucketing of normalized height into material ids
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialRamp {
    pub bands: Vec<MaterialBand>,
}

impl Default for MaterialRamp {
    fn default() -> Self {
        Self {
            bands: vec![
                MaterialBand { upto: 0.15, material: SAND },
                MaterialBand { upto: 0.3, material: DIRT },
                MaterialBand { upto: 0.7, material: GRASS },
                MaterialBand { upto: 0.9, material: STONE },
                MaterialBand { upto: 1.0, material: SNOW },
            ],
        }
    }
}

impl MaterialRamp {
    /// Material for normalized height `t`; heights past the last band keep it
    pub fn material(&self, t: f32) -> Material {
        self.bands
            .iter()
            .find(|band| t <= band.upto)
            .or(self.bands.last())
            .map_or(STONE, |band| band.material)
    }

    /// Bands must be non-empty, ascending and never map to empty space
    pub fn validate(&self) -> Result<()> {
        if self.bands.is_empty() {
            return Err(Error::Config("material ramp has no bands".into()));
        }
        if self.bands.windows(2).any(|w| w[0].upto > w[1].upto) {
            return Err(Error::Config("material ramp bands are not ascending".into()));
        }
        if self.bands.iter().any(|band| band.material == EMPTY) {
            return Err(Error::Config("material ramp maps a band to empty space".into()));
        }
        Ok(())
    }
}
