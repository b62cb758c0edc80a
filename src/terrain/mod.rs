//! Terrain height fields and material bucketing

pub mod pyramid;
pub mod generator;
pub mod material;

pub use pyramid::HeightPyramid;
pub use generator::{TerrainGenerator, TerrainParams};
pub use material::{MaterialBand, MaterialRamp};
