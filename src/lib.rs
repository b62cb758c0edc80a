//! Octwig - procedural sparse voxel octrees
//!
//! Terrain is grown top-down from min/max height pyramids into octrees
//! whose leaves bottom out in 4×4×4 bricks ("twigs"). Trees support box
//! edits that report the dirty span of each array, level-of-detail
//! collapse, and ray marching. Their node and brick arrays live in
//! growable device regions handed out by a first-fit allocator.

pub mod core;
pub mod math;
pub mod terrain;
pub mod voxel;
pub mod render;
pub mod streaming;
