//! GPU-side storage for voxel trees

pub mod buffer;
