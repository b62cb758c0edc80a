//! Sparse voxel octree with 4x4x4 brick leaves

pub mod node;
pub mod twig;
pub mod storage;
pub mod octree;
pub mod builder;
pub mod majority;
pub mod lod;

pub use node::{Material, Node, PackedNode};
pub use twig::{Twig, TWIG_CELLS, TWIG_LEVELS, TWIG_SIZE};
pub use storage::Storage;
pub use octree::{Cell, TreeStats, VoxelTree, MAX_DEPTH};
pub use majority::{MajorityCounter, LOD_CANDIDATES};
