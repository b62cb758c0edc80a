//! Voxel data structures and operations

pub mod svo;
pub mod edit;
pub mod march;
pub mod world;

pub use svo::{Material, Node, PackedNode, Twig, VoxelTree};
pub use edit::{Delta, EditDeltas, EditOp};
pub use march::{chunkmarch, treemarch, ChunkGrid, MarchHit};
pub use world::{TargetCube, World, WorldStats};
