//! Box edits on voxel trees with dirty-range tracking.
//!
//! Every edit reports which node and brick indices it wrote so the
//! matching device buffers can be patched instead of re-uploaded.

pub mod delta;
pub mod ops;

pub use delta::{Delta, EditDeltas, EditOp};
