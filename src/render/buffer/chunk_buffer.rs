//! Device copies of chunk trees: one allocator for node arrays, one for bricks

use bytemuck::{Pod, Zeroable};

use super::allocator::{Allocation, Allocator};
use super::device::DeviceBuffer;
use crate::core::types::Vec3;
use crate::voxel::edit::{Delta, EditDeltas};
use crate::voxel::svo::{PackedNode, Twig, VoxelTree};

/// Which of a tree's two arrays a buffer stores
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Tree,
    Twig,
}

/// Allocations backing one chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RootAllocation {
    pub tree: Allocation,
    pub twig: Allocation,
}

/// Per-chunk descriptor for the GPU (32 bytes).
///
/// Offsets are in 32-bit words from the start of their region.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuChunk {
    /// World-space min corner of the chunk
    pub bmin: [f32; 3],
    pub tree_region: u32,
    pub tree_offset: u32,
    pub twig_region: u32,
    pub twig_offset: u32,
    _padding: u32,
}

impl GpuChunk {
    pub fn new(bmin: Vec3, allocation: &RootAllocation) -> Self {
        let word = std::mem::size_of::<u32>();
        Self {
            bmin: bmin.to_array(),
            tree_region: allocation.tree.region as u32,
            tree_offset: (allocation.tree.offset / word) as u32,
            twig_region: allocation.twig.region as u32,
            twig_offset: (allocation.twig.offset / word) as u32,
            _padding: 0,
        }
    }
}

/// Keeps every chunk's node and brick arrays resident in device regions
pub struct RootAllocator<B: DeviceBuffer> {
    tree: Allocator<B>,
    twig: Allocator<B>,
}

impl<B: DeviceBuffer> RootAllocator<B> {
    /// `regions` buffers of `initial_size` bytes per array kind, each
    /// allowed to double up to `max_size`
    pub fn new<F>(keys: usize, regions: usize, initial_size: usize, max_size: usize, mut make_buffer: F) -> Self
    where
        F: FnMut(BufferKind, usize) -> B,
    {
        let tree = (0..regions).map(|_| make_buffer(BufferKind::Tree, initial_size)).collect();
        let twig = (0..regions).map(|_| make_buffer(BufferKind::Twig, initial_size)).collect();
        Self {
            tree: Allocator::new(keys, tree, max_size),
            twig: Allocator::new(keys, twig, max_size),
        }
    }

    /// Allocate room for both arrays at their current capacity and upload them
    pub fn alloc(&mut self, key: usize, tree: &VoxelTree) -> RootAllocation {
        RootAllocation {
            tree: self.tree.alloc(key, tree.node_capacity_bytes(), tree.node_bytes()),
            twig: self.twig.alloc(key, tree.twig_capacity_bytes(), tree.twig_bytes()),
        }
    }

    /// Bring `key`'s device copy up to date after an edit
    pub fn subst(&mut self, key: usize, tree: &VoxelTree, deltas: &EditDeltas) -> RootAllocation {
        let size = std::mem::size_of::<PackedNode>();
        let tree_alloc = Self::patch(
            &mut self.tree,
            key,
            &deltas.tree,
            size,
            tree.node_capacity_bytes(),
            tree.node_bytes(),
        );
        let twig_alloc = Self::patch(
            &mut self.twig,
            key,
            &deltas.twig,
            std::mem::size_of::<Twig>(),
            tree.twig_capacity_bytes(),
            tree.twig_bytes(),
        );
        RootAllocation {
            tree: tree_alloc,
            twig: twig_alloc,
        }
    }

    fn patch(
        allocator: &mut Allocator<B>,
        key: usize,
        delta: &Delta,
        item_size: usize,
        capacity_bytes: usize,
        bytes: &[u8],
    ) -> Allocation {
        match allocator.allocation(key) {
            Some(current) if !delta.realloc => {
                if let Some(range) = delta.byte_range(item_size) {
                    allocator.subst(key, range.start, range.end, bytes);
                }
                current
            }
            _ => allocator.alloc(key, capacity_bytes, bytes),
        }
    }

    pub fn free(&mut self, key: usize) {
        self.tree.free(key);
        self.twig.free(key);
    }

    pub fn allocation(&self, key: usize) -> Option<RootAllocation> {
        Some(RootAllocation {
            tree: self.tree.allocation(key)?,
            twig: self.twig.allocation(key)?,
        })
    }

    pub fn tree_allocator(&self) -> &Allocator<B> {
        &self.tree
    }

    pub fn twig_allocator(&self) -> &Allocator<B> {
        &self.twig
    }

    /// Bytes held across both allocators
    pub fn used_bytes(&self) -> usize {
        self.tree.used_bytes() + self.twig.used_bytes()
    }
}
