//! Linear octree with brick leaves

use crate::core::types::Vec3;
use crate::math::Aabb;
use crate::voxel::march;

use super::node::{child_offset, Material, Node, PackedNode};
use super::storage::Storage;
use super::twig::{Twig, TWIG_LEVELS, TWIG_SIZE};

/// Deepest supported tree; `2^depth` voxels per side must fit a u32
pub const MAX_DEPTH: u32 = 30;

/// A reachable cell of the tree
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    /// Node array index
    pub index: u32,
    pub node: Node,
    /// World-space min corner
    pub bmin: Vec3,
    /// World-space edge length
    pub size: f32,
    /// Depth below the root (root is 0)
    pub level: u32,
}

impl Cell {
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.bmin, self.bmin + Vec3::splat(self.size))
    }
}

/// Node type counts over the reachable tree
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub empty: usize,
    pub leaf: usize,
    pub branch: usize,
    pub twig: usize,
}

impl TreeStats {
    pub fn reachable(&self) -> usize {
        self.empty + self.leaf + self.branch + self.twig
    }
}

/// Sparse voxel volume over one axis-aligned cube
///
/// Node 0 is the root. BRANCH children are 8 contiguous nodes; bricks sit
/// at level `depth - TWIG_LEVELS`, so a tree of depth `d` resolves
/// `2^d` voxels per side.
#[derive(Clone, Debug)]
pub struct VoxelTree {
    position: Vec3,
    size: f32,
    depth: u32,
    nodes: Storage<PackedNode>,
    twigs: Storage<Twig>,
}

impl VoxelTree {
    /// Create a tree whose root is a single EMPTY node
    pub fn new(position: Vec3, size: f32, depth: u32) -> Self {
        assert!(depth >= TWIG_LEVELS, "tree depth {depth} is shallower than a brick");
        assert!(depth <= MAX_DEPTH, "tree depth {depth} exceeds {MAX_DEPTH}");
        let mut nodes = Storage::with_capacity(1);
        nodes.push(PackedNode::EMPTY);
        Self {
            position,
            size,
            depth,
            nodes,
            twigs: Storage::with_capacity(0),
        }
    }

    /// Rebuild a tree from raw arrays (capacity equals length)
    pub fn from_parts(
        position: Vec3,
        size: f32,
        depth: u32,
        nodes: Vec<PackedNode>,
        twigs: Vec<Twig>,
    ) -> Self {
        assert!(depth >= TWIG_LEVELS, "tree depth {depth} is shallower than a brick");
        assert!(depth <= MAX_DEPTH, "tree depth {depth} exceeds {MAX_DEPTH}");
        assert!(!nodes.is_empty(), "tree has no root node");
        Self {
            position,
            size,
            depth,
            nodes: Storage::from_vec(nodes),
            twigs: Storage::from_vec(twigs),
        }
    }

    /// World-space min corner
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// World-space edge length
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Maximum subdivision depth
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Level at which bricks sit
    pub fn twig_level(&self) -> u32 {
        self.depth - TWIG_LEVELS
    }

    /// Edge length of the finest voxel
    pub fn voxel_size(&self) -> f32 {
        self.size / (1u32 << self.depth) as f32
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.position, self.position + Vec3::splat(self.size))
    }

    pub fn root(&self) -> Node {
        self.node(0)
    }

    pub fn root_cell(&self) -> Cell {
        Cell {
            index: 0,
            node: self.root(),
            bmin: self.position,
            size: self.size,
            level: 0,
        }
    }

    pub fn node(&self, index: u32) -> Node {
        self.nodes.get(index as usize).decode()
    }

    pub fn twig(&self, index: u32) -> &Twig {
        self.twigs.get_ref(index as usize)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn twig_count(&self) -> usize {
        self.twigs.len()
    }

    pub fn node_capacity(&self) -> usize {
        self.nodes.capacity()
    }

    pub fn twig_capacity(&self) -> usize {
        self.twigs.capacity()
    }

    /// Packed node words (for GPU upload and persistence)
    pub fn nodes(&self) -> &[PackedNode] {
        self.nodes.as_slice()
    }

    /// Bricks (for GPU upload and persistence)
    pub fn twigs(&self) -> &[Twig] {
        self.twigs.as_slice()
    }

    pub fn node_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.nodes.as_slice())
    }

    pub fn twig_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.twigs.as_slice())
    }

    /// Bytes a device allocation needs for the node array at current capacity
    pub fn node_capacity_bytes(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<PackedNode>()
    }

    /// Bytes a device allocation needs for the brick array at current capacity
    pub fn twig_capacity_bytes(&self) -> usize {
        self.twigs.capacity() * std::mem::size_of::<Twig>()
    }

    /// Memory used by both arrays (bytes)
    pub fn memory_usage(&self) -> usize {
        self.node_bytes().len() + self.twig_bytes().len()
    }

    /// Shrink both arrays to their exact length
    pub fn trim(&mut self) {
        self.nodes.trim();
        self.twigs.trim();
    }

    /// Material of the voxel containing `p` (0 outside the tree)
    pub fn material_at(&self, p: Vec3) -> Material {
        let bounds = self.bounds();
        if !march::is_inside_cube(p, bounds.min, bounds.max) {
            return 0;
        }
        self.material_below(&self.root_cell(), p)
    }

    /// Material at `p`, descending from `cell` (which must contain `p`)
    pub fn material_below(&self, cell: &Cell, p: Vec3) -> Material {
        let cell = march::traverse_from(p, self, *cell);
        match cell.node {
            Node::Empty => 0,
            Node::Leaf(m) => m,
            Node::Twig(t) => {
                let leaf = cell.size / TWIG_SIZE as f32;
                let last = (TWIG_SIZE - 1) as f32;
                let local = ((p - cell.bmin) / leaf).floor().clamp(Vec3::ZERO, Vec3::splat(last));
                self.twig(t).get(local.x as usize, local.y as usize, local.z as usize)
            }
            Node::Branch(_) => unreachable!("traverse stops at terminal nodes"),
        }
    }

    /// Visit every reachable cell, parents before children
    pub fn visit<F: FnMut(&Cell)>(&self, mut f: F) {
        let mut stack = vec![self.root_cell()];
        while let Some(cell) = stack.pop() {
            f(&cell);
            if let Node::Branch(first) = cell.node {
                let half = cell.size * 0.5;
                for i in 0..8 {
                    let index = first + i;
                    stack.push(Cell {
                        index,
                        node: self.node(index),
                        bmin: child_min(cell.bmin, half, i),
                        size: half,
                        level: cell.level + 1,
                    });
                }
            }
        }
    }

    /// Count reachable nodes by type
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.visit(|cell| match cell.node {
            Node::Empty => stats.empty += 1,
            Node::Leaf(_) => stats.leaf += 1,
            Node::Branch(_) => stats.branch += 1,
            Node::Twig(_) => stats.twig += 1,
        });
        stats
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut Storage<PackedNode> {
        &mut self.nodes
    }

    pub(crate) fn twigs_mut(&mut self) -> &mut Storage<Twig> {
        &mut self.twigs
    }

    pub(crate) fn set_node(&mut self, index: u32, node: Node) {
        self.nodes.set(index as usize, PackedNode::encode(node));
    }
}

impl PartialEq for VoxelTree {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
            && self.size == other.size
            && self.depth == other.depth
            && self.nodes() == other.nodes()
            && self.twigs() == other.twigs()
    }
}

/// Min corner of child slot `i` of a cell at `bmin` with child edge `half`
pub fn child_min(bmin: Vec3, half: f32, i: u32) -> Vec3 {
    let (x, y, z) = child_offset(i);
    bmin + Vec3::new(x as f32, y as f32, z as f32) * half
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tree() {
        let tree = VoxelTree::new(Vec3::new(0.0, 0.0, 0.0), 128.0, 7);
        assert_eq!(tree.root(), Node::Empty);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.twig_count(), 0);
        assert_eq!(tree.twig_level(), 5);
        assert_eq!(tree.voxel_size(), 1.0);
        assert_eq!(tree.material_at(Vec3::splat(3.0)), 0);
    }

    #[test]
    #[should_panic(expected = "shallower than a brick")]
    fn test_too_shallow_panics() {
        VoxelTree::new(Vec3::ZERO, 4.0, 1);
    }

    #[test]
    fn test_material_at_hand_built_tree() {
        // Root branch: child 0 is a leaf, child 7 is a brick, the rest empty
        let mut nodes = vec![PackedNode::encode(Node::Branch(1))];
        nodes.extend((0..8).map(|i| match i {
            0 => PackedNode::encode(Node::Leaf(3)),
            7 => PackedNode::encode(Node::Twig(0)),
            _ => PackedNode::EMPTY,
        }));
        let mut twig = Twig::EMPTY;
        twig.set(0, 0, 0, 9);
        let tree = VoxelTree::from_parts(Vec3::ZERO, 8.0, 3, nodes, vec![twig]);

        assert_eq!(tree.material_at(Vec3::splat(1.0)), 3);
        assert_eq!(tree.material_at(Vec3::new(5.0, 1.0, 1.0)), 0);
        // Brick cells are 1 unit; cell (0,0,0) of child 7 starts at (4,4,4)
        assert_eq!(tree.material_at(Vec3::splat(4.5)), 9);
        assert_eq!(tree.material_at(Vec3::splat(5.5)), 0);
        assert_eq!(tree.material_at(Vec3::splat(20.0)), 0);

        let stats = tree.stats();
        assert_eq!(stats.branch, 1);
        assert_eq!(stats.leaf, 1);
        assert_eq!(stats.twig, 1);
        assert_eq!(stats.empty, 6);
        assert_eq!(stats.reachable(), 9);
    }

    #[test]
    fn test_byte_views() {
        let tree = VoxelTree::new(Vec3::ZERO, 16.0, 4);
        assert_eq!(tree.node_bytes().len(), 4);
        assert_eq!(tree.twig_bytes().len(), 0);
        assert_eq!(tree.memory_usage(), 4);
    }

    #[test]
    fn test_child_min() {
        let bmin = Vec3::new(10.0, 0.0, 0.0);
        assert_eq!(child_min(bmin, 2.0, 0), bmin);
        assert_eq!(child_min(bmin, 2.0, 1), Vec3::new(12.0, 0.0, 0.0));
        assert_eq!(child_min(bmin, 2.0, 6), Vec3::new(10.0, 2.0, 2.0));
    }
}
