//! Linear octree node
//!
//! Nodes travel to the GPU as single 32-bit words: a 2-bit type tag in the
//! low bits and a 30-bit payload above it. Code on the CPU side works with
//! the [`Node`] enum and only packs/unpacks at the array boundary.

use bytemuck::{Pod, Zeroable};

/// 16-bit material id, 0 is empty space
pub type Material = u16;

/// Largest payload a packed node can carry
pub const MAX_PAYLOAD: u32 = (1 << 30) - 1;

const TAG_BITS: u32 = 2;
const TAG_MASK: u32 = (1 << TAG_BITS) - 1;

const TAG_EMPTY: u32 = 0;
const TAG_LEAF: u32 = 1;
const TAG_BRANCH: u32 = 2;
const TAG_TWIG: u32 = 3;

/// Decoded octree node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Node {
    /// No voxels below this cell
    #[default]
    Empty,
    /// Solid cell of one material
    Leaf(Material),
    /// Index of the first of 8 contiguous children
    Branch(u32),
    /// Index into the brick array
    Twig(u32),
}

impl Node {
    /// Empty or leaf
    pub fn is_terminal(self) -> bool {
        matches!(self, Node::Empty | Node::Leaf(_))
    }

    /// Terminal node for a uniform material (0 means empty)
    pub fn uniform(material: Material) -> Self {
        if material == 0 {
            Node::Empty
        } else {
            Node::Leaf(material)
        }
    }
}

/// Packed node word as stored in node arrays and GPU buffers
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct PackedNode(pub u32);

impl PackedNode {
    pub const EMPTY: PackedNode = PackedNode(TAG_EMPTY);

    /// Pack a node. Panics if the payload does not fit in 30 bits.
    pub fn encode(node: Node) -> Self {
        let (tag, payload) = match node {
            Node::Empty => (TAG_EMPTY, 0),
            Node::Leaf(m) => (TAG_LEAF, m as u32),
            Node::Branch(i) => (TAG_BRANCH, i),
            Node::Twig(i) => (TAG_TWIG, i),
        };
        assert!(payload <= MAX_PAYLOAD, "node payload {payload} exceeds 30 bits");
        PackedNode((payload << TAG_BITS) | tag)
    }

    pub fn decode(self) -> Node {
        let payload = self.0 >> TAG_BITS;
        match self.0 & TAG_MASK {
            TAG_EMPTY => Node::Empty,
            TAG_LEAF => Node::Leaf(payload as Material),
            TAG_BRANCH => Node::Branch(payload),
            _ => Node::Twig(payload),
        }
    }
}

impl From<Node> for PackedNode {
    fn from(node: Node) -> Self {
        PackedNode::encode(node)
    }
}

impl From<PackedNode> for Node {
    fn from(packed: PackedNode) -> Self {
        packed.decode()
    }
}

/// Child slot for octant offsets in {0,1}: `x + 2y + 4z`
pub fn child_index(x: u32, y: u32, z: u32) -> u32 {
    debug_assert!(x < 2 && y < 2 && z < 2);
    x + 2 * y + 4 * z
}

/// Octant offsets of child slot `i`
pub fn child_offset(i: u32) -> (u32, u32, u32) {
    debug_assert!(i < 8);
    (i & 1, (i >> 1) & 1, (i >> 2) & 1)
}
