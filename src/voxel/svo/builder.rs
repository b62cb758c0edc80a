//! Top-down tree growth from a height pyramid
//!
//! Cells are classified breadth-first against the pyramid level matching
//! their depth: entirely above the terrain is EMPTY, entirely below is a
//! LEAF, anything straddling the surface is subdivided until the brick
//! level, where the 64 brick cells are sampled individually. No dense voxel
//! grid is ever allocated.

use std::collections::VecDeque;

use super::node::{Node, PackedNode};
use super::octree::{child_min, Cell, VoxelTree};
use super::twig::{Twig, TWIG_SIZE};
use crate::core::types::Vec3;
use crate::terrain::{HeightPyramid, MaterialRamp};

impl VoxelTree {
    /// Grow a tree over the cube at `position` with edge `size`, using the
    /// default material ramp.
    ///
    /// The pyramid spans the cube's xz footprint.
    pub fn grow(position: Vec3, size: f32, depth: u32, pyramid: &HeightPyramid) -> Self {
        Self::grow_with_ramp(position, size, depth, pyramid, &MaterialRamp::default())
    }

    /// Grow a tree, picking materials from `ramp`
    pub fn grow_with_ramp(
        position: Vec3,
        size: f32,
        depth: u32,
        pyramid: &HeightPyramid,
        ramp: &MaterialRamp,
    ) -> Self {
        let mut tree = VoxelTree::new(position, size, depth);
        let twig_level = tree.twig_level();
        let footprint = Footprint { position, size };

        let mut queue = VecDeque::new();
        queue.push_back(tree.root_cell());

        while let Some(cell) = queue.pop_front() {
            let center = cell.bmin + Vec3::splat(cell.size * 0.5);
            let (u, v) = footprint.normalize(center);
            let (lo, hi) = pyramid.bounds(u, v, cell.level);
            let bottom = cell.bmin.y;
            let top = bottom + cell.size;

            let node = if hi < bottom {
                Node::Empty
            } else if lo > top {
                Node::Leaf(ramp.material(pyramid.normalize(center.y)))
            } else if cell.level == twig_level {
                let twig = grow_twig(&cell, &footprint, depth, pyramid, ramp);
                let (index, _) = tree.twigs_mut().push(twig);
                Node::Twig(index as u32)
            } else {
                let (first, _) = tree.nodes_mut().extend(8, PackedNode::EMPTY);
                let half = cell.size * 0.5;
                for i in 0..8 {
                    queue.push_back(Cell {
                        index: (first as u32) + i,
                        node: Node::Empty,
                        bmin: child_min(cell.bmin, half, i),
                        size: half,
                        level: cell.level + 1,
                    });
                }
                Node::Branch(first as u32)
            };
            tree.set_node(cell.index, node);
        }

        tree.trim();
        log::debug!(
            "Grew tree at {:?}: {} nodes, {} twigs ({} KB)",
            position,
            tree.node_count(),
            tree.twig_count(),
            tree.memory_usage() / 1024
        );
        tree
    }
}

/// Maps world xz into the pyramid's unit square
struct Footprint {
    position: Vec3,
    size: f32,
}

impl Footprint {
    fn normalize(&self, p: Vec3) -> (f32, f32) {
        (
            ((p.x - self.position.x) / self.size).clamp(0.0, 1.0),
            ((p.z - self.position.z) / self.size).clamp(0.0, 1.0),
        )
    }
}

/// Sample each brick cell: solid iff its center lies below the terrain
fn grow_twig(
    cell: &Cell,
    footprint: &Footprint,
    depth: u32,
    pyramid: &HeightPyramid,
    ramp: &MaterialRamp,
) -> Twig {
    let leaf = cell.size / TWIG_SIZE as f32;
    let mut twig = Twig::EMPTY;
    for z in 0..TWIG_SIZE {
        for x in 0..TWIG_SIZE {
            let column = cell.bmin + Vec3::new(x as f32 + 0.5, 0.0, z as f32 + 0.5) * leaf;
            let (u, v) = footprint.normalize(column);
            let height = pyramid.max(u, v, depth);
            for y in 0..TWIG_SIZE {
                let cy = cell.bmin.y + (y as f32 + 0.5) * leaf;
                if cy < height {
                    twig.set(x, y, z, ramp.material(pyramid.normalize(cy)));
                }
            }
        }
    }
    twig
}
