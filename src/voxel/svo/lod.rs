//! Defragmentation, level-of-detail collapse and volume queries
//!
//! Both rewrites read the source tree immutably and write a fresh tree, so
//! they recurse instead of keeping an explicit stack. Subtrees whose eight
//! children reduce to the same terminal node fold into that node, and
//! uniform bricks fold into EMPTY or LEAF.

use super::majority::{MajorityCounter, LOD_CANDIDATES};
use super::node::{Material, Node, PackedNode};
use super::octree::{child_min, Cell, VoxelTree};
use super::twig::{twig_coords, Twig, TWIG_CELLS, TWIG_LEVELS, TWIG_SIZE};
use crate::core::types::Vec3;
use crate::math::Aabb;

impl VoxelTree {
    /// Compacted copy without orphaned nodes or bricks.
    ///
    /// Uniform bricks become terminals and BRANCH nodes found at the brick
    /// level are flattened into a brick by sampling its cell centers.
    pub fn defrag_copy(&self) -> VoxelTree {
        let mut out = VoxelTree::new(self.position(), self.size(), self.depth());
        let twig_level = self.twig_level();
        let root = self.rebuild(&mut out, &self.root_cell(), twig_level, &|src, cell| match cell.node {
            Node::Twig(i) => *src.twig(i),
            _ => src.sample_twig(cell),
        });
        out.set_node(0, root);
        out.trim();

        log::debug!(
            "Defragmented tree at {:?}: {} -> {} nodes, {} -> {} twigs",
            self.position(),
            self.node_count(),
            out.node_count(),
            self.twig_count(),
            out.twig_count()
        );
        out
    }

    /// Tree of depth `depth - 1` over the same cube.
    ///
    /// Each brick cell of the result holds the weighted majority material
    /// (empty included) of the 2x2x2 source voxels it covers. When no
    /// material holds a strict majority the pick is approximate.
    pub fn lod_collapse(&self) -> VoxelTree {
        assert!(
            self.depth() > TWIG_LEVELS,
            "tree of depth {} has no coarser level",
            self.depth()
        );

        let mut out = VoxelTree::new(self.position(), self.size(), self.depth() - 1);
        let twig_level = out.twig_level();
        let root = self.rebuild(&mut out, &self.root_cell(), twig_level, &|src, cell| src.majority_twig(cell));
        out.set_node(0, root);
        out.trim();
        out
    }

    /// Solid fraction of an aligned query cube.
    ///
    /// The cube must be one of the tree's own cells or a union of them
    /// (`qsize = size / 2^k`, `qmin` on the matching grid).
    pub fn density(&self, qmin: Vec3, qsize: f32) -> f32 {
        let mut solid = 0u64;
        let mut total = 0u64;
        self.accumulate(&self.root_cell(), qmin, qsize, &mut |material, weight| {
            total += weight;
            if material != 0 {
                solid += weight;
            }
        });
        if total == 0 { 0.0 } else { solid as f32 / total as f32 }
    }

    fn rebuild<F>(&self, out: &mut VoxelTree, cell: &Cell, twig_level: u32, make_twig: &F) -> Node
    where
        F: Fn(&VoxelTree, &Cell) -> Twig,
    {
        match cell.node {
            Node::Empty | Node::Leaf(_) => cell.node,
            Node::Twig(_) | Node::Branch(_) if cell.level >= twig_level => {
                let twig = make_twig(self, cell);
                match twig.uniform() {
                    Some(m) => Node::uniform(m),
                    None => {
                        let (index, _) = out.twigs_mut().push(twig);
                        Node::Twig(index as u32)
                    }
                }
            }
            Node::Twig(_) => panic!(
                "brick at level {} above the brick level {}",
                cell.level, twig_level
            ),
            Node::Branch(first) => {
                let (slot, _) = out.nodes_mut().extend(8, PackedNode::EMPTY);
                let half = cell.size * 0.5;

                let mut children = [Node::Empty; 8];
                for (i, child) in children.iter_mut().enumerate() {
                    let i = i as u32;
                    let source = Cell {
                        index: first + i,
                        node: self.node(first + i),
                        bmin: child_min(cell.bmin, half, i),
                        size: half,
                        level: cell.level + 1,
                    };
                    *child = self.rebuild(out, &source, twig_level, make_twig);
                }

                if children[0].is_terminal() && children.iter().all(|&c| c == children[0]) {
                    out.nodes_mut().truncate(slot);
                    return children[0];
                }

                for (i, child) in children.iter().enumerate() {
                    out.set_node((slot + i) as u32, *child);
                }
                Node::Branch(slot as u32)
            }
        }
    }

    /// Brick sampled at the 64 cell centers of `cell`
    fn sample_twig(&self, cell: &Cell) -> Twig {
        let leaf = cell.size / TWIG_SIZE as f32;
        let mut twig = Twig::EMPTY;
        for i in 0..TWIG_CELLS {
            let (x, y, z) = twig_coords(i);
            let p = cell.bmin + (Vec3::new(x as f32, y as f32, z as f32) + 0.5) * leaf;
            twig.cells[i] = self.material_below(cell, p);
        }
        twig
    }

    /// Brick whose cells hold the majority material of the source below them
    fn majority_twig(&self, cell: &Cell) -> Twig {
        let leaf = cell.size / TWIG_SIZE as f32;
        let mut counter: MajorityCounter<LOD_CANDIDATES> = MajorityCounter::new();
        let mut twig = Twig::EMPTY;
        for i in 0..TWIG_CELLS {
            let (x, y, z) = twig_coords(i);
            let qmin = cell.bmin + Vec3::new(x as f32, y as f32, z as f32) * leaf;
            counter.clear();
            self.accumulate(cell, qmin, leaf, &mut |material, weight| {
                counter.count_weighted(material, weight)
            });
            twig.cells[i] = counter.majority();
        }
        twig
    }

    /// Feed every material under the aligned cube `[qmin, qmin + qsize]`
    /// to `sink`, weighted by volume in finest voxels.
    fn accumulate<F>(&self, start: &Cell, qmin: Vec3, qsize: f32, sink: &mut F)
    where
        F: FnMut(Material, u64),
    {
        let voxel = self.voxel_size();
        let query = Aabb::cube(qmin, qsize);
        let weight = |extent: f32| {
            let side = ((extent / voxel).round() as u64).max(1);
            side * side * side
        };

        let mut stack = vec![*start];
        while let Some(cell) = stack.pop() {
            match cell.node {
                Node::Empty => sink(0, weight(cell.size.min(qsize))),
                Node::Leaf(m) => sink(m, weight(cell.size.min(qsize))),
                Node::Twig(t) => {
                    let twig = self.twig(t);
                    let leaf = cell.size / TWIG_SIZE as f32;
                    for i in 0..TWIG_CELLS {
                        let (x, y, z) = twig_coords(i);
                        let lmin = cell.bmin + Vec3::new(x as f32, y as f32, z as f32) * leaf;
                        if Aabb::cube(lmin, leaf).overlaps(&query) {
                            sink(twig.cells[i], weight(leaf.min(qsize)));
                        }
                    }
                }
                Node::Branch(first) => {
                    let half = cell.size * 0.5;
                    let children = (0..8).map(|i| Cell {
                        index: first + i,
                        node: self.node(first + i),
                        bmin: child_min(cell.bmin, half, i),
                        size: half,
                        level: cell.level + 1,
                    });

                    if qsize >= cell.size {
                        stack.extend(children);
                    } else {
                        let hits: Vec<Cell> = children.filter(|c| c.bounds().overlaps(&query)).collect();
                        assert_eq!(
                            hits.len(),
                            1,
                            "aligned query cube at {qmin:?} straddles {} children",
                            hits.len()
                        );
                        stack.extend(hits);
                    }
                }
            }
        }
    }
}
