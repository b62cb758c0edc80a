//! Destroy, build and replace over axis-aligned boxes.
//!
//! All three share one walk over an explicit stack of node indices. A cell
//! is visited when it shares positive volume with the box; it is "covered"
//! when it lies entirely inside the box. Writes that would store the value
//! already present are skipped, so repeating an edit leaves the arrays and
//! the reported deltas untouched.

use super::delta::{EditDeltas, EditOp};
use crate::core::types::Vec3;
use crate::math::Aabb;
use crate::voxel::svo::node::{Material, Node, PackedNode};
use crate::voxel::svo::octree::{child_min, VoxelTree};
use crate::voxel::svo::twig::{twig_coords, Twig, TWIG_CELLS, TWIG_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Destroy,
    Build(Material),
}

/// Pending cell on the edit stack
#[derive(Clone, Copy, Debug)]
struct Visit {
    index: u32,
    bmin: Vec3,
    size: f32,
    level: u32,
}

impl VoxelTree {
    /// Clear every voxel intersecting `[cmin, cmax]`
    pub fn destroy(&mut self, cmin: Vec3, cmax: Vec3) -> EditDeltas {
        self.edit(Aabb::new(cmin, cmax), Mode::Destroy)
    }

    /// Fill empty voxels intersecting `[cmin, cmax]` with `material`.
    ///
    /// Solid voxels keep their material.
    pub fn build(&mut self, cmin: Vec3, cmax: Vec3, material: Material) -> EditDeltas {
        assert!(material != 0, "build needs a solid material");
        self.edit(Aabb::new(cmin, cmax), Mode::Build(material))
    }

    /// Destroy then build on the same box
    pub fn replace(&mut self, cmin: Vec3, cmax: Vec3, material: Material) -> EditDeltas {
        let mut deltas = self.destroy(cmin, cmax);
        deltas.merge(&self.build(cmin, cmax, material));
        deltas
    }

    /// Apply `op` to `target`
    pub fn apply_edit(&mut self, op: EditOp, target: &Aabb) -> EditDeltas {
        match op {
            EditOp::Destroy => self.destroy(target.min, target.max),
            EditOp::Build(m) => self.build(target.min, target.max, m),
            EditOp::Replace(m) => self.replace(target.min, target.max, m),
        }
    }

    fn edit(&mut self, target: Aabb, mode: Mode) -> EditDeltas {
        let mut deltas = EditDeltas::default();
        let twig_level = self.twig_level();

        let mut stack = vec![Visit {
            index: 0,
            bmin: self.position(),
            size: self.size(),
            level: 0,
        }];

        while let Some(visit) = stack.pop() {
            let bounds = Aabb::cube(visit.bmin, visit.size);
            if !bounds.overlaps(&target) {
                continue;
            }
            let covered = target.contains(&bounds);

            match (mode, self.node(visit.index)) {
                (Mode::Destroy, Node::Empty) => {}
                (Mode::Destroy, _) if covered => {
                    self.write_node(visit.index, Node::Empty, &mut deltas);
                }
                (_, Node::Branch(first)) => push_children(&mut stack, &visit, first),
                (Mode::Destroy, Node::Leaf(m)) => {
                    if visit.level < twig_level {
                        let first = self.split(visit.index, Node::Leaf(m), &mut deltas);
                        push_children(&mut stack, &visit, first);
                    } else {
                        let twig = self.attach_twig(visit.index, Twig::filled(m), &mut deltas);
                        self.paint(twig, &visit, &target, mode, &mut deltas);
                    }
                }
                (Mode::Build(m), Node::Empty) => {
                    if covered {
                        self.write_node(visit.index, Node::Leaf(m), &mut deltas);
                    } else if visit.level < twig_level {
                        let first = self.split(visit.index, Node::Empty, &mut deltas);
                        push_children(&mut stack, &visit, first);
                    } else {
                        let twig = self.attach_twig(visit.index, Twig::EMPTY, &mut deltas);
                        self.paint(twig, &visit, &target, mode, &mut deltas);
                    }
                }
                (Mode::Build(_), Node::Leaf(_)) => {}
                (_, Node::Twig(t)) => self.paint(t, &visit, &target, mode, &mut deltas),
            }
        }

        deltas
    }

    fn write_node(&mut self, index: u32, node: Node, deltas: &mut EditDeltas) {
        if self.node(index) != node {
            self.set_node(index, node);
            deltas.tree.touch(index as usize);
        }
    }

    /// Turn `index` into a BRANCH of 8 copies of `fill`; returns the first child
    fn split(&mut self, index: u32, fill: Node, deltas: &mut EditDeltas) -> u32 {
        let (first, grew) = self.nodes_mut().extend(8, PackedNode::encode(fill));
        deltas.tree.touch_range(first, first + 8);
        deltas.tree.realloc |= grew;
        self.write_node(index, Node::Branch(first as u32), deltas);
        first as u32
    }

    /// Append `twig` and point `index` at it; returns the brick index
    fn attach_twig(&mut self, index: u32, twig: Twig, deltas: &mut EditDeltas) -> u32 {
        let (slot, grew) = self.twigs_mut().push(twig);
        deltas.twig.touch(slot);
        deltas.twig.realloc |= grew;
        self.write_node(index, Node::Twig(slot as u32), deltas);
        slot as u32
    }

    /// Apply `mode` to the brick cells intersecting `target`
    fn paint(&mut self, twig: u32, visit: &Visit, target: &Aabb, mode: Mode, deltas: &mut EditDeltas) {
        let leaf = visit.size / TWIG_SIZE as f32;
        let mut cells = *self.twig(twig);
        for i in 0..TWIG_CELLS {
            let (x, y, z) = twig_coords(i);
            let lmin = visit.bmin + Vec3::new(x as f32, y as f32, z as f32) * leaf;
            if !Aabb::cube(lmin, leaf).overlaps(target) {
                continue;
            }
            match mode {
                Mode::Destroy => cells.cells[i] = 0,
                Mode::Build(m) => {
                    if cells.cells[i] == 0 {
                        cells.cells[i] = m;
                    }
                }
            }
        }

        if cells != *self.twig(twig) {
            *self.twigs_mut().get_mut(twig as usize) = cells;
            deltas.twig.touch(twig as usize);
        }
    }
}

fn push_children(stack: &mut Vec<Visit>, parent: &Visit, first: u32) {
    let half = parent.size * 0.5;
    for i in 0..8 {
        stack.push(Visit {
            index: first + i,
            bmin: child_min(parent.bmin, half, i),
            size: half,
            level: parent.level + 1,
        });
    }
}
