//! Ray marching through chunk grids, trees and bricks
//!
//! Empty space is skipped by jumping to the exit of the current cell plus a
//! small epsilon, so every step lands inside the next cell. A LEAF node or
//! a populated brick cell ends the march.

use crate::core::types::{UVec3, Vec3};
use crate::math::{Aabb, Ray};

use super::svo::node::Node;
use super::svo::octree::{child_min, Cell, VoxelTree};
use super::svo::twig::{Twig, TWIG_SIZE};

/// Step past a cell boundary
pub const EPS: f32 = 1.0 / 8192.0;

/// Iteration cap for every marching loop
pub const MAX_STEPS: usize = 1000;

/// Where a ray first hit solid material
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarchHit {
    /// Ray parameter of the hit
    pub t: f32,
    /// World-space hit point (`origin + direction * t`)
    pub point: Vec3,
    /// Chunk index reported by the lookup
    pub chunk: usize,
}

/// Regular grid of equally sized chunks
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkGrid {
    /// World-space min corner of the grid
    pub origin: Vec3,
    /// Chunks per axis
    pub dims: UVec3,
    /// Chunk edge length
    pub chunk_size: f32,
}

impl ChunkGrid {
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.origin, self.origin + self.dims.as_vec3() * self.chunk_size)
    }

    /// Row-major (`y`, then `z`, then `x`) index of a grid-relative coordinate
    pub fn index(&self, coord: UVec3) -> usize {
        let (w, d) = (self.dims.x as usize, self.dims.z as usize);
        coord.y as usize * w * d + coord.z as usize * w + coord.x as usize
    }

    /// Grid-relative coordinate of the chunk containing `p` (clamped to the grid)
    pub fn coord_of(&self, p: Vec3) -> UVec3 {
        let cell = ((p - self.origin) / self.chunk_size).floor().max(Vec3::ZERO);
        cell.as_uvec3().min(self.dims - UVec3::ONE)
    }
}

/// Inclusive point-in-cube test
pub fn is_inside_cube(p: Vec3, cmin: Vec3, cmax: Vec3) -> bool {
    p.cmpge(cmin).all() && p.cmple(cmax).all()
}

/// Ray parameter at which a ray from `a` along `b` leaves `[cmin, cmax]`.
///
/// Axes with a zero direction component never bound the exit.
pub fn cube_escape_distance(a: Vec3, b: Vec3, cmin: Vec3, cmax: Vec3) -> f32 {
    let mut t = f32::INFINITY;
    for axis in 0..3 {
        if b[axis] == 0.0 {
            continue;
        }
        let t1 = (cmin[axis] - a[axis]) / b[axis];
        let t2 = (cmax[axis] - a[axis]) / b[axis];
        t = t.min(t1.max(t2));
    }
    t
}

/// Descend from the root to the terminal cell containing `p`
pub fn traverse(p: Vec3, tree: &VoxelTree) -> Cell {
    traverse_from(p, tree, tree.root_cell())
}

/// Descend from `cell` to the terminal cell containing `p`
pub fn traverse_from(p: Vec3, tree: &VoxelTree, mut cell: Cell) -> Cell {
    while let Node::Branch(first) = cell.node {
        let half = cell.size * 0.5;
        let mid = cell.bmin + Vec3::splat(half);
        let octant = (p.x >= mid.x) as u32 + 2 * (p.y >= mid.y) as u32 + 4 * (p.z >= mid.z) as u32;
        let index = first + octant;
        cell = Cell {
            index,
            node: tree.node(index),
            bmin: child_min(cell.bmin, half, octant),
            size: half,
            level: cell.level + 1,
        };
    }
    cell
}

/// March a ray through one brick starting at parameter `t`.
///
/// Returns the parameter of the first populated cell, or `None` once the
/// ray leaves the brick.
pub fn twigmarch(ray: &Ray, mut t: f32, cell: &Cell, twig: &Twig) -> Option<f32> {
    let leaf = cell.size / TWIG_SIZE as f32;
    for _ in 0..MAX_STEPS {
        let p = ray.at(t);
        let offset = ((p - cell.bmin) / leaf).floor();
        if offset.cmplt(Vec3::ZERO).any() || offset.cmpge(Vec3::splat(TWIG_SIZE as f32)).any() {
            return None;
        }

        let (x, y, z) = (offset.x as usize, offset.y as usize, offset.z as usize);
        if twig.get(x, y, z) != 0 {
            return Some(t);
        }

        let lmin = cell.bmin + offset * leaf;
        t += cube_escape_distance(p, ray.direction, lmin, lmin + Vec3::splat(leaf)) + EPS;
    }
    None
}

/// March a ray through one tree from its origin.
///
/// The origin must lie inside the tree; returns the hit parameter.
pub fn treemarch(ray: &Ray, tree: &VoxelTree) -> Option<f32> {
    let bounds = tree.bounds();
    let mut t = 0.0;
    for _ in 0..MAX_STEPS {
        let p = ray.at(t);
        if !is_inside_cube(p, bounds.min, bounds.max) {
            return None;
        }

        let cell = traverse(p, tree);
        let cmax = cell.bmin + Vec3::splat(cell.size);
        match cell.node {
            Node::Leaf(_) => return Some(t),
            Node::Twig(i) => {
                if let Some(s) = twigmarch(ray, t, &cell, tree.twig(i)) {
                    return Some(s);
                }
            }
            Node::Empty => {}
            Node::Branch(_) => unreachable!("traverse stops at terminal nodes"),
        }
        t += cube_escape_distance(p, ray.direction, cell.bmin, cmax) + EPS;
    }
    None
}

/// March a ray across a chunk grid.
///
/// `lookup` maps a grid-relative chunk coordinate to the chunk's index and
/// tree; chunks it does not return are treated as empty.
pub fn chunkmarch<'a, F>(ray: &Ray, grid: &ChunkGrid, lookup: F) -> Option<MarchHit>
where
    F: Fn(UVec3) -> Option<(usize, &'a VoxelTree)>,
{
    let bounds = grid.bounds();
    let mut t = 0.0;
    if !is_inside_cube(ray.origin, bounds.min, bounds.max) {
        let (near, _) = ray.intersects_aabb(&bounds)?;
        t = near + EPS;
    }

    for _ in 0..MAX_STEPS {
        let p = ray.at(t);
        if !is_inside_cube(p, bounds.min, bounds.max) {
            return None;
        }

        let coord = grid.coord_of(p);
        let chmin = grid.origin + coord.as_vec3() * grid.chunk_size;
        let chmax = chmin + Vec3::splat(grid.chunk_size);

        if let Some((chunk, tree)) = lookup(coord) {
            let tb = tree.bounds();
            if is_inside_cube(p, tb.min, tb.max) {
                if let Some(s) = treemarch(&Ray::new(p, ray.direction), tree) {
                    let t = t + s;
                    return Some(MarchHit { t, point: ray.at(t), chunk });
                }
            }
        }

        t += cube_escape_distance(p, ray.direction, chmin, chmax) + EPS;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::svo::node::PackedNode;

    /// Size-8 tree: child 1 (+x) is a leaf, child 7 is a brick with one cell set
    fn sample_tree(position: Vec3) -> VoxelTree {
        let mut nodes = vec![PackedNode::encode(Node::Branch(1))];
        nodes.extend((0..8).map(|i| match i {
            1 => PackedNode::encode(Node::Leaf(2)),
            7 => PackedNode::encode(Node::Twig(0)),
            _ => PackedNode::EMPTY,
        }));
        let mut twig = Twig::EMPTY;
        twig.set(0, 0, 0, 9);
        VoxelTree::from_parts(position, 8.0, 3, nodes, vec![twig])
    }

    fn leaf_tree(position: Vec3) -> VoxelTree {
        VoxelTree::from_parts(position, 8.0, 3, vec![PackedNode::encode(Node::Leaf(1))], vec![])
    }

    #[test]
    fn test_is_inside_cube_inclusive() {
        assert!(is_inside_cube(Vec3::ONE, Vec3::ZERO, Vec3::ONE));
        assert!(is_inside_cube(Vec3::ZERO, Vec3::ZERO, Vec3::ONE));
        assert!(!is_inside_cube(Vec3::new(1.01, 0.5, 0.5), Vec3::ZERO, Vec3::ONE));
    }

    #[test]
    fn test_escape_distance() {
        let t = cube_escape_distance(Vec3::splat(0.5), Vec3::X, Vec3::ZERO, Vec3::ONE);
        assert!((t - 0.5).abs() < 1e-6);

        let t = cube_escape_distance(Vec3::new(0.25, 0.5, 0.5), -Vec3::X, Vec3::ZERO, Vec3::ONE);
        assert!((t - 0.25).abs() < 1e-6);

        let dir = Vec3::new(1.0, 1.0, 0.0).normalize();
        let t = cube_escape_distance(Vec3::new(0.5, 0.75, 0.5), dir, Vec3::ZERO, Vec3::ONE);
        assert!((t - 0.25 * 2f32.sqrt()).abs() < 1e-5);

        assert_eq!(cube_escape_distance(Vec3::splat(0.5), Vec3::ZERO, Vec3::ZERO, Vec3::ONE), f32::INFINITY);
    }

    #[test]
    fn test_traverse_picks_octant() {
        let tree = sample_tree(Vec3::ZERO);
        let cell = traverse(Vec3::new(5.0, 1.0, 1.0), &tree);
        assert_eq!(cell.node, Node::Leaf(2));
        assert_eq!(cell.index, 2);
        assert_eq!(cell.bmin, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(cell.size, 4.0);
        assert_eq!(cell.level, 1);

        // The midpoint belongs to the upper octant
        let cell = traverse(Vec3::splat(4.0), &tree);
        assert_eq!(cell.node, Node::Twig(0));
    }

    #[test]
    fn test_treemarch_skips_empty_to_leaf() {
        let tree = sample_tree(Vec3::ZERO);
        let ray = Ray::new(Vec3::new(0.5, 1.0, 1.0), Vec3::X);
        let t = treemarch(&ray, &tree).expect("ray should hit the leaf");
        assert!((t - 3.5).abs() < 1e-3);
    }

    #[test]
    fn test_treemarch_from_inside_leaf_is_zero() {
        let tree = leaf_tree(Vec3::ZERO);
        let ray = Ray::new(Vec3::new(3.0, 2.0, 5.0), Vec3::new(0.2, 1.0, -0.4).normalize());
        assert_eq!(treemarch(&ray, &tree), Some(0.0));

        let tree = sample_tree(Vec3::ZERO);
        let ray = Ray::new(Vec3::new(5.0, 1.0, 1.0), -Vec3::X);
        assert_eq!(treemarch(&ray, &tree), Some(0.0));
    }

    #[test]
    fn test_treemarch_hits_brick_cell() {
        let tree = sample_tree(Vec3::ZERO);
        let ray = Ray::new(Vec3::new(0.5, 4.5, 4.5), Vec3::X);
        let t = treemarch(&ray, &tree).expect("ray should hit the brick cell");
        assert!((t - 3.5).abs() < 1e-3);
    }

    #[test]
    fn test_treemarch_passes_through_empty_brick_row() {
        let tree = sample_tree(Vec3::ZERO);
        let ray = Ray::new(Vec3::new(0.5, 5.5, 5.5), Vec3::X);
        assert_eq!(treemarch(&ray, &tree), None);
    }

    #[test]
    fn test_twigmarch_outside_returns_none() {
        let tree = sample_tree(Vec3::ZERO);
        let cell = traverse(Vec3::splat(4.5), &tree);
        let ray = Ray::new(Vec3::new(0.0, 4.5, 4.5), Vec3::X);
        // t = 0 is left of the brick
        assert_eq!(twigmarch(&ray, 0.0, &cell, tree.twig(0)), None);
        assert!(twigmarch(&ray, 4.25, &cell, tree.twig(0)).is_some());
    }

    #[test]
    fn test_chunkmarch_enters_grid_and_hops_chunks() {
        let chunks = [VoxelTree::new(Vec3::ZERO, 8.0, 3), leaf_tree(Vec3::new(8.0, 0.0, 0.0))];
        let grid = ChunkGrid { origin: Vec3::ZERO, dims: UVec3::new(2, 1, 1), chunk_size: 8.0 };
        let lookup = |c: UVec3| {
            let i = grid.index(c);
            chunks.get(i).map(|tree| (i, tree))
        };

        let ray = Ray::new(Vec3::new(-5.0, 4.0, 4.0), Vec3::X);
        let hit = chunkmarch(&ray, &grid, lookup).expect("ray should hit chunk 1");
        assert_eq!(hit.chunk, 1);
        assert!((hit.t - 13.0).abs() < 1e-2);
        assert!((hit.point.x - 8.0).abs() < 1e-2);
    }

    #[test]
    fn test_chunkmarch_from_inside_leaf_chunk() {
        let chunks = [VoxelTree::new(Vec3::ZERO, 8.0, 3), leaf_tree(Vec3::new(8.0, 0.0, 0.0))];
        let grid = ChunkGrid { origin: Vec3::ZERO, dims: UVec3::new(2, 1, 1), chunk_size: 8.0 };
        let lookup = |c: UVec3| {
            let i = grid.index(c);
            chunks.get(i).map(|tree| (i, tree))
        };

        let origin = Vec3::new(12.0, 4.0, 4.0);
        let ray = Ray::new(origin, -Vec3::X);
        let hit = chunkmarch(&ray, &grid, lookup).expect("ray starts in solid");
        assert_eq!(hit.chunk, 1);
        assert_eq!(hit.t, 0.0);
        assert_eq!(hit.point, origin);
        assert_ne!(chunks[1].material_at(hit.point), 0);
    }

    #[test]
    fn test_chunkmarch_miss() {
        let chunks = [leaf_tree(Vec3::ZERO)];
        let grid = ChunkGrid { origin: Vec3::ZERO, dims: UVec3::ONE, chunk_size: 8.0 };
        let lookup = |c: UVec3| chunks.get(grid.index(c)).map(|tree| (0, tree));

        let away = Ray::new(Vec3::new(-5.0, 4.0, 4.0), -Vec3::X);
        assert_eq!(chunkmarch(&away, &grid, lookup), None);

        let above = Ray::new(Vec3::new(4.0, 20.0, 4.0), Vec3::X);
        assert_eq!(chunkmarch(&above, &grid, lookup), None);
    }

    #[test]
    fn test_chunkmarch_from_inside_empty_grid() {
        let chunks = [VoxelTree::new(Vec3::ZERO, 8.0, 3)];
        let grid = ChunkGrid { origin: Vec3::ZERO, dims: UVec3::ONE, chunk_size: 8.0 };
        let lookup = |c: UVec3| chunks.get(grid.index(c)).map(|tree| (0, tree));
        let ray = Ray::new(Vec3::splat(4.0), Vec3::new(0.3, -1.0, 0.2).normalize());
        assert_eq!(chunkmarch(&ray, &grid, lookup), None);
    }
}
