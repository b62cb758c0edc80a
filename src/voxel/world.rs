//! Chunk grid tying terrain, trees, device allocations and ray queries together
//!
//! The grid is a fixed `width × height × depth` window over an unbounded
//! chunk lattice. Storage is toroidal: chunk coordinate `c` always lives in
//! slot `wrap(c.y)·w·d + wrap(c.z)·w + wrap(c.x)`, so shifting the window
//! by one chunk only regenerates the slab that enters it.

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;

use super::edit::{EditDeltas, EditOp};
use super::march::{chunkmarch, ChunkGrid, MarchHit};
use super::svo::{Material, VoxelTree};
use crate::core::config::WorldConfig;
use crate::core::types::{IVec2, IVec3, Result, UVec3, Vec3};
use crate::core::Error;
use crate::math::{Aabb, Ray};
use crate::render::buffer::{BufferKind, DeviceBuffer, GpuChunk, RootAllocation, RootAllocator};
use crate::streaming::disk_io::{chunk_path, read_tree, write_tree};
use crate::terrain::material::EMPTY;
use crate::terrain::{HeightPyramid, TerrainGenerator};

/// Edit volume placed around a ray hit
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetCube {
    /// Edge length in world units
    pub scale: f32,
}

impl TargetCube {
    pub fn new(scale: f32) -> Self {
        Self { scale }
    }

    /// Cube centered on `p`
    pub fn around(&self, p: Vec3) -> Aabb {
        Aabb::from_center_half_extent(p, Vec3::splat(self.scale * 0.5))
    }
}

/// Totals across every chunk
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    pub chunks: usize,
    pub nodes: usize,
    pub twigs: usize,
    /// Host bytes of both arrays across all trees
    pub tree_bytes: usize,
    /// Bytes held by device allocations
    pub device_bytes: usize,
}

pub struct World<B: DeviceBuffer> {
    config: WorldConfig,
    generator: TerrainGenerator,
    dims: UVec3,
    /// Lattice coordinate of the window's min chunk
    chunk_min: IVec3,
    /// One per xz column, indexed like the bottom chunk layer
    pyramids: Vec<HeightPyramid>,
    chunks: Vec<VoxelTree>,
    allocator: RootAllocator<B>,
    descriptors: Vec<GpuChunk>,
}

impl<B: DeviceBuffer> World<B> {
    /// Generate a world whose window starts at chunk `(0, 0, 0)`
    pub fn new<F>(config: WorldConfig, make_buffer: F) -> Result<Self>
    where
        F: FnMut(BufferKind, usize) -> B,
    {
        Self::with_origin(config, IVec3::ZERO, make_buffer)
    }

    /// Generate a world whose window starts at chunk `chunk_min`
    pub fn with_origin<F>(config: WorldConfig, chunk_min: IVec3, make_buffer: F) -> Result<Self>
    where
        F: FnMut(BufferKind, usize) -> B,
    {
        config.validate()?;
        let start = Instant::now();

        let dims = UVec3::new(config.width, config.height, config.depth);
        let generator = TerrainGenerator::new(config.terrain.clone());

        let pyramids: Vec<HeightPyramid> = (0..(dims.x * dims.z) as usize)
            .into_par_iter()
            .map(|column| {
                let coord = coord_at_slot(dims, chunk_min, column);
                generator.column_pyramid(IVec2::new(coord.x, coord.z))
            })
            .collect();

        let chunks: Vec<VoxelTree> = (0..config.chunk_count())
            .into_par_iter()
            .map(|slot| {
                let coord = coord_at_slot(dims, chunk_min, slot);
                grow_chunk(&config, &pyramids[column_slot(dims, coord)], coord)
            })
            .collect();

        let mut allocator = RootAllocator::new(
            chunks.len(),
            config.regions,
            config.initial_region_bytes,
            config.max_region_bytes,
            make_buffer,
        );
        let descriptors = chunks
            .iter()
            .enumerate()
            .map(|(slot, tree)| GpuChunk::new(tree.position(), &allocator.alloc(slot, tree)))
            .collect();

        let world = Self {
            config,
            generator,
            dims,
            chunk_min,
            pyramids,
            chunks,
            allocator,
            descriptors,
        };

        log::info!(
            "Generated {}x{}x{} world in {:.2?}",
            dims.x,
            dims.y,
            dims.z,
            start.elapsed()
        );
        world.log_stats();
        Ok(world)
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Chunks per axis
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    pub fn chunk_min(&self) -> IVec3 {
        self.chunk_min
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Grid covered by the current window
    pub fn grid(&self) -> ChunkGrid {
        ChunkGrid {
            origin: self.chunk_min.as_vec3() * self.config.chunk_size,
            dims: self.dims,
            chunk_size: self.config.chunk_size,
        }
    }

    /// Whether lattice coordinate `coord` lies in the window
    pub fn contains(&self, coord: IVec3) -> bool {
        let max = self.chunk_min + self.dims.as_ivec3();
        coord.cmpge(self.chunk_min).all() && coord.cmplt(max).all()
    }

    /// Storage slot of `coord`, if it is in the window
    pub fn slot(&self, coord: IVec3) -> Option<usize> {
        self.contains(coord).then(|| wrap_slot(self.dims, coord))
    }

    /// Lattice coordinate held by storage slot `slot`
    pub fn coord(&self, slot: usize) -> IVec3 {
        coord_at_slot(self.dims, self.chunk_min, slot)
    }

    pub fn chunk(&self, coord: IVec3) -> Option<&VoxelTree> {
        self.slot(coord).map(|slot| &self.chunks[slot])
    }

    /// Chunk in storage slot `slot`
    pub fn chunk_at(&self, slot: usize) -> &VoxelTree {
        &self.chunks[slot]
    }

    pub fn descriptors(&self) -> &[GpuChunk] {
        &self.descriptors
    }

    /// Descriptor table as uploaded to the GPU
    pub fn descriptor_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.descriptors)
    }

    pub fn allocator(&self) -> &RootAllocator<B> {
        &self.allocator
    }

    /// Material at world-space `p` (empty outside the window)
    pub fn material_at(&self, p: Vec3) -> Material {
        let coord = (p / self.config.chunk_size).floor().as_ivec3();
        self.chunk(coord).map_or(EMPTY, |tree| tree.material_at(p))
    }

    /// Sync the device copy of chunk `slot` after an edit
    pub fn modify(&mut self, slot: usize, deltas: &EditDeltas) {
        if deltas.is_empty() {
            return;
        }
        let allocation = self.allocator.subst(slot, &self.chunks[slot], deltas);
        self.refresh_descriptor(slot, &allocation);
    }

    /// Swap in a new tree for `slot` and upload it whole
    pub fn set_chunk(&mut self, slot: usize, tree: VoxelTree) {
        self.chunks[slot] = tree;
        let allocation = self.allocator.alloc(slot, &self.chunks[slot]);
        self.refresh_descriptor(slot, &allocation);
    }

    /// Replace chunk `slot` with its next coarser level of detail
    pub fn collapse_chunk(&mut self, slot: usize) {
        let coarse = self.chunks[slot].lod_collapse();
        log::debug!(
            "Collapsed chunk {}: depth {} -> {}, {} -> {} nodes",
            self.coord(slot),
            self.chunks[slot].depth(),
            coarse.depth(),
            self.chunks[slot].node_count(),
            coarse.node_count()
        );
        self.set_chunk(slot, coarse);
    }

    /// Apply `op` to every chunk `target` overlaps; returns how many it overlapped
    pub fn apply(&mut self, op: EditOp, target: &Aabb) -> usize {
        let mut touched = 0;
        for slot in 0..self.chunks.len() {
            if !self.chunks[slot].bounds().overlaps(target) {
                continue;
            }
            let deltas = self.chunks[slot].apply_edit(op, target);
            self.modify(slot, &deltas);
            touched += 1;
        }
        log::debug!("{:?} over {:?} touched {} chunks", op, target, touched);
        touched
    }

    /// First solid voxel along `ray`
    pub fn raycast(&self, ray: &Ray) -> Option<MarchHit> {
        let grid = self.grid();
        chunkmarch(ray, &grid, |coord| {
            let slot = wrap_slot(self.dims, self.chunk_min + coord.as_ivec3());
            Some((slot, &self.chunks[slot]))
        })
    }

    /// Raycast, then apply `op` to `cube` centered on the hit
    pub fn edit_at_ray(&mut self, ray: &Ray, cube: TargetCube, op: EditOp) -> Option<(MarchHit, usize)> {
        let hit = self.raycast(ray)?;
        let touched = self.apply(op, &cube.around(hit.point));
        Some((hit, touched))
    }

    /// Move the window one chunk along a single axis and generate the slab
    /// that enters it
    pub fn shift(&mut self, offset: IVec3) {
        assert!(
            offset.abs().element_sum() == 1,
            "world shift {offset} is not a unit axis step"
        );
        self.chunk_min += offset;

        let axis = if offset.x != 0 {
            0
        } else if offset.y != 0 {
            1
        } else {
            2
        };
        let layer = if offset[axis] > 0 {
            self.chunk_min[axis] + self.dims[axis] as i32 - 1
        } else {
            self.chunk_min[axis]
        };

        let entering: Vec<IVec3> = (0..self.chunks.len())
            .map(|slot| self.coord(slot))
            .filter(|coord| coord[axis] == layer)
            .collect();

        if axis != 1 {
            for coord in entering.iter().filter(|c| c.y == self.chunk_min.y) {
                let column = column_slot(self.dims, *coord);
                self.pyramids[column] = self.generator.column_pyramid(IVec2::new(coord.x, coord.z));
            }
        }

        let config = &self.config;
        let pyramids = &self.pyramids;
        let dims = self.dims;
        let trees: Vec<VoxelTree> = entering
            .par_iter()
            .map(|&coord| grow_chunk(config, &pyramids[column_slot(dims, coord)], coord))
            .collect();

        for (coord, tree) in entering.iter().zip(trees) {
            self.set_chunk(wrap_slot(self.dims, *coord), tree);
        }
        log::debug!(
            "Shifted world by {} to {}: {} chunks regenerated",
            offset,
            self.chunk_min,
            entering.len()
        );
    }

    /// Write every chunk to `dir/chunk_x_y_z.oct`
    pub fn save(&self, dir: &Path) -> Result<()> {
        for (slot, tree) in self.chunks.iter().enumerate() {
            write_tree(&chunk_path(dir, self.coord(slot)), tree)?;
        }
        log::info!("Saved {} chunks to {}", self.chunks.len(), dir.display());
        Ok(())
    }

    /// Load any saved chunks of the current window from `dir`; returns how
    /// many were found
    pub fn restore(&mut self, dir: &Path) -> Result<usize> {
        let mut restored = 0;
        for slot in 0..self.chunks.len() {
            let coord = self.coord(slot);
            let path = chunk_path(dir, coord);
            if !path.exists() {
                continue;
            }

            let tree = read_tree(&path)?;
            let expected = coord.as_vec3() * self.config.chunk_size;
            if tree.position() != expected || tree.size() != self.config.chunk_size {
                return Err(Error::Format(format!(
                    "{} holds a tree at {} of size {}, expected {} of size {}",
                    path.display(),
                    tree.position(),
                    tree.size(),
                    expected,
                    self.config.chunk_size
                )));
            }
            self.set_chunk(slot, tree);
            restored += 1;
        }
        log::info!("Restored {} chunks from {}", restored, dir.display());
        Ok(restored)
    }

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            chunks: self.chunks.len(),
            nodes: self.chunks.iter().map(VoxelTree::node_count).sum(),
            twigs: self.chunks.iter().map(VoxelTree::twig_count).sum(),
            tree_bytes: self.chunks.iter().map(VoxelTree::memory_usage).sum(),
            device_bytes: self.allocator.used_bytes(),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        log::info!(
            "World: {} chunks, {} nodes, {} twigs, {:.1} MB in trees, {:.1} MB on device",
            stats.chunks,
            stats.nodes,
            stats.twigs,
            stats.tree_bytes as f64 / (1024.0 * 1024.0),
            stats.device_bytes as f64 / (1024.0 * 1024.0)
        );
    }

    fn refresh_descriptor(&mut self, slot: usize, allocation: &RootAllocation) {
        self.descriptors[slot] = GpuChunk::new(self.chunks[slot].position(), allocation);
    }
}

/// Grow the chunk at `coord` and flood it up to sea level
fn grow_chunk(config: &WorldConfig, pyramid: &HeightPyramid, coord: IVec3) -> VoxelTree {
    let size = config.chunk_size;
    let bmin = coord.as_vec3() * size;
    let mut tree = VoxelTree::grow_with_ramp(bmin, size, config.tree_depth, pyramid, &config.materials);

    if config.water_material != EMPTY && config.sea_level > bmin.y {
        let top = config.sea_level.min(bmin.y + size);
        let bmax = Vec3::new(bmin.x + size, top, bmin.z + size);
        tree.build(bmin, bmax, config.water_material);
    }
    tree
}

/// Toroidal storage slot of lattice coordinate `coord`
fn wrap_slot(dims: UVec3, coord: IVec3) -> usize {
    let w = coord.rem_euclid(dims.as_ivec3()).as_uvec3();
    (w.y * dims.x * dims.z + w.z * dims.x + w.x) as usize
}

/// Pyramid slot of the column holding `coord`
fn column_slot(dims: UVec3, coord: IVec3) -> usize {
    let (w, d) = (dims.x as i32, dims.z as i32);
    (coord.z.rem_euclid(d) * w + coord.x.rem_euclid(w)) as usize
}

/// Coordinate in the window at `chunk_min` whose storage slot is `slot`
fn coord_at_slot(dims: UVec3, chunk_min: IVec3, slot: usize) -> IVec3 {
    let slot = slot as u32;
    let wrapped = IVec3::new(
        (slot % dims.x) as i32,
        (slot / (dims.x * dims.z)) as i32,
        ((slot / dims.x) % dims.z) as i32,
    );
    chunk_min + (wrapped - chunk_min).rem_euclid(dims.as_ivec3())
}
