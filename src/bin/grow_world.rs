//! World grower binary: generates a world, pokes at it, and
//! optionally writes it to disk.
//!
//! Usage: cargo run --release --bin grow_world -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>   JSON world config (default: built-in defaults)
//!   --size <CHUNKS>   Chunks per horizontal side (overrides config)
//!   --seed <SEED>     Terrain seed (overrides config)
//!   --out <DIR>       Save chunks to DIR as chunk_x_y_z.oct
//!   --lod             Collapse the edited chunk one level after the edit
//!   --gpu             Back the region allocators with wgpu storage buffers
//!
//! Output structure:
//!   <DIR>/
//!     world.json        # Config the world was grown with
//!     chunk_0_0_0.oct   # One flat tree dump per chunk
//!     ...

use std::path::PathBuf;
use std::time::Instant;

use octwig::core::{Result, Vec3, WorldConfig};
use octwig::math::Ray;
use octwig::render::buffer::{DeviceBuffer, GpuContext, HostBuffer};
use octwig::terrain::material::STONE;
use octwig::voxel::svo::TWIG_LEVELS;
use octwig::voxel::{EditOp, TargetCube, World};

fn main() {
    octwig::core::logging::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => WorldConfig::load(&PathBuf::from(path))?,
        None => WorldConfig::default(),
    };
    if let Some(size) = parse_u32_arg(&args, "--size") {
        config.width = size;
        config.depth = size;
    }
    if let Some(seed) = parse_u32_arg(&args, "--seed") {
        config.terrain.seed = seed;
    }
    let out = parse_str_arg(&args, "--out").map(PathBuf::from);
    let lod = args.iter().any(|a| a == "--lod");
    let gpu = args.iter().any(|a| a == "--gpu");
    config.validate()?;

    println!("=== Octwig World Grower ===");
    println!("Grid:  {} x {} x {} chunks of {}", config.width, config.height, config.depth, config.chunk_size);
    println!("Depth: {} ({} voxels per chunk side)", config.tree_depth, 1u32 << config.tree_depth);
    println!("Seed:  {}", config.terrain.seed);
    println!();

    if gpu {
        let context = pollster::block_on(GpuContext::new())?;
        let start = Instant::now();
        let world = World::new(config.clone(), |kind, len| context.region_buffer(kind, len))?;
        println!("Generated in {:.2?} (GPU regions)", start.elapsed());
        exercise(world, &config, lod, out)
    } else {
        let start = Instant::now();
        let world = World::new(config.clone(), |_, len| HostBuffer::new(len))?;
        println!("Generated in {:.2?}", start.elapsed());
        exercise(world, &config, lod, out)
    }
}

/// Edit the surface under the grid center, report, and optionally save
fn exercise<B: DeviceBuffer>(mut world: World<B>, config: &WorldConfig, lod: bool, out: Option<PathBuf>) -> Result<()> {
    // Straight down through the middle of the grid
    let bounds = world.grid().bounds();
    let center = bounds.center();
    let ray = Ray::new(Vec3::new(center.x, bounds.max.y, center.z), Vec3::NEG_Y);

    match world.edit_at_ray(&ray, TargetCube::new(4.0), EditOp::Replace(STONE)) {
        Some((hit, touched)) => {
            println!("Ray hit {} at t = {:.3}; stone cube touched {} chunk(s)", hit.point, hit.t, touched);
            if lod {
                let depth = world.chunk_at(hit.chunk).depth();
                if depth > TWIG_LEVELS {
                    world.collapse_chunk(hit.chunk);
                    println!("Collapsed chunk {} to depth {}", world.coord(hit.chunk), depth - 1);
                } else {
                    log::warn!("Chunk {} is already at the coarsest level", world.coord(hit.chunk));
                }
            }
        }
        None => println!("Ray missed the terrain"),
    }

    world.log_stats();
    let stats = world.stats();
    println!(
        "Chunks: {}, nodes: {}, twigs: {}, device: {:.1} MB",
        stats.chunks,
        stats.nodes,
        stats.twigs,
        stats.device_bytes as f64 / (1024.0 * 1024.0)
    );

    if let Some(dir) = out {
        config.save(&dir.join("world.json"))?;
        world.save(&dir)?;
        println!("Saved to {}", dir.display());
    }

    Ok(())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
