//! Flat on-disk format for a single tree
//!
//! Layout, little-endian:
//!
//! | field      | type       |
//! |------------|------------|
//! | position   | 3 x f32    |
//! | size       | f32        |
//! | depth      | u32        |
//! | node count | u64        |
//! | twig count | u64        |
//! | nodes      | u32 each   |
//! | twigs      | 64 x u16   |
//!
//! Node and brick arrays are the in-memory Pod arrays written raw. Reading
//! checks every reachable link before the tree is handed out.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::core::types::{IVec3, Result, Vec3};
use crate::core::Error;
use crate::voxel::svo::node::MAX_PAYLOAD;
use crate::voxel::svo::{Material, Node, PackedNode, Twig, VoxelTree, MAX_DEPTH, TWIG_LEVELS};

/// Extension of chunk files
pub const CHUNK_EXTENSION: &str = "oct";

/// File holding the chunk at `coord` under `base`
pub fn chunk_path(base: &Path, coord: IVec3) -> PathBuf {
    base.join(format!("chunk_{}_{}_{}.{CHUNK_EXTENSION}", coord.x, coord.y, coord.z))
}

/// Write `tree` in the flat format
pub fn serialize_tree<W: Write>(tree: &VoxelTree, out: &mut W) -> Result<()> {
    for v in tree.position().to_array() {
        out.write_all(&v.to_le_bytes())?;
    }
    out.write_all(&tree.size().to_le_bytes())?;
    out.write_all(&tree.depth().to_le_bytes())?;
    out.write_all(&(tree.node_count() as u64).to_le_bytes())?;
    out.write_all(&(tree.twig_count() as u64).to_le_bytes())?;
    if cfg!(target_endian = "little") {
        out.write_all(tree.node_bytes())?;
        out.write_all(tree.twig_bytes())?;
    } else {
        for node in tree.nodes() {
            out.write_all(&node.0.to_le_bytes())?;
        }
        for cell in tree.twigs().iter().flat_map(|t| t.cells.iter()) {
            out.write_all(&cell.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Read a tree written by [`serialize_tree`]
pub fn deserialize_tree<R: Read>(input: &mut R) -> Result<VoxelTree> {
    let position = Vec3::new(read_f32(input)?, read_f32(input)?, read_f32(input)?);
    let size = read_f32(input)?;
    let depth = read_u32(input)?;
    let node_count = read_u64(input)?;
    let twig_count = read_u64(input)?;

    if depth < TWIG_LEVELS || depth > MAX_DEPTH {
        return Err(Error::Format(format!(
            "tree depth {depth} is outside {TWIG_LEVELS}..={MAX_DEPTH}"
        )));
    }
    if !(size > 0.0) || !position.is_finite() {
        return Err(Error::Format(format!("bad tree bounds {position} + {size}")));
    }
    if node_count == 0 {
        return Err(Error::Format("tree has no root node".into()));
    }
    if node_count > MAX_PAYLOAD as u64 || twig_count > MAX_PAYLOAD as u64 {
        return Err(Error::Format(format!(
            "{node_count} nodes / {twig_count} twigs exceed the addressable range"
        )));
    }

    let mut nodes = vec![PackedNode::EMPTY; node_count as usize];
    input.read_exact(bytemuck::cast_slice_mut(&mut nodes))?;
    let mut twigs = vec![Twig::EMPTY; twig_count as usize];
    input.read_exact(bytemuck::cast_slice_mut(&mut twigs))?;

    if cfg!(target_endian = "big") {
        for node in &mut nodes {
            node.0 = u32::from_le(node.0);
        }
        for cell in twigs.iter_mut().flat_map(|t| t.cells.iter_mut()) {
            *cell = u16::from_le(*cell);
        }
    }

    check_links(&nodes, twigs.len(), depth - TWIG_LEVELS)?;
    Ok(VoxelTree::from_parts(position, size, depth, nodes, twigs))
}

/// Walk the reachable tree and reject links that would index out of range,
/// loop, share children or put bricks off the brick level
fn check_links(nodes: &[PackedNode], twig_count: usize, twig_level: u32) -> Result<()> {
    let bad = |index: usize, msg: String| Err(Error::Format(format!("node {index}: {msg}")));

    let mut seen = vec![false; nodes.len()];
    seen[0] = true;
    let mut stack = vec![(0usize, 0u32)];

    while let Some((index, level)) = stack.pop() {
        let packed = nodes[index];
        match packed.decode() {
            Node::Empty => {}
            Node::Leaf(_) => {
                if packed.0 >> 2 > Material::MAX as u32 {
                    return bad(index, format!("material {} out of range", packed.0 >> 2));
                }
            }
            Node::Twig(twig) => {
                if twig as usize >= twig_count {
                    return bad(index, format!("brick {twig} of {twig_count}"));
                }
                if level != twig_level {
                    return bad(index, format!("brick at level {level}, expected {twig_level}"));
                }
            }
            Node::Branch(first) => {
                let first = first as usize;
                if level >= twig_level {
                    return bad(index, format!("branch at level {level} below the brick level"));
                }
                if first <= index || first + 8 > nodes.len() {
                    return bad(index, format!("children at {first} of {} nodes", nodes.len()));
                }
                for child in first..first + 8 {
                    if std::mem::replace(&mut seen[child], true) {
                        return bad(child, "reached twice".into());
                    }
                    stack.push((child, level + 1));
                }
            }
        }
    }
    Ok(())
}

/// Save `tree` to `path`, creating parent directories
pub fn write_tree(path: &Path, tree: &VoxelTree) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    serialize_tree(tree, &mut out)?;
    out.flush()?;
    Ok(())
}

pub fn read_tree(path: &Path) -> Result<VoxelTree> {
    let mut input = BufReader::new(File::open(path)?);
    deserialize_tree(&mut input)
}

fn read_f32<R: Read>(input: &mut R) -> Result<f32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_u32<R: Read>(input: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(input: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::material::{DIRT, STONE};
    use crate::terrain::HeightPyramid;
    use tempfile::TempDir;

    fn sample_tree() -> VoxelTree {
        let size = 32usize;
        let heights = (0..size * size)
            .map(|i| 12.0 + 5.0 * ((i % size) as f32 * 0.3).sin())
            .collect();
        let mut tree = VoxelTree::grow(
            Vec3::new(32.0, 0.0, -32.0),
            32.0,
            5,
            &HeightPyramid::from_heights(size, heights),
        );
        tree.build(Vec3::new(40.0, 14.0, -20.0), Vec3::new(45.0, 20.0, -15.0), STONE);
        tree
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let tree = sample_tree();
        let path = chunk_path(dir.path(), IVec3::new(1, 0, -1));

        write_tree(&path, &tree).unwrap();
        let loaded = read_tree(&path).unwrap();

        assert_eq!(loaded, tree);
        assert_eq!(loaded.position(), tree.position());
        assert_eq!(
            loaded.material_at(Vec3::new(42.0, 16.0, -18.0)),
            tree.material_at(Vec3::new(42.0, 16.0, -18.0))
        );
    }

    #[test]
    fn test_header_layout() {
        let tree = VoxelTree::new(Vec3::ZERO, 8.0, 3);
        let mut bytes = Vec::new();
        serialize_tree(&tree, &mut bytes).unwrap();

        // 5 x 4-byte fields, 2 x u64 counts, one root word
        assert_eq!(bytes.len(), 20 + 16 + 4);
        assert_eq!(&bytes[16..20], &3u32.to_le_bytes());
        assert_eq!(&bytes[20..28], &1u64.to_le_bytes());
    }

    #[test]
    fn test_chunk_path_naming() {
        let path = chunk_path(Path::new("saves"), IVec3::new(-2, 0, 5));
        assert_eq!(path, Path::new("saves/chunk_-2_0_5.oct"));
    }

    #[test]
    fn test_rejects_bad_headers() {
        let tree = VoxelTree::new(Vec3::ZERO, 8.0, 3);
        let mut good = Vec::new();
        serialize_tree(&tree, &mut good).unwrap();

        let mut shallow = good.clone();
        shallow[16..20].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(deserialize_tree(&mut shallow.as_slice()), Err(Error::Format(_))));

        let mut rootless = good.clone();
        rootless[20..28].copy_from_slice(&0u64.to_le_bytes());
        assert!(matches!(deserialize_tree(&mut rootless.as_slice()), Err(Error::Format(_))));

        let mut huge = good.clone();
        huge[28..36].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(deserialize_tree(&mut huge.as_slice()), Err(Error::Format(_))));
    }

    fn is_format_error(bytes: &[u8]) -> bool {
        matches!(deserialize_tree(&mut &bytes[..]), Err(Error::Format(_)))
    }

    fn bytes_of(tree: &VoxelTree) -> Vec<u8> {
        let mut bytes = Vec::new();
        serialize_tree(tree, &mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_arrays_follow_header_raw() {
        let tree = sample_tree();
        let bytes = bytes_of(&tree);
        let nodes_end = 36 + tree.node_bytes().len();

        assert_eq!(&bytes[36..nodes_end], tree.node_bytes());
        assert_eq!(&bytes[nodes_end..], tree.twig_bytes());
        assert_eq!(&bytes[36..40], &tree.nodes()[0].0.to_le_bytes());
    }

    #[test]
    fn test_rejects_deep_tree() {
        let mut bytes = bytes_of(&VoxelTree::new(Vec3::ZERO, 8.0, 3));
        bytes[16..20].copy_from_slice(&40u32.to_le_bytes());
        assert!(is_format_error(&bytes));

        bytes[16..20].copy_from_slice(&(MAX_DEPTH + 1).to_le_bytes());
        assert!(is_format_error(&bytes));

        bytes[16..20].copy_from_slice(&MAX_DEPTH.to_le_bytes());
        let tree = deserialize_tree(&mut bytes.as_slice()).unwrap();
        assert_eq!(tree.depth(), MAX_DEPTH);
    }

    #[test]
    fn test_rejects_dangling_branch() {
        let mut bytes = bytes_of(&VoxelTree::new(Vec3::ZERO, 8.0, 3));
        bytes[36..40].copy_from_slice(&PackedNode::encode(Node::Branch(100)).0.to_le_bytes());
        assert!(is_format_error(&bytes));
    }

    #[test]
    fn test_rejects_looping_branch() {
        let mut nodes = vec![PackedNode::EMPTY; 9];
        nodes[0] = PackedNode::encode(Node::Branch(1));
        nodes[3] = PackedNode::encode(Node::Branch(1));
        let tree = VoxelTree::from_parts(Vec3::ZERO, 8.0, 4, nodes, vec![]);
        assert!(is_format_error(&bytes_of(&tree)));

        let mut root_loop = bytes_of(&VoxelTree::new(Vec3::ZERO, 8.0, 3));
        root_loop[36..40].copy_from_slice(&PackedNode::encode(Node::Branch(0)).0.to_le_bytes());
        assert!(is_format_error(&root_loop));
    }

    #[test]
    fn test_rejects_dangling_twig() {
        let tree = VoxelTree::from_parts(
            Vec3::ZERO,
            4.0,
            TWIG_LEVELS,
            vec![PackedNode::encode(Node::Twig(0))],
            vec![],
        );
        assert!(is_format_error(&bytes_of(&tree)));

        let with_brick = VoxelTree::from_parts(
            Vec3::ZERO,
            4.0,
            TWIG_LEVELS,
            vec![PackedNode::encode(Node::Twig(0))],
            vec![Twig::filled(DIRT)],
        );
        let loaded = deserialize_tree(&mut bytes_of(&with_brick).as_slice()).unwrap();
        assert_eq!(loaded.material_at(Vec3::splat(1.0)), DIRT);
    }

    #[test]
    fn test_rejects_misplaced_twig() {
        // brick at the root of a tree whose bricks sit one level down
        let tree = VoxelTree::from_parts(
            Vec3::ZERO,
            8.0,
            3,
            vec![PackedNode::encode(Node::Twig(0))],
            vec![Twig::filled(DIRT)],
        );
        assert!(is_format_error(&bytes_of(&tree)));
    }

    #[test]
    fn test_rejects_wide_leaf_material() {
        let mut bytes = bytes_of(&VoxelTree::new(Vec3::ZERO, 8.0, 3));
        let word = ((Material::MAX as u32 + 1) << 2) | 1;
        bytes[36..40].copy_from_slice(&word.to_le_bytes());
        assert!(is_format_error(&bytes));
    }

    #[test]
    fn test_truncated_input_is_io_error() {
        let mut bytes = Vec::new();
        serialize_tree(&sample_tree(), &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(deserialize_tree(&mut bytes.as_slice()), Err(Error::Io(_))));
    }
}
