//! Saving and loading chunk trees

pub mod disk_io;

pub use disk_io::{chunk_path, deserialize_tree, read_tree, serialize_tree, write_tree};
