//! Region-based allocation of tree arrays inside device buffers

pub mod device;
pub mod region;
pub mod allocator;
pub mod chunk_buffer;

pub use device::{DeviceBuffer, GpuBuffer, GpuContext, HostBuffer};
pub use region::{Gap, Region, COPY_ALIGNMENT};
pub use allocator::{Allocation, Allocator};
pub use chunk_buffer::{BufferKind, GpuChunk, RootAllocation, RootAllocator};
