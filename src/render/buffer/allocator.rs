//! Keyed allocations spread across several regions

use super::device::DeviceBuffer;
use super::region::{align_size, Region};

/// Where a key's bytes live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub region: usize,
    pub offset: usize,
    pub len: usize,
}

/// Maps a fixed set of keys (chunk slots) to at most one allocation each.
///
/// New allocations go to the region whose highest live byte is lowest,
/// which keeps regions evenly filled and their copies on growth short.
pub struct Allocator<B: DeviceBuffer> {
    regions: Vec<Region<B>>,
    allocations: Vec<Option<Allocation>>,
}

impl<B: DeviceBuffer> Allocator<B> {
    pub fn new(keys: usize, buffers: Vec<B>, max_region_size: usize) -> Self {
        assert!(!buffers.is_empty(), "allocator needs at least one region");
        Self {
            regions: buffers
                .into_iter()
                .map(|buffer| Region::new(buffer, max_region_size))
                .collect(),
            allocations: vec![None; keys],
        }
    }

    /// (Re)allocate `size` bytes for `key`, initialised from `contents`.
    /// Any previous allocation for the key is released first.
    pub fn alloc(&mut self, key: usize, size: usize, contents: &[u8]) -> Allocation {
        self.free(key);

        let region = (0..self.regions.len())
            .min_by_key(|&i| self.regions[i].rightmost())
            .unwrap_or(0);
        let offset = self.regions[region].alloc(size, contents);
        let allocation = Allocation {
            region,
            offset,
            len: align_size(size),
        };
        self.allocations[key] = Some(allocation);
        allocation
    }

    /// Copy `contents[left..right]` to the same byte span of `key`'s allocation
    pub fn subst(&mut self, key: usize, left: usize, right: usize, contents: &[u8]) {
        let Some(allocation) = self.allocations[key] else {
            panic!("key {key} has no allocation");
        };
        assert!(
            left <= right && right <= allocation.len && right <= contents.len(),
            "span {left}..{right} outside allocation of {} bytes",
            allocation.len
        );
        if left < right {
            self.regions[allocation.region].write(allocation.offset + left, &contents[left..right]);
        }
    }

    /// Release `key`'s allocation, if any
    pub fn free(&mut self, key: usize) {
        if let Some(allocation) = self.allocations[key].take() {
            self.regions[allocation.region].free(allocation.offset, allocation.len);
        }
    }

    pub fn allocation(&self, key: usize) -> Option<Allocation> {
        self.allocations[key]
    }

    pub fn regions(&self) -> &[Region<B>] {
        &self.regions
    }

    pub fn keys(&self) -> usize {
        self.allocations.len()
    }

    /// Bytes held by live allocations
    pub fn used_bytes(&self) -> usize {
        self.allocations.iter().flatten().map(|a| a.len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::buffer::device::HostBuffer;

    fn allocator(keys: usize, regions: usize) -> Allocator<HostBuffer> {
        let buffers = (0..regions).map(|_| HostBuffer::new(64)).collect();
        Allocator::new(keys, buffers, 1 << 16)
    }

    #[test]
    fn test_spreads_across_regions() {
        let mut allocator = allocator(4, 2);
        let a = allocator.alloc(0, 16, &[]);
        let b = allocator.alloc(1, 16, &[]);
        assert_ne!(a.region, b.region);
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 0);
    }

    #[test]
    fn test_realloc_frees_previous() {
        let mut allocator = allocator(2, 1);
        allocator.alloc(0, 32, &[]);
        let again = allocator.alloc(0, 48, &[]);
        assert_eq!(again.offset, 0);
        assert_eq!(allocator.used_bytes(), 48);
        assert_eq!(allocator.regions()[0].capacity(), 64);
    }

    #[test]
    fn test_subst_writes_subrange_at_offset() {
        let mut allocator = allocator(2, 1);
        allocator.alloc(0, 8, &[0xAA; 8]);
        let target = allocator.alloc(1, 8, &[0; 8]);
        assert_eq!(target.offset, 8);

        let contents = [1, 2, 3, 4, 5, 6, 7, 8];
        allocator.subst(1, 4, 8, &contents);

        let bytes = allocator.regions()[0].buffer().as_bytes();
        assert_eq!(&bytes[..8], &[0xAA; 8]);
        assert_eq!(&bytes[8..16], &[0, 0, 0, 0, 5, 6, 7, 8]);
    }

    #[test]
    fn test_free_releases_bytes() {
        let mut allocator = allocator(3, 1);
        allocator.alloc(0, 16, &[]);
        allocator.alloc(1, 16, &[]);
        allocator.free(0);
        allocator.free(0);
        assert_eq!(allocator.allocation(0), None);
        assert_eq!(allocator.used_bytes(), 16);
        assert_eq!(allocator.regions()[0].free_bytes(), 48);
    }

    #[test]
    #[should_panic(expected = "has no allocation")]
    fn test_subst_without_allocation_panics() {
        let mut allocator = allocator(1, 1);
        allocator.subst(0, 0, 4, &[0; 4]);
    }
}
