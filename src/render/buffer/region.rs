//! One growable device buffer with a first-fit free list
//!
//! Free space is a list of `[start, end)` gaps kept sorted by start and
//! coalesced on every release, so adjacent gaps never coexist. When no gap
//! fits a request the buffer doubles; the new upper half becomes a gap.

use super::device::DeviceBuffer;

/// Buffer copies and writes must be multiples of this many bytes
pub const COPY_ALIGNMENT: usize = 4;

/// Round a request up to the copy alignment (zero-byte requests take one slot)
pub fn align_size(size: usize) -> usize {
    size.max(1).next_multiple_of(COPY_ALIGNMENT)
}

/// Free byte range `[start, end)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gap {
    pub start: usize,
    pub end: usize,
}

impl Gap {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Device buffer plus the bookkeeping to sub-allocate it
pub struct Region<B: DeviceBuffer> {
    buffer: B,
    gaps: Vec<Gap>,
    rightmost: usize,
    max_size: usize,
}

impl<B: DeviceBuffer> Region<B> {
    /// Wrap `buffer`, whose current length is the initial capacity
    pub fn new(buffer: B, max_size: usize) -> Self {
        let capacity = buffer.len();
        assert!(capacity > 0, "region needs a non-empty buffer");
        assert!(capacity % COPY_ALIGNMENT == 0, "region size {capacity} is not aligned");
        assert!(capacity <= max_size, "region size {capacity} exceeds maximum {max_size}");
        Self {
            buffer,
            gaps: vec![Gap { start: 0, end: capacity }],
            rightmost: 0,
            max_size,
        }
    }

    /// Current size in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// End of the highest allocation still accounted for
    pub fn rightmost(&self) -> usize {
        self.rightmost
    }

    /// Free gaps, sorted by start
    pub fn gaps(&self) -> &[Gap] {
        &self.gaps
    }

    pub fn free_bytes(&self) -> usize {
        self.gaps.iter().map(Gap::len).sum()
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Reserve `size` bytes and copy `contents` (at most `size` bytes) to
    /// the front of the reservation. Grows the buffer until a gap fits.
    pub fn alloc(&mut self, size: usize, contents: &[u8]) -> usize {
        let size = align_size(size);
        assert!(contents.len() <= size, "{} content bytes exceed allocation of {size}", contents.len());

        let offset = loop {
            if let Some(offset) = self.take(size) {
                break offset;
            }
            self.grow();
        };

        if !contents.is_empty() {
            self.buffer.write(offset, contents);
        }
        self.rightmost = self.rightmost.max(offset + size);
        offset
    }

    /// Overwrite bytes inside a live allocation
    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        assert!(offset + bytes.len() <= self.capacity(), "write past the end of the region");
        self.buffer.write(offset, bytes);
    }

    /// Release an allocation made with the same `size`
    pub fn free(&mut self, offset: usize, size: usize) {
        let size = align_size(size);
        self.give(offset, offset + size);
        if self.rightmost == offset + size {
            self.rightmost = offset;
        }
    }

    /// First-fit: exact fits consume the gap, larger gaps shrink from the front
    fn take(&mut self, size: usize) -> Option<usize> {
        let pos = self.gaps.iter().position(|gap| gap.len() >= size)?;
        let gap = &mut self.gaps[pos];
        let start = gap.start;
        if gap.len() == size {
            self.gaps.remove(pos);
        } else {
            gap.start += size;
        }
        Some(start)
    }

    /// Insert `[start, end)` and coalesce with its neighbors
    fn give(&mut self, start: usize, end: usize) {
        debug_assert!(start < end);
        let pos = self.gaps.partition_point(|gap| gap.start < start);
        debug_assert!(pos == 0 || self.gaps[pos - 1].end <= start, "range {start}..{end} is already free");
        debug_assert!(pos == self.gaps.len() || end <= self.gaps[pos].start, "range {start}..{end} is already free");

        let joins_left = pos > 0 && self.gaps[pos - 1].end == start;
        let joins_right = pos < self.gaps.len() && self.gaps[pos].start == end;
        match (joins_left, joins_right) {
            (true, true) => {
                self.gaps[pos - 1].end = self.gaps[pos].end;
                self.gaps.remove(pos);
            }
            (true, false) => self.gaps[pos - 1].end = end,
            (false, true) => self.gaps[pos].start = start,
            (false, false) => self.gaps.insert(pos, Gap { start, end }),
        }
    }

    /// Double the buffer, keeping `[0, rightmost)`
    fn grow(&mut self) {
        let capacity = self.capacity();
        let next = capacity * 2;
        assert!(
            next <= self.max_size,
            "region cannot grow from {capacity} to {next} bytes (maximum {})",
            self.max_size
        );

        self.buffer.resize(next, self.rightmost);
        self.give(capacity, next);

        if next >= 64 * 1024 * 1024 {
            log::warn!("Region grew to {}MB", next / 1024 / 1024);
        } else {
            log::trace!("Region grew to {} bytes", next);
        }
    }
}
