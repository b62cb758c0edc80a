//! Capacity-tracked growable array
//!
//! Node and brick arrays mirror device buffers, so the logical capacity is
//! tracked separately from the `Vec`'s own allocation. Capacity doubles
//! when an append does not fit; callers learn about the growth so the
//! matching device allocation can be replaced instead of patched.

/// Growable array with explicit doubling capacity
#[derive(Clone, Debug)]
pub struct Storage<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: Copy> Storage<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Adopt existing items with capacity equal to their length
    pub fn from_vec(items: Vec<T>) -> Self {
        let capacity = items.len();
        Self { items, capacity }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Logical capacity (what a device allocation must hold)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, index: usize) -> T {
        self.items[index]
    }

    pub fn get_ref(&self, index: usize) -> &T {
        &self.items[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }

    pub fn set(&mut self, index: usize, value: T) {
        self.items[index] = value;
    }

    /// Append one item. Returns its index and whether capacity grew.
    pub fn push(&mut self, value: T) -> (usize, bool) {
        let index = self.items.len();
        let grew = self.reserve(1);
        self.items.push(value);
        (index, grew)
    }

    /// Append `count` copies. Returns the first index and whether capacity grew.
    pub fn extend(&mut self, count: usize, value: T) -> (usize, bool) {
        let first = self.items.len();
        let grew = self.reserve(count);
        self.items.resize(first + count, value);
        (first, grew)
    }

    /// Drop items from `len` onward; capacity is kept
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// Shrink capacity to the exact length
    pub fn trim(&mut self) {
        self.items.shrink_to_fit();
        self.capacity = self.items.len();
    }

    fn reserve(&mut self, additional: usize) -> bool {
        let needed = self.items.len() + additional;
        if needed <= self.capacity {
            return false;
        }
        while self.capacity < needed {
            self.capacity = (self.capacity * 2).max(1);
        }
        self.items.reserve(self.capacity - self.items.len());
        true
    }
}
