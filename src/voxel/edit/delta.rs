//! Dirty ranges produced by edits.

use std::ops::Range;

use crate::voxel::svo::node::Material;

/// Type of box edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOp {
    /// Clear every voxel the box touches
    Destroy,
    /// Fill empty space the box touches, leaving solid voxels alone
    Build(Material),
    /// Destroy, then build with the material
    Replace(Material),
}

/// Index span `[left, right)` written in one array, plus whether its
/// storage grew (so a device copy must be reallocated, not patched).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delta {
    pub left: usize,
    pub right: usize,
    pub realloc: bool,
}

impl Default for Delta {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Delta {
    /// Nothing written
    pub const EMPTY: Delta = Delta {
        left: usize::MAX,
        right: 0,
        realloc: false,
    };

    /// Whole array must be re-sent
    pub fn full() -> Self {
        Self {
            realloc: true,
            ..Self::EMPTY
        }
    }

    /// Record a write at `index`
    pub fn touch(&mut self, index: usize) {
        self.touch_range(index, index + 1);
    }

    /// Record writes over `[start, end)`
    pub fn touch_range(&mut self, start: usize, end: usize) {
        if start < end {
            self.left = self.left.min(start);
            self.right = self.right.max(end);
        }
    }

    /// Union with another delta of the same array
    pub fn merge(&mut self, other: &Delta) {
        self.touch_range(other.left, other.right);
        self.realloc |= other.realloc;
    }

    /// No writes and no growth
    pub fn is_empty(&self) -> bool {
        self.left >= self.right && !self.realloc
    }

    /// Written index span, if any
    pub fn range(&self) -> Option<Range<usize>> {
        (self.left < self.right).then_some(self.left..self.right)
    }

    /// Written span in bytes for items of `item_size` bytes
    pub fn byte_range(&self, item_size: usize) -> Option<Range<usize>> {
        self.range().map(|r| r.start * item_size..r.end * item_size)
    }
}

/// Deltas of both arrays of one tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditDeltas {
    pub tree: Delta,
    pub twig: Delta,
}

impl EditDeltas {
    /// Both arrays must be re-sent
    pub fn full() -> Self {
        Self {
            tree: Delta::full(),
            twig: Delta::full(),
        }
    }

    pub fn merge(&mut self, other: &EditDeltas) {
        self.tree.merge(&other.tree);
        self.twig.merge(&other.twig);
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty() && self.twig.is_empty()
    }
}
