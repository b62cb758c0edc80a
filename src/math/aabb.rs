//! Axis-aligned boxes for cells, chunks and edit targets

use crate::core::types::Vec3;

/// Box spanning `[min, max]` on every axis
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box of half-size `half_extent` around `center`
    pub fn from_center_half_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    /// Cube with min corner `min` and edge `size`
    pub fn cube(min: Vec3, size: f32) -> Self {
        Self::new(min, min + Vec3::splat(size))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Inclusive of the boundary
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Shared positive volume; boxes that only touch do not overlap
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmplt(other.max).all() && self.max.cmpgt(other.min).all()
    }

    /// `other` lies inside `self` (shared faces allowed)
    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.cmpge(self.min).all() && other.max.cmple(self.max).all()
    }
}
