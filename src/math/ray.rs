//! Parametric rays

use crate::core::types::Vec3;
use super::aabb::Aabb;

/// `origin + direction * t` for `t >= 0`
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Componentwise reciprocal of `direction`
    pub inv_direction: Vec3,
}

impl Ray {
    /// Zero direction components give infinite `inv_direction` entries;
    /// the slab test treats those axes as unbounded.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: direction.recip(),
        }
    }

    /// Unit-direction ray from `origin` through `target`
    pub fn toward(origin: Vec3, target: Vec3) -> Self {
        Self::new(origin, (target - origin).normalize())
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Slab test against `aabb`: `(t_near, t_far)` of the overlap with
    /// `t >= 0`, with `t_near` clamped to 0 when the origin is inside
    pub fn intersects_aabb(&self, aabb: &Aabb) -> Option<(f32, f32)> {
        let t1 = (aabb.min - self.origin) * self.inv_direction;
        let t2 = (aabb.max - self.origin) * self.inv_direction;

        let t_near = t1.min(t2).max_element();
        let t_far = t1.max(t2).min_element();

        (t_near <= t_far && t_far >= 0.0).then(|| (t_near.max(0.0), t_far))
    }
}
