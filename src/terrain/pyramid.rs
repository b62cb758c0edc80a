//! Min/max height pyramid over a square height field
//!
//! The base grid holds `size × size` height samples. Above it sit
//! `log2(size)` coarser levels where level `l` has `2^l × 2^l` cells, each
//! storing the min and max of the 2×2 block one level finer. Level 0 is the
//! global bound and level `levels` is the base grid itself.
//!
//! Octree growth asks "does the terrain cross this cell?" with one lookup
//! per cell instead of sampling every voxel column underneath it.

use noise::NoiseFn;

use crate::core::types::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bound {
    Min,
    Max,
}

/// Immutable multi-resolution min/max height structure
#[derive(Clone, Debug)]
pub struct HeightPyramid {
    size: usize,
    levels: u32,
    base: Vec<f32>,
    /// `mins[l]` / `maxs[l]` hold the `4^l` cells of level `l < levels`
    mins: Vec<Vec<f32>>,
    maxs: Vec<Vec<f32>>,
}

impl HeightPyramid {
    /// Sample `noise` over a `size × size` grid and build the pyramid.
    ///
    /// Sample `(x, z)` reads the noise at `((x + shift.x) * period,
    /// (z + shift.z) * period)`; the result is scaled by `amplitude` and
    /// offset by `shift.y`.
    pub fn build<N: NoiseFn<f64, 2>>(
        size: usize,
        amplitude: f32,
        period: f32,
        shift: Vec3,
        noise: &N,
    ) -> Self {
        assert!(size.is_power_of_two(), "pyramid size {size} is not a power of two");

        let period = period as f64;
        let mut base = Vec::with_capacity(size * size);
        for z in 0..size {
            for x in 0..size {
                let nx = (x as f64 + shift.x as f64) * period;
                let nz = (z as f64 + shift.z as f64) * period;
                base.push(noise.get([nx, nz]) as f32 * amplitude + shift.y);
            }
        }

        Self::from_heights(size, base)
    }

    /// Build from an explicit row-major (`z * size + x`) base grid
    pub fn from_heights(size: usize, base: Vec<f32>) -> Self {
        assert!(size.is_power_of_two(), "pyramid size {size} is not a power of two");
        assert_eq!(base.len(), size * size, "base grid does not match pyramid size");

        let levels = size.trailing_zeros();
        let mut mins: Vec<Vec<f32>> = vec![Vec::new(); levels as usize];
        let mut maxs: Vec<Vec<f32>> = vec![Vec::new(); levels as usize];

        for level in (0..levels as usize).rev() {
            let side = 1usize << level;
            let fine = side * 2;
            let (lo, hi) = {
                let (fine_min, fine_max): (&[f32], &[f32]) = if level + 1 == levels as usize {
                    (&base, &base)
                } else {
                    (&mins[level + 1], &maxs[level + 1])
                };

                let mut lo = Vec::with_capacity(side * side);
                let mut hi = Vec::with_capacity(side * side);
                for z in 0..side {
                    for x in 0..side {
                        let quad = [
                            (2 * z) * fine + 2 * x,
                            (2 * z) * fine + 2 * x + 1,
                            (2 * z + 1) * fine + 2 * x,
                            (2 * z + 1) * fine + 2 * x + 1,
                        ];
                        lo.push(quad.iter().map(|&i| fine_min[i]).fold(f32::INFINITY, f32::min));
                        hi.push(quad.iter().map(|&i| fine_max[i]).fold(f32::NEG_INFINITY, f32::max));
                    }
                }
                (lo, hi)
            };
            mins[level] = lo;
            maxs[level] = hi;
        }

        Self { size, levels, base, mins, maxs }
    }

    /// Samples per side of the base grid
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of levels above the base grid (`log2(size)`)
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Lowest height at `(x, z)` for a cell of the given level
    pub fn min(&self, x: f32, z: f32, level: u32) -> f32 {
        self.bound(x, z, level, Bound::Min)
    }

    /// Highest height at `(x, z)` for a cell of the given level
    pub fn max(&self, x: f32, z: f32, level: u32) -> f32 {
        self.bound(x, z, level, Bound::Max)
    }

    /// Both bounds at once
    pub fn bounds(&self, x: f32, z: f32, level: u32) -> (f32, f32) {
        (self.min(x, z, level), self.max(x, z, level))
    }

    /// Global minimum height
    pub fn global_min(&self) -> f32 {
        self.min(0.0, 0.0, 0)
    }

    /// Global maximum height
    pub fn global_max(&self) -> f32 {
        self.max(0.0, 0.0, 0)
    }

    /// Map a height into `[0, 1]` against the global bounds (0 for a flat field)
    pub fn normalize(&self, y: f32) -> f32 {
        let (lo, hi) = (self.global_min(), self.global_max());
        if hi <= lo {
            return 0.0;
        }
        ((y - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    /// Bilinear interpolation of the base grid at normalized `(x, z)`
    pub fn sample(&self, x: f32, z: f32) -> f32 {
        let last = (self.size - 1) as f32;
        let u = (x * self.size as f32 - 0.5).clamp(0.0, last);
        let v = (z * self.size as f32 - 0.5).clamp(0.0, last);

        let x0 = u.floor() as usize;
        let z0 = v.floor() as usize;
        let x1 = (x0 + 1).min(self.size - 1);
        let z1 = (z0 + 1).min(self.size - 1);
        let fx = u - x0 as f32;
        let fz = v - z0 as f32;

        let at = |x: usize, z: usize| self.base[z * self.size + x];
        let near = at(x0, z0) + (at(x1, z0) - at(x0, z0)) * fx;
        let far = at(x0, z1) + (at(x1, z1) - at(x0, z1)) * fx;
        near + (far - near) * fz
    }

    fn bound(&self, x: f32, z: f32, level: u32, bound: Bound) -> f32 {
        assert!(
            (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&z),
            "pyramid query ({x}, {z}) outside the unit square"
        );

        if level > self.levels {
            return self.sample(x, z);
        }

        let side = 1usize << level;
        let index = Self::cell(z, side) * side + Self::cell(x, side);
        if level == self.levels {
            return self.base[index];
        }

        match bound {
            Bound::Min => self.mins[level as usize][index],
            Bound::Max => self.maxs[level as usize][index],
        }
    }

    /// Cell index along one axis; 1.0 lands in the last cell
    fn cell(t: f32, side: usize) -> usize {
        ((t * side as f32) as usize).min(side - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noise::Simplex;

    fn ramp_heights(size: usize) -> Vec<f32> {
        (0..size * size).map(|i| ((i * 37) % 101) as f32).collect()
    }

    #[test]
    fn test_flat_field() {
        let noise = Simplex::new(7);
        let pyramid = HeightPyramid::build(8, 0.0, 0.1, Vec3::new(3.0, 16.0, 5.0), &noise);
        assert_eq!(pyramid.levels(), 3);
        for level in 0..6 {
            assert_eq!(pyramid.bounds(0.3, 0.7, level), (16.0, 16.0));
        }
        assert_eq!(pyramid.normalize(100.0), 0.0);
    }

    #[test]
    fn test_levels_bound_their_children() {
        let size = 16;
        let pyramid = HeightPyramid::from_heights(size, ramp_heights(size));

        for level in 0..pyramid.levels() as usize {
            let side = 1usize << level;
            let fine = side * 2;
            for z in 0..side {
                for x in 0..side {
                    let children = [
                        (2 * z) * fine + 2 * x,
                        (2 * z) * fine + 2 * x + 1,
                        (2 * z + 1) * fine + 2 * x,
                        (2 * z + 1) * fine + 2 * x + 1,
                    ];
                    let (child_min, child_max): (&[f32], &[f32]) =
                        if level + 1 == pyramid.levels() as usize {
                            (&pyramid.base, &pyramid.base)
                        } else {
                            (&pyramid.mins[level + 1], &pyramid.maxs[level + 1])
                        };
                    let lo = children.iter().map(|&i| child_min[i]).fold(f32::INFINITY, f32::min);
                    let hi = children.iter().map(|&i| child_max[i]).fold(f32::NEG_INFINITY, f32::max);
                    assert_eq!(pyramid.mins[level][z * side + x], lo);
                    assert_eq!(pyramid.maxs[level][z * side + x], hi);
                }
            }
        }
    }

    #[test]
    fn test_base_level_lookup() {
        let size = 8;
        let heights = ramp_heights(size);
        let pyramid = HeightPyramid::from_heights(size, heights.clone());

        // Cell (5, 2) center
        let x = (5.0 + 0.5) / size as f32;
        let z = (2.0 + 0.5) / size as f32;
        assert_eq!(pyramid.min(x, z, 3), heights[2 * size + 5]);
        assert_eq!(pyramid.max(x, z, 3), heights[2 * size + 5]);
    }

    #[test]
    fn test_unit_edge_clamps_to_last_cell() {
        let size = 4;
        let heights = ramp_heights(size);
        let pyramid = HeightPyramid::from_heights(size, heights.clone());
        assert_eq!(pyramid.min(1.0, 1.0, 2), heights[size * size - 1]);
    }

    #[test]
    fn test_bilinear_beyond_base() {
        // Height rises along x only
        let pyramid = HeightPyramid::from_heights(2, vec![0.0, 2.0, 0.0, 2.0]);
        assert!((pyramid.min(0.5, 0.5, 4) - 1.0).abs() < 1e-5);
        assert!((pyramid.max(0.25, 0.9, 4) - 0.0).abs() < 1e-5);
        assert!((pyramid.max(1.0, 0.0, 4) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_noise_bounds_contain_base() {
        let noise = Simplex::new(42);
        let pyramid = HeightPyramid::build(32, 16.0, 1.0 / 32.0, Vec3::new(0.0, 16.0, 0.0), &noise);
        let (lo, hi) = (pyramid.global_min(), pyramid.global_max());
        assert!(lo < hi);
        for h in &pyramid.base {
            assert!(*h >= lo && *h <= hi);
        }
        assert_eq!(pyramid.normalize(lo), 0.0);
        assert_eq!(pyramid.normalize(hi), 1.0);
    }

    #[test]
    fn test_single_sample_pyramid() {
        let pyramid = HeightPyramid::from_heights(1, vec![3.0]);
        assert_eq!(pyramid.levels(), 0);
        assert_eq!(pyramid.bounds(1.0, 0.0, 0), (3.0, 3.0));
        assert_eq!(pyramid.bounds(0.5, 0.5, 2), (3.0, 3.0));
    }

    #[test]
    #[should_panic(expected = "outside the unit square")]
    fn test_out_of_range_query_panics() {
        let pyramid = HeightPyramid::from_heights(4, ramp_heights(4));
        pyramid.min(1.5, 0.0, 1);
    }
}
