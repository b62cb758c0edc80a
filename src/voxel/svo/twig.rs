//! 4x4x4 material brick stored at the bottom of the tree

use bytemuck::{Pod, Zeroable};

use super::node::Material;

/// Cells per brick side
pub const TWIG_SIZE: usize = 4;
/// Cells per brick
pub const TWIG_CELLS: usize = TWIG_SIZE * TWIG_SIZE * TWIG_SIZE;
/// Tree levels a brick replaces (4 = 2^2 cells per side)
pub const TWIG_LEVELS: u32 = 2;

/// Index into a brick: `x + 4y + 16z`
pub fn twig_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < TWIG_SIZE && y < TWIG_SIZE && z < TWIG_SIZE);
    (z * TWIG_SIZE + y) * TWIG_SIZE + x
}

/// Cell coordinates of brick index `i`
pub fn twig_coords(i: usize) -> (usize, usize, usize) {
    (i % TWIG_SIZE, (i / TWIG_SIZE) % TWIG_SIZE, i / (TWIG_SIZE * TWIG_SIZE))
}

/// Dense 4x4x4 brick of material ids (128 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct Twig {
    pub cells: [Material; TWIG_CELLS],
}

impl Default for Twig {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Twig {
    /// All cells empty
    pub const EMPTY: Twig = Twig { cells: [0; TWIG_CELLS] };

    /// Every cell set to `material`
    pub fn filled(material: Material) -> Self {
        Self { cells: [material; TWIG_CELLS] }
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Material {
        self.cells[twig_index(x, y, z)]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, material: Material) {
        self.cells[twig_index(x, y, z)] = material;
    }

    /// Some(material) when every cell holds the same id
    pub fn uniform(&self) -> Option<Material> {
        let first = self.cells[0];
        self.cells.iter().all(|&c| c == first).then_some(first)
    }

    /// Number of non-empty cells
    pub fn solid_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twig_size() {
        assert_eq!(std::mem::size_of::<Twig>(), 128);
    }

    #[test]
    fn test_index_layout() {
        assert_eq!(twig_index(1, 0, 0), 1);
        assert_eq!(twig_index(0, 1, 0), 4);
        assert_eq!(twig_index(0, 0, 1), 16);
        assert_eq!(twig_index(3, 3, 3), 63);
        for i in 0..TWIG_CELLS {
            let (x, y, z) = twig_coords(i);
            assert_eq!(twig_index(x, y, z), i);
        }
    }

    #[test]
    fn test_uniform() {
        assert_eq!(Twig::EMPTY.uniform(), Some(0));
        assert_eq!(Twig::filled(4).uniform(), Some(4));

        let mut twig = Twig::filled(4);
        twig.set(2, 3, 1, 0);
        assert_eq!(twig.uniform(), None);
        assert_eq!(twig.get(2, 3, 1), 0);
        assert_eq!(twig.solid_count(), TWIG_CELLS - 1);
    }
}
