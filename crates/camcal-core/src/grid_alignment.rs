use serde::{Deserialize, Serialize};

/// Integer 2D grid transform (a 2×2 matrix) used to re-label detected lattices.
///
/// `(i', j') = (a*i + b*j, c*i + d*j)`.
///
/// Valid re-labelings of a square lattice are the 8 elements of the dihedral
/// group `D4`, listed in [`GRID_TRANSFORMS_D4`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridTransform {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
}

impl GridTransform {
    pub const IDENTITY: GridTransform = GridTransform {
        a: 1,
        b: 0,
        c: 0,
        d: 1,
    };

    /// Apply the transform to `(i, j)`.
    #[inline]
    pub fn apply(&self, i: i32, j: i32) -> [i32; 2] {
        [self.a * i + self.b * j, self.c * i + self.d * j]
    }

    #[inline]
    pub fn det(&self) -> i32 {
        self.a * self.d - self.b * self.c
    }

    /// Whether the transform exchanges the roles of the two grid axes.
    #[inline]
    pub fn swaps_axes(&self) -> bool {
        self.a == 0
    }
}

/// The 8 dihedral transforms `D4` on the integer grid.
pub const GRID_TRANSFORMS_D4: [GridTransform; 8] = [
    // rotations: 0°, 90°, 180°, 270°
    GridTransform {
        a: 1,
        b: 0,
        c: 0,
        d: 1,
    },
    GridTransform {
        a: 0,
        b: 1,
        c: -1,
        d: 0,
    },
    GridTransform {
        a: -1,
        b: 0,
        c: 0,
        d: -1,
    },
    GridTransform {
        a: 0,
        b: -1,
        c: 1,
        d: 0,
    },
    // reflections (and combinations)
    GridTransform {
        a: -1,
        b: 0,
        c: 0,
        d: 1,
    },
    GridTransform {
        a: 1,
        b: 0,
        c: 0,
        d: -1,
    },
    GridTransform {
        a: 0,
        b: 1,
        c: 1,
        d: 0,
    },
    GridTransform {
        a: 0,
        b: -1,
        c: -1,
        d: 0,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn d4_has_four_rotations_and_four_reflections() {
        let rotations = GRID_TRANSFORMS_D4.iter().filter(|t| t.det() == 1).count();
        assert_eq!(rotations, 4);
        assert!(GRID_TRANSFORMS_D4.iter().all(|t| t.det().abs() == 1));
    }

    #[test]
    fn quarter_turn_swaps_axes() {
        let t = GRID_TRANSFORMS_D4[1];
        assert!(t.swaps_axes());
        assert_eq!(t.apply(1, 0), [0, -1]);
        assert!(!GridTransform::IDENTITY.swaps_axes());
    }
}
