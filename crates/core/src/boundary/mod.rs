use serde::{Deserialize, Serialize};

use crate::{
    grid::{Axis, GridPoint, GridRegion},
    partition::Partition,
};

/// Shared face between two adjacent partitions.
///
/// `start`/`end` bound the overlapping cells in the two in-plane axes; along
/// the boundary axis both hold the plane coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    axis: Axis,
    start: GridPoint,
    end: GridPoint,
}

impl Boundary {
    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn start(&self) -> GridPoint {
        self.start
    }

    pub fn end(&self) -> GridPoint {
        self.end
    }

    /// Plane coordinate along the boundary axis.
    pub fn plane(&self) -> i64 {
        self.start.along(self.axis)
    }

    /// Number of cells on the shared face.
    pub fn area(&self) -> usize {
        Axis::ALL
            .iter()
            .filter(|&&axis| axis != self.axis)
            .map(|&axis| (self.end.along(axis) - self.start.along(axis)) as usize)
            .product()
    }

    /// Finds the face two regions share, if they touch along one axis and
    /// overlap in the other two.
    pub fn between(a: &GridRegion, b: &GridRegion) -> Option<Boundary> {
        for axis in Axis::ALL {
            let plane = if a.end_along(axis) == b.start_along(axis) {
                a.end_along(axis)
            } else if b.end_along(axis) == a.start_along(axis) {
                b.end_along(axis)
            } else {
                continue;
            };

            let mut lo = [0_i64; 3];
            let mut hi = [0_i64; 3];
            let mut overlaps = true;
            for other in Axis::ALL {
                let i = other.index();
                if other == axis {
                    lo[i] = plane;
                    hi[i] = plane;
                    continue;
                }
                lo[i] = a.start_along(other).max(b.start_along(other));
                hi[i] = a.end_along(other).min(b.end_along(other));
                overlaps &= lo[i] < hi[i];
            }

            if overlaps {
                return Some(Boundary {
                    axis,
                    start: GridPoint::new(lo[0], lo[1], lo[2]),
                    end: GridPoint::new(hi[0], hi[1], hi[2]),
                });
            }
        }
        None
    }
}

/// Marks every shared face between the given partitions as blocked on both
/// sides and returns the boundaries found.
pub fn register_boundaries(partitions: &mut [Partition]) -> Vec<Boundary> {
    let mut boundaries = Vec::new();
    for j in 1..partitions.len() {
        let (head, tail) = partitions.split_at_mut(j);
        let b = &mut tail[0];
        for a in head.iter_mut() {
            let (ra, rb) = (*a.region(), *b.region());
            if let Some(boundary) = Boundary::between(&ra, &rb) {
                tracing::debug!(
                    a = a.id(),
                    b = b.id(),
                    axis = ?boundary.axis(),
                    plane = boundary.plane(),
                    cells = boundary.area(),
                    "registered boundary"
                );
                a.add_boundary(&boundary, &rb);
                b.add_boundary(&boundary, &ra);
                boundaries.push(boundary);
            }
        }
    }
    boundaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SimulationConfig,
        grid::{Face, GridShape},
    };

    fn cube(id: usize, x: i64, y: i64, z: i64, size: usize) -> Partition {
        let region = GridRegion::new(GridPoint::new(x, y, z), GridShape::new(size, size, size));
        Partition::spectral(id, region, &SimulationConfig::default()).unwrap()
    }

    #[test]
    fn blocks_the_shared_x_face_on_both_sides() {
        let mut partitions = vec![cube(0, 0, 0, 0, 4), cube(1, 4, 0, 0, 4)];
        let boundaries = register_boundaries(&mut partitions);

        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].axis(), Axis::X);
        assert_eq!(boundaries[0].plane(), 4);
        assert_eq!(boundaries[0].area(), 16);

        let (left, right) = (&partitions[0], &partitions[1]);
        for row in 0..4 {
            for col in 0..4 {
                assert!(!left.faces().face(Face::Right).is_free(row, col));
                assert!(!right.faces().face(Face::Left).is_free(row, col));
            }
        }
        for face in Face::ALL {
            if face != Face::Right {
                assert_eq!(left.faces().face(face).blocked_count(), 0, "{face:?}");
            }
            if face != Face::Left {
                assert_eq!(right.faces().face(face).blocked_count(), 0, "{face:?}");
            }
        }
        assert_eq!(left.boundary_count(), 1);
        assert_eq!(right.boundary_count(), 1);
    }

    #[test]
    fn partial_overlap_blocks_only_shared_cells() {
        // Second box sits below the first and is shifted by two cells in x.
        let mut partitions = vec![cube(0, 0, 0, 0, 4), cube(1, 2, 4, 0, 4)];
        register_boundaries(&mut partitions);

        let upper = partitions[0].faces().face(Face::Bottom);
        let lower = partitions[1].faces().face(Face::Top);
        assert_eq!(upper.blocked_count(), 8);
        assert_eq!(lower.blocked_count(), 8);
        for z in 0..4 {
            assert!(upper.is_free(z, 1));
            assert!(!upper.is_free(z, 2));
            assert!(!lower.is_free(z, 0));
            assert!(lower.is_free(z, 2));
        }
    }

    #[test]
    fn registers_z_boundaries() {
        let mut partitions = vec![cube(0, 0, 0, 4, 4), cube(1, 0, 0, 0, 4)];
        let boundaries = register_boundaries(&mut partitions);
        assert_eq!(boundaries[0].axis(), Axis::Z);
        assert_eq!(partitions[0].faces().face(Face::Front).blocked_count(), 16);
        assert_eq!(partitions[1].faces().face(Face::Back).blocked_count(), 16);
    }

    #[test]
    fn ignores_separated_or_edge_touching_boxes() {
        let a = GridRegion::new(GridPoint::new(0, 0, 0), GridShape::new(4, 4, 4));
        let gap = GridRegion::new(GridPoint::new(5, 0, 0), GridShape::new(4, 4, 4));
        let edge = GridRegion::new(GridPoint::new(4, 4, 0), GridShape::new(4, 4, 4));
        assert!(Boundary::between(&a, &gap).is_none());
        assert!(Boundary::between(&a, &edge).is_none());
    }
}
