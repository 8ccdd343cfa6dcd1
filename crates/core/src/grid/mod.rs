//! Grid geometry shared by every partition: shapes, regions, faces and the
//! per-face free/blocked flags.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ArdError, Result};

/// Cartesian axis of the simulation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// One of the six faces of a box.
///
/// `Left`, `Top` and `Front` sit at the low end of x, y and z respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    Left,
    Right,
    Top,
    Bottom,
    Front,
    Back,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Left,
        Face::Right,
        Face::Top,
        Face::Bottom,
        Face::Front,
        Face::Back,
    ];

    pub fn axis(self) -> Axis {
        match self {
            Face::Left | Face::Right => Axis::X,
            Face::Top | Face::Bottom => Axis::Y,
            Face::Front | Face::Back => Axis::Z,
        }
    }

    pub fn is_low(self) -> bool {
        matches!(self, Face::Left | Face::Top | Face::Front)
    }

    pub fn on(axis: Axis, low: bool) -> Self {
        match (axis, low) {
            (Axis::X, true) => Face::Left,
            (Axis::X, false) => Face::Right,
            (Axis::Y, true) => Face::Top,
            (Axis::Y, false) => Face::Bottom,
            (Axis::Z, true) => Face::Front,
            (Axis::Z, false) => Face::Back,
        }
    }
}

/// Extents of a 3D grid. Storage is z-major: `z * width * height + y * width + x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl GridShape {
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Builds a shape from signed extents, rejecting anything non-positive.
    pub fn try_new(width: i64, height: i64, depth: i64) -> Result<Self> {
        if width <= 0 || height <= 0 || depth <= 0 {
            return Err(ArdError::dimensions(
                width,
                height,
                depth,
                "extents must be positive",
            ));
        }
        Ok(Self::new(width as usize, height as usize, depth as usize))
    }

    pub fn len(&self) -> usize {
        self.width * self.height * self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cells in one z-slice.
    pub fn plane_len(&self) -> usize {
        self.width * self.height
    }

    pub fn extent(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
            Axis::Z => self.depth,
        }
    }

    /// Linear offset of an in-range cell.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z * self.plane_len() + y * self.width + x
    }

    /// Linear offset of a possibly out-of-range cell.
    #[inline]
    pub fn checked_index(&self, x: isize, y: isize, z: isize) -> Option<usize> {
        if x < 0
            || y < 0
            || z < 0
            || x as usize >= self.width
            || y as usize >= self.height
            || z as usize >= self.depth
        {
            return None;
        }
        Some(self.index(x as usize, y as usize, z as usize))
    }

    pub(crate) fn out_of_bounds(&self, x: i64, y: i64, z: i64) -> ArdError {
        ArdError::OutOfBounds {
            x,
            y,
            z,
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

/// A cell position in global grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl GridPoint {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    pub fn along(&self, axis: Axis) -> i64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// An axis-aligned box of cells placed in the global grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridRegion {
    pub start: GridPoint,
    pub shape: GridShape,
}

impl GridRegion {
    pub fn new(start: GridPoint, shape: GridShape) -> Self {
        Self { start, shape }
    }

    /// Exclusive end corner.
    pub fn end(&self) -> GridPoint {
        GridPoint::new(
            self.start.x + self.shape.width as i64,
            self.start.y + self.shape.height as i64,
            self.start.z + self.shape.depth as i64,
        )
    }

    pub fn start_along(&self, axis: Axis) -> i64 {
        self.start.along(axis)
    }

    pub fn end_along(&self, axis: Axis) -> i64 {
        self.start.along(axis) + self.extent_along(axis) as i64
    }

    pub fn extent_along(&self, axis: Axis) -> usize {
        self.shape.extent(axis)
    }

    pub fn contains(&self, point: GridPoint) -> bool {
        Axis::ALL.iter().all(|&axis| {
            let p = point.along(axis);
            p >= self.start_along(axis) && p < self.end_along(axis)
        })
    }

    /// Converts a global point into partition-local coordinates.
    pub fn local(&self, point: GridPoint) -> GridPoint {
        GridPoint::new(
            point.x - self.start.x,
            point.y - self.start.y,
            point.z - self.start.z,
        )
    }

    /// Smallest region containing every region in the iterator.
    pub fn bounding<'a>(regions: impl IntoIterator<Item = &'a GridRegion>) -> Option<GridRegion> {
        let mut iter = regions.into_iter();
        let first = iter.next()?;
        let (mut lo, mut hi) = (first.start, first.end());
        for region in iter {
            let end = region.end();
            lo = GridPoint::new(
                lo.x.min(region.start.x),
                lo.y.min(region.start.y),
                lo.z.min(region.start.z),
            );
            hi = GridPoint::new(hi.x.max(end.x), hi.y.max(end.y), hi.z.max(end.z));
        }
        Some(GridRegion::new(
            lo,
            GridShape::new(
                (hi.x - lo.x) as usize,
                (hi.y - lo.y) as usize,
                (hi.z - lo.z) as usize,
            ),
        ))
    }
}

/// Free/blocked flags for the cells of one face. `true` means free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceGrid {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl FaceGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![true; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_free(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.cols + col]
    }

    pub fn block(&mut self, row: usize, col: usize) {
        self.cells[row * self.cols + col] = false;
    }

    pub fn blocked_count(&self) -> usize {
        self.cells.iter().filter(|free| !**free).count()
    }
}

/// Flags for all six faces of a partition.
///
/// Left/Right grids are indexed `[z][y]`, Top/Bottom `[z][x]` and
/// Front/Back `[y][x]`, all in local coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceFlags {
    left: FaceGrid,
    right: FaceGrid,
    top: FaceGrid,
    bottom: FaceGrid,
    front: FaceGrid,
    back: FaceGrid,
}

impl FaceFlags {
    pub fn new(shape: GridShape) -> Self {
        let GridShape {
            width,
            height,
            depth,
        } = shape;
        Self {
            left: FaceGrid::new(depth, height),
            right: FaceGrid::new(depth, height),
            top: FaceGrid::new(depth, width),
            bottom: FaceGrid::new(depth, width),
            front: FaceGrid::new(height, width),
            back: FaceGrid::new(height, width),
        }
    }

    pub fn face(&self, face: Face) -> &FaceGrid {
        match face {
            Face::Left => &self.left,
            Face::Right => &self.right,
            Face::Top => &self.top,
            Face::Bottom => &self.bottom,
            Face::Front => &self.front,
            Face::Back => &self.back,
        }
    }

    pub(crate) fn face_mut(&mut self, face: Face) -> &mut FaceGrid {
        match face {
            Face::Left => &mut self.left,
            Face::Right => &mut self.right,
            Face::Top => &mut self.top,
            Face::Bottom => &mut self.bottom,
            Face::Front => &mut self.front,
            Face::Back => &mut self.back,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_z_major() {
        let shape = GridShape::new(4, 3, 2);
        assert_eq!(shape.index(1, 2, 1), 12 + 8 + 1);
        assert_eq!(shape.checked_index(-1, 0, 0), None);
        assert_eq!(shape.checked_index(0, 3, 0), None);
        assert_eq!(shape.checked_index(3, 2, 1), Some(23));
    }

    #[test]
    fn rejects_non_positive_extents() {
        assert!(GridShape::try_new(4, 0, 4).is_err());
        assert!(GridShape::try_new(-2, 4, 4).is_err());
        assert_eq!(GridShape::try_new(2, 3, 4).unwrap().len(), 24);
    }

    #[test]
    fn region_containment_is_half_open() {
        let region = GridRegion::new(GridPoint::new(0, 0, 0), GridShape::new(4, 4, 4));
        assert!(region.contains(GridPoint::new(2, 2, 2)));
        assert!(region.contains(GridPoint::new(0, 3, 3)));
        assert!(!region.contains(GridPoint::new(4, 2, 2)));
        assert!(!region.contains(GridPoint::new(6, 2, 2)));
    }

    #[test]
    fn bounding_box_covers_all_regions() {
        let a = GridRegion::new(GridPoint::new(0, 0, 0), GridShape::new(4, 4, 4));
        let b = GridRegion::new(GridPoint::new(4, -2, 1), GridShape::new(2, 3, 5));
        let bounds = GridRegion::bounding([&a, &b]).unwrap();
        assert_eq!(bounds.start, GridPoint::new(0, -2, 0));
        assert_eq!(bounds.end(), GridPoint::new(6, 4, 6));
    }

    #[test]
    fn face_flags_start_free() {
        let flags = FaceFlags::new(GridShape::new(4, 3, 2));
        assert_eq!(flags.face(Face::Left).rows(), 2);
        assert_eq!(flags.face(Face::Left).cols(), 3);
        assert_eq!(flags.face(Face::Front).rows(), 3);
        assert_eq!(flags.face(Face::Front).cols(), 4);
        assert!(Face::ALL
            .iter()
            .all(|face| flags.face(*face).blocked_count() == 0));
    }
}
