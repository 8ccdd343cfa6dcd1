use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    absorbing::AbsorbingPartition,
    boundary::Boundary,
    config::SimulationConfig,
    grid::{Axis, Face, FaceFlags, GridPoint, GridRegion, GridShape},
    source::SoundSource,
    spectral::SpectralPartition,
    ArdError, Result,
};

/// Which numerical scheme advances a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionKind {
    /// Exact modal update, used for the interior.
    Spectral,
    /// Finite-difference PML, used to truncate the domain.
    Absorbing,
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKind::Spectral => f.write_str("DCT"),
            PartitionKind::Absorbing => f.write_str("PML"),
        }
    }
}

/// The two solvers a partition can run.
#[derive(Debug)]
pub enum Solver {
    Spectral(SpectralPartition),
    Absorbing(AbsorbingPartition),
}

/// A rectangular piece of the domain together with the solver advancing it.
#[derive(Debug)]
pub struct Partition {
    id: usize,
    region: GridRegion,
    dh: f64,
    dt: f64,
    c0: f64,
    faces: FaceFlags,
    sources: Vec<Arc<SoundSource>>,
    boundary_count: usize,
    solver: Solver,
}

impl Partition {
    /// Creates an interior partition solved in mode space.
    pub fn spectral(id: usize, region: GridRegion, config: &SimulationConfig) -> Result<Self> {
        let solver = Solver::Spectral(SpectralPartition::new(region.shape, config)?);
        Ok(Self::with_solver(id, region, config, solver))
    }

    /// Creates an absorbing layer whose outer edge lies on `face`.
    pub fn absorbing(
        id: usize,
        region: GridRegion,
        face: Face,
        config: &SimulationConfig,
    ) -> Result<Self> {
        let solver = Solver::Absorbing(AbsorbingPartition::new(region.shape, face, config)?);
        Ok(Self::with_solver(id, region, config, solver))
    }

    fn with_solver(id: usize, region: GridRegion, config: &SimulationConfig, solver: Solver) -> Self {
        Self {
            id,
            region,
            dh: config.cell_size,
            dt: config.time_step,
            c0: config.sound_speed,
            faces: FaceFlags::new(region.shape),
            sources: Vec::new(),
            boundary_count: 0,
            solver,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn kind(&self) -> PartitionKind {
        match self.solver {
            Solver::Spectral(_) => PartitionKind::Spectral,
            Solver::Absorbing(_) => PartitionKind::Absorbing,
        }
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn region(&self) -> &GridRegion {
        &self.region
    }

    pub fn shape(&self) -> GridShape {
        self.region.shape
    }

    pub fn start(&self) -> GridPoint {
        self.region.start
    }

    pub fn end(&self) -> GridPoint {
        self.region.end()
    }

    pub fn cell_size(&self) -> f64 {
        self.dh
    }

    pub fn time_step(&self) -> f64 {
        self.dt
    }

    pub fn sound_speed(&self) -> f64 {
        self.c0
    }

    /// Axes along which this partition damps outgoing waves.
    pub fn absorbed_axes(&self) -> Vec<Axis> {
        match &self.solver {
            Solver::Spectral(_) => Vec::new(),
            Solver::Absorbing(layer) => vec![layer.face().axis()],
        }
    }

    pub fn faces(&self) -> &FaceFlags {
        &self.faces
    }

    pub fn sources(&self) -> &[Arc<SoundSource>] {
        &self.sources
    }

    pub fn boundary_count(&self) -> usize {
        self.boundary_count
    }

    /// Advances the partition by one timestep.
    pub fn update(&mut self) -> Result<()> {
        match &mut self.solver {
            Solver::Spectral(spectral) => spectral.update(),
            Solver::Absorbing(layer) => {
                layer.update();
                Ok(())
            }
        }
    }

    /// Current pressure in value space, z-major.
    pub fn pressure_field(&self) -> &[f64] {
        match &self.solver {
            Solver::Spectral(spectral) => spectral.pressure_field(),
            Solver::Absorbing(layer) => layer.pressure_field(),
        }
    }

    /// Pressure at a local cell. Out-of-range coordinates read zero.
    pub fn pressure(&self, x: i64, y: i64, z: i64) -> f64 {
        self.shape()
            .checked_index(x as isize, y as isize, z as isize)
            .map_or(0.0, |idx| self.pressure_field()[idx])
    }

    /// Adds forcing at a local cell, consumed by the next [`update`](Self::update).
    pub fn set_force(&mut self, x: i64, y: i64, z: i64, value: f64) -> Result<()> {
        let shape = self.shape();
        if shape.checked_index(x as isize, y as isize, z as isize).is_none() {
            return Err(shape.out_of_bounds(x, y, z));
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        match &mut self.solver {
            Solver::Spectral(spectral) => spectral.add_force(x, y, z, value),
            Solver::Absorbing(layer) => layer.add_force(x, y, z, value),
        }
        Ok(())
    }

    /// Pending forcing at a local cell.
    pub fn force(&self, x: usize, y: usize, z: usize) -> f64 {
        match &self.solver {
            Solver::Spectral(spectral) => spectral.force(x, y, z),
            Solver::Absorbing(layer) => layer.force(x, y, z),
        }
    }

    /// Row-major `[y][x]` slice at local depth `z`.
    pub fn xy_plane(&self, z: usize) -> Vec<f64> {
        let shape = self.shape();
        let mut plane = Vec::with_capacity(shape.width * shape.height);
        for y in 0..shape.height {
            for x in 0..shape.width {
                plane.push(self.pressure(x as i64, y as i64, z as i64));
            }
        }
        plane
    }

    /// Row-major `[z][y]` slice at local column `x`.
    pub fn yz_plane(&self, x: usize) -> Vec<f64> {
        let shape = self.shape();
        let mut plane = Vec::with_capacity(shape.height * shape.depth);
        for z in 0..shape.depth {
            for y in 0..shape.height {
                plane.push(self.pressure(x as i64, y as i64, z as i64));
            }
        }
        plane
    }

    /// Row-major `[z][x]` slice at local row `y`.
    pub fn xz_plane(&self, y: usize) -> Vec<f64> {
        let shape = self.shape();
        let mut plane = Vec::with_capacity(shape.width * shape.depth);
        for z in 0..shape.depth {
            for x in 0..shape.width {
                plane.push(self.pressure(x as i64, y as i64, z as i64));
            }
        }
        plane
    }

    /// Row-major `[y][x]` slice of the pending forcing at local depth `z`.
    pub fn xy_forcing_plane(&self, z: usize) -> Vec<f64> {
        let shape = self.shape();
        let mut plane = Vec::with_capacity(shape.width * shape.height);
        for y in 0..shape.height {
            for x in 0..shape.width {
                plane.push(self.force(x, y, z));
            }
        }
        plane
    }

    /// Assigns a source to this partition. The source must lie inside it.
    pub fn add_source(&mut self, source: Arc<SoundSource>) -> Result<()> {
        if !self.region.contains(source.position()) {
            return Err(ArdError::msg(format!(
                "source {} at {} lies outside partition {}",
                source.id(),
                source.position(),
                self.id
            )));
        }
        self.sources.push(source);
        Ok(())
    }

    /// Writes every assigned source's value at time `t` into the forcing field.
    pub fn compute_source_forcing(&mut self, t: f64) -> Result<()> {
        for i in 0..self.sources.len() {
            let source = Arc::clone(&self.sources[i]);
            let local = self.region.local(source.position());
            self.set_force(local.x, local.y, local.z, source.sample(t))?;
        }
        Ok(())
    }

    /// Blocks the cells of this partition's face that touch `neighbour`
    /// across `boundary`.
    ///
    /// The face is the low one when the neighbour starts before this
    /// partition along the boundary axis, the high one otherwise.
    pub fn add_boundary(&mut self, boundary: &Boundary, neighbour: &GridRegion) {
        let axis = boundary.axis();
        let low = neighbour.start_along(axis) < self.region.start_along(axis);
        let face = Face::on(axis, low);
        let start = self.region.start;
        let (lo, hi) = (boundary.start(), boundary.end());
        let grid = self.faces.face_mut(face);

        // (row, col) axes of each face grid, see `FaceFlags`.
        let (row_axis, col_axis) = match axis {
            Axis::X => (Axis::Z, Axis::Y),
            Axis::Y => (Axis::Z, Axis::X),
            Axis::Z => (Axis::Y, Axis::X),
        };
        for row in lo.along(row_axis)..hi.along(row_axis) {
            for col in lo.along(col_axis)..hi.along(col_axis) {
                let r = (row - start.along(row_axis)) as usize;
                let c = (col - start.along(col_axis)) as usize;
                grid.block(r, c);
            }
        }
        self.boundary_count += 1;
    }

    /// One-line diagnostic describing the partition.
    pub fn info(&self) -> PartitionInfo {
        PartitionInfo {
            id: self.id,
            kind: self.kind(),
            start: self.start(),
            end: self.end(),
            sources: self.sources.len(),
            boundaries: self.boundary_count,
        }
    }
}

/// Summary printed when a simulation is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub id: usize,
    pub kind: PartitionKind,
    pub start: GridPoint,
    pub end: GridPoint,
    pub sources: usize,
    pub boundaries: usize,
}

impl fmt::Display for PartitionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} partition {}: {}->{} ({} sources; {} boundaries)",
            self.kind, self.id, self.start, self.end, self.sources, self.boundaries
        )
    }
}
