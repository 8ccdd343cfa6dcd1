use std::{fmt, sync::Arc};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    boundary::{register_boundaries, Boundary},
    config::SimulationConfig,
    grid::{Axis, Face, GridPoint, GridRegion, GridShape},
    partition::{Partition, PartitionKind},
    scene::SceneDescription,
    source::SoundSource,
    timeline::SimulationClock,
    ArdError, Result,
};

/// Owns every partition and source and drives the global timestep loop.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    partitions: Vec<Partition>,
    sources: Vec<Arc<SoundSource>>,
    boundaries: Vec<Boundary>,
    bounds: GridRegion,
    clock: SimulationClock,
}

impl Simulation {
    /// Assembles a simulation from ready-made partitions.
    ///
    /// Registers the boundaries between every pair of partitions and hands
    /// each source to the first partition containing it. Sources outside
    /// every partition are kept but never injected.
    pub fn new(
        config: SimulationConfig,
        mut partitions: Vec<Partition>,
        sources: Vec<SoundSource>,
    ) -> Result<Self> {
        config.validate()?;
        let bounds = GridRegion::bounding(partitions.iter().map(|p| p.region()))
            .ok_or_else(|| ArdError::msg("scene contains no partitions"))?;

        let boundaries = register_boundaries(&mut partitions);

        let sources: Vec<Arc<SoundSource>> = sources.into_iter().map(Arc::new).collect();
        for source in &sources {
            match partitions
                .iter_mut()
                .find(|p| p.region().contains(source.position()))
            {
                Some(partition) => {
                    tracing::debug!(
                        source = source.id(),
                        partition = partition.id(),
                        "assigned source"
                    );
                    partition.add_source(Arc::clone(source))?;
                }
                None => tracing::warn!(
                    source = source.id(),
                    position = %source.position(),
                    "source lies outside every partition"
                ),
            }
        }

        for partition in &partitions {
            tracing::info!("{}", partition.info());
        }

        let clock = SimulationClock::new(config.time_step);
        Ok(Self {
            config,
            partitions,
            sources,
            boundaries,
            bounds,
            clock,
        })
    }

    /// Builds spectral partitions for every scene record, surrounds them with
    /// absorbing slabs when `pml_layers > 0`, and places a Gaussian source at
    /// every source record.
    pub fn from_scene(config: SimulationConfig, scene: &SceneDescription) -> Result<Self> {
        config.validate()?;
        let mut partitions = Vec::with_capacity(scene.partitions.len() + 6);
        for descriptor in &scene.partitions {
            let region = descriptor.to_region(&config)?;
            partitions.push(Partition::spectral(partitions.len(), region, &config)?);
        }

        if config.pml_layers > 0 {
            let interior = GridRegion::bounding(partitions.iter().map(|p| p.region()))
                .ok_or_else(|| ArdError::msg("scene contains no partitions"))?;
            for face in Face::ALL {
                let region = absorbing_slab(&interior, face, config.pml_layers);
                partitions.push(Partition::absorbing(partitions.len(), region, face, &config)?);
            }
        }

        let sources = scene
            .sources
            .iter()
            .enumerate()
            .map(|(id, descriptor)| SoundSource::gaussian(id, descriptor.to_point(&config), &config))
            .collect();

        Self::new(config, partitions, sources)
    }

    /// Advances every partition by one timestep and returns the new step
    /// count. Does nothing once the simulation is finished.
    pub fn update(&mut self) -> Result<u64> {
        if self.is_finished() {
            return Ok(self.clock.step());
        }

        let t = self.clock.time();
        for partition in &mut self.partitions {
            partition.compute_source_forcing(t)?;
        }
        self.partitions
            .par_iter_mut()
            .try_for_each(|partition| partition.update())?;

        Ok(self.clock.advance())
    }

    /// Steps while `keep_going` returns true and the simulation is not
    /// finished. Returns the step count reached.
    pub fn run_while<F>(&mut self, mut keep_going: F) -> Result<u64>
    where
        F: FnMut(&Simulation) -> bool,
    {
        while !self.is_finished() && keep_going(self) {
            self.update()?;
        }
        Ok(self.clock.step())
    }

    /// Terminal once `step·dt ≥ duration`.
    pub fn is_finished(&self) -> bool {
        self.clock.time() >= self.config.duration
    }

    pub fn total_steps(&self) -> u64 {
        self.config.total_steps()
    }

    pub fn time_step(&self) -> u64 {
        self.clock.step()
    }

    /// Simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn sources(&self) -> &[Arc<SoundSource>] {
        &self.sources
    }

    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    /// Bounding box of every partition.
    pub fn bounds(&self) -> &GridRegion {
        &self.bounds
    }

    /// Pressure at a global grid point, zero where no partition covers it.
    pub fn pressure_at(&self, point: GridPoint) -> f64 {
        self.partitions
            .iter()
            .find(|p| p.region().contains(point))
            .map_or(0.0, |p| {
                let local = p.region().local(point);
                p.pressure(local.x, local.y, local.z)
            })
    }

    /// Global `[y][x]` slice at depth `z`.
    pub fn xy_slice(&self, z: i64) -> PressureSlice {
        self.slice(Axis::Z, z, Axis::Y, Axis::X)
    }

    /// Global `[z][y]` slice at column `x`.
    pub fn yz_slice(&self, x: i64) -> PressureSlice {
        self.slice(Axis::X, x, Axis::Z, Axis::Y)
    }

    /// Global `[z][x]` slice at row `y`.
    pub fn xz_slice(&self, y: i64) -> PressureSlice {
        self.slice(Axis::Y, y, Axis::Z, Axis::X)
    }

    fn slice(&self, normal: Axis, at: i64, row_axis: Axis, col_axis: Axis) -> PressureSlice {
        let width = self.bounds.shape.extent(col_axis);
        let height = self.bounds.shape.extent(row_axis);
        let mut values = vec![0.0; width * height];
        let (row0, col0) = (
            self.bounds.start_along(row_axis),
            self.bounds.start_along(col_axis),
        );

        for partition in &self.partitions {
            let region = partition.region();
            if at < region.start_along(normal) || at >= region.end_along(normal) {
                continue;
            }
            for row in region.start_along(row_axis)..region.end_along(row_axis) {
                for col in region.start_along(col_axis)..region.end_along(col_axis) {
                    let mut global = [0_i64; 3];
                    global[normal.index()] = at;
                    global[row_axis.index()] = row;
                    global[col_axis.index()] = col;
                    let local = region.local(GridPoint::new(global[0], global[1], global[2]));
                    let idx = (row - row0) as usize * width + (col - col0) as usize;
                    values[idx] = partition.pressure(local.x, local.y, local.z);
                }
            }
        }

        PressureSlice {
            width,
            height,
            values,
        }
    }

    /// Counts of what the simulation was assembled from.
    pub fn info(&self) -> SimulationInfo {
        let count = |kind: PartitionKind| self.partitions.iter().filter(|p| p.kind() == kind).count();
        SimulationInfo {
            spectral_partitions: count(PartitionKind::Spectral),
            absorbing_partitions: count(PartitionKind::Absorbing),
            sources: self.sources.len(),
            assigned_sources: self.partitions.iter().map(|p| p.sources().len()).sum(),
            boundaries: self.boundaries.len(),
            bounds: self.bounds.shape,
            total_steps: self.total_steps(),
        }
    }
}

/// Region of the absorbing slab covering `face` of `interior`.
fn absorbing_slab(interior: &GridRegion, face: Face, layers: usize) -> GridRegion {
    let axis = face.axis();
    let mut start = [interior.start.x, interior.start.y, interior.start.z];
    let mut extent = [
        interior.shape.width,
        interior.shape.height,
        interior.shape.depth,
    ];
    let i = axis.index();
    start[i] = if face.is_low() {
        interior.start_along(axis) - layers as i64
    } else {
        interior.end_along(axis)
    };
    extent[i] = layers;
    GridRegion::new(
        GridPoint::new(start[0], start[1], start[2]),
        GridShape::new(extent[0], extent[1], extent[2]),
    )
}

/// A 2D cut through the global pressure field, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureSlice {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f64>,
}

impl PressureSlice {
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.width + col]
    }

    /// Largest absolute value in the slice.
    pub fn peak(&self) -> f64 {
        self.values.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationInfo {
    pub spectral_partitions: usize,
    pub absorbing_partitions: usize,
    pub sources: usize,
    pub assigned_sources: usize,
    pub boundaries: usize,
    pub bounds: GridShape,
    pub total_steps: u64,
}

impl fmt::Display for SimulationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} DCT + {} PML partitions over {}, {}/{} sources assigned, {} boundaries, {} steps",
            self.spectral_partitions,
            self.absorbing_partitions,
            self.bounds,
            self.assigned_sources,
            self.sources,
            self.boundaries,
            self.total_steps
        )
    }
}
