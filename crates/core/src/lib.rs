//! Core library for the ARD acoustic simulator.
//!
//! A scene is split into rectangular partitions. Interior partitions are
//! advanced exactly in DCT mode space, while thin finite-difference PML
//! slabs absorb waves leaving the domain. [`Simulation`] owns the
//! partitions and sources and drives the global timestep loop.

pub mod absorbing;
pub mod boundary;
pub mod config;
pub mod error;
pub mod grid;
pub mod partition;
pub mod scene;
pub mod simulation;
pub mod source;
pub mod spectral;
pub mod timeline;
pub mod transform;

pub use absorbing::AbsorbingPartition;
pub use boundary::{register_boundaries, Boundary};
pub use config::SimulationConfig;
pub use error::{ArdError, Result};
pub use grid::{Axis, Face, FaceFlags, FaceGrid, GridPoint, GridRegion, GridShape};
pub use partition::{Partition, PartitionInfo, PartitionKind, Solver};
pub use scene::{PartitionDescriptor, SceneDescription, SourceDescriptor};
pub use simulation::{PressureSlice, Simulation, SimulationInfo};
pub use source::{SoundSource, SourceSignal};
pub use spectral::{ModeCache, SpectralPartition, SpectralVolume, MODAL_DAMPING};
pub use timeline::SimulationClock;
pub use transform::{TransformBackend, TransformEngine};
