//! Modal (DCT) interior solver.
//!
//! Inside a rectangular box with rigid walls the wave equation separates into
//! one harmonic oscillator per cosine mode. Each step integrates those
//! oscillators exactly, driven by the forcing field projected onto the same
//! modes.

use std::{f64::consts::PI, fmt};

use crate::{config::SimulationConfig, grid::GridShape, transform::TransformEngine, Result};

/// Uniform per-step loss applied to every mode.
pub const MODAL_DAMPING: f64 = 0.999;

/// A scalar field held both per cell (value space) and per cosine mode
/// (mode space).
///
/// The two buffers are transforms of each other right after [`forward`] or
/// [`inverse`] returns; in between either side may be edited independently.
///
/// [`forward`]: SpectralVolume::forward
/// [`inverse`]: SpectralVolume::inverse
pub struct SpectralVolume {
    shape: GridShape,
    values: Vec<f64>,
    modes: Vec<f64>,
    engine: Box<dyn TransformEngine>,
    scale: f64,
}

impl SpectralVolume {
    pub fn new(engine: Box<dyn TransformEngine>) -> Self {
        let shape = engine.shape();
        let len = shape.len();
        Self {
            shape,
            values: vec![0.0; len],
            modes: vec![0.0; len],
            engine,
            scale: 1.0 / (2.0 * (2.0 * len as f64).sqrt()),
        }
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Values to modes, scaled by `1/(2·sqrt(2N))`.
    pub fn forward(&mut self) -> Result<()> {
        self.engine.forward(&self.values, &mut self.modes)?;
        let scale = self.scale;
        self.modes.iter_mut().for_each(|m| *m *= scale);
        Ok(())
    }

    /// Modes to values, scaled by `1/(2·sqrt(2N))`.
    ///
    /// The scale matches [`forward`](Self::forward) so a forward/inverse pair
    /// restores the field exactly. An inverse scale of `1/sqrt(2N)` would
    /// double it; value-space pressures are half what that scaling yields.
    pub fn inverse(&mut self) -> Result<()> {
        self.engine.inverse(&self.modes, &mut self.values)?;
        let scale = self.scale;
        self.values.iter_mut().for_each(|v| *v *= scale);
        Ok(())
    }

    pub fn value(&self, x: usize, y: usize, z: usize) -> f64 {
        self.values[self.shape.index(x, y, z)]
    }

    pub fn set_value(&mut self, x: usize, y: usize, z: usize, value: f64) {
        let idx = self.shape.index(x, y, z);
        self.values[idx] = value;
    }

    pub fn add_value(&mut self, x: usize, y: usize, z: usize, value: f64) {
        let idx = self.shape.index(x, y, z);
        self.values[idx] += value;
    }

    pub fn mode(&self, x: usize, y: usize, z: usize) -> f64 {
        self.modes[self.shape.index(x, y, z)]
    }

    pub fn set_mode(&mut self, x: usize, y: usize, z: usize, mode: f64) {
        let idx = self.shape.index(x, y, z);
        self.modes[idx] = mode;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn modes(&self) -> &[f64] {
        &self.modes
    }

    pub fn modes_mut(&mut self) -> &mut Vec<f64> {
        &mut self.modes
    }

    pub fn clear_values(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
    }
}

impl fmt::Debug for SpectralVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralVolume")
            .field("shape", &self.shape)
            .field("scale", &self.scale)
            .finish()
    }
}

/// Per-mode constants, fixed at construction.
#[derive(Debug, Clone)]
pub struct ModeCache {
    /// `cos(w·dt)`
    cos_wdt: Vec<f64>,
    /// `w²`
    w2: Vec<f64>,
}

impl ModeCache {
    /// `w = c0·π·sqrt((kx/Lx)² + (ky/Ly)² + (kz/Lz)²)` for every DCT bin,
    /// with `L` the physical extent along each axis.
    pub fn new(shape: GridShape, config: &SimulationConfig) -> Self {
        let dh = config.cell_size;
        let lx2 = (shape.width as f64 * dh).powi(2);
        let ly2 = (shape.height as f64 * dh).powi(2);
        let lz2 = (shape.depth as f64 * dh).powi(2);

        let mut cos_wdt = Vec::with_capacity(shape.len());
        let mut w2 = Vec::with_capacity(shape.len());
        for kz in 0..shape.depth {
            for ky in 0..shape.height {
                for kx in 0..shape.width {
                    let (kx, ky, kz) = (kx as f64, ky as f64, kz as f64);
                    let w = config.sound_speed
                        * PI
                        * (kx * kx / lx2 + ky * ky / ly2 + kz * kz / lz2).sqrt();
                    cos_wdt.push((w * config.time_step).cos());
                    w2.push(w * w);
                }
            }
        }
        Self { cos_wdt, w2 }
    }

    pub fn cos_wdt(&self) -> &[f64] {
        &self.cos_wdt
    }

    pub fn w2(&self) -> &[f64] {
        &self.w2
    }
}

/// Interior partition advanced by the exact modal integrator.
#[derive(Debug)]
pub struct SpectralPartition {
    shape: GridShape,
    dt: f64,
    cache: ModeCache,
    pressure: SpectralVolume,
    force: SpectralVolume,
    prev_modes: Vec<f64>,
    next_modes: Vec<f64>,
}

impl SpectralPartition {
    pub fn new(shape: GridShape, config: &SimulationConfig) -> Result<Self> {
        let pressure = SpectralVolume::new(config.transform.build(shape)?);
        let force = SpectralVolume::new(config.transform.build(shape)?);
        Ok(Self {
            shape,
            dt: config.time_step,
            cache: ModeCache::new(shape, config),
            pressure,
            force,
            prev_modes: vec![0.0; shape.len()],
            next_modes: vec![0.0; shape.len()],
        })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Advances pressure by one timestep and consumes the pending forcing.
    pub fn update(&mut self) -> Result<()> {
        self.force.forward()?;

        let dt2 = self.dt * self.dt;
        let current = self.pressure.modes();
        let inputs = current
            .iter()
            .zip(&self.prev_modes)
            .zip(self.force.modes())
            .zip(self.cache.cos_wdt())
            .zip(self.cache.w2());
        for (next, ((((&m, &m_prev), &f), &c), &w2)) in self.next_modes.iter_mut().zip(inputs) {
            let drive = if w2 > 0.0 {
                2.0 * f / w2 * (1.0 - c)
            } else {
                // w -> 0 limit of the forcing term.
                f * dt2
            };
            *next = MODAL_DAMPING * (2.0 * m * c - m_prev + drive);
        }

        // prev <- current, current <- next; the old prev becomes scratch.
        std::mem::swap(&mut self.prev_modes, self.pressure.modes_mut());
        std::mem::swap(self.pressure.modes_mut(), &mut self.next_modes);

        self.pressure.inverse()?;
        self.force.clear_values();
        Ok(())
    }

    pub fn pressure_field(&self) -> &[f64] {
        self.pressure.values()
    }

    pub fn pressure(&self, x: usize, y: usize, z: usize) -> f64 {
        self.pressure.value(x, y, z)
    }

    /// Adds to the forcing applied during the next [`update`](Self::update).
    pub fn add_force(&mut self, x: usize, y: usize, z: usize, value: f64) {
        self.force.add_value(x, y, z, value);
    }

    pub fn force(&self, x: usize, y: usize, z: usize) -> f64 {
        self.force.value(x, y, z)
    }

    pub fn pressure_volume(&self) -> &SpectralVolume {
        &self.pressure
    }

    pub fn mode_cache(&self) -> &ModeCache {
        &self.cache
    }

    /// Discrete oscillator energy summed over modes.
    ///
    /// For each mode `0.5/dt²·(m² − 2·d·cos(w·dt)·m·m_prev + d·m_prev²)`,
    /// which shrinks by exactly `d` on every unforced step.
    pub fn modal_energy(&self) -> f64 {
        let d = MODAL_DAMPING;
        let sum: f64 = self
            .pressure
            .modes()
            .iter()
            .zip(&self.prev_modes)
            .zip(self.cache.cos_wdt())
            .map(|((&m, &p), &c)| m * m - 2.0 * d * c * m * p + d * p * p)
            .sum();
        0.5 * sum / (self.dt * self.dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformBackend;

    fn config() -> SimulationConfig {
        SimulationConfig {
            pml_layers: 0,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn round_trip_restores_values() {
        let shape = GridShape::new(5, 4, 3);
        for backend in [TransformBackend::Fft, TransformBackend::Direct] {
            let mut volume = SpectralVolume::new(backend.build(shape).unwrap());
            let original: Vec<f64> = (0..shape.len())
                .map(|i| (i as f64 * 0.73).sin() * 3.0 - 1.0)
                .collect();
            volume.values_mut().copy_from_slice(&original);

            volume.forward().unwrap();
            volume.clear_values();
            volume.inverse().unwrap();

            for (restored, expected) in volume.values().iter().zip(&original) {
                assert!((restored - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn dc_mode_inverts_to_a_uniform_field() {
        let shape = GridShape::new(4, 3, 2);
        let mut volume = SpectralVolume::new(TransformBackend::Direct.build(shape).unwrap());
        volume.set_mode(0, 0, 0, 2.0);
        assert_eq!(volume.mode(0, 0, 0), 2.0);
        volume.inverse().unwrap();

        // DC mode m maps to m / (2·sqrt(2N)) in every cell.
        let expected = 2.0 / (2.0 * (2.0 * shape.len() as f64).sqrt());
        assert!(volume.values().iter().all(|v| (v - expected).abs() < 1e-12));
    }

    #[test]
    fn dc_mode_has_zero_frequency() {
        let shape = GridShape::new(4, 4, 4);
        let cache = ModeCache::new(shape, &config());
        assert_eq!(cache.w2()[0], 0.0);
        assert_eq!(cache.cos_wdt()[0], 1.0);
        assert!(cache.w2()[1..].iter().all(|w2| *w2 > 0.0));

        // First x mode of a 0.4 m box: w = c0·π/0.4.
        let expected = 343.5 * PI / 0.4;
        assert!((cache.w2()[1].sqrt() - expected).abs() < 1e-9);
    }

    #[test]
    fn stays_silent_without_forcing() {
        let mut partition = SpectralPartition::new(GridShape::new(4, 3, 5), &config()).unwrap();
        for _ in 0..20 {
            partition.update().unwrap();
        }
        assert!(partition.pressure_field().iter().all(|p| *p == 0.0));
        assert_eq!(partition.modal_energy(), 0.0);
    }

    #[test]
    fn impulse_produces_finite_response() {
        let mut partition = SpectralPartition::new(GridShape::new(6, 6, 6), &config()).unwrap();
        partition.add_force(2, 3, 1, 1.0e6);
        partition.update().unwrap();

        assert!(partition.pressure_field().iter().all(|p| p.is_finite()));
        assert!(partition.pressure(2, 3, 1).abs() > 0.0);
        // Forcing is consumed by the step.
        assert_eq!(partition.force(2, 3, 1), 0.0);
    }

    #[test]
    fn modal_energy_decays_after_impulse() {
        let mut partition = SpectralPartition::new(GridShape::new(5, 4, 6), &config()).unwrap();
        partition.add_force(1, 2, 3, 1.0e6);
        partition.update().unwrap();

        let mut previous = partition.modal_energy();
        let initial = previous;
        assert!(initial > 0.0);
        for _ in 0..200 {
            partition.update().unwrap();
            let energy = partition.modal_energy();
            assert!(energy <= previous * (1.0 + 1e-9));
            assert!((energy / previous - MODAL_DAMPING).abs() < 1e-6);
            previous = energy;
        }
        let expected = initial * MODAL_DAMPING.powi(200);
        assert!((previous - expected).abs() / expected < 1e-6);
    }

    #[test]
    fn uniform_forcing_drives_dc_offset() {
        let shape = GridShape::new(3, 3, 3);
        let mut partition = SpectralPartition::new(shape, &config()).unwrap();
        for z in 0..3 {
            for y in 0..3 {
                for x in 0..3 {
                    partition.add_force(x, y, z, 8.0e6);
                }
            }
        }
        partition.update().unwrap();

        // Only the zero-frequency mode is driven.
        let modes = partition.pressure_volume().modes();
        assert!(modes[0] > 0.0);
        assert!(modes[1..].iter().all(|m| m.abs() < 1e-9 * modes[0]));
        assert_eq!(partition.mode_cache().w2()[0], 0.0);

        let first = partition.pressure(0, 0, 0);
        assert!(first > 0.0);
        assert!(partition
            .pressure_field()
            .iter()
            .all(|p| (p - first).abs() < 1e-9 * first.abs()));
    }
}
