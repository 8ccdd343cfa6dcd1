use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{transform::TransformBackend, ArdError, Result};

/// Physical and numerical constants shared by every partition and source.
///
/// The value is built once and handed out by reference; nothing mutates it
/// after the simulation has been assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Cell size `dh` in metres.
    pub cell_size: f64,
    /// Timestep `dt` in seconds.
    pub time_step: f64,
    /// Speed of sound `c0` in metres per second.
    pub sound_speed: f64,
    /// Simulated duration in seconds.
    pub duration: f64,
    /// Thickness of the generated absorbing layers, in cells. Zero disables them.
    pub pml_layers: usize,
    /// Strategy used by spectral partitions for their DCTs.
    pub transform: TransformBackend,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cell_size: 0.1,
            time_step: 1.0 / 8000.0,
            sound_speed: 343.5,
            duration: 2.0,
            pml_layers: 5,
            transform: TransformBackend::default(),
        }
    }
}

impl SimulationConfig {
    /// Decodes a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Rejects values that would make the update equations meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("cell_size", self.cell_size),
            ("time_step", self.time_step),
            ("sound_speed", self.sound_speed),
            ("duration", self.duration),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ArdError::InvalidConfig(format!(
                    "`{name}` must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Courant number `c0·dt/dh`.
    pub fn courant_number(&self) -> f64 {
        self.sound_speed * self.time_step / self.cell_size
    }

    /// Smallest step count `n` with `n·dt ≥ duration`, evaluated the same
    /// way the simulation clock computes time.
    pub fn total_steps(&self) -> u64 {
        let reached = |steps: u64| steps as f64 * self.time_step >= self.duration;
        let mut steps = (self.duration / self.time_step).ceil() as u64;
        while steps > 0 && reached(steps - 1) {
            steps -= 1;
        }
        while !reached(steps) {
            steps += 1;
        }
        steps
    }

    /// Converts a physical coordinate to grid units, truncating toward zero.
    pub fn to_cells(&self, metres: f64) -> i64 {
        (metres / self.cell_size) as i64
    }
}
