use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::{config::SimulationConfig, grid::GridPoint};

/// Peak of the default Gaussian pulse.
pub const DEFAULT_GAUSSIAN_AMPLITUDE: f64 = 1.0e9;

/// Time response of a point emitter. Sampling is pure: the same time always
/// yields the same value, so sources can be read from any thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceSignal {
    /// Smooth pulse `amplitude·exp(−(π(2·λ·n/6 − 2))²)` with `n = t/dt` the
    /// step index and `λ` the Courant number. Peaks at step `6/λ`.
    Gaussian { amplitude: f64, courant: f64, dt: f64 },
    /// Non-zero only during the first step.
    Impulse { amplitude: f64, dt: f64 },
    /// Continuous sinusoid.
    Tone { frequency_hz: f64, amplitude: f64 },
}

impl SourceSignal {
    pub fn gaussian(config: &SimulationConfig) -> Self {
        SourceSignal::Gaussian {
            amplitude: DEFAULT_GAUSSIAN_AMPLITUDE,
            courant: config.courant_number(),
            dt: config.time_step,
        }
    }

    pub fn sample(&self, t: f64) -> f64 {
        match *self {
            SourceSignal::Gaussian {
                amplitude,
                courant,
                dt,
            } => {
                let step = t / dt;
                let arg = (PI * (2.0 * courant * step / 6.0 - 2.0)).powi(2);
                amplitude * (-arg).exp()
            }
            SourceSignal::Impulse { amplitude, dt } => {
                if t >= 0.0 && t < 0.5 * dt {
                    amplitude
                } else {
                    0.0
                }
            }
            SourceSignal::Tone {
                frequency_hz,
                amplitude,
            } => amplitude * (2.0 * PI * frequency_hz * t).sin(),
        }
    }
}

/// A point emitter placed on the global grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundSource {
    id: usize,
    position: GridPoint,
    signal: SourceSignal,
}

impl SoundSource {
    pub fn new(id: usize, position: GridPoint, signal: SourceSignal) -> Self {
        Self {
            id,
            position,
            signal,
        }
    }

    /// Gaussian pulse source using the configured grid spacing and timestep.
    pub fn gaussian(id: usize, position: GridPoint, config: &SimulationConfig) -> Self {
        Self::new(id, position, SourceSignal::gaussian(config))
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn position(&self) -> GridPoint {
        self.position
    }

    pub fn signal(&self) -> &SourceSignal {
        &self.signal
    }

    /// Emitted value at simulation time `t` (seconds).
    pub fn sample(&self, t: f64) -> f64 {
        self.signal.sample(t)
    }
}
