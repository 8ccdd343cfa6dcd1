/// Global simulation clock, advanced once per step after every partition has
/// finished updating.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    step: u64,
    dt: f64,
}

impl SimulationClock {
    pub fn new(dt: f64) -> Self {
        Self { step: 0, dt }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    pub fn advance(&mut self) -> u64 {
        self.step += 1;
        self.step
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Simulated time in seconds, `step · dt`.
    pub fn time(&self) -> f64 {
        self.step as f64 * self.dt
    }
}
