//! Convolutional perfectly matched layer.
//!
//! A slab of cells glued to one face of the interior, advanced with a
//! second-order-in-time finite-difference scheme whose damping ramps up from
//! zero at the interior side to `zeta_max` at the outer edge.

use std::f64::consts::PI;

use rayon::prelude::*;

use crate::{
    config::SimulationConfig,
    grid::{Axis, Face, GridShape},
    ArdError, Result,
};

/// Reflection coefficient the layer is tuned for.
pub const TARGET_REFLECTION: f64 = 1e-5;

/// 6th-order central second derivative, divided by `180·dh²`.
const SECOND_DERIVATIVE: [f64; 7] = [2.0, -27.0, 270.0, -490.0, 270.0, -27.0, 2.0];
/// 4th-order central first derivative, divided by `12·dh`.
const FIRST_DERIVATIVE: [f64; 5] = [1.0, -8.0, 0.0, 8.0, -1.0];

/// Absorbing partition state.
///
/// Cells outside the slab read as zero, which closes the stencil at every
/// face of the slab.
#[derive(Debug, Clone)]
pub struct AbsorbingPartition {
    shape: GridShape,
    face: Face,
    dh: f64,
    dt: f64,
    c0: f64,

    p_prev: Vec<f64>,
    p: Vec<f64>,
    p_next: Vec<f64>,

    phi: [Vec<f64>; 3],
    phi_next: [Vec<f64>; 3],

    force: Vec<f64>,
    zeta: [Vec<f64>; 3],
}

impl AbsorbingPartition {
    /// Builds a layer whose outer edge lies on `face`; damping ramps along
    /// that face's axis.
    pub fn new(shape: GridShape, face: Face, config: &SimulationConfig) -> Result<Self> {
        if shape.is_empty() {
            return Err(ArdError::dimensions(
                shape.width as i64,
                shape.height as i64,
                shape.depth as i64,
                "absorbing layer must have positive extents",
            ));
        }

        let len = shape.len();
        let zeros = || vec![0.0; len];
        Ok(Self {
            shape,
            face,
            dh: config.cell_size,
            dt: config.time_step,
            c0: config.sound_speed,
            p_prev: zeros(),
            p: zeros(),
            p_next: zeros(),
            phi: [zeros(), zeros(), zeros()],
            phi_next: [zeros(), zeros(), zeros()],
            force: zeros(),
            zeta: damping_fields(shape, face, config),
        })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Face of the interior this layer sits beyond.
    pub fn face(&self) -> Face {
        self.face
    }

    /// Physical thickness `L` of the layer along its absorbed axis.
    pub fn thickness(&self) -> f64 {
        self.shape.extent(self.face.axis()) as f64 * self.dh
    }

    pub fn zeta(&self, axis: Axis) -> &[f64] {
        &self.zeta[axis.index()]
    }

    pub fn pressure_field(&self) -> &[f64] {
        &self.p
    }

    pub fn pressure(&self, x: usize, y: usize, z: usize) -> f64 {
        self.p[self.shape.index(x, y, z)]
    }

    pub fn add_force(&mut self, x: usize, y: usize, z: usize, value: f64) {
        let idx = self.shape.index(x, y, z);
        self.force[idx] += value;
    }

    pub fn force(&self, x: usize, y: usize, z: usize) -> f64 {
        self.force[self.shape.index(x, y, z)]
    }

    /// Advances the layer by one timestep and consumes the pending forcing.
    pub fn update(&mut self) {
        let shape = self.shape;
        let plane = shape.plane_len();
        let (dh, dt, c0) = (self.dh, self.dt, self.c0);

        let p = &self.p;
        let p_prev = &self.p_prev;
        let force = &self.force;
        let [phi_x, phi_y, phi_z] = &self.phi;
        let [zeta_x, zeta_y, zeta_z] = &self.zeta;
        let [phi_x_next, phi_y_next, phi_z_next] = &mut self.phi_next;

        self.p_next
            .par_chunks_mut(plane)
            .zip(phi_x_next.par_chunks_mut(plane))
            .zip(phi_y_next.par_chunks_mut(plane))
            .zip(phi_z_next.par_chunks_mut(plane))
            .enumerate()
            .for_each(|(z, (((p_out, fx_out), fy_out), fz_out))| {
                for y in 0..shape.height {
                    for x in 0..shape.width {
                        let idx = shape.index(x, y, z);
                        let local = y * shape.width + x;
                        let at = Stencil::new(shape, x, y, z);

                        let laplacian = at.second(p, Axis::X, dh)
                            + at.second(p, Axis::Y, dh)
                            + at.second(p, Axis::Z, dh);
                        let divergence = at.first(phi_x, Axis::X, dh)
                            + at.first(phi_y, Axis::Y, dh)
                            + at.first(phi_z, Axis::Z, dh);

                        let (zx, zy, zz) = (zeta_x[idx], zeta_y[idx], zeta_z[idx]);
                        let pc = p[idx];
                        let pp = p_prev[idx];

                        let rhs = c0 * c0 * laplacian
                            - (zx + zy + zz) * (pc - pp) / dt
                            - (zx * zy + zy * zz + zx * zz) * pc
                            + divergence
                            + force[idx];
                        p_out[local] = 2.0 * pc - pp + dt * dt * rhs;

                        fx_out[local] = phi_x[idx] - dt * zx * phi_x[idx]
                            + dt * (zy + zz - zx) * at.first(p, Axis::X, dh);
                        fy_out[local] = phi_y[idx] - dt * zy * phi_y[idx]
                            + dt * (zx + zz - zy) * at.first(p, Axis::Y, dh);
                        fz_out[local] = phi_z[idx] - dt * zz * phi_z[idx]
                            + dt * (zx + zy - zz) * at.first(p, Axis::Z, dh);
                    }
                }
            });

        std::mem::swap(&mut self.phi, &mut self.phi_next);
        // (prev, current, next) <- (current, next, prev)
        std::mem::swap(&mut self.p_prev, &mut self.p);
        std::mem::swap(&mut self.p, &mut self.p_next);

        self.force.iter_mut().for_each(|f| *f = 0.0);
    }
}

/// Stencil taps around one cell; taps outside the grid read zero.
struct Stencil {
    shape: GridShape,
    x: isize,
    y: isize,
    z: isize,
}

impl Stencil {
    fn new(shape: GridShape, x: usize, y: usize, z: usize) -> Self {
        Self {
            shape,
            x: x as isize,
            y: y as isize,
            z: z as isize,
        }
    }

    #[inline]
    fn tap(&self, field: &[f64], axis: Axis, offset: isize) -> f64 {
        let (x, y, z) = match axis {
            Axis::X => (self.x + offset, self.y, self.z),
            Axis::Y => (self.x, self.y + offset, self.z),
            Axis::Z => (self.x, self.y, self.z + offset),
        };
        self.shape
            .checked_index(x, y, z)
            .map_or(0.0, |idx| field[idx])
    }

    fn second(&self, field: &[f64], axis: Axis, dh: f64) -> f64 {
        let sum: f64 = SECOND_DERIVATIVE
            .iter()
            .enumerate()
            .map(|(m, c)| c * self.tap(field, axis, m as isize - 3))
            .sum();
        sum / (180.0 * dh * dh)
    }

    fn first(&self, field: &[f64], axis: Axis, dh: f64) -> f64 {
        let sum: f64 = FIRST_DERIVATIVE
            .iter()
            .enumerate()
            .map(|(m, c)| c * self.tap(field, axis, m as isize - 2))
            .sum();
        sum / (12.0 * dh)
    }
}

/// Raised-cosine damping profile `zeta_max·(d/L − sin(2πd/L)/(2π))`.
pub fn damping_profile(distance: f64, thickness: f64, zeta_max: f64) -> f64 {
    let ratio = distance / thickness;
    zeta_max * (ratio - (2.0 * PI * ratio).sin() / (2.0 * PI))
}

/// Per-cell damping rates for a layer beyond `face`. Only the face's axis is
/// non-zero.
fn damping_fields(shape: GridShape, face: Face, config: &SimulationConfig) -> [Vec<f64>; 3] {
    let axis = face.axis();
    let cells = shape.extent(axis);
    let thickness = cells as f64 * config.cell_size;
    let zeta_max = config.sound_speed / thickness * (1.0 / TARGET_REFLECTION).log10();

    // Distance in cells from the interior side: the cell touching the
    // interior is 1, the outermost cell is `cells`.
    let ramp: Vec<f64> = (0..cells)
        .map(|i| {
            let d = if face.is_low() { cells - i } else { i + 1 };
            damping_profile(d as f64 * config.cell_size, thickness, zeta_max)
        })
        .collect();

    let mut fields = [
        vec![0.0; shape.len()],
        vec![0.0; shape.len()],
        vec![0.0; shape.len()],
    ];
    let field = &mut fields[axis.index()];
    for z in 0..shape.depth {
        for y in 0..shape.height {
            for x in 0..shape.width {
                let along = match axis {
                    Axis::X => x,
                    Axis::Y => y,
                    Axis::Z => z,
                };
                field[shape.index(x, y, z)] = ramp[along];
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimulationConfig {
        SimulationConfig::default()
    }

    fn peak_profile(
        layer: &mut AbsorbingPartition,
        steps: usize,
        pulse: impl Fn(usize) -> f64,
    ) -> Vec<f64> {
        let shape = layer.shape();
        let (cy, cz) = (shape.height / 2, shape.depth / 2);
        let mut peaks = vec![0.0_f64; shape.width];
        for step in 0..steps {
            let value = pulse(step);
            if value != 0.0 {
                for z in 0..shape.depth {
                    for y in 0..shape.height {
                        layer.add_force(0, y, z, value);
                    }
                }
            }
            layer.update();
            for (x, peak) in peaks.iter_mut().enumerate() {
                *peak = peak.max(layer.pressure(x, cy, cz).abs());
            }
        }
        peaks
    }

    #[test]
    fn profile_is_smooth_at_interface() {
        let zeta_max = 100.0;
        assert_eq!(damping_profile(0.0, 0.5, zeta_max), 0.0);
        assert!((damping_profile(0.5, 0.5, zeta_max) - zeta_max).abs() < 1e-9);
        // Zero slope at the interface: the ramp starts cubically.
        let near = damping_profile(1e-3, 0.5, zeta_max);
        assert!(near < 1e-5 * zeta_max);
    }

    #[test]
    fn only_the_layer_axis_is_damped() {
        let shape = GridShape::new(5, 3, 4);
        let layer = AbsorbingPartition::new(shape, Face::Right, &config()).unwrap();
        assert!(layer.zeta(Axis::Y).iter().all(|z| *z == 0.0));
        assert!(layer.zeta(Axis::Z).iter().all(|z| *z == 0.0));

        let zx = layer.zeta(Axis::X);
        let row: Vec<f64> = (0..5).map(|x| zx[shape.index(x, 1, 2)]).collect();
        assert!(row.windows(2).all(|w| w[0] < w[1]));
        let zeta_max = 343.5 / 0.5 * 5.0;
        assert!((row[4] - zeta_max).abs() < 1e-6);
    }

    #[test]
    fn low_faces_ramp_toward_the_origin() {
        let shape = GridShape::new(3, 6, 2);
        let layer = AbsorbingPartition::new(shape, Face::Top, &config()).unwrap();
        let zy = layer.zeta(Axis::Y);
        let column: Vec<f64> = (0..6).map(|y| zy[shape.index(1, y, 0)]).collect();
        assert!(column.windows(2).all(|w| w[0] > w[1]));
        assert!(layer.zeta(Axis::X).iter().all(|z| *z == 0.0));
    }

    #[test]
    fn stays_at_rest_without_forcing() {
        for face in Face::ALL {
            let mut layer =
                AbsorbingPartition::new(GridShape::new(5, 4, 6), face, &config()).unwrap();
            for _ in 0..25 {
                layer.update();
            }
            assert!(layer.pressure_field().iter().all(|p| *p == 0.0));
            assert!(layer.phi.iter().flatten().all(|p| *p == 0.0));
        }
    }

    #[test]
    fn forcing_is_consumed_each_step() {
        let mut layer =
            AbsorbingPartition::new(GridShape::new(5, 5, 5), Face::Back, &config()).unwrap();
        layer.add_force(2, 2, 0, 1.0);
        layer.add_force(2, 2, 0, 2.0);
        assert_eq!(layer.force(2, 2, 0), 3.0);
        layer.update();
        assert_eq!(layer.force(2, 2, 0), 0.0);
        assert!(layer.pressure(2, 2, 0) > 0.0);
    }

    fn gaussian_drive(step: usize) -> f64 {
        let courant = config().courant_number();
        let arg = (PI * (2.0 * courant * step as f64 / 6.0 - 2.0)).powi(2);
        1.0e9 * (-arg).exp()
    }

    #[test]
    fn thin_layer_decays_across_its_whole_thickness() {
        let shape = GridShape::new(5, 9, 9);
        let mut layer = AbsorbingPartition::new(shape, Face::Right, &config()).unwrap();
        assert!((layer.thickness() - 0.5).abs() < 1e-12);

        let peaks = peak_profile(&mut layer, 400, gaussian_drive);
        assert!(peaks.windows(2).all(|w| w[1] < w[0]), "{peaks:?}");
        assert!(peaks[4] < 0.3 * peaks[0], "{peaks:?}");

        let residual = layer
            .pressure_field()
            .iter()
            .fold(0.0_f64, |acc, p| acc.max(p.abs()));
        assert!(residual < 1e-2 * peaks[0]);
    }

    #[test]
    fn wave_decays_while_crossing_the_layer() {
        let shape = GridShape::new(10, 9, 9);
        let pulse = gaussian_drive;

        let mut layer = AbsorbingPartition::new(shape, Face::Right, &config()).unwrap();
        let peaks = peak_profile(&mut layer, 400, pulse);

        let mut rigid = AbsorbingPartition::new(shape, Face::Right, &config()).unwrap();
        rigid.zeta = [
            vec![0.0; shape.len()],
            vec![0.0; shape.len()],
            vec![0.0; shape.len()],
        ];
        let rigid_peaks = peak_profile(&mut rigid, 400, pulse);

        // Monotonic decay through the deeper half of the layer.
        let deep = &peaks[shape.width / 2..];
        assert!(deep.windows(2).all(|w| w[1] < w[0]), "{peaks:?}");

        let interface = peaks[0];
        let outer = peaks[shape.width - 1];
        assert!(outer < 0.5 * interface, "{peaks:?}");
        assert!(outer < 0.3 * rigid_peaks[shape.width - 1]);

        // Nothing is left in the damped layer; the undamped one still rings.
        let max_abs = |field: &[f64]| field.iter().fold(0.0_f64, |acc, p| acc.max(p.abs()));
        assert!(max_abs(layer.pressure_field()) < 1e-2 * interface);
        assert!(max_abs(rigid.pressure_field()) > 0.1 * interface);
    }
}
