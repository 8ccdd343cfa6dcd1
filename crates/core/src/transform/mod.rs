//! Separable 3D discrete cosine transforms used by spectral partitions.
//!
//! The forward transform is an unnormalised DCT-II along each axis
//! (`X_k = 2·Σ x_j cos(π(j+½)k/n)`), the inverse an unnormalised DCT-III
//! (`x_j = X_0 + 2·Σ_{k≥1} X_k cos(πk(j+½)/n)`). A forward/inverse round trip
//! multiplies every value by `8·N`; callers apply their own normalisation.

use std::{f64::consts::PI, fmt, sync::Arc};

use realfft::{
    num_complex::{Complex, Complex64},
    ComplexToReal, RealFftPlanner, RealToComplex,
};
use serde::{Deserialize, Serialize};

use crate::{grid::Axis, grid::GridShape, ArdError, Result};

/// Capability required by spectral volumes: DCT a grid of a known shape.
pub trait TransformEngine: Send + Sync {
    /// Shape of the buffers this engine was planned for.
    fn shape(&self) -> GridShape;

    /// Value space to mode space (DCT-II along x, y and z).
    fn forward(&self, input: &[f64], output: &mut [f64]) -> Result<()>;

    /// Mode space to value space (DCT-III along x, y and z).
    fn inverse(&self, input: &[f64], output: &mut [f64]) -> Result<()>;
}

/// Selects the strategy spectral partitions use for their transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformBackend {
    /// Real FFT based transform, `O(n log n)` per line.
    #[default]
    Fft,
    /// Direct summation against cosine tables, `O(n²)` per line.
    Direct,
}

impl TransformBackend {
    /// Plans an engine for `shape`. Empty shapes are rejected.
    pub fn build(self, shape: GridShape) -> Result<Box<dyn TransformEngine>> {
        if shape.is_empty() {
            return Err(ArdError::dimensions(
                shape.width as i64,
                shape.height as i64,
                shape.depth as i64,
                "cannot plan a transform for an empty grid",
            ));
        }

        let engine: Box<dyn TransformEngine> = match self {
            TransformBackend::Fft => {
                let mut planner = RealFftPlanner::<f64>::new();
                Box::new(SeparableDct::new(shape, |len| {
                    FftLine::new(&mut planner, len)
                }))
            }
            TransformBackend::Direct => Box::new(SeparableDct::new(shape, DirectLine::new)),
        };
        Ok(engine)
    }
}

/// Working buffers reused for every line of one axis pass.
struct LineWork {
    line: Vec<f64>,
    real: Vec<f64>,
    spectrum: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

/// A 1D transform of a fixed length.
trait LineDct: Send + Sync {
    fn len(&self) -> usize;
    fn work(&self) -> LineWork;
    fn forward_line(&self, work: &mut LineWork) -> Result<()>;
    fn inverse_line(&self, work: &mut LineWork) -> Result<()>;
}

/// Applies a 1D transform along x, then y, then z.
struct SeparableDct<L> {
    shape: GridShape,
    lines: [L; 3],
}

impl<L: LineDct> SeparableDct<L> {
    fn new(shape: GridShape, mut plan: impl FnMut(usize) -> L) -> Self {
        let lines = [
            plan(shape.width),
            plan(shape.height),
            plan(shape.depth),
        ];
        Self { shape, lines }
    }

    fn run(&self, input: &[f64], output: &mut [f64], inverse: bool) -> Result<()> {
        let total = self.shape.len();
        if input.len() != total || output.len() != total {
            return Err(ArdError::dimensions(
                input.len() as i64,
                output.len() as i64,
                total as i64,
                "transform buffers do not match the planned grid",
            ));
        }

        output.copy_from_slice(input);
        for axis in Axis::ALL {
            self.pass(axis, output, inverse)?;
        }
        Ok(())
    }

    fn pass(&self, axis: Axis, data: &mut [f64], inverse: bool) -> Result<()> {
        let shape = self.shape;
        let line = &self.lines[axis.index()];
        let len = line.len();
        if len == 1 && !inverse {
            // A length-one DCT-II only doubles the value.
            data.iter_mut().for_each(|value| *value *= 2.0);
            return Ok(());
        }
        if len == 1 {
            return Ok(());
        }

        let stride = match axis {
            Axis::X => 1,
            Axis::Y => shape.width,
            Axis::Z => shape.plane_len(),
        };
        let mut work = line.work();

        for start in line_starts(shape, axis) {
            for (i, slot) in work.line.iter_mut().enumerate() {
                *slot = data[start + i * stride];
            }
            if inverse {
                line.inverse_line(&mut work)?;
            } else {
                line.forward_line(&mut work)?;
            }
            for (i, value) in work.line.iter().enumerate() {
                data[start + i * stride] = *value;
            }
        }
        Ok(())
    }
}

impl<L: LineDct> TransformEngine for SeparableDct<L> {
    fn shape(&self) -> GridShape {
        self.shape
    }

    fn forward(&self, input: &[f64], output: &mut [f64]) -> Result<()> {
        self.run(input, output, false)
    }

    fn inverse(&self, input: &[f64], output: &mut [f64]) -> Result<()> {
        self.run(input, output, true)
    }
}

impl<L> fmt::Debug for SeparableDct<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeparableDct")
            .field("shape", &self.shape)
            .finish()
    }
}

/// Offsets of the first cell of every line running along `axis`.
fn line_starts(shape: GridShape, axis: Axis) -> Vec<usize> {
    let GridShape {
        width,
        height,
        depth,
    } = shape;
    let mut starts = Vec::with_capacity(shape.len() / shape.extent(axis).max(1));
    match axis {
        Axis::X => {
            for z in 0..depth {
                for y in 0..height {
                    starts.push(shape.index(0, y, z));
                }
            }
        }
        Axis::Y => {
            for z in 0..depth {
                for x in 0..width {
                    starts.push(shape.index(x, 0, z));
                }
            }
        }
        Axis::Z => {
            for y in 0..height {
                for x in 0..width {
                    starts.push(shape.index(x, y, 0));
                }
            }
        }
    }
    starts
}

/// DCT via a half-length-spectrum real FFT of the even/odd reordered line.
struct FftLine {
    len: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    /// `e^{-iπk/(2n)}` for every bin.
    twiddles: Vec<Complex64>,
}

impl FftLine {
    fn new(planner: &mut RealFftPlanner<f64>, len: usize) -> Self {
        let twiddles = (0..len)
            .map(|k| Complex::from_polar(1.0, -PI * k as f64 / (2.0 * len as f64)))
            .collect();
        Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
            twiddles,
        }
    }
}

impl LineDct for FftLine {
    fn len(&self) -> usize {
        self.len
    }

    fn work(&self) -> LineWork {
        let scratch_len = self
            .forward
            .get_scratch_len()
            .max(self.inverse.get_scratch_len());
        LineWork {
            line: vec![0.0; self.len],
            real: self.forward.make_input_vec(),
            spectrum: self.forward.make_output_vec(),
            scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
        }
    }

    fn forward_line(&self, work: &mut LineWork) -> Result<()> {
        let n = self.len;
        for (j, value) in work.line.iter().enumerate() {
            let slot = if j % 2 == 0 { j / 2 } else { n - 1 - j / 2 };
            work.real[slot] = *value;
        }

        let scratch_len = self.forward.get_scratch_len();
        self.forward.process_with_scratch(
            &mut work.real,
            &mut work.spectrum,
            &mut work.scratch[..scratch_len],
        )?;

        for (k, out) in work.line.iter_mut().enumerate() {
            let bin = if k <= n / 2 {
                work.spectrum[k]
            } else {
                work.spectrum[n - k].conj()
            };
            *out = 2.0 * (self.twiddles[k] * bin).re;
        }
        Ok(())
    }

    fn inverse_line(&self, work: &mut LineWork) -> Result<()> {
        let n = self.len;
        for (k, bin) in work.spectrum.iter_mut().enumerate() {
            let mirrored = if k == 0 { 0.0 } else { work.line[n - k] };
            *bin = 0.5 * self.twiddles[k].conj() * Complex64::new(work.line[k], -mirrored);
        }
        // The DC bin (and Nyquist for even lengths) of a real signal is real.
        work.spectrum[0].im = 0.0;
        if n % 2 == 0 {
            work.spectrum[n / 2].im = 0.0;
        }

        let scratch_len = self.inverse.get_scratch_len();
        self.inverse.process_with_scratch(
            &mut work.spectrum,
            &mut work.real,
            &mut work.scratch[..scratch_len],
        )?;

        for (j, out) in work.line.iter_mut().enumerate() {
            let slot = if j % 2 == 0 { j / 2 } else { n - 1 - j / 2 };
            *out = 2.0 * work.real[slot];
        }
        Ok(())
    }
}

/// Reference DCT evaluated against a precomputed cosine table.
struct DirectLine {
    len: usize,
    /// `cos(π(j+½)k/n)` stored at `k * n + j`.
    table: Vec<f64>,
}

impl DirectLine {
    fn new(len: usize) -> Self {
        let n = len as f64;
        let mut table = Vec::with_capacity(len * len);
        for k in 0..len {
            for j in 0..len {
                table.push((PI * (j as f64 + 0.5) * k as f64 / n).cos());
            }
        }
        Self { len, table }
    }
}

impl LineDct for DirectLine {
    fn len(&self) -> usize {
        self.len
    }

    fn work(&self) -> LineWork {
        LineWork {
            line: vec![0.0; self.len],
            real: vec![0.0; self.len],
            spectrum: Vec::new(),
            scratch: Vec::new(),
        }
    }

    fn forward_line(&self, work: &mut LineWork) -> Result<()> {
        let n = self.len;
        for k in 0..n {
            let row = &self.table[k * n..(k + 1) * n];
            work.real[k] = 2.0 * row.iter().zip(&work.line).map(|(c, x)| c * x).sum::<f64>();
        }
        work.line.copy_from_slice(&work.real);
        Ok(())
    }

    fn inverse_line(&self, work: &mut LineWork) -> Result<()> {
        let n = self.len;
        for j in 0..n {
            let mut sum = work.line[0];
            for k in 1..n {
                sum += 2.0 * work.line[k] * self.table[k * n + j];
            }
            work.real[j] = sum;
        }
        work.line.copy_from_slice(&work.real);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_field(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (i as f64 * 1.37 + 0.2).sin() + 0.25 * (i as f64 * 0.41).cos())
            .collect()
    }

    fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn one_dimensional_forward_matches_definition() {
        for len in [1, 2, 3, 4, 5, 7, 8] {
            let shape = GridShape::new(len, 1, 1);
            let engine = TransformBackend::Fft.build(shape).unwrap();
            let input = sample_field(len);
            let mut output = vec![0.0; len];
            engine.forward(&input, &mut output).unwrap();

            for (k, value) in output.iter().enumerate() {
                let expected: f64 = 2.0
                    * input
                        .iter()
                        .enumerate()
                        .map(|(j, x)| x * (PI * (j as f64 + 0.5) * k as f64 / len as f64).cos())
                        .sum::<f64>();
                assert!(
                    (value - expected).abs() < 1e-9,
                    "len {len} bin {k}: {value} vs {expected}"
                );
            }
        }
    }

    #[test]
    fn fft_and_direct_backends_agree() {
        let shape = GridShape::new(6, 5, 4);
        let fft = TransformBackend::Fft.build(shape).unwrap();
        let direct = TransformBackend::Direct.build(shape).unwrap();
        let input = sample_field(shape.len());

        let mut a = vec![0.0; shape.len()];
        let mut b = vec![0.0; shape.len()];
        fft.forward(&input, &mut a).unwrap();
        direct.forward(&input, &mut b).unwrap();
        assert!(max_abs_diff(&a, &b) < 1e-9);

        fft.inverse(&input, &mut a).unwrap();
        direct.inverse(&input, &mut b).unwrap();
        assert!(max_abs_diff(&a, &b) < 1e-9);
    }

    #[test]
    fn round_trip_scales_by_eight_n() {
        let shape = GridShape::new(4, 3, 5);
        let engine = TransformBackend::Fft.build(shape).unwrap();
        let input = sample_field(shape.len());
        let mut modes = vec![0.0; shape.len()];
        let mut values = vec![0.0; shape.len()];
        engine.forward(&input, &mut modes).unwrap();
        engine.inverse(&modes, &mut values).unwrap();

        let scale = 8.0 * shape.len() as f64;
        let restored: Vec<f64> = values.iter().map(|v| v / scale).collect();
        assert!(max_abs_diff(&restored, &input) < 1e-12);
    }

    #[test]
    fn rejects_mismatched_buffers() {
        let engine = TransformBackend::Direct
            .build(GridShape::new(2, 2, 2))
            .unwrap();
        let mut output = vec![0.0; 8];
        assert!(engine.forward(&[0.0; 7], &mut output).is_err());
    }

    #[test]
    fn rejects_empty_shapes() {
        assert!(TransformBackend::Fft.build(GridShape::new(0, 2, 2)).is_err());
    }
}
