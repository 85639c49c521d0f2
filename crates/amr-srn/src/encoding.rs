//! Sinusoidal positional encoding
//!
//! Frequency `l` multiplies every coordinate by `2^l π`. Within one frequency
//! the first `D` slots take the sine of each axis and the next `D` the cosine,
//! so for `D = 3`:
//!
//! ```text
//! [sin fx, sin fy, sin fz, cos fx, cos fy, cos fz] × L frequencies
//! ```

use burn::prelude::*;

/// Stateless positional encoder
#[derive(Module, Clone, Debug)]
pub struct PositionalEncoder {
    n_terms: usize,
    n_dims: usize,
}

impl PositionalEncoder {
    pub fn new(n_terms: usize, n_dims: usize) -> Self {
        Self { n_terms, n_dims }
    }

    /// Width of the encoding, `2 * L * D`
    pub fn output_width(&self) -> usize {
        2 * self.n_terms * self.n_dims
    }

    /// Encode `[..., D]` coordinates into `[..., 2 * L * D]`
    pub fn forward<B: Backend, const R: usize>(&self, coords: Tensor<B, R>) -> Tensor<B, R> {
        let device = coords.device();
        let (frequencies, sine_mask) = self.tables();

        let frequencies =
            Tensor::<B, 1>::from_floats(frequencies.as_slice(), &device).unsqueeze::<R>();
        let sine_mask = Tensor::<B, 1>::from_floats(sine_mask.as_slice(), &device).unsqueeze::<R>();

        let phase = coords.repeat_dim(R - 1, 2 * self.n_terms) * frequencies;
        phase.clone().sin() * sine_mask.clone() + phase.cos() * (sine_mask.neg() + 1.0)
    }

    /// Per-slot frequency and sine (1) / cosine (0) selector
    fn tables(&self) -> (Vec<f32>, Vec<f32>) {
        let period = 2 * self.n_dims;
        (0..self.output_width())
            .map(|slot| {
                let frequency = 2.0f32.powi((slot / period) as i32) * std::f32::consts::PI;
                let sine = if slot % period < self.n_dims { 1.0 } else { 0.0 };
                (frequency, sine)
            })
            .unzip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use std::f32::consts::PI;

    type TestBackend = NdArray;

    #[test]
    fn test_output_width() {
        let device = Default::default();
        let encoder = PositionalEncoder::new(4, 3);

        let coords = Tensor::<TestBackend, 2>::zeros([7, 3], &device);
        assert_eq!(encoder.forward(coords).dims(), [7, 24]);
        assert_eq!(encoder.output_width(), 24);
    }

    #[test]
    fn test_slot_layout_volume() {
        let device = Default::default();
        let encoder = PositionalEncoder::new(2, 3);

        let coords = Tensor::<TestBackend, 2>::from_floats([[0.25, 0.0, 0.5]], &device);
        let encoded = encoder.forward(coords).into_data().to_vec::<f32>().unwrap();

        let expected = [
            (PI * 0.25).sin(),
            0.0,
            (PI * 0.5).sin(),
            (PI * 0.25).cos(),
            1.0,
            (PI * 0.5).cos(),
            (2.0 * PI * 0.25).sin(),
            0.0,
            (2.0 * PI * 0.5).sin(),
            (2.0 * PI * 0.25).cos(),
            1.0,
            (2.0 * PI * 0.5).cos(),
        ];
        for (got, want) in encoded.iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "got {got}, want {want}");
        }
    }

    #[test]
    fn test_slot_layout_planar() {
        let device = Default::default();
        let encoder = PositionalEncoder::new(1, 2);

        let coords = Tensor::<TestBackend, 2>::from_floats([[0.5, -0.5]], &device);
        let encoded = encoder.forward(coords).into_data().to_vec::<f32>().unwrap();

        assert!((encoded[0] - 1.0).abs() < 1e-6);
        assert!((encoded[1] + 1.0).abs() < 1e-6);
        assert!(encoded[2].abs() < 1e-6);
        assert!(encoded[3].abs() < 1e-6);
    }

    #[test]
    fn test_deterministic_and_bounded() {
        let device = Default::default();
        let encoder = PositionalEncoder::new(6, 3);
        let coords =
            Tensor::<TestBackend, 2>::random([32, 3], Distribution::Uniform(-1.0, 1.0), &device);

        let first = encoder.forward(coords.clone()).into_data().to_vec::<f32>().unwrap();
        let second = encoder.forward(coords).into_data().to_vec::<f32>().unwrap();

        assert_eq!(first, second);
        assert!(first.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_higher_rank_input() {
        let device = Default::default();
        let encoder = PositionalEncoder::new(3, 2);

        let coords = Tensor::<TestBackend, 3>::zeros([4, 5, 2], &device);
        assert_eq!(encoder.forward(coords).dims(), [4, 5, 12]);
    }
}
