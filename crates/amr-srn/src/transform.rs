//! Learned affine placement of the sub-grids
//!
//! Each sub-grid carries a per-axis scale and translation. The homogeneous
//! matrices are derived from them on every call and never stored, so the
//! optimizer only ever moves a diagonal-plus-offset parameterization.

use amr_core::{AmrError, Result};
use burn::module::Param;
use burn::prelude::*;
use burn::tensor::Distribution;

/// Per-grid scale and translation parameters
#[derive(Module, Debug)]
pub struct GridTransformBank<B: Backend> {
    /// `[n_grids, n_dims]`
    scales: Param<Tensor<B, 2>>,
    /// `[n_grids, n_dims]`
    translations: Param<Tensor<B, 2>>,
}

impl<B: Backend> GridTransformBank<B> {
    /// Create a bank with random placements
    ///
    /// Scales are drawn uniformly from `[scale_min, scale_max]`; translations
    /// from `[-1, 1]` multiplied by `scale - 1`, which keeps every initial
    /// sub-grid inside the normalized domain.
    pub fn new(
        n_grids: usize,
        n_dims: usize,
        scale_min: f32,
        scale_max: f32,
        device: &B::Device,
    ) -> Self {
        let scales = if scale_min < scale_max {
            Tensor::random(
                [n_grids, n_dims],
                Distribution::Uniform(scale_min as f64, scale_max as f64),
                device,
            )
        } else {
            Tensor::full([n_grids, n_dims], scale_min, device)
        };
        let translations =
            Tensor::random([n_grids, n_dims], Distribution::Uniform(-1.0, 1.0), device)
                * (scales.clone() - 1.0);

        Self {
            scales: Param::from_tensor(scales),
            translations: Param::from_tensor(translations),
        }
    }

    /// Create a bank from explicit parameters
    pub fn from_parameters(scales: Tensor<B, 2>, translations: Tensor<B, 2>) -> Result<Self> {
        let expected = scales.dims();
        let got = translations.dims();
        if expected != got {
            return Err(AmrError::ShapeMismatch {
                name: "grid_translations".to_string(),
                expected: expected.to_vec(),
                got: got.to_vec(),
            });
        }

        Ok(Self {
            scales: Param::from_tensor(scales),
            translations: Param::from_tensor(translations),
        })
    }

    /// Homogeneous transforms `[n_grids, n_dims + 1, n_dims + 1]`
    ///
    /// Scale sits on the diagonal, translation in the last column and the
    /// bottom row is `[0, ..., 0, 1]`. Applied to a homogeneous global point
    /// the matrix yields the point in the grid's local `[-1, 1]` frame.
    pub fn compute_transforms(&self) -> Tensor<B, 3> {
        let scales = self.scales.val();
        let translations = self.translations.val();
        let [n_grids, n_dims] = scales.dims();
        let size = n_dims + 1;
        let device = scales.device();

        let diagonal = Tensor::cat(vec![scales, Tensor::ones([n_grids, 1], &device)], 1);
        let column = Tensor::cat(vec![translations, Tensor::zeros([n_grids, 1], &device)], 1);

        let identity = Tensor::<B, 2>::from_data(
            TensorData::new(
                (0..size * size)
                    .map(|i| if i / size == i % size { 1.0f32 } else { 0.0 })
                    .collect::<Vec<_>>(),
                [size, size],
            ),
            &device,
        );
        let last_column = Tensor::<B, 1>::from_data(
            TensorData::new(
                (0..size)
                    .map(|i| if i == n_dims { 1.0f32 } else { 0.0 })
                    .collect::<Vec<_>>(),
                [size],
            ),
            &device,
        );

        diagonal.unsqueeze_dim::<3>(2) * identity.unsqueeze::<3>()
            + column.unsqueeze_dim::<3>(2) * last_column.unsqueeze::<3>()
    }

    /// Current scales `[n_grids, n_dims]`
    pub fn scales(&self) -> Tensor<B, 2> {
        self.scales.val()
    }

    /// Current translations `[n_grids, n_dims]`
    pub fn translations(&self) -> Tensor<B, 2> {
        self.translations.val()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_random_initialization_bounds() {
        let device = Default::default();
        let bank = GridTransformBank::<TestBackend>::new(64, 3, 1.0, 4.0, &device);

        let scales = bank.scales().into_data().to_vec::<f32>().unwrap();
        let translations = bank.translations().into_data().to_vec::<f32>().unwrap();

        assert_eq!(scales.len(), 64 * 3);
        for (scale, translation) in scales.iter().zip(&translations) {
            assert!((1.0..=4.0).contains(scale));
            assert!(translation.abs() <= scale - 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_fixed_scale_initialization() {
        let device = Default::default();
        let bank = GridTransformBank::<TestBackend>::new(2, 2, 1.0, 1.0, &device);

        let scales = bank.scales().into_data().to_vec::<f32>().unwrap();
        let translations = bank.translations().into_data().to_vec::<f32>().unwrap();
        assert!(scales.iter().all(|&s| s == 1.0));
        assert!(translations.iter().all(|&t| t == 0.0));
    }

    #[test]
    fn test_transform_matrix_layout() {
        let device = Default::default();
        let bank = GridTransformBank::<TestBackend>::from_parameters(
            Tensor::from_floats([[2.0, 2.0, 2.0], [1.0, 3.0, 0.5]], &device),
            Tensor::from_floats([[0.5, 0.0, 0.0], [-0.25, 0.75, 0.1]], &device),
        )
        .unwrap();

        let matrices = bank.compute_transforms();
        assert_eq!(matrices.dims(), [2, 4, 4]);

        let values = matrices.into_data().to_vec::<f32>().unwrap();
        #[rustfmt::skip]
        let expected = [
            2.0, 0.0, 0.0, 0.5,
            0.0, 2.0, 0.0, 0.0,
            0.0, 0.0, 2.0, 0.0,
            0.0, 0.0, 0.0, 1.0,

            1.0, 0.0, 0.0, -0.25,
            0.0, 3.0, 0.0, 0.75,
            0.0, 0.0, 0.5, 0.1,
            0.0, 0.0, 0.0, 1.0,
        ];
        assert_eq!(values, expected);
    }

    #[test]
    fn test_planar_transform() {
        let device = Default::default();
        let bank = GridTransformBank::<TestBackend>::from_parameters(
            Tensor::from_floats([[1.5, 0.5]], &device),
            Tensor::from_floats([[0.2, -0.4]], &device),
        )
        .unwrap();

        let values = bank.compute_transforms().into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, [1.5, 0.0, 0.2, 0.0, 0.5, -0.4, 0.0, 0.0, 1.0]);
        assert_eq!(bank.scales().dims(), [1, 2]);
    }

    #[test]
    fn test_mismatched_parameters() {
        let device = Default::default();
        let result = GridTransformBank::<TestBackend>::from_parameters(
            Tensor::ones([2, 3], &device),
            Tensor::zeros([3, 3], &device),
        );
        assert!(matches!(result, Err(AmrError::ShapeMismatch { .. })));
    }
}
