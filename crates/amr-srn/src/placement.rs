//! Where the sub-grids sit in the global domain
//!
//! The forward path only needs global → local transforms. Reporting placement
//! goes the other way, `global = (local - translation) / scale`, which is
//! undefined once a scale collapses to zero, so every entry point here checks
//! the scales first.

use amr_core::{AmrError, GridShape, PlacementBounds, Result};
use burn::prelude::*;
use tracing::warn;

use crate::checkpoint::StoredTensor;
use crate::AmrSrn;

/// Scales closer to zero than this cannot be inverted
const MIN_SCALE_MAGNITUDE: f32 = 1e-8;

/// Edge-aligned lattice over `[-1, 1]^D`, one row per grid sample
///
/// Rows follow the row-major order of a grid tensor with this shape, so
/// coordinate axis 0 (x) varies fastest. Returns `[P, D]`.
pub fn make_coord_grid<B: Backend>(shape: &GridShape, device: &B::Device) -> Tensor<B, 2> {
    let rank = shape.rank();
    let total = shape.num_points();

    let mut data = Vec::with_capacity(total * rank);
    for flat in 0..total {
        for axis in 0..rank {
            let resolution = shape.axis_resolution(axis);
            let index = (flat / shape.axis_stride(axis)) % resolution;
            data.push(-1.0 + 2.0 * index as f32 / (resolution - 1) as f32);
        }
    }

    Tensor::from_data(TensorData::new(data, [total, rank]), device)
}

impl<B: Backend> AmrSrn<B> {
    /// Every sub-grid's sample lattice in global coordinates, `[N, P, D]`
    pub fn grid_placements(&self) -> Result<Tensor<B, 3>> {
        self.checked_scales()?;

        let local = make_coord_grid::<B>(&self.grid_shape, &self.device()).unsqueeze::<3>();
        let scales = self.grid_scales().unsqueeze_dim::<3>(1);
        let translations = self.grid_translations().unsqueeze_dim::<3>(1);

        Ok((local - translations) / scales)
    }

    /// Global bounding box of each sub-grid
    pub fn placement_bounds(&self) -> Result<Vec<PlacementBounds>> {
        let scales = self.checked_scales()?;
        let translations = StoredTensor::from_tensor(self.grid_translations())?.data;
        let n_dims = self.config.n_dims;

        Ok(scales
            .chunks(n_dims)
            .zip(translations.chunks(n_dims))
            .enumerate()
            .map(|(grid, (scale, translation))| {
                let (min, max) = scale
                    .iter()
                    .zip(translation)
                    .map(|(&s, &t)| {
                        let low = (-1.0 - t) / s;
                        let high = (1.0 - t) / s;
                        (low.min(high), low.max(high))
                    })
                    .unzip();
                PlacementBounds { grid, min, max }
            })
            .collect())
    }

    /// Host copy of the scales, rejecting any that cannot be inverted
    fn checked_scales(&self) -> Result<Vec<f32>> {
        let scales = StoredTensor::from_tensor(self.grid_scales())?.data;

        let n_dims = self.config.n_dims;
        if let Some(position) = scales
            .iter()
            .position(|s| !(s.abs() >= MIN_SCALE_MAGNITUDE))
        {
            let (grid, axis) = (position / n_dims, position % n_dims);
            let scale = scales[position];
            warn!(grid, axis, scale, "sub-grid scale cannot be inverted");
            return Err(AmrError::DegenerateScale { grid, axis, scale });
        }

        Ok(scales)
    }
}
