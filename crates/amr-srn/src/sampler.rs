//! Multi-grid feature sampling
//!
//! Pure functions over the transform bank output, the feature tensors and a
//! coordinate batch:
//!
//! ```text
//! coords [B, D] → homogeneous [N, B, D+1] → × Mᵀ → local [N, B, D]
//!              → multi-linear gather per grid → [N, F, B] → [B, N*F]
//! ```
//!
//! Feature tensors are stored flattened as `[N, F, P]` with `P` the row-major
//! product of the grid shape. Sampling is edge aligned: the first and last
//! stored sample of an axis sit exactly at local `-1` and `1`. A point outside
//! `[-1, 1]` on any local axis gets an all-zero feature vector from that grid.

use amr_core::GridShape;
use burn::prelude::*;

/// Map global coordinates into every sub-grid's local frame
///
/// # Arguments
/// * `transforms` - `[N, D+1, D+1]` homogeneous matrices
/// * `coords` - `[B, D]` global coordinates
///
/// Returns `[N, B, D]`.
pub fn to_local<B: Backend>(transforms: Tensor<B, 3>, coords: Tensor<B, 2>) -> Tensor<B, 3> {
    let n_grids = transforms.dims()[0];
    let [batch, n_dims] = coords.dims();
    let device = coords.device();

    let homogeneous = Tensor::cat(vec![coords, Tensor::ones([batch, 1], &device)], 1);
    let points = homogeneous.unsqueeze::<3>().repeat_dim(0, n_grids);

    points.matmul(transforms.swap_dims(1, 2)).narrow(2, 0, n_dims)
}

/// Multi-linear interpolation of each grid at its own local coordinates
///
/// # Arguments
/// * `grids` - `[N, F, P]` flattened feature tensors
/// * `local` - `[N, B, D]` local coordinates, as produced by [`to_local`]
///
/// Returns `[N, F, B]`.
pub fn interpolate<B: Backend>(
    grids: Tensor<B, 3>,
    shape: &GridShape,
    local: Tensor<B, 3>,
) -> Tensor<B, 3> {
    let [n_grids, n_features, _] = grids.dims();
    let [_, batch, n_dims] = local.dims();
    let device = local.device();

    let mut offsets: Vec<Tensor<B, 2, Int>> = Vec::with_capacity(n_dims);
    let mut fractions: Vec<Tensor<B, 2>> = Vec::with_capacity(n_dims);
    let mut inside = Tensor::<B, 2>::ones([n_grids, batch], &device);

    for axis in 0..n_dims {
        let coord = local.clone().narrow(2, axis, 1).squeeze::<2>(2);
        let resolution = shape.axis_resolution(axis);

        inside = inside * coord.clone().abs().lower_equal_elem(1.0).float();

        // NaN and infinite coordinates are already masked out; keep them finite
        // so the cell cast and the corner weights stay defined
        let coord = coord
            .clone()
            .mask_fill(coord.is_nan(), 2.0)
            .clamp(-2.0, 2.0);

        // -1 → 0, 1 → resolution - 1
        let position = (coord + 1.0) * ((resolution - 1) as f32 / 2.0);
        let cell = position
            .clone()
            .clamp(0.0, (resolution - 2) as f32)
            .int();

        fractions.push(position - cell.clone().float());
        offsets.push(cell.mul_scalar(shape.axis_stride(axis) as i64));
    }

    let mut output = Tensor::<B, 3>::zeros([n_grids, n_features, batch], &device);
    for corner in 0..(1usize << n_dims) {
        let mut index = Tensor::<B, 2, Int>::zeros([n_grids, batch], &device);
        let mut weight = inside.clone();

        for axis in 0..n_dims {
            let fraction = fractions[axis].clone();
            if (corner >> axis) & 1 == 1 {
                index = index + offsets[axis].clone().add_scalar(shape.axis_stride(axis) as i64);
                weight = weight * fraction;
            } else {
                index = index + offsets[axis].clone();
                weight = weight * (fraction.neg() + 1.0);
            }
        }

        let index = index.unsqueeze_dim::<3>(1).repeat_dim(1, n_features);
        let values = grids.clone().gather(2, index);
        output = output + values * weight.unsqueeze_dim::<3>(1);
    }

    output
}

/// Flatten per-grid features `[N, F, B]` into `[B, N*F]`, grid-major
pub fn aggregate<B: Backend>(features: Tensor<B, 3>) -> Tensor<B, 2> {
    let [n_grids, n_features, batch] = features.dims();
    features
        .reshape([n_grids * n_features, batch])
        .transpose()
}

/// Transform, sample and aggregate in one call
///
/// Returns `[B, N*F]`; the features of grid `i` occupy columns
/// `i*F .. (i+1)*F`.
pub fn sample_features<B: Backend>(
    grids: Tensor<B, 3>,
    shape: &GridShape,
    transforms: Tensor<B, 3>,
    coords: Tensor<B, 2>,
) -> Tensor<B, 2> {
    let local = to_local(transforms, coords);
    aggregate(interpolate(grids, shape, local))
}
