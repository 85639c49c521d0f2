//! Dense reconstruction of the learned field

use amr_core::{AmrError, GridShape, Result};
use burn::prelude::*;
use tracing::debug;

use crate::placement::make_coord_grid;
use crate::AmrSrn;

/// Evaluate the model on an edge-aligned lattice of `shape`
///
/// Points are processed in chunks of at most `max_points` rows to bound the
/// memory of a single forward call. Rows of the result follow
/// [`make_coord_grid`] order. Returns `[P, n_outputs]`.
pub fn sample_grid<B: Backend>(
    model: &AmrSrn<B>,
    shape: &GridShape,
    max_points: usize,
) -> Result<Tensor<B, 2>> {
    if max_points == 0 {
        return Err(AmrError::Config("max_points must be positive".to_string()));
    }
    let n_dims = model.config().n_dims;
    if shape.rank() != n_dims {
        return Err(AmrError::InvalidDimension {
            expected: n_dims,
            got: shape.rank(),
        });
    }

    let points = make_coord_grid::<B>(shape, &model.device());
    let total = shape.num_points();

    let mut chunks = Vec::with_capacity(total.div_ceil(max_points));
    let mut start = 0;
    while start < total {
        let length = max_points.min(total - start);
        chunks.push(model.forward(points.clone().narrow(0, start, length))?);
        start += length;
    }

    debug!(shape = %shape, chunks = chunks.len(), "sampled dense grid");
    Ok(Tensor::cat(chunks, 0))
}
