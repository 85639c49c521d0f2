//! Core value types for adaptive multi-grid models

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AmrError;

/// Spatial resolution of one sub-grid, outermost tensor axis first
///
/// For a volume this is `[depth, height, width]`, matching the layout of the
/// feature tensors `[n_grids, n_features, depth, height, width]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape(Vec<usize>);

impl GridShape {
    /// Create from explicit axis sizes
    pub fn new(dims: Vec<usize>) -> Result<Self, AmrError> {
        let spec = dims
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",");
        if dims.is_empty() {
            return Err(AmrError::InvalidGridShape {
                spec,
                reason: "no axes given".to_string(),
            });
        }
        if let Some(axis) = dims.iter().position(|&d| d < 2) {
            return Err(AmrError::InvalidGridShape {
                spec,
                reason: format!("axis {axis} needs at least 2 samples"),
            });
        }
        Ok(Self(dims))
    }

    /// Axis sizes, outermost first
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of spatial axes
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Number of samples stored per channel
    pub fn num_points(&self) -> usize {
        self.0.iter().product()
    }

    /// Resolution along coordinate axis `axis` (0 = x)
    ///
    /// Coordinate axes run opposite to tensor axes: x indexes the innermost
    /// (fastest varying) tensor axis.
    pub fn axis_resolution(&self, axis: usize) -> usize {
        self.0[self.0.len() - 1 - axis]
    }

    /// Row-major stride of coordinate axis `axis` in a flattened grid
    pub fn axis_stride(&self, axis: usize) -> usize {
        let tensor_axis = self.0.len() - 1 - axis;
        self.0[tensor_axis + 1..].iter().product()
    }
}

impl FromStr for GridShape {
    type Err = AmrError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let dims = spec
            .split(',')
            .map(|entry| {
                entry
                    .trim()
                    .parse::<usize>()
                    .map_err(|err| AmrError::InvalidGridShape {
                        spec: spec.to_string(),
                        reason: format!("{entry:?}: {err}"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(dims).map_err(|err| match err {
            AmrError::InvalidGridShape { reason, .. } => AmrError::InvalidGridShape {
                spec: spec.to_string(),
                reason,
            },
            other => other,
        })
    }
}

impl std::fmt::Display for GridShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Sub-region of a larger field that a model was trained on
///
/// Maps a normalized coordinate `x` in `[-1, 1]` to
/// `(x + 1) / 2 * proportions + start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalRegion {
    /// Offset of the region, per coordinate axis
    pub start: Vec<f32>,
    /// Fraction of the global extent covered, per coordinate axis
    pub proportions: Vec<f32>,
}

/// Global-coordinate bounding box of one sub-grid's placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementBounds {
    /// Sub-grid index
    pub grid: usize,
    /// Smallest corner, per coordinate axis
    pub min: Vec<f32>,
    /// Largest corner, per coordinate axis
    pub max: Vec<f32>,
}

impl PlacementBounds {
    /// Check if a global point lies inside the box (inclusive)
    pub fn contains(&self, point: &[f32]) -> bool {
        point
            .iter()
            .zip(self.min.iter().zip(&self.max))
            .all(|(&x, (&lo, &hi))| x >= lo && x <= hi)
    }
}
