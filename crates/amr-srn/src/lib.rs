//! Adaptive multi-grid scene representation network
//!
//! A neural approximation of a volumetric field. Instead of one dense feature
//! grid, the model holds `N` small feature grids, each with its own learned
//! scale and translation, so training can move and stretch capacity towards
//! the complicated parts of the domain.
//!
//! # Architecture
//!
//! ```text
//! coords ─┬─ Transform Bank → local coords → multi-linear sample → features [B, N*F]
//!         │                                                          │
//!         └─ Positional Encoder ── encoded ── Decoder (features re-injected per layer)
//!                                                     ↓
//!                                              values [B, n_outputs]
//! ```
//!
//! All learned tensors are burn parameters, so running the model on an
//! `Autodiff` backend yields gradients for grid placement, grid content and
//! decoder weights alike.

use amr_core::{AmrConfig, AmrError, GlobalRegion, GridShape, Result};
use burn::module::{Ignored, Param};
use burn::prelude::*;
use burn::tensor::Distribution;
use tracing::{debug, trace};

pub mod checkpoint;
pub mod encoding;
pub mod network;
pub mod placement;
pub mod reconstruction;
pub mod sampler;
pub mod transform;

pub use checkpoint::{ModelCheckpoint, StoredTensor};
pub use encoding::PositionalEncoder;
pub use network::{Decoder, DecoderLayer, SnakeLayer};
pub use placement::make_coord_grid;
pub use reconstruction::sample_grid;
pub use transform::GridTransformBank;

/// Adaptive multi-grid network
#[derive(Module, Debug)]
pub struct AmrSrn<B: Backend> {
    /// Learned placement of every sub-grid
    transforms: GridTransformBank<B>,
    /// `[n_grids, n_features, P]`, P = product of the grid shape
    feature_grids: Param<Tensor<B, 3>>,
    encoder: PositionalEncoder,
    decoder: Decoder<B>,
    config: Ignored<AmrConfig>,
    grid_shape: Ignored<GridShape>,
    region: Ignored<Option<GlobalRegion>>,
}

impl<B: Backend> AmrSrn<B> {
    /// Create a model with freshly initialized parameters
    ///
    /// Fails with a configuration error if any hyperparameter is missing or
    /// out of range.
    pub fn new(config: &AmrConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let grid_shape = config.grid_shape()?;
        let region = config.global_region()?;

        let transforms = GridTransformBank::new(
            config.n_grids,
            config.n_dims,
            config.scale_init_min,
            config.scale_init_max,
            device,
        );
        let feature_grids = Tensor::random(
            [config.n_grids, config.n_features, grid_shape.num_points()],
            Distribution::Normal(0.0, 1.0),
            device,
        );
        let encoder = PositionalEncoder::new(config.num_positional_encoding_terms, config.n_dims);
        let decoder = Decoder::new(config, device);

        debug!(
            n_grids = config.n_grids,
            n_features = config.n_features,
            grid_shape = %grid_shape,
            depth = decoder.depth(),
            width = config.nodes_per_layer,
            "built adaptive multi-grid network"
        );

        Ok(Self {
            transforms,
            feature_grids: Param::from_tensor(feature_grids),
            encoder,
            decoder,
            config: Ignored(config.clone()),
            grid_shape: Ignored(grid_shape),
            region: Ignored(region),
        })
    }

    /// Predict field values for a batch of coordinates
    ///
    /// # Arguments
    /// * `coords` - `[B, n_dims]` coordinates in the normalized domain
    ///
    /// Returns `[B, n_outputs]`.
    pub fn forward(&self, coords: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        let batch = self.check_coordinates(&coords)?;
        trace!(batch, "forward");
        if batch == 0 {
            return Ok(Tensor::zeros([0, self.config.n_outputs], &coords.device()));
        }

        let features = self.sample_unchecked(coords.clone());
        let encoded = self.encoder.forward(self.encoder_input(coords.detach()));

        Ok(self.decoder.forward(encoded, features))
    }

    /// Aggregated multi-grid features `[B, n_grids * n_features]`
    pub fn sample_features(&self, coords: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        let batch = self.check_coordinates(&coords)?;
        if batch == 0 {
            return Ok(Tensor::zeros(
                [0, self.config.feature_width()],
                &coords.device(),
            ));
        }
        Ok(self.sample_unchecked(coords))
    }

    /// Current transforms `[n_grids, n_dims + 1, n_dims + 1]`, derived fresh
    pub fn transform_matrices(&self) -> Tensor<B, 3> {
        self.transforms.compute_transforms()
    }

    /// Replace the grid placement, keeping everything else
    pub fn with_grid_placement(
        mut self,
        scales: Tensor<B, 2>,
        translations: Tensor<B, 2>,
    ) -> Result<Self> {
        let expected = [self.config.n_grids, self.config.n_dims];
        if scales.dims() != expected {
            return Err(AmrError::ShapeMismatch {
                name: "grid_scales".to_string(),
                expected: expected.to_vec(),
                got: scales.dims().to_vec(),
            });
        }
        self.transforms = GridTransformBank::from_parameters(scales, translations)?;
        Ok(self)
    }

    /// Replace the flattened feature grids `[n_grids, n_features, P]`
    pub fn with_feature_grids(mut self, grids: Tensor<B, 3>) -> Result<Self> {
        let expected = [
            self.config.n_grids,
            self.config.n_features,
            self.grid_shape.num_points(),
        ];
        if grids.dims() != expected {
            return Err(AmrError::ShapeMismatch {
                name: "feature_grids".to_string(),
                expected: expected.to_vec(),
                got: grids.dims().to_vec(),
            });
        }
        self.feature_grids = Param::from_tensor(grids);
        Ok(self)
    }

    /// Grid scales `[n_grids, n_dims]`
    pub fn grid_scales(&self) -> Tensor<B, 2> {
        self.transforms.scales()
    }

    /// Grid translations `[n_grids, n_dims]`
    pub fn grid_translations(&self) -> Tensor<B, 2> {
        self.transforms.translations()
    }

    /// Flattened feature grids `[n_grids, n_features, P]`
    pub fn feature_grids(&self) -> Tensor<B, 3> {
        self.feature_grids.val()
    }

    pub fn config(&self) -> &AmrConfig {
        &self.config
    }

    pub fn grid_shape(&self) -> &GridShape {
        &self.grid_shape
    }

    /// Device holding the parameters
    pub fn device(&self) -> B::Device {
        self.feature_grids.val().device()
    }

    fn check_coordinates(&self, coords: &Tensor<B, 2>) -> Result<usize> {
        let [batch, n_dims] = coords.dims();
        if n_dims != self.config.n_dims {
            return Err(AmrError::InvalidDimension {
                expected: self.config.n_dims,
                got: n_dims,
            });
        }
        Ok(batch)
    }

    fn sample_unchecked(&self, coords: Tensor<B, 2>) -> Tensor<B, 2> {
        sampler::sample_features(
            self.feature_grids.val(),
            &self.grid_shape,
            self.transforms.compute_transforms(),
            coords,
        )
    }

    /// Remap into the configured global sub-region, if any
    fn encoder_input(&self, coords: Tensor<B, 2>) -> Tensor<B, 2> {
        match &*self.region {
            Some(region) => {
                let device = coords.device();
                let start = Tensor::<B, 1>::from_floats(region.start.as_slice(), &device)
                    .unsqueeze::<2>();
                let proportions =
                    Tensor::<B, 1>::from_floats(region.proportions.as_slice(), &device)
                        .unsqueeze::<2>();
                (coords + 1.0) / 2.0 * proportions + start
            }
            None => coords,
        }
    }
}
