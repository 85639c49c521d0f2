//! Hyperparameters for the adaptive multi-grid network

use burn::config::Config;

use crate::error::{AmrError, Result as AmrResult};
use crate::types::{GlobalRegion, GridShape};

/// Configuration record for an adaptive multi-grid scene representation network
#[derive(Config, Debug)]
pub struct AmrConfig {
    /// Spatial dimensionality of the field, 2 or 3
    pub n_dims: usize,
    /// Number of independently placed sub-grids
    pub n_grids: usize,
    /// Feature channels stored per sub-grid
    pub n_features: usize,
    /// Per-grid resolution, comma separated, outermost axis first ("16,16,16")
    pub feature_grid_shape: String,
    /// Frequencies used by the positional encoding
    pub num_positional_encoding_terms: usize,
    /// Decoder width
    pub nodes_per_layer: usize,
    /// Decoder depth, excluding the first layer
    pub n_layers: usize,
    /// Output channels of the field
    pub n_outputs: usize,
    /// Remap coordinates into `global_start`/`global_proportions` before encoding
    #[config(default = false)]
    pub use_global_position: bool,
    #[config(default = "Vec::new()")]
    pub global_start: Vec<f32>,
    #[config(default = "Vec::new()")]
    pub global_proportions: Vec<f32>,
    /// Lower bound of the uniform scale initialization
    #[config(default = 1.0)]
    pub scale_init_min: f32,
    /// Upper bound of the uniform scale initialization
    #[config(default = 4.0)]
    pub scale_init_max: f32,
}

impl AmrConfig {
    /// Parse the per-grid resolution, checking it against `n_dims`
    pub fn grid_shape(&self) -> AmrResult<GridShape> {
        let shape: GridShape = self.feature_grid_shape.parse()?;
        if shape.rank() != self.n_dims {
            return Err(AmrError::InvalidGridShape {
                spec: self.feature_grid_shape.clone(),
                reason: format!("expected {} axes, got {}", self.n_dims, shape.rank()),
            });
        }
        Ok(shape)
    }

    /// Region used by the encoder remap, if enabled
    pub fn global_region(&self) -> AmrResult<Option<GlobalRegion>> {
        if !self.use_global_position {
            return Ok(None);
        }
        for (name, values) in [
            ("global_start", &self.global_start),
            ("global_proportions", &self.global_proportions),
        ] {
            if values.len() != self.n_dims {
                return Err(AmrError::Config(format!(
                    "{name} needs {} entries when use_global_position is set, got {}",
                    self.n_dims,
                    values.len()
                )));
            }
        }
        Ok(Some(GlobalRegion {
            start: self.global_start.clone(),
            proportions: self.global_proportions.clone(),
        }))
    }

    /// Validate every field that construction depends on
    pub fn validate(&self) -> AmrResult<()> {
        if self.n_dims != 2 && self.n_dims != 3 {
            return Err(AmrError::Config(format!(
                "n_dims must be 2 or 3, got {}",
                self.n_dims
            )));
        }
        for (name, value) in [
            ("n_grids", self.n_grids),
            ("n_features", self.n_features),
            ("num_positional_encoding_terms", self.num_positional_encoding_terms),
            ("nodes_per_layer", self.nodes_per_layer),
            ("n_layers", self.n_layers),
            ("n_outputs", self.n_outputs),
        ] {
            if value == 0 {
                return Err(AmrError::Config(format!("{name} must be positive")));
            }
        }
        if !(self.scale_init_min <= self.scale_init_max) {
            return Err(AmrError::Config(format!(
                "scale init range [{}, {}] is empty",
                self.scale_init_min, self.scale_init_max
            )));
        }
        self.grid_shape()?;
        self.global_region()?;
        Ok(())
    }

    /// Width of the concatenated multi-grid feature vector, `N * F`
    pub fn feature_width(&self) -> usize {
        self.n_grids * self.n_features
    }

    /// Width of the positional encoding, `2 * L * D`
    pub fn encoding_width(&self) -> usize {
        2 * self.num_positional_encoding_terms * self.n_dims
    }

    /// Input width of the first decoder layer
    pub fn input_width(&self) -> usize {
        self.encoding_width() + self.feature_width()
    }

    /// Input width of every later decoder layer
    pub fn decoder_skip_width(&self) -> usize {
        self.nodes_per_layer + self.feature_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume_config() -> AmrConfig {
        AmrConfig::new(3, 2, 2, "4,4,4".to_string(), 2, 8, 2, 1)
    }

    #[test]
    fn test_default_fields() {
        let config = volume_config();
        assert!(!config.use_global_position);
        assert_eq!(config.scale_init_min, 1.0);
        assert_eq!(config.scale_init_max, 4.0);
        assert!(config.global_start.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_widths() {
        let config = volume_config();
        assert_eq!(config.feature_width(), 4);
        assert_eq!(config.encoding_width(), 12);
        assert_eq!(config.input_width(), 16);
        assert_eq!(config.decoder_skip_width(), 12);
    }

    #[test]
    fn test_grid_shape_must_match_dims() {
        let config = AmrConfig::new(3, 2, 2, "4,4".to_string(), 2, 8, 2, 1);
        assert!(matches!(
            config.validate(),
            Err(AmrError::InvalidGridShape { .. })
        ));

        let mut config = volume_config();
        config.feature_grid_shape = "4,four,4".to_string();
        assert!(config.grid_shape().is_err());
    }

    #[test]
    fn test_reject_bad_counts() {
        let config = AmrConfig::new(4, 2, 2, "4,4,4,4".to_string(), 2, 8, 2, 1);
        assert!(matches!(config.validate(), Err(AmrError::Config(_))));

        let config = AmrConfig::new(3, 0, 2, "4,4,4".to_string(), 2, 8, 2, 1);
        assert!(config.validate().is_err());

        // the decoder always ends in a linear head
        let config = AmrConfig::new(3, 2, 2, "4,4,4".to_string(), 2, 8, 0, 1);
        assert!(config.validate().is_err());

        let config = volume_config()
            .with_scale_init_min(3.0)
            .with_scale_init_max(2.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_global_region() {
        let config = volume_config().with_use_global_position(true);
        assert!(config.global_region().is_err());

        let config = config
            .with_global_start(vec![0.0, 0.0, 0.5])
            .with_global_proportions(vec![1.0, 1.0, 0.5]);
        let region = config.global_region().unwrap().unwrap();
        assert_eq!(region.start, vec![0.0, 0.0, 0.5]);
        assert!(config.validate().is_ok());

        assert!(volume_config().global_region().unwrap().is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AmrConfig::new(3, 2, 2, "4,4,4".to_string(), 2, 8, 2, 3);
        let json = serde_json::to_string(&config).unwrap();
        let restored: AmrConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.n_outputs, 3);
        assert_eq!(restored.feature_grid_shape, "4,4,4");
    }
}
