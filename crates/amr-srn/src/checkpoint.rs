//! Named-tensor snapshots of a model
//!
//! A checkpoint is the configuration plus every learned tensor under a stable
//! name:
//!
//! | name                  | shape                     |
//! |-----------------------|---------------------------|
//! | `grid_scales`         | `[N, D]`                  |
//! | `grid_translations`   | `[N, D]`                  |
//! | `feature_grids`       | `[N, F, *grid_shape]`     |
//! | `decoder.{i}.weight`  | `[in, out]`               |
//! | `decoder.{i}.bias`    | `[out]`                   |
//!
//! Decoder indices follow stack order; the linear head has the last index.
//! Values are stored as `f32`, so restoring into an `f32` backend is exact.

use amr_core::{AmrConfig, AmrError, Result};
use burn::module::Param;
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

use crate::transform::GridTransformBank;
use crate::AmrSrn;

/// Row-major tensor values with their shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl StoredTensor {
    /// Copy a tensor's values off the device
    pub fn from_tensor<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Self> {
        let data = tensor.into_data().convert::<f32>();
        let shape = data.shape.clone();
        let values = data
            .to_vec::<f32>()
            .map_err(|err| AmrError::Checkpoint(format!("{err:?}")))?;
        Ok(Self {
            shape,
            data: values,
        })
    }

    /// Same values under a different shape with the same element count
    fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = shape;
        self
    }

    /// Rebuild a tensor, checking the stored shape first
    ///
    /// # Arguments
    /// * `expected` - shape recorded in the checkpoint
    /// * `dims` - shape of the rebuilt tensor (same element count)
    fn restore<B: Backend, const D: usize>(
        &self,
        name: &str,
        expected: &[usize],
        dims: [usize; D],
        device: &B::Device,
    ) -> Result<Tensor<B, D>> {
        if self.shape != expected {
            return Err(AmrError::ShapeMismatch {
                name: name.to_string(),
                expected: expected.to_vec(),
                got: self.shape.clone(),
            });
        }
        let count: usize = expected.iter().product();
        if self.data.len() != count {
            return Err(AmrError::Checkpoint(format!(
                "{name} holds {} values, shape needs {count}",
                self.data.len()
            )));
        }
        Ok(Tensor::from_data(
            TensorData::new(self.data.clone(), dims),
            device,
        ))
    }
}

/// Configuration plus every learned tensor, by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub config: AmrConfig,
    pub tensors: BTreeMap<String, StoredTensor>,
}

impl ModelCheckpoint {
    /// Write the checkpoint as JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(writer, self)?;
        debug!(path = %path.as_ref().display(), tensors = self.tensors.len(), "saved checkpoint");
        Ok(())
    }

    /// Read a checkpoint written by [`ModelCheckpoint::save_json`]
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let checkpoint: Self = serde_json::from_reader(reader)?;
        debug!(path = %path.as_ref().display(), tensors = checkpoint.tensors.len(), "loaded checkpoint");
        Ok(checkpoint)
    }

    fn tensor(&self, name: &str) -> Result<&StoredTensor> {
        self.tensors
            .get(name)
            .ok_or_else(|| AmrError::Checkpoint(format!("missing tensor {name}")))
    }
}

fn weight_name(index: usize) -> String {
    format!("decoder.{index}.weight")
}

fn bias_name(index: usize) -> String {
    format!("decoder.{index}.bias")
}

impl<B: Backend> AmrSrn<B> {
    /// Snapshot the configuration and all parameters
    pub fn to_checkpoint(&self) -> Result<ModelCheckpoint> {
        let mut tensors = BTreeMap::new();

        tensors.insert(
            "grid_scales".to_string(),
            StoredTensor::from_tensor(self.transforms.scales())?,
        );
        tensors.insert(
            "grid_translations".to_string(),
            StoredTensor::from_tensor(self.transforms.translations())?,
        );

        let mut grid_dims = vec![self.config.n_grids, self.config.n_features];
        grid_dims.extend_from_slice(self.grid_shape.dims());
        tensors.insert(
            "feature_grids".to_string(),
            StoredTensor::from_tensor(self.feature_grids.val())?.with_shape(grid_dims),
        );

        for (index, linear) in self.decoder.linears().into_iter().enumerate() {
            tensors.insert(weight_name(index), StoredTensor::from_tensor(linear.weight.val())?);
            if let Some(bias) = &linear.bias {
                tensors.insert(bias_name(index), StoredTensor::from_tensor(bias.val())?);
            }
        }

        Ok(ModelCheckpoint {
            config: (*self.config).clone(),
            tensors,
        })
    }

    /// Build a model from a checkpoint
    ///
    /// The model is constructed from the stored configuration and then every
    /// named tensor is written over the fresh parameters. Missing, extra or
    /// mis-shaped tensors are errors.
    pub fn from_checkpoint(checkpoint: &ModelCheckpoint, device: &B::Device) -> Result<Self> {
        let mut model = Self::new(&checkpoint.config, device)?;
        let config = &checkpoint.config;
        let pair = [config.n_grids, config.n_dims];

        let scales = checkpoint
            .tensor("grid_scales")?
            .restore::<B, 2>("grid_scales", &pair, pair, device)?;
        let translations = checkpoint
            .tensor("grid_translations")?
            .restore::<B, 2>("grid_translations", &pair, pair, device)?;
        model.transforms = GridTransformBank::from_parameters(scales, translations)?;

        let mut grid_dims = vec![config.n_grids, config.n_features];
        grid_dims.extend_from_slice(model.grid_shape.dims());
        let flat = [
            config.n_grids,
            config.n_features,
            model.grid_shape.num_points(),
        ];
        let grids = checkpoint
            .tensor("feature_grids")?
            .restore::<B, 3>("feature_grids", &grid_dims, flat, device)?;
        model.feature_grids = Param::from_tensor(grids);

        let mut expected_count = 3;
        for (index, linear) in model.decoder.linears_mut().into_iter().enumerate() {
            let name = weight_name(index);
            let dims = linear.weight.val().dims();
            let weight = checkpoint
                .tensor(&name)?
                .restore::<B, 2>(&name, &dims, dims, device)?;
            linear.weight = Param::from_tensor(weight);
            expected_count += 1;

            if let Some(bias) = linear.bias.as_mut() {
                let name = bias_name(index);
                let dims = bias.val().dims();
                let values = checkpoint
                    .tensor(&name)?
                    .restore::<B, 1>(&name, &dims, dims, device)?;
                *bias = Param::from_tensor(values);
                expected_count += 1;
            }
        }

        if checkpoint.tensors.len() != expected_count {
            return Err(AmrError::Checkpoint(format!(
                "expected {expected_count} tensors, found {}",
                checkpoint.tensors.len()
            )));
        }

        debug!(tensors = expected_count, "restored model from checkpoint");
        Ok(model)
    }
}
