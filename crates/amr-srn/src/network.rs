//! Periodic residual decoder
//!
//! The decoder is a fixed stack of snake layers (`0.5 z + sin²(z)`) closed by
//! a plain linear regression head. Every layer sees the aggregated multi-grid
//! features again, concatenated after the running activation.

use amr_core::AmrConfig;
use burn::nn;
use burn::prelude::*;

/// Snake activation `0.5 z + sin²(z)`
pub fn snake<B: Backend, const D: usize>(z: Tensor<B, D>) -> Tensor<B, D> {
    let sine = z.clone().sin();
    z * 0.5 + sine.clone() * sine
}

fn xavier_linear<B: Backend>(input_dim: usize, output_dim: usize, device: &B::Device) -> nn::Linear<B> {
    nn::LinearConfig::new(input_dim, output_dim)
        .with_initializer(nn::Initializer::XavierNormal { gain: 1.0 })
        .init(device)
}

/// Affine map followed by the snake activation
#[derive(Module, Debug)]
pub struct SnakeLayer<B: Backend> {
    linear: nn::Linear<B>,
}

impl<B: Backend> SnakeLayer<B> {
    /// Create a Xavier-normal initialized layer
    pub fn new(input_dim: usize, output_dim: usize, device: &B::Device) -> Self {
        Self {
            linear: xavier_linear(input_dim, output_dim, device),
        }
    }

    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        snake(self.linear.forward(input))
    }
}

/// Uniform call interface over the decoder's layer variants
pub trait DecoderLayer<B: Backend> {
    fn apply(&self, input: Tensor<B, 2>) -> Tensor<B, 2>;
}

impl<B: Backend> DecoderLayer<B> for SnakeLayer<B> {
    fn apply(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward(input)
    }
}

impl<B: Backend> DecoderLayer<B> for nn::Linear<B> {
    fn apply(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward(input)
    }
}

/// Snake layers plus the final linear head
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    layers: Vec<SnakeLayer<B>>,
    output: nn::Linear<B>,
}

impl<B: Backend> Decoder<B> {
    /// Build `n_layers` snake layers and the head from the configuration
    ///
    /// The first layer reads the positional encoding plus the grid features;
    /// later layers read the previous activation plus the grid features.
    pub fn new(config: &AmrConfig, device: &B::Device) -> Self {
        let width = config.nodes_per_layer;
        let skip_width = config.decoder_skip_width();

        let mut layers = Vec::with_capacity(config.n_layers);
        layers.push(SnakeLayer::new(config.input_width(), width, device));
        for _ in 1..config.n_layers {
            layers.push(SnakeLayer::new(skip_width, width, device));
        }

        let output = xavier_linear(skip_width, config.n_outputs, device);

        Self { layers, output }
    }

    /// Run the stack, re-injecting `features` in front of every layer
    pub fn forward(&self, encoded: Tensor<B, 2>, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.stack().fold(encoded, |activation, layer| {
            layer.apply(Tensor::cat(vec![activation, features.clone()], 1))
        })
    }

    /// Number of layers including the head
    pub fn depth(&self) -> usize {
        self.layers.len() + 1
    }

    fn stack(&self) -> impl Iterator<Item = &dyn DecoderLayer<B>> + '_ {
        self.layers
            .iter()
            .map(|layer| layer as &dyn DecoderLayer<B>)
            .chain(std::iter::once(&self.output as &dyn DecoderLayer<B>))
    }

    /// Linear maps in stack order, head last
    pub(crate) fn linears(&self) -> Vec<&nn::Linear<B>> {
        self.layers
            .iter()
            .map(|layer| &layer.linear)
            .chain(std::iter::once(&self.output))
            .collect()
    }

    pub(crate) fn linears_mut(&mut self) -> Vec<&mut nn::Linear<B>> {
        self.layers
            .iter_mut()
            .map(|layer| &mut layer.linear)
            .chain(std::iter::once(&mut self.output))
            .collect()
    }
}
