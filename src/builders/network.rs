use tracing::debug;

use crate::config::{LayerConfig, NetworkConfig, DEFAULT_LEARNING_RATE, DEFAULT_SEED};
use crate::error::{MinervaError, Result};
use crate::network::Network;

/// Builder for constructing networks with a fluent API
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    learning_rate: f32,
    seed: u64,
    layers: Vec<LayerConfig>,
}

impl NetworkBuilder {
    /// Create a new network builder
    pub fn new() -> Self {
        NetworkBuilder {
            learning_rate: DEFAULT_LEARNING_RATE,
            seed: DEFAULT_SEED,
            layers: Vec::new(),
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        NetworkBuilder {
            learning_rate: config.learning_rate,
            seed: config.seed,
            layers: config.layers.clone(),
        }
    }

    pub fn learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Add a convolution + ReLU layer
    pub fn convolution(
        mut self,
        input_size: usize,
        input_depth: usize,
        num_filters: usize,
        kernel_size: usize,
        stride: usize,
    ) -> Self {
        self.layers.push(LayerConfig::Convolution { input_size, input_depth, num_filters, kernel_size, stride });
        self
    }

    /// Add a max pooling layer
    pub fn max_pooling(mut self, input_size: usize, input_depth: usize, window_size: usize, stride: usize) -> Self {
        self.layers.push(LayerConfig::MaxPooling { input_size, input_depth, window_size, stride });
        self
    }

    /// Add a fully connected sigmoid layer
    pub fn dense(mut self, input_width: usize, input_depth: usize, output_size: usize) -> Self {
        self.layers.push(LayerConfig::Dense { input_width, input_depth, output_size });
        self
    }

    /// The configuration this builder currently describes
    pub fn config(&self) -> NetworkConfig {
        NetworkConfig {
            learning_rate: self.learning_rate,
            seed: self.seed,
            layers: self.layers.clone(),
        }
    }

    /// Build the network
    pub fn build(self) -> Result<Network> {
        if self.layers.is_empty() {
            return Err(MinervaError::InvalidParameter {
                name: "layers".to_string(),
                reason: "Network must have at least one layer".to_string(),
            });
        }

        let mut network = Network::new(self.learning_rate, self.seed)?;
        for layer in &self.layers {
            layer.add_to(&mut network)?;
        }
        debug!(
            layers = network.len(),
            parameters = network.parameter_count(),
            seed = self.seed,
            "built network"
        );
        Ok(network)
    }
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
