//! Configuration structures for building networks
//!
//! A network is described by its learning rate, the seed its weights are drawn
//! from, and the ordered list of layers.
//!
//! # Example
//!
//! ```json
//! {
//!   "learning_rate": 0.01,
//!   "seed": 42,
//!   "layers": [
//!     { "type": "convolution", "input_size": 28, "input_depth": 1, "num_filters": 6, "kernel_size": 5, "stride": 1 },
//!     { "type": "max_pooling", "input_size": 24, "input_depth": 6, "window_size": 2, "stride": 2 },
//!     { "type": "convolution", "input_size": 12, "input_depth": 6, "num_filters": 9, "kernel_size": 3, "stride": 1 },
//!     { "type": "max_pooling", "input_size": 10, "input_depth": 9, "window_size": 2, "stride": 2 },
//!     { "type": "dense", "input_width": 5, "input_depth": 9, "output_size": 10 }
//!   ]
//! }
//! ```

use serde::{Serialize, Deserialize};
use std::fs;
use std::path::Path;

use crate::builders::NetworkBuilder;
use crate::error::{MinervaError, Result};
use crate::layers::check_learning_rate;
use crate::network::Network;

pub const DEFAULT_LEARNING_RATE: f32 = 0.01;
pub const DEFAULT_SEED: u64 = 42;

fn default_learning_rate() -> f32 {
    DEFAULT_LEARNING_RATE
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// One entry of [`NetworkConfig::layers`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerConfig {
    Convolution {
        input_size: usize,
        input_depth: usize,
        num_filters: usize,
        kernel_size: usize,
        #[serde(default = "default_stride")]
        stride: usize,
    },
    MaxPooling {
        input_size: usize,
        input_depth: usize,
        window_size: usize,
        #[serde(default = "default_pool_stride")]
        stride: usize,
    },
    Dense {
        input_width: usize,
        input_depth: usize,
        output_size: usize,
    },
}

fn default_stride() -> usize {
    1
}

fn default_pool_stride() -> usize {
    2
}

impl LayerConfig {
    /// Append the described layer to `network`
    pub fn add_to(&self, network: &mut Network) -> Result<()> {
        match *self {
            LayerConfig::Convolution { input_size, input_depth, num_filters, kernel_size, stride } => {
                network.add_convolution_layer(input_size, input_depth, num_filters, kernel_size, stride)
            }
            LayerConfig::MaxPooling { input_size, input_depth, window_size, stride } => {
                network.add_max_pooling_layer(input_size, input_depth, window_size, stride)
            }
            LayerConfig::Dense { input_width, input_depth, output_size } => {
                network.add_dense_layer(input_width, input_depth, output_size)
            }
        }
    }
}

/// Everything needed to construct a [`Network`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Fixed SGD step size
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,

    /// Seed for weight initialization
    #[serde(default = "default_seed")]
    pub seed: u64,

    pub layers: Vec<LayerConfig>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            learning_rate: DEFAULT_LEARNING_RATE,
            seed: DEFAULT_SEED,
            layers: Vec::new(),
        }
    }
}

impl NetworkConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: NetworkConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        check_learning_rate(self.learning_rate)?;
        if self.layers.is_empty() {
            return Err(MinervaError::invalid_parameter("layers", "at least one layer is required"));
        }
        Ok(())
    }

    /// Construct the network; layer shapes are checked as each layer is added.
    pub fn build(&self) -> Result<Network> {
        self.validate()?;
        NetworkBuilder::from_config(self).build()
    }
}

/// Loads a network configuration from a JSON file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<NetworkConfig> {
    let contents = fs::read_to_string(path)?;
    NetworkConfig::from_json(&contents)
}
