//! Neural network layers.
//!
//! The engine has exactly three layer kinds. [`LayerWrapper`] is the closed
//! variant the network stores; it dispatches to the concrete layer and, when
//! serialized, tags each layer with its kind.

pub mod traits;
pub mod conv;
pub mod pooling;
pub mod dense;
pub mod initialization;

use ndarray::ArrayView3;
use serde::{Serialize, Deserialize};

use crate::error::{MinervaError, Result};
use crate::volume::{Shape, Volume};

pub use traits::Layer;
pub use conv::ConvolutionLayer;
pub use pooling::MaxPoolingLayer;
pub use dense::DenseLayer;
pub use initialization::WeightInit;

/// Reject learning rates that would make an SGD step meaningless.
pub fn check_learning_rate(learning_rate: f32) -> Result<()> {
    if !learning_rate.is_finite() || learning_rate <= 0.0 {
        return Err(MinervaError::invalid_parameter(
            "learning_rate".to_string(),
            format!("{} must be positive and finite", learning_rate),
        ));
    }
    Ok(())
}

/// One layer of a network.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum LayerWrapper {
    Convolution(ConvolutionLayer),
    MaxPooling(MaxPoolingLayer),
    Dense(DenseLayer),
}

impl LayerWrapper {
    /// Type label of the wrapped layer
    pub fn kind(&self) -> &'static str {
        match self {
            LayerWrapper::Convolution(_) => "Convolution",
            LayerWrapper::MaxPooling(_) => "MaxPooling",
            LayerWrapper::Dense(_) => "Dense",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            LayerWrapper::Convolution(layer) => layer.validate(),
            LayerWrapper::MaxPooling(layer) => layer.validate(),
            LayerWrapper::Dense(layer) => layer.validate(),
        }
    }

    /// Read one learnable scalar (weights first, then biases)
    pub fn parameter(&self, index: usize) -> Option<f32> {
        match self {
            LayerWrapper::Convolution(layer) => layer.parameter(index),
            LayerWrapper::MaxPooling(_) => None,
            LayerWrapper::Dense(layer) => layer.parameter(index),
        }
    }

    pub fn set_parameter(&mut self, index: usize, value: f32) -> Result<()> {
        match self {
            LayerWrapper::Convolution(layer) => layer.set_parameter(index, value),
            LayerWrapper::MaxPooling(_) => Err(MinervaError::precondition(
                "max pooling layers have no learnable parameters",
            )),
            LayerWrapper::Dense(layer) => layer.set_parameter(index, value),
        }
    }

    pub fn as_convolution(&self) -> Option<&ConvolutionLayer> {
        match self {
            LayerWrapper::Convolution(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_max_pooling(&self) -> Option<&MaxPoolingLayer> {
        match self {
            LayerWrapper::MaxPooling(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_dense(&self) -> Option<&DenseLayer> {
        match self {
            LayerWrapper::Dense(layer) => Some(layer),
            _ => None,
        }
    }
}

impl Layer for LayerWrapper {
    fn forward(&mut self, input: ArrayView3<f32>) -> Result<Volume> {
        match self {
            LayerWrapper::Convolution(layer) => layer.forward(input),
            LayerWrapper::MaxPooling(layer) => layer.forward(input),
            LayerWrapper::Dense(layer) => layer.forward(input),
        }
    }

    fn backward(&mut self, output_error: ArrayView3<f32>, learning_rate: f32) -> Result<Volume> {
        match self {
            LayerWrapper::Convolution(layer) => layer.backward(output_error, learning_rate),
            LayerWrapper::MaxPooling(layer) => layer.backward(output_error, learning_rate),
            LayerWrapper::Dense(layer) => layer.backward(output_error, learning_rate),
        }
    }

    fn read_output(&self, index: usize) -> Result<f32> {
        match self {
            LayerWrapper::Convolution(layer) => layer.read_output(index),
            LayerWrapper::MaxPooling(layer) => layer.read_output(index),
            LayerWrapper::Dense(layer) => layer.read_output(index),
        }
    }

    fn input_shape(&self) -> Shape {
        match self {
            LayerWrapper::Convolution(layer) => layer.input_shape(),
            LayerWrapper::MaxPooling(layer) => layer.input_shape(),
            LayerWrapper::Dense(layer) => layer.input_shape(),
        }
    }

    fn output_shape(&self) -> Shape {
        match self {
            LayerWrapper::Convolution(layer) => layer.output_shape(),
            LayerWrapper::MaxPooling(layer) => layer.output_shape(),
            LayerWrapper::Dense(layer) => layer.output_shape(),
        }
    }

    fn parameter_count(&self) -> usize {
        match self {
            LayerWrapper::Convolution(layer) => layer.parameter_count(),
            LayerWrapper::MaxPooling(layer) => layer.parameter_count(),
            LayerWrapper::Dense(layer) => layer.parameter_count(),
        }
    }

    fn has_forward_cache(&self) -> bool {
        match self {
            LayerWrapper::Convolution(layer) => layer.has_forward_cache(),
            LayerWrapper::MaxPooling(layer) => layer.has_forward_cache(),
            LayerWrapper::Dense(layer) => layer.has_forward_cache(),
        }
    }
}

impl From<ConvolutionLayer> for LayerWrapper {
    fn from(layer: ConvolutionLayer) -> Self {
        LayerWrapper::Convolution(layer)
    }
}

impl From<MaxPoolingLayer> for LayerWrapper {
    fn from(layer: MaxPoolingLayer) -> Self {
        LayerWrapper::MaxPooling(layer)
    }
}

impl From<DenseLayer> for LayerWrapper {
    fn from(layer: DenseLayer) -> Self {
        LayerWrapper::Dense(layer)
    }
}
