use ndarray::ArrayView3;

use crate::error::Result;
use crate::volume::{Shape, Volume};

/// Trait defining the interface for neural network layers.
///
/// A layer keeps exactly one sample's worth of forward state. `backward` is
/// only valid immediately after `forward` on the same sample and consumes that
/// state, so calling it twice in a row is an error.
pub trait Layer {
    /// Perform forward propagation for a single input volume
    fn forward(&mut self, input: ArrayView3<f32>) -> Result<Volume>;

    /// Propagate `output_error` back through the layer, updating any learnable
    /// parameters with plain SGD, and return the error with respect to the
    /// layer's input.
    fn backward(&mut self, output_error: ArrayView3<f32>, learning_rate: f32) -> Result<Volume>;

    /// Read one value of the cached output. Only the terminal, score-producing
    /// layer supports this; every other kind fails with a precondition violation.
    fn read_output(&self, index: usize) -> Result<f32>;

    /// Shape of the volume `forward` accepts
    fn input_shape(&self) -> Shape;

    /// Shape of the volume `forward` produces
    fn output_shape(&self) -> Shape;

    /// Number of learnable scalars (weights plus biases)
    fn parameter_count(&self) -> usize;

    /// Whether a forward pass is cached and not yet consumed by `backward`
    fn has_forward_cache(&self) -> bool;
}
