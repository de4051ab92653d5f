//! Convolutional layer for processing spatial data
//!
//! A bank of learnable square filters is cross-correlated with the input
//! volume (no kernel flip), a per-filter bias is added and ReLU is applied.

use ndarray::{Array1, Array3, Array4, ArrayView3};
use rand::Rng;
use serde::{Serialize, Deserialize};
use tracing::trace;

use crate::activations::Activation;
use crate::error::{MinervaError, Result};
use crate::layers::initialization::WeightInit;
use crate::layers::traits::Layer;
use crate::layers::check_learning_rate;
use crate::volume::{self, Shape, Volume};

/// Initial value of every convolution bias
pub const CONV_BIAS_INIT: f32 = 0.1;

/// Convolution + bias + ReLU over a square input volume.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConvolutionLayer {
    input_size: usize,
    input_depth: usize,
    num_filters: usize,
    kernel_size: usize,
    stride: usize,
    output_size: usize,

    /// Convolution filters [num_filters, input_depth, kernel_size, kernel_size]
    filters: Array4<f32>,

    /// Bias term for each output channel
    biases: Array1<f32>,

    /// Cached input for backward pass
    #[serde(skip)]
    cached_input: Option<Volume>,

    /// Cached post-activation output; its sign is the ReLU gate
    #[serde(skip)]
    cached_output: Option<Volume>,
}

impl ConvolutionLayer {
    /// Create a new convolutional layer with He-initialized filters and biases of 0.1.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        input_depth: usize,
        num_filters: usize,
        kernel_size: usize,
        stride: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if input_depth == 0 {
            return Err(MinervaError::invalid_parameter("input_depth", "must be positive"));
        }
        if num_filters == 0 {
            return Err(MinervaError::invalid_parameter("num_filters", "must be positive"));
        }
        let output_size = volume::window_output_size(input_size, kernel_size, stride)?;

        let fan_in = input_depth * kernel_size * kernel_size;
        let filters = WeightInit::HeNormal { fan_in }
            .initialize((num_filters, input_depth, kernel_size, kernel_size), rng)?;
        let biases = WeightInit::Constant(CONV_BIAS_INIT).initialize(num_filters, rng)?;

        Ok(ConvolutionLayer {
            input_size,
            input_depth,
            num_filters,
            kernel_size,
            stride,
            output_size,
            filters,
            biases,
            cached_input: None,
            cached_output: None,
        })
    }

    pub fn with_filters(mut self, filters: Array4<f32>) -> Result<Self> {
        let expected = (self.num_filters, self.input_depth, self.kernel_size, self.kernel_size);
        if filters.dim() != expected {
            return Err(MinervaError::dimension_mismatch(
                format!("{:?}", expected),
                format!("{:?}", filters.dim()),
            ));
        }
        self.filters = filters;
        Ok(self)
    }

    pub fn with_biases(mut self, biases: Array1<f32>) -> Result<Self> {
        if biases.len() != self.num_filters {
            return Err(MinervaError::dimension_mismatch(
                format!("{} biases", self.num_filters),
                format!("{} biases", biases.len()),
            ));
        }
        self.biases = biases;
        Ok(self)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn input_depth(&self) -> usize {
        self.input_depth
    }

    pub fn num_filters(&self) -> usize {
        self.num_filters
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn filters(&self) -> &Array4<f32> {
        &self.filters
    }

    pub fn biases(&self) -> &Array1<f32> {
        &self.biases
    }

    /// Check that shape parameters and tensors agree, e.g. after deserialization.
    pub fn validate(&self) -> Result<()> {
        let output_size = volume::window_output_size(self.input_size, self.kernel_size, self.stride)?;
        if output_size != self.output_size {
            return Err(MinervaError::invalid_parameter(
                "output_size".to_string(),
                format!("recorded {} but parameters give {}", self.output_size, output_size),
            ));
        }
        let expected = (self.num_filters, self.input_depth, self.kernel_size, self.kernel_size);
        if self.filters.dim() != expected || self.biases.len() != self.num_filters {
            return Err(MinervaError::dimension_mismatch(
                format!("filters {:?} and {} biases", expected, self.num_filters),
                format!("filters {:?} and {} biases", self.filters.dim(), self.biases.len()),
            ));
        }
        Ok(())
    }

    /// Read one learnable scalar; filters come first in `[f, c, ky, kx]` order, then biases.
    pub fn parameter(&self, index: usize) -> Option<f32> {
        self.filters.iter().chain(self.biases.iter()).nth(index).copied()
    }

    pub fn set_parameter(&mut self, index: usize, value: f32) -> Result<()> {
        let count = self.parameter_count();
        let slot = self
            .filters
            .iter_mut()
            .chain(self.biases.iter_mut())
            .nth(index)
            .ok_or_else(|| {
                MinervaError::invalid_parameter("index".to_string(), format!("{} >= {}", index, count))
            })?;
        *slot = value;
        Ok(())
    }

    /// Cross-correlate the input with every filter and add the bias
    fn convolve(&self, input: &ArrayView3<f32>) -> Volume {
        let mut output = Array3::zeros(self.output_shape());

        for f in 0..self.num_filters {
            for i in 0..self.output_size {
                for j in 0..self.output_size {
                    let top = i * self.stride;
                    let left = j * self.stride;
                    let mut sum = self.biases[f];

                    for c in 0..self.input_depth {
                        for ky in 0..self.kernel_size {
                            for kx in 0..self.kernel_size {
                                sum += self.filters[[f, c, ky, kx]] * input[[c, top + ky, left + kx]];
                            }
                        }
                    }

                    output[[f, i, j]] = sum;
                }
            }
        }

        output
    }
}

impl Layer for ConvolutionLayer {
    fn forward(&mut self, input: ArrayView3<f32>) -> Result<Volume> {
        volume::ensure_shape(&input, self.input_shape())?;

        let mut output = self.convolve(&input);
        Activation::Relu.apply(&mut output);

        self.cached_input = Some(input.to_owned());
        self.cached_output = Some(output.clone());
        trace!(filters = self.num_filters, output_size = self.output_size, "convolution forward");
        Ok(output)
    }

    fn backward(&mut self, output_error: ArrayView3<f32>, learning_rate: f32) -> Result<Volume> {
        volume::ensure_shape(&output_error, self.output_shape())?;
        check_learning_rate(learning_rate)?;
        let (input, output) = match (self.cached_input.take(), self.cached_output.take()) {
            (Some(input), Some(output)) => (input, output),
            _ => {
                return Err(MinervaError::precondition(
                    "convolution backward called without a preceding forward",
                ))
            }
        };

        let mut input_error = Array3::zeros(self.input_shape());
        // Input error is accumulated against the pre-update filters.
        let mut new_filters = self.filters.clone();

        for i in 0..self.output_size {
            for j in 0..self.output_size {
                let top = i * self.stride;
                let left = j * self.stride;

                for f in 0..self.num_filters {
                    if Activation::Relu.derivative_from_output(output[[f, i, j]]) == 0.0 {
                        continue;
                    }
                    let delta = output_error[[f, i, j]];
                    self.biases[f] -= delta * learning_rate;

                    for c in 0..self.input_depth {
                        for ky in 0..self.kernel_size {
                            for kx in 0..self.kernel_size {
                                let (y, x) = (top + ky, left + kx);
                                input_error[[c, y, x]] += self.filters[[f, c, ky, kx]] * delta;
                                new_filters[[f, c, ky, kx]] -= input[[c, y, x]] * delta * learning_rate;
                            }
                        }
                    }
                }
            }
        }

        self.filters = new_filters;
        trace!(filters = self.num_filters, "convolution backward");
        Ok(input_error)
    }

    fn read_output(&self, _index: usize) -> Result<f32> {
        Err(MinervaError::precondition(
            "read_output is not supported on a convolution layer; only the terminal dense layer produces scores",
        ))
    }

    fn input_shape(&self) -> Shape {
        (self.input_depth, self.input_size, self.input_size)
    }

    fn output_shape(&self) -> Shape {
        (self.num_filters, self.output_size, self.output_size)
    }

    fn parameter_count(&self) -> usize {
        self.filters.len() + self.biases.len()
    }

    fn has_forward_cache(&self) -> bool {
        self.cached_input.is_some() && self.cached_output.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr3, Array};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn diagonal_layer() -> ConvolutionLayer {
        let mut rng = StdRng::seed_from_u64(1);
        let filters = Array::from_shape_vec((1, 1, 2, 2), vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        ConvolutionLayer::new(3, 1, 1, 2, 1, &mut rng)
            .unwrap()
            .with_filters(filters)
            .unwrap()
            .with_biases(arr1(&[0.0]))
            .unwrap()
    }

    fn ramp() -> Volume {
        arr3(&[[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]])
    }

    #[test]
    fn test_conv_new_shapes() {
        let mut rng = StdRng::seed_from_u64(42);
        let layer = ConvolutionLayer::new(28, 1, 6, 5, 1, &mut rng).unwrap();
        assert_eq!(layer.output_size(), 24);
        assert_eq!(layer.filters().dim(), (6, 1, 5, 5));
        assert!(layer.biases().iter().all(|&b| b == CONV_BIAS_INIT));
        assert_eq!(layer.parameter_count(), 6 * 25 + 6);
        assert!(!layer.has_forward_cache());
    }

    #[test]
    fn test_conv_rejects_non_integer_output() {
        let mut rng = StdRng::seed_from_u64(42);
        let err = ConvolutionLayer::new(6, 1, 2, 3, 2, &mut rng).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(ConvolutionLayer::new(4, 0, 2, 3, 1, &mut rng).is_err());
        assert!(ConvolutionLayer::new(4, 1, 0, 3, 1, &mut rng).is_err());
    }

    #[test]
    fn test_conv_forward_values() {
        let mut layer = diagonal_layer();
        let output = layer.forward(ramp().view()).unwrap();
        assert_eq!(output, arr3(&[[[6.0, 8.0], [12.0, 14.0]]]));
    }

    #[test]
    fn test_conv_forward_applies_relu() {
        let mut layer = diagonal_layer().with_biases(arr1(&[-10.0])).unwrap();
        let output = layer.forward(ramp().view()).unwrap();
        assert_eq!(output, arr3(&[[[0.0, 0.0], [2.0, 4.0]]]));
    }

    #[test]
    fn test_conv_forward_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut layer = ConvolutionLayer::new(6, 2, 3, 3, 1, &mut rng).unwrap();
        let input = Array3::from_shape_fn((2, 6, 6), |(c, y, x)| ((c + 2 * y + 3 * x) % 7) as f32 / 7.0);
        let first = layer.forward(input.view()).unwrap();
        let second = layer.forward(input.view()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_conv_backward_updates_with_pre_update_filters() {
        let mut layer = diagonal_layer();
        layer.forward(ramp().view()).unwrap();
        let error = Array3::from_elem((1, 2, 2), 1.0);
        let input_error = layer.backward(error.view(), 0.1).unwrap();

        assert_eq!(input_error, arr3(&[[[1.0, 1.0, 0.0], [1.0, 2.0, 1.0], [0.0, 1.0, 1.0]]]));

        let expected = [-0.2, -1.6, -2.4, -1.8];
        for (w, e) in layer.filters().iter().zip(expected.iter()) {
            assert!((w - e).abs() < 1e-5, "filter {} != {}", w, e);
        }
        assert!((layer.biases()[0] + 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_conv_backward_relu_gate_blocks() {
        let mut layer = diagonal_layer().with_biases(arr1(&[-100.0])).unwrap();
        layer.forward(ramp().view()).unwrap();
        let before = layer.filters().clone();
        let error = Array3::from_elem((1, 2, 2), 1.0);
        let input_error = layer.backward(error.view(), 0.1).unwrap();

        assert!(input_error.iter().all(|&e| e == 0.0));
        assert_eq!(layer.filters(), &before);
        assert_eq!(layer.biases()[0], -100.0);
    }

    #[test]
    fn test_conv_backward_requires_forward() {
        let mut layer = diagonal_layer();
        let error = Array3::from_elem((1, 2, 2), 1.0);
        assert!(matches!(
            layer.backward(error.view(), 0.1),
            Err(MinervaError::PreconditionViolation(_))
        ));

        layer.forward(ramp().view()).unwrap();
        layer.backward(error.view(), 0.1).unwrap();
        assert!(matches!(
            layer.backward(error.view(), 0.1),
            Err(MinervaError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_conv_shape_mismatch_keeps_state() {
        let mut layer = diagonal_layer();
        assert!(matches!(
            layer.forward(Array3::zeros((1, 4, 4)).view()),
            Err(MinervaError::DimensionMismatch { .. })
        ));

        layer.forward(ramp().view()).unwrap();
        let before = layer.filters().clone();
        let wrong = Array3::from_elem((2, 2, 2), 1.0);
        assert!(matches!(
            layer.backward(wrong.view(), 0.1),
            Err(MinervaError::DimensionMismatch { .. })
        ));
        assert_eq!(layer.filters(), &before);
        assert!(layer.has_forward_cache());
    }

    #[test]
    fn test_conv_read_output_is_precondition_violation() {
        let layer = diagonal_layer();
        assert!(matches!(layer.read_output(0), Err(MinervaError::PreconditionViolation(_))));
    }

    #[test]
    fn test_conv_parameter_access() {
        let mut layer = diagonal_layer();
        assert_eq!(layer.parameter(0), Some(1.0));
        assert_eq!(layer.parameter(4), Some(0.0));
        assert_eq!(layer.parameter(5), None);
        layer.set_parameter(4, 0.5).unwrap();
        assert_eq!(layer.biases()[0], 0.5);
        assert!(layer.set_parameter(5, 1.0).is_err());
    }
}
