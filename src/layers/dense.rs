use ndarray::{Array1, Array2, ArrayView3, Axis};
use rand::Rng;
use serde::{Serialize, Deserialize};
use tracing::trace;

use crate::activations::Activation;
use crate::error::{MinervaError, Result};
use crate::layers::initialization::WeightInit;
use crate::layers::traits::Layer;
use crate::layers::check_learning_rate;
use crate::volume::{self, Shape, Volume};

/// A fully connected layer with sigmoid outputs, used as the network's
/// terminal, score-producing layer.
///
/// The input volume is flattened channel-major, then row, then column, and
/// backward unflattens the input error with exactly the inverse order.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DenseLayer {
    input_width: usize,
    input_depth: usize,
    input_size: usize,
    output_size: usize,

    /// Weight matrix [input_size, output_size]
    weights: Array2<f32>,
    biases: Array1<f32>,

    #[serde(skip)]
    cached_input: Option<Array1<f32>>,
    #[serde(skip)]
    cached_output: Option<Array1<f32>>,
}

impl DenseLayer {
    /// Create a new dense layer reading a `input_depth × input_width × input_width`
    /// volume and producing `output_size` sigmoid scores.
    ///
    /// Weights are drawn from `N(0, sqrt(2 / (input_size * input_depth)))` where
    /// `input_size` is the flattened length; biases start at zero.
    pub fn new<R: Rng + ?Sized>(
        input_width: usize,
        input_depth: usize,
        output_size: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if input_width == 0 {
            return Err(MinervaError::invalid_parameter("input_width", "must be positive"));
        }
        if input_depth == 0 {
            return Err(MinervaError::invalid_parameter("input_depth", "must be positive"));
        }
        if output_size == 0 {
            return Err(MinervaError::invalid_parameter("output_size", "must be positive"));
        }
        let input_size = input_depth * input_width * input_width;

        let std = (2.0 / (input_size * input_depth) as f32).sqrt();
        let weights = WeightInit::Normal { mean: 0.0, std }.initialize((input_size, output_size), rng)?;
        let biases = WeightInit::Zeros.initialize(output_size, rng)?;

        Ok(DenseLayer {
            input_width,
            input_depth,
            input_size,
            output_size,
            weights,
            biases,
            cached_input: None,
            cached_output: None,
        })
    }

    pub fn with_weights(mut self, weights: Array2<f32>) -> Result<Self> {
        if weights.dim() != (self.input_size, self.output_size) {
            return Err(MinervaError::dimension_mismatch(
                format!("{:?}", (self.input_size, self.output_size)),
                format!("{:?}", weights.dim()),
            ));
        }
        self.weights = weights;
        Ok(self)
    }

    pub fn with_biases(mut self, biases: Array1<f32>) -> Result<Self> {
        if biases.len() != self.output_size {
            return Err(MinervaError::dimension_mismatch(
                format!("{} biases", self.output_size),
                format!("{} biases", biases.len()),
            ));
        }
        self.biases = biases;
        Ok(self)
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn input_depth(&self) -> usize {
        self.input_depth
    }

    /// Length of the flattened input vector
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    pub fn biases(&self) -> &Array1<f32> {
        &self.biases
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size != self.input_depth * self.input_width * self.input_width {
            return Err(MinervaError::invalid_parameter(
                "input_size".to_string(),
                format!(
                    "recorded {} but {}x{}x{} flattens to {}",
                    self.input_size,
                    self.input_depth,
                    self.input_width,
                    self.input_width,
                    self.input_depth * self.input_width * self.input_width
                ),
            ));
        }
        if self.weights.dim() != (self.input_size, self.output_size) || self.biases.len() != self.output_size {
            return Err(MinervaError::dimension_mismatch(
                format!("weights {:?} and {} biases", (self.input_size, self.output_size), self.output_size),
                format!("weights {:?} and {} biases", self.weights.dim(), self.biases.len()),
            ));
        }
        Ok(())
    }

    /// Read one learnable scalar; weights come first in row-major order, then biases.
    pub fn parameter(&self, index: usize) -> Option<f32> {
        self.weights.iter().chain(self.biases.iter()).nth(index).copied()
    }

    pub fn set_parameter(&mut self, index: usize, value: f32) -> Result<()> {
        let count = self.parameter_count();
        let slot = self
            .weights
            .iter_mut()
            .chain(self.biases.iter_mut())
            .nth(index)
            .ok_or_else(|| {
                MinervaError::invalid_parameter("index".to_string(), format!("{} >= {}", index, count))
            })?;
        *slot = value;
        Ok(())
    }
}

impl Layer for DenseLayer {
    fn forward(&mut self, input: ArrayView3<f32>) -> Result<Volume> {
        volume::ensure_shape(&input, self.input_shape())?;

        let flat = volume::flatten(input);
        let mut output = flat.dot(&self.weights) + &self.biases;
        Activation::Sigmoid.apply(&mut output);

        let scores = volume::from_vector(output.view());
        self.cached_input = Some(flat);
        self.cached_output = Some(output);
        trace!(outputs = self.output_size, "dense forward");
        Ok(scores)
    }

    fn backward(&mut self, output_error: ArrayView3<f32>, learning_rate: f32) -> Result<Volume> {
        volume::ensure_shape(&output_error, self.output_shape())?;
        check_learning_rate(learning_rate)?;
        let (input, output) = match (self.cached_input.take(), self.cached_output.as_ref()) {
            (Some(input), Some(output)) => (input, output),
            _ => return Err(MinervaError::precondition("dense backward called without a preceding forward")),
        };

        let mut delta: Array1<f32> = output_error.iter().copied().collect();
        delta.zip_mut_with(output, |d, &y| *d *= Activation::Sigmoid.derivative_from_output(y));

        // Both the returned error and the weight gradient use the pre-update weights.
        let flat_error = self.weights.dot(&delta);
        let weight_gradients = input.view().insert_axis(Axis(1)).dot(&delta.view().insert_axis(Axis(0)));
        self.weights.scaled_add(-learning_rate, &weight_gradients);
        self.biases.scaled_add(-learning_rate, &delta);

        trace!(outputs = self.output_size, "dense backward");
        volume::unflatten(flat_error.view(), self.input_shape())
    }

    fn read_output(&self, index: usize) -> Result<f32> {
        let output = self
            .cached_output
            .as_ref()
            .ok_or_else(|| MinervaError::precondition("read_output called before any forward pass"))?;
        output.get(index).copied().ok_or_else(|| {
            MinervaError::invalid_parameter("index".to_string(), format!("{} >= {} outputs", index, self.output_size))
        })
    }

    fn input_shape(&self) -> Shape {
        (self.input_depth, self.input_width, self.input_width)
    }

    fn output_shape(&self) -> Shape {
        (1, 1, self.output_size)
    }

    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    fn has_forward_cache(&self) -> bool {
        self.cached_input.is_some() && self.cached_output.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, arr3, Array3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn single_unit(weight: f32, bias: f32) -> DenseLayer {
        let mut rng = StdRng::seed_from_u64(0);
        DenseLayer::new(1, 1, 1, &mut rng)
            .unwrap()
            .with_weights(arr2(&[[weight]]))
            .unwrap()
            .with_biases(arr1(&[bias]))
            .unwrap()
    }

    #[test]
    fn test_dense_layer_creation() {
        let mut rng = StdRng::seed_from_u64(42);
        let layer = DenseLayer::new(5, 9, 10, &mut rng).unwrap();
        assert_eq!(layer.input_size(), 225);
        assert_eq!(layer.weights().shape(), [225, 10]);
        assert!(layer.biases().iter().all(|&b| b == 0.0));
        assert_eq!(layer.output_shape(), (1, 1, 10));
        assert!(DenseLayer::new(0, 1, 1, &mut rng).unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_dense_forward_sigmoid() {
        let mut layer = single_unit(0.5, 0.0);
        let scores = layer.forward(arr3(&[[[2.0]]]).view()).unwrap();
        let expected = 1.0 / (1.0 + (-1.0f32).exp());
        assert!((scores[[0, 0, 0]] - expected).abs() < 1e-6);
        assert_eq!(layer.read_output(0).unwrap(), scores[[0, 0, 0]]);
        assert!(layer.read_output(1).is_err());
    }

    #[test]
    fn test_dense_outputs_bounded() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut layer = DenseLayer::new(3, 2, 4, &mut rng).unwrap();
        let input = Array3::from_shape_fn((2, 3, 3), |(c, y, x)| (c as f32 - y as f32) * 10.0 + x as f32);
        let scores = layer.forward(input.view()).unwrap();
        assert!(scores.iter().all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_dense_update_direction() {
        let mut layer = single_unit(0.5, 0.0);
        layer.forward(arr3(&[[[2.0]]]).view()).unwrap();
        let score = layer.read_output(0).unwrap();
        // Target 0: mean squared error gradient is positive.
        let error = arr3(&[[[2.0 * score]]]);
        layer.backward(error.view(), 0.1).unwrap();
        assert!(layer.weights()[[0, 0]] < 0.5);
        assert!(layer.biases()[0] < 0.0);
    }

    #[test]
    fn test_dense_backward_unflattens_in_forward_order() {
        let mut rng = StdRng::seed_from_u64(0);
        let weights = Array2::from_shape_fn((8, 1), |(i, _)| i as f32);
        let mut layer = DenseLayer::new(2, 2, 1, &mut rng)
            .unwrap()
            .with_weights(weights)
            .unwrap();
        layer.forward(Array3::zeros((2, 2, 2)).view()).unwrap();
        // All-zero input: output is sigmoid(0) = 0.5, derivative 0.25.
        let input_error = layer.backward(arr3(&[[[4.0]]]).view(), 0.01).unwrap();
        for ((c, y, x), &e) in input_error.indexed_iter() {
            assert_eq!(e, (c * 4 + y * 2 + x) as f32);
        }
        // Zero input leaves the weights untouched; the bias moves by lr * delta.
        assert_eq!(layer.weights()[[3, 0]], 3.0);
        assert!((layer.biases()[0] + 0.01).abs() < 1e-7);
    }

    #[test]
    fn test_dense_contract_violations() {
        let mut layer = single_unit(0.5, 0.0);
        assert!(matches!(layer.read_output(0), Err(MinervaError::PreconditionViolation(_))));
        assert!(matches!(
            layer.backward(arr3(&[[[1.0]]]).view(), 0.1),
            Err(MinervaError::PreconditionViolation(_))
        ));
        assert!(matches!(
            layer.forward(Array3::zeros((1, 2, 2)).view()),
            Err(MinervaError::DimensionMismatch { .. })
        ));

        layer.forward(arr3(&[[[1.0]]]).view()).unwrap();
        assert!(matches!(
            layer.backward(Array3::zeros((1, 1, 2)).view(), 0.1),
            Err(MinervaError::DimensionMismatch { .. })
        ));
        layer.backward(arr3(&[[[1.0]]]).view(), 0.1).unwrap();
        assert!(layer.backward(arr3(&[[[1.0]]]).view(), 0.1).is_err());
        // Scores stay readable until the next forward pass.
        assert!(layer.read_output(0).is_ok());
    }
}
