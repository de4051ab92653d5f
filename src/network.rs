use ndarray::{Array1, ArrayView3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use bincode::{serialize, deserialize};
use tracing::{debug, info, trace};

use crate::error::{MinervaError, Result};
use crate::layers::{check_learning_rate, ConvolutionLayer, DenseLayer, Layer, LayerWrapper, MaxPoolingLayer};
use crate::loss::{one_hot, Loss, MSE};
use crate::volume::{self, Volume};

/// A convolutional network: an ordered, append-only stack of layers trained
/// one sample at a time with fixed-rate SGD.
///
/// Every layer draws its initial weights from its own generator, seeded from
/// the network seed and the layer's position, so a network is fully
/// reproducible from `(seed, layer sequence)`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Network {
    layers: Vec<LayerWrapper>,
    learning_rate: f32,
    seed: u64,

    /// Scores of the last forward pass not yet consumed by `backward`
    #[serde(skip)]
    pending_scores: Option<Array1<f32>>,
}

impl Network {
    /// Create an empty network.
    pub fn new(learning_rate: f32, seed: u64) -> Result<Self> {
        check_learning_rate(learning_rate)?;
        Ok(Network {
            layers: Vec::new(),
            learning_rate,
            seed,
            pending_scores: None,
        })
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn layers(&self) -> &[LayerWrapper] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Length of the score vector `forward` returns
    pub fn output_size(&self) -> usize {
        self.layers
            .last()
            .map(|layer| {
                let (d, h, w) = layer.output_shape();
                d * h * w
            })
            .unwrap_or(0)
    }

    /// Total number of learnable scalars
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.parameter_count()).sum()
    }

    /// Generator for the layer about to be appended
    fn layer_rng(&self) -> StdRng {
        let index = self.layers.len() as u64 + 1;
        StdRng::seed_from_u64(self.seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Append a convolution + ReLU layer
    pub fn add_convolution_layer(
        &mut self,
        input_size: usize,
        input_depth: usize,
        num_filters: usize,
        kernel_size: usize,
        stride: usize,
    ) -> Result<()> {
        let mut rng = self.layer_rng();
        let layer = ConvolutionLayer::new(input_size, input_depth, num_filters, kernel_size, stride, &mut rng)?;
        self.push_layer(layer)
    }

    /// Append a max pooling layer
    pub fn add_max_pooling_layer(
        &mut self,
        input_size: usize,
        input_depth: usize,
        window_size: usize,
        stride: usize,
    ) -> Result<()> {
        let layer = MaxPoolingLayer::new(input_size, input_depth, window_size, stride)?;
        self.push_layer(layer)
    }

    /// Append a fully connected sigmoid layer
    pub fn add_dense_layer(&mut self, input_width: usize, input_depth: usize, output_size: usize) -> Result<()> {
        let mut rng = self.layer_rng();
        let layer = DenseLayer::new(input_width, input_depth, output_size, &mut rng)?;
        self.push_layer(layer)
    }

    /// Append an already constructed layer. Its input shape must equal the
    /// previous layer's output shape.
    pub fn push_layer<L: Into<LayerWrapper>>(&mut self, layer: L) -> Result<()> {
        let layer = layer.into();
        if let Some(previous) = self.layers.last() {
            if previous.output_shape() != layer.input_shape() {
                return Err(MinervaError::InvalidParameter {
                    name: "input_shape".to_string(),
                    reason: format!(
                        "{} layer expects {} but the previous {} layer produces {}",
                        layer.kind(),
                        volume::describe(layer.input_shape()),
                        previous.kind(),
                        volume::describe(previous.output_shape())
                    ),
                });
            }
        }

        debug!(
            index = self.layers.len(),
            kind = layer.kind(),
            input = %volume::describe(layer.input_shape()),
            output = %volume::describe(layer.output_shape()),
            parameters = layer.parameter_count(),
            "added layer"
        );
        self.layers.push(layer);
        self.pending_scores = None;
        Ok(())
    }

    /// Run one sample through every layer and return the flattened output of
    /// the last one.
    pub fn forward(&mut self, input: ArrayView3<f32>) -> Result<Array1<f32>> {
        self.pending_scores = None;
        let (first, rest) = self
            .layers
            .split_first_mut()
            .ok_or_else(|| MinervaError::precondition("forward called on a network without layers"))?;

        let mut current: Volume = first.forward(input)?;
        for layer in rest.iter_mut() {
            current = layer.forward(current.view())?;
        }

        let scores = volume::flatten(current.view());
        trace!(outputs = scores.len(), "network forward");
        self.pending_scores = Some(scores.clone());
        Ok(scores)
    }

    /// Scores held by the terminal layer from the most recent forward pass
    pub fn scores(&self) -> Result<Array1<f32>> {
        let terminal = self.terminal_dense()?;
        (0..terminal.output_size())
            .map(|i| terminal.read_output(i))
            .collect()
    }

    /// Error signal at the output: the mean-squared-error gradient
    /// `(2/C) * (score - onehot(label))`, shaped `1 × 1 × C`.
    pub fn compute_output_error(&self, label: usize) -> Result<Volume> {
        let scores = self.scores()?;
        let target = one_hot(label, scores.len())?;
        let error = MSE.gradient(scores.view(), target.view());
        Ok(volume::from_vector(error.view()))
    }

    /// Mean squared error of the most recent scores against `label`
    pub fn loss(&self, label: usize) -> Result<f32> {
        let scores = self.scores()?;
        let target = one_hot(label, scores.len())?;
        Ok(MSE.compute(scores.view(), target.view()))
    }

    /// Backpropagate the error for `label` through every layer in reverse,
    /// updating weights in place. Only valid right after `forward`.
    pub fn backward(&mut self, label: usize) -> Result<()> {
        if self.pending_scores.is_none() {
            return Err(MinervaError::precondition(
                "backward requires a forward pass on the same sample first",
            ));
        }
        if let Some(index) = self.layers.iter().position(|layer| !layer.has_forward_cache()) {
            return Err(MinervaError::precondition(format!(
                "layer {} ({}) holds no forward state",
                index,
                self.layers[index].kind()
            )));
        }
        let mut error = self.compute_output_error(label)?;
        self.pending_scores = None;

        for layer in self.layers.iter_mut().rev() {
            error = layer.backward(error.view(), self.learning_rate)?;
        }
        trace!(label, "network backward");
        Ok(())
    }

    /// Forward then backward for one labelled sample; returns the scores
    /// produced before the update.
    pub fn train_sample(&mut self, input: ArrayView3<f32>, label: usize) -> Result<Array1<f32>> {
        if label >= self.output_size() {
            return Err(MinervaError::invalid_parameter(
                "label".to_string(),
                format!("{} is not one of {} classes", label, self.output_size()),
            ));
        }
        let scores = self.forward(input)?;
        self.backward(label)?;
        Ok(scores)
    }

    /// Read one learnable scalar of layer `layer`
    pub fn parameter(&self, layer: usize, index: usize) -> Option<f32> {
        self.layers.get(layer).and_then(|l| l.parameter(index))
    }

    /// Overwrite one learnable scalar of layer `layer`
    pub fn set_parameter(&mut self, layer: usize, index: usize, value: f32) -> Result<()> {
        let count = self.layers.len();
        self.layers
            .get_mut(layer)
            .ok_or_else(|| MinervaError::invalid_parameter("layer".to_string(), format!("{} >= {}", layer, count)))?
            .set_parameter(index, value)
    }

    pub(crate) fn set_learning_rate(&mut self, learning_rate: f32) -> Result<()> {
        check_learning_rate(learning_rate)?;
        self.learning_rate = learning_rate;
        Ok(())
    }

    fn terminal_dense(&self) -> Result<&DenseLayer> {
        let terminal = self
            .layers
            .last()
            .ok_or_else(|| MinervaError::precondition("network has no layers"))?;
        terminal.as_dense().ok_or_else(|| {
            MinervaError::precondition(format!(
                "the terminal layer is {}; scores can only be read from a Dense layer",
                terminal.kind()
            ))
        })
    }

    /// Check every layer's tensors and the chaining between layers.
    pub fn validate(&self) -> Result<()> {
        check_learning_rate(self.learning_rate)?;
        for layer in &self.layers {
            layer.validate()?;
        }
        for pair in self.layers.windows(2) {
            if pair[0].output_shape() != pair[1].input_shape() {
                return Err(MinervaError::dimension_mismatch(
                    volume::describe(pair[1].input_shape()),
                    volume::describe(pair[0].output_shape()),
                ));
            }
        }
        Ok(())
    }

    /// Save the network's layers and hyper-parameters to a file.
    /// Per-sample caches are not saved.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serialize(self)?;
        let mut file = fs::File::create(path.as_ref())?;
        file.write_all(&serialized)?;
        info!(path = %path.as_ref().display(), layers = self.layers.len(), "saved network");
        Ok(())
    }

    /// Load a network written by [`Network::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = fs::File::open(path.as_ref())?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        let network: Self = deserialize(&buffer)?;
        network.validate()?;
        info!(path = %path.as_ref().display(), layers = network.layers.len(), "loaded network");
        Ok(network)
    }

    /// Encode as JSON; each layer is tagged with its kind.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let network: Self = serde_json::from_str(json)?;
        network.validate()?;
        Ok(network)
    }
}
