//! Max pooling layer for downsampling spatial data
//!
//! Pooling has no learnable parameters. Forward records, for every output
//! cell, which input coordinate held the maximum; backward routes each output
//! error to exactly that coordinate.

use ndarray::{Array3, ArrayView3};
use serde::{Serialize, Deserialize};
use tracing::trace;

use crate::error::{MinervaError, Result};
use crate::layers::traits::Layer;
use crate::volume::{self, Shape, Volume};

/// Max pooling over square windows of a square input volume.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MaxPoolingLayer {
    input_size: usize,
    input_depth: usize,
    window_size: usize,
    stride: usize,
    output_size: usize,

    /// Absolute `(row, col)` of the maximum for each `[channel, out_row, out_col]`
    #[serde(skip)]
    max_indices: Option<Array3<(usize, usize)>>,
}

impl MaxPoolingLayer {
    /// Create a new max pooling layer
    pub fn new(input_size: usize, input_depth: usize, window_size: usize, stride: usize) -> Result<Self> {
        if input_depth == 0 {
            return Err(MinervaError::invalid_parameter("input_depth", "must be positive"));
        }
        let output_size = volume::window_output_size(input_size, window_size, stride)?;

        Ok(MaxPoolingLayer {
            input_size,
            input_depth,
            window_size,
            stride,
            output_size,
            max_indices: None,
        })
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn input_depth(&self) -> usize {
        self.input_depth
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Index map recorded by the last forward pass, if not yet consumed
    pub fn max_indices(&self) -> Option<&Array3<(usize, usize)>> {
        self.max_indices.as_ref()
    }

    pub fn validate(&self) -> Result<()> {
        let output_size = volume::window_output_size(self.input_size, self.window_size, self.stride)?;
        if output_size != self.output_size {
            return Err(MinervaError::invalid_parameter(
                "output_size".to_string(),
                format!("recorded {} but parameters give {}", self.output_size, output_size),
            ));
        }
        Ok(())
    }
}

impl Layer for MaxPoolingLayer {
    fn forward(&mut self, input: ArrayView3<f32>) -> Result<Volume> {
        volume::ensure_shape(&input, self.input_shape())?;

        let shape = self.output_shape();
        let mut output = Array3::zeros(shape);
        let mut indices = Array3::from_elem(shape, (0, 0));

        for c in 0..self.input_depth {
            for oh in 0..self.output_size {
                for ow in 0..self.output_size {
                    let top = oh * self.stride;
                    let left = ow * self.stride;

                    // Only a strictly greater value replaces the running maximum,
                    // so the first of several equal values wins.
                    let mut max_val = f32::NEG_INFINITY;
                    let mut max_pos = (top, left);

                    for h in top..top + self.window_size {
                        for w in left..left + self.window_size {
                            let val = input[[c, h, w]];
                            if val > max_val {
                                max_val = val;
                                max_pos = (h, w);
                            }
                        }
                    }

                    output[[c, oh, ow]] = max_val;
                    indices[[c, oh, ow]] = max_pos;
                }
            }
        }

        self.max_indices = Some(indices);
        trace!(depth = self.input_depth, output_size = self.output_size, "max pooling forward");
        Ok(output)
    }

    /// The returned buffer starts zeroed on every call; when overlapping
    /// windows pick the same input cell their errors are summed.
    fn backward(&mut self, output_error: ArrayView3<f32>, _learning_rate: f32) -> Result<Volume> {
        volume::ensure_shape(&output_error, self.output_shape())?;
        let indices = self.max_indices.take().ok_or_else(|| {
            MinervaError::precondition("max pooling backward called without a preceding forward")
        })?;

        let mut input_error = Array3::zeros(self.input_shape());
        for ((c, oh, ow), &(h, w)) in indices.indexed_iter() {
            input_error[[c, h, w]] += output_error[[c, oh, ow]];
        }

        trace!(depth = self.input_depth, "max pooling backward");
        Ok(input_error)
    }

    fn read_output(&self, _index: usize) -> Result<f32> {
        Err(MinervaError::precondition(
            "read_output is not supported on a max pooling layer; only the terminal dense layer produces scores",
        ))
    }

    fn input_shape(&self) -> Shape {
        (self.input_depth, self.input_size, self.input_size)
    }

    fn output_shape(&self) -> Shape {
        (self.input_depth, self.output_size, self.output_size)
    }

    fn parameter_count(&self) -> usize {
        0
    }

    fn has_forward_cache(&self) -> bool {
        self.max_indices.is_some()
    }
}
