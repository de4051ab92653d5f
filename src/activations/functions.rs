use ndarray::{Array, Dimension};
use serde::{Serialize, Deserialize};

/// The activations used by the engine's layer kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// `max(0, x)`, used after every convolution
    Relu,
    /// `1 / (1 + e^-x)`, used by the terminal dense layer
    Sigmoid,
}

impl Activation {
    /// Apply the activation to a single value.
    #[inline]
    pub fn apply_scalar(&self, x: f32) -> f32 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }

    /// Apply the activation to an array of any dimension in-place.
    pub fn apply<D: Dimension>(&self, input: &mut Array<f32, D>) {
        let activation = *self;
        input.mapv_inplace(|v| activation.apply_scalar(v));
    }

    /// Derivative expressed in terms of the activation's own output `y`.
    ///
    /// ReLU passes gradient only where the stored output is strictly positive;
    /// sigmoid's derivative is `y(1 - y)`.
    #[inline]
    pub fn derivative_from_output(&self, y: f32) -> f32 {
        match self {
            Activation::Relu => {
                if y > 0.0 { 1.0 } else { 0.0 }
            }
            Activation::Sigmoid => y * (1.0 - y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_relu() {
        let mut data = array![1.0, -0.5, 0.0, 2.0];
        Activation::Relu.apply(&mut data);
        assert_eq!(data, array![1.0, 0.0, 0.0, 2.0]);
        assert_eq!(Activation::Relu.derivative_from_output(0.0), 0.0);
        assert_eq!(Activation::Relu.derivative_from_output(0.3), 1.0);
    }

    #[test]
    fn test_sigmoid() {
        assert!((Activation::Sigmoid.apply_scalar(0.0) - 0.5).abs() < 1e-7);
        assert!(Activation::Sigmoid.apply_scalar(40.0) <= 1.0);
        assert!(Activation::Sigmoid.apply_scalar(-40.0) >= 0.0);
        assert!((Activation::Sigmoid.derivative_from_output(0.5) - 0.25).abs() < 1e-7);
    }
}
