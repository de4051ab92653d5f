use ndarray::{Array1, ArrayView1};

use crate::error::{MinervaError, Result};

/// Trait defining the interface for loss functions
pub trait Loss {
    /// Compute the loss for a single prediction and target
    fn compute(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> f32;

    /// Compute the gradient of the loss with respect to predictions
    fn gradient(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> Array1<f32>;
}

/// Mean Squared Error loss: `(1/C) * sum((y - t)^2)` over `C` outputs
#[derive(Debug, Clone, Copy, Default)]
pub struct MSE;

impl Loss for MSE {
    fn compute(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> f32 {
        let diff = &prediction - &target;
        (&diff * &diff).sum() / prediction.len() as f32
    }

    /// `(2/C) * (y - t)`
    fn gradient(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> Array1<f32> {
        (&prediction - &target) * (2.0 / prediction.len() as f32)
    }
}

/// One-hot target vector for a classification label
pub fn one_hot(label: usize, classes: usize) -> Result<Array1<f32>> {
    if label >= classes {
        return Err(MinervaError::invalid_parameter(
            "label".to_string(),
            format!("{} is not one of {} classes", label, classes),
        ));
    }
    let mut target = Array1::zeros(classes);
    target[label] = 1.0;
    Ok(target)
}
