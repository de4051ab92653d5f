use ndarray::{Array1, ArrayView3};

use crate::error::{MinervaError, Result};
use crate::layers::Layer;
use crate::loss::one_hot;
use crate::network::Network;

/// Central finite-difference estimate of d(loss)/d(parameter) for one
/// learnable scalar of `layer`.
///
/// The loss on each side is accumulated in `f64` from the forward scores, so
/// the difference is limited by the `f32` forward pass rather than by a
/// second rounding of the loss. The parameter is restored afterwards and the
/// network is left holding a forward pass of the unperturbed input.
pub fn numerical_gradient(
    network: &mut Network,
    input: ArrayView3<f32>,
    label: usize,
    layer: usize,
    index: usize,
    epsilon: f32,
) -> Result<f32> {
    if epsilon.is_nan() || epsilon <= 0.0 {
        return Err(MinervaError::invalid_parameter("epsilon", "must be positive"));
    }
    let original = network.parameter(layer, index).ok_or_else(|| {
        MinervaError::invalid_parameter("index".to_string(), format!("layer {} has no parameter {}", layer, index))
    })?;

    network.set_parameter(layer, index, original + epsilon)?;
    let loss_plus = wide_loss(&network.forward(input)?, label)?;

    network.set_parameter(layer, index, original - epsilon)?;
    let loss_minus = wide_loss(&network.forward(input)?, label)?;

    network.set_parameter(layer, index, original)?;
    network.forward(input)?;

    // The perturbation actually applied, after f32 rounding of the parameter
    let step = f64::from(original + epsilon) - f64::from(original - epsilon);
    Ok(((loss_plus - loss_minus) / step) as f32)
}

/// Mean squared error against the one-hot target, summed in `f64`
fn wide_loss(scores: &Array1<f32>, label: usize) -> Result<f64> {
    let target = one_hot(label, scores.len())?;
    let sum: f64 = scores
        .iter()
        .zip(target.iter())
        .map(|(&y, &t)| {
            let diff = f64::from(y) - f64::from(t);
            diff * diff
        })
        .sum();
    Ok(sum / scores.len() as f64)
}

/// Gradient of the loss with respect to every learnable scalar of `layer`,
/// recovered from one SGD step taken on a copy of the network.
///
/// The copy runs with a learning rate of one, so the gradient is simply the
/// difference between the parameters before and after the step.
pub fn analytic_gradient(network: &Network, input: ArrayView3<f32>, label: usize, layer: usize) -> Result<Array1<f32>> {
    let count = network
        .layers()
        .get(layer)
        .map(|l| l.parameter_count())
        .ok_or_else(|| MinervaError::invalid_parameter("layer".to_string(), format!("{} out of range", layer)))?;

    let mut stepped = network.clone();
    stepped.set_learning_rate(1.0)?;
    stepped.forward(input)?;
    stepped.backward(label)?;

    (0..count)
        .map(|i| match (network.parameter(layer, i), stepped.parameter(layer, i)) {
            (Some(before), Some(after)) => Ok(before - after),
            _ => Err(MinervaError::precondition("parameter vanished during the SGD step")),
        })
        .collect()
}

/// `|a - b| / max(|a|, |b|)`, or zero when both are (nearly) zero
pub fn relative_error(a: f32, b: f32) -> f32 {
    let scale = a.abs().max(b.abs());
    if scale < 1e-12 {
        0.0
    } else {
        (a - b).abs() / scale
    }
}

/// Compute gradient norm for divergence diagnostics
pub fn gradient_norm(gradient: &Array1<f32>) -> f32 {
    gradient.iter().map(|&x| x * x).sum::<f32>().sqrt()
}
