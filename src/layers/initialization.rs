use ndarray::{Array, Dimension, ShapeBuilder};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Normal;
use serde::{Serialize, Deserialize};

use crate::error::{MinervaError, Result};

/// Weight initialization strategies.
///
/// Every strategy draws from a caller-supplied generator so that a network
/// seeded once produces the same weights on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeightInit {
    /// He/Kaiming normal initialization (for ReLU): `N(0, sqrt(2 / fan_in))`
    HeNormal { fan_in: usize },

    /// Normal distribution with custom mean and std
    Normal { mean: f32, std: f32 },

    /// Every element set to the same value
    Constant(f32),

    /// All zeros
    Zeros,
}

impl WeightInit {
    /// Standard deviation of He initialization for the given fan-in
    pub fn he_std(fan_in: usize) -> Result<f32> {
        if fan_in == 0 {
            return Err(MinervaError::invalid_parameter("fan_in", "must be positive"));
        }
        Ok((2.0 / fan_in as f32).sqrt())
    }

    /// Build an array of the given shape filled according to this strategy.
    pub fn initialize<Sh, D, R>(&self, shape: Sh, rng: &mut R) -> Result<Array<f32, D>>
    where
        Sh: ShapeBuilder<Dim = D>,
        D: Dimension,
        R: Rng + ?Sized,
    {
        match self {
            WeightInit::HeNormal { fan_in } => {
                let std = Self::he_std(*fan_in)?;
                Ok(Array::random_using(shape, normal(0.0, std)?, rng))
            }

            WeightInit::Normal { mean, std } => {
                Ok(Array::random_using(shape, normal(*mean, *std)?, rng))
            }

            WeightInit::Constant(value) => Ok(Array::from_elem(shape, *value)),

            WeightInit::Zeros => Ok(Array::zeros(shape)),
        }
    }
}

fn normal(mean: f32, std: f32) -> Result<Normal<f32>> {
    if !mean.is_finite() || !std.is_finite() {
        return Err(MinervaError::invalid_parameter(
            "std".to_string(),
            format!("normal({}, {}) is not finite", mean, std),
        ));
    }
    if std < 0.0 {
        return Err(MinervaError::invalid_parameter(
            "std".to_string(),
            format!("{} must not be negative", std),
        ));
    }
    Normal::new(mean, std).map_err(|e| MinervaError::invalid_parameter("std".to_string(), e.to_string()))
}
