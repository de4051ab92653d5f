//! Loss functions for training.
//!
//! The engine trains against one-hot targets with mean squared error; the
//! gradient of that loss is the error signal fed into the terminal layer.

pub mod functions;

pub use functions::{one_hot, Loss, MSE};
