//! # Minerva - A From-Scratch Convolutional Network Engine
//!
//! Minerva is a small convolutional neural network engine: a linear stack of
//! layers that run forward inference on 3-D volumes and learn by per-sample
//! stochastic gradient descent.
//!
//! ## Key Features
//!
//! - **Layers**: convolution + ReLU, max pooling with index-tracked backward,
//!   and a fully connected sigmoid output layer
//! - **Training**: mean-squared-error output gradient and plain fixed-rate SGD,
//!   applied in place during the backward pass
//! - **Reproducibility**: He-initialized weights drawn from a seeded generator
//! - **Persistence**: networks round-trip through `bincode` files or JSON
//!
//! ## Quick Start
//!
//! ```rust
//! use minerva::builders::NetworkBuilder;
//! use ndarray::Array3;
//!
//! let mut network = NetworkBuilder::new()
//!     .learning_rate(0.01)
//!     .seed(42)
//!     .convolution(28, 1, 6, 5, 1)
//!     .max_pooling(24, 6, 2, 2)
//!     .convolution(12, 6, 9, 3, 1)
//!     .max_pooling(10, 9, 2, 2)
//!     .dense(5, 9, 10)
//!     .build()?;
//!
//! let image = Array3::<f32>::zeros((1, 28, 28));
//! let scores = network.forward(image.view())?;
//! assert_eq!(scores.len(), 10);
//! network.backward(3)?;
//! # Ok::<(), minerva::error::MinervaError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - ReLU and sigmoid
//! - [`builders`] - Fluent network construction
//! - [`config`] - JSON network configuration
//! - [`debug`] - Finite-difference gradient checks
//! - [`error`] - Error types and result handling
//! - [`layers`] - The layer trait and the three layer kinds
//! - [`loss`] - Mean squared error against one-hot targets
//! - [`network`] - The layer stack: forward, output error, backward
//! - [`volume`] - The 3-D data unit and shape arithmetic

pub mod activations;
pub mod builders;
pub mod config;
pub mod debug;
pub mod error;
pub mod layers;
pub mod loss;
pub mod network;
pub mod volume;

pub use error::{MinervaError, Result};
pub use network::Network;
pub use volume::Volume;
