//! # Activation Functions Module
//!
//! The two non-linearities the engine uses:
//!
//! - **ReLU**: `max(0, x)`, applied after every convolution. Its backward gate
//!   is read off the stored output: positive passes, zero blocks.
//! - **Sigmoid**: `1 / (1 + e^(-x))`, applied by the dense output layer. Its
//!   derivative in terms of its own output is `y(1 - y)`.
//!
//! ## Usage Example
//!
//! ```rust
//! use minerva::activations::Activation;
//! use ndarray::array;
//!
//! let mut data = array![1.0, -0.5, 0.0, 2.0];
//! Activation::Relu.apply(&mut data);
//! assert_eq!(data, array![1.0, 0.0, 0.0, 2.0]);
//! ```

pub mod functions;

pub use functions::Activation;
