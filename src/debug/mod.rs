//! Debugging utilities: finite-difference gradient checks for networks.

pub mod gradient_check;

pub use gradient_check::{analytic_gradient, gradient_norm, numerical_gradient, relative_error};
