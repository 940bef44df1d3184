//! Shared utilities for the layer implementations
//!
//! Random number generation, activation functions and the token stream used
//! by model persistence.

pub mod activations;
pub mod rng;
pub mod tokens;

pub use activations::Activation;
pub use rng::SimpleRng;
pub use tokens::TokenReader;
