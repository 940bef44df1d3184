//! Minimal neural-network toolkit
//!
//! Dense, 2D convolution, max-pooling and flatten layers composed into a
//! sequential model, trained by manual backpropagation and plain gradient
//! descent, with plain-text save/load.
//!
//! # Modules
//!
//! - `layers`: Layer trait, its four implementations and the load registry
//! - `model`: Sequential composition and persistence
//! - `loss`: Loss functions handed to the trainer
//! - `trainer`: Single-sample SGD steps
//! - `utils`: RNG, activation functions, token stream
//! - `config`: Training configuration
//! - `architecture`: JSON architecture configuration and model building
//! - `error`: Crate error type

pub mod architecture;
pub mod config;
pub mod error;
pub mod layers;
pub mod loss;
pub mod model;
pub mod trainer;
pub mod utils;

pub use error::{NnError, Result};
pub use model::Model;
