//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait and its four implementations, plus the
//! registry used to rebuild layers from a saved model.

mod r#trait;
pub mod conv2d;
pub mod dense;
pub mod flatten;
pub mod maxpool;
pub mod registry;

// Re-export the Layer trait for convenience
pub use conv2d::Conv2DLayer;
pub use dense::DenseLayer;
pub use flatten::FlattenLayer;
pub use maxpool::MaxPoolLayer;
pub use r#trait::Layer;
pub use registry::{LayerFactory, LayerRegistry};
