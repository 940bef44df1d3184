//! Layer trait definition for neural network layers
//!
//! This module defines the core Layer trait that all layer types must implement.
//! The trait provides a common interface for forward propagation, backward propagation,
//! parameter updates and persistence.

use crate::error::Result;
use crate::utils::TokenReader;

/// Core trait for neural network layers.
///
/// All layer types (Dense, Conv2D, MaxPool, Flatten) implement this trait so a
/// [`Model`](crate::model::Model) can own them as `Box<dyn Layer>` and drive them
/// uniformly in both directions.
///
/// Layers work on single samples: every vector is one flattened, row-major
/// (channel × height × width where spatial) f32 buffer.
///
/// # Example
///
/// ```ignore
/// let output = layer.forward(&input)?;
/// let grad_input = layer.backward(&grad_output)?;
/// layer.update_weights(0.1);
/// ```
pub trait Layer {
    /// Forward propagation through the layer.
    ///
    /// Computes the output for `input` and overwrites whatever the layer cached
    /// for the next backward call (last input, pre-activations, argmax map).
    ///
    /// # Errors
    ///
    /// [`NnError::ShapeMismatch`](crate::error::NnError::ShapeMismatch) when the
    /// input length disagrees with the layer's fixed or inferred input size.
    fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>>;

    /// Backward propagation through the layer.
    ///
    /// Given the gradient of the loss w.r.t. this layer's output, returns the
    /// gradient w.r.t. its input and adds the parameter gradients into the
    /// layer's accumulators. Consumes the cache of the most recent forward call,
    /// so two backward calls need a forward in between.
    ///
    /// # Errors
    ///
    /// [`NnError::ShapeMismatch`](crate::error::NnError::ShapeMismatch) when no
    /// forward call is cached or `output_gradient` has the wrong length.
    fn backward(&mut self, output_gradient: &[f32]) -> Result<Vec<f32>>;

    /// Apply the accumulated gradients with plain gradient descent
    /// (`w -= learning_rate * grad`), then reset the accumulators to zero.
    ///
    /// No-op for parameter-free layers.
    fn update_weights(&mut self, _learning_rate: f32) {}

    /// Tag identifying the layer variant in a model file.
    fn type_tag(&self) -> &'static str;

    /// Append the layer's header and parameters to `out`.
    ///
    /// The type tag itself is written by the model.
    fn serialize(&self, out: &mut String);

    /// Restore the layer from the token stream written by [`Layer::serialize`].
    ///
    /// Called on a default-constructed layer right after its tag was read.
    fn deserialize(&mut self, tokens: &mut TokenReader<'_>) -> Result<()>;

    /// Number of input values per sample, if known yet.
    fn input_size(&self) -> Option<usize>;

    /// Number of output values per sample, if known yet.
    fn output_size(&self) -> Option<usize>;

    /// Number of trainable parameters (weights and biases).
    fn parameter_count(&self) -> usize {
        0
    }
}

/// Apply `params -= learning_rate * grads` and zero `grads`.
pub(crate) fn sgd_step(params: &mut [f32], grads: &mut [f32], learning_rate: f32) {
    for (param, grad) in params.iter_mut().zip(grads.iter_mut()) {
        *param -= learning_rate * *grad;
        *grad = 0.0;
    }
}
