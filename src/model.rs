//! Sequential model: an ordered stack of exclusively owned layers.
//!
//! The model threads values left to right in [`Model::forward`], gradients
//! right to left in [`Model::backward`], and asks every layer to apply and
//! clear its accumulated gradients in [`Model::update_weights`].
//!
//! # File format
//!
//! Plain text, whitespace-separated tokens, one block per layer in
//! composition order: the layer's type tag on its own line followed by
//! whatever the layer writes in [`Layer::serialize`].

use crate::error::{NnError, Result};
use crate::layers::{Layer, LayerRegistry};
use crate::utils::TokenReader;
use log::{debug, info};
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Default)]
pub struct Model {
    layers: Vec<Box<dyn Layer>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a boxed layer at the end of the stack.
    pub fn add(&mut self, layer: Box<dyn Layer>) {
        self.layers.push(layer);
    }

    /// Append a layer at the end of the stack.
    pub fn push<L: Layer + 'static>(&mut self, layer: L) {
        self.add(Box::new(layer));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    /// Total trainable parameters across all layers.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.parameter_count()).sum()
    }

    /// Run `input` through every layer in order.
    ///
    /// Width compatibility between neighbouring layers is only checked here,
    /// since dense layers may learn their input width on this very call.
    pub fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let mut value = input.to_vec();
        for layer in self.layers.iter_mut() {
            value = layer.forward(&value)?;
        }
        Ok(value)
    }

    /// Propagate the loss gradient through every layer in reverse order and
    /// return the gradient w.r.t. the model input.
    ///
    /// Parameter gradients are accumulated inside the layers until the next
    /// [`Model::update_weights`].
    ///
    /// # Errors
    ///
    /// A layer that rejects its gradient leaves its own forward cache and
    /// accumulators untouched, so a wrong-length `output_gradient` changes
    /// nothing. A failure further left is not rolled back: the layers to its
    /// right have already consumed their caches and added to their gradients.
    /// Run [`Model::forward`] again before retrying, and skip
    /// [`Model::update_weights`] for that sample.
    pub fn backward(&mut self, output_gradient: &[f32]) -> Result<Vec<f32>> {
        let mut gradient = output_gradient.to_vec();
        for layer in self.layers.iter_mut().rev() {
            gradient = layer.backward(&gradient)?;
        }
        Ok(gradient)
    }

    /// Plain SGD step on every layer, then reset all accumulators.
    pub fn update_weights(&mut self, learning_rate: f32) {
        for layer in self.layers.iter_mut() {
            layer.update_weights(learning_rate);
        }
    }

    /// Render the model in the text file format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for layer in &self.layers {
            out.push_str(layer.type_tag());
            out.push('\n');
            layer.serialize(&mut out);
        }
        out
    }

    /// Parse a model using the built-in layer types.
    pub fn from_text(text: &str) -> Result<Self> {
        Self::from_text_with(text, &LayerRegistry::default())
    }

    /// Parse a model, resolving type tags through `registry`.
    ///
    /// Reads blocks until the input is exhausted. Any failure aborts the whole
    /// load; a partially built model is never returned.
    pub fn from_text_with(text: &str, registry: &LayerRegistry) -> Result<Self> {
        let mut tokens = TokenReader::new(text);
        let mut model = Model::new();

        while let Some(tag) = tokens.next_token() {
            let index = model.len();
            let mut layer = registry.create(tag)?;
            layer
                .deserialize(&mut tokens)
                .map_err(|source| NnError::Load {
                    index,
                    layer: tag.to_string(),
                    source: Box::new(source),
                })?;
            debug!("loaded layer {} ({})", index, tag);
            model.add(layer);
        }

        Ok(model)
    }

    /// Write the model to `path`, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_text())?;
        info!(
            "saved model with {} layers ({} parameters) to {}",
            self.len(),
            self.parameter_count(),
            path.display()
        );
        Ok(())
    }

    /// Read a model from `path` using the built-in layer types.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(path, &LayerRegistry::default())
    }

    /// Read a model from `path`, resolving type tags through `registry`.
    pub fn load_with<P: AsRef<Path>>(path: P, registry: &LayerRegistry) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let model = Self::from_text_with(&text, registry)?;
        info!("loaded model with {} layers from {}", model.len(), path.display());
        Ok(model)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.layers.iter().map(|layer| layer.type_tag()))
            .finish()
    }
}
