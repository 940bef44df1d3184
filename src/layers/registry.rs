//! Type-tag to constructor mapping used when loading a model.

use crate::error::{NnError, Result};
use crate::layers::{Conv2DLayer, DenseLayer, FlattenLayer, Layer, MaxPoolLayer};
use std::collections::HashMap;

/// Builds an empty layer that is then filled by [`Layer::deserialize`].
pub type LayerFactory = fn() -> Box<dyn Layer>;

/// Registered layer factories keyed by type tag.
///
/// `LayerRegistry::default()` knows the built-in `Dense`, `Conv2D`, `MaxPool`
/// and `Flatten` layers; custom layers can be added with
/// [`LayerRegistry::register`].
pub struct LayerRegistry {
    factories: HashMap<String, LayerFactory>,
}

impl LayerRegistry {
    /// A registry without any layer types.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for `tag`.
    pub fn register(&mut self, tag: &str, factory: LayerFactory) {
        self.factories.insert(tag.to_string(), factory);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Construct an empty layer for `tag`.
    pub fn create(&self, tag: &str) -> Result<Box<dyn Layer>> {
        self.factories
            .get(tag)
            .map(|factory| factory())
            .ok_or_else(|| NnError::UnknownLayerType(tag.to_string()))
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("Dense", || -> Box<dyn Layer> { Box::new(DenseLayer::default()) });
        registry.register("Conv2D", || -> Box<dyn Layer> { Box::new(Conv2DLayer::default()) });
        registry.register("MaxPool", || -> Box<dyn Layer> { Box::new(MaxPoolLayer::default()) });
        registry.register("Flatten", || -> Box<dyn Layer> { Box::new(FlattenLayer::new()) });
        registry
    }
}
