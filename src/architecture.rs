//! Architecture configuration structures
//!
//! This module provides configuration structures for defining a layer stack
//! via JSON files, so architectures can be changed without code changes.

use crate::error::{NnError, Result};
use crate::layers::{Conv2DLayer, DenseLayer, FlattenLayer, MaxPoolLayer};
use crate::model::Model;
use crate::utils::{Activation, SimpleRng};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Configuration for a single layer in the network.
///
/// Different layer types require different fields:
///
/// - **dense**: Requires `output_size`; optional `input_size` (inferred from
///   the first forward call when absent) and `activation` (default "linear")
/// - **conv2d**: Requires `input_height`, `input_width`, `in_channels`,
///   `kernel_size`, `out_channels`; optional `stride` (default 1) and
///   `padding` (default 0)
/// - **maxpool**: Requires `input_height`, `input_width`, `channels`, `pool_size`
/// - **flatten**: No fields
///
/// # Examples
///
/// ```json
/// {
///   "layer_type": "conv2d",
///   "input_height": 28,
///   "input_width": 28,
///   "in_channels": 1,
///   "kernel_size": 3,
///   "out_channels": 8,
///   "padding": 1
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerConfig {
    /// Type of layer: "dense", "conv2d", "maxpool" or "flatten"
    pub layer_type: String,

    // Dense layer parameters
    pub input_size: Option<usize>,
    pub output_size: Option<usize>,
    pub activation: Option<String>,

    // Spatial input shape (conv2d, maxpool)
    pub input_height: Option<usize>,
    pub input_width: Option<usize>,

    // Conv2D layer parameters
    pub in_channels: Option<usize>,
    pub kernel_size: Option<usize>,
    pub out_channels: Option<usize>,
    pub stride: Option<usize>,
    pub padding: Option<usize>,

    // MaxPool layer parameters
    pub channels: Option<usize>,
    pub pool_size: Option<usize>,
}

/// Configuration for the entire network: layers in application order.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchitectureConfig {
    pub layers: Vec<LayerConfig>,
}

/// Loads and validates an architecture configuration from a JSON file.
///
/// # Examples
///
/// ```no_run
/// use tiny_nn::architecture::load_architecture;
///
/// let arch = load_architecture("config/architectures/xor.json").unwrap();
/// assert!(!arch.layers.is_empty());
/// ```
pub fn load_architecture<P: AsRef<Path>>(path: P) -> Result<ArchitectureConfig> {
    let contents = fs::read_to_string(path)?;
    let config: ArchitectureConfig = serde_json::from_str(&contents)?;
    validate_architecture(&config)?;
    Ok(config)
}

fn require(value: Option<usize>, index: usize, layer: &str, field: &str) -> Result<usize> {
    match value {
        Some(0) => Err(NnError::InvalidConfig(format!(
            "Layer {index}: {field} must be greater than 0"
        ))),
        Some(v) => Ok(v),
        None => Err(NnError::InvalidConfig(format!(
            "Layer {index}: {layer} layer requires '{field}'"
        ))),
    }
}

fn activation_of(layer: &LayerConfig) -> Result<Activation> {
    match &layer.activation {
        Some(name) => name.parse(),
        None => Ok(Activation::Linear),
    }
}

/// Statically known (input, output) widths of a validated layer.
///
/// `previous` is the output width of the layer before, which flatten passes on.
fn layer_widths(
    layer: &LayerConfig,
    index: usize,
    previous: Option<usize>,
) -> Result<(Option<usize>, Option<usize>)> {
    match layer.layer_type.to_lowercase().as_str() {
        "dense" => {
            let output = require(layer.output_size, index, "Dense", "output_size")?;
            if layer.input_size == Some(0) {
                return Err(NnError::InvalidConfig(format!(
                    "Layer {index}: input_size must be greater than 0"
                )));
            }
            activation_of(layer)?;
            Ok((layer.input_size, Some(output)))
        }
        "conv2d" => {
            let height = require(layer.input_height, index, "Conv2D", "input_height")?;
            let width = require(layer.input_width, index, "Conv2D", "input_width")?;
            let in_channels = require(layer.in_channels, index, "Conv2D", "in_channels")?;
            let kernel = require(layer.kernel_size, index, "Conv2D", "kernel_size")?;
            let out_channels = require(layer.out_channels, index, "Conv2D", "out_channels")?;
            let stride = require(Some(layer.stride.unwrap_or(1)), index, "Conv2D", "stride")?;
            let padding = layer.padding.unwrap_or(0);

            let too_large = || {
                NnError::InvalidConfig(format!(
                    "Layer {index}: Conv2D shape {in_channels}x{height}x{width} with padding {padding} is too large"
                ))
            };
            let border = padding.checked_mul(2).ok_or_else(too_large)?;
            let padded_h = height.checked_add(border).ok_or_else(too_large)?;
            let padded_w = width.checked_add(border).ok_or_else(too_large)?;
            if padded_h < kernel || padded_w < kernel {
                return Err(NnError::InvalidConfig(format!(
                    "Layer {index}: Conv2D kernel_size {kernel} does not fit the padded {height}x{width} input"
                )));
            }
            let out_h = (padded_h - kernel) / stride + 1;
            let out_w = (padded_w - kernel) / stride + 1;
            let input = in_channels
                .checked_mul(height)
                .and_then(|len| len.checked_mul(width))
                .ok_or_else(too_large)?;
            let output = out_channels
                .checked_mul(out_h)
                .and_then(|len| len.checked_mul(out_w))
                .ok_or_else(too_large)?;
            Ok((Some(input), Some(output)))
        }
        "maxpool" => {
            let height = require(layer.input_height, index, "MaxPool", "input_height")?;
            let width = require(layer.input_width, index, "MaxPool", "input_width")?;
            let channels = require(layer.channels, index, "MaxPool", "channels")?;
            let pool = require(layer.pool_size, index, "MaxPool", "pool_size")?;
            if height % pool != 0 || width % pool != 0 {
                return Err(NnError::InvalidConfig(format!(
                    "Layer {index}: MaxPool input {height}x{width} is not divisible by pool_size {pool}"
                )));
            }
            let input = channels
                .checked_mul(height)
                .and_then(|len| len.checked_mul(width))
                .ok_or_else(|| {
                    NnError::InvalidConfig(format!(
                        "Layer {index}: MaxPool input {channels}x{height}x{width} is too large"
                    ))
                })?;
            // Pooling only shrinks, so the output length cannot overflow.
            Ok((Some(input), Some(channels * (height / pool) * (width / pool))))
        }
        "flatten" => Ok((previous, previous)),
        _ => Err(NnError::InvalidConfig(format!(
            "Layer {}: Invalid layer type '{}'. Must be one of: dense, conv2d, maxpool, flatten",
            index, layer.layer_type
        ))),
    }
}

/// Validates an architecture configuration.
///
/// Checks that:
/// - Architecture has at least one layer
/// - Each layer has the required fields for its type, within valid ranges
/// - Wherever both widths are known statically, the output width of layer i
///   matches the input width of layer i+1
pub fn validate_architecture(config: &ArchitectureConfig) -> Result<()> {
    if config.layers.is_empty() {
        return Err(NnError::InvalidConfig(
            "Architecture must have at least one layer".to_string(),
        ));
    }

    let mut previous: Option<usize> = None;
    for (i, layer) in config.layers.iter().enumerate() {
        let (input, output) = layer_widths(layer, i, previous)?;
        if let (Some(prev), Some(input)) = (previous, input) {
            if prev != input {
                return Err(NnError::InvalidConfig(format!(
                    "Layer connection mismatch: Layer {} output size ({}) does not match Layer {} input size ({})",
                    i - 1,
                    prev,
                    i,
                    input
                )));
            }
        }
        previous = output;
    }

    Ok(())
}

/// Builds a model from an architecture configuration.
///
/// Layers are created in configuration order; `rng` drives every weight
/// initialisation.
///
/// # Examples
///
/// ```no_run
/// use tiny_nn::architecture::{build_model, load_architecture};
/// use tiny_nn::utils::SimpleRng;
///
/// let config = load_architecture("config/architectures/xor.json").unwrap();
/// let mut rng = SimpleRng::new(42);
/// let model = build_model(&config, &mut rng).unwrap();
/// assert_eq!(model.len(), config.layers.len());
/// ```
pub fn build_model(config: &ArchitectureConfig, rng: &mut SimpleRng) -> Result<Model> {
    validate_architecture(config)?;

    let mut model = Model::new();
    for (i, layer) in config.layers.iter().enumerate() {
        match layer.layer_type.to_lowercase().as_str() {
            "dense" => {
                let output = require(layer.output_size, i, "Dense", "output_size")?;
                let activation = activation_of(layer)?;
                match layer.input_size {
                    Some(input) => {
                        model.push(DenseLayer::with_input_size(input, output, activation, rng))
                    }
                    None => model.push(DenseLayer::new(output, activation, rng)),
                }
            }
            "conv2d" => model.push(Conv2DLayer::new(
                require(layer.input_height, i, "Conv2D", "input_height")?,
                require(layer.input_width, i, "Conv2D", "input_width")?,
                require(layer.in_channels, i, "Conv2D", "in_channels")?,
                require(layer.kernel_size, i, "Conv2D", "kernel_size")?,
                require(layer.out_channels, i, "Conv2D", "out_channels")?,
                layer.stride.unwrap_or(1),
                layer.padding.unwrap_or(0),
                rng,
            )?),
            "maxpool" => model.push(MaxPoolLayer::new(
                require(layer.input_height, i, "MaxPool", "input_height")?,
                require(layer.input_width, i, "MaxPool", "input_width")?,
                require(layer.channels, i, "MaxPool", "channels")?,
                require(layer.pool_size, i, "MaxPool", "pool_size")?,
            )?),
            "flatten" => model.push(FlattenLayer::new()),
            other => {
                return Err(NnError::InvalidConfig(format!(
                    "Layer {i}: Invalid layer type '{other}'"
                )))
            }
        }
    }

    Ok(model)
}
