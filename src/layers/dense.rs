//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer that performs the transformation
//! `output = activation(W · input + b)`.

use crate::error::{NnError, Result};
use crate::layers::r#trait::{sgd_step, Layer};
use crate::utils::tokens::write_f32_line;
use crate::utils::{Activation, SimpleRng, TokenReader};
use log::debug;

const TYPE_TAG: &str = "Dense";

/// Values recorded by the last forward call.
#[derive(Debug, Clone)]
struct DenseCache {
    input: Vec<f32>,
    preactivation: Vec<f32>,
}

/// Dense (fully connected) layer with weights, biases and an activation.
///
/// # Fields
///
/// * `input_size` - Number of input features, `None` until the first forward call
///   fixes it
/// * `output_size` - Number of output units
/// * `weights` - Weight matrix stored row-major by output unit (output_size × input_size)
/// * `biases` - Bias vector (output_size)
///
/// A layer built with [`DenseLayer::new`] is *unconfigured*: it allocates its
/// parameters with Glorot-uniform initialisation on the first forward call,
/// exactly once. Afterwards any input of a different length is rejected.
///
/// # Example
///
/// ```ignore
/// use tiny_nn::layers::DenseLayer;
/// use tiny_nn::utils::{Activation, SimpleRng};
///
/// let mut rng = SimpleRng::new(42);
/// let mut layer = DenseLayer::new(8, Activation::Relu, &mut rng);
/// let output = layer.forward(&[0.0, 1.0])?;
/// assert_eq!(output.len(), 8);
/// assert_eq!(layer.input_size(), Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct DenseLayer {
    input_size: Option<usize>,
    output_size: usize,
    activation: Activation,
    weights: Vec<f32>,
    biases: Vec<f32>,
    grad_weights: Vec<f32>,
    grad_biases: Vec<f32>,
    rng: SimpleRng,
    cache: Option<DenseCache>,
}

impl Default for DenseLayer {
    fn default() -> Self {
        Self {
            input_size: None,
            output_size: 0,
            activation: Activation::Linear,
            weights: Vec::new(),
            biases: Vec::new(),
            grad_weights: Vec::new(),
            grad_biases: Vec::new(),
            rng: SimpleRng::new(0),
            cache: None,
        }
    }
}

impl DenseLayer {
    /// Create an unconfigured layer whose input size is inferred on first use.
    ///
    /// The layer forks its own generator from `rng` so the deferred
    /// initialisation stays reproducible.
    pub fn new(output_size: usize, activation: Activation, rng: &mut SimpleRng) -> Self {
        Self {
            output_size,
            activation,
            rng: rng.fork(),
            ..Self::default()
        }
    }

    /// Create a layer with a known input size and initialise it immediately.
    ///
    /// An `input_size` of zero leaves the layer unconfigured, as [`DenseLayer::new`].
    pub fn with_input_size(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut SimpleRng,
    ) -> Self {
        let mut layer = Self::new(output_size, activation, rng);
        if input_size > 0 {
            layer.configure(input_size);
        }
        layer
    }

    /// Build a layer from explicit parameters.
    ///
    /// `weights` is row-major by output unit (output_size × input_size).
    pub fn from_parameters(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        weights: Vec<f32>,
        biases: Vec<f32>,
    ) -> Result<Self> {
        if input_size == 0 {
            return Err(NnError::InvalidConfig(
                "Dense input_size must be greater than 0".to_string(),
            ));
        }
        let weight_count = input_size.checked_mul(output_size).ok_or_else(|| {
            NnError::InvalidConfig(format!(
                "Dense shape {input_size} -> {output_size} is too large"
            ))
        })?;
        if weights.len() != weight_count {
            return Err(NnError::shape(TYPE_TAG, "weights", weights.len(), weight_count));
        }
        if biases.len() != output_size {
            return Err(NnError::shape(TYPE_TAG, "biases", biases.len(), output_size));
        }
        Ok(Self {
            input_size: Some(input_size),
            output_size,
            activation,
            grad_weights: vec![0.0; weights.len()],
            grad_biases: vec![0.0; output_size],
            weights,
            biases,
            ..Self::default()
        })
    }

    /// Glorot-uniform weights in [-limit, limit) with
    /// limit = sqrt(6 / (input_size + output_size)), zero biases.
    fn configure(&mut self, input_size: usize) {
        let limit = (6.0f32 / (input_size + self.output_size) as f32).sqrt();
        let weight_count = input_size * self.output_size;

        self.weights = (0..weight_count)
            .map(|_| self.rng.gen_range_f32(-limit, limit))
            .collect();
        self.biases = vec![0.0; self.output_size];
        self.grad_weights = vec![0.0; weight_count];
        self.grad_biases = vec![0.0; self.output_size];
        self.input_size = Some(input_size);

        debug!(
            "dense layer configured: {} -> {} ({}), glorot limit {:.4}",
            input_size, self.output_size, self.activation, limit
        );
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn is_configured(&self) -> bool {
        self.input_size.is_some()
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    pub fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    pub fn biases_mut(&mut self) -> &mut [f32] {
        &mut self.biases
    }

    /// Weight gradients accumulated since the last update.
    pub fn weight_gradients(&self) -> &[f32] {
        &self.grad_weights
    }

    /// Bias gradients accumulated since the last update.
    pub fn bias_gradients(&self) -> &[f32] {
        &self.grad_biases
    }
}

impl Layer for DenseLayer {
    fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let input_size = match self.input_size {
            Some(expected) if expected != input.len() => {
                return Err(NnError::shape(TYPE_TAG, "input", input.len(), expected));
            }
            Some(expected) => expected,
            // A zero-width layer could not be told apart from an
            // unconfigured one once saved.
            None if input.is_empty() => {
                return Err(NnError::InvalidConfig(
                    "Dense layer cannot infer its input size from an empty input".to_string(),
                ));
            }
            None => {
                if input.len().checked_mul(self.output_size).is_none() {
                    return Err(NnError::InvalidConfig(format!(
                        "Dense shape {} -> {} is too large",
                        input.len(),
                        self.output_size
                    )));
                }
                self.configure(input.len());
                input.len()
            }
        };

        let mut preactivation = vec![0.0f32; self.output_size];
        let mut output = vec![0.0f32; self.output_size];
        for j in 0..self.output_size {
            let row = &self.weights[j * input_size..(j + 1) * input_size];
            let mut sum = self.biases[j];
            for (x, w) in input.iter().zip(row.iter()) {
                sum += x * w;
            }
            preactivation[j] = sum;
            output[j] = self.activation.apply(sum);
        }

        self.cache = Some(DenseCache {
            input: input.to_vec(),
            preactivation,
        });
        Ok(output)
    }

    fn backward(&mut self, output_gradient: &[f32]) -> Result<Vec<f32>> {
        let expected = if self.cache.is_some() { self.output_size } else { 0 };
        let cache = match self.cache.take() {
            Some(cache) if output_gradient.len() == expected => cache,
            other => {
                self.cache = other;
                return Err(NnError::shape(
                    TYPE_TAG,
                    "output gradient",
                    output_gradient.len(),
                    expected,
                ));
            }
        };

        let input_size = cache.input.len();
        let mut input_gradient = vec![0.0f32; input_size];

        for j in 0..self.output_size {
            let delta = output_gradient[j] * self.activation.derivative(cache.preactivation[j]);
            self.grad_biases[j] += delta;

            let row = j * input_size;
            for i in 0..input_size {
                self.grad_weights[row + i] += delta * cache.input[i];
                input_gradient[i] += self.weights[row + i] * delta;
            }
        }

        Ok(input_gradient)
    }

    fn update_weights(&mut self, learning_rate: f32) {
        sgd_step(&mut self.weights, &mut self.grad_weights, learning_rate);
        sgd_step(&mut self.biases, &mut self.grad_biases, learning_rate);
    }

    fn type_tag(&self) -> &'static str {
        TYPE_TAG
    }

    fn serialize(&self, out: &mut String) {
        let input_size = self.input_size.unwrap_or(0);
        out.push_str(&format!("{} {}\n", input_size, self.output_size));
        out.push_str(self.activation.name());
        out.push('\n');
        write_f32_line(out, &self.weights);
        write_f32_line(out, &self.biases);
    }

    fn deserialize(&mut self, tokens: &mut TokenReader<'_>) -> Result<()> {
        let input_size = tokens.read_usize("dense input size")?;
        let output_size = tokens.read_usize("dense output size")?;
        let activation = tokens.expect_token("activation")?.parse::<Activation>()?;

        self.output_size = output_size;
        self.activation = activation;
        self.cache = None;

        if input_size == 0 {
            // Saved before its first forward call: still unconfigured.
            self.input_size = None;
            self.weights.clear();
            self.biases.clear();
            self.grad_weights.clear();
            self.grad_biases.clear();
            return Ok(());
        }

        let weight_count = input_size.checked_mul(output_size).ok_or_else(|| {
            NnError::Parse(format!(
                "dense shape {input_size} x {output_size} overflows the weight count"
            ))
        })?;
        self.weights = tokens.read_f32s(weight_count, "dense weight")?;
        self.biases = tokens.read_f32s(output_size, "dense bias")?;
        self.grad_weights = vec![0.0; self.weights.len()];
        self.grad_biases = vec![0.0; output_size];
        self.input_size = Some(input_size);
        Ok(())
    }

    fn input_size(&self) -> Option<usize> {
        self.input_size
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.output_size)
    }

    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}
