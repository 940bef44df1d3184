//! 2D Convolutional layer implementation
//!
//! This module provides a Conv2DLayer that performs 2D convolution with
//! zero-padding and configurable stride, commonly used in computer vision tasks.

use crate::error::{NnError, Result};
use crate::layers::r#trait::{sgd_step, Layer};
use crate::utils::tokens::write_f32_line;
use crate::utils::{SimpleRng, TokenReader};

const TYPE_TAG: &str = "Conv2D";

/// 2D Convolutional layer with learnable filters.
///
/// Slides `out_channels` filters over a zero-padded input volume. No activation
/// is applied here; compose a separate layer for that.
///
/// # Fields
///
/// * `input_height`, `input_width`, `in_channels` - Shape of the input volume
/// * `kernel_size` - Size of the square kernel (kernel_size × kernel_size)
/// * `out_channels` - Number of output feature maps (number of filters)
/// * `stride` - Stride for the convolution operation
/// * `padding` - Zero-padding applied symmetrically on all sides
/// * `weights` - Filters (out_channels × in_channels × kernel_size × kernel_size)
/// * `biases` - Bias for each output channel (out_channels)
///
/// # Example
///
/// ```ignore
/// use tiny_nn::layers::Conv2DLayer;
/// use tiny_nn::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// // 28x28 grayscale input, 3x3 kernel, 8 filters, stride 1, padding 1
/// let layer = Conv2DLayer::new(28, 28, 1, 3, 8, 1, 1, &mut rng)?;
/// assert_eq!(layer.output_height(), 28);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Conv2DLayer {
    input_height: usize,
    input_width: usize,
    in_channels: usize,
    kernel_size: usize,
    out_channels: usize,
    stride: usize,
    padding: usize,
    output_height: usize,
    output_width: usize,
    weights: Vec<f32>,
    biases: Vec<f32>,
    grad_weights: Vec<f32>,
    grad_biases: Vec<f32>,
    // Zero-padded copy of the last forward input.
    padded_input: Option<Vec<f32>>,
}

/// floor((input + 2·padding − kernel) / stride) + 1, or an error when the
/// kernel does not fit the padded input or the padded size overflows.
fn output_dim(input: usize, padding: usize, kernel_size: usize, stride: usize, axis: &str) -> Result<usize> {
    let padded = padding
        .checked_mul(2)
        .and_then(|border| border.checked_add(input))
        .ok_or_else(|| {
            NnError::InvalidConfig(format!(
                "Conv2D padded {axis} overflows (input {input}, padding {padding})"
            ))
        })?;
    if padded < kernel_size {
        return Err(NnError::InvalidConfig(format!(
            "Conv2D kernel {kernel_size} does not fit the padded {axis} {padded} (input {input}, padding {padding})"
        )));
    }
    Ok((padded - kernel_size) / stride + 1)
}

/// Product of `sizes`, or `None` on overflow.
fn checked_product(sizes: &[usize]) -> Option<usize> {
    sizes.iter().try_fold(1usize, |acc, &size| acc.checked_mul(size))
}

impl Conv2DLayer {
    /// Create a new Conv2DLayer with Xavier initialization.
    ///
    /// Weights are sampled uniformly from [-limit, limit) where
    /// limit = sqrt(6 / (fan_in + fan_out)),
    /// fan_in = in_channels × kernel_size² and fan_out = out_channels × kernel_size².
    /// Biases start at zero.
    ///
    /// # Errors
    ///
    /// [`NnError::InvalidConfig`] when any size or the stride is zero, or the
    /// computed output height or width is not positive.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input_height: usize,
        input_width: usize,
        in_channels: usize,
        kernel_size: usize,
        out_channels: usize,
        stride: usize,
        padding: usize,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        let mut layer = Self::from_shape(
            input_height,
            input_width,
            in_channels,
            kernel_size,
            out_channels,
            stride,
            padding,
        )?;

        let fan_in = (in_channels * kernel_size * kernel_size) as f32;
        let fan_out = (out_channels * kernel_size * kernel_size) as f32;
        let limit = (6.0f32 / (fan_in + fan_out)).sqrt();
        for value in layer.weights.iter_mut() {
            *value = rng.gen_range_f32(-limit, limit);
        }

        Ok(layer)
    }

    /// Validate the shape and allocate zeroed parameters.
    #[allow(clippy::too_many_arguments)]
    fn from_shape(
        input_height: usize,
        input_width: usize,
        in_channels: usize,
        kernel_size: usize,
        out_channels: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        let mut layer = Self::unallocated(
            input_height,
            input_width,
            in_channels,
            kernel_size,
            out_channels,
            stride,
            padding,
        )?;
        let weight_count = layer.weight_count();
        layer.weights = vec![0.0; weight_count];
        layer.biases = vec![0.0; out_channels];
        layer.grad_weights = vec![0.0; weight_count];
        layer.grad_biases = vec![0.0; out_channels];
        Ok(layer)
    }

    /// Validate the shape without allocating any parameter buffers.
    ///
    /// Every buffer length the layer later derives from the shape (kernel,
    /// input, padded input, output) is checked to fit in `usize` here.
    #[allow(clippy::too_many_arguments)]
    fn unallocated(
        input_height: usize,
        input_width: usize,
        in_channels: usize,
        kernel_size: usize,
        out_channels: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        if in_channels == 0 || out_channels == 0 {
            return Err(NnError::InvalidConfig(
                "Conv2D channel counts must be greater than 0".to_string(),
            ));
        }
        if kernel_size == 0 {
            return Err(NnError::InvalidConfig(
                "Conv2D kernel_size must be greater than 0".to_string(),
            ));
        }
        if stride == 0 {
            return Err(NnError::InvalidConfig(
                "Conv2D stride must be greater than 0".to_string(),
            ));
        }
        let output_height = output_dim(input_height, padding, kernel_size, stride, "height")?;
        let output_width = output_dim(input_width, padding, kernel_size, stride, "width")?;

        // output_dim already proved the padded sides fit.
        let padded_height = input_height + 2 * padding;
        let padded_width = input_width + 2 * padding;
        let lengths = [
            checked_product(&[out_channels, in_channels, kernel_size, kernel_size]),
            checked_product(&[in_channels, padded_height, padded_width]),
            checked_product(&[out_channels, output_height, output_width]),
        ];
        if lengths.iter().any(Option::is_none) {
            return Err(NnError::InvalidConfig(format!(
                "Conv2D shape {in_channels}x{input_height}x{input_width} -> {out_channels} channels (kernel {kernel_size}) is too large"
            )));
        }

        Ok(Self {
            input_height,
            input_width,
            in_channels,
            kernel_size,
            out_channels,
            stride,
            padding,
            output_height,
            output_width,
            ..Self::default()
        })
    }

    fn weight_count(&self) -> usize {
        self.out_channels * self.in_channels * self.kernel_size * self.kernel_size
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Get the number of output channels (filters).
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Output height: (input_height + 2*padding - kernel_size) / stride + 1
    pub fn output_height(&self) -> usize {
        self.output_height
    }

    /// Output width: (input_width + 2*padding - kernel_size) / stride + 1
    pub fn output_width(&self) -> usize {
        self.output_width
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

    pub fn weight_gradients(&self) -> &[f32] {
        &self.grad_weights
    }

    pub fn bias_gradients(&self) -> &[f32] {
        &self.grad_biases
    }

    fn padded_height(&self) -> usize {
        self.input_height + 2 * self.padding
    }

    fn padded_width(&self) -> usize {
        self.input_width + 2 * self.padding
    }

    fn input_len(&self) -> usize {
        self.in_channels * self.input_height * self.input_width
    }

    fn output_len(&self) -> usize {
        self.out_channels * self.output_height * self.output_width
    }

    /// Copy `input` into a zero-filled buffer of channels × (H+2p) × (W+2p).
    fn pad(&self, input: &[f32]) -> Vec<f32> {
        let padded_h = self.padded_height();
        let padded_w = self.padded_width();
        let mut padded = vec![0.0f32; self.in_channels * padded_h * padded_w];

        for c in 0..self.in_channels {
            for h in 0..self.input_height {
                let src = (c * self.input_height + h) * self.input_width;
                let dst = (c * padded_h + h + self.padding) * padded_w + self.padding;
                padded[dst..dst + self.input_width]
                    .copy_from_slice(&input[src..src + self.input_width]);
            }
        }
        padded
    }

    /// Drop the border of a padded buffer, keeping the true input region.
    fn unpad(&self, padded: &[f32]) -> Vec<f32> {
        let padded_h = self.padded_height();
        let padded_w = self.padded_width();
        let mut output = vec![0.0f32; self.input_len()];

        for c in 0..self.in_channels {
            for h in 0..self.input_height {
                let dst = (c * self.input_height + h) * self.input_width;
                let src = (c * padded_h + h + self.padding) * padded_w + self.padding;
                output[dst..dst + self.input_width]
                    .copy_from_slice(&padded[src..src + self.input_width]);
            }
        }
        output
    }
}

impl Layer for Conv2DLayer {
    fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.input_len() {
            return Err(NnError::shape(TYPE_TAG, "input", input.len(), self.input_len()));
        }

        let padded = self.pad(input);
        let padded_h = self.padded_height();
        let padded_w = self.padded_width();
        let k = self.kernel_size;
        let out_spatial = self.output_height * self.output_width;
        let mut output = vec![0.0f32; self.output_len()];

        for oc in 0..self.out_channels {
            for oy in 0..self.output_height {
                for ox in 0..self.output_width {
                    let mut sum = 0.0f32;

                    for ic in 0..self.in_channels {
                        let w_base = (oc * self.in_channels + ic) * k * k;
                        let in_base = ic * padded_h * padded_w;

                        for ky in 0..k {
                            let row = in_base + (oy * self.stride + ky) * padded_w + ox * self.stride;
                            for kx in 0..k {
                                sum += padded[row + kx] * self.weights[w_base + ky * k + kx];
                            }
                        }
                    }

                    output[oc * out_spatial + oy * self.output_width + ox] = sum + self.biases[oc];
                }
            }
        }

        self.padded_input = Some(padded);
        Ok(output)
    }

    fn backward(&mut self, output_gradient: &[f32]) -> Result<Vec<f32>> {
        let expected = if self.padded_input.is_some() { self.output_len() } else { 0 };
        let padded = match self.padded_input.take() {
            Some(padded) if output_gradient.len() == expected => padded,
            other => {
                self.padded_input = other;
                return Err(NnError::shape(
                    TYPE_TAG,
                    "output gradient",
                    output_gradient.len(),
                    expected,
                ));
            }
        };

        let padded_h = self.padded_height();
        let padded_w = self.padded_width();
        let k = self.kernel_size;
        let out_spatial = self.output_height * self.output_width;
        let mut padded_grad = vec![0.0f32; padded.len()];

        for oc in 0..self.out_channels {
            for oy in 0..self.output_height {
                for ox in 0..self.output_width {
                    let g = output_gradient[oc * out_spatial + oy * self.output_width + ox];
                    self.grad_biases[oc] += g;

                    for ic in 0..self.in_channels {
                        let w_base = (oc * self.in_channels + ic) * k * k;
                        let in_base = ic * padded_h * padded_w;

                        for ky in 0..k {
                            let row = in_base + (oy * self.stride + ky) * padded_w + ox * self.stride;
                            for kx in 0..k {
                                let in_idx = row + kx;
                                let w_idx = w_base + ky * k + kx;
                                self.grad_weights[w_idx] += padded[in_idx] * g;
                                padded_grad[in_idx] += self.weights[w_idx] * g;
                            }
                        }
                    }
                }
            }
        }

        Ok(self.unpad(&padded_grad))
    }

    fn update_weights(&mut self, learning_rate: f32) {
        sgd_step(&mut self.weights, &mut self.grad_weights, learning_rate);
        sgd_step(&mut self.biases, &mut self.grad_biases, learning_rate);
    }

    fn type_tag(&self) -> &'static str {
        TYPE_TAG
    }

    fn serialize(&self, out: &mut String) {
        out.push_str(&format!(
            "{} {} {} {} {} {} {}\n",
            self.input_height,
            self.input_width,
            self.in_channels,
            self.kernel_size,
            self.out_channels,
            self.stride,
            self.padding
        ));
        write_f32_line(out, &self.weights);
        write_f32_line(out, &self.biases);
    }

    fn deserialize(&mut self, tokens: &mut TokenReader<'_>) -> Result<()> {
        let input_height = tokens.read_usize("conv input height")?;
        let input_width = tokens.read_usize("conv input width")?;
        let in_channels = tokens.read_usize("conv input channels")?;
        let kernel_size = tokens.read_usize("conv kernel size")?;
        let out_channels = tokens.read_usize("conv output channels")?;
        let stride = tokens.read_usize("conv stride")?;
        let padding = tokens.read_usize("conv padding")?;

        let mut layer = Self::unallocated(
            input_height,
            input_width,
            in_channels,
            kernel_size,
            out_channels,
            stride,
            padding,
        )?;
        // Buffers grow with the tokens actually read, so a bogus header
        // fails at end of input instead of allocating up front.
        layer.weights = tokens.read_f32s(layer.weight_count(), "conv weight")?;
        layer.biases = tokens.read_f32s(out_channels, "conv bias")?;
        layer.grad_weights = vec![0.0; layer.weights.len()];
        layer.grad_biases = vec![0.0; out_channels];

        *self = layer;
        Ok(())
    }

    fn input_size(&self) -> Option<usize> {
        Some(self.input_len())
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.output_len())
    }

    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}
