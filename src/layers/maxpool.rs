//! Max-pooling layer over non-overlapping square windows.

use crate::error::{NnError, Result};
use crate::layers::Layer;
use crate::utils::TokenReader;

const TYPE_TAG: &str = "MaxPool";

/// Spatial max-pooling with stride equal to the window size.
///
/// Forward keeps the maximum of every pool_size × pool_size tile per channel
/// and records which offset inside the tile won (first maximum in row-major
/// order). Backward routes each output gradient to that single input cell.
#[derive(Debug, Clone, Default)]
pub struct MaxPoolLayer {
    input_height: usize,
    input_width: usize,
    channels: usize,
    pool_size: usize,
    // Winning offset inside the window (dy * pool_size + dx) per output cell.
    max_indices: Option<Vec<usize>>,
}

impl MaxPoolLayer {
    /// # Errors
    ///
    /// [`NnError::InvalidConfig`] when `pool_size` is zero or does not divide
    /// both input dimensions, or the input length overflows `usize`.
    pub fn new(
        input_height: usize,
        input_width: usize,
        channels: usize,
        pool_size: usize,
    ) -> Result<Self> {
        if pool_size == 0 {
            return Err(NnError::InvalidConfig(
                "MaxPool pool_size must be greater than 0".to_string(),
            ));
        }
        if input_height % pool_size != 0 || input_width % pool_size != 0 {
            return Err(NnError::InvalidConfig(format!(
                "MaxPool input {input_height}x{input_width} is not divisible by pool_size {pool_size}"
            )));
        }
        if channels
            .checked_mul(input_height)
            .and_then(|len| len.checked_mul(input_width))
            .is_none()
        {
            return Err(NnError::InvalidConfig(format!(
                "MaxPool input {channels}x{input_height}x{input_width} is too large"
            )));
        }
        Ok(Self {
            input_height,
            input_width,
            channels,
            pool_size,
            max_indices: None,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn output_height(&self) -> usize {
        self.input_height / self.pool_size.max(1)
    }

    pub fn output_width(&self) -> usize {
        self.input_width / self.pool_size.max(1)
    }

    fn input_len(&self) -> usize {
        self.channels * self.input_height * self.input_width
    }

    fn output_len(&self) -> usize {
        self.channels * self.output_height() * self.output_width()
    }
}

impl Layer for MaxPoolLayer {
    fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.input_len() {
            return Err(NnError::shape(TYPE_TAG, "input", input.len(), self.input_len()));
        }

        let pool = self.pool_size;
        let out_h = self.output_height();
        let out_w = self.output_width();
        let in_spatial = self.input_height * self.input_width;
        let mut output = vec![0.0f32; self.output_len()];
        let mut max_indices = vec![0usize; self.output_len()];

        for c in 0..self.channels {
            let in_base = c * in_spatial;
            for py in 0..out_h {
                for px in 0..out_w {
                    let mut best = f32::NEG_INFINITY;
                    let mut best_idx = 0usize;

                    for dy in 0..pool {
                        for dx in 0..pool {
                            let iy = py * pool + dy;
                            let ix = px * pool + dx;
                            let value = input[in_base + iy * self.input_width + ix];
                            // Strictly greater: the first maximum in scan order wins.
                            if value > best {
                                best = value;
                                best_idx = dy * pool + dx;
                            }
                        }
                    }

                    let out_idx = (c * out_h + py) * out_w + px;
                    output[out_idx] = best;
                    max_indices[out_idx] = best_idx;
                }
            }
        }

        self.max_indices = Some(max_indices);
        Ok(output)
    }

    fn backward(&mut self, output_gradient: &[f32]) -> Result<Vec<f32>> {
        let expected = if self.max_indices.is_some() { self.output_len() } else { 0 };
        let max_indices = match self.max_indices.take() {
            Some(indices) if output_gradient.len() == expected => indices,
            other => {
                self.max_indices = other;
                return Err(NnError::shape(
                    TYPE_TAG,
                    "output gradient",
                    output_gradient.len(),
                    expected,
                ));
            }
        };

        let pool = self.pool_size;
        let out_h = self.output_height();
        let out_w = self.output_width();
        let in_spatial = self.input_height * self.input_width;
        let mut input_gradient = vec![0.0f32; self.input_len()];

        for c in 0..self.channels {
            for py in 0..out_h {
                for px in 0..out_w {
                    let out_idx = (c * out_h + py) * out_w + px;
                    let winner = max_indices[out_idx];
                    let iy = py * pool + winner / pool;
                    let ix = px * pool + winner % pool;
                    input_gradient[c * in_spatial + iy * self.input_width + ix] +=
                        output_gradient[out_idx];
                }
            }
        }

        Ok(input_gradient)
    }

    fn type_tag(&self) -> &'static str {
        TYPE_TAG
    }

    fn serialize(&self, out: &mut String) {
        out.push_str(&format!(
            "{} {} {} {}\n",
            self.input_height, self.input_width, self.channels, self.pool_size
        ));
    }

    fn deserialize(&mut self, tokens: &mut TokenReader<'_>) -> Result<()> {
        let input_height = tokens.read_usize("maxpool input height")?;
        let input_width = tokens.read_usize("maxpool input width")?;
        let channels = tokens.read_usize("maxpool channels")?;
        let pool_size = tokens.read_usize("maxpool pool size")?;
        *self = Self::new(input_height, input_width, channels, pool_size)?;
        Ok(())
    }

    fn input_size(&self) -> Option<usize> {
        Some(self.input_len())
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.output_len())
    }
}
