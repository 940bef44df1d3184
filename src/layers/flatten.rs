//! Flatten layer: identity on values, used between spatial and dense layers.

use crate::error::{NnError, Result};
use crate::layers::Layer;
use crate::utils::TokenReader;

const TYPE_TAG: &str = "Flatten";

/// Pass-through layer that only remembers the last input length.
///
/// Every buffer is already flat, so nothing is reshaped; the recorded length
/// validates the gradient handed to the next backward call.
#[derive(Debug, Clone, Default)]
pub struct FlattenLayer {
    input_len: Option<usize>,
}

impl FlattenLayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for FlattenLayer {
    fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.input_len = Some(input.len());
        Ok(input.to_vec())
    }

    fn backward(&mut self, output_gradient: &[f32]) -> Result<Vec<f32>> {
        match self.input_len {
            Some(len) if len == output_gradient.len() => {
                self.input_len = None;
                Ok(output_gradient.to_vec())
            }
            other => Err(NnError::shape(
                TYPE_TAG,
                "output gradient",
                output_gradient.len(),
                other.unwrap_or(0),
            )),
        }
    }

    fn type_tag(&self) -> &'static str {
        TYPE_TAG
    }

    fn serialize(&self, _out: &mut String) {}

    fn deserialize(&mut self, _tokens: &mut TokenReader<'_>) -> Result<()> {
        self.input_len = None;
        Ok(())
    }

    fn input_size(&self) -> Option<usize> {
        self.input_len
    }

    fn output_size(&self) -> Option<usize> {
        self.input_len
    }
}
