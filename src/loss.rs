//! Loss functions supplied to the training step.
//!
//! A loss is a pair of pure functions over (prediction, target): its scalar
//! value and its gradient w.r.t. the prediction.

use crate::error::{NnError, Result};

pub trait Loss {
    fn value(&self, prediction: &[f32], target: &[f32]) -> Result<f32>;

    fn gradient(&self, prediction: &[f32], target: &[f32]) -> Result<Vec<f32>>;
}

fn check_lengths(prediction: &[f32], target: &[f32]) -> Result<()> {
    if prediction.len() != target.len() {
        return Err(NnError::shape("Loss", "target", target.len(), prediction.len()));
    }
    Ok(())
}

/// Mean squared error: mean((p - t)²), gradient 2(p - t)/n.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl Loss for MeanSquaredError {
    fn value(&self, prediction: &[f32], target: &[f32]) -> Result<f32> {
        check_lengths(prediction, target)?;
        if prediction.is_empty() {
            return Ok(0.0);
        }
        let sum: f32 = prediction
            .iter()
            .zip(target)
            .map(|(p, t)| (p - t) * (p - t))
            .sum();
        Ok(sum / prediction.len() as f32)
    }

    fn gradient(&self, prediction: &[f32], target: &[f32]) -> Result<Vec<f32>> {
        check_lengths(prediction, target)?;
        let n = prediction.len() as f32;
        Ok(prediction
            .iter()
            .zip(target)
            .map(|(p, t)| 2.0 * (p - t) / n)
            .collect())
    }
}

/// A loss built from an injected pair of functions.
pub struct FnLoss<V, G> {
    value: V,
    gradient: G,
}

impl<V, G> FnLoss<V, G>
where
    V: Fn(&[f32], &[f32]) -> f32,
    G: Fn(&[f32], &[f32]) -> Vec<f32>,
{
    pub fn new(value: V, gradient: G) -> Self {
        Self { value, gradient }
    }
}

impl<V, G> Loss for FnLoss<V, G>
where
    V: Fn(&[f32], &[f32]) -> f32,
    G: Fn(&[f32], &[f32]) -> Vec<f32>,
{
    fn value(&self, prediction: &[f32], target: &[f32]) -> Result<f32> {
        check_lengths(prediction, target)?;
        Ok((self.value)(prediction, target))
    }

    fn gradient(&self, prediction: &[f32], target: &[f32]) -> Result<Vec<f32>> {
        check_lengths(prediction, target)?;
        let gradient = (self.gradient)(prediction, target);
        if gradient.len() != prediction.len() {
            return Err(NnError::shape(
                "Loss",
                "gradient",
                gradient.len(),
                prediction.len(),
            ));
        }
        Ok(gradient)
    }
}
