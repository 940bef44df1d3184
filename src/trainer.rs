//! Single-sample gradient descent steps over a [`Model`].

use crate::error::{NnError, Result};
use crate::loss::Loss;
use crate::model::Model;
use log::trace;

/// Plain SGD trainer with a fixed learning rate.
///
/// Epoch counting and convergence checks are left to the caller.
#[derive(Debug, Clone, Copy)]
pub struct Trainer {
    learning_rate: f32,
}

impl Trainer {
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    /// Forward, backward and update on one sample.
    ///
    /// Returns the loss measured before the update.
    pub fn train_step(
        &self,
        model: &mut Model,
        input: &[f32],
        target: &[f32],
        loss: &dyn Loss,
    ) -> Result<f32> {
        let prediction = model.forward(input)?;
        let value = loss.value(&prediction, target)?;
        let gradient = loss.gradient(&prediction, target)?;
        model.backward(&gradient)?;
        model.update_weights(self.learning_rate);
        trace!("train step loss {:.6}", value);
        Ok(value)
    }

    /// One [`Trainer::train_step`] per sample, in order; returns the mean loss.
    pub fn train_epoch(
        &self,
        model: &mut Model,
        samples: &[(Vec<f32>, Vec<f32>)],
        loss: &dyn Loss,
    ) -> Result<f32> {
        if samples.is_empty() {
            return Err(NnError::InvalidConfig(
                "training epoch needs at least one sample".to_string(),
            ));
        }
        let mut total = 0.0f32;
        for (input, target) in samples {
            total += self.train_step(model, input, target, loss)?;
        }
        Ok(total / samples.len() as f32)
    }

    /// Mean loss over `samples` without touching the parameters.
    ///
    /// Runs forward passes only, so the layers' forward caches are overwritten.
    pub fn evaluate(
        model: &mut Model,
        samples: &[(Vec<f32>, Vec<f32>)],
        loss: &dyn Loss,
    ) -> Result<f32> {
        if samples.is_empty() {
            return Ok(0.0);
        }
        let mut total = 0.0f32;
        for (input, target) in samples {
            let prediction = model.forward(input)?;
            total += loss.value(&prediction, target)?;
        }
        Ok(total / samples.len() as f32)
    }
}
