use airspace_shared::{Observation, ACTION_SIZE};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("observation width {got} does not match policy input width {expected}")]
    InputWidth { expected: usize, got: usize },
    #[error("policy inference failed: {0}")]
    Inference(String),
}

/// Maps observations to raw action rows.
///
/// `batch` holds one observation per agent; the returned rows are in the
/// same order. Rows are policy-native and are width-checked by the caller.
/// Given the same input, implementations used for evaluation must return
/// the same output.
pub trait Policy: Send {
    fn name(&self) -> &str;
    fn infer(&mut self, batch: &[Observation]) -> Result<Vec<Vec<f32>>, PolicyError>;
}

/// Policy that never asks for a change - useful for testing.
pub struct HoldPolicy;

impl Policy for HoldPolicy {
    fn name(&self) -> &str {
        "hold"
    }

    fn infer(&mut self, batch: &[Observation]) -> Result<Vec<Vec<f32>>, PolicyError> {
        Ok(vec![vec![0.0; ACTION_SIZE]; batch.len()])
    }
}
