use airspace_shared::{Observation, D_HEADING_DEG};

use super::situation::drift_deg;
use crate::policy::{Policy, PolicyError};

/// Steers back onto the target heading, never touches speed.
pub struct HeadingHoldPolicy {
    d_heading_deg: f64,
}

impl HeadingHoldPolicy {
    pub fn new(d_heading_deg: f64) -> Self {
        Self { d_heading_deg }
    }

    pub fn act(&self, obs: &Observation) -> Vec<f32> {
        let fraction = (-drift_deg(obs) / self.d_heading_deg).clamp(-1.0, 1.0);
        vec![fraction as f32, 0.0]
    }
}

impl Default for HeadingHoldPolicy {
    fn default() -> Self {
        Self::new(D_HEADING_DEG)
    }
}

impl Policy for HeadingHoldPolicy {
    fn name(&self) -> &str {
        "heading_hold"
    }

    fn infer(&mut self, batch: &[Observation]) -> Result<Vec<Vec<f32>>, PolicyError> {
        Ok(batch.iter().map(|obs| self.act(obs)).collect())
    }
}
