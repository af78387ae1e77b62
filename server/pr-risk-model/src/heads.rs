//! Risk and duration heads over the fused hidden state.

use ndarray::{Array1, ArrayView1};

use crate::config::Architecture;
use crate::error::{ModelError, Result};
use crate::layers::Linear;
use crate::weights::WeightStore;

/// Raw head outputs before post-processing.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadOutput {
  pub risk_logits: Array1<f32>,
  /// Unbounded regression output; may be negative.
  pub hours: f32,
}

#[derive(Debug, Clone)]
pub struct PredictionHeads {
  risk: Linear,
  time: Linear,
}

impl PredictionHeads {
  pub fn new(risk: Linear, time: Linear) -> Self {
    Self { risk, time }
  }

  pub fn load(store: &WeightStore, arch: &Architecture) -> Result<Self> {
    Ok(Self::new(
      Linear::load(store, "risk_head", arch.hidden_dim, arch.risk_classes)?,
      Linear::load(store, "time_head", arch.hidden_dim, 1)?,
    ))
  }

  pub fn forward(&self, hidden: ArrayView1<f32>) -> Result<HeadOutput> {
    if hidden.len() != self.risk.in_features() {
      return Err(ModelError::shape(
        "prediction head input",
        0,
        self.risk.in_features(),
        hidden.len(),
      ));
    }
    Ok(HeadOutput {
      risk_logits: self.risk.forward(hidden),
      hours: self.time.forward(hidden)[0],
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::{array, Array2};

  #[test]
  fn heads_are_plain_affine_maps() {
    let heads = PredictionHeads::new(
      Linear::new(array![[1.0, 0.0], [0.0, 1.0]], Some(array![0.0, 0.5])),
      Linear::new(array![[-10.0, 0.0]], Some(array![0.0])),
    );
    let out = heads.forward(array![2.0f32, 3.0].view()).unwrap();
    assert_eq!(out.risk_logits.to_vec(), vec![2.0, 3.5]);
    // negative hours pass through untouched
    assert_eq!(out.hours, -20.0);
  }

  #[test]
  fn rejects_wrong_hidden_width() {
    let heads = PredictionHeads::new(
      Linear::new(Array2::zeros((2, 64)), None),
      Linear::new(Array2::zeros((1, 64)), None),
    );
    let err = heads.forward(Array1::<f32>::zeros(63).view()).unwrap_err();
    assert!(err.to_string().contains("prediction head input"));
  }
}
