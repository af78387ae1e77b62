//! Dense building blocks shared by every encoder: affine maps and activations.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::Result;
use crate::weights::WeightStore;

/// `y = W x + b` with `W` stored `out × in` (PyTorch layout).
#[derive(Debug, Clone)]
pub struct Linear {
  weight: Array2<f32>,
  bias: Option<Array1<f32>>,
}

impl Linear {
  pub fn new(weight: Array2<f32>, bias: Option<Array1<f32>>) -> Self {
    Self { weight, bias }
  }

  /// Load `{prefix}.weight` and `{prefix}.bias`.
  pub fn load(store: &WeightStore, prefix: &str, input: usize, output: usize) -> Result<Self> {
    let weight = store.matrix(&format!("{prefix}.weight"), output, input)?;
    let bias = store.vector(&format!("{prefix}.bias"), output)?;
    Ok(Self::new(weight, Some(bias)))
  }

  pub fn in_features(&self) -> usize {
    self.weight.ncols()
  }

  pub fn forward(&self, x: ArrayView1<f32>) -> Array1<f32> {
    let mut y = self.weight.dot(&x);
    if let Some(b) = &self.bias {
      y += b;
    }
    y
  }

  /// Row-wise forward over a `rows × in` matrix.
  pub fn forward_rows(&self, x: ArrayView2<f32>) -> Array2<f32> {
    let mut y = x.dot(&self.weight.t());
    if let Some(b) = &self.bias {
      y += b;
    }
    y
  }
}

pub fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

pub fn relu(x: f32) -> f32 {
  x.max(0.0)
}
