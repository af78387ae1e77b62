//! Structured error types for the risk model.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("safetensors: {0}")]
  SafeTensors(#[from] safetensors::SafeTensorError),

  #[error("weights: missing tensor {0}")]
  MissingTensor(String),

  #[error("weights: {name}: expected shape {expected:?}, found {actual:?}")]
  WeightShape {
    name: String,
    expected: Vec<usize>,
    actual: Vec<usize>,
  },

  #[error("weights: {name}: unsupported dtype {dtype}")]
  UnsupportedDtype { name: String, dtype: String },

  #[error("shape mismatch: {tensor}: dim {dim}: expected {expected}, got {actual}")]
  Shape {
    tensor: String,
    dim: usize,
    expected: usize,
    actual: usize,
  },

  #[error("node index {index} out of range for graph with {nodes} nodes")]
  NodeIndex { index: usize, nodes: usize },

  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("non-finite output: {0}")]
  NonFinite(String),
}

impl ModelError {
  pub fn validation(field: &str, reason: impl Into<String>) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.into(),
    }
  }

  pub fn shape(tensor: &str, dim: usize, expected: usize, actual: usize) -> Self {
    Self::Shape {
      tensor: tensor.to_string(),
      dim,
      expected,
      actual,
    }
  }

  /// Errors that mean the checkpoint itself is unusable; startup must abort.
  pub fn is_load_error(&self) -> bool {
    matches!(
      self,
      Self::Io(_)
        | Self::SafeTensors(_)
        | Self::MissingTensor(_)
        | Self::WeightShape { .. }
        | Self::UnsupportedDtype { .. }
    )
  }

  /// The request field an input error points at, if any.
  pub fn field(&self) -> Option<&str> {
    match self {
      Self::Validation { field, .. } => Some(field),
      Self::Shape { tensor, .. } => Some(tensor),
      Self::NodeIndex { .. } => Some("pr_idx"),
      _ => None,
    }
  }
}

pub type Result<T> = std::result::Result<T, ModelError>;
