//! Checkpoint loading: safetensors bytes -> named f32 arrays with shape checks.

use std::collections::HashMap;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayD, Ix1, Ix2, IxDyn};
use safetensors::{Dtype, SafeTensors};
use tracing::{debug, warn};

use crate::config::Architecture;
use crate::error::{ModelError, Result};

/// Named parameter tensors, keyed by PyTorch `state_dict` name.
#[derive(Debug, Clone, Default)]
pub struct WeightStore {
  tensors: HashMap<String, ArrayD<f32>>,
}

impl WeightStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Read and decode a safetensors file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let bytes = std::fs::read(path.as_ref())?;
    Self::from_bytes(&bytes)
  }

  /// Decode an in-memory safetensors buffer. F64 tensors are narrowed to f32.
  pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
    let st = SafeTensors::deserialize(bytes)?;
    let mut store = Self::new();
    for (name, view) in st.tensors() {
      let shape = view.shape().to_vec();
      let data = decode(&name, view.dtype(), view.data())?;
      let array = ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|_| {
        ModelError::WeightShape {
          name: name.clone(),
          expected: shape.clone(),
          actual: vec![view.data().len()],
        }
      })?;
      debug!(tensor = %name, shape = ?shape, "decoded tensor");
      store.tensors.insert(name, array);
    }
    Ok(store)
  }

  pub fn insert(&mut self, name: impl Into<String>, array: ArrayD<f32>) {
    self.tensors.insert(name.into(), array);
  }

  pub fn tensor_count(&self) -> usize {
    self.tensors.len()
  }

  /// Check every tensor the architecture needs is present with the right shape.
  ///
  /// Extra tensors are tolerated (logged), missing or misshapen ones are errors.
  pub fn validate(&self, arch: &Architecture) -> Result<()> {
    let expected = arch.parameter_shapes();
    for (name, shape) in &expected {
      let tensor = self
        .tensors
        .get(name)
        .ok_or_else(|| ModelError::MissingTensor(name.clone()))?;
      if tensor.shape() != shape.as_slice() {
        return Err(ModelError::WeightShape {
          name: name.clone(),
          expected: shape.clone(),
          actual: tensor.shape().to_vec(),
        });
      }
    }
    for name in self.tensors.keys() {
      if !expected.iter().any(|(n, _)| n == name) {
        warn!(tensor = %name, "ignoring tensor not used by the architecture");
      }
    }
    Ok(())
  }

  pub fn matrix(&self, name: &str, rows: usize, cols: usize) -> Result<Array2<f32>> {
    let tensor = self.get(name, &[rows, cols])?;
    tensor
      .clone()
      .into_dimensionality::<Ix2>()
      .map_err(|_| shape_error(name, &[rows, cols], tensor.shape()))
  }

  pub fn vector(&self, name: &str, len: usize) -> Result<Array1<f32>> {
    let tensor = self.get(name, &[len])?;
    tensor
      .clone()
      .into_dimensionality::<Ix1>()
      .map_err(|_| shape_error(name, &[len], tensor.shape()))
  }

  fn get(&self, name: &str, shape: &[usize]) -> Result<&ArrayD<f32>> {
    let tensor = self
      .tensors
      .get(name)
      .ok_or_else(|| ModelError::MissingTensor(name.to_string()))?;
    if tensor.shape() != shape {
      return Err(shape_error(name, shape, tensor.shape()));
    }
    Ok(tensor)
  }
}

fn shape_error(name: &str, expected: &[usize], actual: &[usize]) -> ModelError {
  ModelError::WeightShape {
    name: name.to_string(),
    expected: expected.to_vec(),
    actual: actual.to_vec(),
  }
}

fn decode(name: &str, dtype: Dtype, bytes: &[u8]) -> Result<Vec<f32>> {
  match dtype {
    Dtype::F32 => Ok(
      bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect(),
    ),
    Dtype::F64 => Ok(
      bytes
        .chunks_exact(8)
        .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
        .collect(),
    ),
    other => Err(ModelError::UnsupportedDtype {
      name: name.to_string(),
      dtype: format!("{other:?}"),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use safetensors::tensor::TensorView;

  fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
  }

  #[test]
  fn decodes_f32_and_f64_tensors() {
    let a = f32_bytes(&[1.0, 2.0, 3.0, 4.0]);
    let b: Vec<u8> = [0.5f64, -1.5].iter().flat_map(|v| v.to_le_bytes()).collect();
    let bytes = safetensors::serialize(
      vec![
        ("a", TensorView::new(Dtype::F32, vec![2, 2], &a).unwrap()),
        ("b", TensorView::new(Dtype::F64, vec![2], &b).unwrap()),
      ],
      &None,
    )
    .unwrap();

    let store = WeightStore::from_bytes(&bytes).unwrap();
    assert_eq!(store.tensor_count(), 2);
    let m = store.matrix("a", 2, 2).unwrap();
    assert_eq!(m[[1, 0]], 3.0);
    let v = store.vector("b", 2).unwrap();
    assert_eq!(v[1], -1.5);
  }

  #[test]
  fn rejects_integer_tensors() {
    let raw: Vec<u8> = [1i32, 2].iter().flat_map(|v| v.to_le_bytes()).collect();
    let bytes = safetensors::serialize(
      vec![("ids", TensorView::new(Dtype::I32, vec![2], &raw).unwrap())],
      &None,
    )
    .unwrap();
    let err = WeightStore::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedDtype { .. }));
  }

  #[test]
  fn corrupt_buffer_is_a_load_error() {
    let err = WeightStore::from_bytes(b"definitely not safetensors").unwrap_err();
    assert!(err.is_load_error());
  }

  #[test]
  fn validate_reports_missing_and_misshapen() {
    let arch = Architecture::default();
    let err = WeightStore::new().validate(&arch).unwrap_err();
    assert!(matches!(err, ModelError::MissingTensor(_)));

    let mut store = WeightStore::new();
    for (name, shape) in arch.parameter_shapes() {
      store.insert(name, ArrayD::zeros(IxDyn(&shape)));
    }
    store.validate(&arch).unwrap();

    store.insert("risk_head.weight", ArrayD::zeros(IxDyn(&[3, 64])));
    let err = store.validate(&arch).unwrap_err();
    assert!(err.to_string().contains("risk_head.weight"));
  }

  #[test]
  fn matrix_checks_shape() {
    let mut store = WeightStore::new();
    store.insert("w", ArrayD::zeros(IxDyn(&[2, 3])));
    assert!(store.matrix("w", 2, 3).is_ok());
    assert!(matches!(
      store.matrix("w", 3, 2),
      Err(ModelError::WeightShape { .. })
    ));
    assert!(matches!(
      store.vector("missing", 1),
      Err(ModelError::MissingTensor(_))
    ));
  }
}
