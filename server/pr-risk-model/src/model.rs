//! Inference driver: the loaded GCN-LSTM-SLSTM model and its predict contract.

use std::path::Path;

use ndarray::{concatenate, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Architecture;
use crate::error::{ModelError, Result};
use crate::fusion::{CellState, FusionCell};
use crate::gcn::{GraphEmbeddings, GraphEncoder};
use crate::graph::GraphSnapshot;
use crate::heads::{HeadOutput, PredictionHeads};
use crate::lstm::{TemporalEncoder, TimeSeries};
use crate::postprocess::{argmax, round_to, softmax, RiskLabel};
use crate::weights::WeightStore;

/// Decimal places kept for the risk probabilities.
pub const PROB_PLACES: i32 = 4;
/// Decimal places kept for predicted hours.
pub const HOURS_PLACES: i32 = 2;

/// Scored result for one pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
  pub risk_label: RiskLabel,
  pub risk_label_name: String,
  pub low_risk_prob: f64,
  pub high_risk_prob: f64,
  /// Predicted processing hours. Not clamped; may be negative.
  pub predict_hours: f64,
}

impl Prediction {
  /// Softmax, argmax and rounding over raw head outputs.
  ///
  /// Non-finite logits or hours are rejected instead of returned.
  pub fn from_heads(out: &HeadOutput) -> Result<Self> {
    let logits = out.risk_logits.to_vec();
    if logits.len() != 2 {
      return Err(ModelError::shape("risk logits", 0, 2, logits.len()));
    }
    if logits.iter().any(|v| !v.is_finite()) {
      return Err(ModelError::NonFinite(format!("risk logits {logits:?}")));
    }
    if !out.hours.is_finite() {
      return Err(ModelError::NonFinite(format!("predicted hours {}", out.hours)));
    }

    let probs = softmax(&logits);
    let label = if argmax(&logits) == 1 {
      RiskLabel::High
    } else {
      RiskLabel::Low
    };
    Ok(Self {
      risk_label: label,
      risk_label_name: label.name().to_string(),
      low_risk_prob: round_to(probs[0], PROB_PLACES),
      high_risk_prob: round_to(probs[1], PROB_PLACES),
      predict_hours: round_to(out.hours as f64, HOURS_PLACES),
    })
  }
}

/// A loaded, immutable model. Constructing one is the only way to reach the
/// ready state; every forward pass borrows it read-only.
#[derive(Debug, Clone)]
pub struct RiskModel {
  arch: Architecture,
  graph_encoder: GraphEncoder,
  temporal_encoder: TemporalEncoder,
  fusion: FusionCell,
  heads: PredictionHeads,
}

impl RiskModel {
  /// Load a safetensors checkpoint with the default architecture.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let store = WeightStore::load(path)?;
    info!(path = %path.display(), tensors = store.tensor_count(), "loaded risk model weights");
    Self::from_store(&store, Architecture::default())
  }

  /// Build from already-decoded weights. Fails if any tensor is missing or misshapen.
  pub fn from_store(store: &WeightStore, arch: Architecture) -> Result<Self> {
    store.validate(&arch)?;
    Ok(Self {
      graph_encoder: GraphEncoder::load(store, &arch)?,
      temporal_encoder: TemporalEncoder::load(store, &arch)?,
      fusion: FusionCell::load(store, &arch)?,
      heads: PredictionHeads::load(store, &arch)?,
      arch,
    })
  }

  pub fn architecture(&self) -> &Architecture {
    &self.arch
  }

  /// Whole-graph pass; reuse the result across PRs of the same snapshot.
  pub fn embed_graph(&self, graph: &GraphSnapshot) -> Result<GraphEmbeddings> {
    self.graph_encoder.encode(graph)
  }

  pub fn predict(
    &self,
    graph: &GraphSnapshot,
    pr_idx: usize,
    series: &TimeSeries,
  ) -> Result<Prediction> {
    let embeddings = self.embed_graph(graph)?;
    self.predict_embedded(&embeddings, pr_idx, series)
  }

  pub fn predict_embedded(
    &self,
    embeddings: &GraphEmbeddings,
    pr_idx: usize,
    series: &TimeSeries,
  ) -> Result<Prediction> {
    let out = self.forward(embeddings, pr_idx, series)?;
    let prediction = Prediction::from_heads(&out)?;
    debug!(
      pr_idx,
      steps = series.num_steps(),
      risk_label = prediction.risk_label.code(),
      high_risk_prob = prediction.high_risk_prob,
      predict_hours = prediction.predict_hours,
      "scored pull request"
    );
    Ok(prediction)
  }

  /// Raw head outputs for one node, before softmax and rounding.
  pub fn forward(
    &self,
    embeddings: &GraphEmbeddings,
    pr_idx: usize,
    series: &TimeSeries,
  ) -> Result<HeadOutput> {
    let graph_features = embeddings.node(pr_idx)?;
    let temporal_features = self.temporal_encoder.encode(series)?;
    let fused = concatenate(Axis(0), &[graph_features, temporal_features.view()])
      .map_err(|e| ModelError::validation("fusion input", e.to_string()))?;

    let state = self
      .fusion
      .step(fused.view(), &CellState::zeros(self.fusion.hidden_dim()))?;
    self.heads.forward(state.h.view())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::{array, Array2, ArrayD, IxDyn};

  fn zero_model() -> RiskModel {
    let arch = Architecture::default();
    let mut store = WeightStore::new();
    for (name, shape) in arch.parameter_shapes() {
      store.insert(name, ArrayD::zeros(IxDyn(&shape)));
    }
    RiskModel::from_store(&store, arch).unwrap()
  }

  #[test]
  fn prediction_from_tied_logits() {
    let out = HeadOutput {
      risk_logits: array![0.0, 0.0],
      hours: 0.0,
    };
    let p = Prediction::from_heads(&out).unwrap();
    assert_eq!(p.risk_label, RiskLabel::Low);
    assert_eq!(p.risk_label_name, "Low risk");
    assert_eq!(p.low_risk_prob, 0.5);
    assert_eq!(p.high_risk_prob, 0.5);
  }

  #[test]
  fn prediction_rounds_and_keeps_negative_hours() {
    let out = HeadOutput {
      risk_logits: array![-1.0, 2.0],
      hours: -7.25678,
    };
    let p = Prediction::from_heads(&out).unwrap();
    assert_eq!(p.risk_label, RiskLabel::High);
    assert_eq!(p.high_risk_prob, 0.9526);
    assert_eq!(p.low_risk_prob, 0.0474);
    assert_eq!(p.predict_hours, -7.26);
  }

  #[test]
  fn non_finite_outputs_are_rejected() {
    let out = HeadOutput {
      risk_logits: array![f32::NAN, 0.0],
      hours: 1.0,
    };
    assert!(matches!(
      Prediction::from_heads(&out),
      Err(ModelError::NonFinite(_))
    ));
    let out = HeadOutput {
      risk_logits: array![0.0, 0.0],
      hours: f32::INFINITY,
    };
    assert!(matches!(
      Prediction::from_heads(&out),
      Err(ModelError::NonFinite(_))
    ));
  }

  #[test]
  fn embedded_and_direct_predictions_agree() {
    let model = zero_model();
    let graph = GraphSnapshot::new(Array2::ones((3, 4)), vec![[0, 1], [1, 2]]).unwrap();
    let series = TimeSeries::new(Array2::ones((4, 10))).unwrap();
    let emb = model.embed_graph(&graph).unwrap();
    assert_eq!(
      model.predict(&graph, 1, &series).unwrap(),
      model.predict_embedded(&emb, 1, &series).unwrap()
    );
  }

  #[test]
  fn from_store_rejects_incomplete_weights() {
    let err = RiskModel::from_store(&WeightStore::new(), Architecture::default()).unwrap_err();
    assert!(err.is_load_error());
  }
}
