//! Input/output types for the scoring binary (JSON contract with the caller).

use serde::{Deserialize, Serialize};

use crate::model::Prediction;

/// Input: one graph snapshot and the PRs to score against it.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreRequest {
  pub graph: GraphInput,
  pub targets: Vec<TargetInput>,
}

/// Node features (`N` rows) and edges as two parallel rows `[sources, targets]`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphInput {
  pub x: Vec<Vec<f32>>,
  pub edge_index: [Vec<usize>; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetInput {
  pub pr_idx: usize,
  pub time_series: Vec<Vec<f32>>,
  /// Caller's PR identifier, echoed back untouched.
  #[serde(default)]
  pub pr_id: Option<i64>,
}

/// Output: one entry per target, in request order.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreResponse {
  pub results: Vec<TargetResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TargetResult {
  Scored(ScoredTarget),
  Failed(ErrorOutput),
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredTarget {
  pub pr_idx: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pr_id: Option<i64>,
  #[serde(flatten)]
  pub prediction: Prediction,
}

/// Structured error output for a target (or a whole request) that could not be scored.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pr_idx: Option<usize>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
      pr_idx: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }

  pub fn with_pr_idx(mut self, pr_idx: usize) -> Self {
    self.pr_idx = Some(pr_idx);
    self
  }
}
