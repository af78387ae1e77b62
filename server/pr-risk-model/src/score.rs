//! Batch scoring: one graph snapshot, many PRs, per-target error isolation.

use tracing::warn;

use crate::error::{ModelError, Result};
use crate::gcn::GraphEmbeddings;
use crate::graph::GraphSnapshot;
use crate::lstm::TimeSeries;
use crate::model::RiskModel;
use crate::types::{
  ErrorOutput, GraphInput, ScoreRequest, ScoreResponse, ScoredTarget, TargetInput, TargetResult,
};

/// Build a validated snapshot from the wire format.
pub fn snapshot_from_input(input: &GraphInput) -> Result<GraphSnapshot> {
  let [sources, targets] = &input.edge_index;
  if sources.len() != targets.len() {
    return Err(ModelError::validation(
      "graph.edge_index",
      format!(
        "source row has {} entries, target row has {}",
        sources.len(),
        targets.len()
      ),
    ));
  }
  let edges = sources
    .iter()
    .zip(targets)
    .map(|(&s, &t)| [s, t])
    .collect();
  GraphSnapshot::from_rows(&input.x, edges)
}

/// Score every target against the request's graph.
///
/// A graph-level failure fails the whole request; a bad target only fails its own entry.
pub fn run(model: &RiskModel, request: &ScoreRequest) -> Result<ScoreResponse> {
  let graph = snapshot_from_input(&request.graph)?;
  let embeddings = model.embed_graph(&graph)?;

  let results = request
    .targets
    .iter()
    .map(|target| match score_target(model, &embeddings, target) {
      Ok(scored) => TargetResult::Scored(scored),
      Err(e) => {
        warn!(pr_idx = target.pr_idx, error = %e, "target not scored");
        TargetResult::Failed(error_output(&e).with_pr_idx(target.pr_idx))
      }
    })
    .collect();

  Ok(ScoreResponse { results })
}

fn score_target(
  model: &RiskModel,
  embeddings: &GraphEmbeddings,
  target: &TargetInput,
) -> Result<ScoredTarget> {
  let series = TimeSeries::from_rows(&target.time_series)?;
  let prediction = model.predict_embedded(embeddings, target.pr_idx, &series)?;
  Ok(ScoredTarget {
    pr_idx: target.pr_idx,
    pr_id: target.pr_id,
    prediction,
  })
}

/// Parse one raw request and score it.
///
/// Malformed JSON and graph-level failures come back as a single ErrorOutput,
/// so stdout always carries one JSON object.
pub fn respond(model: &RiskModel, raw: &str) -> serde_json::Result<Vec<u8>> {
  let request: ScoreRequest = match serde_json::from_str(raw) {
    Ok(request) => request,
    Err(e) => {
      warn!(error = %e, "request not parsed");
      return serde_json::to_vec(&ErrorOutput::new(format!("json parse: {e}")));
    }
  };
  match run(model, &request) {
    Ok(response) => serde_json::to_vec(&response),
    Err(e) => {
      warn!(error = %e, "request rejected");
      serde_json::to_vec(&error_output(&e))
    }
  }
}

/// Map a model error onto the wire error shape.
pub fn error_output(e: &ModelError) -> ErrorOutput {
  let out = ErrorOutput::new(e.to_string());
  match e.field() {
    Some(field) => out.with_field(field),
    None => out,
  }
}
