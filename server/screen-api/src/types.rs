//! Request/response types for the screen API.

use chrono::NaiveDate;
use pr_risk_model::Prediction;
use serde::{Deserialize, Serialize};

/// Envelope every `/api/screen/*` response is wrapped in.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
  pub code: u16,
  pub message: String,
  pub data: Option<T>,
}

impl<T> ApiResponse<T> {
  pub fn success(data: T) -> Self {
    Self {
      code: 200,
      message: "success".to_string(),
      data: Some(data),
    }
  }
}

// ---------------------------------------------------------------------------
// core-data
// ---------------------------------------------------------------------------

/// PR counts per risk label, keyed by label name.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RiskDistribution {
  #[serde(rename = "Low risk")]
  pub low: i64,
  #[serde(rename = "High risk")]
  pub high: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoEfficiency {
  pub repo_name: String,
  pub avg_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrSummary {
  pub pr_id: i64,
  pub repo_name: String,
  pub actor_login: String,
  pub high_risk_prob: f64,
  pub predict_hours: f64,
}

#[derive(Debug, Serialize)]
pub struct CoreData {
  pub risk_distribution: RiskDistribution,
  pub repo_efficiency: Vec<RepoEfficiency>,
  pub top_high_risk_pr: Vec<PrSummary>,
  pub random_pr_by_risk: Vec<PrSummary>,
  pub pending_count: i64,
}

// ---------------------------------------------------------------------------
// pr-detail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrDetail {
  pub pr_id: i64,
  pub repo_name: String,
  pub actor_login: String,
  pub pull_additions: i32,
  pub pull_changed_files: i32,
  pub high_risk_prob: f64,
  pub predict_hours: f64,
  /// Human-written attribution, e.g. "core module changed by non-owner".
  pub risk_reason: Option<String>,
}

/// Contributor/repository nodes linked to a PR in the event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedNodes {
  pub actor_id: i64,
  pub actor_name: String,
  pub repo_id: i64,
  pub event_type: String,
}

#[derive(Debug, Serialize)]
pub struct PrDetailData {
  pub pr_detail: PrDetail,
  pub related_nodes: Option<RelatedNodes>,
}

// ---------------------------------------------------------------------------
// time-trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskTrendPoint {
  pub date: NaiveDate,
  pub high_risk_count: i64,
  pub total_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyTrendPoint {
  pub date: NaiveDate,
  pub avg_hours: f64,
}

#[derive(Debug, Serialize)]
pub struct TimeTrend {
  pub risk_trend: Vec<RiskTrendPoint>,
  pub efficiency_trend: Vec<EfficiencyTrendPoint>,
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

/// One scored PR to persist. The prediction fields match `pr-risk` output.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionPayload {
  pub pr_id: i64,
  pub repo_name: String,
  pub actor_login: String,
  #[serde(default)]
  pub pull_additions: i32,
  #[serde(default)]
  pub pull_changed_files: i32,
  /// 0 = open, 1 = merged.
  #[serde(default)]
  pub merge_status: i16,
  #[serde(default)]
  pub risk_reason: Option<String>,
  pub created_at: String,
  #[serde(flatten)]
  pub prediction: Prediction,
}
