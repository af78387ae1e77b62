//! HTTP handlers for the screen API.

use axum::{
  extract::{rejection::PathRejection, Path, State},
  http::StatusCode,
  Json,
};
use std::sync::Arc;

use crate::date;
use crate::error::ApiError;
use crate::queries::{self, PrRecord};
use crate::state::AppState;
use crate::types::{ApiResponse, CoreData, PrDetailData, PredictionPayload, TimeTrend};

pub async fn health() -> &'static str {
  "ok"
}

/// Risk distribution, repo efficiency, top/random PRs and pending count.
pub async fn core_data(
  State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CoreData>>, ApiError> {
  let pool = &state.pool;
  let data = CoreData {
    risk_distribution: queries::risk_distribution(pool).await?,
    repo_efficiency: queries::repo_efficiency(pool).await?,
    top_high_risk_pr: queries::top_high_risk(pool).await?,
    random_pr_by_risk: queries::random_prs(pool).await?,
    pending_count: queries::pending_count(pool).await?,
  };
  Ok(Json(ApiResponse::success(data)))
}

pub async fn pr_detail(
  State(state): State<Arc<AppState>>,
  pr_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<PrDetailData>>, ApiError> {
  let Path(pr_id) = pr_id.map_err(|e| ApiError::validation("pr_id", e.body_text()))?;
  let pr_detail = queries::pr_detail(&state.pool, pr_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("pr {pr_id}")))?;
  let related_nodes = queries::related_nodes(&state.pool, pr_id).await?;
  Ok(Json(ApiResponse::success(PrDetailData {
    pr_detail,
    related_nodes,
  })))
}

pub async fn time_trend(
  State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<TimeTrend>>, ApiError> {
  let data = TimeTrend {
    risk_trend: queries::risk_trend(&state.pool).await?,
    efficiency_trend: queries::efficiency_trend(&state.pool).await?,
  };
  Ok(Json(ApiResponse::success(data)))
}

/// Persist one scored PR (upsert by pr_id).
pub async fn ingest(
  State(state): State<Arc<AppState>>,
  Json(payload): Json<PredictionPayload>,
) -> Result<StatusCode, ApiError> {
  let record = validate(&payload)?;
  queries::upsert_prediction(&state.pool, &record, &payload.prediction).await?;
  tracing::info!(
    pr_id = payload.pr_id,
    repo = %payload.repo_name,
    risk_label = payload.prediction.risk_label.code(),
    "stored prediction"
  );
  Ok(StatusCode::OK)
}

/// Reject payloads that would put out-of-range values on the screen.
pub fn validate(payload: &PredictionPayload) -> Result<PrRecord<'_>, ApiError> {
  if payload.pr_id <= 0 {
    return Err(ApiError::validation("pr_id", "must be positive"));
  }
  if payload.repo_name.trim().is_empty() {
    return Err(ApiError::validation("repo_name", "must not be empty"));
  }
  if !matches!(payload.merge_status, 0 | 1) {
    return Err(ApiError::validation("merge_status", "must be 0 or 1"));
  }
  let p = &payload.prediction;
  for (field, value) in [
    ("low_risk_prob", p.low_risk_prob),
    ("high_risk_prob", p.high_risk_prob),
  ] {
    if !(0.0..=1.0).contains(&value) {
      return Err(ApiError::validation(field, "must be within [0, 1]"));
    }
  }
  if !p.predict_hours.is_finite() {
    return Err(ApiError::validation("predict_hours", "must be finite"));
  }
  let created_at = date::parse_created_at(&payload.created_at)
    .ok_or_else(|| ApiError::validation("created_at", "expected RFC 3339 timestamp"))?;

  Ok(PrRecord {
    pr_id: payload.pr_id,
    repo_name: &payload.repo_name,
    actor_login: &payload.actor_login,
    pull_additions: payload.pull_additions,
    pull_changed_files: payload.pull_changed_files,
    merge_status: payload.merge_status,
    risk_reason: payload.risk_reason.as_deref(),
    created_at,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn payload(json: &str) -> PredictionPayload {
    serde_json::from_str(json).unwrap()
  }

  const VALID: &str = r#"{
    "pr_id": 1201,
    "repo_name": "acme/widgets",
    "actor_login": "octo",
    "pull_additions": 120,
    "pull_changed_files": 4,
    "created_at": "2025-01-15T10:30:00Z",
    "risk_label": 1,
    "risk_label_name": "High risk",
    "low_risk_prob": 0.1234,
    "high_risk_prob": 0.8766,
    "predict_hours": -1.5
  }"#;

  #[test]
  fn valid_payload_becomes_record() {
    let p = payload(VALID);
    let record = validate(&p).unwrap();
    assert_eq!(record.pr_id, 1201);
    assert_eq!(record.merge_status, 0);
    assert!(record.risk_reason.is_none());
    assert_eq!(record.created_at.to_rfc3339(), "2025-01-15T10:30:00+00:00");
  }

  #[test]
  fn rejects_probability_out_of_range() {
    let mut p = payload(VALID);
    p.prediction.high_risk_prob = 1.5;
    let err = validate(&p).unwrap_err();
    assert!(err.to_string().contains("high_risk_prob"));
  }

  #[test]
  fn rejects_bad_timestamp_and_status() {
    let mut p = payload(VALID);
    p.created_at = "15/01/2025".into();
    assert!(validate(&p).unwrap_err().to_string().contains("created_at"));

    let mut p = payload(VALID);
    p.merge_status = 3;
    assert!(validate(&p).unwrap_err().to_string().contains("merge_status"));
  }

  #[test]
  fn rejects_unknown_risk_label() {
    let json = VALID.replace("\"risk_label\": 1", "\"risk_label\": 4");
    assert!(serde_json::from_str::<PredictionPayload>(&json).is_err());
  }
}
