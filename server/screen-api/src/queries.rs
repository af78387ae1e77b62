//! SQL for the screen: aggregates over pr_prediction_results and the top_pre event log.

use chrono::{DateTime, Utc};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_core::Error;
use sqlx_postgres::{PgPool, PgRow, Postgres};

use crate::types::{
  EfficiencyTrendPoint, PrDetail, PrSummary, RelatedNodes, RepoEfficiency, RiskDistribution,
  RiskTrendPoint,
};
use pr_risk_model::{Prediction, RiskLabel};

/// Rows returned by each "top N" panel on the screen.
pub const PANEL_LIMIT: i64 = 10;
/// Most recent dates (with data) covered by the trend charts.
pub const TREND_DAYS: i64 = 7;

/// Fold `(risk_label, count)` rows into the distribution; unknown labels are ignored.
pub fn distribution_from_counts(counts: &[(i16, i64)]) -> RiskDistribution {
  let mut dist = RiskDistribution::default();
  for &(label, count) in counts {
    match u8::try_from(label).ok().and_then(RiskLabel::from_code) {
      Some(RiskLabel::Low) => dist.low += count,
      Some(RiskLabel::High) => dist.high += count,
      None => {}
    }
  }
  dist
}

pub async fn risk_distribution(pool: &PgPool) -> Result<RiskDistribution, Error> {
  let rows = query::<Postgres>(
    r#"
    SELECT risk_label, COUNT(*) AS count
    FROM pr_prediction_results
    GROUP BY risk_label
    "#,
  )
  .fetch_all(pool)
  .await?;

  let counts = rows
    .iter()
    .map(|row| Ok((row.try_get::<i16, _>("risk_label")?, row.try_get::<i64, _>("count")?)))
    .collect::<Result<Vec<_>, Error>>()?;
  Ok(distribution_from_counts(&counts))
}

/// Repositories with the lowest average predicted processing time.
pub async fn repo_efficiency(pool: &PgPool) -> Result<Vec<RepoEfficiency>, Error> {
  let rows = query::<Postgres>(
    r#"
    SELECT repo_name, AVG(predict_hours)::float8 AS avg_hours
    FROM pr_prediction_results
    GROUP BY repo_name
    ORDER BY avg_hours ASC
    LIMIT $1
    "#,
  )
  .bind(PANEL_LIMIT)
  .fetch_all(pool)
  .await?;

  rows
    .iter()
    .map(|row| {
      Ok(RepoEfficiency {
        repo_name: row.try_get("repo_name")?,
        avg_hours: row.try_get("avg_hours")?,
      })
    })
    .collect()
}

pub async fn top_high_risk(pool: &PgPool) -> Result<Vec<PrSummary>, Error> {
  let rows = query::<Postgres>(
    r#"
    SELECT pr_id, repo_name, actor_login, high_risk_prob, predict_hours
    FROM pr_prediction_results
    WHERE risk_label = 1
    ORDER BY high_risk_prob DESC
    LIMIT $1
    "#,
  )
  .bind(PANEL_LIMIT)
  .fetch_all(pool)
  .await?;

  rows.iter().map(pr_summary).collect()
}

/// A random sample of PRs for the probability scatter panel.
pub async fn random_prs(pool: &PgPool) -> Result<Vec<PrSummary>, Error> {
  let rows = query::<Postgres>(
    r#"
    SELECT pr_id, repo_name, actor_login, high_risk_prob, predict_hours
    FROM pr_prediction_results
    ORDER BY random()
    LIMIT $1
    "#,
  )
  .bind(PANEL_LIMIT)
  .fetch_all(pool)
  .await?;

  rows.iter().map(pr_summary).collect()
}

/// PRs not merged yet (merge_status = 0).
pub async fn pending_count(pool: &PgPool) -> Result<i64, Error> {
  let row = query::<Postgres>(
    "SELECT COUNT(*) AS pending_count FROM pr_prediction_results WHERE merge_status = 0",
  )
  .fetch_one(pool)
  .await?;
  row.try_get("pending_count")
}

pub async fn pr_detail(pool: &PgPool, pr_id: i64) -> Result<Option<PrDetail>, Error> {
  let row = query::<Postgres>(
    r#"
    SELECT pr_id, repo_name, actor_login, pull_additions, pull_changed_files,
           high_risk_prob, predict_hours, risk_reason
    FROM pr_prediction_results
    WHERE pr_id = $1
    "#,
  )
  .bind(pr_id)
  .fetch_optional(pool)
  .await?;

  row
    .map(|row| {
      Ok(PrDetail {
        pr_id: row.try_get("pr_id")?,
        repo_name: row.try_get("repo_name")?,
        actor_login: row.try_get("actor_login")?,
        pull_additions: row.try_get("pull_additions")?,
        pull_changed_files: row.try_get("pull_changed_files")?,
        high_risk_prob: row.try_get("high_risk_prob")?,
        predict_hours: row.try_get("predict_hours")?,
        risk_reason: row.try_get("risk_reason")?,
      })
    })
    .transpose()
}

/// First event-log row for the PR (issue_id is the PR id there).
pub async fn related_nodes(pool: &PgPool, pr_id: i64) -> Result<Option<RelatedNodes>, Error> {
  let row = query::<Postgres>(
    r#"
    SELECT actor_id, actor_login AS actor_name, repo_id, type AS event_type
    FROM top_pre
    WHERE issue_id = $1
    LIMIT 1
    "#,
  )
  .bind(pr_id)
  .fetch_optional(pool)
  .await?;

  row
    .map(|row| {
      Ok(RelatedNodes {
        actor_id: row.try_get("actor_id")?,
        actor_name: row.try_get("actor_name")?,
        repo_id: row.try_get("repo_id")?,
        event_type: row.try_get("event_type")?,
      })
    })
    .transpose()
}

/// High-risk vs total counts for the most recent dates that have data, oldest first.
///
/// Sampled history is not contiguous, so this takes the last N dates present
/// rather than the last N calendar days.
pub async fn risk_trend(pool: &PgPool) -> Result<Vec<RiskTrendPoint>, Error> {
  let rows = query::<Postgres>(
    r#"
    SELECT day, high_risk_count, total_count
    FROM (
      SELECT created_at::date AS day,
             COUNT(*) FILTER (WHERE risk_label = 1) AS high_risk_count,
             COUNT(*) AS total_count
      FROM pr_prediction_results
      GROUP BY created_at::date
      ORDER BY day DESC
      LIMIT $1
    ) AS t
    ORDER BY day ASC
    "#,
  )
  .bind(TREND_DAYS)
  .fetch_all(pool)
  .await?;

  rows
    .iter()
    .map(|row| {
      Ok(RiskTrendPoint {
        date: row.try_get("day")?,
        high_risk_count: row.try_get("high_risk_count")?,
        total_count: row.try_get("total_count")?,
      })
    })
    .collect()
}

/// Average predicted hours over the same dates as [`risk_trend`].
pub async fn efficiency_trend(pool: &PgPool) -> Result<Vec<EfficiencyTrendPoint>, Error> {
  let rows = query::<Postgres>(
    r#"
    SELECT day, avg_hours
    FROM (
      SELECT created_at::date AS day,
             AVG(predict_hours)::float8 AS avg_hours
      FROM pr_prediction_results
      GROUP BY created_at::date
      ORDER BY day DESC
      LIMIT $1
    ) AS t
    ORDER BY day ASC
    "#,
  )
  .bind(TREND_DAYS)
  .fetch_all(pool)
  .await?;

  rows
    .iter()
    .map(|row| {
      Ok(EfficiencyTrendPoint {
        date: row.try_get("day")?,
        avg_hours: row.try_get("avg_hours")?,
      })
    })
    .collect()
}

/// Stored PR metadata that travels with a prediction.
#[derive(Debug)]
pub struct PrRecord<'a> {
  pub pr_id: i64,
  pub repo_name: &'a str,
  pub actor_login: &'a str,
  pub pull_additions: i32,
  pub pull_changed_files: i32,
  pub merge_status: i16,
  pub risk_reason: Option<&'a str>,
  pub created_at: DateTime<Utc>,
}

/// Insert or replace the stored prediction for one PR.
pub async fn upsert_prediction(
  pool: &PgPool,
  record: &PrRecord<'_>,
  prediction: &Prediction,
) -> Result<(), Error> {
  query::<Postgres>(
    r#"
    INSERT INTO pr_prediction_results (
      pr_id, repo_name, actor_login, pull_additions, pull_changed_files, merge_status,
      risk_label, risk_label_name, low_risk_prob, high_risk_prob, predict_hours,
      risk_reason, created_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    ON CONFLICT (pr_id) DO UPDATE SET
      repo_name = EXCLUDED.repo_name,
      actor_login = EXCLUDED.actor_login,
      pull_additions = EXCLUDED.pull_additions,
      pull_changed_files = EXCLUDED.pull_changed_files,
      merge_status = EXCLUDED.merge_status,
      risk_label = EXCLUDED.risk_label,
      risk_label_name = EXCLUDED.risk_label_name,
      low_risk_prob = EXCLUDED.low_risk_prob,
      high_risk_prob = EXCLUDED.high_risk_prob,
      predict_hours = EXCLUDED.predict_hours,
      risk_reason = EXCLUDED.risk_reason,
      created_at = EXCLUDED.created_at
    "#,
  )
  .bind(record.pr_id)
  .bind(record.repo_name)
  .bind(record.actor_login)
  .bind(record.pull_additions)
  .bind(record.pull_changed_files)
  .bind(record.merge_status)
  .bind(prediction.risk_label.code() as i16)
  .bind(prediction.risk_label.name())
  .bind(prediction.low_risk_prob)
  .bind(prediction.high_risk_prob)
  .bind(prediction.predict_hours)
  .bind(record.risk_reason)
  .bind(record.created_at)
  .execute(pool)
  .await?;
  Ok(())
}

fn pr_summary(row: &PgRow) -> Result<PrSummary, Error> {
  Ok(PrSummary {
    pr_id: row.try_get("pr_id")?,
    repo_name: row.try_get("repo_name")?,
    actor_login: row.try_get("actor_login")?,
    high_risk_prob: row.try_get("high_risk_prob")?,
    predict_hours: row.try_get("predict_hours")?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn distribution_defaults_to_zero() {
    assert_eq!(distribution_from_counts(&[]), RiskDistribution { low: 0, high: 0 });
  }

  #[test]
  fn distribution_maps_labels() {
    let dist = distribution_from_counts(&[(0, 120), (1, 37), (5, 9)]);
    assert_eq!(dist, RiskDistribution { low: 120, high: 37 });
    let json = serde_json::to_value(&dist).unwrap();
    assert_eq!(json["Low risk"], 120);
    assert_eq!(json["High risk"], 37);
  }
}
