//! Date parsing utilities.

use chrono::{DateTime, Utc};

/// Parse an ISO8601 timestamp into UTC.
pub fn parse_created_at(s: &str) -> Option<DateTime<Utc>> {
  Some(DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_offsets_into_utc() {
    let ts = parse_created_at("2025-03-01T08:30:00+08:00").unwrap();
    assert_eq!(ts.to_rfc3339(), "2025-03-01T00:30:00+00:00");
  }

  #[test]
  fn rejects_non_rfc3339() {
    assert!(parse_created_at("yesterday").is_none());
    assert!(parse_created_at("2025-03-01").is_none());
  }
}
