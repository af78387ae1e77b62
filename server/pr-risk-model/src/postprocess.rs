//! Turning raw head outputs into presentation values.

use serde::{Deserialize, Serialize};

/// Binary risk label. Serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RiskLabel {
  Low,
  High,
}

impl RiskLabel {
  pub fn code(self) -> u8 {
    match self {
      Self::Low => 0,
      Self::High => 1,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Low => "Low risk",
      Self::High => "High risk",
    }
  }

  pub fn from_code(code: u8) -> Option<Self> {
    match code {
      0 => Some(Self::Low),
      1 => Some(Self::High),
      _ => None,
    }
  }
}

impl From<RiskLabel> for u8 {
  fn from(label: RiskLabel) -> Self {
    label.code()
  }
}

impl TryFrom<u8> for RiskLabel {
  type Error = String;

  fn try_from(code: u8) -> Result<Self, Self::Error> {
    Self::from_code(code).ok_or_else(|| format!("risk label must be 0 or 1, got {code}"))
  }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f64> {
  let max = logits
    .iter()
    .map(|&v| v as f64)
    .fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = logits.iter().map(|&v| (v as f64 - max).exp()).collect();
  let sum: f64 = exps.iter().sum();
  exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the first maximum (ties resolve to the lower index).
pub fn argmax(values: &[f32]) -> usize {
  let mut best = 0;
  for (i, &v) in values.iter().enumerate().skip(1) {
    if v > values[best] {
      best = i;
    }
  }
  best
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
  let scale = 10f64.powi(places);
  (value * scale).round() / scale
}
