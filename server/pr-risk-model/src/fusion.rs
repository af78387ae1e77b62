//! Fusion gate cell: one LSTM-style step whose input, forget and output gates
//! are all scaled by a single learned scalar.
//!
//! The scalar couples the input and forget gates (they can never saturate
//! independently). That coupling is part of the trained checkpoint and is kept.

use ndarray::{concatenate, s, Array1, ArrayView1, Axis};

use crate::config::Architecture;
use crate::error::{ModelError, Result};
use crate::layers::{sigmoid, Linear};
use crate::weights::WeightStore;

/// Hidden/cell pair carried by the fusion cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellState {
  pub h: Array1<f32>,
  pub c: Array1<f32>,
}

impl CellState {
  pub fn zeros(hidden: usize) -> Self {
    Self {
      h: Array1::zeros(hidden),
      c: Array1::zeros(hidden),
    }
  }
}

/// `s = sigmoid(W [x, h] + b)` with a single output unit.
#[derive(Debug, Clone)]
pub struct ScalarGate {
  linear: Linear,
}

impl ScalarGate {
  pub fn new(linear: Linear) -> Self {
    Self { linear }
  }

  pub fn forward(&self, combined: ArrayView1<f32>) -> f32 {
    sigmoid(self.linear.forward(combined)[0])
  }
}

/// Raw pre-activations split into the four 64-wide chunks, in checkpoint order.
#[derive(Debug, Clone, PartialEq)]
pub struct GatePreActivations {
  pub input: Array1<f32>,
  pub forget: Array1<f32>,
  pub output: Array1<f32>,
  pub candidate: Array1<f32>,
}

impl GatePreActivations {
  /// Split a `4 × hidden` vector as (input, forget, output, candidate).
  pub fn split(raw: ArrayView1<f32>, hidden: usize) -> Self {
    Self {
      input: raw.slice(s![0..hidden]).to_owned(),
      forget: raw.slice(s![hidden..2 * hidden]).to_owned(),
      output: raw.slice(s![2 * hidden..3 * hidden]).to_owned(),
      candidate: raw.slice(s![3 * hidden..4 * hidden]).to_owned(),
    }
  }
}

/// Activated gates after scalar modulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModulatedGates {
  pub input: Array1<f32>,
  pub forget: Array1<f32>,
  pub output: Array1<f32>,
  pub candidate: Array1<f32>,
}

/// `i = s·σ(i)`, `f = s·σ(f)`, `o = s·σ(o)`, `g = tanh(g)`.
pub fn modulate(s: f32, raw: &GatePreActivations) -> ModulatedGates {
  ModulatedGates {
    input: raw.input.mapv(|v| s * sigmoid(v)),
    forget: raw.forget.mapv(|v| s * sigmoid(v)),
    output: raw.output.mapv(|v| s * sigmoid(v)),
    candidate: raw.candidate.mapv(f32::tanh),
  }
}

/// `c' = f·c + i·g`, `h' = o·tanh(c')`.
pub fn advance(gates: &ModulatedGates, state: &CellState) -> CellState {
  let c = &gates.forget * &state.c + &gates.input * &gates.candidate;
  let h = &gates.output * &c.mapv(f32::tanh);
  CellState { h, c }
}

#[derive(Debug, Clone)]
pub struct FusionCell {
  gate: ScalarGate,
  i2h: Linear,
  h2h: Linear,
  input_dim: usize,
  hidden_dim: usize,
}

impl FusionCell {
  pub fn new(gate: ScalarGate, i2h: Linear, h2h: Linear) -> Self {
    let input_dim = i2h.in_features();
    let hidden_dim = h2h.in_features();
    Self {
      gate,
      i2h,
      h2h,
      input_dim,
      hidden_dim,
    }
  }

  pub fn load(store: &WeightStore, arch: &Architecture) -> Result<Self> {
    let input = arch.fusion_input_dim();
    let hidden = arch.hidden_dim;
    Ok(Self::new(
      ScalarGate::new(Linear::load(store, "slstm_cell.s_gate", input + hidden, 1)?),
      Linear::load(store, "slstm_cell.i2h", input, 4 * hidden)?,
      Linear::load(store, "slstm_cell.h2h", hidden, 4 * hidden)?,
    ))
  }

  pub fn hidden_dim(&self) -> usize {
    self.hidden_dim
  }

  /// One step from `state`. Widths are checked, never broadcast.
  pub fn step(&self, input: ArrayView1<f32>, state: &CellState) -> Result<CellState> {
    if input.len() != self.input_dim {
      return Err(ModelError::shape("fusion cell input", 0, self.input_dim, input.len()));
    }
    if state.h.len() != self.hidden_dim {
      return Err(ModelError::shape("fusion cell hidden state", 0, self.hidden_dim, state.h.len()));
    }
    if state.c.len() != self.hidden_dim {
      return Err(ModelError::shape("fusion cell cell state", 0, self.hidden_dim, state.c.len()));
    }

    let combined = concatenate(Axis(0), &[input.view(), state.h.view()])
      .map_err(|e| ModelError::validation("fusion cell input", e.to_string()))?;
    let s = self.gate.forward(combined.view());
    let raw = self.i2h.forward(input) + self.h2h.forward(state.h.view());
    let gates = modulate(s, &GatePreActivations::split(raw.view(), self.hidden_dim));
    Ok(advance(&gates, state))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::{Array1, Array2};

  fn cell_with_gate_bias(gate_bias: f32, input: usize, hidden: usize) -> FusionCell {
    FusionCell::new(
      ScalarGate::new(Linear::new(
        Array2::zeros((1, input + hidden)),
        Some(Array1::from_elem(1, gate_bias)),
      )),
      Linear::new(Array2::zeros((4 * hidden, input)), Some(Array1::zeros(4 * hidden))),
      Linear::new(Array2::zeros((4 * hidden, hidden)), Some(Array1::zeros(4 * hidden))),
    )
  }

  #[test]
  fn modulate_scales_three_gates_uniformly() {
    let raw = GatePreActivations {
      input: Array1::from_elem(2, 0.0),
      forget: Array1::from_elem(2, 0.0),
      output: Array1::from_elem(2, 0.0),
      candidate: Array1::from_elem(2, 0.0),
    };
    let gates = modulate(0.4, &raw);
    assert!(gates.input.iter().all(|&v| (v - 0.2).abs() < 1e-6));
    assert_eq!(gates.input, gates.forget);
    assert_eq!(gates.forget, gates.output);
    // candidate is never modulated
    assert!(gates.candidate.iter().all(|&v| v == 0.0));
  }

  #[test]
  fn zero_scalar_closes_every_gate() {
    let raw = GatePreActivations::split(Array1::from_elem(8, 3.0f32).view(), 2);
    let gates = modulate(0.0, &raw);
    let state = CellState {
      h: Array1::from_elem(2, 1.0),
      c: Array1::from_elem(2, 5.0),
    };
    let next = advance(&gates, &state);
    assert_eq!(next, CellState::zeros(2));
  }

  #[test]
  fn split_follows_checkpoint_chunk_order() {
    let raw = Array1::from_iter((0..8).map(|v| v as f32));
    let chunks = GatePreActivations::split(raw.view(), 2);
    assert_eq!(chunks.input.to_vec(), vec![0.0, 1.0]);
    assert_eq!(chunks.forget.to_vec(), vec![2.0, 3.0]);
    assert_eq!(chunks.output.to_vec(), vec![4.0, 5.0]);
    assert_eq!(chunks.candidate.to_vec(), vec![6.0, 7.0]);
  }

  #[test]
  fn step_keeps_hidden_width() {
    let cell = cell_with_gate_bias(0.0, 192, 64);
    let input = Array1::from_elem(192, 0.3f32);
    let next = cell.step(input.view(), &CellState::zeros(64)).unwrap();
    assert_eq!(next.h.len(), 64);
    assert_eq!(next.c.len(), 64);
  }

  #[test]
  fn step_from_charged_state() {
    // s = 0.5, all raw gates 0 => i = f = o = 0.25, g = 0.
    let cell = cell_with_gate_bias(0.0, 3, 2);
    let state = CellState {
      h: Array1::zeros(2),
      c: Array1::from_elem(2, 2.0),
    };
    let next = cell.step(Array1::<f32>::zeros(3).view(), &state).unwrap();
    assert!(next.c.iter().all(|&v| (v - 0.5).abs() < 1e-6));
    let expected_h = 0.25 * 0.5f32.tanh();
    assert!(next.h.iter().all(|&v| (v - expected_h).abs() < 1e-6));
  }

  #[test]
  fn step_rejects_wrong_widths() {
    let cell = cell_with_gate_bias(0.0, 192, 64);
    let err = cell
      .step(Array1::<f32>::zeros(191).view(), &CellState::zeros(64))
      .unwrap_err();
    assert!(err.to_string().contains("fusion cell input"));

    let err = cell
      .step(Array1::<f32>::zeros(192).view(), &CellState::zeros(32))
      .unwrap_err();
    assert!(err.to_string().contains("hidden state"));
  }
}
