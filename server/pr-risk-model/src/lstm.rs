//! Temporal encoder: stacked LSTM over one PR's feature history.

use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};

use crate::config::Architecture;
use crate::error::{ModelError, Result};
use crate::graph::rows_to_matrix;
use crate::layers::sigmoid;
use crate::weights::WeightStore;

const INPUT_TENSOR: &str = "temporal encoder input";

/// Ordered `T × F` feature history for one pull request (T >= 1).
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
  steps: Array2<f32>,
}

impl TimeSeries {
  pub fn new(steps: Array2<f32>) -> Result<Self> {
    if steps.nrows() == 0 {
      return Err(ModelError::validation(
        "time_series",
        "time series must have at least one step",
      ));
    }
    Ok(Self { steps })
  }

  pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
    Self::new(rows_to_matrix("time_series", rows)?)
  }

  pub fn num_steps(&self) -> usize {
    self.steps.nrows()
  }

  pub fn steps(&self) -> ArrayView2<'_, f32> {
    self.steps.view()
  }
}

/// One recurrent layer with PyTorch gate order (input, forget, candidate, output).
#[derive(Debug, Clone)]
pub struct LstmLayer {
  w_ih: Array2<f32>,
  w_hh: Array2<f32>,
  b_ih: Array1<f32>,
  b_hh: Array1<f32>,
  hidden: usize,
}

impl LstmLayer {
  pub fn new(
    w_ih: Array2<f32>,
    w_hh: Array2<f32>,
    b_ih: Array1<f32>,
    b_hh: Array1<f32>,
  ) -> Self {
    let hidden = w_hh.ncols();
    Self {
      w_ih,
      w_hh,
      b_ih,
      b_hh,
      hidden,
    }
  }

  fn load(store: &WeightStore, layer: usize, input: usize, hidden: usize) -> Result<Self> {
    Ok(Self::new(
      store.matrix(&format!("lstm.weight_ih_l{layer}"), 4 * hidden, input)?,
      store.matrix(&format!("lstm.weight_hh_l{layer}"), 4 * hidden, hidden)?,
      store.vector(&format!("lstm.bias_ih_l{layer}"), 4 * hidden)?,
      store.vector(&format!("lstm.bias_hh_l{layer}"), 4 * hidden)?,
    ))
  }

  pub fn input_size(&self) -> usize {
    self.w_ih.ncols()
  }

  /// One time step. Returns the next `(h, c)`.
  pub fn step(
    &self,
    x: ArrayView1<f32>,
    h: &Array1<f32>,
    c: &Array1<f32>,
  ) -> (Array1<f32>, Array1<f32>) {
    let hs = self.hidden;
    let gates = self.w_ih.dot(&x) + &self.b_ih + self.w_hh.dot(h) + &self.b_hh;
    let i = gates.slice(s![0..hs]).mapv(sigmoid);
    let f = gates.slice(s![hs..2 * hs]).mapv(sigmoid);
    let g = gates.slice(s![2 * hs..3 * hs]).mapv(f32::tanh);
    let o = gates.slice(s![3 * hs..4 * hs]).mapv(sigmoid);
    let c_next = &f * c + &i * &g;
    let h_next = &o * &c_next.mapv(f32::tanh);
    (h_next, c_next)
  }

  /// Run the whole sequence from zero state; returns every step's hidden state.
  pub fn run(&self, steps: ArrayView2<f32>) -> Array2<f32> {
    let mut h = Array1::zeros(self.hidden);
    let mut c = Array1::zeros(self.hidden);
    let mut outputs = Array2::zeros((steps.nrows(), self.hidden));
    for (t, x) in steps.outer_iter().enumerate() {
      let (h_next, c_next) = self.step(x, &h, &c);
      outputs.row_mut(t).assign(&h_next);
      h = h_next;
      c = c_next;
    }
    outputs
  }
}

#[derive(Debug, Clone)]
pub struct TemporalEncoder {
  layers: Vec<LstmLayer>,
  input_dim: usize,
  hidden_dim: usize,
}

impl TemporalEncoder {
  pub fn new(layers: Vec<LstmLayer>) -> Self {
    let input_dim = layers.first().map(LstmLayer::input_size).unwrap_or(0);
    let hidden_dim = layers.last().map(|l| l.hidden).unwrap_or(0);
    Self {
      layers,
      input_dim,
      hidden_dim,
    }
  }

  pub fn load(store: &WeightStore, arch: &Architecture) -> Result<Self> {
    let layers = (0..arch.lstm_layers)
      .map(|layer| {
        let input = if layer == 0 {
          arch.lstm_input_dim
        } else {
          arch.lstm_hidden_dim
        };
        LstmLayer::load(store, layer, input, arch.lstm_hidden_dim)
      })
      .collect::<Result<Vec<_>>>()?;
    Ok(Self::new(layers))
  }

  pub fn output_dim(&self) -> usize {
    self.hidden_dim
  }

  /// Final-step hidden state of the last layer.
  pub fn encode(&self, series: &TimeSeries) -> Result<Array1<f32>> {
    self.encode_steps(series.steps(), 1)
  }

  /// Batch-first `B × T × F` input; returns `B × hidden`.
  pub fn encode_batch(&self, batch: ArrayView3<f32>) -> Result<Array2<f32>> {
    let mut out = Array2::zeros((batch.len_of(Axis(0)), self.hidden_dim));
    for (b, seq) in batch.outer_iter().enumerate() {
      out.row_mut(b).assign(&self.encode_steps(seq, 2)?);
    }
    Ok(out)
  }

  fn encode_steps(&self, steps: ArrayView2<f32>, feature_axis: usize) -> Result<Array1<f32>> {
    if steps.ncols() != self.input_dim {
      return Err(ModelError::shape(
        INPUT_TENSOR,
        feature_axis,
        self.input_dim,
        steps.ncols(),
      ));
    }
    if steps.nrows() == 0 {
      return Err(ModelError::validation(
        "time_series",
        "time series must have at least one step",
      ));
    }
    let mut x = steps.to_owned();
    for layer in &self.layers {
      x = layer.run(x.view());
    }
    Ok(x.row(x.nrows() - 1).to_owned())
  }
}

/// Stack equal-length series into a batch-first tensor.
pub fn stack_series(series: &[TimeSeries]) -> Result<Array3<f32>> {
  let views: Vec<ArrayView2<f32>> = series.iter().map(TimeSeries::steps).collect();
  ndarray::stack(Axis(0), &views)
    .map_err(|e| ModelError::validation("time_series", format!("cannot batch series: {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn zero_layer(input: usize, hidden: usize) -> LstmLayer {
    LstmLayer::new(
      Array2::zeros((4 * hidden, input)),
      Array2::zeros((4 * hidden, hidden)),
      Array1::zeros(4 * hidden),
      Array1::zeros(4 * hidden),
    )
  }

  fn zero_encoder() -> TemporalEncoder {
    TemporalEncoder::new(vec![zero_layer(10, 128), zero_layer(128, 128), zero_layer(128, 128)])
  }

  #[test]
  fn zero_weights_give_zero_summary() {
    let series = TimeSeries::new(Array2::ones((6, 10))).unwrap();
    let out = zero_encoder().encode(&series).unwrap();
    assert_eq!(out.len(), 128);
    // candidate tanh(0) = 0 so the cell never charges.
    assert!(out.iter().all(|&v| v == 0.0));
  }

  #[test]
  fn candidate_bias_charges_cell() {
    let hidden = 1;
    let mut b_ih = Array1::zeros(4);
    b_ih[2] = 10.0; // candidate saturates at ~1
    let layer = LstmLayer::new(
      Array2::zeros((4, 1)),
      Array2::zeros((4, 1)),
      b_ih,
      Array1::zeros(4),
    );
    let (h, c) = layer.step(
      Array1::<f32>::zeros(1).view(),
      &Array1::zeros(hidden),
      &Array1::zeros(hidden),
    );
    // i = o = 0.5, g ~= 1 => c ~= 0.5, h = 0.5 * tanh(0.5)
    assert!((c[0] - 0.5).abs() < 1e-4);
    assert!((h[0] - 0.5 * 0.5f32.tanh()).abs() < 1e-4);
  }

  #[test]
  fn rejects_width_nine() {
    let series = TimeSeries::new(Array2::zeros((6, 9))).unwrap();
    let err = zero_encoder().encode(&series).unwrap_err();
    assert!(matches!(
      err,
      ModelError::Shape {
        expected: 10,
        actual: 9,
        ..
      }
    ));
    assert!(err.to_string().contains("temporal encoder input"));
  }

  #[test]
  fn rejects_empty_series() {
    let err = TimeSeries::new(Array2::zeros((0, 10))).unwrap_err();
    assert!(err.to_string().contains("at least one step"));
  }

  #[test]
  fn batch_matches_single() {
    let encoder = zero_encoder();
    let a = TimeSeries::new(Array2::from_elem((3, 10), 0.25)).unwrap();
    let b = TimeSeries::new(Array2::from_elem((3, 10), -1.0)).unwrap();
    let batch = stack_series(&[a.clone(), b]).unwrap();
    let out = encoder.encode_batch(batch.view()).unwrap();
    assert_eq!(out.shape(), &[2, 128]);
    assert_eq!(out.row(0), encoder.encode(&a).unwrap());
  }

  #[test]
  fn batch_width_error_reports_feature_axis() {
    let batch = Array3::<f32>::zeros((1, 4, 9));
    let err = zero_encoder().encode_batch(batch.view()).unwrap_err();
    assert!(matches!(err, ModelError::Shape { dim: 2, .. }));
  }

  #[test]
  fn stacking_ragged_lengths_fails() {
    let a = TimeSeries::new(Array2::zeros((3, 10))).unwrap();
    let b = TimeSeries::new(Array2::zeros((4, 10))).unwrap();
    assert!(stack_series(&[a, b]).is_err());
  }
}
