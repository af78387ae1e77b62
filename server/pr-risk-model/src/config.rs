//! Fixed architecture dimensions for the GCN-LSTM-SLSTM checkpoint.

/// Layer sizes the persisted weights must match. Not configurable per call.
#[derive(Debug, Clone, PartialEq)]
pub struct Architecture {
  /// Node feature width fed to the first graph convolution.
  pub gcn_input_dim: usize,
  /// Per-step feature width of a PR time series.
  pub lstm_input_dim: usize,
  /// Graph embedding width, also the fusion cell hidden width.
  pub hidden_dim: usize,
  /// Hidden width of every recurrent layer in the temporal encoder.
  pub lstm_hidden_dim: usize,
  /// Stacked recurrent layers in the temporal encoder.
  pub lstm_layers: usize,
  /// Graph convolution layers.
  pub gcn_layers: usize,
  /// Risk classes emitted by the risk head.
  pub risk_classes: usize,
}

impl Default for Architecture {
  fn default() -> Self {
    Self {
      gcn_input_dim: 4,
      lstm_input_dim: 10,
      hidden_dim: 64,
      lstm_hidden_dim: 128,
      lstm_layers: 3,
      gcn_layers: 2,
      risk_classes: 2,
    }
  }
}

impl Architecture {
  /// Width of the vector entering the fusion cell: graph embedding + temporal summary.
  pub fn fusion_input_dim(&self) -> usize {
    self.hidden_dim + self.lstm_hidden_dim
  }

  /// Every parameter tensor the checkpoint must contain, with its shape.
  ///
  /// Names follow the PyTorch `state_dict` of the trained module.
  pub fn parameter_shapes(&self) -> Vec<(String, Vec<usize>)> {
    let mut out = Vec::new();
    let h = self.hidden_dim;
    let lh = self.lstm_hidden_dim;

    for layer in 0..self.gcn_layers {
      let input = if layer == 0 { self.gcn_input_dim } else { h };
      out.push((format!("gcn_layers.{layer}.lin.weight"), vec![h, input]));
      out.push((format!("gcn_layers.{layer}.bias"), vec![h]));
    }

    for layer in 0..self.lstm_layers {
      let input = if layer == 0 { self.lstm_input_dim } else { lh };
      out.push((format!("lstm.weight_ih_l{layer}"), vec![4 * lh, input]));
      out.push((format!("lstm.weight_hh_l{layer}"), vec![4 * lh, lh]));
      out.push((format!("lstm.bias_ih_l{layer}"), vec![4 * lh]));
      out.push((format!("lstm.bias_hh_l{layer}"), vec![4 * lh]));
    }

    let fusion_in = self.fusion_input_dim();
    out.push(("slstm_cell.s_gate.weight".into(), vec![1, fusion_in + h]));
    out.push(("slstm_cell.s_gate.bias".into(), vec![1]));
    out.push(("slstm_cell.i2h.weight".into(), vec![4 * h, fusion_in]));
    out.push(("slstm_cell.i2h.bias".into(), vec![4 * h]));
    out.push(("slstm_cell.h2h.weight".into(), vec![4 * h, h]));
    out.push(("slstm_cell.h2h.bias".into(), vec![4 * h]));

    out.push(("risk_head.weight".into(), vec![self.risk_classes, h]));
    out.push(("risk_head.bias".into(), vec![self.risk_classes]));
    out.push(("time_head.weight".into(), vec![1, h]));
    out.push(("time_head.bias".into(), vec![1]));
    out
  }
}
