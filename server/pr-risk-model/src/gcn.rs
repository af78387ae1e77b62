//! Graph encoder: two graph convolutions with ReLU over the whole snapshot.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::config::Architecture;
use crate::error::{ModelError, Result};
use crate::graph::{GraphSnapshot, NormalizedEdge};
use crate::layers::{relu, Linear};
use crate::weights::WeightStore;

/// One graph convolution: bias-free projection, normalized scatter-add, then bias.
#[derive(Debug, Clone)]
pub struct GcnConv {
  lin: Linear,
  bias: Array1<f32>,
}

impl GcnConv {
  pub fn new(lin: Linear, bias: Array1<f32>) -> Self {
    Self { lin, bias }
  }

  fn load(store: &WeightStore, layer: usize, input: usize, output: usize) -> Result<Self> {
    let weight = store.matrix(&format!("gcn_layers.{layer}.lin.weight"), output, input)?;
    let bias = store.vector(&format!("gcn_layers.{layer}.bias"), output)?;
    Ok(Self::new(Linear::new(weight, None), bias))
  }

  pub fn forward(&self, x: ArrayView2<f32>, edges: &[NormalizedEdge]) -> Array2<f32> {
    let projected = self.lin.forward_rows(x);
    let mut out = Array2::<f32>::zeros((projected.nrows(), projected.ncols()));
    for edge in edges {
      out
        .row_mut(edge.target)
        .scaled_add(edge.weight, &projected.row(edge.source));
    }
    out += &self.bias;
    out
  }
}

/// Per-node embeddings for a whole snapshot (`N × hidden_dim`).
#[derive(Debug, Clone)]
pub struct GraphEmbeddings {
  embeddings: Array2<f32>,
}

impl GraphEmbeddings {
  pub fn num_nodes(&self) -> usize {
    self.embeddings.nrows()
  }

  pub fn dim(&self) -> usize {
    self.embeddings.ncols()
  }

  /// The embedding of one node; out-of-range indices are an error, never clamped.
  pub fn node(&self, index: usize) -> Result<ArrayView1<'_, f32>> {
    if index >= self.num_nodes() {
      return Err(ModelError::NodeIndex {
        index,
        nodes: self.num_nodes(),
      });
    }
    Ok(self.embeddings.row(index))
  }
}

#[derive(Debug, Clone)]
pub struct GraphEncoder {
  layers: Vec<GcnConv>,
  input_dim: usize,
}

impl GraphEncoder {
  pub fn new(layers: Vec<GcnConv>, input_dim: usize) -> Self {
    Self { layers, input_dim }
  }

  pub fn load(store: &WeightStore, arch: &Architecture) -> Result<Self> {
    let layers = (0..arch.gcn_layers)
      .map(|layer| {
        let input = if layer == 0 { arch.gcn_input_dim } else { arch.hidden_dim };
        GcnConv::load(store, layer, input, arch.hidden_dim)
      })
      .collect::<Result<Vec<_>>>()?;
    Ok(Self::new(layers, arch.gcn_input_dim))
  }

  /// Encode every node. Dropout is a training-time concern and is not applied.
  pub fn encode(&self, graph: &GraphSnapshot) -> Result<GraphEmbeddings> {
    if graph.feature_dim() != self.input_dim {
      return Err(ModelError::shape(
        "graph encoder input (node features)",
        1,
        self.input_dim,
        graph.feature_dim(),
      ));
    }
    let edges = graph.normalized_edges();
    let mut x = graph.features().to_owned();
    for layer in &self.layers {
      x = layer.forward(x.view(), edges).mapv_into(relu);
    }
    Ok(GraphEmbeddings { embeddings: x })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;

  fn identity_conv(dim: usize) -> GcnConv {
    GcnConv::new(Linear::new(Array2::eye(dim), None), Array1::zeros(dim))
  }

  #[test]
  fn conv_averages_over_normalized_neighbourhood() {
    let graph = GraphSnapshot::new(array![[2.0, 0.0], [0.0, 4.0]], vec![[0, 1], [1, 0]]).unwrap();
    let out = identity_conv(2).forward(graph.features(), graph.normalized_edges());
    // Every weight is 1/2: each node gets half of itself and half of its neighbour.
    assert_eq!(out, array![[1.0f32, 2.0], [1.0, 2.0]]);
  }

  #[test]
  fn messages_flow_from_source_to_target() {
    // 0 -> 1 only: node 0 hears nothing but itself, node 1 hears both.
    let graph = GraphSnapshot::new(array![[2.0, 0.0], [0.0, 4.0]], vec![[0, 1]]).unwrap();
    let out = identity_conv(2).forward(graph.features(), graph.normalized_edges());
    assert_eq!(out.row(0), array![2.0f32, 0.0]);
    assert!((out[[1, 0]] - std::f32::consts::SQRT_2).abs() < 1e-6);
    assert!((out[[1, 1]] - 2.0).abs() < 1e-6);
  }

  #[test]
  fn encoder_applies_relu() {
    let neg = GcnConv::new(Linear::new(-Array2::<f32>::eye(2), None), Array1::zeros(2));
    let encoder = GraphEncoder::new(vec![neg], 2);
    let graph = GraphSnapshot::new(array![[1.0, 2.0]], vec![]).unwrap();
    let emb = encoder.encode(&graph).unwrap();
    assert_eq!(emb.node(0).unwrap(), array![0.0f32, 0.0]);
  }

  #[test]
  fn encoder_rejects_wrong_feature_width() {
    let encoder = GraphEncoder::new(vec![identity_conv(4)], 4);
    let graph = GraphSnapshot::new(Array2::zeros((3, 3)), vec![]).unwrap();
    let err = encoder.encode(&graph).unwrap_err();
    assert!(matches!(
      err,
      ModelError::Shape {
        dim: 1,
        expected: 4,
        actual: 3,
        ..
      }
    ));
    assert!(err.to_string().contains("graph encoder input"));
  }

  #[test]
  fn node_index_is_not_clamped() {
    let encoder = GraphEncoder::new(vec![identity_conv(2)], 2);
    let graph = GraphSnapshot::new(Array2::zeros((5, 2)), vec![]).unwrap();
    let emb = encoder.encode(&graph).unwrap();
    assert!(emb.node(4).is_ok());
    assert!(matches!(
      emb.node(10),
      Err(ModelError::NodeIndex { index: 10, nodes: 5 })
    ));
  }
}
