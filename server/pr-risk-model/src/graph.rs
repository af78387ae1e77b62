//! Contribution graph snapshot and its GCN-normalized adjacency.

use ndarray::{Array2, ArrayView2};

use crate::error::{ModelError, Result};

/// One weighted message edge: `out[target] += weight * x[source]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedEdge {
  pub source: usize,
  pub target: usize,
  pub weight: f32,
}

/// Node features plus connectivity, validated once and shared across predictions.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
  features: Array2<f32>,
  edges: Vec<[usize; 2]>,
  normalized: Vec<NormalizedEdge>,
}

impl GraphSnapshot {
  /// Build a snapshot from an `N × F` feature matrix and `[source, target]` pairs.
  pub fn new(features: Array2<f32>, edges: Vec<[usize; 2]>) -> Result<Self> {
    let nodes = features.nrows();
    if nodes == 0 {
      return Err(ModelError::validation("graph.x", "graph must have at least one node"));
    }
    for (i, &[src, tgt]) in edges.iter().enumerate() {
      if src >= nodes || tgt >= nodes {
        return Err(ModelError::validation(
          "graph.edge_index",
          format!("edge {i} ({src} -> {tgt}) references a node outside 0..{nodes}"),
        ));
      }
    }
    let normalized = gcn_normalize(&edges, nodes);
    Ok(Self {
      features,
      edges,
      normalized,
    })
  }

  /// Build from row vectors, rejecting ragged rows.
  pub fn from_rows(rows: &[Vec<f32>], edges: Vec<[usize; 2]>) -> Result<Self> {
    let features = rows_to_matrix("graph.x", rows)?;
    Self::new(features, edges)
  }

  pub fn num_nodes(&self) -> usize {
    self.features.nrows()
  }

  pub fn feature_dim(&self) -> usize {
    self.features.ncols()
  }

  pub fn features(&self) -> ArrayView2<'_, f32> {
    self.features.view()
  }

  pub fn edges(&self) -> &[[usize; 2]] {
    &self.edges
  }

  pub fn normalized_edges(&self) -> &[NormalizedEdge] {
    &self.normalized
  }
}

/// Symmetric GCN normalization `D^-1/2 (A + I) D^-1/2`.
///
/// Existing self-loops are dropped and exactly one unit self-loop is added per
/// node. Degree is counted at the target node. Duplicate edges count twice.
pub fn gcn_normalize(edges: &[[usize; 2]], nodes: usize) -> Vec<NormalizedEdge> {
  let mut pairs: Vec<(usize, usize)> = edges
    .iter()
    .filter(|[s, t]| s != t)
    .map(|&[s, t]| (s, t))
    .collect();
  pairs.extend((0..nodes).map(|n| (n, n)));

  // Self-loops guarantee every degree is at least one.
  let mut degree = vec![0.0f32; nodes];
  for &(_, t) in &pairs {
    degree[t] += 1.0;
  }

  pairs
    .into_iter()
    .map(|(source, target)| NormalizedEdge {
      source,
      target,
      weight: (degree[source] * degree[target]).sqrt().recip(),
    })
    .collect()
}

/// Convert row vectors into a matrix; every row must have the first row's width.
pub fn rows_to_matrix(field: &str, rows: &[Vec<f32>]) -> Result<Array2<f32>> {
  let width = rows.first().map(Vec::len).unwrap_or(0);
  if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
    return Err(ModelError::validation(
      field,
      format!("row {i} has {} values, expected {width}", row.len()),
    ));
  }
  let flat: Vec<f32> = rows.iter().flatten().copied().collect();
  Array2::from_shape_vec((rows.len(), width), flat)
    .map_err(|e| ModelError::validation(field, e.to_string()))
}
