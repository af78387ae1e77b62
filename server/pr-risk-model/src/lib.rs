//! PR Risk Model — GCN-LSTM-SLSTM inference for pull-request risk and duration.
//!
//! A graph encoder embeds the contribution graph, a stacked LSTM summarises one
//! PR's feature history, and a scalar-gated fusion cell combines both before a
//! risk head (2 classes) and a duration head (hours).
//!
//! Used by the binary for stdin/stdout; can also be called as a library.
//! Inference only: weights are frozen once loaded.

pub mod config;
pub mod error;
pub mod fusion;
pub mod gcn;
pub mod graph;
pub mod heads;
pub mod layers;
pub mod lstm;
pub mod model;
pub mod postprocess;
pub mod score;
pub mod types;
pub mod weights;

pub use config::Architecture;
pub use error::ModelError;
pub use graph::GraphSnapshot;
pub use lstm::TimeSeries;
pub use model::{Prediction, RiskModel};
pub use postprocess::RiskLabel;
pub use score::run;
pub use types::{ScoreRequest, ScoreResponse};
pub use weights::WeightStore;
