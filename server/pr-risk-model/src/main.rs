//! Binary entrypoint: read one ScoreRequest JSON from stdin, write one ScoreResponse to stdout.
//!
//! Weights load once at startup; a missing or incompatible checkpoint exits non-zero.
//! Malformed JSON or an invalid graph produces a single ErrorOutput object instead.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use pr_risk_model::score::respond;
use pr_risk_model::RiskModel;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pr-risk", about = "Score pull requests with the GCN-LSTM-SLSTM risk model")]
struct Args {
  /// Path to the safetensors checkpoint
  #[arg(long, env = "PR_RISK_WEIGHTS")]
  weights: PathBuf,
}

fn main() {
  // Logging goes to stderr (stdout carries the JSON response)
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pr_risk=info,pr_risk_model=info".into()),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();

  let args = Args::parse();
  if let Err(e) = run_binary(&args) {
    tracing::error!(weights = %args.weights.display(), error = %e, "pr-risk failed");
    std::process::exit(1);
  }
}

fn run_binary(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
  let model = RiskModel::load(&args.weights)?;

  let mut raw = String::new();
  io::stdin().lock().read_to_string(&mut raw)?;
  let json = respond(&model, &raw)?;
  io::stdout().write_all(&json)?;
  Ok(())
}
