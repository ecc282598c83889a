// Run orchestration: fetch the candidate pool, optimize, hand the outcome
// to the reporter.
//
// The optimizer is synchronous and CPU-bound, so it runs on tokio's
// blocking pool while the provider stays async.

use thiserror::Error;
use tracing::info;

use wildcard_core::{OptimizationOutcome, OptimizeError};
use wildcard_fpl::{
    CandidateProvider, ClientError, CsvCandidateSource, FplCandidateSource, FplClient,
    ProviderError,
};

use crate::config::{Config, SourceKind};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to set up the FPL client: {0}")]
    Client(#[from] ClientError),

    #[error("failed to fetch candidates: {0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Optimize(#[from] OptimizeError),

    #[error("optimizer task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

// ---------------------------------------------------------------------------
// Provider selection
// ---------------------------------------------------------------------------

/// Build the candidate provider named by `[source]` in strategy.toml.
pub fn build_provider(config: &Config) -> Result<Box<dyn CandidateProvider>, RunError> {
    match config.source.kind {
        SourceKind::Fpl => {
            let client = FplClient::new(&config.source.base_url, config.source.timeout())?;
            info!("Using FPL API source at {}", client.base_url());
            Ok(Box::new(FplCandidateSource::new(
                client,
                config.pool_filter.clone(),
                Box::new(config.scoring.clone()),
            )))
        }
        SourceKind::Csv => {
            info!("Using CSV source at {}", config.source.csv_path);
            Ok(Box::new(CsvCandidateSource::new(&config.source.csv_path)))
        }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Fetch the pool from `provider` and run the configured optimizer over it.
pub async fn run(
    config: &Config,
    provider: &dyn CandidateProvider,
) -> Result<OptimizationOutcome, RunError> {
    let candidates = provider.fetch_candidates().await?;
    info!("Optimizing over {} candidates", candidates.len());

    let optimizer = config.optimizer();
    let outcome = tokio::task::spawn_blocking(move || optimizer.run(&candidates)).await??;

    info!(
        "Squad selected: objective {:.2} (base {:.2}), {} swap(s), cost {:.1}",
        outcome.objective,
        outcome.base_objective,
        outcome.swaps.len(),
        outcome.squad.total_price()
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
