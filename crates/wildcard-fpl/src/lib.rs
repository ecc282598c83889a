// Player data provider for the squad optimizer: FPL API access, fixture
// difficulty, pool filtering, scoring, and CSV import.

pub mod bootstrap;
pub mod client;
pub mod filter;
pub mod fixtures;
pub mod scoring;
pub mod source;

pub use bootstrap::{Bootstrap, PlayerRecord};
pub use client::{ClientError, FplClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use filter::PoolFilter;
pub use fixtures::{Fixture, FixtureOutlook};
pub use scoring::{Metric, ScoringError, ScoringModel, WeightedMetricScoring};
pub use source::{
    build_candidates, load_candidates, CandidateProvider, CsvCandidateSource,
    FplCandidateSource, ProviderError,
};
