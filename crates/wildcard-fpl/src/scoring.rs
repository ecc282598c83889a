// Turning raw player stats into the single `score` the optimizer maximizes.
//
// The default model normalizes each metric to 0-100 within a position
// (value / position max * 100) and sums the weighted results.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use wildcard_core::Position;

use crate::bootstrap::PlayerRecord;
use crate::fixtures::fixture_multiplier;

/// Per-90 rates are computed against at least half a game.
const MIN_GAMES: f64 = 0.5;
const MAX_GOALS_PER_90: f64 = 3.0;
const MAX_ASSISTS_PER_90: f64 = 3.0;
const MAX_XG_PER_90: f64 = 2.0;
const MAX_XA_PER_90: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("unknown scoring metric '{0}'")]
    UnknownMetric(String),

    #[error("weight for {metric} must be finite, got {weight}")]
    InvalidWeight { metric: Metric, weight: f64 },
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    TotalPoints,
    PointsPerMillion,
    CleanSheetRate,
    Saves,
    GoalsPer90,
    AssistsPer90,
    XgPer90,
    XgiPer90,
    Creativity,
    Threat,
    Form,
    EpNext,
    /// `ep_next` scaled by the team's upcoming fixture difficulty.
    FixtureAdjustedEp,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::TotalPoints,
        Metric::PointsPerMillion,
        Metric::CleanSheetRate,
        Metric::Saves,
        Metric::GoalsPer90,
        Metric::AssistsPer90,
        Metric::XgPer90,
        Metric::XgiPer90,
        Metric::Creativity,
        Metric::Threat,
        Metric::Form,
        Metric::EpNext,
        Metric::FixtureAdjustedEp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::TotalPoints => "total_points",
            Metric::PointsPerMillion => "points_per_million",
            Metric::CleanSheetRate => "clean_sheet_rate",
            Metric::Saves => "saves",
            Metric::GoalsPer90 => "goals_per_90",
            Metric::AssistsPer90 => "assists_per_90",
            Metric::XgPer90 => "xg_per_90",
            Metric::XgiPer90 => "xgi_per_90",
            Metric::Creativity => "creativity",
            Metric::Threat => "threat",
            Metric::Form => "form",
            Metric::EpNext => "ep_next",
            Metric::FixtureAdjustedEp => "fixture_adjusted_ep",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Metric::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Raw (unnormalized) value of this metric for `p`.
    pub fn value(&self, p: &PlayerRecord) -> f64 {
        match self {
            Metric::TotalPoints => p.total_points,
            Metric::PointsPerMillion => {
                if p.price > 0.0 {
                    p.total_points / p.price
                } else {
                    0.0
                }
            }
            Metric::CleanSheetRate => p.clean_sheets / games_played(p),
            Metric::Saves => p.saves,
            Metric::GoalsPer90 => per_90(p.goals, p.minutes, MAX_GOALS_PER_90),
            Metric::AssistsPer90 => per_90(p.assists, p.minutes, MAX_ASSISTS_PER_90),
            Metric::XgPer90 => per_90(p.expected_goals, p.minutes, MAX_XG_PER_90),
            Metric::XgiPer90 => {
                per_90(p.expected_goals, p.minutes, MAX_XG_PER_90)
                    + per_90(p.expected_assists, p.minutes, MAX_XA_PER_90)
            }
            Metric::Creativity => p.creativity,
            Metric::Threat => p.threat,
            Metric::Form => p.form,
            Metric::EpNext => p.ep_next,
            Metric::FixtureAdjustedEp => p.ep_next * fixture_multiplier(p.fixture_difficulty),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn games_played(p: &PlayerRecord) -> f64 {
    (p.minutes / 90.0).max(MIN_GAMES)
}

/// Rate per 90 minutes, capped. Zero minutes gives zero.
fn per_90(stat: f64, minutes: f64, cap: f64) -> f64 {
    if minutes <= 0.0 {
        return 0.0;
    }
    (stat / minutes * 90.0).min(cap)
}

// ---------------------------------------------------------------------------
// Scoring models
// ---------------------------------------------------------------------------

/// Assigns every player in a pool a score. Scores may depend on the whole
/// pool (e.g. normalization), so the pool is scored at once.
pub trait ScoringModel: Send + Sync {
    /// One score per player, in input order.
    fn score(&self, players: &[PlayerRecord]) -> Vec<f64>;

    /// Whether scores read `fixture_difficulty`, so fixtures must be fetched.
    fn needs_fixtures(&self) -> bool {
        false
    }
}

/// Weighted sum of position-normalized metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedMetricScoring {
    weights: BTreeMap<Position, Vec<(Metric, f64)>>,
}

impl WeightedMetricScoring {
    pub fn new(weights: BTreeMap<Position, Vec<(Metric, f64)>>) -> Self {
        WeightedMetricScoring { weights }
    }

    /// Build from metric names, as read from configuration.
    pub fn from_names(
        table: &BTreeMap<Position, BTreeMap<String, f64>>,
    ) -> Result<Self, ScoringError> {
        let mut weights = BTreeMap::new();
        for (pos, metrics) in table {
            let mut list = Vec::with_capacity(metrics.len());
            for (name, &weight) in metrics {
                let metric =
                    Metric::from_name(name).ok_or_else(|| ScoringError::UnknownMetric(name.clone()))?;
                if !weight.is_finite() {
                    return Err(ScoringError::InvalidWeight { metric, weight });
                }
                list.push((metric, weight));
            }
            weights.insert(*pos, list);
        }
        Ok(WeightedMetricScoring { weights })
    }

    pub fn weights(&self, pos: Position) -> &[(Metric, f64)] {
        self.weights.get(&pos).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for WeightedMetricScoring {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (
                Position::Goalkeeper,
                vec![
                    (Metric::TotalPoints, 0.40),
                    (Metric::PointsPerMillion, 0.25),
                    (Metric::CleanSheetRate, 0.20),
                    (Metric::Saves, 0.15),
                ],
            ),
            (
                Position::Defender,
                vec![
                    (Metric::TotalPoints, 0.35),
                    (Metric::PointsPerMillion, 0.20),
                    (Metric::CleanSheetRate, 0.20),
                    (Metric::GoalsPer90, 0.15),
                    (Metric::AssistsPer90, 0.10),
                ],
            ),
            (
                Position::Midfielder,
                vec![
                    (Metric::TotalPoints, 0.30),
                    (Metric::XgiPer90, 0.25),
                    (Metric::PointsPerMillion, 0.20),
                    (Metric::Creativity, 0.15),
                    (Metric::Form, 0.10),
                ],
            ),
            (
                Position::Forward,
                vec![
                    (Metric::TotalPoints, 0.30),
                    (Metric::XgPer90, 0.25),
                    (Metric::GoalsPer90, 0.20),
                    (Metric::PointsPerMillion, 0.15),
                    (Metric::Threat, 0.10),
                ],
            ),
        ]);
        WeightedMetricScoring { weights }
    }
}

impl ScoringModel for WeightedMetricScoring {
    fn score(&self, players: &[PlayerRecord]) -> Vec<f64> {
        let mut scores = vec![0.0; players.len()];

        for pos in Position::ALL {
            let idxs: Vec<usize> = players
                .iter()
                .enumerate()
                .filter(|(_, p)| p.position == pos)
                .map(|(i, _)| i)
                .collect();
            if idxs.is_empty() {
                continue;
            }

            for &(metric, weight) in self.weights(pos) {
                let values: Vec<f64> = idxs.iter().map(|&i| metric.value(&players[i])).collect();
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                // A metric nobody at this position registers adds nothing.
                if max <= 0.0 {
                    continue;
                }
                for (&i, v) in idxs.iter().zip(&values) {
                    scores[i] += v / max * 100.0 * weight;
                }
            }
        }
        scores
    }

    fn needs_fixtures(&self) -> bool {
        self.weights
            .values()
            .flatten()
            .any(|&(metric, _)| metric == Metric::FixtureAdjustedEp)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn player(id: u32, position: Position, price: f64, total_points: f64) -> PlayerRecord {
        PlayerRecord {
            id,
            name: format!("P{id}"),
            position,
            club: "ARS".into(),
            team_id: 1,
            price,
            status: "a".into(),
            chance_of_playing: None,
            ownership_pct: 10.0,
            total_points,
            minutes: 270.0,
            form: 0.0,
            ep_next: 0.0,
            goals: 0.0,
            assists: 0.0,
            clean_sheets: 0.0,
            saves: 0.0,
            creativity: 0.0,
            threat: 0.0,
            expected_goals: 0.0,
            expected_assists: 0.0,
            fixture_difficulty: 3.0,
        }
    }

    #[test]
    fn metric_names_roundtrip() {
        for m in Metric::ALL {
            assert_eq!(Metric::from_name(m.name()), Some(m));
        }
        assert_eq!(Metric::from_name("form_score"), None);
    }

    #[test]
    fn per_90_rates_are_capped() {
        let mut p = player(1, Position::Forward, 8.0, 10.0);
        p.minutes = 10.0;
        p.goals = 2.0;
        p.expected_goals = 1.0;
        p.expected_assists = 1.0;
        assert!(approx_eq(Metric::GoalsPer90.value(&p), 3.0, 1e-12));
        assert!(approx_eq(Metric::XgPer90.value(&p), 2.0, 1e-12));
        assert!(approx_eq(Metric::XgiPer90.value(&p), 4.0, 1e-12));
    }

    #[test]
    fn zero_minutes_rates_are_zero() {
        let mut p = player(1, Position::Forward, 8.0, 0.0);
        p.minutes = 0.0;
        p.goals = 1.0;
        assert_eq!(Metric::GoalsPer90.value(&p), 0.0);
    }

    #[test]
    fn clean_sheet_rate_uses_minimum_games() {
        let mut p = player(1, Position::Defender, 5.0, 6.0);
        p.minutes = 0.0;
        p.clean_sheets = 1.0;
        assert!(approx_eq(Metric::CleanSheetRate.value(&p), 2.0, 1e-12));
        p.minutes = 270.0;
        assert!(approx_eq(Metric::CleanSheetRate.value(&p), 1.0 / 3.0, 1e-12));
    }

    #[test]
    fn points_per_million_guards_zero_price() {
        assert_eq!(
            Metric::PointsPerMillion.value(&player(1, Position::Defender, 0.0, 10.0)),
            0.0
        );
    }

    #[test]
    fn normalizes_within_position() {
        let model = WeightedMetricScoring::new(BTreeMap::from([
            (Position::Defender, vec![(Metric::TotalPoints, 1.0)]),
            (Position::Forward, vec![(Metric::TotalPoints, 0.5)]),
        ]));
        let players = vec![
            player(1, Position::Defender, 5.0, 20.0),
            player(2, Position::Defender, 5.0, 10.0),
            player(3, Position::Forward, 5.0, 80.0),
        ];
        let scores = model.score(&players);
        assert!(approx_eq(scores[0], 100.0, 1e-9));
        assert!(approx_eq(scores[1], 50.0, 1e-9));
        // Forward max is its own value.
        assert!(approx_eq(scores[2], 50.0, 1e-9));
    }

    #[test]
    fn position_without_weights_scores_zero() {
        let model = WeightedMetricScoring::new(BTreeMap::new());
        let scores = model.score(&[player(1, Position::Goalkeeper, 4.5, 30.0)]);
        assert_eq!(scores, vec![0.0]);
    }

    #[test]
    fn all_zero_metric_skipped() {
        let model = WeightedMetricScoring::default();
        let players = vec![
            player(1, Position::Goalkeeper, 4.5, 0.0),
            player(2, Position::Goalkeeper, 5.0, 0.0),
        ];
        assert_eq!(model.score(&players), vec![0.0, 0.0]);
    }

    #[test]
    fn default_weights_sum_to_one() {
        let model = WeightedMetricScoring::default();
        for pos in Position::ALL {
            let total: f64 = model.weights(pos).iter().map(|(_, w)| w).sum();
            assert!(approx_eq(total, 1.0, 1e-9), "{pos} weights sum to {total}");
        }
    }

    #[test]
    fn from_names_rejects_unknown_metric() {
        let table = BTreeMap::from([(
            Position::Midfielder,
            BTreeMap::from([("form".to_string(), 0.5), ("vibes".to_string(), 0.5)]),
        )]);
        assert_eq!(
            WeightedMetricScoring::from_names(&table),
            Err(ScoringError::UnknownMetric("vibes".into()))
        );
    }

    #[test]
    fn from_names_builds_model() {
        let table = BTreeMap::from([(
            Position::Forward,
            BTreeMap::from([("threat".to_string(), 1.0)]),
        )]);
        let model = WeightedMetricScoring::from_names(&table).unwrap();
        assert_eq!(model.weights(Position::Forward), &[(Metric::Threat, 1.0)]);
        assert!(model.weights(Position::Defender).is_empty());
    }

    #[test]
    fn fixture_adjusted_ep_follows_difficulty() {
        let mut p = player(1, Position::Midfielder, 8.0, 40.0);
        p.ep_next = 6.0;
        assert!(approx_eq(Metric::FixtureAdjustedEp.value(&p), 6.0, 1e-12));
        p.fixture_difficulty = 1.7;
        assert!(approx_eq(Metric::FixtureAdjustedEp.value(&p), 6.9, 1e-12));
        p.fixture_difficulty = 4.3;
        assert!(approx_eq(Metric::FixtureAdjustedEp.value(&p), 5.1, 1e-12));
    }

    #[test]
    fn easier_fixtures_outscore_equal_ep() {
        let model = WeightedMetricScoring::new(BTreeMap::from([(
            Position::Forward,
            vec![(Metric::FixtureAdjustedEp, 1.0)],
        )]));
        let mut easy = player(1, Position::Forward, 8.0, 40.0);
        easy.ep_next = 5.0;
        easy.fixture_difficulty = 2.0;
        let hard = PlayerRecord {
            id: 2,
            fixture_difficulty: 4.0,
            ..easy.clone()
        };
        let scores = model.score(&[easy, hard]);
        assert!(approx_eq(scores[0], 100.0, 1e-9));
        assert!(approx_eq(scores[1], 0.85 / 1.15 * 100.0, 1e-9));
    }

    #[test]
    fn needs_fixtures_only_when_weighted() {
        assert!(!WeightedMetricScoring::default().needs_fixtures());
        let table = BTreeMap::from([(
            Position::Midfielder,
            BTreeMap::from([("fixture_adjusted_ep".to_string(), 0.3)]),
        )]);
        assert!(WeightedMetricScoring::from_names(&table).unwrap().needs_fixtures());
    }
}
