// Upcoming fixture difficulty per team, from the FPL `fixtures/` endpoint.
//
// Each team's outlook is the mean difficulty rating (FDR, 1 easiest to 5
// hardest) of its unfinished fixtures in the next few gameweeks, shifted by
// a home/away modifier and clamped to the rating scale.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::bootstrap::PlayerRecord;

/// Difficulty assumed for a team with no fixtures in the window.
pub const NEUTRAL_DIFFICULTY: f64 = 3.0;
/// Gameweeks looked ahead, counting the next one to be played.
pub const LOOKAHEAD_GAMEWEEKS: u32 = 4;
const HOME_MODIFIER: f64 = -0.3;
const AWAY_MODIFIER: f64 = 0.3;
const MIN_DIFFICULTY: f64 = 1.0;
const MAX_DIFFICULTY: f64 = 5.0;

/// One match as the API describes it. Unused fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    /// Gameweek; `null` while the match is unscheduled.
    #[serde(default)]
    pub event: Option<u32>,
    pub team_h: u32,
    pub team_a: u32,
    /// Difficulty of this match for the home side.
    #[serde(default = "neutral_rating")]
    pub team_h_difficulty: u8,
    /// Difficulty of this match for the away side.
    #[serde(default = "neutral_rating")]
    pub team_a_difficulty: u8,
    #[serde(default)]
    pub finished: bool,
}

fn neutral_rating() -> u8 {
    3
}

/// Scales expected points by how kind a team's upcoming fixtures are.
pub fn fixture_multiplier(difficulty: f64) -> f64 {
    if difficulty <= 2.5 {
        1.15
    } else if difficulty <= 3.5 {
        1.0
    } else {
        0.85
    }
}

// ---------------------------------------------------------------------------
// FixtureOutlook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureOutlook {
    by_team: HashMap<u32, f64>,
}

impl FixtureOutlook {
    /// Average difficulty per team over `lookahead` gameweeks, starting at
    /// the earliest gameweek that still has an unfinished fixture.
    pub fn from_fixtures(fixtures: &[Fixture], lookahead: u32) -> Self {
        let upcoming = || {
            fixtures
                .iter()
                .filter(|f| !f.finished)
                .filter_map(|f| f.event.map(|gw| (gw, f)))
        };
        let Some(start) = upcoming().map(|(gw, _)| gw).min() else {
            return Self::default();
        };
        let end = start + lookahead.saturating_sub(1);

        let mut ratings: HashMap<u32, Vec<f64>> = HashMap::new();
        for (_, f) in upcoming().filter(|&(gw, _)| gw <= end) {
            ratings
                .entry(f.team_h)
                .or_default()
                .push(adjusted(f.team_h_difficulty, HOME_MODIFIER));
            ratings
                .entry(f.team_a)
                .or_default()
                .push(adjusted(f.team_a_difficulty, AWAY_MODIFIER));
        }
        debug!(
            "Fixture outlook for gameweeks {}-{} covers {} teams",
            start,
            end,
            ratings.len()
        );

        let by_team = ratings
            .into_iter()
            .map(|(team, r)| (team, r.iter().sum::<f64>() / r.len() as f64))
            .collect();
        Self { by_team }
    }

    pub fn difficulty(&self, team_id: u32) -> f64 {
        self.by_team
            .get(&team_id)
            .copied()
            .unwrap_or(NEUTRAL_DIFFICULTY)
    }

    /// Stamp each player with their team's outlook.
    pub fn apply(&self, players: &mut [PlayerRecord]) {
        for p in players {
            p.fixture_difficulty = self.difficulty(p.team_id);
        }
    }
}

fn adjusted(rating: u8, modifier: f64) -> f64 {
    (f64::from(rating) + modifier).clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
