// FPL `bootstrap-static` payload and the flattened player records built
// from it.
//
// The API encodes many numeric fields as strings ("5.3") and leaves some
// null early in the season. Those are read leniently: anything that does not
// parse becomes 0.0.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;
use wildcard_core::Position;

use crate::fixtures::NEUTRAL_DIFFICULTY;

// ---------------------------------------------------------------------------
// Raw API structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Bootstrap {
    pub elements: Vec<Element>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub element_types: Vec<ElementType>,
}

/// One player as the API describes them. Unused fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Element {
    pub id: u32,
    pub web_name: String,
    pub element_type: u8,
    pub team: u32,
    /// Price in tenths of a unit.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub now_cost: f64,
    #[serde(default)]
    pub status: String,
    /// Percent chance of playing in the current gameweek; `null` when no
    /// doubt has been flagged.
    #[serde(default)]
    pub chance_of_playing_this_round: Option<u32>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub selected_by_percent: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_points: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub minutes: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub form: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ep_next: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub goals_scored: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub assists: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub clean_sheets: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub saves: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub creativity: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub threat: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub expected_goals: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub expected_assists: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Team {
    pub id: u32,
    pub name: String,
    pub short_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElementType {
    pub id: u8,
    pub singular_name_short: String,
}

/// Accept a JSON number, a numeric string, or null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|v| v.is_finite()).unwrap_or(0.0))
}

// ---------------------------------------------------------------------------
// Player records
// ---------------------------------------------------------------------------

/// A player joined with their club and position, prices in whole units.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: u32,
    pub name: String,
    pub position: Position,
    /// Club short name (e.g. "ARS").
    pub club: String,
    /// API team id, the key fixtures are matched on.
    pub team_id: u32,
    pub price: f64,
    pub status: String,
    pub chance_of_playing: Option<u32>,
    pub ownership_pct: f64,
    pub total_points: f64,
    pub minutes: f64,
    pub form: f64,
    pub ep_next: f64,
    pub goals: f64,
    pub assists: f64,
    pub clean_sheets: f64,
    pub saves: f64,
    pub creativity: f64,
    pub threat: f64,
    pub expected_goals: f64,
    pub expected_assists: f64,
    /// Mean upcoming fixture difficulty (1-5); neutral until fixtures are
    /// applied.
    pub fixture_difficulty: f64,
}

impl Bootstrap {
    /// Join elements with teams and element types.
    ///
    /// Players whose team or position cannot be resolved are skipped with a
    /// warning. When the payload carries no team list the numeric team id is
    /// used as the club.
    pub fn players(&self) -> Vec<PlayerRecord> {
        let teams: HashMap<u32, &str> = self
            .teams
            .iter()
            .map(|t| (t.id, t.short_name.as_str()))
            .collect();
        let positions: HashMap<u8, Position> = self
            .element_types
            .iter()
            .filter_map(|et| Position::from_str_pos(&et.singular_name_short).map(|p| (et.id, p)))
            .collect();

        let mut out = Vec::with_capacity(self.elements.len());
        for e in &self.elements {
            let position = match positions
                .get(&e.element_type)
                .copied()
                .or_else(|| Position::from_element_type(e.element_type))
            {
                Some(p) => p,
                None => {
                    warn!(
                        "skipping player '{}': unknown element_type {}",
                        e.web_name, e.element_type
                    );
                    continue;
                }
            };
            let club = if teams.is_empty() {
                e.team.to_string()
            } else {
                match teams.get(&e.team) {
                    Some(short) => short.to_string(),
                    None => {
                        warn!("skipping player '{}': unknown team {}", e.web_name, e.team);
                        continue;
                    }
                }
            };

            out.push(PlayerRecord {
                id: e.id,
                name: e.web_name.trim().to_string(),
                position,
                club,
                team_id: e.team,
                price: e.now_cost / 10.0,
                status: e.status.clone(),
                chance_of_playing: e.chance_of_playing_this_round,
                ownership_pct: e.selected_by_percent,
                total_points: e.total_points,
                minutes: e.minutes,
                form: e.form,
                ep_next: e.ep_next,
                goals: e.goals_scored,
                assists: e.assists,
                clean_sheets: e.clean_sheets,
                saves: e.saves,
                creativity: e.creativity,
                threat: e.threat,
                expected_goals: e.expected_goals,
                expected_assists: e.expected_assists,
                fixture_difficulty: NEUTRAL_DIFFICULTY,
            });
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
