// Draftable players and their position groups.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scores at or below this value are raised to it before optimization.
///
/// A zero objective coefficient gives the solver nothing to separate
/// candidates by, so every candidate keeps at least this much value.
pub const SCORE_FLOOR: f64 = 0.1;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Squad position groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    /// All positions in squad display order.
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Parse a position label into a Position.
    ///
    /// Accepts the short labels used across FPL data sources:
    /// - "GK" / "GKP" -> Goalkeeper
    /// - "DEF" -> Defender, "MID" -> Midfielder, "FWD" -> Forward
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GK" | "GKP" => Some(Position::Goalkeeper),
            "DEF" => Some(Position::Defender),
            "MID" => Some(Position::Midfielder),
            "FWD" => Some(Position::Forward),
            _ => None,
        }
    }

    /// Map an FPL `element_type` id (1-4) to a Position.
    pub fn from_element_type(element_type: u8) -> Option<Self> {
        match element_type {
            1 => Some(Position::Goalkeeper),
            2 => Some(Position::Defender),
            3 => Some(Position::Midfielder),
            4 => Some(Position::Forward),
            _ => None,
        }
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

impl TryFrom<String> for Position {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Position::from_str_pos(&value).ok_or_else(|| format!("unknown position '{value}'"))
    }
}

impl From<Position> for String {
    fn from(pos: Position) -> Self {
        pos.display_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// One draftable player as handed over by a data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique identifier, stable for the duration of a run.
    pub id: u32,
    /// Display name (FPL `web_name`).
    pub name: String,
    pub position: Position,
    /// Club identifier used for the per-club cap.
    pub club: String,
    /// Cost in budget units (already converted from tenths).
    pub price: f64,
    /// Externally computed desirability. Never derived here.
    pub score: f64,
    /// Percentage (0-100) of managers selecting this player.
    pub ownership_pct: f64,
}

impl Candidate {
    /// The score used by the optimizer: the supplied score, floored at
    /// [`SCORE_FLOOR`]. NaN and infinite scores also collapse to the floor.
    pub fn effective_score(&self) -> f64 {
        if self.score.is_finite() {
            self.score.max(SCORE_FLOOR)
        } else {
            SCORE_FLOOR
        }
    }
}
