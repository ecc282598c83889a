// Candidate pool filtering: availability first, then a loose viability test
// that keeps regular starters and cheap bench options.

use serde::Deserialize;

use crate::bootstrap::PlayerRecord;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoolFilter {
    /// Status codes that remove a player outright ("u" unavailable,
    /// "s" suspended).
    pub excluded_statuses: Vec<String>,
    pub min_minutes: f64,
    /// Players at or under this price are kept as bench fodder.
    pub max_cheap_price: f64,
    pub min_total_points: f64,
    pub min_ep_next: f64,
}

impl Default for PoolFilter {
    fn default() -> Self {
        PoolFilter {
            excluded_statuses: vec!["u".into(), "s".into()],
            min_minutes: 90.0,
            max_cheap_price: 4.5,
            min_total_points: 10.0,
            min_ep_next: 3.0,
        }
    }
}

impl PoolFilter {
    /// Not flagged unavailable and not ruled out for the current round.
    pub fn is_available(&self, p: &PlayerRecord) -> bool {
        if self.excluded_statuses.iter().any(|s| s == &p.status) {
            return false;
        }
        p.chance_of_playing != Some(0)
    }

    /// Any one of: enough minutes, cheap, enough points, good expected points.
    pub fn is_viable(&self, p: &PlayerRecord) -> bool {
        p.minutes >= self.min_minutes
            || p.price <= self.max_cheap_price
            || p.total_points >= self.min_total_points
            || p.ep_next >= self.min_ep_next
    }

    pub fn apply(&self, players: Vec<PlayerRecord>) -> Vec<PlayerRecord> {
        players
            .into_iter()
            .filter(|p| self.is_available(p) && self.is_viable(p))
            .collect()
    }
}
