// Squad-building rules for a single optimization run.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::candidate::Position;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintError {
    #[error("budget must be a finite, non-negative number, got {0}")]
    InvalidBudget(f64),

    #[error("squad_size must be greater than 0")]
    EmptySquad,

    #[error("max_per_club must be greater than 0")]
    ZeroClubCap,

    #[error("position quotas sum to {quota_total} but squad_size is {squad_size}")]
    QuotaMismatch { quota_total: usize, squad_size: usize },
}

/// The four parameters of one optimization run.
///
/// Quotas are exact counts, not ranges. A position absent from
/// `position_quota` must not appear in the squad at all.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConstraintSet {
    pub budget: f64,
    pub squad_size: usize,
    pub position_quota: BTreeMap<Position, usize>,
    pub max_per_club: usize,
}

impl ConstraintSet {
    /// Required number of players at `pos`.
    pub fn quota(&self, pos: Position) -> usize {
        self.position_quota.get(&pos).copied().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), ConstraintError> {
        if !self.budget.is_finite() || self.budget < 0.0 {
            return Err(ConstraintError::InvalidBudget(self.budget));
        }
        if self.squad_size == 0 {
            return Err(ConstraintError::EmptySquad);
        }
        if self.max_per_club == 0 {
            return Err(ConstraintError::ZeroClubCap);
        }
        let quota_total: usize = self.position_quota.values().sum();
        if quota_total != self.squad_size {
            return Err(ConstraintError::QuotaMismatch {
                quota_total,
                squad_size: self.squad_size,
            });
        }
        Ok(())
    }
}

impl Default for ConstraintSet {
    /// FPL rules: 100.0 budget, 15 players (2 GK, 5 DEF, 5 MID, 3 FWD),
    /// at most 3 from one club.
    fn default() -> Self {
        let position_quota = BTreeMap::from([
            (Position::Goalkeeper, 2),
            (Position::Defender, 5),
            (Position::Midfielder, 5),
            (Position::Forward, 3),
        ]);
        ConstraintSet {
            budget: 100.0,
            squad_size: 15,
            position_quota,
            max_per_club: 3,
        }
    }
}
