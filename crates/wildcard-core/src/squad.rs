// The selected squad and its invariant checks.

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::candidate::{Candidate, Position};
use crate::constraints::ConstraintSet;

/// Slack allowed on the budget comparison. Prices are sums of one-decimal
/// values, so anything tighter trips over float rounding.
pub const BUDGET_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SquadViolation {
    #[error("squad has {actual} players, expected {expected}")]
    WrongSize { expected: usize, actual: usize },

    #[error("squad has {actual} {position} players, quota is {expected}")]
    PositionQuota {
        position: Position,
        expected: usize,
        actual: usize,
    },

    #[error("squad costs {total:.1}, budget is {budget:.1}")]
    OverBudget { total: f64, budget: f64 },

    #[error("squad has {count} players from {club}, cap is {cap}")]
    ClubCap { club: String, count: usize, cap: usize },

    #[error("candidate {0} appears more than once")]
    DuplicateCandidate(u32),
}

/// A set of selected candidates. Construction does not validate; call
/// [`Squad::verify`] before handing a squad to anyone else.
#[derive(Debug, Clone, PartialEq)]
pub struct Squad {
    members: Vec<Candidate>,
}

impl Squad {
    pub fn new(members: Vec<Candidate>) -> Self {
        Squad { members }
    }

    pub fn members(&self) -> &[Candidate] {
        &self.members
    }

    pub fn into_members(self) -> Vec<Candidate> {
        self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn total_price(&self) -> f64 {
        self.members.iter().map(|c| c.price).sum()
    }

    /// Sum of effective (floored) scores: the ILP objective value.
    pub fn total_score(&self) -> f64 {
        self.members.iter().map(Candidate::effective_score).sum()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.members.iter().any(|c| c.id == id)
    }

    pub fn count_position(&self, pos: Position) -> usize {
        self.members.iter().filter(|c| c.position == pos).count()
    }

    pub fn count_club(&self, club: &str) -> usize {
        self.members.iter().filter(|c| c.club == club).count()
    }

    /// Player count per club, sorted by club identifier.
    pub fn club_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for c in &self.members {
            *counts.entry(c.club.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Members at `pos`, in squad order.
    pub fn at_position(&self, pos: Position) -> impl Iterator<Item = &Candidate> {
        self.members.iter().filter(move |c| c.position == pos)
    }

    /// Replace the member with id `out_id` by `incoming`. Returns the removed
    /// candidate, or `None` (leaving the squad untouched) if `out_id` is absent.
    pub(crate) fn replace(&mut self, out_id: u32, incoming: Candidate) -> Option<Candidate> {
        let idx = self.members.iter().position(|c| c.id == out_id)?;
        Some(std::mem::replace(&mut self.members[idx], incoming))
    }

    /// Check every squad invariant against `constraints`.
    ///
    /// Order: duplicates, size, position quotas, budget, club cap. The first
    /// violation found is returned.
    pub fn verify(&self, constraints: &ConstraintSet) -> Result<(), SquadViolation> {
        let mut seen = HashSet::with_capacity(self.members.len());
        for c in &self.members {
            if !seen.insert(c.id) {
                return Err(SquadViolation::DuplicateCandidate(c.id));
            }
        }

        if self.members.len() != constraints.squad_size {
            return Err(SquadViolation::WrongSize {
                expected: constraints.squad_size,
                actual: self.members.len(),
            });
        }

        for pos in Position::ALL {
            let expected = constraints.quota(pos);
            let actual = self.count_position(pos);
            if actual != expected {
                return Err(SquadViolation::PositionQuota {
                    position: pos,
                    expected,
                    actual,
                });
            }
        }

        let total = self.total_price();
        if total > constraints.budget + BUDGET_TOLERANCE {
            return Err(SquadViolation::OverBudget {
                total,
                budget: constraints.budget,
            });
        }

        for (club, count) in self.club_counts() {
            if count > constraints.max_per_club {
                return Err(SquadViolation::ClubCap {
                    club: club.to_string(),
                    count,
                    cap: constraints.max_per_club,
                });
            }
        }

        Ok(())
    }
}
