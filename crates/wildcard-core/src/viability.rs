// Fast pre-solve feasibility check.
//
// Decides whether any squad could exist for the given pool and constraints
// before the solver is invoked. Passing this check does not guarantee the
// solve succeeds: the per-club cap is not considered here.

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::candidate::{Candidate, Position};
use crate::constraints::{ConstraintError, ConstraintSet};
use crate::squad::BUDGET_TOLERANCE;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViabilityError {
    #[error("invalid constraints: {0}")]
    InvalidConstraints(#[from] ConstraintError),

    #[error("candidate {id} has an invalid price ({price})")]
    InvalidPrice { id: u32, price: f64 },

    #[error("candidate id {0} appears more than once in the pool")]
    DuplicateCandidate(u32),

    #[error("not enough {position} candidates: need {required}, have {available}")]
    InsufficientPositionSupply {
        position: Position,
        required: usize,
        available: usize,
    },

    #[error("cheapest legal squad costs {minimum_cost:.1}, budget is {budget:.1}")]
    BudgetInfeasible { minimum_cost: f64, budget: f64 },
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What the check learned about the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct ViabilityReport {
    /// Candidates available per position.
    pub available: BTreeMap<Position, usize>,
    /// Cost of the cheapest squad that meets every position quota.
    pub minimum_cost: f64,
}

impl ViabilityReport {
    pub fn available(&self, pos: Position) -> usize {
        self.available.get(&pos).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Check that a squad satisfying `constraints` can be drawn from `candidates`.
///
/// Algorithm:
/// 1. Validate the constraint set and every candidate's price and id.
/// 2. For each position, count candidates; fail if fewer than the quota.
/// 3. Sum the `quota` cheapest prices per position; fail if the total
///    exceeds the budget.
///
/// Positions are checked in squad display order (GK, DEF, MID, FWD), so the
/// first short position in that order is the one reported.
pub fn check_viability(
    candidates: &[Candidate],
    constraints: &ConstraintSet,
) -> Result<ViabilityReport, ViabilityError> {
    constraints.validate()?;

    let mut seen = HashSet::with_capacity(candidates.len());
    for c in candidates {
        if !c.price.is_finite() || c.price < 0.0 {
            return Err(ViabilityError::InvalidPrice {
                id: c.id,
                price: c.price,
            });
        }
        if !seen.insert(c.id) {
            return Err(ViabilityError::DuplicateCandidate(c.id));
        }
    }

    let mut available = BTreeMap::new();
    let mut minimum_cost = 0.0;

    for pos in Position::ALL {
        let mut prices: Vec<f64> = candidates
            .iter()
            .filter(|c| c.position == pos)
            .map(|c| c.price)
            .collect();
        available.insert(pos, prices.len());

        let required = constraints.quota(pos);
        if prices.len() < required {
            return Err(ViabilityError::InsufficientPositionSupply {
                position: pos,
                required,
                available: prices.len(),
            });
        }

        prices.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        minimum_cost += prices.iter().take(required).sum::<f64>();
    }

    if minimum_cost > constraints.budget + BUDGET_TOLERANCE {
        return Err(ViabilityError::BudgetInfeasible {
            minimum_cost,
            budget: constraints.budget,
        });
    }

    Ok(ViabilityReport {
        available,
        minimum_cost,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
