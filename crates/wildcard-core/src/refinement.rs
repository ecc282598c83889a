// Differential refinement: greedy ownership-weighted swaps on top of the
// optimal squad.
//
// Each candidate's effective score is scaled by a step function of its
// ownership. Positions are visited in priority order; at each one the
// weakest member (by adjusted score) is replaced by the strongest affordable
// outsider if the gain clears the improvement threshold. Passes repeat until
// one makes no swap or the swap budget is spent.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::candidate::{Candidate, Position};
use crate::constraints::ConstraintSet;
use crate::squad::{Squad, BUDGET_TOLERANCE};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("ownership band thresholds must be strictly increasing")]
    UnorderedBands,

    #[error("multipliers must be finite and positive, got {0}")]
    InvalidMultiplier(f64),

    #[error("min_improvement must be at least 1.0, got {0}")]
    InvalidImprovement(f64),

    #[error("position_priority lists {0} more than once")]
    RepeatedPosition(Position),
}

/// Ownership below `below` percent earns `multiplier`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OwnershipBand {
    pub below: f64,
    pub multiplier: f64,
}

/// Step function from ownership percentage to score multiplier.
///
/// Bands are tried in order; the first whose `below` exceeds the ownership
/// wins. An ownership exactly on a threshold falls into the next band up.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OwnershipBands {
    pub bands: Vec<OwnershipBand>,
    /// Multiplier for ownership at or above the last threshold.
    pub above_multiplier: f64,
}

impl Default for OwnershipBands {
    fn default() -> Self {
        OwnershipBands {
            bands: vec![
                OwnershipBand { below: 5.0, multiplier: 1.15 },
                OwnershipBand { below: 15.0, multiplier: 1.08 },
                OwnershipBand { below: 30.0, multiplier: 1.00 },
            ],
            above_multiplier: 0.95,
        }
    }
}

impl OwnershipBands {
    pub fn multiplier(&self, ownership_pct: f64) -> f64 {
        self.bands
            .iter()
            .find(|band| ownership_pct < band.below)
            .map(|band| band.multiplier)
            .unwrap_or(self.above_multiplier)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.bands.windows(2).any(|w| w[0].below >= w[1].below) {
            return Err(PolicyError::UnorderedBands);
        }
        let multipliers = self
            .bands
            .iter()
            .map(|b| b.multiplier)
            .chain(std::iter::once(self.above_multiplier));
        for m in multipliers {
            if !m.is_finite() || m <= 0.0 {
                return Err(PolicyError::InvalidMultiplier(m));
            }
        }
        Ok(())
    }
}

/// Knobs for [`refine`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RefinementPolicy {
    pub bands: OwnershipBands,
    /// A swap needs `incoming > outgoing * min_improvement` (adjusted scores).
    pub min_improvement: f64,
    pub max_swaps: usize,
    /// Order in which positions are visited within a pass.
    pub position_priority: Vec<Position>,
    /// Only consider replacements that keep every club within the cap.
    /// When off, the cap is not checked after a swap either.
    pub enforce_club_cap: bool,
}

impl Default for RefinementPolicy {
    fn default() -> Self {
        RefinementPolicy {
            bands: OwnershipBands::default(),
            min_improvement: 1.05,
            max_swaps: 3,
            position_priority: vec![
                Position::Forward,
                Position::Midfielder,
                Position::Defender,
                Position::Goalkeeper,
            ],
            enforce_club_cap: true,
        }
    }
}

impl RefinementPolicy {
    pub fn adjusted_score(&self, c: &Candidate) -> f64 {
        c.effective_score() * self.bands.multiplier(c.ownership_pct)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        self.bands.validate()?;
        if !self.min_improvement.is_finite() || self.min_improvement < 1.0 {
            return Err(PolicyError::InvalidImprovement(self.min_improvement));
        }
        for (i, pos) in self.position_priority.iter().enumerate() {
            if self.position_priority[..i].contains(pos) {
                return Err(PolicyError::RepeatedPosition(*pos));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One accepted replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct Swap {
    pub position: Position,
    pub outgoing: Candidate,
    pub incoming: Candidate,
    pub outgoing_adjusted: f64,
    pub incoming_adjusted: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub squad: Squad,
    pub swaps: Vec<Swap>,
}

impl Refinement {
    pub fn swap_count(&self) -> usize {
        self.swaps.len()
    }
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Apply up to `policy.max_swaps` differential swaps to `base`.
///
/// `pool` is the full candidate pool (squad members included; they are
/// skipped by id). Never fails: with no qualifying swap the base squad is
/// returned unchanged.
pub fn refine(
    base: &Squad,
    pool: &[Candidate],
    constraints: &ConstraintSet,
    policy: &RefinementPolicy,
) -> Refinement {
    let check = if policy.enforce_club_cap {
        constraints.clone()
    } else {
        ConstraintSet {
            max_per_club: usize::MAX,
            ..constraints.clone()
        }
    };

    let mut squad = base.clone();
    let mut swaps = Vec::new();

    'passes: loop {
        let mut swapped = false;
        for &pos in &policy.position_priority {
            if swaps.len() >= policy.max_swaps {
                break 'passes;
            }
            let Some(swap) = propose_swap(&squad, pool, constraints, policy, pos) else {
                continue;
            };

            let mut trial = squad.clone();
            if trial.replace(swap.outgoing.id, swap.incoming.clone()).is_none() {
                continue;
            }
            if let Err(violation) = trial.verify(&check) {
                warn!(
                    "Rejected swap {} -> {}: {}",
                    swap.outgoing.name, swap.incoming.name, violation
                );
                continue;
            }

            info!(
                "Swap {}: {} ({:.2}) -> {} ({:.2})",
                pos,
                swap.outgoing.name,
                swap.outgoing_adjusted,
                swap.incoming.name,
                swap.incoming_adjusted
            );
            squad = trial;
            swaps.push(swap);
            swapped = true;
        }
        if !swapped {
            break;
        }
    }

    debug!("Refinement finished after {} swaps", swaps.len());
    Refinement { squad, swaps }
}

/// Best qualifying replacement for the weakest member at `pos`, if any.
fn propose_swap(
    squad: &Squad,
    pool: &[Candidate],
    constraints: &ConstraintSet,
    policy: &RefinementPolicy,
    pos: Position,
) -> Option<Swap> {
    let mut worst: Option<(&Candidate, f64)> = None;
    for c in squad.at_position(pos) {
        let adj = policy.adjusted_score(c);
        if worst.map_or(true, |(_, w)| adj < w) {
            worst = Some((c, adj));
        }
    }
    let (worst, worst_adj) = worst?;

    let headroom = constraints.budget - (squad.total_price() - worst.price);

    let mut best: Option<(&Candidate, f64)> = None;
    for c in pool {
        if c.position != pos || squad.contains(c.id) {
            continue;
        }
        if c.price > headroom + BUDGET_TOLERANCE {
            continue;
        }
        if policy.enforce_club_cap {
            let freed = usize::from(worst.club == c.club);
            if squad.count_club(&c.club) - freed + 1 > constraints.max_per_club {
                continue;
            }
        }
        let adj = policy.adjusted_score(c);
        if best.map_or(true, |(_, b)| adj > b) {
            best = Some((c, adj));
        }
    }
    let (best, best_adj) = best?;

    if best_adj > worst_adj * policy.min_improvement {
        Some(Swap {
            position: pos,
            outgoing: worst.clone(),
            incoming: best.clone(),
            outgoing_adjusted: worst_adj,
            incoming_adjusted: best_adj,
        })
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn make(
        id: u32,
        position: Position,
        club: &str,
        price: f64,
        score: f64,
        ownership_pct: f64,
    ) -> Candidate {
        Candidate {
            id,
            name: format!("P{id}"),
            position,
            club: club.into(),
            price,
            score,
            ownership_pct,
        }
    }

    /// 1 GK, 2 DEF, 1 MID, 1 FWD; budget 25; cap 2.
    fn small_constraints() -> ConstraintSet {
        ConstraintSet {
            budget: 25.0,
            squad_size: 5,
            position_quota: BTreeMap::from([
                (Position::Goalkeeper, 1),
                (Position::Defender, 2),
                (Position::Midfielder, 1),
                (Position::Forward, 1),
            ]),
            max_per_club: 2,
        }
    }

    fn base_squad() -> Squad {
        Squad::new(vec![
            make(1, Position::Goalkeeper, "A", 4.0, 20.0, 20.0),
            make(2, Position::Defender, "B", 4.5, 20.0, 20.0),
            make(3, Position::Defender, "C", 4.5, 20.0, 20.0),
            make(4, Position::Midfielder, "D", 6.0, 30.0, 20.0),
            make(5, Position::Forward, "E", 5.0, 30.0, 20.0),
        ])
    }

    #[test]
    fn multiplier_steps() {
        let bands = OwnershipBands::default();
        assert!(approx_eq(bands.multiplier(0.0), 1.15, 1e-12));
        assert!(approx_eq(bands.multiplier(4.9), 1.15, 1e-12));
        assert!(approx_eq(bands.multiplier(5.0), 1.08, 1e-12));
        assert!(approx_eq(bands.multiplier(14.99), 1.08, 1e-12));
        assert!(approx_eq(bands.multiplier(15.0), 1.00, 1e-12));
        assert!(approx_eq(bands.multiplier(29.9), 1.00, 1e-12));
        assert!(approx_eq(bands.multiplier(30.0), 0.95, 1e-12));
        assert!(approx_eq(bands.multiplier(85.0), 0.95, 1e-12));
    }

    #[test]
    fn adjusted_score_uses_floor() {
        let policy = RefinementPolicy::default();
        let c = make(1, Position::Defender, "A", 4.0, 0.0, 2.0);
        assert!(approx_eq(policy.adjusted_score(&c), 0.1 * 1.15, 1e-12));
    }

    #[test]
    fn swaps_weakest_defender_for_differential() {
        // Worst DEF: 21.0526 * 0.95 = 20.0; outsider: 22 * 1.15 = 25.3 > 21.0.
        let mut members = base_squad().into_members();
        members[1] = make(2, Position::Defender, "B", 4.5, 20.0 / 0.95, 40.0);
        members[2] = make(3, Position::Defender, "C", 4.5, 30.0, 20.0);
        let base = Squad::new(members);
        let mut pool = base.members().to_vec();
        pool.push(make(10, Position::Defender, "F", 4.5, 22.0, 3.0));

        let r = refine(&base, &pool, &small_constraints(), &RefinementPolicy::default());
        assert_eq!(r.swap_count(), 1);
        let swap = &r.swaps[0];
        assert_eq!(swap.outgoing.id, 2);
        assert_eq!(swap.incoming.id, 10);
        assert!(approx_eq(swap.outgoing_adjusted, 20.0, 1e-9));
        assert!(approx_eq(swap.incoming_adjusted, 25.3, 1e-9));
        assert!(r.squad.contains(10));
        assert!(r.squad.verify(&small_constraints()).is_ok());
    }

    #[test]
    fn no_qualifying_swap_returns_base() {
        let base = base_squad();
        let mut pool = base.members().to_vec();
        pool.push(make(10, Position::Defender, "F", 4.0, 10.0, 3.0));
        pool.push(make(11, Position::Forward, "G", 4.0, 12.0, 50.0));

        let r = refine(&base, &pool, &small_constraints(), &RefinementPolicy::default());
        assert_eq!(r.swap_count(), 0);
        assert_eq!(r.squad, base);
    }

    #[test]
    fn threshold_is_strict() {
        // Outsider adjusted exactly 1.05x the worst member: no swap.
        let base = base_squad();
        let mut pool = base.members().to_vec();
        pool.push(make(10, Position::Goalkeeper, "F", 4.0, 21.0, 20.0));

        let r = refine(&base, &pool, &small_constraints(), &RefinementPolicy::default());
        assert!(!r.squad.contains(10));
    }

    #[test]
    fn unaffordable_replacement_skipped() {
        // Base costs 24.0, so headroom for the GK slot is 5.0.
        let base = base_squad();
        let mut pool = base.members().to_vec();
        pool.push(make(10, Position::Goalkeeper, "F", 5.5, 90.0, 1.0));
        pool.push(make(11, Position::Goalkeeper, "G", 5.0, 40.0, 1.0));

        let r = refine(&base, &pool, &small_constraints(), &RefinementPolicy::default());
        assert!(!r.squad.contains(10));
        assert!(r.squad.contains(11));
        assert!(r.squad.total_price() <= 25.0 + 1e-9);
    }

    #[test]
    fn club_cap_respected_when_enforced() {
        // Club B already has two members; the only strong outsider is also B.
        let mut members = base_squad().into_members();
        members[0].club = "B".into();
        let base = Squad::new(members);
        let mut pool = base.members().to_vec();
        pool.push(make(10, Position::Forward, "B", 5.0, 80.0, 1.0));

        let r = refine(&base, &pool, &small_constraints(), &RefinementPolicy::default());
        assert!(!r.squad.contains(10));
        assert!(r.squad.verify(&small_constraints()).is_ok());
    }

    #[test]
    fn club_cap_ignored_when_disabled() {
        let mut members = base_squad().into_members();
        members[0].club = "B".into();
        let base = Squad::new(members);
        let mut pool = base.members().to_vec();
        pool.push(make(10, Position::Forward, "B", 5.0, 80.0, 1.0));

        let policy = RefinementPolicy {
            enforce_club_cap: false,
            ..RefinementPolicy::default()
        };
        let r = refine(&base, &pool, &small_constraints(), &policy);
        assert!(r.squad.contains(10));
        assert_eq!(r.squad.count_club("B"), 3);
    }

    #[test]
    fn replacement_from_outgoing_club_allowed_at_cap() {
        let mut members = base_squad().into_members();
        members[0].club = "E".into();
        let base = Squad::new(members);
        let mut pool = base.members().to_vec();
        // Replaces the E forward, so E stays at two.
        pool.push(make(10, Position::Forward, "E", 5.0, 80.0, 1.0));

        let r = refine(&base, &pool, &small_constraints(), &RefinementPolicy::default());
        assert!(r.squad.contains(10));
        assert_eq!(r.squad.count_club("E"), 2);
    }

    #[test]
    fn stops_at_max_swaps() {
        let base = base_squad();
        let mut pool = base.members().to_vec();
        pool.push(make(10, Position::Forward, "F", 5.0, 80.0, 1.0));
        pool.push(make(11, Position::Midfielder, "G", 6.0, 80.0, 1.0));
        pool.push(make(12, Position::Defender, "H", 4.5, 80.0, 1.0));
        pool.push(make(13, Position::Goalkeeper, "I", 4.0, 80.0, 1.0));

        let policy = RefinementPolicy {
            max_swaps: 2,
            ..RefinementPolicy::default()
        };
        let r = refine(&base, &pool, &small_constraints(), &policy);
        assert_eq!(r.swap_count(), 2);
        // Priority order: FWD then MID.
        assert_eq!(r.swaps[0].position, Position::Forward);
        assert_eq!(r.swaps[1].position, Position::Midfielder);
    }

    #[test]
    fn second_pass_picks_up_further_swaps() {
        let base = base_squad();
        let mut pool = base.members().to_vec();
        pool.push(make(10, Position::Defender, "F", 4.5, 40.0, 1.0));
        pool.push(make(11, Position::Defender, "G", 4.5, 40.0, 1.0));

        let r = refine(&base, &pool, &small_constraints(), &RefinementPolicy::default());
        assert_eq!(r.swap_count(), 2);
        assert!(r.squad.contains(10));
        assert!(r.squad.contains(11));
    }

    #[test]
    fn zero_max_swaps_is_noop() {
        let base = base_squad();
        let mut pool = base.members().to_vec();
        pool.push(make(10, Position::Forward, "F", 5.0, 80.0, 1.0));
        let policy = RefinementPolicy {
            max_swaps: 0,
            ..RefinementPolicy::default()
        };
        let r = refine(&base, &pool, &small_constraints(), &policy);
        assert_eq!(r.squad, base);
    }

    #[test]
    fn policy_validation() {
        assert!(RefinementPolicy::default().validate().is_ok());

        let mut p = RefinementPolicy::default();
        p.bands.bands.swap(0, 1);
        assert_eq!(p.validate(), Err(PolicyError::UnorderedBands));

        let mut p = RefinementPolicy::default();
        p.bands.above_multiplier = 0.0;
        assert_eq!(p.validate(), Err(PolicyError::InvalidMultiplier(0.0)));

        let mut p = RefinementPolicy::default();
        p.min_improvement = 0.9;
        assert_eq!(p.validate(), Err(PolicyError::InvalidImprovement(0.9)));

        let mut p = RefinementPolicy::default();
        p.position_priority.push(Position::Forward);
        assert_eq!(
            p.validate(),
            Err(PolicyError::RepeatedPosition(Position::Forward))
        );
    }
}
