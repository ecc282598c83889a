// Squad selection as a 0/1 integer program.
//
// One binary variable per candidate; maximize the summed effective score
// subject to budget, squad size, exact position quotas and the per-club cap.
// Optional ownership limits add the mini-league differential rules.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use good_lp::{
    default_solver, variable, variables, Expression, ResolutionError, Solution, SolverModel,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::candidate::{Candidate, Position};
use crate::constraints::{ConstraintError, ConstraintSet};
use crate::squad::{Squad, SquadViolation};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("invalid constraints: {0}")]
    InvalidConstraints(#[from] ConstraintError),

    #[error("no squad satisfies every constraint")]
    Infeasible,

    #[error("solver reported an unbounded problem")]
    Unbounded,

    #[error("solver error: {0}")]
    Solver(String),
}

impl From<ResolutionError> for SelectionError {
    fn from(e: ResolutionError) -> Self {
        match e {
            ResolutionError::Infeasible => SelectionError::Infeasible,
            ResolutionError::Unbounded => SelectionError::Unbounded,
            other => SelectionError::Solver(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Mini-league differential rules: enough low-owned picks, not too many
/// template picks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OwnershipLimits {
    /// Ownership percentage below which a pick counts as a differential.
    pub differential_threshold: f64,
    /// Minimum number of differential picks.
    pub min_differentials: usize,
    /// Ownership percentage above which a pick counts as template.
    pub template_threshold: f64,
    /// Maximum number of template picks.
    pub max_template: usize,
}

impl Default for OwnershipLimits {
    fn default() -> Self {
        OwnershipLimits {
            differential_threshold: 15.0,
            min_differentials: 4,
            template_threshold: 30.0,
            max_template: 6,
        }
    }
}

impl OwnershipLimits {
    fn is_differential(&self, c: &Candidate) -> bool {
        c.ownership_pct < self.differential_threshold
    }

    fn is_template(&self, c: &Candidate) -> bool {
        c.ownership_pct > self.template_threshold
    }

    /// Check a finished squad against the limits.
    pub fn check(&self, squad: &Squad) -> Result<(), String> {
        let differentials = squad
            .members()
            .iter()
            .filter(|c| self.is_differential(c))
            .count();
        if differentials < self.min_differentials {
            return Err(format!(
                "{differentials} differentials, need at least {}",
                self.min_differentials
            ));
        }
        let template = squad
            .members()
            .iter()
            .filter(|c| self.is_template(c))
            .count();
        if template > self.max_template {
            return Err(format!(
                "{template} template picks, allowed at most {}",
                self.max_template
            ));
        }
        Ok(())
    }
}

/// An optimal squad and the objective value it achieves.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub squad: Squad,
    /// Sum of the members' effective scores.
    pub objective: f64,
}

/// Anything that can turn a candidate pool into an optimal squad.
pub trait SquadSelector {
    fn solve(
        &self,
        candidates: &[Candidate],
        constraints: &ConstraintSet,
    ) -> Result<Selection, SelectionError>;

    /// A looser selector to retry with once after `solve` fails, if any.
    fn fallback(&self) -> Option<Self>
    where
        Self: Sized,
    {
        None
    }
}

/// Exact selector backed by `good_lp`.
///
/// When `timeout` is set, the solve runs on its own thread and is abandoned
/// once the deadline passes. Among equally scored optima the choice is left
/// to the solver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IlpSelector {
    pub timeout: Option<Duration>,
    pub ownership_limits: Option<OwnershipLimits>,
}

impl IlpSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_ownership_limits(mut self, limits: OwnershipLimits) -> Self {
        self.ownership_limits = Some(limits);
        self
    }

    /// The same selector with the ownership limits removed.
    pub fn without_ownership_limits(&self) -> Self {
        IlpSelector {
            timeout: self.timeout,
            ownership_limits: None,
        }
    }

    fn build_job(&self, candidates: &[Candidate], constraints: &ConstraintSet) -> IlpJob {
        let mut by_position: BTreeMap<Position, Vec<usize>> = BTreeMap::new();
        let mut by_club: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, c) in candidates.iter().enumerate() {
            by_position.entry(c.position).or_default().push(i);
            by_club.entry(c.club.as_str()).or_default().push(i);
        }

        let position_groups = Position::ALL
            .iter()
            .map(|pos| {
                let members = by_position.remove(pos).unwrap_or_default();
                (constraints.quota(*pos), members)
            })
            .collect();

        // A club at or under the cap cannot bind.
        let club_groups = by_club
            .into_values()
            .filter(|idxs| idxs.len() > constraints.max_per_club)
            .collect();

        let (differentials, template) = match &self.ownership_limits {
            Some(limits) => {
                let diff: Vec<usize> = candidates
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| limits.is_differential(c))
                    .map(|(i, _)| i)
                    .collect();
                let tmpl: Vec<usize> = candidates
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| limits.is_template(c))
                    .map(|(i, _)| i)
                    .collect();
                (
                    Some((diff, limits.min_differentials)),
                    Some((tmpl, limits.max_template)),
                )
            }
            None => (None, None),
        };

        IlpJob {
            scores: candidates.iter().map(Candidate::effective_score).collect(),
            prices: candidates.iter().map(|c| c.price).collect(),
            budget: constraints.budget,
            squad_size: constraints.squad_size,
            position_groups,
            club_groups,
            max_per_club: constraints.max_per_club,
            differentials,
            template,
        }
    }
}

impl SquadSelector for IlpSelector {
    fn solve(
        &self,
        candidates: &[Candidate],
        constraints: &ConstraintSet,
    ) -> Result<Selection, SelectionError> {
        constraints.validate()?;

        let job = self.build_job(candidates, constraints);
        debug!(
            "ILP: {} candidates, {} binding clubs, ownership limits {}",
            candidates.len(),
            job.club_groups.len(),
            if self.ownership_limits.is_some() { "on" } else { "off" }
        );

        let chosen = match self.timeout {
            Some(timeout) => run_with_timeout(move || job.run(), timeout)?,
            None => job.run()?,
        };

        let squad = Squad::new(chosen.into_iter().map(|i| candidates[i].clone()).collect());
        squad
            .verify(constraints)
            .map_err(|v: SquadViolation| {
                SelectionError::Solver(format!("solver returned an invalid squad: {v}"))
            })?;
        if let Some(limits) = &self.ownership_limits {
            limits.check(&squad).map_err(|msg| {
                SelectionError::Solver(format!("solver ignored ownership limits: {msg}"))
            })?;
        }

        let objective = squad.total_score();
        info!(
            "Selected {} players, cost {:.1}, objective {:.2}",
            squad.len(),
            squad.total_price(),
            objective
        );
        Ok(Selection { squad, objective })
    }

    /// Without ownership limits, when they are set.
    fn fallback(&self) -> Option<Self> {
        self.ownership_limits
            .is_some()
            .then(|| self.without_ownership_limits())
    }
}

// ---------------------------------------------------------------------------
// Solver job
// ---------------------------------------------------------------------------

/// Self-contained problem description, owned so it can move to a worker.
#[derive(Debug)]
struct IlpJob {
    scores: Vec<f64>,
    prices: Vec<f64>,
    budget: f64,
    squad_size: usize,
    /// (quota, candidate indices) per position.
    position_groups: Vec<(usize, Vec<usize>)>,
    /// Candidate indices of clubs that could exceed the cap.
    club_groups: Vec<Vec<usize>>,
    max_per_club: usize,
    /// (indices, minimum picks)
    differentials: Option<(Vec<usize>, usize)>,
    /// (indices, maximum picks)
    template: Option<(Vec<usize>, usize)>,
}

impl IlpJob {
    /// Solve and return the indices of the selected candidates.
    fn run(self) -> Result<Vec<usize>, SelectionError> {
        let n = self.scores.len();
        if n < self.squad_size {
            return Err(SelectionError::Infeasible);
        }
        // Quota with no candidates behind it.
        if self
            .position_groups
            .iter()
            .any(|(quota, idxs)| *quota > idxs.len())
        {
            return Err(SelectionError::Infeasible);
        }

        let mut vars = variables!();
        let xs: Vec<_> = (0..n).map(|_| vars.add(variable().binary())).collect();

        let mut objective = Expression::with_capacity(n);
        for (x, &score) in xs.iter().zip(&self.scores) {
            objective.add_mul(score, *x);
        }

        let mut problem = vars.maximise(objective).using(default_solver);

        let mut cost = Expression::with_capacity(n);
        let mut size = Expression::with_capacity(n);
        for (x, &price) in xs.iter().zip(&self.prices) {
            cost.add_mul(price, *x);
            size.add_mul(1.0, *x);
        }
        problem = problem.with(cost.leq(self.budget));
        problem = problem.with(size.eq(self.squad_size as f64));

        for (quota, idxs) in &self.position_groups {
            if idxs.is_empty() {
                continue;
            }
            problem = problem.with(sum_of(&xs, idxs).eq(*quota as f64));
        }

        for idxs in &self.club_groups {
            problem = problem.with(sum_of(&xs, idxs).leq(self.max_per_club as f64));
        }

        if let Some((idxs, min)) = &self.differentials {
            if idxs.len() < *min {
                return Err(SelectionError::Infeasible);
            }
            if *min > 0 {
                problem = problem.with(sum_of(&xs, idxs).geq(*min as f64));
            }
        }
        if let Some((idxs, max)) = &self.template {
            if idxs.len() > *max {
                problem = problem.with(sum_of(&xs, idxs).leq(*max as f64));
            }
        }

        let solution = problem.solve()?;

        Ok(xs
            .iter()
            .enumerate()
            .filter(|(_, x)| solution.value(**x) > 0.5)
            .map(|(i, _)| i)
            .collect())
    }
}

fn sum_of(xs: &[good_lp::Variable], idxs: &[usize]) -> Expression {
    let mut e = Expression::with_capacity(idxs.len());
    for &i in idxs {
        e.add_mul(1.0, xs[i]);
    }
    e
}

/// Run `solve` on a dedicated thread, giving up after `timeout`. An
/// abandoned solve keeps running until it finishes; its result is dropped.
fn run_with_timeout<F>(solve: F, timeout: Duration) -> Result<Vec<usize>, SelectionError>
where
    F: FnOnce() -> Result<Vec<usize>, SelectionError> + Send + 'static,
{
    let (tx, rx) = channel();
    thread::Builder::new()
        .name("ilp-worker".into())
        .spawn(move || {
            let res = catch_unwind(AssertUnwindSafe(solve))
                .unwrap_or_else(|_| Err(SelectionError::Solver("solver panicked".into())));
            let _ = tx.send(res);
        })
        .map_err(|e| SelectionError::Solver(format!("failed to start solver thread: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(res) => res,
        Err(RecvTimeoutError::Timeout) => Err(SelectionError::Solver(format!(
            "solver timed out after {:.1}s",
            timeout.as_secs_f64()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(SelectionError::Solver(
            "solver thread exited without a result".into(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
