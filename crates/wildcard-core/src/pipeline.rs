// End-to-end optimization: viability check, ILP solve, refinement.

use thiserror::Error;
use tracing::{info, warn};

use crate::candidate::Candidate;
use crate::constraints::ConstraintSet;
use crate::refinement::{refine, RefinementPolicy, Swap};
use crate::selector::{IlpSelector, SelectionError, SquadSelector};
use crate::squad::Squad;
use crate::viability::{check_viability, ViabilityError, ViabilityReport};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error("viability check failed: {0}")]
    Viability(#[from] ViabilityError),

    #[error("squad selection failed: {0}")]
    Selection(#[from] SelectionError),
}

/// Everything a reporter needs about a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationOutcome {
    /// Final squad (after refinement, if enabled).
    pub squad: Squad,
    /// Objective of the optimal squad before refinement.
    pub base_objective: f64,
    /// Summed effective score of the final squad.
    pub objective: f64,
    pub swaps: Vec<Swap>,
    /// Why the ownership limits were dropped, when the fallback solve ran.
    pub fallback: Option<String>,
    pub viability: ViabilityReport,
}

/// The check, solve, refine pipeline. Generic over the selector so any
/// exact solver can stand in for the default ILP.
#[derive(Debug, Clone, Default)]
pub struct Optimizer<S = IlpSelector> {
    pub constraints: ConstraintSet,
    pub selector: S,
    /// `None` skips the refinement stage.
    pub refinement: Option<RefinementPolicy>,
}

impl Optimizer {
    pub fn new(constraints: ConstraintSet) -> Self {
        Optimizer {
            constraints,
            selector: IlpSelector::default(),
            refinement: None,
        }
    }
}

impl<S: SquadSelector> Optimizer<S> {
    pub fn with_selector<T: SquadSelector>(self, selector: T) -> Optimizer<T> {
        Optimizer {
            constraints: self.constraints,
            selector,
            refinement: self.refinement,
        }
    }

    pub fn with_refinement(mut self, policy: RefinementPolicy) -> Self {
        self.refinement = Some(policy);
        self
    }

    /// Run the full pipeline over `candidates`.
    ///
    /// The selector is only consulted once the pool is known to be viable.
    /// If the solve fails and the selector offers a fallback (the ILP does
    /// when ownership limits are configured), it is retried once with it
    /// and the reason is kept in [`OptimizationOutcome::fallback`]. No other
    /// recovery is attempted.
    pub fn run(&self, candidates: &[Candidate]) -> Result<OptimizationOutcome, OptimizeError> {
        let viability = check_viability(candidates, &self.constraints)?;
        info!(
            "Pool of {} candidates is viable (cheapest legal squad {:.1} of {:.1})",
            candidates.len(),
            viability.minimum_cost,
            self.constraints.budget
        );

        let (selection, fallback) = match self.selector.solve(candidates, &self.constraints) {
            Ok(selection) => (selection, None),
            Err(e) => match self.selector.fallback() {
                Some(relaxed) => {
                    warn!("Solve failed ({e}); retrying with the fallback selector");
                    let selection = relaxed.solve(candidates, &self.constraints)?;
                    (selection, Some(e.to_string()))
                }
                None => return Err(e.into()),
            },
        };
        let base_objective = selection.objective;

        let (squad, swaps) = match &self.refinement {
            Some(policy) => {
                let refined = refine(&selection.squad, candidates, &self.constraints, policy);
                (refined.squad, refined.swaps)
            }
            None => (selection.squad, Vec::new()),
        };

        let objective = squad.total_score();
        Ok(OptimizationOutcome {
            squad,
            base_objective,
            objective,
            swaps,
            fallback,
            viability,
        })
    }
}
