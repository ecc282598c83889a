// Library root: the squad optimizer core. No I/O; candidates come in,
// a verified squad comes out.

pub mod candidate;
pub mod constraints;
pub mod pipeline;
pub mod refinement;
pub mod selector;
pub mod squad;
pub mod viability;

pub use candidate::{Candidate, Position, SCORE_FLOOR};
pub use constraints::{ConstraintError, ConstraintSet};
pub use pipeline::{OptimizationOutcome, OptimizeError, Optimizer};
pub use refinement::{refine, OwnershipBands, Refinement, RefinementPolicy, Swap};
pub use selector::{IlpSelector, OwnershipLimits, Selection, SelectionError, SquadSelector};
pub use squad::{Squad, SquadViolation};
pub use viability::{check_viability, ViabilityError, ViabilityReport};
