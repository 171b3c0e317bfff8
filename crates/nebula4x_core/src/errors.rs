//! Error taxonomy (component: validation vs. runtime-anomaly vs. content-reload).
//!
//! Validation errors never mutate state; they are surfaced to the caller as `Err`
//! and, where the call originates from inside a tick, also as a `Warn` event.
//! Runtime anomalies are logged and the offending data is dropped; the tick itself
//! never aborts. This module only defines the taxonomy — recovery lives at the
//! call sites in `orders`, `navigation`, `economy`, and `engine`.

use crate::id::Id;
use thiserror::Error;

/// An order, template application, or diplomacy call was rejected. The caller sees
/// `false`/`Err` and no state mutation occurs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown entity id {0}")]
    UnknownEntity(Id),
    #[error("ship {ship} is not owned by faction {faction}")]
    OwnershipMismatch { ship: Id, faction: Id },
    #[error("no route exists from system {from} to system {to}")]
    NoRoute { from: Id, to: Id },
    #[error("treaty between factions {a} and {b} forbids this action")]
    TreatyViolation { a: Id, b: Id },
    #[error("ship {0} already belongs to a fleet")]
    AlreadyInFleet(Id),
    #[error("queue index {index} out of range (len {len})")]
    QueueIndexOutOfRange { index: usize, len: usize },
    #[error("order template '{0}' not found")]
    UnknownTemplate(String),
    #[error("contract {0} is not in an acceptable state for this operation")]
    InvalidContractState(Id),
    #[error("installation {0} is not buildable by this faction")]
    InstallationNotBuildable(Id),
}

/// Content validation failure surfaced through `ReloadResult`. State is left
/// untouched whenever one of these is produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("content references unknown id {referent} from {from}")]
    DanglingReference { from: String, referent: String },
    #[error("negative cost in {0}")]
    NegativeCost(String),
    #[error("duplicate definition id {0}")]
    DuplicateId(String),
}

/// Should-not-happen conditions encountered mid-tick in an otherwise well-formed
/// world (e.g. a build-queue entry referencing a design removed by a reload).
/// These are logged as `Error`-level [`crate::types::SimEvent`]s and the offending
/// entry is dropped; they never panic the tick.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeAnomaly {
    #[error("unknown ship design {0} referenced in build queue")]
    UnknownDesignInQueue(Id),
    #[error("refit target ship {0} no longer exists")]
    OrphanedRefitTarget(Id),
    #[error("body {0} has no resolvable parent")]
    MissingParentBody(Id),
    #[error("fleet {0} has no valid leader candidate")]
    FleetWithoutLeader(Id),
}

/// Clamps a computed multiplier to the identity (`1.0`) if it is NaN or infinite.
#[must_use]
pub fn clamp_multiplier(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        1.0
    }
}

/// Clamps a computed accumulator to `0.0` if it is NaN or infinite.
#[must_use]
pub fn clamp_accumulator(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
