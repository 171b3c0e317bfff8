//! `nebula4x_core` — deterministic simulation tick for a tick-driven 4X space sim.
//!
//! No IO, no network, no wall-clock or OS entropy. All randomness flows through
//! [`rng::HashRng`], seeded from [`types::State::seed`] and derived per call site
//! via a purpose tag so that two runs from the same seed and the same order
//! stream produce byte-identical state.

pub mod ai;
pub mod combat;
pub mod contracts;
pub mod design;
pub mod diplomacy;
pub mod economy;
pub mod errors;
pub mod heat;
pub mod id;
pub mod navigation;
pub mod orbit;
pub mod order_exec;
pub mod orders;
pub mod procgen;
pub mod rng;
pub mod scheduler;
pub mod sensors;
pub mod sorted;
pub mod spatial;
pub mod terraform;
#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;
pub mod types;

pub use errors::{ContentError, RuntimeAnomaly, ValidationError};
pub use id::{Id, IdAllocator};
pub use scheduler::{AdvanceResult, EventStopCondition};
pub use types::*;
