//! The scheduling/observatory collaborator behind the continuation engine.
//!
//! The scheduling policy and the physical observatory model live outside
//! this crate. The engine only needs to build fresh instances, restore them
//! to the state as of the last historical visit, and run them forward.

mod external;

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

pub use external::{ExternalError, ExternalSimulator};

/// One visit in the collaborator's representation.
///
/// Angles are radians. Fields the collaborator carries beyond these ride
/// along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimObservation {
    pub id: i64,
    pub mjd: f64,
    pub night: i64,
    pub band: String,
    pub exptime: f64,
    pub ra: f64,
    pub dec: f64,
    /// Free-text tag the scheduler attaches to a visit, e.g. `DD:ECDFS`.
    #[serde(default)]
    pub scheduler_note: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub cloud_extinction: f64,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Parameters a fresh scheduler is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerParams {
    /// Nights still to simulate.
    pub survey_length: i64,
    /// Build the scheduler without running it.
    pub setup_only: bool,
    pub verbose: bool,
    /// Policy-specific construction parameters, passed through verbatim.
    #[serde(flatten)]
    pub policy: serde_json::Map<String, serde_json::Value>,
}

/// How bands are chosen night to night.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BandPolicy {
    /// Swap bands on lunar illumination.
    Simple { illum_limit: f64 },
}

/// How far and how to run the restored simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunPlan {
    pub duration_nights: i64,
    /// Drop any simulated visits before the restored state.
    pub delete_past: bool,
    /// Cap on new visits; `None` runs for the full duration.
    pub visit_limit: Option<u64>,
}

/// The restore-and-resimulate contract.
///
/// Calls arrive in order: `scheduler`, `observatory`, `restore`,
/// `resimulate`, once each per continuation.
pub trait Simulator {
    type Scheduler;
    type Observatory;

    /// Builds a fresh scheduler from a policy source.
    fn scheduler(
        &mut self,
        policy: &Path,
        params: &SchedulerParams,
    ) -> Result<Self::Scheduler, CollaboratorError>;

    /// Builds a fresh observatory anchored at `mjd_start`.
    fn observatory(
        &mut self,
        scheduler: &Self::Scheduler,
        mjd_start: f64,
    ) -> Result<Self::Observatory, CollaboratorError>;

    /// Replays `history` so both instances reflect the state as of
    /// observation `as_of`. `as_of` is `None` when there is no history.
    fn restore(
        &mut self,
        scheduler: Self::Scheduler,
        observatory: Self::Observatory,
        history: &[SimObservation],
        as_of: Option<i64>,
        bands: &BandPolicy,
    ) -> Result<(Self::Scheduler, Self::Observatory), CollaboratorError>;

    /// Runs the restored instances forward and returns only the new visits.
    fn resimulate(
        &mut self,
        scheduler: Self::Scheduler,
        observatory: Self::Observatory,
        plan: &RunPlan,
        bands: &BandPolicy,
    ) -> Result<Vec<SimObservation>, CollaboratorError>;
}
