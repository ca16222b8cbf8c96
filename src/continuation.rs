//! Stateful continuation: keep a log's history, resimulate its future.
//!
//! The history up to the cutoff is replayed into a fresh scheduler and
//! observatory so they reflect the state as of the last kept visit. The
//! restored simulation then runs for whatever remains of the requested
//! survey length, and history plus new tail become one log.

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use tracing::{debug, info};

use crate::{
    artifact::ArtifactDescriptor,
    cache::{FileCache, Lookup},
    config::{ConfigError, ContinuationConfig},
    convert::SchemaConverter,
    cutoff::Cutoff,
    error::{Error, Result},
    model::columns,
    sim::{BandPolicy, RunPlan, SchedulerParams, Simulator},
    store::{self, Query},
};

/// Nights left to simulate once history covering up to `max_night` is kept.
///
/// Night indices are taken to start at 1, so an empty history leaves
/// `survey_length + 1`.
pub fn remaining_nights(survey_length: i64, max_night: Option<i64>) -> i64 {
    survey_length - max_night.unwrap_or(0) + 1
}

/// A continuation request.
#[derive(Debug, Clone, Copy)]
pub struct Continuation<'a> {
    pub config: &'a ContinuationConfig,
    pub cutoff: &'a Cutoff,
}

impl Continuation<'_> {
    pub fn descriptor(&self) -> ArtifactDescriptor {
        ArtifactDescriptor::bespoke(&self.config.cut_log, &self.config.policy, self.cutoff)
    }

    /// Reports whether the continuation exists, never generating it.
    pub fn probe(&self, cache: &FileCache) -> Lookup {
        let descriptor = self.descriptor();
        let lookup = cache.probe(&descriptor);
        info!(
            kind = %descriptor.kind(),
            path = %lookup.path().display(),
            exists = lookup.exists(),
            "probed continuation"
        );
        lookup
    }

    /// Returns the continuation in `cache`, generating it if absent.
    ///
    /// With `exists_only` this is [`Continuation::probe`]: a missing
    /// artifact is reported as [`Lookup::Missing`] and nothing runs.
    pub fn generate<S, C>(
        &self,
        cache: &FileCache,
        simulator: &mut S,
        converter: &C,
        exists_only: bool,
    ) -> Result<Lookup>
    where
        S: Simulator,
        C: SchemaConverter,
    {
        if exists_only {
            return Ok(self.probe(cache));
        }
        let path: PathBuf = cache.get_or_compute(&self.descriptor(), |tmp| {
            self.write_to(tmp, simulator, converter).map(|_| ())
        })?;
        Ok(Lookup::Present(path))
    }

    /// Runs the continuation into `out` and returns the number of rows written.
    pub fn write_to<S, C>(&self, out: &Path, simulator: &mut S, converter: &C) -> Result<usize>
    where
        S: Simulator,
        C: SchemaConverter,
    {
        let config = self.config;
        let mut history = store::read(&config.cut_log, &Query::past(self.cutoff.mjd()))?;

        let max_night = history.max_i64(columns::NIGHT).map_err(store::StoreError::from)?;
        let as_of = history.max_i64(columns::ID).map_err(store::StoreError::from)?;
        let first_mjd = history
            .min_f64(columns::START_MJD)
            .map_err(store::StoreError::from)?;

        let nights = remaining_nights(config.survey_length, max_night);
        if nights <= 0 {
            return Err(ConfigError::HistoryExhausted {
                survey_length: config.survey_length,
                max_night: max_night.unwrap_or(0),
            }
            .into());
        }
        if history.is_empty() {
            info!("no visits before the cutoff, simulating from the start");
        }
        debug!(history = history.len(), ?max_night, ?as_of, "selected history");

        let shims: Vec<&str> = converter
            .shim_columns()
            .iter()
            .copied()
            .filter(|c| history.add_column(c, &Value::Integer(0)))
            .collect();
        let replay = converter
            .to_sim(&history)
            .map_err(store::StoreError::from)?;

        let params = SchedulerParams {
            survey_length: nights,
            setup_only: true,
            verbose: true,
            policy: config.policy_params.clone(),
        };
        let bands = BandPolicy::Simple {
            illum_limit: config.illum_limit,
        };
        let mjd_start = first_mjd
            .or(config.mjd_start)
            .unwrap_or(self.cutoff.mjd());
        info!(nights, mjd_start, "working on simulating {nights} nights");

        let scheduler = simulator
            .scheduler(&config.policy, &params)
            .map_err(Error::Collaborator)?;
        let observatory = simulator
            .observatory(&scheduler, mjd_start)
            .map_err(Error::Collaborator)?;
        let (scheduler, observatory) = simulator
            .restore(scheduler, observatory, &replay, as_of, &bands)
            .map_err(Error::Collaborator)?;
        let plan = RunPlan {
            duration_nights: nights,
            delete_past: true,
            visit_limit: None,
        };
        let tail = simulator
            .resimulate(scheduler, observatory, &plan, &bands)
            .map_err(Error::Collaborator)?;
        debug!(new_visits = tail.len(), "resimulation finished");

        history.drop_columns(&shims);
        let merged = history.concat(converter.to_storage(&tail));
        store::write(out, &merged)?;
        Ok(merged.len())
    }
}
