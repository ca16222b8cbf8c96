//! `--bespoke-generate` and `--bespoke-metrics`: continuations of the cut log.

use std::{path::PathBuf, time::Instant};

use tracing::info;

use crate::{
    cache::{FileCache, Lookup},
    config::{Config, ConfigError, ContinuationConfig, SimulatorConfig},
    continuation::Continuation,
    convert::OpsimSchema,
    cutoff::Cutoff,
    discover,
    error::{Error, Result},
    sim::ExternalSimulator,
};

use super::sweep::{FnovTables, Sweep};

pub const SUMMARY_FILE: &str = "fnovs_vector_bespoke.json";

/// A validated continuation run.
#[derive(Debug)]
pub struct Job<'a> {
    pub continuation: &'a ContinuationConfig,
    pub cutoff: Cutoff,
    /// Present when the continuation should be generated if missing.
    pub simulator: Option<&'a SimulatorConfig>,
    pub metrics: bool,
}

/// Generates or locates the continuation, then sweeps it if asked.
/// Returns the artifact path and, with metrics, the collected tables.
pub fn run(config: &Config, job: &Job<'_>) -> Result<(PathBuf, Option<FnovTables>)> {
    let started = Instant::now();
    let request = Continuation {
        config: job.continuation,
        cutoff: &job.cutoff,
    };
    let cache = FileCache::new(config.outdir.join("bespoke"));

    let lookup = match job.simulator {
        Some(simulator) => {
            let mut sim = ExternalSimulator::new(&simulator.command)
                .map_err(|e| Error::Collaborator(e.into()))?;
            request.generate(&cache, &mut sim, &OpsimSchema, false)?
        }
        None => request.probe(&cache),
    };
    let artifact = match lookup {
        Lookup::Present(path) => path,
        Lookup::Missing(path) => return Err(ConfigError::NotGenerated(path).into()),
    };
    info!(path = %artifact.display(), elapsed = ?started.elapsed(), "continuation ready");

    if !job.metrics {
        return Ok((artifact, None));
    }
    let sweep = Sweep::new(config, config.outdir.join("fnovs_bespoke"));
    let mut tables = FnovTables::default();
    sweep.log(&mut tables, &artifact, &discover::db_tag(&artifact, ".db"))?;
    tables.write(&config.outdir.join(SUMMARY_FILE))?;

    info!(elapsed = ?started.elapsed(), "bespoke sweep finished");
    Ok((artifact, Some(tables)))
}
