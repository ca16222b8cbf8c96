//! `--chimera`: splice the cut log against the baseline, then sweep the result.

use std::{path::PathBuf, time::Instant};

use tracing::info;

use crate::{
    cache::FileCache,
    chimera::Splice,
    config::{ChimeraConfig, Config},
    cutoff::Cutoff,
    discover,
    error::Result,
};

use super::sweep::{FnovTables, Sweep};

pub const SUMMARY_FILE: &str = "fnovs_vector_chimera.json";

/// A validated `--chimera` run.
#[derive(Debug)]
pub struct Job<'a> {
    pub splice: &'a ChimeraConfig,
    pub cutoff: Cutoff,
    /// The one baseline log in `splice.baseline_dir`.
    pub baseline: PathBuf,
}

impl<'a> Job<'a> {
    /// Resolves the baseline to splice against, failing unless exactly one
    /// log in the baseline folder ends with `suffix`.
    pub fn new(splice: &'a ChimeraConfig, cutoff: Cutoff, suffix: &str) -> Result<Self> {
        let baseline = discover::unique_log(&splice.baseline_dir, suffix)?;
        info!(baseline = %baseline.display(), "found baseline");
        Ok(Self {
            splice,
            cutoff,
            baseline,
        })
    }
}

pub fn run(config: &Config, job: &Job<'_>) -> Result<FnovTables> {
    let started = Instant::now();
    let splice = Splice {
        cut_log: &job.splice.cut_log,
        baseline: &job.baseline,
        cutoff: &job.cutoff,
    };
    let cache = FileCache::new(config.outdir.join("chimera"));
    let lookup = splice.probe(&cache);
    info!(
        path = %lookup.path().display(),
        exists = lookup.exists(),
        "chimera artifact"
    );
    let artifact = splice.generate(&cache)?;
    info!(path = %artifact.display(), elapsed = ?started.elapsed(), "chimera ready");

    let sweep = Sweep::new(config, config.outdir.join("fnovs_chimera"));
    let mut tables = FnovTables::default();
    sweep.log(&mut tables, &artifact, &discover::db_tag(&artifact, ".db"))?;
    tables.write(&config.outdir.join(SUMMARY_FILE))?;

    info!(elapsed = ?started.elapsed(), "chimera sweep finished");
    Ok(tables)
}
