//! Command-line driver.
//!
//! Flags pick which runs to perform; a single invocation may combine them.
//! Every requested run is checked against the configuration before any of
//! them starts, so a missing table, an unconfirmed pre-generation or an
//! ambiguous baseline fails before anything is written.

mod baseline;
mod bespoke;
mod chimera;
mod sweep;

use std::{path::PathBuf, time::Instant};

use clap::{ArgGroup, Parser};
use tracing::info;

use crate::{
    config::{Config, ConfigError},
    cutoff::Cutoff,
    error::Result,
};

/// Splice and continue survey simulations, and measure them over time.
#[derive(Debug, Parser)]
#[command(
    name = "survey-splice",
    version,
    group(ArgGroup::new("mode").required(true).multiple(true))
)]
pub struct Cli {
    /// Path to the TOML config (default: `<config dir>/survey-splice/config.toml`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run the vector metric over the baseline and weather simulations.
    #[arg(long, group = "mode")]
    pub fnov_base: bool,

    /// Splice the cut log with the baseline and run the metric on the result.
    #[arg(long, group = "mode")]
    pub chimera: bool,

    /// Generate the continuation of the cut log if it does not exist.
    #[arg(long, group = "mode")]
    pub bespoke_generate: bool,

    /// Run the metric on the continuation.
    ///
    /// Needs either `--bespoke-generate` or `--pregenerated`.
    #[arg(long, group = "mode")]
    pub bespoke_metrics: bool,

    /// Confirm the continuation was generated by an earlier run.
    #[arg(long, requires = "bespoke_metrics")]
    pub pregenerated: bool,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    pub verbose: bool,
}

/// The runs of one invocation, checked against the config.
#[derive(Debug)]
struct Plan<'a> {
    baseline: bool,
    chimera: Option<chimera::Job<'a>>,
    bespoke: Option<bespoke::Job<'a>>,
}

impl<'a> Plan<'a> {
    fn new(cli: &Cli, config: &'a Config) -> Result<Self> {
        if cli.bespoke_metrics && !cli.bespoke_generate && !cli.pregenerated {
            return Err(ConfigError::UnconfirmedPregeneration.into());
        }

        let chimera = if cli.chimera {
            let splice = section(config.chimera.as_ref(), "chimera", "chimera")?;
            let cutoff = cutoff(config, "chimera")?;
            Some(chimera::Job::new(splice, cutoff, &config.tag_to_look_for)?)
        } else {
            None
        };

        let bespoke = if cli.bespoke_generate || cli.bespoke_metrics {
            let mode = if cli.bespoke_generate {
                "bespoke-generate"
            } else {
                "bespoke-metrics"
            };
            let simulator = if cli.bespoke_generate {
                Some(section(config.simulator.as_ref(), mode, "simulator")?)
            } else {
                None
            };
            Some(bespoke::Job {
                continuation: section(config.continuation.as_ref(), mode, "continuation")?,
                cutoff: cutoff(config, mode)?,
                simulator,
                metrics: cli.bespoke_metrics,
            })
        } else {
            None
        };

        Ok(Self {
            baseline: cli.fnov_base,
            chimera,
            bespoke,
        })
    }
}

fn section<'a, T>(
    table: Option<&'a T>,
    mode: &'static str,
    section: &'static str,
) -> core::result::Result<&'a T, ConfigError> {
    table.ok_or(ConfigError::MissingSection { mode, section })
}

fn cutoff(config: &Config, mode: &'static str) -> Result<Cutoff> {
    let c = section(config.cutoff.as_ref(), mode, "cutoff")?;
    let cutoff = Cutoff::resolve(&c.date, &c.format)?;
    info!(
        mode,
        date = cutoff.date(),
        format = %cutoff.format(),
        mjd = cutoff.mjd(),
        "resolved cutoff"
    );
    Ok(cutoff)
}

/// Runs every run `cli` asks for, in a fixed order.
pub fn run(cli: &Cli) -> Result<()> {
    let started = Instant::now();
    let config = Config::load(cli.config.as_deref())?;
    let plan = Plan::new(cli, &config)?;

    if plan.baseline {
        baseline::run(&config)?;
    }
    if let Some(job) = &plan.chimera {
        chimera::run(&config, job)?;
    }
    if let Some(job) = &plan.bespoke {
        bespoke::run(&config, job)?;
    }

    info!(elapsed = ?started.elapsed(), "overall time taken");
    Ok(())
}
