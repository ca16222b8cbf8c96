//! `--fnov-base`: the metric over every baseline and weather simulation.

use std::time::Instant;

use tracing::{info, warn};

use crate::{config::Config, discover, error::Result};

use super::sweep::{FnovTables, Sweep};

/// Simulation folders under `basepath`, in sweep order.
const FOLDERS: [&str; 2] = ["baseline", "weather"];

pub const SUMMARY_FILE: &str = "fnovs_vector_base.json";

pub fn run(config: &Config) -> Result<FnovTables> {
    let started = Instant::now();
    info!("running vector metric for baseline sims");

    let sweep = Sweep::new(config, config.outdir.join("fnovs_base"));
    let mut tables = FnovTables::default();

    for folder in FOLDERS {
        let dir = config.basepath.join(folder);
        let logs = discover::logs_with_suffix(&dir, &config.tag_to_look_for)?;
        if logs.is_empty() {
            warn!(dir = %dir.display(), "no logs ending in {}", config.tag_to_look_for);
        }
        for log in logs {
            let tag = discover::db_tag(&log, &config.tag_to_look_for);
            sweep.log(&mut tables, &log, &tag)?;
        }
    }

    tables.write(&config.outdir.join(SUMMARY_FILE))?;
    info!(elapsed = ?started.elapsed(), "baseline sweep finished");
    Ok(tables)
}
