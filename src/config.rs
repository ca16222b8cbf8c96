//! Driver configuration.
//!
//! Loaded from the TOML file given by `--config`, or from
//! `<config dir>/survey-splice/config.toml`. Unknown keys are rejected at
//! every level; scheduler parameters specific to a policy go under
//! `[continuation.policy_params]`, which is passed through verbatim.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::metric::Statistic;

/// Errors in configuration or in the requested combination of run modes.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine the configuration directory; pass --config")]
    NoConfigDir,

    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("--{mode} requires a [{section}] table in the config")]
    MissingSection {
        mode: &'static str,
        section: &'static str,
    },

    #[error("an output tag is required when saving metric data")]
    MissingOutputTag,

    #[error(
        "--bespoke-metrics reads pre-generated continuations; \
         confirm they exist with --pregenerated or pass --bespoke-generate"
    )]
    UnconfirmedPregeneration,

    #[error("continuation has not been generated yet: {}", .0.display())]
    NotGenerated(PathBuf),

    #[error(
        "history already reaches night {max_night}, leaving no nights of the \
         requested {survey_length}-night survey to simulate"
    )]
    HistoryExhausted { survey_length: i64, max_night: i64 },
}

pub type Result<T> = core::result::Result<T, ConfigError>;

/// Full-sky area the metric must cover by default, in square degrees.
pub const DEFAULT_SKY_AREA: f64 = 18_000.0;

/// Default lunar illumination limit for band swaps.
pub const DEFAULT_ILLUM_LIMIT: f64 = 40.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding the `baseline/` and `weather/` simulation folders.
    pub basepath: PathBuf,

    /// Where artifacts and metric outputs are written.
    pub outdir: PathBuf,

    /// `HEALPix` resolution of the metric.
    pub nside: u32,

    /// File-name suffix identifying the logs to process, e.g. `10yrs.db`.
    pub tag_to_look_for: String,

    /// Metric time points, in nights, as `[start, stop, step]`; `stop` is
    /// exclusive.
    pub timepts: [f64; 3],

    #[serde(default = "default_sky_area")]
    pub sky_area: f64,

    #[serde(default)]
    pub statistic: Statistic,

    pub cutoff: Option<CutoffConfig>,

    pub chimera: Option<ChimeraConfig>,

    pub continuation: Option<ContinuationConfig>,

    pub simulator: Option<SimulatorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CutoffConfig {
    pub date: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChimeraConfig {
    /// Log whose history is kept.
    pub cut_log: PathBuf,
    /// Directory that must contain exactly one log matching `tag_to_look_for`.
    pub baseline_dir: PathBuf,
}

/// Scheduler-construction parameters for a continuation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContinuationConfig {
    /// Policy source the scheduler is built from.
    pub policy: PathBuf,

    /// Log whose history is kept.
    pub cut_log: PathBuf,

    /// Total survey length in nights, history included.
    pub survey_length: i64,

    #[serde(default = "default_illum_limit")]
    pub illum_limit: f64,

    /// Observatory start when the history is empty; defaults to the cutoff.
    pub mjd_start: Option<f64>,

    #[serde(default)]
    pub policy_params: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Program and arguments implementing the simulator protocol.
    pub command: Vec<String>,
}

fn default_sky_area() -> f64 {
    DEFAULT_SKY_AREA
}

fn default_illum_limit() -> f64 {
    DEFAULT_ILLUM_LIMIT
}

impl Config {
    /// Loads and validates the config at `path`, or at [`Config::default_path`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path().ok_or(ConfigError::NoConfigDir)?,
        };
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Self =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?;
        config.validate()?;
        Ok(config)
    }

    /// The default config path: `<config dir>/survey-splice/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("survey-splice").join("config.toml"))
    }

    /// Checks values that deserialization alone cannot.
    pub fn validate(&self) -> Result<()> {
        if self.nside == 0 || !self.nside.is_power_of_two() {
            return Err(invalid(format!(
                "nside must be a positive power of two, got {}",
                self.nside
            )));
        }
        let [start, stop, step] = self.timepts;
        if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
            return Err(invalid("timepts must be finite".into()));
        }
        if step <= 0.0 || start >= stop {
            return Err(invalid(format!(
                "timepts must satisfy start < stop and step > 0, got {:?}",
                self.timepts
            )));
        }
        if !(self.sky_area.is_finite() && self.sky_area > 0.0) {
            return Err(invalid(format!(
                "sky_area must be positive, got {}",
                self.sky_area
            )));
        }
        if self.tag_to_look_for.is_empty() {
            return Err(invalid("tag_to_look_for is empty".into()));
        }
        if let Some(c) = &self.continuation {
            if c.survey_length <= 0 {
                return Err(invalid(format!(
                    "continuation.survey_length must be positive, got {}",
                    c.survey_length
                )));
            }
            if !c.illum_limit.is_finite() {
                return Err(invalid("continuation.illum_limit must be finite".into()));
            }
        }
        if let Some(s) = &self.simulator
            && s.command.is_empty()
        {
            return Err(invalid("simulator.command is empty".into()));
        }
        Ok(())
    }

    /// Expands `timepts` into `start, start + step, ...` strictly below `stop`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn time_points(&self) -> Vec<f64> {
        let [start, stop, step] = self.timepts;
        let count = ((stop - start) / step).ceil().max(0.0) as usize;
        (0..count).map(|k| start + k as f64 * step).collect()
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}
