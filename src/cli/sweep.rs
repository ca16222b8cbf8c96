//! The per-log metric sweep shared by every run mode.
//!
//! One log yields an all-bands vector plus one vector per band, always
//! leaving out deep-drilling visits. Vectors are cached under the sweep's
//! directory and collected into [`FnovTables`].

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    cache::FileCache,
    config::Config,
    error::Result,
    metric::{Fonv, MetricRequest, fonv_over_time},
    store::Query,
};

/// Bands swept individually, in output order.
pub const BANDS: [&str; 6] = ["u", "g", "r", "i", "z", "y"];

/// Scheduler-note fragment marking deep-drilling visits.
pub(crate) const DEEP_DRILLING: &str = "DD";

/// Collected vectors, keyed by log tag.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnovTables {
    pub fnovs_time_all: BTreeMap<String, Vec<f64>>,
    pub fnovs_time_per_filter: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
}

impl FnovTables {
    /// Writes the tables as pretty JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        info!(path = %path.display(), "saved vector tables");
        Ok(())
    }
}

pub struct Sweep {
    cache: FileCache,
    nside: u32,
    time_points: Vec<f64>,
    fonv: Fonv,
}

impl Sweep {
    /// A sweep writing its cached vectors under `dir`.
    pub fn new(config: &Config, dir: impl Into<PathBuf>) -> Self {
        Self {
            cache: FileCache::new(dir),
            nside: config.nside,
            time_points: config.time_points(),
            fonv: Fonv {
                sky_area: config.sky_area,
                statistic: config.statistic,
            },
        }
    }

    /// Runs the metric over `log` and records the vectors under `db_tag`.
    pub fn log(&self, tables: &mut FnovTables, log: &Path, db_tag: &str) -> Result<()> {
        info!(log = %log.display(), "working with {db_tag}");

        let all = self.vector(log, &Query::all(), &format!("{db_tag}_allfilts"))?;
        tables.fnovs_time_all.insert(db_tag.to_string(), all);

        for band in BANDS {
            let query = Query::all().in_band(band);
            let values = self.vector(log, &query, &format!("{db_tag}_{band}"))?;
            tables
                .fnovs_time_per_filter
                .entry(band.to_string())
                .or_default()
                .insert(db_tag.to_string(), values);
        }
        Ok(())
    }

    fn vector(&self, log: &Path, query: &Query, tag: &str) -> Result<Vec<f64>> {
        let query = query.clone().excluding_note(DEEP_DRILLING);
        let request = MetricRequest {
            log,
            query: &query,
            nside: self.nside,
            time_points: &self.time_points,
            tag: Some(tag),
            save: true,
        };
        fonv_over_time(&self.cache, &request, &self.fonv)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use rusqlite::types::Value;
    use tempfile::TempDir;

    use crate::{
        model::{Frame, columns},
        sky::Healpix,
        store,
    };

    /// A config over `root` at nside 1 with time points 5, 15, 25.
    pub(crate) fn sample_config(root: &Path, tables: &str) -> Config {
        let text = format!(
            r#"
basepath = "{root}/sims"
outdir = "{root}/out"
nside = 1
tag_to_look_for = "10yrs.db"
timepts = [5.0, 30.0, 10.0]
{tables}
"#,
            root = root.display()
        );
        let config: Config = toml::from_str(&text).unwrap();
        config.validate().unwrap();
        config
    }

    /// Writes a log with one `band` visit per nside = 1 cell center at each
    /// of `mjds`, plus a deep-drilling visit on cell 0 at each time.
    pub(crate) fn write_sky_log(path: &Path, band: &str, mjds: &[f64]) {
        let sky = Healpix::new(1).unwrap();
        let mut frame = Frame::new(
            [
                columns::ID,
                columns::START_MJD,
                columns::NIGHT,
                columns::BAND,
                columns::EXPOSURE,
                columns::RA,
                columns::DEC,
                columns::SCHEDULER_NOTE,
            ]
            .iter()
            .map(|c| (*c).to_string())
            .collect(),
        );
        let mut id = 0;
        for &mjd in mjds {
            let (dd_ra, dd_dec) = sky.center(0);
            let cells = (0..sky.npix()).map(|p| (sky.center(p), "greedy"));
            for ((ra, dec), note) in cells.chain([((dd_ra, dd_dec), "DD:ECDFS")]) {
                id += 1;
                #[allow(clippy::cast_possible_truncation)]
                let night = mjd.floor() as i64;
                frame.push_row(vec![
                    Value::Integer(id),
                    Value::Real(mjd),
                    Value::Integer(night),
                    Value::Text(band.into()),
                    Value::Real(30.0),
                    Value::Real(ra),
                    Value::Real(dec),
                    Value::Text(note.into()),
                ]);
            }
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        store::write(path, &frame).unwrap();
    }

    #[test]
    fn sweeps_all_bands_and_each_band() {
        let dir = TempDir::new().unwrap();
        let config = sample_config(dir.path(), "");
        let log = dir.path().join("a_10yrs.db");
        write_sky_log(&log, "g", &[10.0, 20.0]);

        let sweep = Sweep::new(&config, dir.path().join("fnovs"));
        let mut tables = FnovTables::default();
        sweep.log(&mut tables, &log, "a_").unwrap();

        assert_eq!(tables.fnovs_time_all["a_"], vec![0.0, 1.0, 2.0]);
        assert_eq!(tables.fnovs_time_per_filter["g"]["a_"], vec![0.0, 1.0, 2.0]);
        assert_eq!(tables.fnovs_time_per_filter["r"]["a_"], vec![0.0, 0.0, 0.0]);
        assert_eq!(tables.fnovs_time_per_filter.len(), BANDS.len());
        assert!(dir.path().join("fnovs/fonv_a__allfilts_nside1.json.zst").is_file());
        assert!(dir.path().join("fnovs/fonv_a__y_nside1.json.zst").is_file());
    }

    #[test]
    fn tables_serialize_with_their_field_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/fnovs_vector_base.json");
        let mut tables = FnovTables::default();
        tables.fnovs_time_all.insert("a_".into(), vec![1.0]);
        tables.write(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["fnovs_time_all"]["a_"], serde_json::json!([1.0]));
        assert!(json["fnovs_time_per_filter"].as_object().unwrap().is_empty());
    }
}
