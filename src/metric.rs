//! The FONv-over-time vector metric and its file-backed cache.
//!
//! Cached vectors are zstd-compressed JSON holding one named array,
//! `{"fnovtime": [...]}`, one value per time point.

mod accumulate;
mod fonv;

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    cache::{CacheKey, FileCache, Lookup},
    config::ConfigError,
    error::Result,
    sky::{FIELD_RADIUS_DEG, Healpix, Tessellation},
    store::{self, Query, StoreError},
};

pub use accumulate::{CellCounts, Pointing, accumulate, pointings};
pub use fonv::{Fonv, Statistic, cells_needed};

/// Cache key of one metric vector: `fonv_{tag}_nside{nside}.json.zst`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricKey<'a> {
    pub tag: &'a str,
    pub nside: u32,
}

impl CacheKey for MetricKey<'_> {
    fn file_name(&self) -> String {
        format!("fonv_{}_nside{}.json.zst", self.tag, self.nside)
    }
}

/// One metric evaluation over one log.
#[derive(Debug, Clone)]
pub struct MetricRequest<'a> {
    pub log: &'a Path,
    pub query: &'a Query,
    pub nside: u32,
    pub time_points: &'a [f64],
    /// Names the cached vector. Without a tag nothing is read from or
    /// written to the cache.
    pub tag: Option<&'a str>,
    pub save: bool,
}

#[derive(Serialize, Deserialize)]
struct Cached {
    fnovtime: Vec<f64>,
}

/// Computes the FONv-over-time vector for `request`, reusing a cached
/// vector for its tag and resolution when one exists.
pub fn fonv_over_time(
    cache: &FileCache,
    request: &MetricRequest<'_>,
    fonv: &Fonv,
) -> Result<Vec<f64>> {
    if request.save && request.tag.is_none() {
        return Err(ConfigError::MissingOutputTag.into());
    }
    let key = request.tag.map(|tag| MetricKey {
        tag,
        nside: request.nside,
    });

    if let Some(key) = &key
        && let Lookup::Present(path) = cache.probe(key)
    {
        info!(path = %path.display(), "reading cached metric");
        return load(&path);
    }

    let values = compute(request, fonv)?;

    if request.save
        && let Some(key) = &key
    {
        let path = cache.get_or_compute(key, |tmp| save(tmp, &values))?;
        info!(path = %path.display(), "saved metric");
    }
    Ok(values)
}

fn compute(request: &MetricRequest<'_>, fonv: &Fonv) -> Result<Vec<f64>> {
    let sky = Healpix::new(request.nside)?;
    let frame = store::read(request.log, request.query)?;
    let visits = pointings(&frame).map_err(StoreError::from)?;
    debug!(
        log = %request.log.display(),
        visits = visits.len(),
        nside = sky.nside(),
        cells = sky.cell_count(),
        "accumulating visit counts"
    );
    let counts = accumulate(&sky, &visits, request.time_points, FIELD_RADIUS_DEG);
    Ok(fonv.summarize(&counts, sky.cell_area()))
}

fn load(path: &Path) -> Result<Vec<f64>> {
    let decoder = zstd::stream::read::Decoder::new(File::open(path)?)?;
    let cached: Cached = serde_json::from_reader(decoder)?;
    Ok(cached.fnovtime)
}

fn save(path: &Path, values: &[f64]) -> Result<()> {
    let mut encoder = zstd::stream::write::Encoder::new(BufWriter::new(File::create(path)?), 0)?;
    serde_json::to_writer(
        &mut encoder,
        &Cached {
            fnovtime: values.to_vec(),
        },
    )?;
    encoder.finish()?.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use rusqlite::types::Value;
    use tempfile::TempDir;

    use crate::{
        error::Error,
        model::{Frame, columns},
        sky::FULL_SKY_DEG2,
    };

    fn fonv() -> Fonv {
        Fonv {
            sky_area: 18_000.0,
            statistic: Statistic::Median,
        }
    }

    /// Writes a log of visits at the center of every nside = 1 cell, the
    /// `DD` ones twice, each on `night` of a survey starting at mjd 60000.
    fn write_sky_log(path: &Path, night: i64) {
        let sky = Healpix::new(1).unwrap();
        let mut frame = Frame::new(
            [
                columns::ID,
                columns::START_MJD,
                columns::NIGHT,
                columns::RA,
                columns::DEC,
                columns::BAND,
                columns::SCHEDULER_NOTE,
            ]
            .iter()
            .map(|c| (*c).to_string())
            .collect(),
        );
        #[allow(clippy::cast_precision_loss)]
        let mjd = 60_000.25 + night as f64;
        let mut id = 0;
        for pix in 0..sky.npix() {
            let (ra, dec) = sky.center(pix);
            for note in ["greedy", "DD:COSMOS"] {
                id += 1;
                frame.push_row(vec![
                    Value::Integer(id),
                    Value::Real(mjd),
                    Value::Integer(night),
                    Value::Real(ra),
                    Value::Real(dec),
                    Value::Text(if pix % 2 == 0 { "g" } else { "r" }.into()),
                    Value::Text(note.into()),
                ]);
            }
        }
        store::write(path, &frame).unwrap();
    }

    struct Fixture {
        dir: TempDir,
        log: std::path::PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let log = dir.path().join("sky.db");
            write_sky_log(&log, 10);
            Self { dir, log }
        }

        fn cache(&self) -> FileCache {
            FileCache::new(self.dir.path().join("fnovs"))
        }
    }

    #[test]
    fn key_names_the_cache_file() {
        let key = MetricKey {
            tag: "baseline_v4_allfilts",
            nside: 64,
        };
        assert_eq!(key.file_name(), "fonv_baseline_v4_allfilts_nside64.json.zst");
    }

    #[test]
    fn computes_over_the_selected_visits() {
        let f = Fixture::new();
        let query = Query::all().excluding_note("DD");
        let times = [5.0, 10.0, 15.0];
        let request = MetricRequest {
            log: &f.log,
            query: &query,
            nside: 1,
            time_points: &times,
            tag: None,
            save: false,
        };

        // Every cell gets one non-DD visit on night 10; 18000 deg2 keeps 6 of 12 cells.
        let values = fonv_over_time(&f.cache(), &request, &fonv()).unwrap();
        assert_eq!(values, vec![0.0, 1.0, 1.0]);
        assert!(!f.cache().dir().exists());
    }

    #[test]
    fn time_points_are_nights_not_start_times() {
        let f = Fixture::new();
        let query = Query::all().excluding_note("DD");
        // The visits start at mjd 60010.25, long after every time point.
        let times = [9.0, 10.0, 60_011.0];
        let request = MetricRequest {
            log: &f.log,
            query: &query,
            nside: 1,
            time_points: &times,
            tag: None,
            save: false,
        };

        let values = fonv_over_time(&f.cache(), &request, &fonv()).unwrap();
        assert_eq!(values, vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn band_selection_narrows_the_visits() {
        let f = Fixture::new();
        let query = Query::all().excluding_note("DD").in_band("g");
        let request = MetricRequest {
            log: &f.log,
            query: &query,
            nside: 1,
            time_points: &[10.0],
            tag: None,
            save: false,
        };
        let everywhere = Fonv {
            sky_area: FULL_SKY_DEG2,
            statistic: Statistic::Mean,
        };

        let values = fonv_over_time(&f.cache(), &request, &everywhere).unwrap();
        assert_eq!(values, vec![0.5]);
    }

    #[test]
    fn saves_then_reads_back_without_recomputing() {
        let f = Fixture::new();
        let cache = f.cache();
        let query = Query::all();
        let times = [10.0];
        let mut request = MetricRequest {
            log: &f.log,
            query: &query,
            nside: 1,
            time_points: &times,
            tag: Some("sky_allfilts"),
            save: true,
        };

        let first = fonv_over_time(&cache, &request, &fonv()).unwrap();
        assert_eq!(first, vec![2.0]);
        assert!(cache.dir().join("fonv_sky_allfilts_nside1.json.zst").is_file());

        // A cache hit must not touch the log.
        fs::remove_file(&f.log).unwrap();
        request.save = false;
        let second = fonv_over_time(&cache, &request, &fonv()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn saving_requires_a_tag() {
        let f = Fixture::new();
        let query = Query::all();
        let request = MetricRequest {
            log: &f.log,
            query: &query,
            nside: 1,
            time_points: &[10.0],
            tag: None,
            save: true,
        };

        let err = fonv_over_time(&f.cache(), &request, &fonv()).unwrap_err();
        assert!(matches!(err, Error::Configuration(ConfigError::MissingOutputTag)));
    }

    #[test]
    fn missing_log_is_reported() {
        let dir = TempDir::new().unwrap();
        let query = Query::all();
        let request = MetricRequest {
            log: &dir.path().join("absent.db"),
            query: &query,
            nside: 1,
            time_points: &[10.0],
            tag: None,
            save: false,
        };

        let err = fonv_over_time(&FileCache::new(dir.path()), &request, &fonv()).unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::NotFound(_))));
    }
}
