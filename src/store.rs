//! Observation store: the `observations` relation in an SQLite file.
//!
//! Reads open the file read-only, so an input log is never created or
//! modified. Writes replace the relation wholesale inside one transaction.

mod query;

use std::{
    io,
    path::{Path, PathBuf},
};

use rusqlite::{Connection, OpenFlags, params_from_iter, types::Value};
use tracing::debug;

use crate::model::{Frame, FrameError};

pub use query::{Query, Window};

/// Name of the relation holding one row per visit.
pub const RELATION: &str = "observations";

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("observation log not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, StoreError>;

/// Reads the rows of `path` selected by `query`, in storage order.
pub fn read(path: &Path, query: &Query) -> Result<Frame> {
    if !path.is_file() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let (clause, params) = query.to_sql();
    let sql = format!("SELECT * FROM {}{clause} ORDER BY rowid", quote(RELATION));
    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut frame = Frame::new(columns);
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        (0..width)
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()
    })?;
    for row in rows {
        frame.push_row(row?);
    }

    debug!(
        path = %path.display(),
        rows = frame.len(),
        window = ?query.window(),
        "read observations"
    );
    Ok(frame)
}

/// Writes `frame` as the `observations` relation of `path`.
///
/// Any existing relation of that name in `path` is replaced; nothing else
/// in the file is touched. The file is created if missing.
pub fn write(path: &Path, frame: &Frame) -> Result<()> {
    let mut conn = Connection::open(path)?;
    let tx = conn.transaction()?;

    tx.execute(&format!("DROP TABLE IF EXISTS {}", quote(RELATION)), [])?;

    let definitions: Vec<String> = frame
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| match declared_type(frame, i) {
            Some(ty) => format!("{} {ty}", quote(name)),
            None => quote(name),
        })
        .collect();
    tx.execute(
        &format!("CREATE TABLE {} ({})", quote(RELATION), definitions.join(", ")),
        [],
    )?;

    {
        let placeholders = vec!["?"; frame.columns().len()].join(", ");
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({placeholders})",
            quote(RELATION)
        ))?;
        for row in frame.rows() {
            insert.execute(params_from_iter(row.iter()))?;
        }
    }

    tx.commit()?;
    debug!(path = %path.display(), rows = frame.len(), "wrote observations");
    Ok(())
}

/// Column affinity taken from the first non-null value, as a dataframe writer would.
fn declared_type(frame: &Frame, column: usize) -> Option<&'static str> {
    frame.rows().iter().find_map(|row| match &row[column] {
        Value::Null => None,
        Value::Integer(_) => Some("INTEGER"),
        Value::Real(_) => Some("REAL"),
        Value::Text(_) => Some("TEXT"),
        Value::Blob(_) => Some("BLOB"),
    })
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::fs;

    use tempfile::TempDir;

    use crate::model::columns;

    /// Writes a minimal log whose rows have the given ids and start times.
    pub(crate) fn write_log(path: &Path, rows: &[(i64, f64)]) {
        let mut frame = Frame::new(vec![
            columns::ID.to_string(),
            columns::START_MJD.to_string(),
            columns::NIGHT.to_string(),
            columns::BAND.to_string(),
        ]);
        for (id, mjd) in rows {
            #[allow(clippy::cast_possible_truncation)]
            let night = mjd.floor() as i64;
            frame.push_row(vec![
                Value::Integer(*id),
                Value::Real(*mjd),
                Value::Integer(night),
                Value::Text("r".into()),
            ]);
        }
        write(path, &frame).unwrap();
    }

    pub(crate) fn start_times(frame: &Frame) -> Vec<f64> {
        frame.f64_column(columns::START_MJD).unwrap()
    }

    #[test]
    fn write_then_read_all() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.db");
        write_log(&path, &[(1, 10.0), (2, 10.5), (3, 11.2)]);

        let frame = read(&path, &Query::all()).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(start_times(&frame), vec![10.0, 10.5, 11.2]);
        assert_eq!(
            frame.columns(),
            [columns::ID, columns::START_MJD, columns::NIGHT, columns::BAND]
        );
    }

    #[test]
    fn windows_split_at_the_cutoff() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.db");
        write_log(&path, &[(1, 10.0), (2, 11.0), (3, 11.2)]);

        let past = read(&path, &Query::past(11.0)).unwrap();
        let future = read(&path, &Query::future(11.0)).unwrap();
        assert_eq!(start_times(&past), vec![10.0, 11.0]);
        assert_eq!(start_times(&future), vec![11.2]);
    }

    #[test]
    fn empty_selection_keeps_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.db");
        write_log(&path, &[(1, 10.0)]);

        let frame = read(&path, &Query::future(20.0)).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.columns().len(), 4);
    }

    #[test]
    fn band_and_note_filters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.db");
        let mut frame = Frame::new(vec![
            columns::START_MJD.to_string(),
            columns::BAND.to_string(),
            columns::SCHEDULER_NOTE.to_string(),
        ]);
        for (mjd, band, note) in [
            (1.0, "r", "blob, ri"),
            (2.0, "g", "greedy"),
            (3.0, "r", "DD:COSMOS"),
        ] {
            frame.push_row(vec![
                Value::Real(mjd),
                Value::Text(band.into()),
                Value::Text(note.into()),
            ]);
        }
        write(&path, &frame).unwrap();

        let wide = read(&path, &Query::all().excluding_note("DD")).unwrap();
        assert_eq!(start_times(&wide), vec![1.0, 2.0]);

        let red = read(&path, &Query::all().excluding_note("DD").in_band("r")).unwrap();
        assert_eq!(start_times(&red), vec![1.0]);
    }

    #[test]
    fn write_replaces_existing_relation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.db");
        write_log(&path, &[(1, 10.0), (2, 10.5)]);
        write_log(&path, &[(9, 99.0)]);

        let frame = read(&path, &Query::all()).unwrap();
        assert_eq!(start_times(&frame), vec![99.0]);
    }

    #[test]
    fn read_missing_log_fails_without_creating_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.db");

        let err = read(&path, &Query::all()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!path.exists());
    }

    #[test]
    fn read_leaves_input_bytes_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.db");
        write_log(&path, &[(1, 10.0), (2, 10.5)]);
        let before = fs::read(&path).unwrap();

        read(&path, &Query::past(10.2)).unwrap();
        assert_eq!(fs::read(&path).unwrap(), before);
    }
}
