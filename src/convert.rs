//! Schema conversion between stored rows and collaborator observations.

use std::collections::BTreeSet;

use rusqlite::types::Value;

use crate::{
    model::{Frame, FrameError, columns},
    sim::SimObservation,
};

/// Maps between the storage schema and the collaborator's schema.
pub trait SchemaConverter {
    /// Columns the collaborator needs that a stored log may lack.
    ///
    /// The continuation engine adds these as zero-filled columns before
    /// conversion and drops them again afterwards.
    fn shim_columns(&self) -> &[&'static str];

    fn to_sim(&self, frame: &Frame) -> Result<Vec<SimObservation>, FrameError>;

    fn to_storage(&self, observations: &[SimObservation]) -> Frame;
}

/// The opsim column layout: degrees and camelCase names on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpsimSchema;

/// Columns [`OpsimSchema::to_sim`] requires.
const INPUT: [&str; 9] = [
    columns::ID,
    columns::START_MJD,
    columns::NIGHT,
    columns::BAND,
    columns::EXPOSURE,
    columns::RA,
    columns::DEC,
    columns::NOTE,
    columns::CLOUD_EXTINCTION,
];

/// Columns [`OpsimSchema::to_storage`] writes, in order. The `note` shim is
/// input only.
const OUTPUT: [&str; 9] = [
    columns::ID,
    columns::START_MJD,
    columns::NIGHT,
    columns::BAND,
    columns::EXPOSURE,
    columns::RA,
    columns::DEC,
    columns::SCHEDULER_NOTE,
    columns::CLOUD_EXTINCTION,
];

impl SchemaConverter for OpsimSchema {
    fn shim_columns(&self) -> &[&'static str] {
        &[columns::NOTE, columns::CLOUD_EXTINCTION]
    }

    fn to_sim(&self, frame: &Frame) -> Result<Vec<SimObservation>, FrameError> {
        let mut core = [0usize; INPUT.len()];
        for (slot, name) in core.iter_mut().zip(INPUT) {
            *slot = frame.require(name)?;
        }
        let [id, mjd, night, band, exptime, ra, dec, note, cloud] = core;
        let scheduler_note = frame.column_index(columns::SCHEDULER_NOTE);
        let extras: Vec<(usize, &String)> = frame
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, _)| !core.contains(i) && scheduler_note != Some(*i))
            .collect();

        (0..frame.len())
            .map(|row| -> Result<SimObservation, FrameError> {
                Ok(SimObservation {
                    id: frame.get_i64(row, id)?,
                    mjd: frame.get_f64(row, mjd)?,
                    night: frame.get_i64(row, night)?,
                    band: frame.get_text(row, band)?,
                    exptime: frame.get_f64(row, exptime)?,
                    ra: frame.get_f64(row, ra)?.to_radians(),
                    dec: frame.get_f64(row, dec)?.to_radians(),
                    scheduler_note: scheduler_note
                        .map(|i| text_of(frame.get(row, i)))
                        .unwrap_or_default(),
                    note: text_of(frame.get(row, note)),
                    cloud_extinction: frame.get_f64(row, cloud)?,
                    extra: extras
                        .iter()
                        .map(|(i, name)| ((*name).clone(), to_json(frame.get(row, *i))))
                        .collect(),
                })
            })
            .collect()
    }

    fn to_storage(&self, observations: &[SimObservation]) -> Frame {
        let extra_names: BTreeSet<&String> =
            observations.iter().flat_map(|o| o.extra.keys()).collect();

        let mut names: Vec<String> = OUTPUT.iter().map(|c| (*c).to_string()).collect();
        names.extend(extra_names.iter().map(|n| (*n).clone()));
        let mut frame = Frame::new(names);

        for obs in observations {
            let mut row = vec![
                Value::Integer(obs.id),
                Value::Real(obs.mjd),
                Value::Integer(obs.night),
                Value::Text(obs.band.clone()),
                Value::Real(obs.exptime),
                Value::Real(obs.ra.to_degrees()),
                Value::Real(obs.dec.to_degrees()),
                Value::Text(obs.scheduler_note.clone()),
                Value::Real(obs.cloud_extinction),
            ];
            row.extend(
                extra_names
                    .iter()
                    .map(|n| obs.extra.get(*n).map_or(Value::Null, from_json)),
            );
            frame.push_row(row);
        }
        frame
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null | Value::Blob(_) => String::new(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(v) => v.clone(),
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null | Value::Blob(_) => serde_json::Value::Null,
        Value::Integer(v) => (*v).into(),
        Value::Real(v) => {
            serde_json::Number::from_f64(*v).map_or(serde_json::Value::Null, Into::into)
        }
        Value::Text(v) => v.clone().into(),
    }
}

fn from_json(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Null, Value::Real),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}
