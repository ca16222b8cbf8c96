//! Cutoff resolution: turn a human-given date into a Modified Julian Date.
//!
//! Calendar dates without a time of day are pinned to 12:00 UTC so a cutoff
//! never lands on a day boundary. The resolved `Cutoff` is only ever used
//! for comparison: `<=` is the past, `>` is the future.

use std::{fmt, str::FromStr};

use jiff::{civil, tz::TimeZone};

/// MJD of the Unix epoch, 1970-01-01T00:00:00 UTC.
const MJD_UNIX_EPOCH: f64 = 40_587.0;

/// Offset between Julian Date and Modified Julian Date.
const JD_MJD_OFFSET: f64 = 2_400_000.5;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, thiserror::Error)]
pub enum CutoffError {
    #[error("unsupported time format '{0}' (expected mjd, jd, isot, or iso)")]
    UnknownFormat(String),

    #[error("cannot parse '{value}' as {format}: {reason}")]
    Unparseable {
        value: String,
        format: TimeFormat,
        reason: String,
    },
}

/// Supported date format tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// Modified Julian Date, e.g. `60676.5`.
    Mjd,
    /// Julian Date, e.g. `2460677.0`.
    Jd,
    /// ISO 8601 with a `T` separator: `2025-01-01` or `2025-01-01T06:30:00`.
    Isot,
    /// ISO 8601 with a space separator: `2025-01-01` or `2025-01-01 06:30:00`.
    Iso,
}

impl FromStr for TimeFormat {
    type Err = CutoffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mjd" => Ok(Self::Mjd),
            "jd" => Ok(Self::Jd),
            "isot" => Ok(Self::Isot),
            "iso" => Ok(Self::Iso),
            _ => Err(CutoffError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for TimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mjd => "mjd",
            Self::Jd => "jd",
            Self::Isot => "isot",
            Self::Iso => "iso",
        })
    }
}

/// The instant separating retained history from the replaced future.
#[derive(Debug, Clone, PartialEq)]
pub struct Cutoff {
    mjd: f64,
    date: String,
    format: TimeFormat,
}

impl Cutoff {
    /// Resolves `date` under the format named by `format`.
    pub fn resolve(date: &str, format: &str) -> Result<Self, CutoffError> {
        let format: TimeFormat = format.parse()?;
        let mjd = parse_mjd(date.trim(), format)?;
        Ok(Self {
            mjd,
            date: date.to_string(),
            format,
        })
    }

    pub fn mjd(&self) -> f64 {
        self.mjd
    }

    /// The date string this cutoff was resolved from.
    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn format(&self) -> TimeFormat {
        self.format
    }

    /// The MJD as it appears in artifact names.
    ///
    /// Shortest round-trip decimal, always with a fractional part
    /// (`60000.0`, `60676.5`), so names match artifacts produced elsewhere.
    pub fn label(&self) -> String {
        float_label(self.mjd)
    }
}

fn parse_mjd(value: &str, format: TimeFormat) -> Result<f64, CutoffError> {
    let unparseable = |reason: String| CutoffError::Unparseable {
        value: value.to_string(),
        format,
        reason,
    };

    match format {
        TimeFormat::Mjd | TimeFormat::Jd => {
            let number: f64 = value.parse().map_err(|e| unparseable(format!("{e}")))?;
            if !number.is_finite() {
                return Err(unparseable("not a finite number".into()));
            }
            Ok(match format {
                TimeFormat::Jd => number - JD_MJD_OFFSET,
                _ => number,
            })
        }
        TimeFormat::Isot | TimeFormat::Iso => {
            let separator = if format == TimeFormat::Isot { 'T' } else { ' ' };
            let datetime = match value.split_once(separator) {
                None => {
                    if value.contains(['T', ' ']) {
                        return Err(unparseable(format!("expected '{separator}' separator")));
                    }
                    let date: civil::Date =
                        value.parse().map_err(|e| unparseable(format!("{e}")))?;
                    date.at(12, 0, 0, 0)
                }
                Some((date, time)) => format!("{date}T{time}")
                    .parse::<civil::DateTime>()
                    .map_err(|e| unparseable(format!("{e}")))?,
            };
            let timestamp = datetime
                .to_zoned(TimeZone::UTC)
                .map_err(|e| unparseable(format!("{e}")))?
                .timestamp();
            #[allow(clippy::cast_precision_loss)]
            let seconds = timestamp.as_second() as f64
                + f64::from(timestamp.subsec_nanosecond()) / 1e9;
            Ok(MJD_UNIX_EPOCH + seconds / SECONDS_PER_DAY)
        }
    }
}

/// Formats a float the way artifact names expect: integral values keep `.0`.
pub fn float_label(value: f64) -> String {
    let text = value.to_string();
    if !value.is_finite() || text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mjd_passes_through() {
        let cutoff = Cutoff::resolve("60676.25", "mjd").unwrap();
        assert_eq!(cutoff.mjd(), 60676.25);
        assert_eq!(cutoff.format(), TimeFormat::Mjd);
        assert_eq!(cutoff.date(), "60676.25");
    }

    #[test]
    fn format_tag_is_case_insensitive() {
        let cutoff = Cutoff::resolve("11.0", "MJD").unwrap();
        assert_eq!(cutoff.mjd(), 11.0);
    }

    #[test]
    fn jd_is_offset() {
        let cutoff = Cutoff::resolve("2460677.0", "jd").unwrap();
        assert_eq!(cutoff.mjd(), 60676.5);
    }

    #[test]
    fn calendar_date_is_pinned_to_noon() {
        let isot = Cutoff::resolve("2025-01-01", "isot").unwrap();
        let iso = Cutoff::resolve("2025-01-01", "iso").unwrap();
        assert_eq!(isot.mjd(), 60676.5);
        assert_eq!(iso.mjd(), 60676.5);
    }

    #[test]
    fn explicit_time_of_day_is_kept() {
        let isot = Cutoff::resolve("2025-01-01T00:00:00", "isot").unwrap();
        let iso = Cutoff::resolve("2025-01-01 18:00:00", "iso").unwrap();
        assert_eq!(isot.mjd(), 60676.0);
        assert_eq!(iso.mjd(), 60676.75);
    }

    #[test]
    fn unknown_format_fails() {
        let err = Cutoff::resolve("2025-01-01", "unix").unwrap_err();
        assert!(matches!(err, CutoffError::UnknownFormat(f) if f == "unix"));
    }

    #[test]
    fn unparseable_values_fail() {
        for (value, format) in [
            ("yesterday", "mjd"),
            ("inf", "mjd"),
            ("2025-13-01", "isot"),
            ("2025-01-01 12:00:00", "isot"),
            ("2025-01-01T12:00:00", "iso"),
        ] {
            let err = Cutoff::resolve(value, format).unwrap_err();
            assert!(
                matches!(err, CutoffError::Unparseable { .. }),
                "{value} as {format}"
            );
        }
    }

    #[test]
    fn labels_keep_a_fractional_part() {
        assert_eq!(Cutoff::resolve("60000", "mjd").unwrap().label(), "60000.0");
        assert_eq!(
            Cutoff::resolve("2025-01-01", "isot").unwrap().label(),
            "60676.5"
        );
        assert_eq!(float_label(60676.123_456), "60676.123456");
    }
}
