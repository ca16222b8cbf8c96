//! Row selection over the `observations` relation.

use rusqlite::types::Value;

use crate::model::columns;

/// Which part of the log a read covers, relative to a cutoff MJD.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Window {
    #[default]
    All,
    /// Visits starting at or before the cutoff.
    Past(f64),
    /// Visits starting strictly after the cutoff.
    Future(f64),
}

/// A read request: a time window plus optional visit filters.
///
/// Rendered to a parameterised `WHERE` clause; values are always bound,
/// never interpolated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    window: Window,
    exclude_note: Option<String>,
    band: Option<String>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn past(cutoff_mjd: f64) -> Self {
        Self {
            window: Window::Past(cutoff_mjd),
            ..Self::default()
        }
    }

    pub fn future(cutoff_mjd: f64) -> Self {
        Self {
            window: Window::Future(cutoff_mjd),
            ..Self::default()
        }
    }

    /// Drops visits whose scheduler note contains `fragment`.
    #[must_use]
    pub fn excluding_note(mut self, fragment: impl Into<String>) -> Self {
        self.exclude_note = Some(fragment.into());
        self
    }

    /// Keeps only visits taken in `band`.
    #[must_use]
    pub fn in_band(mut self, band: impl Into<String>) -> Self {
        self.band = Some(band.into());
        self
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// The `WHERE` clause (empty when unfiltered) and its bound parameters.
    pub(super) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        match self.window {
            Window::All => {}
            Window::Past(mjd) => {
                conditions.push(format!("\"{}\" <= ?", columns::START_MJD));
                params.push(Value::Real(mjd));
            }
            Window::Future(mjd) => {
                conditions.push(format!("\"{}\" > ?", columns::START_MJD));
                params.push(Value::Real(mjd));
            }
        }
        if let Some(fragment) = &self.exclude_note {
            conditions.push(format!("\"{}\" NOT LIKE ?", columns::SCHEDULER_NOTE));
            params.push(Value::Text(format!("%{fragment}%")));
        }
        if let Some(band) = &self.band {
            conditions.push(format!("\"{}\" = ?", columns::BAND));
            params.push(Value::Text(band.clone()));
        }

        if conditions.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_query_has_no_clause() {
        let (clause, params) = Query::all().to_sql();
        assert!(clause.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn past_is_inclusive_and_future_is_strict() {
        let (past, _) = Query::past(11.0).to_sql();
        let (future, _) = Query::future(11.0).to_sql();
        assert_eq!(past, " WHERE \"observationStartMJD\" <= ?");
        assert_eq!(future, " WHERE \"observationStartMJD\" > ?");
    }

    #[test]
    fn filters_are_bound_not_interpolated() {
        let (clause, params) = Query::all().excluding_note("DD").in_band("r'; --").to_sql();
        assert_eq!(
            clause,
            " WHERE \"scheduler_note\" NOT LIKE ? AND \"filter\" = ?"
        );
        assert_eq!(
            params,
            vec![Value::Text("%DD%".into()), Value::Text("r'; --".into())]
        );
    }
}
