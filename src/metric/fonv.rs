//! FONv over time: a statistic of the best-observed cells covering a fixed area.

use serde::{Deserialize, Serialize};

use super::CellCounts;

/// Statistic taken over the retained cells at each time point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    #[default]
    Median,
    Mean,
}

impl Statistic {
    /// Applies the statistic to `values`, which must be sorted ascending.
    /// Returns NaN for an empty slice.
    #[allow(clippy::cast_precision_loss)]
    pub fn of_sorted(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        match self {
            Self::Median => {
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    f64::midpoint(values[mid - 1], values[mid])
                } else {
                    values[mid]
                }
            }
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
        }
    }
}

/// Number of cells of `cell_area` needed to cover `sky_area`, capped at
/// `cell_count`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn cells_needed(sky_area: f64, cell_area: f64, cell_count: usize) -> usize {
    let needed = (sky_area / cell_area).ceil().max(0.0) as usize;
    needed.min(cell_count)
}

/// The FONv summary: how deep the best-covered `sky_area` square degrees are.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fonv {
    /// Area to cover, in square degrees.
    pub sky_area: f64,
    pub statistic: Statistic,
}

impl Fonv {
    /// Reduces per-cell accumulated counts to one value per time point.
    ///
    /// At each time point the cell values are sorted ascending (stable),
    /// the top [`cells_needed`] are kept and the statistic is taken over them.
    pub fn summarize(&self, counts: &CellCounts, cell_area: f64) -> Vec<f64> {
        let keep = cells_needed(self.sky_area, cell_area, counts.cell_count());
        let mut column = Vec::with_capacity(counts.cell_count());
        (0..counts.time_count())
            .map(|t| {
                column.clear();
                column.extend(counts.at(t).map(f64::from));
                column.sort_by(f64::total_cmp);
                self.statistic.of_sorted(&column[column.len() - keep..])
            })
            .collect()
    }
}
