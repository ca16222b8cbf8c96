//! Per-cell visit counts accumulated over time points.

use crate::{
    model::{Frame, FrameError, columns},
    sky::Tessellation,
};

/// Where and on which night one visit pointed. Angles are degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointing {
    pub night: i64,
    pub ra: f64,
    pub dec: f64,
}

/// Extracts the pointings of every row of `frame`.
pub fn pointings(frame: &Frame) -> Result<Vec<Pointing>, FrameError> {
    let night = frame.require(columns::NIGHT)?;
    let ra = frame.require(columns::RA)?;
    let dec = frame.require(columns::DEC)?;
    (0..frame.len())
        .map(|row| -> Result<Pointing, FrameError> {
            Ok(Pointing {
                night: frame.get_i64(row, night)?,
                ra: frame.get_f64(row, ra)?,
                dec: frame.get_f64(row, dec)?,
            })
        })
        .collect()
}

/// A cells by time points grid of cumulative visit counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellCounts {
    cells: usize,
    times: usize,
    /// Row-major: `counts[cell * times + t]`.
    counts: Vec<u32>,
}

impl CellCounts {
    fn zeroed(cells: usize, times: usize) -> Self {
        Self {
            cells,
            times,
            counts: vec![0; cells * times],
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cells
    }

    pub fn time_count(&self) -> usize {
        self.times
    }

    /// Count of `cell` at time point `t`.
    pub fn get(&self, cell: usize, t: usize) -> u32 {
        self.counts[cell * self.times + t]
    }

    /// Every cell's count at time point `t`, in cell order.
    pub fn at(&self, t: usize) -> impl Iterator<Item = u32> + '_ {
        (0..self.cells).map(move |cell| self.get(cell, t))
    }

    #[cfg(test)]
    pub(crate) fn from_rows(rows: &[Vec<u32>]) -> Self {
        let times = rows.first().map_or(0, Vec::len);
        Self {
            cells: rows.len(),
            times,
            counts: rows.concat(),
        }
    }
}

/// Counts, for every cell and time point `t`, the visits on nights `<= t`
/// whose field of `radius_deg` covers the cell's center.
///
/// Time points are night indices and must be ascending. Visits after the
/// last time point are never counted.
pub fn accumulate<T: Tessellation>(
    sky: &T,
    visits: &[Pointing],
    time_points: &[f64],
    radius_deg: f64,
) -> CellCounts {
    let times = time_points.len();
    let mut grid = CellCounts::zeroed(sky.cell_count(), times);
    let mut cells = Vec::new();

    for visit in visits {
        // First time point at or after the visit's night.
        #[allow(clippy::cast_precision_loss)]
        let night = visit.night as f64;
        let bin = time_points.partition_point(|t| *t < night);
        if bin == times {
            continue;
        }
        sky.cells_within(visit.ra, visit.dec, radius_deg, &mut cells);
        for &cell in &cells {
            grid.counts[cell * times + bin] += 1;
        }
    }

    for row in grid.counts.chunks_mut(times.max(1)) {
        for t in 1..row.len() {
            row[t] += row[t - 1];
        }
    }
    grid
}
