//! Pure splice: one log's history followed by another log's future.
//!
//! No resimulation and no remapping. Rows at or before the cutoff come from
//! the cut log, rows after it from the baseline, each side in its own order.
//! Inputs are only ever opened read-only.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    artifact::ArtifactDescriptor,
    cache::{FileCache, Lookup},
    cutoff::Cutoff,
    store::{self, Query, StoreError},
};

/// A splice request.
#[derive(Debug, Clone, Copy)]
pub struct Splice<'a> {
    /// Log whose history is kept.
    pub cut_log: &'a Path,
    /// Log providing the future.
    pub baseline: &'a Path,
    pub cutoff: &'a Cutoff,
}

impl Splice<'_> {
    pub fn descriptor(&self) -> ArtifactDescriptor {
        ArtifactDescriptor::chimera(self.cut_log, self.baseline, self.cutoff)
    }

    pub fn probe(&self, cache: &FileCache) -> Lookup {
        cache.probe(&self.descriptor())
    }

    /// Returns the spliced artifact in `cache`, producing it if absent.
    pub fn generate(&self, cache: &FileCache) -> Result<PathBuf, StoreError> {
        cache.get_or_compute(&self.descriptor(), |tmp| self.write_to(tmp).map(|_| ()))
    }

    /// Splices into `out` and returns the number of rows written.
    pub fn write_to(&self, out: &Path) -> Result<usize, StoreError> {
        info!(
            cut_log = %self.cut_log.display(),
            baseline = %self.baseline.display(),
            cutoff = self.cutoff.mjd(),
            "splicing"
        );
        let past = store::read(self.cut_log, &Query::past(self.cutoff.mjd()))?;
        let future = store::read(self.baseline, &Query::future(self.cutoff.mjd()))?;
        debug!(past = past.len(), future = future.len(), "selected splice halves");

        let merged = past.concat(future);
        store::write(out, &merged)?;
        Ok(merged.len())
    }
}
