//! Artifact descriptors: the human-readable cache key of a spliced log.
//!
//! Names follow `{kind}_{cutLog}_{source}[-{suffix}]_cutoff{mjd}.db` and must
//! match artifacts produced by earlier tooling byte for byte.

use std::{fmt, path::Path};

use crate::{cache::CacheKey, cutoff::Cutoff};

/// Extension of every generated observation log.
const LOG_EXTENSION: &str = "db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// History from one log, future from another.
    Chimera,
    /// History from one log, future resimulated.
    Bespoke,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Chimera => "chimera",
            Self::Bespoke => "bespoke",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    kind: ArtifactKind,
    cut_log: String,
    source: String,
    suffix: Option<&'static str>,
    cutoff: String,
}

impl ArtifactDescriptor {
    /// Descriptor for `cut_log` spliced with the future of `baseline`.
    pub fn chimera(cut_log: &Path, baseline: &Path, cutoff: &Cutoff) -> Self {
        Self {
            kind: ArtifactKind::Chimera,
            cut_log: base_name(cut_log, ".db"),
            source: base_name(baseline, ".db"),
            suffix: None,
            cutoff: cutoff.label(),
        }
    }

    /// Descriptor for `cut_log` continued by the scheduler built from `policy`.
    pub fn bespoke(cut_log: &Path, policy: &Path, cutoff: &Cutoff) -> Self {
        Self {
            kind: ArtifactKind::Bespoke,
            cut_log: base_name(cut_log, ".db"),
            source: base_name(policy, ".py"),
            suffix: Some("sched"),
            cutoff: cutoff.label(),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }
}

impl CacheKey for ArtifactDescriptor {
    fn file_name(&self) -> String {
        let suffix = self.suffix.map(|s| format!("-{s}")).unwrap_or_default();
        format!(
            "{}_{}_{}{suffix}_cutoff{}.{LOG_EXTENSION}",
            self.kind, self.cut_log, self.source, self.cutoff
        )
    }
}

/// Final path component up to the first occurrence of `marker`.
fn base_name(path: &Path, marker: &str) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.split(marker).next().unwrap_or_default().to_string()
}
