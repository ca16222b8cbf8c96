//! Crate-wide error type.
//!
//! Each module owns a focused error enum; this one aggregates them for the
//! engines and the driver. Collaborator failures are carried through
//! untouched so their messages and sources reach the caller as-is.

use std::{io, path::PathBuf};

use crate::{config::ConfigError, cutoff::CutoffError, sky::SkyError, store::StoreError};

/// Failure raised by an external collaborator (scheduler, observatory, converter).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    InvalidTimeFormat(#[from] CutoffError),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(
        "expected exactly one log ending in '{suffix}' under {}, found {found}",
        dir.display()
    )]
    AmbiguousSource {
        dir: PathBuf,
        suffix: String,
        found: usize,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sky(#[from] SkyError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Collaborator(CollaboratorError),
}

pub type Result<T> = core::result::Result<T, Error>;
