//! Core data model: observation frames and the column names engines interpret.

mod frame;

pub use frame::{Frame, FrameError};

/// Column names of the `observations` relation that engines read or synthesize.
///
/// Any other column is survey-specific and passes through opaquely.
pub mod columns {
    pub const ID: &str = "observationId";
    pub const START_MJD: &str = "observationStartMJD";
    pub const NIGHT: &str = "night";
    pub const BAND: &str = "filter";
    pub const EXPOSURE: &str = "visitExposureTime";
    pub const RA: &str = "fieldRA";
    pub const DEC: &str = "fieldDec";
    pub const SCHEDULER_NOTE: &str = "scheduler_note";
    pub const NOTE: &str = "note";
    pub const CLOUD_EXTINCTION: &str = "cloud_extinction";
}
