//! Subprocess simulator: the scheduler and observatory run in another program.
//!
//! The first three calls only record what to build and restore. The final
//! `resimulate` call sends a single JSON request on the program's stdin and
//! reads the new visits back as a JSON array on its stdout. The program's
//! stderr is inherited so its progress output reaches the terminal.
//!
//! The program must read its whole request before writing a response.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::CollaboratorError;

use super::{BandPolicy, RunPlan, SchedulerParams, SimObservation, Simulator};

#[derive(Debug, thiserror::Error)]
pub enum ExternalError {
    #[error("simulator command is empty")]
    EmptyCommand,

    #[error("failed to launch `{program}`: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("`{program}` exited with {status}")]
    Failed { program: String, status: ExitStatus },

    #[error("simulator I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid simulator response: {0}")]
    Response(#[from] serde_json::Error),
}

/// A simulator driven through an external command.
#[derive(Debug, Clone)]
pub struct ExternalSimulator {
    program: String,
    args: Vec<String>,
}

impl ExternalSimulator {
    /// `command` is an argv: program followed by its arguments.
    pub fn new(command: &[String]) -> Result<Self, ExternalError> {
        let (program, args) = command.split_first().ok_or(ExternalError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn run(&self, request: &Request<'_>) -> Result<Vec<SimObservation>, ExternalError> {
        let payload = serde_json::to_vec(request)?;
        debug!(program = %self.program, bytes = payload.len(), "launching simulator");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ExternalError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(&payload)
            && e.kind() != io::ErrorKind::BrokenPipe
        {
            return Err(e.into());
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ExternalError::Failed {
                program: self.program.clone(),
                status: output.status,
            });
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// A scheduler to be built, and restored, by the external program.
#[derive(Debug, Clone)]
pub struct PendingScheduler {
    policy: PathBuf,
    params: SchedulerParams,
    restore: Option<RestorePoint>,
}

/// An observatory to be built by the external program.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PendingObservatory {
    mjd_start: f64,
}

#[derive(Debug, Clone, Serialize)]
struct RestorePoint {
    as_of: Option<i64>,
    history: Vec<SimObservation>,
}

#[derive(Serialize)]
struct Request<'a> {
    policy: &'a Path,
    scheduler: &'a SchedulerParams,
    observatory: &'a PendingObservatory,
    restore: Option<&'a RestorePoint>,
    band_policy: &'a BandPolicy,
    run: &'a RunPlan,
}

impl Simulator for ExternalSimulator {
    type Scheduler = PendingScheduler;
    type Observatory = PendingObservatory;

    fn scheduler(
        &mut self,
        policy: &Path,
        params: &SchedulerParams,
    ) -> Result<PendingScheduler, CollaboratorError> {
        Ok(PendingScheduler {
            policy: policy.to_path_buf(),
            params: params.clone(),
            restore: None,
        })
    }

    fn observatory(
        &mut self,
        _scheduler: &PendingScheduler,
        mjd_start: f64,
    ) -> Result<PendingObservatory, CollaboratorError> {
        Ok(PendingObservatory { mjd_start })
    }

    fn restore(
        &mut self,
        mut scheduler: PendingScheduler,
        observatory: PendingObservatory,
        history: &[SimObservation],
        as_of: Option<i64>,
        _bands: &BandPolicy,
    ) -> Result<(PendingScheduler, PendingObservatory), CollaboratorError> {
        scheduler.restore = Some(RestorePoint {
            as_of,
            history: history.to_vec(),
        });
        Ok((scheduler, observatory))
    }

    fn resimulate(
        &mut self,
        scheduler: PendingScheduler,
        observatory: PendingObservatory,
        plan: &RunPlan,
        bands: &BandPolicy,
    ) -> Result<Vec<SimObservation>, CollaboratorError> {
        info!(
            program = %self.program,
            nights = plan.duration_nights,
            "running external simulator"
        );
        let request = Request {
            policy: &scheduler.policy,
            scheduler: &scheduler.params,
            observatory: &observatory,
            restore: scheduler.restore.as_ref(),
            band_policy: bands,
            run: plan,
        };
        Ok(self.run(&request)?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn params() -> SchedulerParams {
        SchedulerParams {
            survey_length: 10,
            setup_only: true,
            verbose: false,
            policy: serde_json::Map::new(),
        }
    }

    fn run_with(command: &[&str]) -> Result<Vec<SimObservation>, CollaboratorError> {
        let command: Vec<String> = command.iter().map(|s| (*s).to_string()).collect();
        let mut sim = ExternalSimulator::new(&command).unwrap();
        let scheduler = sim.scheduler(Path::new("policy.py"), &params())?;
        let observatory = sim.observatory(&scheduler, 60000.0)?;
        let bands = BandPolicy::Simple { illum_limit: 40.0 };
        let (scheduler, observatory) = sim.restore(scheduler, observatory, &[], None, &bands)?;
        let plan = RunPlan {
            duration_nights: 10,
            delete_past: true,
            visit_limit: None,
        };
        sim.resimulate(scheduler, observatory, &plan, &bands)
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            ExternalSimulator::new(&[]).unwrap_err(),
            ExternalError::EmptyCommand
        ));
    }

    #[test]
    fn reads_visits_from_stdout() {
        let script = r#"cat > /dev/null; echo '[{"id":7,"mjd":60001.5,"night":2,"band":"g","exptime":30.0,"ra":0.5,"dec":-0.2,"scheduler_note":"blob","airmass":1.2}]'"#;
        let visits = run_with(&["sh", "-c", script]).unwrap();

        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].id, 7);
        assert_eq!(visits[0].scheduler_note, "blob");
        assert_eq!(visits[0].note, "");
        assert_eq!(visits[0].extra["airmass"], serde_json::json!(1.2));
    }

    #[test]
    fn request_carries_the_reduced_length() {
        // Echo the request's survey length back as a visit id.
        let script = r#"grep -o '"survey_length":[0-9]*' | cut -d: -f2 | { read n; echo "[{\"id\":$n,\"mjd\":1.0,\"night\":1,\"band\":\"r\",\"exptime\":30.0,\"ra\":0.0,\"dec\":0.0}]"; }"#;
        let visits = run_with(&["sh", "-c", script]).unwrap();
        assert_eq!(visits[0].id, 10);
    }

    #[test]
    fn failure_propagates_exit_status() {
        let err = run_with(&["sh", "-c", "cat > /dev/null; exit 3"]).unwrap_err();
        let err = err.downcast::<ExternalError>().unwrap();
        assert!(matches!(*err, ExternalError::Failed { status, .. } if status.code() == Some(3)));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let err = run_with(&["/nonexistent/simulator"]).unwrap_err();
        let err = err.downcast::<ExternalError>().unwrap();
        assert!(matches!(*err, ExternalError::Spawn { .. }));
    }
}
