//! Classification of a finished (or failed-to-start) launch into a terminal status.

use crate::model::{CapturedOutput, ExecutionRequest, Phase, StatusEvent, StatusUpdate};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{target} not found")]
    TargetNotFound { target: String },

    #[error("{0}")]
    Spawn(#[source] std::io::Error),

    #[error("exit code {code}")]
    ProcessFailed { code: i32, output: CapturedOutput },

    #[error("terminated by a signal")]
    Signalled { output: CapturedOutput },

    #[error("timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl LaunchError {
    /// Map a spawn failure. A missing binary gets its own variant so it reads the
    /// same as a missing script file. `NotFound` also covers a working directory
    /// removed after startup, which is checked first.
    pub(crate) fn from_spawn(err: std::io::Error, program: &str, working_dir: &Path) -> Self {
        if err.kind() != std::io::ErrorKind::NotFound {
            return LaunchError::Spawn(err);
        }
        let target = if working_dir.is_dir() {
            program.to_string()
        } else {
            format!("working directory {}", working_dir.display())
        };
        LaunchError::TargetNotFound { target }
    }

    /// The process never ran.
    pub fn is_start_failure(&self) -> bool {
        matches!(
            self,
            LaunchError::TargetNotFound { .. } | LaunchError::Spawn(_)
        )
    }

    fn into_output(self) -> Option<CapturedOutput> {
        match self {
            LaunchError::ProcessFailed { output, .. } | LaunchError::Signalled { output } => {
                Some(output)
            }
            _ => None,
        }
    }
}

/// Build the one terminal update for a request.
pub(crate) fn terminal_update(
    req: &ExecutionRequest,
    result: Result<CapturedOutput, LaunchError>,
) -> StatusUpdate {
    let label = &req.label;
    match result {
        Ok(output) => StatusUpdate::new(
            req,
            StatusEvent::new(Phase::Succeeded, format!("{label} completed successfully")),
        )
        .with_output(output),
        Err(err) => {
            let event = match &err {
                LaunchError::Timeout(_) => StatusEvent::new(Phase::TimedOut, format!("{label} {err}")),
                e if e.is_start_failure() => {
                    StatusEvent::new(Phase::Failed, format!("Could not start {label}: {err}"))
                }
                LaunchError::ProcessFailed { output, .. } => {
                    let mut msg = format!("{label} failed with {err}");
                    if let Some(line) = last_line(&output.stderr) {
                        msg.push_str(": ");
                        msg.push_str(line);
                    }
                    StatusEvent::new(Phase::Failed, msg)
                }
                _ => StatusEvent::new(Phase::Failed, format!("{label} failed: {err}")),
            };
            let update = StatusUpdate::new(req, event);
            match err.into_output() {
                Some(output) => update.with_output(output),
                None => update,
            }
        }
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|l| !l.is_empty())
}

/// Best-effort text from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
