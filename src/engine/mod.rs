mod capture;
mod command;
mod outcome;

use outcome::LaunchError;

use crate::model::{
    CapturedOutput, ExecutionRequest, LaunchConfig, LaunchableItem, Phase, StatusEvent,
    StatusUpdate,
};
use crate::status::StatusSink;
use futures::FutureExt;
use rand::RngCore;
use capture::{PipeReader, PIPE_DRAIN};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

pub(crate) use command::working_dir_ok;

/// Runs launchable items out-of-process and reports their status.
///
/// Every launch gets its own worker task; the engine itself holds no per-request
/// state, so it can be shared freely and called from any thread.
#[derive(Clone)]
pub struct LaunchEngine {
    cfg: Arc<LaunchConfig>,
    sink: StatusSink,
    runtime: Handle,
}

impl LaunchEngine {
    pub fn new(cfg: Arc<LaunchConfig>, sink: StatusSink, runtime: Handle) -> Self {
        Self { cfg, sink, runtime }
    }

    /// Accept a launch and return its request id without waiting for the process.
    ///
    /// `Launching` is emitted before this returns; `Running` and the terminal event
    /// follow from the worker.
    pub fn launch(&self, item: &LaunchableItem) -> u64 {
        let req = ExecutionRequest {
            id: gen_request_id(),
            label: item.display_name.clone(),
            target: item.target.clone(),
            timeout: item.timeout.unwrap_or(self.cfg.timeout),
            started_at: Instant::now(),
        };
        info!(
            request_id = req.id,
            label = %req.label,
            target = %req.target.describe(),
            timeout = %humantime::format_duration(req.timeout),
            "launch accepted"
        );
        self.sink.emit(StatusUpdate::new(
            &req,
            StatusEvent::new(Phase::Launching, format!("Launching {}…", req.label)),
        ));

        let id = req.id;
        let work = {
            let req = req.clone();
            let cfg = self.cfg.clone();
            let sink = self.sink.clone();
            async move { execute(&req, &cfg, &sink).await }
        };
        // The JoinHandle is dropped on purpose: the worker reports through the sink.
        self.runtime.spawn(run_worker(req, self.sink.clone(), work));
        id
    }
}

/// Generate a random request id.
fn gen_request_id() -> u64 {
    rand::thread_rng().next_u64()
}

/// Worker boundary: whatever happens inside, exactly one terminal update leaves.
async fn run_worker<F>(req: ExecutionRequest, sink: StatusSink, work: F)
where
    F: Future<Output = Result<CapturedOutput, LaunchError>>,
{
    let result = match AssertUnwindSafe(work)
        .catch_unwind()
        .await
    {
        Ok(r) => r,
        Err(panic) => Err(LaunchError::Unexpected(outcome::panic_message(
            panic.as_ref(),
        ))),
    };

    let update = outcome::terminal_update(&req, result);
    match update.phase() {
        Phase::Succeeded => info!(
            request_id = req.id,
            elapsed_ms = update.elapsed_ms,
            "{}",
            update.event.message
        ),
        _ => warn!(
            request_id = req.id,
            elapsed_ms = update.elapsed_ms,
            phase = ?update.phase(),
            "{}",
            update.event.message
        ),
    }
    if let Some(out) = update.output.as_deref() {
        debug!(
            request_id = req.id,
            stdout = %out.stdout,
            stderr = %out.stderr,
            "captured output"
        );
    }
    sink.emit(update);
}

async fn execute(
    req: &ExecutionRequest,
    cfg: &LaunchConfig,
    sink: &StatusSink,
) -> Result<CapturedOutput, LaunchError> {
    let mut cmd = command::build_command(&req.target, cfg)?;
    let mut child = cmd.spawn().map_err(|e| {
        LaunchError::from_spawn(
            e,
            command::program_name(&req.target, cfg),
            &cfg.working_dir,
        )
    })?;
    debug!(request_id = req.id, pid = ?child.id(), "child spawned");

    sink.emit(StatusUpdate::new(
        req,
        StatusEvent::new(Phase::Running, format!("Running {}…", req.label)),
    ));

    let mut stdout = PipeReader::spawn(child.stdout.take());
    let mut stderr = PipeReader::spawn(child.stderr.take());

    // Only the child's own exit counts; pipes may outlive it.
    let status = match tokio::time::timeout(req.timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            stdout.abort();
            stderr.abort();
            return Err(LaunchError::Unexpected(format!("wait failed: {e}")));
        }
        Err(_) => {
            stdout.abort();
            stderr.abort();
            if let Err(e) = child.kill().await {
                warn!(request_id = req.id, error = %e, "could not kill timed-out child");
            }
            return Err(LaunchError::Timeout(req.timeout));
        }
    };

    let (stdout, stderr) =
        futures::join!(stdout.finish(PIPE_DRAIN), stderr.finish(PIPE_DRAIN));
    let captured = CapturedOutput {
        code: status.code(),
        stdout,
        stderr,
    };
    if status.success() {
        Ok(captured)
    } else if let Some(code) = status.code() {
        Err(LaunchError::ProcessFailed {
            code,
            output: captured,
        })
    } else {
        Err(LaunchError::Signalled { output: captured })
    }
}
