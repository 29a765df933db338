use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Engine-wide settings, built once from CLI arguments and shared by reference.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub timeout: Duration,
    pub interpreter: String,
    pub working_dir: PathBuf,
    pub opener: Option<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            interpreter: "python3".into(),
            working_dir: PathBuf::from("."),
            opener: None,
        }
    }
}

/// What to run (or open) when an item is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationTarget {
    /// `<interpreter> -m <module>`
    Module { module: String },
    /// `<interpreter> <path>`
    Script { path: PathBuf },
    /// An executable run directly.
    Program { program: String, args: Vec<String> },
    /// A file, directory or URL handed to the OS default handler.
    Open { target: String },
}

impl InvocationTarget {
    /// Short human-readable description, used in listings and logs.
    pub fn describe(&self) -> String {
        match self {
            InvocationTarget::Module { module } => format!("module {module}"),
            InvocationTarget::Script { path } => format!("script {}", path.display()),
            InvocationTarget::Program { program, args } if args.is_empty() => {
                format!("program {program}")
            }
            InvocationTarget::Program { program, args } => {
                format!("program {program} {}", args.join(" "))
            }
            InvocationTarget::Open { target } => format!("open {target}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchableItem {
    pub display_name: String,
    pub target: InvocationTarget,
    /// Overrides `LaunchConfig::timeout` for this item.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

/// One accepted launch. Lives only as long as its worker.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub id: u64,
    pub label: String,
    pub target: InvocationTarget,
    pub timeout: Duration,
    pub started_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Launching,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed | Phase::TimedOut)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub phase: Phase,
    pub message: String,
}

impl StatusEvent {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }
}

/// Output captured from a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// A status event together with the request it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub request_id: u64,
    pub label: String,
    pub at: String,
    pub elapsed_ms: u64,
    pub event: StatusEvent,
    // Terminal events only; Box keeps the envelope small on the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Box<CapturedOutput>>,
}

impl StatusUpdate {
    pub fn new(req: &ExecutionRequest, event: StatusEvent) -> Self {
        Self {
            request_id: req.id,
            label: req.label.clone(),
            at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            elapsed_ms: req.started_at.elapsed().as_millis() as u64,
            event,
            output: None,
        }
    }

    pub fn with_output(mut self, output: CapturedOutput) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    pub fn phase(&self) -> Phase {
        self.event.phase
    }
}
