use super::outcome::LaunchError;
use crate::model::{InvocationTarget, LaunchConfig};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Build the child process for a target. Nothing is spawned here.
pub(crate) fn build_command(
    target: &InvocationTarget,
    cfg: &LaunchConfig,
) -> Result<Command, LaunchError> {
    let mut cmd = match target {
        InvocationTarget::Module { module } => {
            let mut c = Command::new(&cfg.interpreter);
            c.arg("-m").arg(module);
            c
        }
        InvocationTarget::Script { path } => {
            let resolved = if path.is_absolute() {
                path.clone()
            } else {
                cfg.working_dir.join(path)
            };
            if !resolved.is_file() {
                return Err(LaunchError::TargetNotFound {
                    target: resolved.display().to_string(),
                });
            }
            let mut c = Command::new(&cfg.interpreter);
            c.arg(resolved);
            c
        }
        InvocationTarget::Program { program, args } => {
            let mut c = Command::new(program);
            c.args(args);
            c
        }
        InvocationTarget::Open { target } => opener_command(cfg.opener.as_deref(), target),
    };

    cmd.current_dir(&cfg.working_dir).stdin(Stdio::null());
    // Openers hand off to a long-lived handler that would inherit the pipes.
    if captures_output(target) {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }
    // Not killed on drop, so a launch outlives a launcher that quits first.
    Ok(cmd)
}

fn captures_output(target: &InvocationTarget) -> bool {
    !matches!(target, InvocationTarget::Open { .. })
}

/// The program that would be spawned for a target, for "not found" reporting.
pub(crate) fn program_name<'a>(target: &'a InvocationTarget, cfg: &'a LaunchConfig) -> &'a str {
    match target {
        InvocationTarget::Module { .. } | InvocationTarget::Script { .. } => &cfg.interpreter,
        InvocationTarget::Program { program, .. } => program,
        InvocationTarget::Open { .. } => cfg.opener.as_deref().unwrap_or(default_opener()),
    }
}

fn opener_command(custom: Option<&str>, target: &str) -> Command {
    if let Some(opener) = custom {
        let mut c = Command::new(opener);
        c.arg(target);
        return c;
    }
    if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        // Empty title argument so quoted targets are not taken as the window title.
        c.args(["/C", "start", ""]).arg(target);
        c
    } else {
        let mut c = Command::new(default_opener());
        c.arg(target);
        c
    }
}

fn default_opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "cmd"
    } else {
        "xdg-open"
    }
}

/// True when `dir` is usable as a working directory.
pub(crate) fn working_dir_ok(dir: &Path) -> bool {
    dir.is_dir()
}
