use crate::engine::{working_dir_ok, LaunchEngine};
use crate::model::{LaunchConfig, Phase};
use crate::registry::{self, ConfigError, Registry};
use crate::status;
use anyhow::{Context, Result};
use clap::Parser;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "script-launcher",
    version,
    about = "Terminal menu for launching categorized scripts"
)]
pub struct Cli {
    /// Script registry as JSON: {"category": [{"name": "...", "module": "..."}]}
    #[arg(long, env = "SCRIPTS_LIST", hide_env_values = true)]
    pub scripts_list: Option<String>,

    /// Read the script registry from a JSON file (takes precedence over SCRIPTS_LIST)
    #[arg(long)]
    pub registry_file: Option<PathBuf>,

    /// Default time limit for each launch
    #[arg(long, default_value = "60s")]
    pub timeout: humantime::Duration,

    /// Interpreter used for "module" and "path" entries
    #[arg(long, default_value = "python3")]
    pub interpreter: String,

    /// Working directory for launched processes (defaults to the current directory)
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Program used for "open" entries instead of the platform default
    #[arg(long)]
    pub opener: Option<String>,

    /// Print the configured categories and scripts, then exit (no TUI)
    #[arg(long)]
    pub list: bool,

    /// Launch a single script and wait for it, then exit (no TUI)
    #[arg(long, value_name = "CATEGORY/NAME")]
    pub launch: Option<String>,

    /// Print JSON instead of text (with --list or --launch)
    #[arg(long)]
    pub json: bool,

    /// Write logs here instead of the default data directory
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Load environment variables (such as SCRIPTS_LIST) from this file instead of .env
    #[arg(long)]
    pub env_file: Option<PathBuf>,
}

impl Cli {
    pub fn is_headless(&self) -> bool {
        self.list || self.launch.is_some()
    }
}

/// Pick `--env-file` out of raw arguments. The file has to be loaded before clap
/// parses, since it feeds the `env` fallbacks.
pub fn env_file_arg<I, S>(argv: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut args = argv.into_iter().map(Into::into);
    while let Some(arg) = args.next() {
        if arg == "--" {
            break;
        }
        if arg == "--env-file" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.to_str().and_then(|a| a.strip_prefix("--env-file=")) {
            return Some(PathBuf::from(path));
        }
    }
    None
}

/// Load variables from `explicit`, or from a `.env` in the current directory or
/// its parents. Variables already set in the environment win. A missing default
/// `.env` is fine; a missing explicit file is an error.
pub fn load_env_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("load env file {}", path.display()))?;
            Ok(Some(path.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("load .env")),
        },
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && !args.is_headless() {
        return Err(anyhow::anyhow!(
            "--json can only be used with --list or --launch."
        ));
    }
    if args.list && args.launch.is_some() {
        return Err(anyhow::anyhow!("--list and --launch cannot be combined."));
    }

    let (registry, config_err) = load_registry(&args);

    if let Some(selector) = args.launch.as_deref() {
        return run_launch(&args, selector, &registry, config_err).await;
    }
    if args.list {
        return run_list(&args, &registry, config_err.as_ref()).await;
    }

    #[cfg(feature = "tui")]
    {
        return crate::tui::run(args, registry, config_err).await;
    }
    #[cfg(not(feature = "tui"))]
    {
        // Fallback when built without TUI support.
        run_list(&args, &registry, config_err.as_ref()).await
    }
}

/// Resolve and parse the registry, degrading to an empty one on any error.
pub fn load_registry(args: &Cli) -> (Registry, Option<ConfigError>) {
    match registry::read_source(args.registry_file.as_deref(), args.scripts_list.as_deref()) {
        Ok(payload) => Registry::load(payload.as_deref()),
        Err(e) => {
            tracing::warn!(error = %e, "registry source unreadable");
            (Registry::empty(), Some(e))
        }
    }
}

/// Build a `LaunchConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<LaunchConfig> {
    let timeout = Duration::from(args.timeout);
    if timeout.is_zero() {
        return Err(anyhow::anyhow!("--timeout must be greater than zero"));
    }
    let working_dir = match args.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("resolve current directory")?,
    };
    if !working_dir_ok(&working_dir) {
        return Err(anyhow::anyhow!(
            "working directory {} does not exist",
            working_dir.display()
        ));
    }
    Ok(LaunchConfig {
        timeout,
        interpreter: args.interpreter.clone(),
        working_dir,
        opener: args.opener.clone(),
    })
}

/// Split `CATEGORY/NAME`. Names may themselves contain `/`.
fn parse_selector(selector: &str) -> Result<(&str, &str)> {
    let (category, name) = selector
        .split_once('/')
        .context("expected CATEGORY/NAME, e.g. study/Current course")?;
    let (category, name) = (category.trim(), name.trim());
    if category.is_empty() || name.is_empty() {
        return Err(anyhow::anyhow!(
            "expected CATEGORY/NAME, got '{selector}'"
        ));
    }
    Ok((category, name))
}

async fn run_list(args: &Cli, registry: &Registry, config_err: Option<&ConfigError>) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();
    if let Some(e) = config_err {
        let _ = out_tx.send(OutputLine::Stderr(format!("Configuration error: {e}")));
    }
    if args.json {
        let out = serde_json::to_string_pretty(&crate::text_summary::listing_json(registry))?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        for line in crate::text_summary::build_listing(registry).lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

async fn run_launch(
    args: &Cli,
    selector: &str,
    registry: &Registry,
    config_err: Option<ConfigError>,
) -> Result<()> {
    if let Some(e) = config_err {
        return Err(anyhow::Error::new(e).context("no scripts available to launch"));
    }
    let (category, name) = parse_selector(selector)?;
    let item = registry
        .find(category, name)
        .with_context(|| format!("no script named '{name}' in category '{category}'"))?;

    let cfg = Arc::new(build_config(args)?);
    let (sink, mut slot) = status::channel();
    let engine = LaunchEngine::new(cfg, sink, Handle::current());
    let (out_tx, out_handle) = spawn_output_writer();

    engine.launch(item);
    // Only the worker holds a sink now, so recv() ends with it.
    drop(engine);

    while let Some(update) = slot.recv().await {
        if args.json {
            let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string(&update)?));
        } else {
            let _ = out_tx.send(OutputLine::Stderr(format!(
                "== {:?} == {}",
                update.phase(),
                update.event.message
            )));
            if let Some(output) = update.output.as_deref() {
                if !output.stdout.trim().is_empty() {
                    let _ = out_tx.send(OutputLine::Stdout(output.stdout.trim_end().to_string()));
                }
                if !output.stderr.trim().is_empty() {
                    let _ = out_tx.send(OutputLine::Stderr(output.stderr.trim_end().to_string()));
                }
            }
        }
        if update.phase().is_terminal() {
            break;
        }
    }

    drop(out_tx);
    let _ = out_handle.await;

    // The slot holds the last update seen, which is the terminal one unless the
    // worker vanished.
    match slot.current() {
        Some(u) if u.phase() == Phase::Succeeded => Ok(()),
        Some(u) if u.phase().is_terminal() => Err(anyhow::anyhow!(u.event.message.clone())),
        _ => Err(anyhow::anyhow!("launch ended without a result")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("script-launcher").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn selector_splits_on_first_slash() {
        assert_eq!(
            parse_selector("study/Current course").unwrap(),
            ("study", "Current course")
        );
        assert_eq!(
            parse_selector("coding/Open a/b").unwrap(),
            ("coding", "Open a/b")
        );
        assert!(parse_selector("study").is_err());
        assert!(parse_selector("/Notes").is_err());
        assert!(parse_selector("study/ ").is_err());
    }

    #[test]
    fn config_defaults_to_sixty_seconds() {
        let args = parse(&["--list"]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.timeout, Duration::from_secs(60));
        assert_eq!(cfg.interpreter, "python3");
        assert!(cfg.working_dir.is_dir());
    }

    #[test]
    fn config_rejects_zero_timeout_and_missing_dir() {
        assert!(build_config(&parse(&["--timeout", "0s"])).is_err());
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        let gone = gone.to_str().unwrap();
        assert!(build_config(&parse(&["--working-dir", gone])).is_err());
    }

    #[test]
    fn inline_payload_feeds_the_registry() {
        let args = parse(&[
            "--scripts-list",
            r#"{"morning": [{"name": "Websites", "module": "scripts_list.daily_websites"}]}"#,
        ]);
        let (reg, err) = load_registry(&args);
        assert!(err.is_none());
        assert_eq!(reg.categories("morning").len(), 1);
    }

    #[test]
    fn broken_payload_still_yields_a_registry() {
        let args = parse(&["--scripts-list", "{oops"]);
        let (reg, err) = load_registry(&args);
        assert!(matches!(err, Some(ConfigError::Json(_))));
        assert!(reg.categories("morning").is_empty());
    }

    #[test]
    fn env_file_is_found_before_parsing() {
        let argv = ["script-launcher", "--list", "--env-file", "conf/launcher.env"];
        assert_eq!(env_file_arg(argv), Some(PathBuf::from("conf/launcher.env")));
        assert_eq!(
            env_file_arg(argv),
            Cli::try_parse_from(argv).unwrap().env_file
        );
        assert_eq!(
            env_file_arg(["script-launcher", "--env-file=a.env"]),
            Some(PathBuf::from("a.env"))
        );
        assert_eq!(env_file_arg(["script-launcher", "--list"]), None);
        assert_eq!(env_file_arg(["script-launcher", "--", "--env-file", "x"]), None);
    }

    #[test]
    fn env_file_sets_variables_without_overriding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.env");
        std::fs::write(
            &path,
            "SCRIPT_LAUNCHER_ENV_TEST_LIST='{\"study\": []}'\nSCRIPT_LAUNCHER_ENV_TEST_KEEP=file\n",
        )
        .unwrap();
        std::env::set_var("SCRIPT_LAUNCHER_ENV_TEST_KEEP", "process");

        assert_eq!(load_env_file(Some(&path)).unwrap(), Some(path.clone()));
        assert_eq!(
            std::env::var("SCRIPT_LAUNCHER_ENV_TEST_LIST").unwrap(),
            r#"{"study": []}"#
        );
        assert_eq!(
            std::env::var("SCRIPT_LAUNCHER_ENV_TEST_KEEP").unwrap(),
            "process"
        );
    }

    #[test]
    fn missing_explicit_env_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_env_file(Some(&dir.path().join("absent.env"))).unwrap_err();
        assert!(err.to_string().contains("absent.env"));
    }

    #[tokio::test]
    async fn json_requires_headless_mode() {
        let err = run(parse(&["--json", "--scripts-list", "{}"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--json"));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn headless_launch_reports_failure_as_error() {
        let payload = r#"{"coding": [
            {"name": "ok", "program": "true"},
            {"name": "bad", "program": "false"}
        ]}"#;
        assert!(run(parse(&["--scripts-list", payload, "--launch", "coding/ok"]))
            .await
            .is_ok());
        let err = run(parse(&["--scripts-list", payload, "--launch", "coding/bad"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exit code 1"));
        let err = run(parse(&["--scripts-list", payload, "--launch", "coding/nope"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no script named 'nope'"));
    }
}
