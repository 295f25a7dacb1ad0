//! Go toolchain invocations.
//!
//! Every external step is described as a [`ToolCommand`] and executed through
//! a [`ToolRunner`], so the ordering and fail-fast behavior of the pipeline
//! can be exercised without a Go installation.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Environment forced on every Go invocation.
pub const MODULE_MODE: (&str, &str) = ("GO111MODULE", "on");

/// One external process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub dir: PathBuf,
    pub envs: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: dir.into(),
            envs: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Human-readable command line, e.g. `go mod download`.
    pub fn label(&self) -> String {
        let program = self
            .program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string());
        std::iter::once(program)
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.dir);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }
}

/// Outcome of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Stdout followed by stderr. Empty for interactive runs.
    pub combined: String,
}

/// Executes tool commands.
pub trait ToolRunner: Send + Sync {
    /// Run to completion capturing stdout and stderr.
    fn capture(&self, cmd: &ToolCommand) -> io::Result<ToolOutput>;

    /// Run to completion with stdout and stderr connected to ours.
    fn interactive(&self, cmd: &ToolCommand) -> io::Result<ToolOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn capture(&self, cmd: &ToolCommand) -> io::Result<ToolOutput> {
        let output = cmd.to_command().stdin(Stdio::null()).output()?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            combined,
        })
    }

    fn interactive(&self, cmd: &ToolCommand) -> io::Result<ToolOutput> {
        let status = cmd
            .to_command()
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;

        Ok(ToolOutput {
            success: status.success(),
            code: status.code(),
            combined: String::new(),
        })
    }
}

/// Run `steps` in order, stopping at the first failure.
///
/// `fail` turns the failing step and its output (or spawn error) into the
/// caller's error kind.
pub fn run_steps(
    runner: &dyn ToolRunner,
    steps: &[ToolCommand],
    fail: impl Fn(&ToolCommand, String) -> Error,
) -> Result<()> {
    for step in steps {
        tracing::debug!("running `{}` in {}", step.label(), step.dir.display());
        let output = runner
            .capture(step)
            .map_err(|e| fail(step, format!("failed to start `{}`: {e}", step.label())))?;
        if !output.success {
            return Err(fail(step, output.combined));
        }
    }
    Ok(())
}

/// Builds the Go commands of the pipeline.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    go: PathBuf,
}

impl GoToolchain {
    /// Use `go` from PATH.
    pub fn detect() -> Self {
        let go = which::which("go").unwrap_or_else(|_| {
            tracing::warn!("go not found in PATH, invoking `go` as is");
            PathBuf::from("go")
        });
        Self { go }
    }

    /// Use a specific `go` executable.
    pub fn with_go(go: impl Into<PathBuf>) -> Self {
        Self { go: go.into() }
    }

    fn go(&self, dir: &Path) -> ToolCommand {
        module_mode(ToolCommand::new(&self.go, dir))
    }

    /// Foreground invocation of a built artifact from `dir`.
    pub fn run_artifact(&self, target: &Path, dir: &Path) -> ToolCommand {
        module_mode(ToolCommand::new(target, dir))
    }

    pub fn mod_init(&self, dir: &Path, module: &str) -> ToolCommand {
        self.go(dir).args(["mod", "init", module])
    }

    pub fn get_latest(&self, dir: &Path, module: &str) -> ToolCommand {
        self.go(dir).args(["get", "-u", module])
    }

    pub fn mod_download(&self, dir: &Path) -> ToolCommand {
        self.go(dir).args(["mod", "download"])
    }

    /// Size-reduced build of `source` into `target`.
    pub fn build(&self, dir: &Path, target: &Path, source: &Path) -> ToolCommand {
        self.go(dir).args([
            "build".to_string(),
            "-ldflags".to_string(),
            "-s -w".to_string(),
            "-o".to_string(),
            target.display().to_string(),
            source.display().to_string(),
        ])
    }
}

fn module_mode(cmd: ToolCommand) -> ToolCommand {
    cmd.env(MODULE_MODE.0, MODULE_MODE.1)
}
