// src/shell.rs

//! Subprocess capability
//!
//! Every external program kiln runs (platform tool queries, `sh -c` build
//! steps, `tar`) goes through [`Shell`], which wraps a [`ProcessRunner`].
//! The runner is a trait so tests can substitute canned output for real
//! processes.
//!
//! Behaviour per call is chosen with [`RunFlags`]:
//!
//! - `ABORT`: a non-zero exit is an [`Error::CommandFailed`]; without it the
//!   call yields `None`, which is how optional tools are probed
//! - `STRIP`: trailing whitespace is trimmed from stdout
//! - `JSON`: stdout must parse as JSON
//! - `MIRROR`: captured output is echoed to the log line by line

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info};

bitflags::bitflags! {
    /// Behaviour flags for a single subprocess call
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RunFlags: u8 {
        /// Non-zero exit is an error
        const ABORT = 0b0001;
        /// Trim trailing whitespace from stdout
        const STRIP = 0b0010;
        /// Parse stdout as JSON
        const JSON = 0b0100;
        /// Echo captured output to the log
        const MIRROR = 0b1000;
        /// Default policy for tool queries
        const DEFAULT = Self::ABORT.bits() | Self::STRIP.bits();
    }
}

impl Default for RunFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A fully described program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Complete child environment; `None` inherits the parent's
    pub env: Option<BTreeMap<String, String>>,
}

impl Invocation {
    pub fn new<S: AsRef<str>>(program: &str, args: &[S]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            cwd: None,
            env: None,
        }
    }

    pub fn with_cwd(mut self, cwd: &Path) -> Self {
        self.cwd = Some(cwd.to_path_buf());
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Human readable command line for logs and errors
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
}

impl RawOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Something that can run a program to completion
pub trait ProcessRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<RawOutput>;

    /// Locate an executable on the host `PATH`
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        which::which(tool).ok()
    }
}

/// Runs real processes with `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<RawOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);

        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(env) = &invocation.env {
            cmd.env_clear().envs(env);
        }

        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("program '{}'", invocation.program))
            } else {
                Error::io(format!("Failed to run {}", invocation.program), e)
            }
        })?;

        Ok(RawOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        })
    }
}

/// Front end over a [`ProcessRunner`] applying [`RunFlags`]
#[derive(Clone)]
pub struct Shell {
    runner: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell").finish_non_exhaustive()
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::system()
    }
}

impl Shell {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    /// Shell backed by real processes
    pub fn system() -> Self {
        Self::new(Arc::new(SystemRunner))
    }

    /// Run `program` with the inherited environment
    pub fn run<S: AsRef<str>>(
        &self,
        program: &str,
        args: &[S],
        flags: RunFlags,
    ) -> Result<Option<String>> {
        self.execute(&Invocation::new(program, args), flags)
    }

    /// Run `program` in `cwd` with exactly the variables in `env`
    pub fn run_in<S: AsRef<str>>(
        &self,
        program: &str,
        args: &[S],
        cwd: &Path,
        env: &BTreeMap<String, String>,
        flags: RunFlags,
    ) -> Result<Option<String>> {
        let invocation = Invocation::new(program, args)
            .with_cwd(cwd)
            .with_env(env.clone());
        self.execute(&invocation, flags)
    }

    /// Run `program` and parse its stdout as JSON
    pub fn run_json<S: AsRef<str>>(
        &self,
        program: &str,
        args: &[S],
        flags: RunFlags,
    ) -> Result<Option<Value>> {
        let invocation = Invocation::new(program, args);
        Ok(self
            .capture(&invocation, flags | RunFlags::JSON)?
            .and_then(|(_, json)| json))
    }

    /// Locate an executable on the host `PATH`
    pub fn which(&self, tool: &str) -> Option<PathBuf> {
        self.runner.locate(tool)
    }

    pub fn execute(&self, invocation: &Invocation, flags: RunFlags) -> Result<Option<String>> {
        Ok(self.capture(invocation, flags)?.map(|(stdout, _)| stdout))
    }

    /// Run `invocation`, returning stdout and, with `JSON`, its parsed value
    fn capture(
        &self,
        invocation: &Invocation,
        flags: RunFlags,
    ) -> Result<Option<(String, Option<Value>)>> {
        debug!("running: {}", invocation.command_line());
        let output = self.runner.run(invocation)?;

        if flags.contains(RunFlags::MIRROR) {
            for line in output.stdout.lines() {
                info!("out> {}", line);
            }
            for line in output.stderr.lines() {
                info!("err> {}", line);
            }
        }

        if !output.success() {
            if flags.contains(RunFlags::ABORT) {
                return Err(Error::CommandFailed {
                    command: invocation.command_line(),
                    stdout: output.stdout,
                    stderr: output.stderr,
                    code: output.code,
                });
            }
            debug!(
                "{} exited with {:?}, ignoring",
                invocation.program, output.code
            );
            return Ok(None);
        }

        let stdout = if flags.contains(RunFlags::STRIP) {
            output.stdout.trim_end().to_string()
        } else {
            output.stdout
        };

        let json = if flags.contains(RunFlags::JSON) {
            let value = serde_json::from_str::<Value>(&stdout).map_err(|e| {
                Error::ParseError(format!(
                    "{} did not print JSON: {}",
                    invocation.command_line(),
                    e
                ))
            })?;
            Some(value)
        } else {
            None
        };

        Ok(Some((stdout, json)))
    }
}
