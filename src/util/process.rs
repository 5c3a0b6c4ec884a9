//! Subprocess execution utilities.
//!
//! Every external tool gobb drives (`go list`, `go build`, `gofmt`, the
//! type-analysis helper) goes through [`ProcessBuilder`] so invocations are
//! loggable and error messages carry the full command line.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{bail, Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    // BTreeMap keeps the spawned environment deterministic across runs.
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set several environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (k, v) in vars {
            self.env
                .insert(k.as_ref().to_string(), v.as_ref().to_string());
        }
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the working directory, if one was set.
    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Get the extra environment.
    pub fn get_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// The call blocks until the subprocess exits; gobb imposes no timeout
    /// (callers wanting cancellation must kill the process tree).
    pub fn exec(&self) -> Result<Output> {
        tracing::debug!(cmd = %self.display_command(), "running subprocess");
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;
        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;
        Ok(output)
    }

    /// Execute and require success; on failure the error carries the
    /// subprocess's own stderr.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` failed with exit code {:?}\n{}",
                self.display_command(),
                output.status.code(),
                stderr.trim_end()
            );
        }
        Ok(output)
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find the Go compiler: `GOBB_GO`, then `go` in PATH.
pub fn find_go() -> Option<PathBuf> {
    if let Ok(go) = std::env::var("GOBB_GO") {
        if let Some(path) = find_executable(&go) {
            return Some(path);
        }
    }
    find_executable("go")
}

/// Find the canonical formatter. Prefers the `gofmt` that lives next to the
/// configured `go` binary so formatter and compiler versions agree.
pub fn find_gofmt(go_cmd: &Path) -> Option<PathBuf> {
    if let Some(dir) = go_cmd.parent() {
        let sibling = dir.join("gofmt");
        if sibling.is_file() {
            return Some(sibling);
        }
    }
    find_executable("gofmt")
}

/// Find the type-analysis helper: `GOBB_INSPECT`, then `gobb-inspect`.
pub fn find_inspector() -> Option<PathBuf> {
    if let Ok(tool) = std::env::var("GOBB_INSPECT") {
        if let Some(path) = find_executable(&tool) {
            return Some(path);
        }
        let path = PathBuf::from(tool);
        if path.is_file() {
            return Some(path);
        }
    }
    find_executable("gobb-inspect")
}
