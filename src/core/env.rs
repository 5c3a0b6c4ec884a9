//! The host Go build environment.
//!
//! A [`GoEnv`] captures everything gobb forwards to the toolchain
//! subprocesses: target OS and architecture, build tags, module mode, and
//! the compiler binary itself. It is read once from the process environment
//! and then only overridden by CLI flags, so every subprocess sees the same
//! world.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::util::process;

/// The Go build environment forwarded to every toolchain subprocess.
#[derive(Debug, Clone)]
pub struct GoEnv {
    /// Path to the `go` binary.
    pub go_cmd: PathBuf,

    /// Target operating system (`GOOS`).
    pub goos: String,

    /// Target architecture (`GOARCH`).
    pub goarch: String,

    /// Additional build tags (`-tags`).
    pub build_tags: Vec<String>,

    /// Module mode: `on`, `off`, or `auto` (`GO111MODULE`).
    pub go111module: String,

    /// Whether cgo is enabled. gobb disables it by default; merged binaries
    /// are meant to be static.
    pub cgo_enabled: bool,

    /// `GOPATH` override, if any. The builder sets this to the scratch tree
    /// for legacy non-module builds.
    pub gopath: Option<PathBuf>,
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

impl GoEnv {
    /// Build the default environment from the process environment.
    ///
    /// Fails only when no Go compiler can be located; everything else has a
    /// usable default.
    pub fn detect() -> Result<Self> {
        let go_cmd = process::find_go()
            .context("could not find a Go compiler (`go` in PATH, or set GOBB_GO)")?;
        Ok(GoEnv {
            go_cmd,
            goos: env_or("GOOS", current_goos()),
            goarch: env_or("GOARCH", current_goarch()),
            build_tags: Vec::new(),
            go111module: env_or("GO111MODULE", "auto"),
            cgo_enabled: false,
            gopath: std::env::var_os("GOPATH").map(PathBuf::from),
        })
    }

    /// Environment variable pairs for a toolchain subprocess.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            ("GOOS".to_string(), self.goos.clone()),
            ("GOARCH".to_string(), self.goarch.clone()),
            ("GO111MODULE".to_string(), self.go111module.clone()),
            (
                "CGO_ENABLED".to_string(),
                if self.cgo_enabled { "1" } else { "0" }.to_string(),
            ),
        ];
        if let Some(gopath) = &self.gopath {
            vars.push(("GOPATH".to_string(), gopath.display().to_string()));
        }
        if !self.build_tags.is_empty() {
            vars.push(("GOFLAGS".to_string(), format!("-tags={}", self.build_tags.join(","))));
        }
        vars
    }

    /// Whether modules are explicitly disabled.
    pub fn modules_off(&self) -> bool {
        self.go111module == "off"
    }
}

impl fmt::Display for GoEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GOOS={} GOARCH={} GO111MODULE={} CGO_ENABLED={}",
            self.goos,
            self.goarch,
            self.go111module,
            if self.cgo_enabled { 1 } else { 0 }
        )?;
        if !self.build_tags.is_empty() {
            write!(f, " tags={}", self.build_tags.join(","))?;
        }
        Ok(())
    }
}

fn current_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn current_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "arm" => "arm",
        "riscv64" => "riscv64",
        other => other,
    }
}
