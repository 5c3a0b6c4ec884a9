//! Invoking the Go compiler on the generated tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::GoEnv;
use crate::util::{ProcessBuilder, Shell, Status};

/// Options forwarded to `go build`.
#[derive(Debug, Clone, Default)]
pub struct BuildOpts {
    /// Do not strip symbol tables and DWARF from the binary.
    pub no_strip: bool,

    /// Additional `-ldflags` content, appended after the strip flags.
    pub ldflags: Option<String>,

    /// Pass `-trimpath`.
    pub trimpath: bool,

    /// `-mod` value (`vendor`, `readonly`, ...).
    pub mod_flag: Option<String>,

    /// Anything else to forward verbatim.
    pub extra_args: Vec<String>,
}

/// The `go build` invocation for the synthetic bb package.
///
/// When the tree is not module-based the scratch tree itself doubles as
/// the GOPATH; that is the only way to build legacy non-module programs.
pub fn build_command(
    env: &GoEnv,
    scratch: &Path,
    bb_dir: &Path,
    has_modules: bool,
    output: &Path,
    opts: &BuildOpts,
) -> ProcessBuilder {
    let mut env = env.clone();
    if env.modules_off() || !has_modules {
        env.gopath = Some(scratch.to_path_buf());
        env.go111module = "off".to_string();
    }

    let mut ldflags = Vec::new();
    if !opts.no_strip {
        ldflags.push("-s -w".to_string());
    }
    if let Some(extra) = &opts.ldflags {
        ldflags.push(extra.clone());
    }

    let mut pb = ProcessBuilder::new(&env.go_cmd)
        .arg("build")
        .arg("-o")
        .arg(output);
    if !ldflags.is_empty() {
        pb = pb.arg("-ldflags").arg(ldflags.join(" "));
    }
    if opts.trimpath {
        pb = pb.arg("-trimpath");
    }
    if let Some(mode) = &opts.mod_flag {
        pb = pb.arg(format!("-mod={mode}"));
    }
    pb = pb.args(&opts.extra_args);
    pb.arg(".").cwd(bb_dir).envs(env.env_vars())
}

/// Compile the generated tree into the final binary.
pub fn build(
    shell: &Shell,
    env: &GoEnv,
    scratch: &Path,
    bb_dir: &Path,
    has_modules: bool,
    output: &Path,
    opts: &BuildOpts,
) -> Result<PathBuf> {
    shell.status(Status::Building, output.display());
    let cmd = build_command(env, scratch, bb_dir, has_modules, output, opts);
    cmd.exec_and_check().context("go build failed")?;
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> GoEnv {
        GoEnv {
            go_cmd: PathBuf::from("/usr/bin/go"),
            goos: "linux".into(),
            goarch: "amd64".into(),
            build_tags: vec![],
            go111module: "on".into(),
            cgo_enabled: false,
            gopath: None,
        }
    }

    #[test]
    fn test_build_command_defaults() {
        let cmd = build_command(
            &env(),
            Path::new("/tmp/scratch"),
            Path::new("/tmp/scratch/src/gobb.invalid/bb"),
            true,
            Path::new("/out/bb"),
            &BuildOpts::default(),
        );
        let args = cmd.get_args();
        assert_eq!(args[0], "build");
        assert!(args.contains(&"-ldflags".to_string()));
        assert!(args.contains(&"-s -w".to_string()));
        assert_eq!(args.last().unwrap(), ".");
        assert_eq!(
            cmd.get_cwd(),
            Some(Path::new("/tmp/scratch/src/gobb.invalid/bb"))
        );
        // Module build: no GOPATH override.
        assert!(!cmd.get_env().contains_key("GOPATH"));
    }

    #[test]
    fn test_build_command_legacy_gopath() {
        let cmd = build_command(
            &env(),
            Path::new("/tmp/scratch"),
            Path::new("/tmp/scratch/src/gobb.invalid/bb"),
            false,
            Path::new("/out/bb"),
            &BuildOpts::default(),
        );
        assert_eq!(
            cmd.get_env().get("GOPATH").map(String::as_str),
            Some("/tmp/scratch")
        );
        assert_eq!(
            cmd.get_env().get("GO111MODULE").map(String::as_str),
            Some("off")
        );
    }

    #[test]
    fn test_build_command_forwards_options() {
        let opts = BuildOpts {
            no_strip: true,
            ldflags: Some("-X main.version=1".to_string()),
            trimpath: true,
            mod_flag: Some("vendor".to_string()),
            extra_args: vec!["-gcflags=all=-N".to_string()],
        };
        let cmd = build_command(
            &env(),
            Path::new("/s"),
            Path::new("/s/src/gobb.invalid/bb"),
            true,
            Path::new("/out/bb"),
            &opts,
        );
        let args = cmd.get_args().join(" ");
        assert!(args.contains("-ldflags -X main.version=1"));
        assert!(!args.contains("-s -w"));
        assert!(args.contains("-trimpath"));
        assert!(args.contains("-mod=vendor"));
        assert!(args.contains("-gcflags=all=-N"));
    }

    #[test]
    fn test_cross_compile_env_forwarded() {
        let mut e = env();
        e.goarch = "arm64".to_string();
        let cmd = build_command(
            &e,
            Path::new("/s"),
            Path::new("/s/bb"),
            true,
            Path::new("/out/bb"),
            &BuildOpts::default(),
        );
        assert_eq!(
            cmd.get_env().get("GOARCH").map(String::as_str),
            Some("arm64")
        );
    }
}
