//! The top-level driver: resolve, load, rewrite, reconcile, emit, build.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::builder::{self, BuildOpts};
use crate::core::{GoEnv, Program};
use crate::emitter;
use crate::loader;
use crate::reconciler;
use crate::resolver::{self, ResolveOpts};
use crate::rewriter;
use crate::util::diagnostic::suggestions;
use crate::util::fs as futil;
use crate::util::{Diagnostic, Shell, Status};

/// Options for one busybox build.
#[derive(Debug)]
pub struct BuildBusyboxOpts {
    pub env: GoEnv,
    pub resolve: ResolveOpts,
    pub patterns: Vec<String>,

    /// Where the final binary goes.
    pub output: PathBuf,

    /// Scratch directory override; a fresh temp directory when unset.
    pub gen_dir: Option<PathBuf>,

    /// Emit sources but skip the compiler.
    pub generate_only: bool,

    /// Keep the scratch tree on success.
    pub keep_sources: bool,

    /// Fail duplicate command names even when the tie-breaker could pick.
    pub strict: bool,

    /// Prefer the locally rooted copy when two commands share a name.
    pub tie_break_local: bool,

    pub build: BuildOpts,
}

/// Build one busybox binary.
///
/// The scratch tree is released on every exit path except two deliberate
/// ones: any failure preserves it for debugging, and `--keep`/`-g` preserve
/// it on success. A directory the user supplied is never deleted.
pub fn build_busybox(shell: &Arc<Shell>, opts: &BuildBusyboxOpts) -> Result<()> {
    shell.status(Status::Resolving, format!("{} patterns", opts.patterns.len()));
    let resolved = resolver::resolve(shell, &opts.env, &opts.resolve, &opts.patterns)?;

    shell.status(Status::Loading, format!("{} commands", resolved.len()));
    let loaded = loader::load_programs(shell, &opts.env, &opts.resolve.working_dir, &resolved)?;
    let programs = order_by_resolved(loaded.programs, &resolved);
    let programs = check_duplicates(shell, programs, opts.tie_break_local, opts.strict)?;

    let scratch = match &opts.gen_dir {
        Some(dir) => {
            futil::ensure_dir(dir)?;
            Scratch::Given(futil::absolutize(dir)?)
        }
        None => Scratch::Temp(
            tempfile::Builder::new()
                .prefix("bb-")
                .tempdir()
                .context("could not create busybox source directory")?,
        ),
    };

    let result = generate_and_build(shell, opts, &programs, &loaded.graph, scratch.path());
    match result {
        Err(err) => {
            let path = scratch.persist();
            shell.error(format!(
                "Preserving bb generated source directory at {} due to error",
                path.display()
            ));
            Err(err)
        }
        Ok(()) => {
            if opts.keep_sources || opts.generate_only || matches!(scratch, Scratch::Given(_)) {
                let path = scratch.persist();
                shell.note(format!("Keeping generated sources at {}", path.display()));
            }
            Ok(())
        }
    }
}

fn generate_and_build(
    shell: &Arc<Shell>,
    opts: &BuildBusyboxOpts,
    programs: &[Program],
    graph: &loader::graph::PackageGraph,
    scratch: &Path,
) -> Result<()> {
    shell.status(Status::Rewriting, format!("{} commands", programs.len()));
    let mut progress = shell.progress(programs.len() as u64, "rewriting");
    let mut jobs = Vec::new();
    for program in programs {
        let files = rewriter::rewrite_program(program, graph, emitter::REGISTRY_IMPORT)
            .with_context(|| format!("rewriting command {} failed", program.import_path))?;
        jobs.push((program, files));
        progress.inc(1);
    }
    progress.finish();

    let local = reconciler::local_modules(shell, programs, graph)?;
    let has_modules = emitter::emit_tree(shell, &opts.env, scratch, &jobs, graph, &local)?;

    let bb_dir = emitter::bb_dir(scratch);
    if opts.generate_only {
        shell.note(format!(
            "Generated source can be found in {}. `cd {} && go build` to build.",
            scratch.display(),
            bb_dir.display()
        ));
        return Ok(());
    }

    let output = futil::absolutize(&opts.output)?;
    builder::build(
        shell,
        &opts.env,
        scratch,
        &bb_dir,
        has_modules,
        &output,
        &opts.build,
    )?;
    shell.status(Status::Finished, output.display());
    Ok(())
}

enum Scratch {
    Temp(tempfile::TempDir),
    Given(PathBuf),
}

impl Scratch {
    fn path(&self) -> &Path {
        match self {
            Scratch::Temp(dir) => dir.path(),
            Scratch::Given(path) => path,
        }
    }

    /// Keep the tree on disk and return its path.
    fn persist(self) -> PathBuf {
        match self {
            Scratch::Temp(dir) => dir.into_path(),
            Scratch::Given(path) => path,
        }
    }
}

/// Put programs in the order of the resolved (sorted) location list; this
/// is the registration order in the final binary.
fn order_by_resolved(mut programs: Vec<Program>, resolved: &[String]) -> Vec<Program> {
    let position = |p: &Program| {
        resolved
            .iter()
            .position(|loc| {
                loc == &p.import_path || Path::new(loc) == p.dir
            })
            .unwrap_or(resolved.len())
    };
    programs.sort_by_key(|p| (position(p), p.import_path.clone()));
    programs
}

/// Enforce short-name uniqueness.
///
/// The default is to fail, listing every collision. With the tie-breaker
/// enabled (and strict mode off), a collision between one locally rooted
/// copy and remotely fetched copies resolves to the local one.
fn check_duplicates(
    shell: &Shell,
    programs: Vec<Program>,
    tie_break_local: bool,
    strict: bool,
) -> Result<Vec<Program>> {
    use std::collections::BTreeMap;

    let mut by_name: BTreeMap<String, Vec<Program>> = BTreeMap::new();
    let order: Vec<String> = programs.iter().map(|p| p.name.clone()).collect();
    for program in programs {
        by_name.entry(program.name.clone()).or_default().push(program);
    }

    let mut kept: BTreeMap<String, Program> = BTreeMap::new();
    for (name, mut group) in by_name {
        if group.len() == 1 {
            kept.insert(name, group.pop().expect("nonempty"));
            continue;
        }
        if tie_break_local && !strict {
            let locals: Vec<usize> = group
                .iter()
                .enumerate()
                .filter(|(_, p)| is_locally_rooted(p))
                .map(|(i, _)| i)
                .collect();
            if locals.len() == 1 {
                let chosen = group.swap_remove(locals[0]);
                for dropped in &group {
                    shell.warn(format!(
                        "dropping {} in favor of local copy {}",
                        dropped.import_path, chosen.import_path
                    ));
                }
                kept.insert(name, chosen);
                continue;
            }
        }
        let mut diagnostic = Diagnostic::error(format!(
            "failed to build with bb: found duplicate command {name}"
        ));
        for p in &group {
            diagnostic = diagnostic.with_context(format!("{} ({})", p.import_path, p.dir.display()));
        }
        diagnostic = diagnostic.with_suggestion(suggestions::DUPLICATE_COMMAND);
        bail!("{diagnostic}");
    }

    // Restore the registration order.
    let mut out = Vec::new();
    for name in order {
        if let Some(program) = kept.remove(&name) {
            out.push(program);
        }
    }
    Ok(out)
}

/// Whether a program's module is rooted in the local filesystem rather
/// than fetched into the module cache.
fn is_locally_rooted(program: &Program) -> bool {
    match &program.module {
        None => true,
        Some(m) => m.main || m.version.is_none() || m.is_replaced_local(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Analysis, Module};
    use crate::util::shell::ColorChoice;

    fn quiet_shell() -> Shell {
        Shell::from_flags(true, false, ColorChoice::Never)
    }

    fn program(name: &str, import_path: &str, version: Option<&str>) -> Program {
        Program {
            name: name.to_string(),
            import_path: import_path.to_string(),
            dir: PathBuf::from("/src").join(import_path),
            go_files: Vec::new(),
            other_files: Vec::new(),
            module: Some(Module {
                path: import_path
                    .rsplitn(3, '/')
                    .last()
                    .unwrap_or(import_path)
                    .to_string(),
                dir: PathBuf::from("/src"),
                go_mod: PathBuf::from("/src/go.mod"),
                version: version.map(|s| s.to_string()),
                main: version.is_none(),
                replace: None,
            }),
            analysis: Analysis::default(),
        }
    }

    #[test]
    fn test_duplicates_fail_by_default() {
        let programs = vec![
            program("hello", "example.com/mod5/cmd/hello", None),
            program("hello", "example.com/mod6/cmd/hello", None),
        ];
        let err = check_duplicates(&quiet_shell(), programs, false, false).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("duplicate command hello"), "{msg}");
        assert!(msg.contains("example.com/mod5/cmd/hello"), "{msg}");
        assert!(msg.contains("example.com/mod6/cmd/hello"), "{msg}");
    }

    #[test]
    fn test_tie_breaker_prefers_local() {
        let programs = vec![
            program("hello", "example.com/remote/cmd/hello", Some("v1.0.0")),
            program("hello", "example.com/local/cmd/hello", None),
        ];
        let kept = check_duplicates(&quiet_shell(), programs, true, false).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].import_path, "example.com/local/cmd/hello");
    }

    #[test]
    fn test_strict_overrides_tie_breaker() {
        let programs = vec![
            program("hello", "example.com/remote/cmd/hello", Some("v1.0.0")),
            program("hello", "example.com/local/cmd/hello", None),
        ];
        assert!(check_duplicates(&quiet_shell(), programs, true, true).is_err());
    }

    #[test]
    fn test_two_local_copies_still_fail() {
        let programs = vec![
            program("hello", "example.com/mod5/cmd/hello", None),
            program("hello", "example.com/mod6/cmd/hello", None),
        ];
        assert!(check_duplicates(&quiet_shell(), programs, true, false).is_err());
    }

    #[test]
    fn test_order_by_resolved() {
        let programs = vec![
            program("b", "example.com/m/cmd/b", None),
            program("a", "example.com/m/cmd/a", None),
        ];
        let resolved = vec![
            "example.com/m/cmd/a".to_string(),
            "example.com/m/cmd/b".to_string(),
        ];
        let ordered = order_by_resolved(programs, &resolved);
        assert_eq!(ordered[0].name, "a");
        assert_eq!(ordered[1].name, "b");
    }
}
