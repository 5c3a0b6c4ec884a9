//! Loading of fully populated program records.
//!
//! There is a big difference between `go list ./foobar` run from here and
//! `go list .` run from inside `foobar`: the working directory decides
//! which `go.mod` governs the query. Every package must be loaded under its
//! own module, so filesystem paths are grouped by module root and each
//! group is queried in one batch from that root. Batching is the single
//! biggest performance lever in the pipeline; one query per package costs
//! minutes on a few dozen commands.

pub mod golist;
pub mod graph;
pub mod inspect;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::{Analysis, GoEnv, Program};
use crate::util::fs as futil;
use crate::util::{Shell, Status};
use graph::PackageGraph;

/// The loader's result: programs to rewrite plus the package universe they
/// live in.
#[derive(Debug)]
pub struct Loaded {
    pub programs: Vec<Program>,
    pub graph: PackageGraph,
}

/// Group directories by module root: the nearest ancestor directory that
/// contains a `go.mod`. Directories without one form the second, "no
/// module" group.
pub fn group_by_module(paths: &[PathBuf]) -> (BTreeMap<PathBuf, Vec<PathBuf>>, Vec<PathBuf>) {
    let mut grouped: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    let mut no_module = Vec::new();
    for path in paths {
        let mut ancestor = Some(path.as_path());
        let mut root = None;
        while let Some(dir) = ancestor {
            if dir.join("go.mod").is_file() {
                root = Some(dir.to_path_buf());
                break;
            }
            ancestor = dir.parent();
        }
        match root {
            Some(root) => grouped.entry(root).or_default().push(path.clone()),
            None => no_module.push(path.clone()),
        }
    }
    (grouped, no_module)
}

/// Load full program records for every resolved location.
///
/// `names` is the resolver's output: absolute directories and/or normalized
/// import paths. Packages that turn out not to be buildable commands are
/// skipped with a warning; metadata or type-check failures are fatal.
pub fn load_programs(
    shell: &Shell,
    env: &GoEnv,
    working_dir: &Path,
    names: &[String],
) -> Result<Loaded> {
    let mut import_paths = Vec::new();
    let mut fs_paths = Vec::new();
    for name in names {
        if name.starts_with('.') || name.starts_with('/') {
            fs_paths.push(futil::absolutize(Path::new(name))?);
        } else if Path::new(name).exists() {
            fs_paths.push(futil::absolutize(Path::new(name))?);
        } else {
            import_paths.push(name.clone());
        }
    }

    let mut all_packages = Vec::new();
    let mut mains = Vec::new();
    let mut analyses: BTreeMap<String, Analysis> = BTreeMap::new();

    let mut load_batch = |base: &Path, patterns: &[String]| -> Result<()> {
        let pkgs = golist::list_deps(env, base, patterns)
            .with_context(|| format!("could not find packages in {}", base.display()))?;

        let mut batch_mains = Vec::new();
        for p in &pkgs {
            if is_requested(p, base, patterns) && keep_package(shell, p)? {
                batch_mains.push(p.import_path.clone());
            }
        }

        if !batch_mains.is_empty() {
            for report in inspect::analyze(env, base, patterns)? {
                analyses.insert(report.import_path.clone(), report.into_analysis());
            }
        }

        mains.extend(batch_mains);
        all_packages.extend(pkgs);
        Ok(())
    };

    if !import_paths.is_empty() {
        load_batch(working_dir, &import_paths)
            .with_context(|| format!("failed to load packages {:?}", import_paths))?;
    }

    let (grouped, no_module) = group_by_module(&fs_paths);
    for (module_dir, dirs) in grouped {
        let patterns = relative_patterns(&module_dir, &dirs)?;
        load_batch(&module_dir, &patterns)?;
    }
    if let Some(first) = no_module.first() {
        // Any directory without a go.mod in its parent chain will do as the
        // query root for the whole group.
        let base = first.clone();
        let patterns = relative_patterns(&base, &no_module)?;
        load_batch(&base, &patterns)?;
    }

    let graph = PackageGraph::from_packages(all_packages);

    let mut programs = Vec::new();
    for import_path in &mains {
        let pkg = graph
            .get(import_path)
            .expect("requested package survived loading");
        let analysis = analyses.remove(import_path).with_context(|| {
            format!(
                "type analysis returned no report for package {}",
                import_path
            )
        })?;
        let name = short_name(import_path);
        programs.push(Program {
            name,
            import_path: import_path.clone(),
            dir: PathBuf::from(&pkg.dir),
            go_files: pkg.abs_go_files(),
            other_files: pkg.abs_other_files(),
            module: pkg.to_module(),
            analysis,
        });
    }
    if programs.is_empty() {
        bail!("no commands compiled");
    }

    Ok(Loaded { programs, graph })
}

/// The short name a command is invoked by: the basename of its import path.
pub fn short_name(import_path: &str) -> String {
    import_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(import_path)
        .to_string()
}

/// Whether a `-deps` record is one of the requested packages rather than a
/// dependency. Requested packages are exactly those whose directory or
/// import path matches a query pattern; dependency-only records never do.
fn is_requested(pkg: &golist::GoListPackage, base: &Path, patterns: &[String]) -> bool {
    patterns.iter().any(|pat| {
        if let Some(rel) = pat.strip_prefix("./") {
            let requested = futil::normalize_path(&base.join(rel));
            requested == futil::normalize_path(Path::new(&pkg.dir))
        } else {
            pat == &pkg.import_path
        }
    })
}

/// Apply the skip/error policy to a requested package.
fn keep_package(shell: &Shell, p: &golist::GoListPackage) -> Result<bool> {
    if p.go_files.is_empty() && !p.ignored_go_files.is_empty() {
        shell.status(
            Status::Skipped,
            format!(
                "package {} because build constraints exclude all Go files",
                p.import_path
            ),
        );
        return Ok(false);
    }
    if let Some(err) = &p.error {
        bail!("failed to load package {}: {}", p.import_path, err.err);
    }
    if !p.deps_errors.is_empty() {
        let msgs: Vec<String> = p.deps_errors.iter().map(|e| e.err.clone()).collect();
        bail!(
            "failed to load dependencies of {}: {}",
            p.import_path,
            msgs.join("; ")
        );
    }
    if p.go_files.is_empty() {
        shell.status(
            Status::Skipped,
            format!("package {} because it has no Go files", p.import_path),
        );
        return Ok(false);
    }
    if p.name != "main" {
        shell.status(
            Status::Skipped,
            format!(
                "package {} because it is not a command (must be `package main`)",
                p.import_path
            ),
        );
        return Ok(false);
    }
    Ok(true)
}

fn relative_patterns(base: &Path, dirs: &[PathBuf]) -> Result<Vec<String>> {
    let mut patterns = Vec::new();
    for dir in dirs {
        let rel = futil::relative_path(base, dir);
        patterns.push(format!("./{}", rel.display()));
    }
    Ok(patterns)
}
