//! Resolution of user-supplied patterns into package locations.
//!
//! Patterns may be relative or absolute filesystem paths (with globs), Go
//! import paths (with `path.Match` globs or a `/...` suffix), or any of the
//! above prefixed with `-` to mark an exclusion. Shell-style brace groups
//! are expanded first, and patterns that name neither an existing path nor
//! an absolute import path are tried against the `GOBB_PATH` search list.
//!
//! Resolution runs in two phases: a purely local classification phase, and
//! a validation phase that asks the Go toolchain which candidates are real,
//! buildable commands. Candidates a build constraint rules out are skipped
//! with a warning; toolchain failures are errors.

pub mod brace;
pub mod pattern;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use thiserror::Error;

use crate::core::GoEnv;
use crate::loader::{golist, group_by_module};
use crate::util::fs as futil;
use crate::util::{Shell, Status};

/// Resolution errors callers may want to match on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Nothing matched. Distinct so the driver can report it verbatim.
    #[error("no Go commands match the given patterns")]
    NoMatch,

    #[error("bad pattern `{pattern}`: {reason}")]
    BadPattern { pattern: String, reason: String },
}

/// Configuration for one resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOpts {
    /// Directory relative patterns are resolved against.
    pub working_dir: PathBuf,

    /// Ordered base directories tried for bare relative patterns
    /// (`GOBB_PATH`, colon-separated, left to right).
    pub search_paths: Vec<PathBuf>,

    /// Fallback base directory used when `search_paths` is empty
    /// (`GOBB_SRC`).
    pub legacy_source: Option<PathBuf>,
}

impl ResolveOpts {
    /// Build options from the process environment.
    pub fn from_env(working_dir: impl Into<PathBuf>) -> Self {
        let search_paths = std::env::var("GOBB_PATH")
            .unwrap_or_default()
            .split(':')
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
        let legacy_source = std::env::var("GOBB_SRC")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        ResolveOpts {
            working_dir: working_dir.into(),
            search_paths,
            legacy_source,
        }
    }
}

/// The outcome of phase 1: candidates split by kind and polarity.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Classified {
    pub dir_includes: Vec<PathBuf>,
    pub dir_excludes: Vec<PathBuf>,
    pub gopath_includes: Vec<String>,
    pub gopath_excludes: Vec<String>,
}

/// Resolve patterns to a sorted, deduplicated list of command locations:
/// absolute directories and/or normalized Go import paths.
pub fn resolve(
    shell: &Shell,
    env: &GoEnv,
    opts: &ResolveOpts,
    patterns: &[String],
) -> Result<Vec<String>> {
    let classified = classify(opts, patterns)?;

    // Nothing to include: report no-match without ever invoking the
    // metadata tool.
    if classified.dir_includes.is_empty() && classified.gopath_includes.is_empty() {
        bail!(ResolveError::NoMatch);
    }

    let directories = filter_directory_paths(
        shell,
        env,
        &classified.dir_includes,
        &classified.dir_excludes,
    )?;
    let gopaths = filter_go_paths(
        shell,
        env,
        &opts.working_dir,
        &classified.gopath_includes,
        &classified.gopath_excludes,
    )?;

    let mut result: Vec<String> = directories
        .iter()
        .map(|d| d.display().to_string())
        .chain(gopaths)
        .collect();
    result.sort();
    result.dedup();

    if result.is_empty() {
        bail!(ResolveError::NoMatch);
    }
    Ok(result)
}

/// Phase 1: expand braces, apply the search list, and split every pattern
/// into filesystem or import-path candidates. Purely local; queries nothing
/// but the filesystem.
pub fn classify(opts: &ResolveOpts, patterns: &[String]) -> Result<Classified> {
    let mut out = Classified::default();
    for raw in patterns {
        let (is_exclude, stripped) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw.as_str()),
        };
        for expanded in brace::expand(stripped) {
            match classify_one(opts, &expanded)? {
                Candidate::Dirs(mut dirs) => {
                    if is_exclude {
                        out.dir_excludes.append(&mut dirs);
                    } else {
                        out.dir_includes.append(&mut dirs);
                    }
                }
                Candidate::ImportPath(p) => {
                    if is_exclude {
                        out.gopath_excludes.push(p);
                    } else {
                        out.gopath_includes.push(p);
                    }
                }
            }
        }
    }
    Ok(out)
}

enum Candidate {
    Dirs(Vec<PathBuf>),
    ImportPath(String),
}

fn classify_one(opts: &ResolveOpts, pattern: &str) -> Result<Candidate> {
    if let Some(dirs) = glob_existing(&opts.working_dir, pattern)? {
        return Ok(Candidate::Dirs(dirs));
    }

    // Bare patterns (no leading `.` or `/`) are tried against the search
    // list, first existing base wins.
    if !pattern.starts_with('.') && !pattern.starts_with('/') {
        let mut bases = opts.search_paths.clone();
        if bases.is_empty() {
            bases.extend(opts.legacy_source.clone());
        }
        for base in &bases {
            let joined = base.join(pattern);
            if let Some(dirs) = glob_existing(&opts.working_dir, &joined.to_string_lossy())? {
                return Ok(Candidate::Dirs(dirs));
            }
        }
    }

    Ok(Candidate::ImportPath(pattern.to_string()))
}

/// Expand a filesystem glob; `None` when nothing on disk matches.
fn glob_existing(working_dir: &Path, pattern: &str) -> Result<Option<Vec<PathBuf>>> {
    // `...` is an import-path wildcard; the filesystem never has it.
    if pattern.contains("...") {
        return Ok(None);
    }
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        working_dir.join(pattern).display().to_string()
    };
    let entries = match glob::glob(&full) {
        Ok(entries) => entries,
        // Not a valid filesystem glob; let the import-path side report it.
        Err(_) => return Ok(None),
    };
    let matches: Vec<PathBuf> = entries.filter_map(|e| e.ok()).collect();
    if matches.is_empty() {
        Ok(None)
    } else {
        Ok(Some(matches))
    }
}

/// Phase 2 for filesystem candidates: keep directories, group them by
/// module root, validate each group with one metadata query, and subtract
/// the exclusions.
fn filter_directory_paths(
    shell: &Shell,
    env: &GoEnv,
    includes: &[PathBuf],
    excludes: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let mut directories = Vec::new();
    for path in includes {
        // Only directories can be packages.
        if path.is_dir() {
            directories.push(futil::normalize_path(path));
        }
    }

    // Exclusions do not go through the eligibility check.
    let excludes: BTreeSet<PathBuf> = excludes.iter().map(|p| futil::normalize_path(p)).collect();

    let mut eligible = Vec::new();
    let (grouped, no_module) = group_by_module(&directories);
    for (module_dir, dirs) in grouped {
        let pkgs = quick_query_dirs(env, &module_dir, &dirs)?;
        eligible.extend(check_eligibility(shell, pkgs)?);
    }
    if let Some(first) = no_module.first() {
        let pkgs = quick_query_dirs(env, &first.clone(), &no_module)?;
        eligible.extend(check_eligibility(shell, pkgs)?);
    }

    Ok(eligible
        .into_iter()
        .map(|p| PathBuf::from(p.dir))
        .filter(|d| !excludes.contains(d))
        .collect())
}

/// One quick `go list` over several directories of the same module, with
/// import paths made relative to the module root.
fn quick_query_dirs(
    env: &GoEnv,
    base: &Path,
    dirs: &[PathBuf],
) -> Result<Vec<golist::GoListPackage>> {
    let mut rel_patterns = Vec::new();
    for dir in dirs {
        let rel = futil::relative_path(base, dir);
        // `go list cmd/foo` looks in GOPATH; `go list ./cmd/foo` looks in
        // the directory. We always want the latter.
        rel_patterns.push(format!("./{}", rel.display()));
    }
    golist::list_quick(env, base, &rel_patterns)
}

/// Filter out packages the build constraints exclude (skip with warning),
/// packages without Go files or that are not commands (skip with warning),
/// and fail on hard metadata errors, aggregating all of them.
fn check_eligibility(
    shell: &Shell,
    pkgs: Vec<golist::GoListPackage>,
) -> Result<Vec<golist::GoListPackage>> {
    let mut good = Vec::new();
    let mut errors = Vec::new();
    for p in pkgs {
        if p.go_files.is_empty() && !p.ignored_go_files.is_empty() {
            shell.status(
                Status::Skipped,
                format!(
                    "package {} because build constraints exclude all Go files",
                    p.import_path
                ),
            );
        } else if let Some(err) = &p.error {
            errors.push(format!("package {}: {}", p.import_path, err.err));
        } else if p.go_files.is_empty() {
            shell.status(
                Status::Skipped,
                format!("package {} because it has no Go files", p.import_path),
            );
        } else if p.name != "main" {
            shell.status(
                Status::Skipped,
                format!(
                    "package {} because it is not a command (must be `package main`)",
                    p.import_path
                ),
            );
        } else {
            good.push(p);
        }
    }
    if !errors.is_empty() {
        bail!("{}", errors.join("\n"));
    }
    Ok(good)
}

/// Phase 2 for import-path candidates.
fn filter_go_paths(
    shell: &Shell,
    env: &GoEnv,
    working_dir: &Path,
    includes: &[String],
    excludes: &[String],
) -> Result<Vec<String>> {
    let included = lookup_compilable(shell, env, working_dir, includes)?;
    let excluded: BTreeSet<String> = lookup_compilable(shell, env, working_dir, excludes)?
        .into_iter()
        .collect();
    Ok(included
        .into_iter()
        .filter(|p| !excluded.contains(p))
        .collect())
}

/// Resolve import-path patterns to concrete import paths.
///
/// Batching saves a lot of time, but wildcard patterns cannot be batched:
/// after a batched query there is no way to attribute a result back to the
/// input pattern for `path.Match` filtering. So wildcards are queried one
/// at a time and everything else goes in one batch.
fn lookup_compilable(
    shell: &Shell,
    env: &GoEnv,
    working_dir: &Path,
    patterns: &[String],
) -> Result<Vec<String>> {
    let mut pkgs = Vec::new();
    let mut batched = Vec::new();
    for p in patterns {
        if pattern::could_be_glob(p) {
            pkgs.extend(lookup_with_glob(env, working_dir, p)?);
        } else {
            batched.push(p.clone());
        }
    }
    if !batched.is_empty() {
        pkgs.extend(golist::list_quick(env, working_dir, &batched)?);
    }
    let eligible = check_eligibility(shell, pkgs)?;
    Ok(eligible.into_iter().map(|p| p.import_path).collect())
}

/// Resolve one glob import-path pattern: query everything under the last
/// glob-free prefix, then filter by `path.Match`.
fn lookup_with_glob(
    env: &GoEnv,
    working_dir: &Path,
    glob_pattern: &str,
) -> Result<Vec<golist::GoListPackage>> {
    let elems: Vec<&str> = glob_pattern.split('/').collect();
    let glob_index = elems
        .iter()
        .position(|e| pattern::could_be_glob(e))
        .unwrap_or(0);

    let mut prefix: Vec<&str> = elems[..glob_index].to_vec();
    prefix.push("...");
    let wide_pattern = prefix.join("/");

    let pkgs = golist::list_quick(env, working_dir, &[wide_pattern.clone()]).map_err(|e| {
        anyhow::anyhow!(
            "`{}` is neither package nor path/glob -- could not look up `{}` \
             (import path globs have to be within modules): {}",
            glob_pattern,
            wide_pattern,
            e
        )
    })?;

    let mut filtered = Vec::new();
    for p in pkgs {
        if pattern::path_match(glob_pattern, &p.import_path)? {
            filtered.push(p);
        }
    }
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn opts(dir: &Path) -> ResolveOpts {
        ResolveOpts {
            working_dir: dir.to_path_buf(),
            search_paths: Vec::new(),
            legacy_source: None,
        }
    }

    #[test]
    fn test_classify_existing_directory() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("cmds/ls")).unwrap();

        let c = classify(&opts(tmp.path()), &["./cmds/ls".to_string()]).unwrap();
        assert_eq!(c.dir_includes.len(), 1);
        assert!(c.gopath_includes.is_empty());
    }

    #[test]
    fn test_classify_glob_and_braces() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("cmds/ls")).unwrap();
        fs::create_dir_all(tmp.path().join("cmds/cp")).unwrap();
        fs::create_dir_all(tmp.path().join("exp/ip")).unwrap();

        let c = classify(&opts(tmp.path()), &["./{cmds,exp}/*".to_string()]).unwrap();
        assert_eq!(c.dir_includes.len(), 3);
    }

    #[test]
    fn test_classify_exclusion_marker() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("cmds/ls")).unwrap();

        let c = classify(
            &opts(tmp.path()),
            &["./cmds/*".to_string(), "-./cmds/ls".to_string()],
        )
        .unwrap();
        assert_eq!(c.dir_includes.len(), 1);
        assert_eq!(c.dir_excludes.len(), 1);
    }

    #[test]
    fn test_classify_search_path() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("first/hello")).unwrap();
        fs::create_dir_all(tmp.path().join("second/hello")).unwrap();

        let mut o = opts(tmp.path());
        o.search_paths = vec![tmp.path().join("first"), tmp.path().join("second")];

        // First existing base wins.
        let c = classify(&o, &["hello".to_string()]).unwrap();
        assert_eq!(c.dir_includes, vec![tmp.path().join("first/hello")]);
    }

    #[test]
    fn test_classify_legacy_source_fallback() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("legacy/hello")).unwrap();

        let mut o = opts(tmp.path());
        o.legacy_source = Some(tmp.path().join("legacy"));

        let c = classify(&o, &["hello".to_string()]).unwrap();
        assert_eq!(c.dir_includes, vec![tmp.path().join("legacy/hello")]);
    }

    #[test]
    fn test_classify_import_path_fallthrough() {
        let tmp = TempDir::new().unwrap();
        let c = classify(
            &opts(tmp.path()),
            &["example.com/cmds/core/...".to_string()],
        )
        .unwrap();
        assert!(c.dir_includes.is_empty());
        assert_eq!(c.gopath_includes, vec!["example.com/cmds/core/..."]);
    }

    #[test]
    fn test_resolve_reports_no_match_without_tool() {
        // A GoEnv pointing at a nonexistent compiler proves the metadata
        // tool is never invoked for an empty include set.
        let tmp = TempDir::new().unwrap();
        let env = GoEnv {
            go_cmd: PathBuf::from("/nonexistent/go"),
            goos: "linux".into(),
            goarch: "amd64".into(),
            build_tags: vec![],
            go111module: "on".into(),
            cgo_enabled: false,
            gopath: None,
        };
        let shell = Shell::from_flags(true, false, crate::util::shell::ColorChoice::Never);
        let err = resolve(&shell, &env, &opts(tmp.path()), &[]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ResolveError>(),
            Some(&ResolveError::NoMatch)
        );
    }
}
