//! The type-analysis helper contract.
//!
//! `go list` knows nothing about type checking, but the rewriter needs four
//! type-checker facts per program: the package-scope identifier set, the
//! per-file import scopes, the package initialisation order, and the
//! canonical type of every hoisted variable. Those come from `gobb-inspect`
//! (source in `tools/inspect/`), a thin wrapper around
//! `golang.org/x/tools/go/packages` that type-checks the requested packages
//! and prints the facts as JSON.
//!
//! Expression positions are reported as `(file, byte offset)`; the in-crate
//! declaration scanner reads the same bytes, so the coordinates agree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::core::{Analysis, ExprRef, GoEnv, InitEntry};
use crate::util::diagnostic::suggestions;
use crate::util::{process, ProcessBuilder};

/// Everything the helper reports about one type-checked package.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageReport {
    pub import_path: String,
    pub dir: String,
    pub package_scope: Vec<String>,
    pub file_scopes: BTreeMap<String, Vec<String>>,
    pub init_order: Vec<InitReport>,
    pub errors: Vec<String>,
}

/// One package-initialisation step.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitReport {
    pub targets: Vec<String>,
    /// Canonical type per target, package references fully qualified.
    pub types: Vec<String>,
    pub rhs: RhsPos,
}

/// Position of a right-hand expression's first token.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RhsPos {
    pub file: String,
    pub offset: usize,
}

impl PackageReport {
    /// Convert into the rewriter-facing [`Analysis`].
    pub fn into_analysis(self) -> Analysis {
        Analysis {
            package_scope: self.package_scope.into_iter().collect(),
            file_scopes: self
                .file_scopes
                .into_iter()
                .map(|(file, names)| (PathBuf::from(file), names.into_iter().collect()))
                .collect(),
            init_order: self
                .init_order
                .into_iter()
                .map(|entry| InitEntry {
                    targets: entry.targets,
                    types: entry.types,
                    rhs: ExprRef {
                        file: PathBuf::from(entry.rhs.file),
                        offset: entry.rhs.offset,
                    },
                })
                .collect(),
        }
    }
}

/// Run the helper over one batch of package patterns (one module, or the
/// no-module group), returning a report per type-checked package.
///
/// Type-check failures are fatal here: the helper lists them in `errors`
/// and this function surfaces them with the helper's own wording.
pub fn analyze(env: &GoEnv, dir: &Path, patterns: &[String]) -> Result<Vec<PackageReport>> {
    let Some(tool) = process::find_inspector() else {
        bail!(
            "could not find the type-analysis helper `gobb-inspect`\n{}",
            suggestions::NO_INSPECTOR
        );
    };
    let output = ProcessBuilder::new(tool)
        .arg("-json")
        .args(patterns)
        .cwd(dir)
        .envs(env.env_vars())
        .exec_and_check()
        .with_context(|| format!("type analysis failed in {}", dir.display()))?;

    let reports = parse_reports(&output.stdout)?;
    let mut failures = Vec::new();
    for report in &reports {
        for err in &report.errors {
            failures.push(format!("package {}: {}", report.import_path, err));
        }
    }
    if !failures.is_empty() {
        bail!("type checking failed:\n{}", failures.join("\n"));
    }
    Ok(reports)
}

/// Parse the helper's JSON output (an array of reports).
pub fn parse_reports(bytes: &[u8]) -> Result<Vec<PackageReport>> {
    serde_json::from_slice(bytes).context("malformed `gobb-inspect` output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::canned;

    #[test]
    fn test_parse_reports() {
        let reports = parse_reports(canned::INSPECT_HELLOWORLD.as_bytes()).unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.import_path, "example.com/mod1/cmd/helloworld");
        assert!(report.package_scope.contains(&"greeting".to_string()));

        let analysis = report.clone().into_analysis();
        assert_eq!(analysis.init_order.len(), 1);
        let entry = &analysis.init_order[0];
        assert_eq!(entry.targets, vec!["greeting"]);
        assert_eq!(entry.types, vec!["string"]);
        assert_eq!(
            entry.rhs.file,
            PathBuf::from("/src/mod1/cmd/helloworld/helloworld.go")
        );
    }

    #[test]
    fn test_file_scopes_become_sets() {
        let reports = parse_reports(canned::INSPECT_HELLOWORLD.as_bytes()).unwrap();
        let analysis = reports[0].clone().into_analysis();
        let scope = analysis
            .file_scopes
            .get(Path::new("/src/mod1/cmd/helloworld/helloworld.go"))
            .unwrap();
        assert!(scope.contains("fmt"));
    }
}
