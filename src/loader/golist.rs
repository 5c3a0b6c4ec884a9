//! `go list -json` invocation and schema.
//!
//! The metadata tool emits a *stream* of concatenated JSON objects, one per
//! package, not a JSON array; parsing goes through
//! [`serde_json::StreamDeserializer`]. Only the fields gobb consumes are
//! modelled.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{GoEnv, Module, ModuleReplacement};
use crate::util::ProcessBuilder;

/// One package record from `go list -json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GoListPackage {
    pub dir: String,
    pub import_path: String,
    pub name: String,
    pub standard: bool,
    pub go_files: Vec<String>,
    pub ignored_go_files: Vec<String>,
    pub s_files: Vec<String>,
    pub h_files: Vec<String>,
    pub syso_files: Vec<String>,
    pub embed_files: Vec<String>,
    pub imports: Vec<String>,
    /// Vendor translation: import path as written in source to the import
    /// path `go list` resolved it to. Only populated where they differ.
    pub import_map: BTreeMap<String, String>,
    pub module: Option<GoListModule>,
    pub incomplete: bool,
    pub error: Option<GoListError>,
    pub deps_errors: Vec<GoListError>,
}

/// The `Module` object inside a package record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GoListModule {
    pub path: String,
    pub version: String,
    pub main: bool,
    pub dir: String,
    pub go_mod: String,
    pub replace: Option<Box<GoListModule>>,
}

/// A load error attached to a package record (`go list -e`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GoListError {
    pub import_stack: Vec<String>,
    pub pos: String,
    pub err: String,
}

impl GoListPackage {
    /// Absolute paths of the compilable Go files, lexicographically sorted.
    pub fn abs_go_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .go_files
            .iter()
            .map(|f| Path::new(&self.dir).join(f))
            .collect();
        files.sort();
        files
    }

    /// Absolute paths of sidecar files the build needs but the rewriter
    /// never touches: assembler, headers, syso objects, embedded data.
    pub fn abs_other_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .s_files
            .iter()
            .chain(&self.h_files)
            .chain(&self.syso_files)
            .chain(&self.embed_files)
            .map(|f| Path::new(&self.dir).join(f))
            .collect();
        files.sort();
        files.dedup();
        files
    }

    /// The owning [`Module`], if the package is in one.
    pub fn to_module(&self) -> Option<Module> {
        let m = self.module.as_ref()?;
        if m.path.is_empty() {
            return None;
        }
        Some(Module {
            path: m.path.clone(),
            dir: PathBuf::from(&m.dir),
            go_mod: PathBuf::from(&m.go_mod),
            version: if m.version.is_empty() {
                None
            } else {
                Some(m.version.clone())
            },
            main: m.main,
            replace: m.replace.as_ref().map(|r| ModuleReplacement {
                path: r.path.clone(),
                version: if r.version.is_empty() {
                    None
                } else {
                    Some(r.version.clone())
                },
                dir: if r.dir.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(&r.dir))
                },
            }),
        })
    }
}

/// Quick query: names, files, and modules only. Used by the resolver's
/// validation phase where type information would be wasted work.
pub fn list_quick(env: &GoEnv, dir: &Path, patterns: &[String]) -> Result<Vec<GoListPackage>> {
    list(env, dir, false, patterns)
}

/// Full query including the transitive dependency closure.
pub fn list_deps(env: &GoEnv, dir: &Path, patterns: &[String]) -> Result<Vec<GoListPackage>> {
    list(env, dir, true, patterns)
}

fn list(env: &GoEnv, dir: &Path, deps: bool, patterns: &[String]) -> Result<Vec<GoListPackage>> {
    let mut pb = ProcessBuilder::new(&env.go_cmd)
        .arg("list")
        .arg("-e")
        .arg("-json");
    if deps {
        pb = pb.arg("-deps");
    }
    let pb = pb.args(patterns).cwd(dir).envs(env.env_vars());
    let output = pb
        .exec_and_check()
        .with_context(|| format!("package metadata query failed in {}", dir.display()))?;
    parse_stream(&output.stdout)
}

/// Parse the concatenated-JSON-objects output of `go list -json`.
pub fn parse_stream(bytes: &[u8]) -> Result<Vec<GoListPackage>> {
    let mut packages = Vec::new();
    for pkg in serde_json::Deserializer::from_slice(bytes).into_iter::<GoListPackage>() {
        packages.push(pkg.context("malformed `go list -json` output")?);
    }
    Ok(packages)
}
