//! Module reconciliation and the synthesised top-level manifest.
//!
//! Commands from several modules get compiled into one binary, so every
//! locally rooted module (directly requested, or bound to a local directory
//! by a `replace` directive somewhere) must appear in the generated tree,
//! and the top-level `go.mod` must rebind each of them to its copy there.
//! The module identifier `gobb.invalid/bb` can never collide with a real
//! module: `.invalid` is a reserved, non-routable TLD, so the toolchain
//! will not try the network for it.
//!
//! Three conflict shapes are detected before anything is written:
//! duplicate local definitions of one module, a remote version colliding
//! with a local copy, and a requested directory colliding with a manifest
//! binding elsewhere. The latter two are reported with a ready-to-paste
//! `replace` suggestion.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use thiserror::Error;

use crate::core::{Module, Program};
use crate::loader::graph::PackageGraph;
use crate::util::fs as futil;
use crate::util::{Diagnostic, Shell};

/// The module path of the synthesised top-level manifest.
pub const SYNTHETIC_MODULE: &str = "gobb.invalid/bb";

/// Reconciliation failures callers may match on.
#[derive(Debug, Error)]
pub enum ConflictError {
    #[error(
        "two conflicting versions of module {module} have been requested; \
         one from {first}, the other from {second}"
    )]
    DuplicateLocal {
        module: String,
        first: String,
        second: String,
    },

    #[error("conflicting module dependencies found")]
    RemoteVsLocal,
}

/// A locally rooted module and where its binding came from, for error
/// messages.
#[derive(Debug, Clone)]
pub struct LocalModule {
    pub module: Module,
    pub provenance: String,
}

/// Compute the set of locally rooted modules and fail on conflicts.
///
/// Locally rooted means: the module of a requested program, or any module
/// some manifest in the dependency graph rebinds to a local directory.
pub fn local_modules(
    shell: &Shell,
    programs: &[Program],
    graph: &PackageGraph,
) -> Result<BTreeMap<String, LocalModule>> {
    let mut local: BTreeMap<String, LocalModule> = BTreeMap::new();

    // Requested programs' own modules.
    for program in programs {
        let Some(module) = &program.module else {
            continue;
        };
        local
            .entry(module.path.clone())
            .or_insert_with(|| LocalModule {
                module: module.clone(),
                provenance: format!(
                    "your request to compile {} from {}",
                    module.path,
                    module.dir.display()
                ),
            });
    }

    // Modules some manifest rebinds to a local directory.
    for program in programs {
        let Some(program_module) = &program.module else {
            continue;
        };
        for module in locally_replaced_modules(graph, &program.import_path) {
            match local.get(&module.path) {
                Some(existing)
                    if existing.module.effective_dir() != module.effective_dir() =>
                {
                    bail!(ConflictError::DuplicateLocal {
                        module: module.path.clone(),
                        first: existing.provenance.clone(),
                        second: format!(
                            "{}'s go.mod ({})",
                            program_module.path,
                            program_module.go_mod.display()
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    local.insert(
                        module.path.clone(),
                        LocalModule {
                            provenance: format!(
                                "{}'s go.mod ({})",
                                program_module.path,
                                program_module.go_mod.display()
                            ),
                            module,
                        },
                    );
                }
            }
        }
    }

    // Remote uses of modules we have local copies of.
    let mut conflict = false;
    for program in programs {
        let Some(program_module) = &program.module else {
            continue;
        };
        graph.visit_deps(&program.import_path, |pkg| {
            let Some(module) = pkg.to_module() else {
                return;
            };
            let Some(known) = local.get(&module.path) else {
                return;
            };
            if known.module.effective_dir() == module.effective_dir() {
                return;
            }
            let replace_target =
                futil::relative_path(&program_module.dir, known.module.effective_dir());
            let diagnostic =
                Diagnostic::error(format!("conflicting module dependencies on {}", module.path))
                    .with_context(format!(
                        "{} uses {}",
                        program_module.path,
                        module.identifier()
                    ))
                    .with_context(format!(
                        "{} uses {}",
                        known.provenance,
                        known.module.identifier()
                    ))
                    .with_suggestion(format!(
                        "Suggestion to resolve: add `replace {} => {}` to {}",
                        module.path,
                        replace_target.display(),
                        program_module.go_mod.display()
                    ));
            shell.error(diagnostic);
            conflict = true;
        });
    }
    if conflict {
        bail!(ConflictError::RemoteVsLocal);
    }

    Ok(local)
}

/// Modules in `root`'s dependency graph that a `replace` directive rebinds
/// to a local directory, deduplicated by module path.
fn locally_replaced_modules(graph: &PackageGraph, root: &str) -> Vec<Module> {
    let mut modules: BTreeMap<String, Module> = BTreeMap::new();
    graph.visit_deps(root, |pkg| {
        if let Some(module) = pkg.to_module() {
            if module.is_replaced_local() {
                modules.entry(module.path.clone()).or_insert(module);
            }
        }
    });
    modules.into_values().collect()
}

/// The synthesised top-level `go.mod`: a non-colliding module identity, a
/// `require` for every local module, and a `replace` rebinding each to its
/// copy in the scratch tree. Each module appears exactly once.
///
/// TODO: copy `replace`/`exclude` directives of the requested modules'
/// manifests here too, and surface conflicts between them; today only the
/// local rebindings are carried.
pub fn synthesize_go_mod(local: &BTreeMap<String, LocalModule>) -> String {
    let mut out = format!("module {SYNTHETIC_MODULE}\n");
    if !local.is_empty() {
        out.push_str("\nrequire (\n");
        for path in local.keys() {
            out.push_str(&format!("\t{path} v0.0.0\n"));
        }
        out.push_str(")\n\n");
        for path in local.keys() {
            out.push_str(&format!("replace {path} => ../../{path}\n"));
        }
    }
    out
}

/// The synthesised checksum file: the requested modules' `go.sum` contents
/// concatenated, deduplicated, and sorted. Modules without one contribute
/// nothing.
pub fn synthesize_go_sum(local: &BTreeMap<String, LocalModule>) -> Result<String> {
    let mut lines = Vec::new();
    for local_module in local.values() {
        let go_sum = local_module.module.effective_dir().join("go.sum");
        if !go_sum.is_file() {
            continue;
        }
        let contents = futil::read_to_string(&go_sum)?;
        lines.extend(contents.lines().map(|l| l.to_string()));
    }
    lines.sort();
    lines.dedup();
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}
