//! Writing the scratch tree.
//!
//! The layout is deliberately valid for two build disciplines at once:
//!
//! ```text
//! <scratch>/src/gobb.invalid/bb/
//!     main.go            dispatcher
//!     go.mod             synthesised manifest
//!     go.sum             synthesised checksums (when any)
//!     pkg/bbmain/
//!         register.go    registry primitives
//! <scratch>/src/<import-path>/   rewritten programs, sidecars copied
//! <scratch>/src/<module-path>/   local module manifests and the local
//!                                dependency packages the replace
//!                                directives point at
//! ```
//!
//! Module-based builds follow the synthesised `go.mod` and its `replace`
//! table; legacy builds work because `<scratch>` doubles as a GOPATH. The
//! original repository is never written to; the scratch tree owns copies of
//! everything it needs.

pub mod templates;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::{GoEnv, Program};
use crate::loader::golist::GoListPackage;
use crate::loader::graph::PackageGraph;
use crate::reconciler::{self, LocalModule};
use crate::rewriter::RewrittenFile;
use crate::util::fs as futil;
use crate::util::{process, ProcessBuilder, Shell, Status};

pub use templates::REGISTRY_IMPORT;

/// The directory of the synthetic `bb` package inside a scratch tree.
pub fn bb_dir(scratch: &Path) -> PathBuf {
    scratch.join("src").join(reconciler::SYNTHETIC_MODULE)
}

/// Write the whole scratch tree.
///
/// Returns whether the tree is module-based; a `false` means the builder
/// must fall back to treating `<scratch>` as a GOPATH.
pub fn emit_tree(
    shell: &Shell,
    env: &GoEnv,
    scratch: &Path,
    jobs: &[(&Program, Vec<RewrittenFile>)],
    graph: &PackageGraph,
    local: &BTreeMap<String, LocalModule>,
) -> Result<bool> {
    let pkg_dir = scratch.join("src");
    let bb = bb_dir(scratch);

    let program_paths: BTreeSet<&str> = jobs
        .iter()
        .map(|(p, _)| p.import_path.as_str())
        .collect();

    // Rewritten programs and their sidecar files.
    let mut format_targets = vec![bb.clone()];
    for (program, files) in jobs {
        let dest = pkg_dir.join(&program.import_path);
        for file in files {
            futil::write_string(&dest.join(&file.file_name), &file.content)?;
        }
        for sidecar in &program.other_files {
            copy_sidecar(&program.dir, sidecar, &dest)?;
        }
        format_targets.push(dest);
    }

    // Local dependency packages, copied verbatim.
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for (program, _) in jobs {
        for dep in collect_local_deps(graph, program, local) {
            if program_paths.contains(dep.import_path.as_str()) {
                continue;
            }
            if !seen.insert(dep.import_path.clone()) {
                continue;
            }
            write_dep_package(dep, &pkg_dir.join(&dep.import_path))
                .with_context(|| format!("writing package {} failed", dep.import_path))?;
        }
    }

    // Module manifests for every locally rooted module.
    for local_module in local.values() {
        let go_mod = &local_module.module.go_mod;
        if go_mod.as_os_str().is_empty() || !go_mod.is_file() {
            continue;
        }
        futil::copy_file(
            go_mod,
            &pkg_dir.join(&local_module.module.path).join("go.mod"),
        )?;
    }

    // The synthetic bb module: dispatcher, registry, manifest, checksums.
    let command_imports: Vec<String> = jobs
        .iter()
        .map(|(p, _)| p.import_path.clone())
        .collect();
    futil::write_string(&bb.join("main.go"), &templates::main_source(&command_imports))?;
    futil::write_string(
        &bb.join("pkg/bbmain/register.go"),
        templates::REGISTER_SOURCE,
    )?;

    let has_modules = env.go111module == "on" || !local.is_empty();
    if has_modules {
        futil::write_string(&bb.join("go.mod"), &reconciler::synthesize_go_mod(local))?;
        let go_sum = reconciler::synthesize_go_sum(local)?;
        if !go_sum.is_empty() {
            futil::write_string(&bb.join("go.sum"), &go_sum)?;
        }
    }

    format_tree(shell, env, &format_targets)?;
    shell.status(Status::Generated, scratch.display());
    Ok(has_modules)
}

/// Dependency packages that must travel with `program` into the tree:
/// everything inside a locally rooted module, or (for legacy packages
/// outside any module) every non-standard-library dependency.
fn collect_local_deps<'g>(
    graph: &'g PackageGraph,
    program: &Program,
    local: &BTreeMap<String, LocalModule>,
) -> Vec<&'g GoListPackage> {
    if program.module.is_some() {
        graph.deps_where(&program.import_path, |pkg| {
            if pkg.standard {
                return false;
            }
            if pkg
                .to_module()
                .is_some_and(|m| m.is_replaced_local())
            {
                return true;
            }
            local
                .keys()
                .any(|module_path| in_module(&pkg.import_path, module_path))
        })
    } else {
        graph.deps_where(&program.import_path, |pkg| {
            !pkg.standard && !pkg.import_path.is_empty()
        })
    }
}

/// Whether `import_path` lies within `module_path`'s namespace.
fn in_module(import_path: &str, module_path: &str) -> bool {
    import_path == module_path
        || import_path
            .strip_prefix(module_path)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Copy one dependency package: Go files and sidecars, unmodified.
fn write_dep_package(pkg: &GoListPackage, dest: &Path) -> Result<()> {
    let dir = Path::new(&pkg.dir);
    for name in pkg
        .go_files
        .iter()
        .chain(&pkg.s_files)
        .chain(&pkg.h_files)
        .chain(&pkg.syso_files)
        .chain(&pkg.embed_files)
    {
        // Embedded files may live in subdirectories; keep the layout.
        futil::copy_file(&dir.join(name), &dest.join(name))?;
    }
    Ok(())
}

/// Copy a program sidecar, preserving its path relative to the package
/// directory.
fn copy_sidecar(program_dir: &Path, sidecar: &Path, dest: &Path) -> Result<()> {
    let rel: PathBuf = match sidecar.strip_prefix(program_dir) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => PathBuf::from(
            sidecar
                .file_name()
                .context("sidecar file has no file name")?,
        ),
    };
    futil::copy_file(sidecar, &dest.join(rel))
}

/// Run the canonical formatter over the emitted sources.
///
/// `gofmt` only reorders and reindents; it never adds or removes imports,
/// which is exactly the guarantee the rewriter's alias choices depend on.
/// A missing formatter downgrades to a warning.
fn format_tree(shell: &Shell, env: &GoEnv, targets: &[PathBuf]) -> Result<()> {
    let Some(gofmt) = process::find_gofmt(&env.go_cmd) else {
        shell.warn("gofmt not found; emitting unformatted sources");
        return Ok(());
    };
    ProcessBuilder::new(gofmt)
        .arg("-w")
        .args(targets.iter().map(|p| p.as_os_str()))
        .exec_and_check()
        .context("formatting generated sources failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Analysis;
    use crate::util::shell::ColorChoice;
    use std::fs;
    use tempfile::TempDir;

    fn quiet_shell() -> Shell {
        Shell::from_flags(true, false, ColorChoice::Never)
    }

    fn env() -> GoEnv {
        GoEnv {
            go_cmd: PathBuf::from("/nonexistent/go"),
            goos: "linux".into(),
            goarch: "amd64".into(),
            build_tags: vec![],
            go111module: "on".into(),
            cgo_enabled: false,
            gopath: None,
        }
    }

    fn program(tmp: &TempDir, name: &str) -> Program {
        let dir = tmp.path().join("src-repo").join(name);
        fs::create_dir_all(&dir).unwrap();
        Program {
            name: name.to_string(),
            import_path: format!("example.com/mod1/cmd/{name}"),
            dir,
            go_files: Vec::new(),
            other_files: Vec::new(),
            module: None,
            analysis: Analysis::default(),
        }
    }

    #[test]
    fn test_tree_layout() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        let p = program(&tmp, "helloworld");
        let files = vec![RewrittenFile {
            file_name: "helloworld.go".to_string(),
            content: "package helloworld\n".to_string(),
        }];
        let graph = PackageGraph::from_packages(vec![]);
        let local = BTreeMap::new();

        let has_modules = emit_tree(
            &quiet_shell(),
            &env(),
            &scratch,
            &[(&p, files)],
            &graph,
            &local,
        )
        .unwrap();
        assert!(has_modules); // GO111MODULE=on

        let bb = bb_dir(&scratch);
        assert!(bb.join("main.go").is_file());
        assert!(bb.join("go.mod").is_file());
        assert!(bb.join("pkg/bbmain/register.go").is_file());
        assert!(scratch
            .join("src/example.com/mod1/cmd/helloworld/helloworld.go")
            .is_file());

        let main_go = fs::read_to_string(bb.join("main.go")).unwrap();
        assert!(main_go.contains("_ \"example.com/mod1/cmd/helloworld\""));
        let go_mod = fs::read_to_string(bb.join("go.mod")).unwrap();
        assert!(go_mod.starts_with("module gobb.invalid/bb"));
    }

    #[test]
    fn test_sidecars_preserve_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        let mut p = program(&tmp, "embedder");
        let data_dir = p.dir.join("testdata");
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join("blob.bin"), b"\x00\x01").unwrap();
        p.other_files = vec![data_dir.join("blob.bin")];

        emit_tree(
            &quiet_shell(),
            &env(),
            &scratch,
            &[(
                &p,
                vec![RewrittenFile {
                    file_name: "main.go".to_string(),
                    content: "package embedder\n".to_string(),
                }],
            )],
            &PackageGraph::from_packages(vec![]),
            &BTreeMap::new(),
        )
        .unwrap();

        assert!(scratch
            .join("src/example.com/mod1/cmd/embedder/testdata/blob.bin")
            .is_file());
    }

    #[test]
    fn test_no_manifest_for_legacy_build() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        let p = program(&tmp, "legacy");
        let mut e = env();
        e.go111module = "off".to_string();

        let has_modules = emit_tree(
            &quiet_shell(),
            &e,
            &scratch,
            &[(
                &p,
                vec![RewrittenFile {
                    file_name: "main.go".to_string(),
                    content: "package legacy\n".to_string(),
                }],
            )],
            &PackageGraph::from_packages(vec![]),
            &BTreeMap::new(),
        )
        .unwrap();
        assert!(!has_modules);
        assert!(!bb_dir(&scratch).join("go.mod").exists());
    }

    #[test]
    fn test_in_module_boundaries() {
        assert!(in_module("example.com/m/pkg/a", "example.com/m"));
        assert!(in_module("example.com/m", "example.com/m"));
        assert!(!in_module("example.com/moo/pkg/a", "example.com/m"));
    }
}
