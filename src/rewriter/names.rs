//! Identifier bookkeeping for one program rewrite.
//!
//! The arbiter tracks every identifier already in use (package scope from
//! the type checker, file scope per source file) and hands out fresh names
//! that are guaranteed not to collide. The proposal sequence for prefix `P`
//! is `P`, `P0`, `P1`, ... and is deterministic, which is what makes builds
//! reproducible.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::core::Analysis;

/// Per-program name registry, scoped to one rewrite pass.
#[derive(Debug)]
pub struct NameArbiter {
    /// Variable, const, func, and type names. A new function name may not
    /// collide with an import in *any* file of the package.
    package_scope: BTreeSet<String>,

    /// Import names per file. Imports only conflict within their own file.
    file_scopes: BTreeMap<PathBuf, BTreeSet<String>>,

    /// Next candidate index for numbered init helpers.
    init_count: usize,
}

impl NameArbiter {
    pub fn new(analysis: &Analysis) -> Self {
        NameArbiter {
            package_scope: analysis.package_scope.clone(),
            file_scopes: analysis.file_scopes.clone(),
            init_count: 0,
        }
    }

    fn func_name_taken(&self, name: &str) -> bool {
        self.package_scope.contains(name)
            || self.file_scopes.values().any(|scope| scope.contains(name))
    }

    fn import_name_taken(&self, name: &str, file: &Path) -> bool {
        self.package_scope.contains(name)
            || self
                .file_scopes
                .get(file)
                .is_some_and(|scope| scope.contains(name))
    }

    /// Propose an unused package-scope function name with the given prefix,
    /// and reserve it.
    pub fn propose_func_name(&mut self, prefix: &str) -> String {
        let mut proposed = prefix.to_string();
        let mut i = 0usize;
        while self.func_name_taken(&proposed) {
            proposed = format!("{prefix}{i}");
            i += 1;
        }
        self.package_scope.insert(proposed.clone());
        proposed
    }

    /// Propose an unused import alias for `file` with the given prefix, and
    /// reserve it there.
    pub fn propose_import_alias(&mut self, prefix: &str, file: &Path) -> String {
        let mut proposed = prefix.to_string();
        let mut i = 0usize;
        while self.import_name_taken(&proposed, file) {
            proposed = format!("{prefix}{i}");
            i += 1;
        }
        self.file_scopes
            .entry(file.to_path_buf())
            .or_default()
            .insert(proposed.clone());
        proposed
    }

    /// The next free `busyboxInitN` name. Indices increase monotonically
    /// and skip names the package already uses.
    pub fn next_init(&mut self) -> String {
        loop {
            let candidate = format!("busyboxInit{}", self.init_count);
            self.init_count += 1;
            if !self.func_name_taken(&candidate) {
                self.package_scope.insert(candidate.clone());
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(package: &[&str], files: &[(&str, &[&str])]) -> Analysis {
        Analysis {
            package_scope: package.iter().map(|s| s.to_string()).collect(),
            file_scopes: files
                .iter()
                .map(|(f, names)| {
                    (
                        PathBuf::from(f),
                        names.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect(),
            init_order: Vec::new(),
        }
    }

    #[test]
    fn test_func_name_sequence() {
        let mut arbiter = NameArbiter::new(&analysis(
            &["registeredMain", "registeredMain0"],
            &[],
        ));
        assert_eq!(arbiter.propose_func_name("registeredMain"), "registeredMain1");
        // The accepted name is reserved for subsequent proposals.
        assert_eq!(arbiter.propose_func_name("registeredMain"), "registeredMain2");
    }

    #[test]
    fn test_func_name_conflicts_with_any_file_import() {
        let mut arbiter = NameArbiter::new(&analysis(
            &[],
            &[("/p/a.go", &["registeredInit"][..])],
        ));
        assert_eq!(arbiter.propose_func_name("registeredInit"), "registeredInit0");
    }

    #[test]
    fn test_import_alias_only_conflicts_in_own_file() {
        let mut arbiter = NameArbiter::new(&analysis(
            &[],
            &[("/p/a.go", &["bbmain"][..]), ("/p/b.go", &[][..])],
        ));
        assert_eq!(
            arbiter.propose_import_alias("bbmain", Path::new("/p/a.go")),
            "bbmain0"
        );
        assert_eq!(
            arbiter.propose_import_alias("bbmain", Path::new("/p/b.go")),
            "bbmain"
        );
    }

    #[test]
    fn test_init_numbering_skips_taken() {
        let mut arbiter = NameArbiter::new(&analysis(&["busyboxInit1"], &[]));
        assert_eq!(arbiter.next_init(), "busyboxInit0");
        assert_eq!(arbiter.next_init(), "busyboxInit2");
        assert_eq!(arbiter.next_init(), "busyboxInit3");
    }
}
