//! Rendering canonical type strings into one file's namespace.
//!
//! The analysis helper prints types with every package reference fully
//! qualified by import path (`*flag.FlagSet`,
//! `map[string]example.com/mod2/pkg/exthello.Greeter`). When such a type is
//! written into a source file, each package reference has to become
//! whatever that file calls the package: its explicit alias, its declared
//! name for unaliased imports, nothing for self-references, or a freshly
//! imported alias when the file does not import the package at all. The
//! qualifier owns that decision and records the imports it had to add.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::Result;

use crate::loader::graph::PackageGraph;
use crate::rewriter::decls::ImportSpec;
use crate::rewriter::names::NameArbiter;

/// Stateful type-string renderer for one file.
#[derive(Debug)]
pub struct Qualifier<'a> {
    program_path: &'a str,
    graph: &'a PackageGraph,
    file: PathBuf,

    /// Import path as written -> alias visible in this file.
    aliases: BTreeMap<String, String>,

    /// Import paths imported without an alias; their visible name is the
    /// imported package's declared name.
    unaliased: BTreeSet<String>,

    /// Imports this qualifier had to introduce: (alias, import path).
    added: Vec<(String, String)>,
}

impl<'a> Qualifier<'a> {
    pub fn new(
        program_path: &'a str,
        graph: &'a PackageGraph,
        file: impl Into<PathBuf>,
        imports: &[ImportSpec],
    ) -> Self {
        let mut aliases = BTreeMap::new();
        let mut unaliased = BTreeSet::new();
        for spec in imports {
            match spec.alias.as_deref() {
                // A blank import gives the file no name to use; a dot
                // import needs no qualifier at all but we cannot lean on
                // it, so both fall through to "not visibly imported".
                Some("_") | Some(".") => {}
                Some(alias) => {
                    aliases.insert(spec.path.clone(), alias.to_string());
                }
                None => {
                    unaliased.insert(spec.path.clone());
                }
            }
        }
        Qualifier {
            program_path,
            graph,
            file: file.into(),
            aliases,
            unaliased,
            added: Vec::new(),
        }
    }

    /// Imports introduced so far: (alias, import path).
    pub fn added_imports(&self) -> &[(String, String)] {
        &self.added
    }

    /// Render a canonical type string using this file's import names.
    pub fn render(&mut self, arbiter: &mut NameArbiter, canonical: &str) -> Result<String> {
        let mut out = String::with_capacity(canonical.len());
        let bytes = canonical.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            let c = bytes[i] as char;

            // Struct tags are Go string literals; copy them verbatim.
            if c == '"' {
                let start = i;
                i += 1;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => i += 2,
                        b'"' => {
                            i += 1;
                            break;
                        }
                        _ => i += 1,
                    }
                }
                out.push_str(&canonical[start..i.min(bytes.len())]);
                continue;
            }

            if is_path_char(c) {
                let start = i;
                while i < bytes.len() && is_path_char(bytes[i] as char) {
                    i += 1;
                }
                let run = &canonical[start..i];
                out.push_str(&self.render_run(arbiter, run));
                continue;
            }

            out.push(c);
            i += 1;
        }
        Ok(out)
    }

    /// Handle one maximal run of path characters. A qualified reference is
    /// `path.Name` where the name is an identifier; anything else (plain
    /// identifiers, numbers, `...`) passes through unchanged.
    fn render_run(&mut self, arbiter: &mut NameArbiter, run: &str) -> String {
        let Some(dot) = run.rfind('.') else {
            return run.to_string();
        };
        let (pkg_path, name) = (&run[..dot], &run[dot + 1..]);
        if pkg_path.is_empty() || !is_ident(name) || !starts_ident(pkg_path) {
            return run.to_string();
        }
        match self.qualify(arbiter, pkg_path) {
            Some(alias) => format!("{alias}.{name}"),
            None => name.to_string(),
        }
    }

    /// The name to qualify a package reference with, or `None` for the
    /// rewritten package itself.
    fn qualify(&mut self, arbiter: &mut NameArbiter, type_pkg_path: &str) -> Option<String> {
        // The type checker reports vendored packages under their vendored
        // path; translate to the path source files actually import.
        let import_path = self.graph.import_name(self.program_path, type_pkg_path);

        if import_path == self.program_path {
            return None;
        }
        if let Some(alias) = self.aliases.get(&import_path) {
            return Some(alias.clone());
        }
        if self.unaliased.contains(&import_path) {
            return Some(self.declared_name(&import_path));
        }

        // The package is not imported in this file yet. This happens when a
        // hoisted initialiser's type was only ever implicit, e.g.
        // `var l = pkg.NewLogger()` never names `log.Logger` in source.
        let alias = arbiter.propose_import_alias(&self.declared_name(&import_path), &self.file);
        self.added.push((alias.clone(), import_path.clone()));
        self.aliases.insert(import_path, alias.clone());
        Some(alias)
    }

    /// A package's declared name: from the loaded metadata when known,
    /// otherwise the last path segment.
    fn declared_name(&self, import_path: &str) -> String {
        if let Some(pkg) = self.graph.get(import_path) {
            if !pkg.name.is_empty() {
                return pkg.name.clone();
            }
        }
        import_path
            .rsplit('/')
            .next()
            .unwrap_or(import_path)
            .to_string()
    }
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '/' | '-' | '~')
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

fn starts_ident(s: &str) -> bool {
    s.chars()
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic())
}
