//! The loaded package universe and its import graph.
//!
//! Holds every package `go list -deps` reported (programs, their
//! dependencies, and the standard library) keyed by import path, plus a
//! directed import graph used for dependency visits, vendor-name lookup,
//! and the module conflict scan. Nodes and edges are inserted in sorted
//! order, so traversals are deterministic.

use std::collections::BTreeMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use crate::loader::golist::GoListPackage;

/// All loaded packages and their import relationships.
#[derive(Debug, Default)]
pub struct PackageGraph {
    packages: BTreeMap<String, GoListPackage>,
    node_ids: BTreeMap<String, NodeIndex>,
    graph: DiGraph<String, ()>,
}

impl PackageGraph {
    /// Build the graph from every loaded batch. Later duplicates of an
    /// import path are ignored; batches agree on shared dependencies.
    pub fn from_packages(pkgs: impl IntoIterator<Item = GoListPackage>) -> Self {
        let mut packages: BTreeMap<String, GoListPackage> = BTreeMap::new();
        for p in pkgs {
            packages.entry(p.import_path.clone()).or_insert(p);
        }

        let mut graph = DiGraph::new();
        let mut node_ids = BTreeMap::new();
        for path in packages.keys() {
            let id = graph.add_node(path.clone());
            node_ids.insert(path.clone(), id);
        }
        for (path, pkg) in &packages {
            let from = node_ids[path];
            // Imports are as-written; translate vendored ones so the edge
            // points at the package actually loaded.
            for import in &pkg.imports {
                let resolved = pkg.import_map.get(import).unwrap_or(import);
                if let Some(&to) = node_ids.get(resolved) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        PackageGraph {
            packages,
            node_ids,
            graph,
        }
    }

    /// Look up a package by import path.
    pub fn get(&self, import_path: &str) -> Option<&GoListPackage> {
        self.packages.get(import_path)
    }

    /// All packages, in import-path order.
    pub fn packages(&self) -> impl Iterator<Item = &GoListPackage> {
        self.packages.values()
    }

    /// Visit `root` and every package reachable from it.
    pub fn visit_deps<'a>(&'a self, root: &str, mut f: impl FnMut(&'a GoListPackage)) {
        let Some(&start) = self.node_ids.get(root) else {
            return;
        };
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(node) = dfs.next(&self.graph) {
            if let Some(pkg) = self.packages.get(&self.graph[node]) {
                f(pkg);
            }
        }
    }

    /// Collect the packages reachable from `root` for which `filter`
    /// returns true, in deterministic (import-path) order.
    pub fn deps_where(
        &self,
        root: &str,
        mut filter: impl FnMut(&GoListPackage) -> bool,
    ) -> Vec<&GoListPackage> {
        let mut hits: BTreeMap<&str, &GoListPackage> = BTreeMap::new();
        self.visit_deps(root, |pkg| {
            if filter(pkg) {
                hits.insert(&pkg.import_path, pkg);
            }
        });
        hits.into_values().collect()
    }

    /// The import path to *write in source* for a type-checker package
    /// path, seen from somewhere in `root`'s dependency tree.
    ///
    /// Vendored packages type-check under their vendored path (e.g.
    /// `example.com/m/vendor/golang.org/x/sys/unix`) while source imports
    /// them by the short path. The reverse mapping lives in the packages'
    /// `ImportMap` tables; if no tree mentions the path, it is importable
    /// as itself.
    pub fn import_name(&self, root: &str, type_pkg_path: &str) -> String {
        let mut found: Option<String> = None;
        self.visit_deps(root, |pkg| {
            if found.is_some() {
                return;
            }
            for (source_import, resolved) in &pkg.import_map {
                if resolved == type_pkg_path {
                    found = Some(source_import.clone());
                    return;
                }
            }
        });
        found.unwrap_or_else(|| type_pkg_path.to_string())
    }
}
