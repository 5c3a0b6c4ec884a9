//! Go modules as the loader reports them.

use std::path::{Path, PathBuf};

/// A versioned source boundary with its own `go.mod`.
///
/// Mirrors the `Module` object in `go list -json` output. Programs hold
/// their owning module by value; the reconciler compares modules by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Module path, e.g. `github.com/u-root/u-root`.
    pub path: String,

    /// Root directory of the module on the local filesystem.
    pub dir: PathBuf,

    /// Path to the module's `go.mod`.
    pub go_mod: PathBuf,

    /// Version, empty for the main module or local replacements.
    pub version: Option<String>,

    /// Whether this is the main module of its `go list` invocation.
    pub main: bool,

    /// Replacement applied to this module, if any.
    pub replace: Option<ModuleReplacement>,
}

/// The target of a `replace` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReplacement {
    /// Replacement module path. A filesystem path (starting with `./`,
    /// `../`, or `/`) means a local directory replacement.
    pub path: String,

    /// Replacement version; absent for local directory replacements.
    pub version: Option<String>,

    /// Resolved directory of the replacement.
    pub dir: Option<PathBuf>,
}

impl ModuleReplacement {
    /// Whether the replacement points at a local directory.
    ///
    /// Per the Go module reference, a `replace` target beginning with `./`
    /// or `../` (or an absolute path) is a local file path and carries no
    /// version.
    pub fn is_local(&self) -> bool {
        self.path.starts_with("./") || self.path.starts_with("../") || self.path.starts_with('/')
    }
}

impl Module {
    /// Whether this module resolves to a local directory replacement.
    pub fn is_replaced_local(&self) -> bool {
        self.replace.as_ref().is_some_and(|r| r.is_local())
    }

    /// The directory the module's source actually lives in, following a
    /// local replacement if one applies.
    pub fn effective_dir(&self) -> &Path {
        if let Some(replace) = &self.replace {
            if let Some(dir) = &replace.dir {
                return dir;
            }
        }
        &self.dir
    }

    /// Human-readable identity for conflict messages: a directory for local
    /// replacements, a version otherwise.
    pub fn identifier(&self) -> String {
        if let Some(replace) = &self.replace {
            if replace.is_local() {
                return format!("directory {}", replace.path);
            }
        }
        match &self.version {
            Some(v) if !v.is_empty() => format!("version {}", v),
            _ => format!("directory {}", self.dir.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacement_locality() {
        let local = ModuleReplacement {
            path: "../dep".to_string(),
            version: None,
            dir: Some(PathBuf::from("/src/dep")),
        };
        assert!(local.is_local());

        let remote = ModuleReplacement {
            path: "example.com/fork/dep".to_string(),
            version: Some("v1.2.0".to_string()),
            dir: None,
        };
        assert!(!remote.is_local());
    }

    #[test]
    fn test_identifier() {
        let m = Module {
            path: "example.com/dep".to_string(),
            dir: PathBuf::from("/gocache/example.com/dep@v1.0.0"),
            go_mod: PathBuf::from("/gocache/example.com/dep@v1.0.0/go.mod"),
            version: Some("v1.0.0".to_string()),
            main: false,
            replace: None,
        };
        assert_eq!(m.identifier(), "version v1.0.0");

        let replaced = Module {
            replace: Some(ModuleReplacement {
                path: "../dep".to_string(),
                version: None,
                dir: Some(PathBuf::from("/src/dep")),
            }),
            ..m
        };
        assert_eq!(replaced.identifier(), "directory ../dep");
        assert_eq!(replaced.effective_dir(), Path::new("/src/dep"));
    }
}
