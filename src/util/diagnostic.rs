//! User-friendly diagnostic messages.
//!
//! Every user-input error should carry its root cause, the conflicting
//! pieces of state, and a suggested fix. Module conflicts in particular are
//! reported with a ready-to-paste `replace` directive.

use std::fmt;
use std::path::PathBuf;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when no pattern matched anything.
    pub const NO_MATCH: &str =
        "help: patterns may be directories, Go package paths, or globs; `-pattern` excludes";

    /// Suggestion when two commands share a name.
    pub const DUPLICATE_COMMAND: &str =
        "help: exclude one of the colliding commands with a leading `-` pattern";

    /// Suggestion when the compiler cannot be found.
    pub const NO_GO: &str = "help: install Go or point GOBB_GO at the compiler binary";

    /// Suggestion when the type-analysis helper cannot be found.
    pub const NO_INSPECTOR: &str =
        "help: run `go install ./tools/inspect` or point GOBB_INSPECT at the helper";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Warning,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, "\n  --> {}", loc.display())?;
        }
        for line in &self.context {
            write!(f, "\n  {}", line)?;
        }
        for suggestion in &self.suggestions {
            write!(f, "\n{}", suggestion)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_suggestion() {
        let d = Diagnostic::error("conflicting module dependencies on example.com/dep")
            .with_context("example.com/mod5 uses version v1.0.0")
            .with_context("your request uses directory /src/dep")
            .with_suggestion("Suggestion to resolve: add `replace example.com/dep => ../dep` to /src/mod5/go.mod");

        let text = d.to_string();
        assert!(text.starts_with("error: conflicting module dependencies"));
        assert!(text.contains("uses version v1.0.0"));
        assert!(text.contains("add `replace example.com/dep => ../dep`"));
    }

    #[test]
    fn test_warning_severity() {
        let d = Diagnostic::warning("skipping package").with_location("/tmp/pkg");
        assert!(d.to_string().starts_with("warning: skipping package"));
        assert!(d.to_string().contains("--> /tmp/pkg"));
    }
}
