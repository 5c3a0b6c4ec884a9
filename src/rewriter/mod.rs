//! The Go source-to-source rewriter.
//!
//! Submodules, bottom up: [`lexer`] scans tokens with byte spans, [`decls`]
//! finds the top-level declarations the rewrite touches, [`edit`] applies
//! byte-range replacements, [`names`] arbitrates fresh identifiers,
//! [`qualify`] renders lifted types into a file's namespace, and
//! [`rewrite`] ties it all together per program.

pub mod decls;
pub mod edit;
pub mod lexer;
pub mod names;
pub mod qualify;
pub mod rewrite;

pub use names::NameArbiter;
pub use rewrite::{rewrite_program, rewrite_sources, RewrittenFile};
