//! Core data model: build environment, modules, and programs.

pub mod env;
pub mod module;
pub mod program;

pub use env::GoEnv;
pub use module::{Module, ModuleReplacement};
pub use program::{sanitize_package_ident, Analysis, ExprRef, InitEntry, Program};
