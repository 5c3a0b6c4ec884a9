//! High-level operations driven by the CLI.

pub mod build_busybox;

pub use build_busybox::{build_busybox, BuildBusyboxOpts};
