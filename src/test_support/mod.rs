//! Shared test fixtures.
//!
//! Everything the toolchain would normally provide arrives canned here, so
//! unit tests never need a Go installation: `go list -json` streams,
//! `gobb-inspect` reports, and small Go programs for the rewriter.

pub mod canned;
