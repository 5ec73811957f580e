//! Command line interface module
//!
//! Argument parsing and the runner that loads both configuration documents
//! and drives the sync.

pub mod args;
pub mod runner;

pub use args::Args;
pub use runner::Runner;
