//! Common module - shared helpers used by the registry transport and the
//! sync orchestrator.

pub mod utils;

pub use utils::*;
