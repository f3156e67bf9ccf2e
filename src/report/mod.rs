//! Reporting utilities: formatted terminal output for config, grids and loaded data.

pub mod format;

pub use format::*;
