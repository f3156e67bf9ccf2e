//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the dataset catalogue (`DataType`)
//! - the raw `Table` every loader starts from
//! - typed records for each dataset (`CdrRecord`, `RechargeRecord`, ...)
//! - merge outputs (`MergedData`)

pub mod types;

pub use types::*;
