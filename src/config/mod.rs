//! Pipeline configuration: typed sections, loading, and validation.
//!
//! - `types`: the YAML schema as Rust structs
//! - `load`: locating and parsing config files
//! - `validate`: range and cross-field checks with accumulated issues

pub mod load;
pub mod types;
pub mod validate;

pub use load::*;
pub use types::*;
pub use validate::*;
