//! Input/output helpers.
//!
//! - CSV ingest + column normalization (`ingest`)
//! - GeoJSON shapefiles (`geo`)
//! - merged-data and grid exports (`export`)

pub mod export;
pub mod geo;
pub mod ingest;

pub use export::*;
pub use geo::*;
pub use ingest::*;
