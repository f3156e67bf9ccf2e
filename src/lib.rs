//! `cider` library crate.
//!
//! The binary (`cider`) is a thin wrapper around this library so that:
//!
//! - config loading, validation and the data store are testable without spawning processes
//! - the pipeline stages that consume the config can link the library directly

pub mod app;
pub mod cli;
pub mod config;
pub mod datastore;
pub mod domain;
pub mod error;
pub mod grid;
pub mod io;
pub mod report;
