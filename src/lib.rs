//! compat-advisor: package and API compatibility analysis for platform
//! upgrades
//!
//! The library takes a batch of `(package, version)` identities and the API
//! usages observed under each, resolves authoritative compatibility facts
//! from ranked data sources, and answers with a verdict plus an upgrade or
//! replacement recommendation per entry.

pub mod cli;
pub mod compat;
pub mod config;
