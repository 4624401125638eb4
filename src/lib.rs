//! GeoRescue: offline-first lookup of utility installations
//!
//! Field crews search installations by number, name or address. The full
//! record set is mirrored into a local SQLite cache so lookups keep working
//! without a connection; searches go to the backend when online and fall
//! back to the cache otherwise.

pub mod cli;
pub mod core;
