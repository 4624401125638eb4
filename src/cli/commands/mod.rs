//! CLI command implementations

pub mod cache;
pub mod completions;
pub mod search;
pub mod show;
pub mod sync;
