//! `roster-animator` - lifecycle animation controller for rosters
//!
//! Tracks which entities of an asynchronously refreshed roster are newly
//! created, entering, or exiting, and drives the cancellable delayed
//! transitions between those states.

pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod scenario;
pub mod store;
