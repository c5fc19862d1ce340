//! Episode recording.
//!
//! This module provides:
//! - [`types::Episode`] -- parallel observation/action/reward/info sequences
//!   plus the running total reward of one episode.
//! - [`types::EpisodeRecord`] -- the persisted document for a saved episode.
//! - [`collector::Collector`] and [`collector::JsonCollector`] -- the
//!   accumulate-then-persist layer the driver feeds every transition to.

pub mod collector;
pub mod types;

pub use collector::{Collector, JsonCollector};
pub use types::{Episode, EpisodeRecord, Step, Trajectory};
