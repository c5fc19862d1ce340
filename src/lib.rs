//! deskgym: drive agents against controllable desktops and record what happened.
//!
//! The core is the interaction loop: an [`env::Environment`] contract, an
//! [`agent::Agent`] contract, a [`trajectory::Collector`] that records and
//! persists episodes, and the [`driver::Driver`] that ties them together.
//! [`computer`] adapts desktop-style backends to the environment contract.

pub mod agent;
pub mod computer;
pub mod config;
pub mod driver;
pub mod env;
pub mod error;
pub mod parser;
pub mod trajectory;
