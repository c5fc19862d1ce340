//! Environment abstraction.
//!
//! Every backend implements the [`Environment`] trait so that the driver can
//! interact with it uniformly.
//!
//! Included environments:
//! - **Computer** ([`crate::computer::ComputerEnv`]) -- shell and remote
//!   desktop sandbox backends behind one action model.
//! - **Scripted** ([`scripted`]) -- replays a canned transition script, for
//!   tests and dry runs.

pub mod scripted;
pub mod traits;

pub use scripted::ScriptedEnv;
pub use traits::{compose_step, Environment, Info, StepOutcome};
