//! Agents: the policy side of the interaction loop.
//!
//! The core only defines the [`Agent`] contract. Decision logic lives
//! outside the crate; [`ScriptedAgent`] replays fixed actions for dry runs
//! and tests.

pub mod scripted;
pub mod traits;

pub use scripted::ScriptedAgent;
pub use traits::Agent;
