//! The agent contract the driver relies on.

use anyhow::Result;

use crate::env::Info;

/// The subset of agent capabilities the driver needs.
///
/// The driver never looks inside observations or actions; it only shuttles
/// them between the environment, the agent and the collector.
#[allow(async_fn_in_trait)]
pub trait Agent<O, A>: Send {
    /// Forget per-episode state. Called once before every episode.
    async fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Choose the next action for `observation`.
    async fn act(&mut self, observation: &O) -> Result<A>;

    /// Incorporate the feedback of the step that just ran. `observation` is
    /// the one produced by `action`.
    async fn update(&mut self, _observation: &O, _action: &A, _reward: f64, _info: &Info) -> Result<()> {
        Ok(())
    }
}
