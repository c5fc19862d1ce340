//! Scripted in-memory environment.
//!
//! [`ScriptedEnv`] replays a canned sequence of `(observation, reward, done)`
//! transitions regardless of the actions it receives. It makes it possible to
//! exercise the driver, the collector and agents deterministically without a
//! desktop, and backs the `scripted` dry-run backend of the binary.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::traits::Environment;
use crate::computer::ComputerAction;
use crate::error::EnvError;

/// Observation reported once the script has been exhausted.
pub const EXHAUSTED_OBSERVATION: &str = "Nothing happens.";

/// A single canned transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedStep {
    pub observation: String,
    pub reward: f64,
    pub done: bool,
}

/// An environment that replays a fixed script.
///
/// Every reset rewinds to the start of the script. Once the script runs out
/// each further step yields [`EXHAUSTED_OBSERVATION`] with zero reward and
/// `done == false`, so only the driver's step budget ends such an episode.
#[derive(Debug, Clone)]
pub struct ScriptedEnv<A = ComputerAction> {
    initial_observation: String,
    steps: Vec<ScriptedStep>,
    /// 1-based step index whose action is reported as failed.
    fail_at: Option<usize>,
    /// Number of actions executed since the last reset.
    cursor: usize,
    resets: usize,
    executed: Vec<A>,
    closed: bool,
}

impl<A> ScriptedEnv<A> {
    /// Create an empty script starting from `initial_observation`.
    pub fn new(initial_observation: impl Into<String>) -> Self {
        Self {
            initial_observation: initial_observation.into(),
            steps: Vec::new(),
            fail_at: None,
            cursor: 0,
            resets: 0,
            executed: Vec::new(),
            closed: false,
        }
    }

    /// An open-ended script: `len` steps paying `reward` each, never done.
    pub fn constant(len: usize, reward: f64) -> Self {
        let mut env = Self::new("ready");
        for i in 0..len {
            env = env.then(format!("state {}", i + 1), reward, false);
        }
        env
    }

    /// Append one transition to the script.
    pub fn then(mut self, observation: impl Into<String>, reward: f64, done: bool) -> Self {
        self.steps.push(ScriptedStep {
            observation: observation.into(),
            reward,
            done,
        });
        self
    }

    /// Make the action of the given 1-based step fail to execute.
    pub fn fail_at(mut self, step: usize) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Actions executed since the last reset, in order.
    pub fn executed(&self) -> &[A] {
        &self.executed
    }

    pub fn reset_count(&self) -> usize {
        self.resets
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn current(&self) -> Option<&ScriptedStep> {
        match self.cursor {
            0 => None,
            n => self.steps.get(n - 1),
        }
    }

    fn ensure_open(&self) -> Result<(), EnvError> {
        if self.closed {
            return Err(EnvError::Closed);
        }
        Ok(())
    }
}

impl<A> Environment for ScriptedEnv<A>
where
    A: Clone + Debug + Serialize + DeserializeOwned + Send,
{
    type Observation = String;
    type Action = A;

    async fn reset(&mut self) -> Result<String, EnvError> {
        self.ensure_open()?;
        self.cursor = 0;
        self.resets += 1;
        self.executed.clear();
        tracing::debug!(resets = self.resets, "scripted env reset");
        Ok(self.initial_observation.clone())
    }

    async fn execute_action(&mut self, action: &A) -> Result<bool, EnvError> {
        self.ensure_open()?;
        self.cursor += 1;
        self.executed.push(action.clone());
        Ok(self.fail_at != Some(self.cursor))
    }

    async fn get_observation(&mut self) -> Result<String, EnvError> {
        self.ensure_open()?;
        Ok(match (self.cursor, self.current()) {
            (0, _) => self.initial_observation.clone(),
            (_, Some(step)) => step.observation.clone(),
            (_, None) => EXHAUSTED_OBSERVATION.to_string(),
        })
    }

    fn get_reward(&self, _action: &A) -> f64 {
        self.current().map_or(0.0, |s| s.reward)
    }

    fn get_done(&self, _action: &A) -> bool {
        self.current().is_some_and(|s| s.done)
    }

    fn get_info(&self) -> super::Info {
        let mut info = super::Info::new();
        info.insert("step".into(), self.cursor.into());
        info
    }

    async fn close(&mut self) -> Result<(), EnvError> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }
}
