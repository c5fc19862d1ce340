//! An agent that replays a fixed list of actions.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;

use super::traits::Agent;
use crate::env::Info;

/// Replays its actions in order, wrapping around when it runs out.
///
/// Useful for smoke-testing backends and for deterministic tests of the
/// driver. It ignores observations entirely.
#[derive(Debug, Clone)]
pub struct ScriptedAgent<A> {
    actions: Vec<A>,
    cursor: usize,
    mandate: Option<String>,
    updates: usize,
    feedback_reward: f64,
}

impl<A> ScriptedAgent<A> {
    pub fn new(actions: Vec<A>) -> Self {
        Self {
            actions,
            cursor: 0,
            mandate: None,
            updates: 0,
            feedback_reward: 0.0,
        }
    }

    /// Attach the instruction this agent is nominally pursuing.
    pub fn with_mandate(mut self, mandate: impl Into<String>) -> Self {
        self.mandate = Some(mandate.into());
        self
    }

    pub fn mandate(&self) -> Option<&str> {
        self.mandate.as_deref()
    }

    /// Number of `update` calls in the current episode.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Sum of rewards reported through `update` in the current episode.
    pub fn feedback_reward(&self) -> f64 {
        self.feedback_reward
    }
}

impl<A: DeserializeOwned> ScriptedAgent<A> {
    /// Load the action list from a JSON array file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read actions from {}", path.display()))?;
        let actions: Vec<A> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse actions from {}", path.display()))?;
        Ok(Self::new(actions))
    }
}

impl<O, A: Clone + Send> Agent<O, A> for ScriptedAgent<A> {
    async fn reset(&mut self) -> Result<()> {
        self.cursor = 0;
        self.updates = 0;
        self.feedback_reward = 0.0;
        Ok(())
    }

    async fn act(&mut self, _observation: &O) -> Result<A> {
        if self.actions.is_empty() {
            bail!("scripted agent has no actions");
        }
        let action = self.actions[self.cursor % self.actions.len()].clone();
        self.cursor += 1;
        Ok(action)
    }

    async fn update(&mut self, _observation: &O, _action: &A, reward: f64, _info: &Info) -> Result<()> {
        self.updates += 1;
        self.feedback_reward += reward;
        Ok(())
    }
}
