//! Core environment trait and shared types.
//!
//! Every backend (scripted, shell, remote desktop sandbox, ...) implements the
//! [`Environment`] trait so that the driver can interact with it uniformly.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Auxiliary per-step diagnostics reported by an environment.
pub type Info = serde_json::Map<String, serde_json::Value>;

/// The result of applying one action: `(observation, reward, done, info)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome<O> {
    /// The observation after the action was applied.
    pub observation: O,
    /// The scalar reward for this transition.
    pub reward: f64,
    /// Whether the episode has terminated.
    pub done: bool,
    /// Backend-specific diagnostics.
    pub info: Info,
}

/// The core environment trait.
///
/// Backends only have to provide the primitive hooks; [`step`](Self::step)
/// has a default composition (see [`compose_step`]) that any backend may
/// override.
///
/// An environment is owned by exactly one episode at a time. None of the
/// methods are meant to be called concurrently on the same instance.
#[allow(async_fn_in_trait)]
pub trait Environment: Send {
    /// What the environment returns. Treated as opaque by the driver and the
    /// collector.
    type Observation: Clone + Debug + Serialize + DeserializeOwned + Send;
    /// What the environment accepts. Treated as opaque by the driver and the
    /// collector.
    type Action: Clone + Debug + Serialize + DeserializeOwned + Send;

    /// Re-initialise backend state and return the first observation.
    ///
    /// Must be safe to call repeatedly. The default simply observes.
    async fn reset(&mut self) -> Result<Self::Observation, EnvError> {
        self.get_observation().await
    }

    /// Apply `action` and report the resulting transition.
    async fn step(
        &mut self,
        action: &Self::Action,
    ) -> Result<StepOutcome<Self::Observation>, EnvError> {
        compose_step(self, action).await
    }

    /// Apply `action` to the backend.
    ///
    /// Returns `Ok(false)` for expected failures (the action did not take
    /// effect) and `Err` for unsupported action kinds or backend faults.
    async fn execute_action(&mut self, action: &Self::Action) -> Result<bool, EnvError>;

    /// Capture the current observation.
    async fn get_observation(&mut self) -> Result<Self::Observation, EnvError>;

    /// Reward for the action that was just executed.
    fn get_reward(&self, action: &Self::Action) -> f64;

    /// Whether the episode ended with the action that was just executed.
    fn get_done(&self, action: &Self::Action) -> bool;

    /// Extra diagnostics for the last transition. Empty by default.
    fn get_info(&self) -> Info {
        Info::new()
    }

    /// Release backend resources (processes, connections, sandboxes).
    async fn close(&mut self) -> Result<(), EnvError>;
}

/// The default `step` policy:
///
/// `execute_action` → fail with [`EnvError::ActionFailed`] if it reported
/// failure → `get_observation` → `get_reward` → `get_done` → `get_info`.
///
/// Exposed as a free function so that backends overriding `step` can still
/// fall back to it.
pub async fn compose_step<E>(
    env: &mut E,
    action: &E::Action,
) -> Result<StepOutcome<E::Observation>, EnvError>
where
    E: Environment + ?Sized,
{
    if !env.execute_action(action).await? {
        return Err(EnvError::action_failed(action));
    }
    let observation = env.get_observation().await?;
    let reward = env.get_reward(action);
    let done = env.get_done(action);
    let info = env.get_info();

    Ok(StepOutcome {
        observation,
        reward,
        done,
        info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts calls and fails every action containing "bad".
    #[derive(Default)]
    struct CountingEnv {
        executed: Vec<String>,
        observed: usize,
        closed: bool,
    }

    impl Environment for CountingEnv {
        type Observation = usize;
        type Action = String;

        async fn execute_action(&mut self, action: &String) -> Result<bool, EnvError> {
            self.executed.push(action.clone());
            Ok(!action.contains("bad"))
        }

        async fn get_observation(&mut self) -> Result<usize, EnvError> {
            self.observed += 1;
            Ok(self.observed)
        }

        fn get_reward(&self, _action: &String) -> f64 {
            0.5
        }

        fn get_done(&self, action: &String) -> bool {
            action == "stop"
        }

        async fn close(&mut self) -> Result<(), EnvError> {
            self.closed = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_reset_observes() {
        let mut env = CountingEnv::default();
        assert_eq!(env.reset().await.unwrap(), 1);
        assert_eq!(env.reset().await.unwrap(), 2);
        assert!(env.executed.is_empty());
    }

    #[tokio::test]
    async fn default_step_composes_hooks() {
        let mut env = CountingEnv::default();
        let outcome = env.step(&"click".to_string()).await.unwrap();
        assert_eq!(outcome.observation, 1);
        assert!((outcome.reward - 0.5).abs() < f64::EPSILON);
        assert!(!outcome.done);
        assert!(outcome.info.is_empty());

        let outcome = env.step(&"stop".to_string()).await.unwrap();
        assert!(outcome.done);
    }

    #[tokio::test]
    async fn failed_action_raises_without_observing() {
        let mut env = CountingEnv::default();
        let err = env.step(&"bad click".to_string()).await.unwrap_err();
        match err {
            EnvError::ActionFailed { action } => assert!(action.contains("bad click")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(env.observed, 0);
        assert_eq!(env.executed, vec!["bad click".to_string()]);
    }
}
