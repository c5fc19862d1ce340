//! [`Environment`] adapter over any [`Computer`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{ComputerAction, ComputerObservation, ObservationKind};
use super::Computer;
use crate::env::{compose_step, Environment, Info, StepOutcome};
use crate::error::EnvError;

/// Timeout for command actions that do not carry their own.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Reward paid when an action took effect.
pub const SUCCESS_REWARD: f64 = 1.0;
/// Reward paid when an action did not take effect (only reachable under
/// [`ActionFailurePolicy::Penalize`]).
pub const FAILURE_REWARD: f64 = -1.0;

/// What `step` does when an action reports failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionFailurePolicy {
    /// Raise [`EnvError::ActionFailed`] and abort the step.
    #[default]
    Raise,
    /// Record the step with [`FAILURE_REWARD`] and `action_success: false`.
    Penalize,
}

/// Open-ended environment over a [`Computer`].
///
/// Reward is [`SUCCESS_REWARD`] / [`FAILURE_REWARD`], `done` is always
/// `false` and info carries `{"action_success": bool}`. Only the driver's step
/// budget ends an episode.
#[derive(Debug)]
pub struct ComputerEnv<C> {
    computer: C,
    observe: Vec<ObservationKind>,
    failure_policy: ActionFailurePolicy,
    command_timeout: Duration,
    last_success: Option<bool>,
    closed: bool,
}

impl<C: Computer> ComputerEnv<C> {
    /// Wrap `computer`, observing its default observation kinds.
    pub fn new(computer: C) -> Self {
        let observe = computer.default_observation();
        Self {
            computer,
            observe,
            failure_policy: ActionFailurePolicy::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            last_success: None,
            closed: false,
        }
    }

    /// Replace the observation kinds captured on every observation.
    pub fn with_observation(mut self, kinds: impl IntoIterator<Item = ObservationKind>) -> Self {
        self.observe = kinds.into_iter().collect();
        self
    }

    pub fn with_failure_policy(mut self, policy: ActionFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn computer(&self) -> &C {
        &self.computer
    }

    pub fn computer_mut(&mut self) -> &mut C {
        &mut self.computer
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), EnvError> {
        if self.closed {
            return Err(EnvError::Closed);
        }
        Ok(())
    }

    async fn dispatch(&mut self, action: &ComputerAction) -> Result<bool, EnvError> {
        let computer = &mut self.computer;
        match action {
            ComputerAction::Command {
                command,
                timeout_secs,
            } => {
                let timeout = timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(self.command_timeout);
                computer.run_command(command, timeout).await
            }
            ComputerAction::KeyDown { key } => computer.key_down(*key).await,
            ComputerAction::KeyUp { key } => computer.key_up(*key).await,
            ComputerAction::Type { text } => computer.type_text(text).await,
            ComputerAction::MouseMove { x, y } => computer.mouse_move(*x, *y).await,
            ComputerAction::MouseScroll { amount } => computer.mouse_scroll(*amount).await,
            ComputerAction::MouseButtonDown { button } => computer.mouse_button_down(*button).await,
            ComputerAction::MouseButtonUp { button } => computer.mouse_button_up(*button).await,
        }
    }
}

impl<C: Computer> Environment for ComputerEnv<C> {
    type Observation = ComputerObservation;
    type Action = ComputerAction;

    async fn reset(&mut self) -> Result<ComputerObservation, EnvError> {
        self.ensure_open()?;
        self.computer.reset().await?;
        self.last_success = None;
        tracing::debug!(backend = self.computer.name(), "computer env reset");
        self.get_observation().await
    }

    async fn step(
        &mut self,
        action: &ComputerAction,
    ) -> Result<StepOutcome<ComputerObservation>, EnvError> {
        match self.failure_policy {
            ActionFailurePolicy::Raise => compose_step(self, action).await,
            ActionFailurePolicy::Penalize => {
                let success = self.execute_action(action).await?;
                if !success {
                    tracing::warn!(
                        backend = self.computer.name(),
                        kind = action.kind(),
                        "action failed, penalizing"
                    );
                }
                let observation = self.get_observation().await?;
                Ok(StepOutcome {
                    observation,
                    reward: self.get_reward(action),
                    done: self.get_done(action),
                    info: self.get_info(),
                })
            }
        }
    }

    async fn execute_action(&mut self, action: &ComputerAction) -> Result<bool, EnvError> {
        self.ensure_open()?;
        let success = self.dispatch(action).await?;
        self.last_success = Some(success);
        tracing::debug!(
            backend = self.computer.name(),
            kind = action.kind(),
            success,
            "executed action"
        );
        Ok(success)
    }

    async fn get_observation(&mut self) -> Result<ComputerObservation, EnvError> {
        self.ensure_open()?;
        let mut observation = ComputerObservation::default();
        for kind in &self.observe {
            match kind {
                ObservationKind::Screenshot => {
                    observation.screenshot = Some(self.computer.screenshot().await?)
                }
                ObservationKind::MouseState => {
                    observation.mouse_state = Some(self.computer.mouse_state().await?)
                }
                ObservationKind::KeyboardState => {
                    observation.keyboard_state = Some(self.computer.keyboard_state().await?)
                }
                ObservationKind::Terminal => {
                    observation.terminal = Some(self.computer.terminal().await?)
                }
            }
        }
        Ok(observation)
    }

    fn get_reward(&self, _action: &ComputerAction) -> f64 {
        match self.last_success {
            Some(true) => SUCCESS_REWARD,
            _ => FAILURE_REWARD,
        }
    }

    fn get_done(&self, _action: &ComputerAction) -> bool {
        false
    }

    fn get_info(&self) -> Info {
        let mut info = Info::new();
        info.insert(
            "action_success".into(),
            self.last_success.unwrap_or(false).into(),
        );
        info
    }

    async fn close(&mut self) -> Result<(), EnvError> {
        self.ensure_open()?;
        self.closed = true;
        tracing::info!(backend = self.computer.name(), "closing computer env");
        self.computer.close().await
    }
}
