//! Desktop-style backends.
//!
//! A [`Computer`] exposes one primitive per action kind and per observation
//! kind. [`ComputerEnv`] turns any computer into an
//! [`Environment`](crate::env::Environment) by dispatching each
//! [`ComputerAction`] to exactly one primitive.
//!
//! Included backends:
//! - **Shell** ([`shell`]) -- runs command actions in a local shell.
//! - **Sandbox** ([`sandbox`]) -- drives a remote desktop sandbox over HTTP.
//!
//! Every primitive defaults to [`EnvError::Unsupported`], so a backend only
//! implements the capabilities it actually has.
//!
//! ## Expected failure vs. fault
//!
//! Action primitives return `Ok(false)` when the backend ran the action and
//! it did not take effect (non-zero exit status, a timed-out command, the
//! sandbox answering `success: false`). They return `Err` for transport
//! errors, spawn failures and malformed responses.

pub mod env;
pub mod sandbox;
pub mod shell;
pub mod types;

use std::time::Duration;

pub use env::{ActionFailurePolicy, ComputerEnv};
pub use sandbox::SandboxComputer;
pub use shell::ShellComputer;
pub use types::{
    ComputerAction, ComputerObservation, KeyboardKey, KeyboardState, MouseButton, MouseState,
    ObservationKind, Screenshot, TerminalOutput,
};

use crate::error::EnvError;

/// The primitives of a controllable desktop.
#[allow(async_fn_in_trait)]
pub trait Computer: Send {
    /// Short backend name used in logs and unsupported-capability errors.
    fn name(&self) -> &str;

    /// Observation kinds captured when the environment is not told otherwise.
    fn default_observation(&self) -> Vec<ObservationKind> {
        vec![ObservationKind::Screenshot]
    }

    fn unsupported(&self, capability: &'static str) -> EnvError {
        EnvError::unsupported(self.name(), capability)
    }

    /// Bring the desktop back to a neutral state.
    async fn reset(&mut self) -> Result<(), EnvError> {
        Ok(())
    }

    // -- observations -------------------------------------------------------

    async fn screenshot(&mut self) -> Result<Screenshot, EnvError> {
        Err(self.unsupported("screenshot observation"))
    }

    async fn mouse_state(&mut self) -> Result<MouseState, EnvError> {
        Err(self.unsupported("mouse state observation"))
    }

    async fn keyboard_state(&mut self) -> Result<KeyboardState, EnvError> {
        Err(self.unsupported("keyboard state observation"))
    }

    async fn terminal(&mut self) -> Result<TerminalOutput, EnvError> {
        Err(self.unsupported("terminal observation"))
    }

    // -- actions ------------------------------------------------------------

    async fn run_command(&mut self, _command: &str, _timeout: Duration) -> Result<bool, EnvError> {
        Err(self.unsupported("command action"))
    }

    async fn key_down(&mut self, _key: KeyboardKey) -> Result<bool, EnvError> {
        Err(self.unsupported("key down action"))
    }

    async fn key_up(&mut self, _key: KeyboardKey) -> Result<bool, EnvError> {
        Err(self.unsupported("key up action"))
    }

    async fn type_text(&mut self, _text: &str) -> Result<bool, EnvError> {
        Err(self.unsupported("type action"))
    }

    async fn mouse_move(&mut self, _x: i32, _y: i32) -> Result<bool, EnvError> {
        Err(self.unsupported("mouse move action"))
    }

    async fn mouse_scroll(&mut self, _amount: i32) -> Result<bool, EnvError> {
        Err(self.unsupported("mouse scroll action"))
    }

    async fn mouse_button_down(&mut self, _button: MouseButton) -> Result<bool, EnvError> {
        Err(self.unsupported("mouse button down action"))
    }

    async fn mouse_button_up(&mut self, _button: MouseButton) -> Result<bool, EnvError> {
        Err(self.unsupported("mouse button up action"))
    }

    /// Release whatever the backend holds. Called at most once by
    /// [`ComputerEnv`].
    async fn close(&mut self) -> Result<(), EnvError>;
}
