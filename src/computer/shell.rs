//! Local shell backend.
//!
//! [`ShellComputer`] executes [`Command`](super::ComputerAction::Command)
//! actions through a local shell (`sh -c` by default) and exposes the output
//! of the last command as the terminal observation. It has no screen, mouse
//! or keyboard, so every other capability is unsupported.

use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;

use super::types::{ObservationKind, TerminalOutput};
use super::Computer;
use crate::error::EnvError;

/// Runs commands in a local shell.
#[derive(Debug, Clone)]
pub struct ShellComputer {
    /// Shell program invoked as `<program> -c <command>`.
    program: String,
    last: Option<TerminalOutput>,
}

impl ShellComputer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            last: None,
        }
    }

    /// Output of the most recent command, if any ran.
    pub fn last_output(&self) -> Option<&TerminalOutput> {
        self.last.as_ref()
    }
}

impl Default for ShellComputer {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl Computer for ShellComputer {
    fn name(&self) -> &str {
        "shell"
    }

    fn default_observation(&self) -> Vec<ObservationKind> {
        vec![ObservationKind::Terminal]
    }

    async fn reset(&mut self) -> Result<(), EnvError> {
        self.last = None;
        Ok(())
    }

    async fn terminal(&mut self) -> Result<TerminalOutput, EnvError> {
        Ok(self.last.clone().unwrap_or_default())
    }

    async fn run_command(&mut self, command: &str, timeout: Duration) -> Result<bool, EnvError> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let result = tokio::time::timeout(timeout, cmd.output()).await;
        let output = match result {
            Err(_) => {
                tracing::warn!(command, timeout_secs = timeout.as_secs_f64(), "command timed out");
                self.last = Some(TerminalOutput {
                    command: command.to_string(),
                    timed_out: true,
                    ..Default::default()
                });
                return Ok(false);
            }
            Ok(spawned) => spawned
                .with_context(|| format!("failed to run `{}` for command {command:?}", self.program))?,
        };

        let success = output.status.success();
        tracing::debug!(command, exit_code = output.status.code(), success, "command finished");
        self.last = Some(TerminalOutput {
            command: command.to_string(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
        });
        Ok(success)
    }

    async fn close(&mut self) -> Result<(), EnvError> {
        self.last = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computer::{ComputerAction, ComputerEnv, ObservationKind};
    use crate::env::Environment;

    #[tokio::test]
    async fn successful_command_is_observed() {
        let mut shell = ShellComputer::default();
        let ok = shell
            .run_command("echo hello", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(ok);
        let out = shell.terminal().await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.exit_code, Some(0));
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_expected_failure() {
        let mut shell = ShellComputer::default();
        let ok = shell
            .run_command("echo oops >&2; exit 3", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!ok);
        let out = shell.last_output().unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn timeout_is_an_expected_failure() {
        let mut shell = ShellComputer::default();
        let ok = shell
            .run_command("sleep 5", Duration::from_millis(100))
            .await
            .unwrap();
        assert!(!ok);
        assert!(shell.last_output().unwrap().timed_out);
    }

    #[tokio::test]
    async fn missing_shell_is_a_backend_fault() {
        let mut shell = ShellComputer::new("/nonexistent/shell-binary");
        let err = shell
            .run_command("true", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EnvError::Backend(_)));
    }

    #[tokio::test]
    async fn keyboard_state_is_unsupported() {
        let mut env = ComputerEnv::new(ShellComputer::default())
            .with_observation([ObservationKind::Terminal, ObservationKind::KeyboardState]);
        let err = env.reset().await.unwrap_err();
        assert!(err.is_unsupported());
    }

    #[tokio::test]
    async fn shell_env_steps_commands() {
        let mut env = ComputerEnv::new(ShellComputer::default());
        let first = env.reset().await.unwrap();
        assert_eq!(first.terminal.unwrap().command, "");

        let outcome = env
            .step(&ComputerAction::Command {
                command: "printf done".into(),
                timeout_secs: Some(5),
            })
            .await
            .unwrap();
        assert_eq!(outcome.observation.terminal.unwrap().stdout, "done");
        assert!((outcome.reward - 1.0).abs() < f64::EPSILON);

        let err = env
            .step(&ComputerAction::Type { text: "hi".into() })
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}
