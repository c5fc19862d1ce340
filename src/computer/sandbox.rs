//! Remote desktop sandbox backend.
//!
//! [`SandboxComputer`] drives a desktop sandbox service over HTTP. A session
//! is created by [`SandboxComputer::connect`] and deleted by `close()`.
//!
//! Expected endpoints (all JSON):
//! - `POST   {base_url}/sessions`                 -- body `{"video_stream": bool}`, returns `{"session_id": ".."}`
//! - `DELETE {base_url}/sessions/{id}`
//! - `GET    {base_url}/sessions/{id}/screenshot` -- returns `{"screenshot": "<base64 png>"}`
//! - `POST   {base_url}/sessions/{id}/pyautogui`  -- body `{"script": ".."}`
//! - `POST   {base_url}/sessions/{id}/write`      -- body `{"text": ".."}`
//! - `POST   {base_url}/sessions/{id}/mouse_move` -- body `{"x": i32, "y": i32}`
//! - `POST   {base_url}/sessions/{id}/hotkey`     -- body `{"keys": [".."]}`
//! - `POST   {base_url}/sessions/{id}/commands`   -- body `{"command": "..", "timeout_secs": u64}`
//!
//! Action endpoints answer `{"success": bool}`. Mouse and keyboard state are
//! not tracked by the sandbox and are unsupported.
//!
//! A command request may stay open for the command's own timeout (rounded up
//! to whole seconds) plus the usual request timeout; a command that times out
//! inside the sandbox comes back as `success: false`.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::types::{KeyboardKey, MouseButton, Screenshot};
use super::Computer;
use crate::config::SandboxConfig;
use crate::error::EnvError;

/// A live session on a remote desktop sandbox.
#[derive(Debug)]
pub struct SandboxComputer {
    base_url: String,
    http: reqwest::Client,
    api_key: Option<String>,
    request_timeout: Duration,
    /// `None` once the session has been released.
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateSession {
    video_stream: bool,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct ScreenshotResponse {
    screenshot: String,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    success: bool,
}

impl SandboxComputer {
    /// Create a sandbox session. The session is held until `close()`.
    pub async fn connect(config: &SandboxConfig) -> Result<Self, EnvError> {
        let http = build_client(config.request_timeout_secs)?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let api_key = Some(config.api_key.clone()).filter(|k| !k.is_empty());

        let mut request = http
            .post(format!("{base_url}/sessions"))
            .json(&CreateSession {
                video_stream: config.video_stream,
            });
        if let Some(key) = &api_key {
            request = request.bearer_auth(key);
        }
        let resp: SessionResponse = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .context("failed to create sandbox session")?
            .json()
            .await
            .context("failed to parse sandbox session response")?;

        tracing::info!(session = %resp.session_id, base_url = %base_url, "sandbox session created");

        Ok(Self {
            base_url,
            http,
            api_key,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            session_id: Some(resp.session_id),
        })
    }

    /// Attach to an already running session instead of creating one.
    /// `close()` still deletes it.
    pub fn attach(
        config: &SandboxConfig,
        session_id: impl Into<String>,
    ) -> Result<Self, EnvError> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http: build_client(config.request_timeout_secs)?,
            api_key: Some(config.api_key.clone()).filter(|k| !k.is_empty()),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            session_id: Some(session_id.into()),
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn session_url(&self, path: &str) -> Result<String, EnvError> {
        let id = self.session_id.as_deref().ok_or(EnvError::Closed)?;
        Ok(format!("{}/sessions/{id}/{path}", self.base_url))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// POST `body` to a session endpoint and report the sandbox's verdict.
    async fn act<B: Serialize>(&self, path: &str, body: &B) -> Result<bool, EnvError> {
        self.act_within(path, body, None).await
    }

    /// Like [`act`](Self::act), with `timeout` replacing the client's
    /// request timeout.
    async fn act_within<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<bool, EnvError> {
        let url = self.session_url(path)?;
        let mut request = self.authorize(self.http.post(&url)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let resp: ActionResponse = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("sandbox request to {path} failed"))?
            .json()
            .await
            .with_context(|| format!("failed to parse sandbox {path} response"))?;
        Ok(resp.success)
    }

    async fn pyautogui(&self, script: String) -> Result<bool, EnvError> {
        self.act("pyautogui", &serde_json::json!({ "script": script }))
            .await
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client, EnvError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build sandbox http client")?;
    Ok(client)
}

/// Whole seconds covering `timeout`; sub-second remainders round up.
fn whole_secs(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

/// pyautogui one-liners for the primitives the sandbox has no endpoint for.
pub(crate) mod script {
    use super::{KeyboardKey, MouseButton};

    /// A double-quoted literal; JSON string escapes are valid Python.
    fn literal(name: &str) -> String {
        serde_json::Value::from(name).to_string()
    }

    pub fn key_down(key: KeyboardKey) -> String {
        format!("pyautogui.keyDown({})", literal(&key.to_pyautogui()))
    }

    pub fn key_up(key: KeyboardKey) -> String {
        format!("pyautogui.keyUp({})", literal(&key.to_pyautogui()))
    }

    pub fn scroll(amount: i32) -> String {
        format!("pyautogui.scroll({amount})")
    }

    pub fn mouse_down(button: MouseButton) -> String {
        format!("pyautogui.mouseDown(button={})", literal(button.to_pyautogui()))
    }

    pub fn mouse_up(button: MouseButton) -> String {
        format!("pyautogui.mouseUp(button={})", literal(button.to_pyautogui()))
    }
}

impl Computer for SandboxComputer {
    fn name(&self) -> &str {
        "sandbox"
    }

    /// Show the desktop.
    async fn reset(&mut self) -> Result<(), EnvError> {
        let keys = [KeyboardKey::Meta, KeyboardKey::Char('d')].map(|k| k.to_pyautogui());
        if !self.act("hotkey", &serde_json::json!({ "keys": keys })).await? {
            tracing::warn!("sandbox ignored show-desktop hotkey");
        }
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Screenshot, EnvError> {
        let url = self.session_url("screenshot")?;
        let resp: ScreenshotResponse = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .context("sandbox screenshot request failed")?
            .json()
            .await
            .context("failed to parse sandbox screenshot response")?;
        Ok(Screenshot {
            format: "png".into(),
            base64: resp.screenshot,
        })
    }

    async fn run_command(&mut self, command: &str, timeout: Duration) -> Result<bool, EnvError> {
        self.act_within(
            "commands",
            &serde_json::json!({ "command": command, "timeout_secs": whole_secs(timeout) }),
            Some(timeout + self.request_timeout),
        )
        .await
    }

    async fn key_down(&mut self, key: KeyboardKey) -> Result<bool, EnvError> {
        self.pyautogui(script::key_down(key)).await
    }

    async fn key_up(&mut self, key: KeyboardKey) -> Result<bool, EnvError> {
        self.pyautogui(script::key_up(key)).await
    }

    async fn type_text(&mut self, text: &str) -> Result<bool, EnvError> {
        self.act("write", &serde_json::json!({ "text": text })).await
    }

    async fn mouse_move(&mut self, x: i32, y: i32) -> Result<bool, EnvError> {
        self.act("mouse_move", &serde_json::json!({ "x": x, "y": y }))
            .await
    }

    async fn mouse_scroll(&mut self, amount: i32) -> Result<bool, EnvError> {
        self.pyautogui(script::scroll(amount)).await
    }

    async fn mouse_button_down(&mut self, button: MouseButton) -> Result<bool, EnvError> {
        self.pyautogui(script::mouse_down(button)).await
    }

    async fn mouse_button_up(&mut self, button: MouseButton) -> Result<bool, EnvError> {
        self.pyautogui(script::mouse_up(button)).await
    }

    async fn close(&mut self) -> Result<(), EnvError> {
        let Some(id) = self.session_id.take() else {
            tracing::warn!("sandbox session already released");
            return Ok(());
        };
        let url = format!("{}/sessions/{id}", self.base_url);
        self.authorize(self.http.delete(&url))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("failed to delete sandbox session {id}"))?;
        tracing::info!(session = %id, "sandbox session deleted");
        Ok(())
    }
}
