//! Error taxonomy shared by environments and collectors.
//!
//! Library-level failures are typed so callers can tell an unsupported
//! capability from a failed action or a broken backend. Orchestration code
//! (the driver, the binary) wraps these in [`anyhow::Error`]; use
//! `downcast_ref::<EnvError>()` to branch on the kind.

use std::fmt::Debug;
use std::path::PathBuf;

/// Errors raised by an [`Environment`](crate::env::Environment) or a
/// [`Computer`](crate::computer::Computer) backend.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// The backend structurally cannot provide this capability (for example
    /// live keyboard state from a remote sandbox).
    #[error("{backend} does not support {capability}")]
    Unsupported {
        backend: String,
        capability: &'static str,
    },

    /// The action was dispatched but the backend reported that it did not
    /// take effect.
    #[error("action {action} failed to execute")]
    ActionFailed { action: String },

    /// The environment was used after `close()`.
    #[error("environment is closed")]
    Closed,

    /// Infrastructure fault inside the backend: lost connection, spawn
    /// failure, malformed response.
    #[error("backend fault: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl EnvError {
    pub fn unsupported(backend: impl Into<String>, capability: &'static str) -> Self {
        Self::Unsupported {
            backend: backend.into(),
            capability,
        }
    }

    /// Build an [`EnvError::ActionFailed`] carrying the debug rendering of the
    /// offending action.
    pub fn action_failed<A: Debug + ?Sized>(action: &A) -> Self {
        Self::ActionFailed {
            action: format!("{action:?}"),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Errors raised by a [`Collector`](crate::trajectory::Collector).
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// `add_step` or `save_episode` was called before `reset`.
    #[error("no active episode; call reset() first")]
    NoActiveEpisode,

    /// `add_step` was called on an episode that has already been saved.
    #[error("episode has been saved and can no longer be modified")]
    EpisodeFinalized,

    #[error("failed to serialize episode: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CollectorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
