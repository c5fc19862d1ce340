//! Episode data recorded while an agent interacts with an environment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::env::Info;

// ---------------------------------------------------------------------------
// Steps and trajectories
// ---------------------------------------------------------------------------

/// A single `(observation, action)` record of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step<'a, O, A> {
    pub observation: &'a O,
    pub action: &'a A,
}

/// Ordered steps of one episode.
pub type Trajectory<'a, O, A> = Vec<Step<'a, O, A>>;

// ---------------------------------------------------------------------------
// Episode
// ---------------------------------------------------------------------------

/// Everything recorded during one episode.
///
/// The four sequences are parallel: entry `i` of each describes step `i`.
/// They always have the same length and `total_reward` is always the sum of
/// `rewards`; the only way to grow an episode is [`Episode::push`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode<O, A> {
    observations: Vec<O>,
    actions: Vec<A>,
    rewards: Vec<f64>,
    infos: Vec<Info>,
    total_reward: f64,
}

impl<O, A> Default for Episode<O, A> {
    fn default() -> Self {
        Self {
            observations: Vec::new(),
            actions: Vec::new(),
            rewards: Vec::new(),
            infos: Vec::new(),
            total_reward: 0.0,
        }
    }
}

impl<O, A> Episode<O, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step and accumulate its reward.
    pub(crate) fn push(&mut self, observation: O, action: A, reward: f64, info: Info) {
        self.observations.push(observation);
        self.actions.push(action);
        self.rewards.push(reward);
        self.infos.push(info);
        self.total_reward += reward;
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn observations(&self) -> &[O] {
        &self.observations
    }

    pub fn actions(&self) -> &[A] {
        &self.actions
    }

    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    pub fn infos(&self) -> &[Info] {
        &self.infos
    }

    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    /// Iterate the `(observation, action)` pairs in step order.
    pub fn steps(&self) -> impl Iterator<Item = Step<'_, O, A>> {
        self.observations
            .iter()
            .zip(&self.actions)
            .map(|(observation, action)| Step {
                observation,
                action,
            })
    }

    pub fn trajectory(&self) -> Trajectory<'_, O, A> {
        self.steps().collect()
    }
}

// ---------------------------------------------------------------------------
// Persisted record
// ---------------------------------------------------------------------------

/// The document written for one saved episode.
///
/// The episode body is flattened, so the file carries `observations`,
/// `actions`, `rewards`, `infos` and `total_reward` at the top level next to
/// the metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord<E> {
    pub episode_num: u64,
    /// UTC time of the save that produced this document.
    pub saved_at: DateTime<Utc>,
    /// Instruction the episode was run under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandate: Option<String>,
    #[serde(flatten)]
    pub episode: E,
}
