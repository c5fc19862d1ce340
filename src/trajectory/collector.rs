//! Episode collection: accumulating transitions and persisting episodes.
//!
//! A [`Collector`] owns exactly one active [`Episode`]. The driver calls
//! [`reset`](Collector::reset) before every episode, [`add_step`](Collector::add_step)
//! after every environment step and [`save_episode`](Collector::save_episode)
//! once the episode ends.
//!
//! [`JsonCollector`] keeps the episode in memory and writes one pretty JSON
//! document per episode, `episode_{n}.json`, into its save directory.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::{Episode, EpisodeRecord};
use crate::env::Info;
use crate::error::CollectorError;

/// Accumulates one episode at a time and persists finished episodes.
///
/// Not meant to be shared: concurrent episodes need one collector each.
pub trait Collector<O, A> {
    /// Discard any in-progress episode and start an empty one.
    fn reset(&mut self);

    /// Append one transition to the active episode.
    ///
    /// Fails only when there is no active episode or the active episode has
    /// already been saved.
    fn add_step(&mut self, observation: O, action: A, reward: f64, info: Info)
        -> Result<(), CollectorError>;

    /// Persist the active episode under `episode_num`, overwriting any
    /// previous save with that number. The episode stays readable.
    fn save_episode(&mut self, episode_num: u64) -> Result<(), CollectorError>;

    /// The active episode, if `reset` has been called.
    fn current_episode(&self) -> Option<&Episode<O, A>>;
}

// ---------------------------------------------------------------------------
// JSON collector
// ---------------------------------------------------------------------------

/// Keeps the active episode in memory and saves episodes as JSON files.
#[derive(Debug, Clone)]
pub struct JsonCollector<O, A> {
    save_dir: PathBuf,
    mandate: Option<String>,
    current: Option<Episode<O, A>>,
    /// Set once the active episode has been saved; blocks further steps.
    finalized: bool,
}

impl<O, A> JsonCollector<O, A> {
    /// Create a collector writing into `save_dir`. The directory is created on
    /// the first save.
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            mandate: None,
            current: None,
            finalized: false,
        }
    }

    /// Record `mandate` in every saved episode.
    pub fn with_mandate(mut self, mandate: impl Into<String>) -> Self {
        self.mandate = Some(mandate.into());
        self
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Where episode `episode_num` is (or would be) saved.
    pub fn episode_path(&self, episode_num: u64) -> PathBuf {
        self.save_dir.join(format!("episode_{episode_num}.json"))
    }

    /// Whether the active episode has been saved.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl<O: DeserializeOwned, A: DeserializeOwned> JsonCollector<O, A> {
    /// Read a saved episode back.
    pub fn load_episode(
        path: impl AsRef<Path>,
    ) -> Result<EpisodeRecord<Episode<O, A>>, CollectorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CollectorError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl<O: Serialize, A: Serialize> Collector<O, A> for JsonCollector<O, A> {
    fn reset(&mut self) {
        if let Some(prev) = &self.current {
            if !self.finalized && !prev.is_empty() {
                tracing::debug!(steps = prev.len(), "discarding unsaved episode");
            }
        }
        self.current = Some(Episode::new());
        self.finalized = false;
    }

    fn add_step(
        &mut self,
        observation: O,
        action: A,
        reward: f64,
        info: Info,
    ) -> Result<(), CollectorError> {
        if self.finalized {
            return Err(CollectorError::EpisodeFinalized);
        }
        let episode = self
            .current
            .as_mut()
            .ok_or(CollectorError::NoActiveEpisode)?;
        episode.push(observation, action, reward, info);
        Ok(())
    }

    fn save_episode(&mut self, episode_num: u64) -> Result<(), CollectorError> {
        let episode = self
            .current
            .as_ref()
            .ok_or(CollectorError::NoActiveEpisode)?;

        let record = EpisodeRecord {
            episode_num,
            saved_at: Utc::now(),
            mandate: self.mandate.clone(),
            episode,
        };
        let json = serde_json::to_string_pretty(&record)?;

        std::fs::create_dir_all(&self.save_dir)
            .map_err(|e| CollectorError::io(&self.save_dir, e))?;

        // Write then rename so readers never see a partial document.
        let path = self.episode_path(episode_num);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| CollectorError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| CollectorError::io(&path, e))?;

        tracing::info!(
            episode = episode_num,
            steps = episode.len(),
            total_reward = episode.total_reward(),
            path = %path.display(),
            "saved episode"
        );
        self.finalized = true;
        Ok(())
    }

    fn current_episode(&self) -> Option<&Episode<O, A>> {
        self.current.as_ref()
    }
}
