//! Episode orchestration.
//!
//! The [`Driver`] runs the interaction loop for one episode at a time:
//!
//!   1. reset the agent, the collector and the environment,
//!   2. repeatedly ask the agent for an action, step the environment, record
//!      the transition and feed it back to the agent,
//!   3. save the episode and report its total reward.
//!
//! The step budget is the only termination guarantee. Errors from the agent,
//! the environment or the collector abort the episode and propagate; nothing
//! is retried and no partial episode is saved.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::env::Environment;
use crate::error::CollectorError;
use crate::trajectory::Collector;

/// Where the driver is in its episode lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No episode started yet.
    Init,
    /// Resetting agent, collector and environment.
    Reset,
    /// Inside the step loop.
    Step,
    /// Last episode finished and was saved.
    Done,
}

/// Runs episodes of `agent` against `env`, recording them into `collector`.
pub struct Driver<E, G, C> {
    env: E,
    agent: G,
    collector: C,
    state: DriverState,
    /// Whether the last finished episode ran out of budget before `done`.
    truncated: bool,
    env_closed: bool,
}

impl<E, G, C> Driver<E, G, C>
where
    E: Environment,
    G: Agent<E::Observation, E::Action>,
    C: Collector<E::Observation, E::Action>,
{
    pub fn new(env: E, agent: G, collector: C) -> Self {
        Self {
            env,
            agent,
            collector,
            state: DriverState::Init,
            truncated: false,
            env_closed: false,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Whether the last finished episode hit the step budget without the
    /// environment reporting `done`.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn agent(&self) -> &G {
        &self.agent
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }

    pub fn into_parts(self) -> (E, G, C) {
        (self.env, self.agent, self.collector)
    }

    /// Run one episode of at most `max_steps` steps, save it as
    /// `episode_num` and return its total reward.
    pub async fn run_episode(&mut self, max_steps: usize, episode_num: u64) -> Result<f64> {
        self.state = DriverState::Reset;
        self.agent.reset().await.context("agent reset failed")?;
        self.collector.reset();
        let mut observation = self
            .env
            .reset()
            .await
            .context("environment reset failed")?;

        self.state = DriverState::Step;
        let mut steps = 0usize;
        let mut done = false;
        while steps < max_steps {
            let action = self
                .agent
                .act(&observation)
                .await
                .with_context(|| format!("agent failed to act at step {steps}"))?;
            let outcome = self
                .env
                .step(&action)
                .await
                .with_context(|| format!("environment step {steps} failed"))?;

            self.collector.add_step(
                outcome.observation.clone(),
                action.clone(),
                outcome.reward,
                outcome.info.clone(),
            )?;
            self.agent
                .update(&outcome.observation, &action, outcome.reward, &outcome.info)
                .await
                .with_context(|| format!("agent update failed at step {steps}"))?;

            steps += 1;
            debug!(
                episode = episode_num,
                step = steps,
                reward = outcome.reward,
                done = outcome.done,
                "step complete"
            );

            observation = outcome.observation;
            if outcome.done {
                done = true;
                break;
            }
        }

        self.collector.save_episode(episode_num)?;
        self.state = DriverState::Done;
        self.truncated = !done;

        let total_reward = self
            .collector
            .current_episode()
            .map(|e| e.total_reward())
            .ok_or(CollectorError::NoActiveEpisode)?;
        info!(
            episode = episode_num,
            steps,
            reward = total_reward,
            truncated = self.truncated,
            "episode finished"
        );
        Ok(total_reward)
    }

    /// Run `count` consecutive episodes numbered from `first_episode`.
    /// Stops at the first failing episode.
    pub async fn run_episodes(
        &mut self,
        count: usize,
        max_steps: usize,
        first_episode: u64,
    ) -> Result<Vec<f64>> {
        let mut rewards = Vec::with_capacity(count);
        for episode_num in (first_episode..).take(count) {
            let reward = self
                .run_episode(max_steps, episode_num)
                .await
                .with_context(|| format!("episode {episode_num} failed"))?;
            rewards.push(reward);
        }
        Ok(rewards)
    }

    /// Close the environment. Later calls are no-ops.
    pub async fn close(&mut self) -> Result<()> {
        if self.env_closed {
            warn!("environment already closed by driver");
            return Ok(());
        }
        self.env_closed = true;
        self.env.close().await.context("failed to close environment")
    }

    /// Run episodes like [`run_episodes`](Self::run_episodes), then close the
    /// environment whether or not they succeeded.
    ///
    /// When both the episodes and the close fail, the episode error is
    /// returned and the close error is logged.
    pub async fn run_scoped(
        &mut self,
        count: usize,
        max_steps: usize,
        first_episode: u64,
    ) -> Result<Vec<f64>> {
        let result = self.run_episodes(count, max_steps, first_episode).await;
        let closed = self.close().await;
        match (result, closed) {
            (Ok(rewards), Ok(())) => Ok(rewards),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(run_err), Ok(())) => Err(run_err),
            (Err(run_err), Err(close_err)) => {
                warn!(error = %format!("{close_err:#}"), "environment close failed after episode error");
                Err(run_err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::agent::ScriptedAgent;
    use crate::env::{Info, ScriptedEnv};
    use crate::error::EnvError;
    use crate::trajectory::JsonCollector;

    type TestDriver = Driver<ScriptedEnv<String>, ScriptedAgent<String>, JsonCollector<String, String>>;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("deskgym-driver-{}", uuid::Uuid::new_v4()))
    }

    fn driver(env: ScriptedEnv<String>, dir: &PathBuf) -> TestDriver {
        let agent = ScriptedAgent::new(vec!["click 100,100".to_string()]);
        Driver::new(env, agent, JsonCollector::new(dir))
    }

    #[tokio::test]
    async fn step_budget_bounds_open_ended_episode() {
        let dir = temp_dir();
        let env = ScriptedEnv::new("start")
            .then("s1", 1.0, false)
            .then("s2", 0.5, false)
            .then("s3", 2.0, false)
            .then("s4", 4.0, false);
        let mut driver = driver(env, &dir);
        assert_eq!(driver.state(), DriverState::Init);

        let reward = driver.run_episode(3, 0).await.unwrap();

        assert_eq!(driver.state(), DriverState::Done);
        assert!((reward - 3.5).abs() < f64::EPSILON);
        assert_eq!(driver.env().executed().len(), 3);
        assert_eq!(driver.env().reset_count(), 1);
        assert_eq!(driver.agent().updates(), 3);

        let ep = driver.collector().current_episode().unwrap();
        assert_eq!(ep.len(), 3);
        assert_eq!(ep.observations(), ["s1", "s2", "s3"]);
        assert_eq!(ep.actions().len(), 3);
        assert_eq!(ep.infos().len(), 3);
        assert!((ep.total_reward() - ep.rewards().iter().sum::<f64>()).abs() < f64::EPSILON);
        assert!(driver.collector().episode_path(0).exists());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn done_stops_the_loop_early() {
        let dir = temp_dir();
        let env = ScriptedEnv::new("start")
            .then("s1", 0.0, false)
            .then("goal", 1.0, true)
            .then("unreachable", 9.0, false);
        let mut driver = driver(env, &dir);

        let reward = driver.run_episode(5, 1).await.unwrap();

        assert!((reward - 1.0).abs() < f64::EPSILON);
        assert_eq!(driver.env().executed().len(), 2);
        let ep = driver.collector().current_episode().unwrap();
        assert_eq!(ep.len(), 2);
        assert_eq!(ep.rewards(), [0.0, 1.0]);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn done_on_the_last_allowed_step_is_not_truncation() {
        let dir = temp_dir();
        let env = ScriptedEnv::new("start")
            .then("s1", 0.0, false)
            .then("goal", 1.0, true);
        let mut finished = driver(env, &dir);
        finished.run_episode(2, 0).await.unwrap();
        assert!(!finished.truncated());

        let mut open_ended = driver(ScriptedEnv::constant(4, 1.0), &dir);
        open_ended.run_episode(2, 1).await.unwrap();
        assert!(open_ended.truncated());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn failed_action_aborts_without_saving() {
        let dir = temp_dir();
        let env = ScriptedEnv::constant(5, 1.0).fail_at(2);
        let mut driver = driver(env, &dir);

        let err = driver.run_episode(5, 3).await.unwrap_err();

        match err.downcast_ref::<EnvError>() {
            Some(EnvError::ActionFailed { action }) => assert!(action.contains("click 100,100")),
            other => panic!("expected ActionFailed, got {other:?}"),
        }
        assert_eq!(driver.state(), DriverState::Step);
        assert_eq!(driver.collector().current_episode().unwrap().len(), 1);
        assert!(!driver.collector().episode_path(3).exists());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn agent_error_propagates() {
        let dir = temp_dir();
        let agent: ScriptedAgent<String> = ScriptedAgent::new(Vec::new());
        let env: ScriptedEnv<String> = ScriptedEnv::constant(2, 1.0);
        let mut driver = Driver::new(env, agent, JsonCollector::new(&dir));
        let err = driver.run_episode(2, 0).await.unwrap_err();
        assert!(format!("{err:#}").contains("no actions"));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn zero_budget_saves_empty_episode() {
        let dir = temp_dir();
        let mut driver = driver(ScriptedEnv::constant(3, 1.0), &dir);
        let reward = driver.run_episode(0, 0).await.unwrap();
        assert_eq!(reward, 0.0);
        assert!(driver.collector().current_episode().unwrap().is_empty());
        assert!(driver.collector().episode_path(0).exists());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn consecutive_episodes_start_fresh() {
        let dir = temp_dir();
        let env = ScriptedEnv::new("start")
            .then("s1", 1.0, false)
            .then("s2", 1.0, true);
        let mut driver = driver(env, &dir);

        let rewards = driver.run_episodes(3, 10, 5).await.unwrap();

        assert_eq!(rewards, vec![2.0, 2.0, 2.0]);
        assert_eq!(driver.env().reset_count(), 3);
        for n in 5..8 {
            let record =
                JsonCollector::<String, String>::load_episode(driver.collector().episode_path(n))
                    .unwrap();
            assert_eq!(record.episode_num, n);
            assert_eq!(record.episode.len(), 2);
        }
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn scoped_run_closes_on_success_and_error() {
        let dir = temp_dir();
        let mut ok = driver(ScriptedEnv::constant(2, 1.0), &dir);
        ok.run_scoped(1, 2, 0).await.unwrap();
        assert!(ok.env().is_closed());
        // A second close is a no-op rather than a second backend release.
        ok.close().await.unwrap();

        let mut failing = driver(ScriptedEnv::constant(2, 1.0).fail_at(1), &dir);
        let err = failing.run_scoped(1, 2, 1).await.unwrap_err();
        assert!(err.downcast_ref::<EnvError>().is_some());
        assert!(failing.env().is_closed());
        assert!(!failing.collector().episode_path(1).exists());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn agent_sees_post_step_observation() {
        /// Remembers every observation passed to `act` and `update`.
        #[derive(Default)]
        struct EchoAgent {
            acted_on: Vec<String>,
            updated_with: Vec<(String, f64)>,
        }

        impl Agent<String, String> for EchoAgent {
            async fn act(&mut self, observation: &String) -> anyhow::Result<String> {
                self.acted_on.push(observation.clone());
                Ok(format!("after {observation}"))
            }

            async fn update(
                &mut self,
                observation: &String,
                _action: &String,
                reward: f64,
                _info: &Info,
            ) -> anyhow::Result<()> {
                self.updated_with.push((observation.clone(), reward));
                Ok(())
            }
        }

        let dir = temp_dir();
        let env: ScriptedEnv<String> = ScriptedEnv::new("start")
            .then("s1", 0.5, false)
            .then("s2", 0.5, false);
        let mut driver = Driver::new(env, EchoAgent::default(), JsonCollector::new(&dir));
        driver.run_episode(2, 0).await.unwrap();

        let (env, agent, collector) = driver.into_parts();
        assert_eq!(agent.acted_on, ["start", "s1"]);
        assert_eq!(
            agent.updated_with,
            vec![("s1".to_string(), 0.5), ("s2".to_string(), 0.5)]
        );
        assert_eq!(env.executed(), ["after start", "after s1"]);
        assert_eq!(collector.current_episode().unwrap().actions(), ["after start", "after s1"]);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
