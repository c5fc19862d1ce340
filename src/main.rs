//! deskgym: run agents against desktop backends and record their episodes.
//!
//! Provides two subcommands:
//!
//! - `run`      -- replay a JSON list of actions against a backend for N episodes
//! - `inspect`  -- summarise a saved episode file

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use deskgym::agent::ScriptedAgent;
use deskgym::computer::{
    Computer, ComputerAction, ComputerEnv, SandboxComputer, ShellComputer,
};
use deskgym::config::HarnessConfig;
use deskgym::driver::Driver;
use deskgym::env::{Environment, ScriptedEnv};
use deskgym::trajectory::JsonCollector;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// deskgym: episode harness for desktop agents
#[derive(Parser)]
#[command(name = "deskgym", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum BackendChoice {
    /// In-memory scripted environment (no side effects).
    Scripted,
    /// Local shell; only command actions are supported.
    Shell,
    /// Remote desktop sandbox over HTTP.
    Sandbox,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a list of actions against a backend and record the episodes.
    Run {
        /// Which backend to drive.
        #[arg(long, default_value = "scripted")]
        backend: BackendChoice,

        /// JSON file holding an array of actions.
        #[arg(long)]
        actions: PathBuf,

        /// Number of episodes (overrides the config).
        #[arg(long)]
        episodes: Option<usize>,

        /// Step budget per episode (overrides the config).
        #[arg(long)]
        max_steps: Option<usize>,

        /// Directory receiving episode files (overrides the config).
        #[arg(long)]
        save_dir: Option<PathBuf>,

        /// Instruction recorded with every episode.
        #[arg(long)]
        mandate: Option<String>,
    },

    /// Summarise a saved episode.
    Inspect {
        /// Path to an `episode_{n}.json` file.
        path: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    config.apply_env_overrides();

    match cli.command {
        Commands::Run {
            backend,
            actions,
            episodes,
            max_steps,
            save_dir,
            mandate,
        } => {
            if let Some(n) = episodes {
                config.driver.episodes = n;
            }
            if let Some(n) = max_steps {
                config.driver.max_steps = n;
            }
            if let Some(dir) = save_dir {
                config.collector.save_dir = dir;
            }
            cmd_run(&config, &backend, &actions, mandate).await
        }
        Commands::Inspect { path } => cmd_inspect(&path),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config: &HarnessConfig,
    backend: &BackendChoice,
    actions_path: &Path,
    mandate: Option<String>,
) -> Result<()> {
    let agent: ScriptedAgent<ComputerAction> = ScriptedAgent::from_file(actions_path)?;
    let mandate = mandate.as_deref();

    tracing::info!(
        backend = ?backend,
        episodes = config.driver.episodes,
        max_steps = config.driver.max_steps,
        save_dir = %config.collector.save_dir.display(),
        "Starting run"
    );

    let rewards = match backend {
        BackendChoice::Scripted => {
            tracing::info!("Using scripted environment");
            let env: ScriptedEnv = ScriptedEnv::constant(config.driver.max_steps, 1.0);
            run_with(config, env, agent, mandate).await?
        }
        BackendChoice::Shell => {
            tracing::info!(program = %config.shell.program, "Using local shell");
            let env = computer_env(
                config,
                ShellComputer::new(&config.shell.program),
                config.shell.command_timeout_secs,
            );
            run_with(config, env, agent, mandate).await?
        }
        BackendChoice::Sandbox => {
            tracing::info!(base_url = %config.sandbox.base_url, "Using desktop sandbox");
            let sandbox = SandboxComputer::connect(&config.sandbox).await?;
            let env = computer_env(config, sandbox, config.sandbox.command_timeout_secs);
            run_with(config, env, agent, mandate).await?
        }
    };

    let total: f64 = rewards.iter().sum();
    tracing::info!(episodes = rewards.len(), total_reward = total, "Run finished");
    for (i, reward) in rewards.iter().enumerate() {
        println!(
            "episode {}: reward {reward:.2}",
            config.driver.start_episode + i as u64
        );
    }
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let record = JsonCollector::<serde_json::Value, serde_json::Value>::load_episode(path)
        .with_context(|| format!("Failed to load episode from {}", path.display()))?;
    let episode = &record.episode;

    println!("Episode {}: {}", record.episode_num, path.display());
    println!("  Saved at: {}", record.saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(mandate) = &record.mandate {
        println!("  Mandate: {mandate}");
    }
    println!("  Steps: {}", episode.len());
    println!("  Total reward: {:.3}", episode.total_reward());
    println!();

    for (i, (step, reward)) in episode.steps().zip(episode.rewards()).enumerate() {
        let kind = step
            .action
            .get("kind")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("action");
        println!("  [{i:>3}] {kind:<18} reward {reward:>7.3}  {}", step.action);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Environment construction
// ---------------------------------------------------------------------------

fn computer_env<C: Computer>(
    config: &HarnessConfig,
    computer: C,
    command_timeout_secs: u64,
) -> ComputerEnv<C> {
    let mut env = ComputerEnv::new(computer)
        .with_failure_policy(config.failure_policy)
        .with_command_timeout(Duration::from_secs(command_timeout_secs));
    if !config.observe.is_empty() {
        env = env.with_observation(config.observe.iter().copied());
    }
    env
}

async fn run_with<E>(
    config: &HarnessConfig,
    env: E,
    agent: ScriptedAgent<ComputerAction>,
    mandate: Option<&str>,
) -> Result<Vec<f64>>
where
    E: Environment<Action = ComputerAction>,
{
    let mut collector = JsonCollector::new(&config.collector.save_dir);
    let mut agent = agent;
    if let Some(mandate) = mandate {
        collector = collector.with_mandate(mandate);
        agent = agent.with_mandate(mandate);
    }

    let mut driver = Driver::new(env, agent, collector);
    driver
        .run_scoped(
            config.driver.episodes,
            config.driver.max_steps,
            config.driver.start_episode,
        )
        .await
}
