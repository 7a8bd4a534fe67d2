//! planlib CLI
//!
//! Command-line interface for running the MPC collection loop, evaluating
//! the planner, and validating configuration files.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use planlib::config::Config;
use planlib::env::ControlEnv;
#[cfg(feature = "tensorboard")]
use planlib::log::{CompositeLogger, TensorBoardLogger};
use planlib::log::{ConsoleLogger, MetricLogger};
use planlib::model::{LatentWorldModel, WorldModel};
use planlib::plan::{ActionSelect, MppiPlanner, PlanDistribution};
use planlib::trainer::{NoOpHook, Orchestrator};
use planlib::vector::{AsyncVecEnv, Serial, VecEnvBackend};

#[derive(Parser)]
#[command(name = "planlib")]
#[command(version, about = "Latent-model MPC planning and reanalysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the collection loop: plan, act, store, reanalyze
    Train {
        /// Config file (YAML); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Environment id override
        #[arg(long)]
        env: Option<String>,

        /// Total environment steps override
        #[arg(long)]
        steps: Option<u64>,

        /// Number of environments override
        #[arg(long)]
        num_envs: Option<usize>,

        /// Base seed override
        #[arg(long)]
        seed: Option<u64>,

        /// Write TensorBoard event files under this directory (requires
        /// the `tensorboard` feature)
        #[arg(long, value_name = "DIR")]
        tensorboard: Option<PathBuf>,
    },

    /// Evaluate the planner greedily (distribution-mean actions)
    Eval {
        /// Config file (YAML); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Environment id override
        #[arg(long)]
        env: Option<String>,

        /// Number of episodes
        #[arg(long, default_value = "10")]
        episodes: u64,

        /// Base seed override
        #[arg(long)]
        seed: Option<u64>,

        /// Act from the policy prior mean instead of planning
        #[arg(long)]
        no_mpc: bool,
    },

    /// Step one environment with a small planner preset and print states
    Demo {
        /// Environment id
        #[arg(default_value = "pendulum")]
        env: String,

        /// Number of steps
        #[arg(long, default_value = "50")]
        steps: usize,
    },

    /// Parse and validate a config file
    Validate {
        /// Config file (YAML)
        config: PathBuf,
    },

    /// List available environments
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            env,
            steps,
            num_envs,
            seed,
            tensorboard,
        } => {
            let config = load_config(config.as_deref(), env, steps, num_envs, seed)?;
            train(config, tensorboard.as_deref())?;
        }
        Commands::Eval {
            config,
            env,
            episodes,
            seed,
            no_mpc,
        } => {
            let mut config = load_config(config.as_deref(), env, None, None, seed)?;
            if no_mpc {
                config.planner.mpc = false;
            }
            eval(config, episodes)?;
        }
        Commands::Demo { env, steps } => {
            demo(&env, steps)?;
        }
        Commands::Validate { config } => {
            let cfg = Config::from_yaml_file(&config)?;
            println!(
                "config ok: env '{}', {} steps, population {}",
                cfg.env.env_id, cfg.run.max_steps, cfg.planner.population_size
            );
        }
        Commands::List => {
            list_envs();
        }
    }

    Ok(())
}

/// Load a config file (or defaults) and apply command-line overrides.
fn load_config(
    path: Option<&Path>,
    env: Option<String>,
    steps: Option<u64>,
    num_envs: Option<usize>,
    seed: Option<u64>,
) -> Result<Config> {
    let mut config = match path {
        Some(p) => Config::from_yaml_file(p)?,
        None => Config::default(),
    };
    if let Some(env) = env {
        config.env.env_id = env;
    }
    if let Some(steps) = steps {
        config.run.max_steps = steps;
    }
    if let Some(num_envs) = num_envs {
        config.env.num_envs = num_envs;
    }
    if let Some(seed) = seed {
        config.run.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

/// Build the vectorized backend selected by the config.
fn build_backend(config: &Config) -> Result<Box<dyn VecEnvBackend>> {
    if config.env.backend != "builtin" {
        anyhow::bail!(
            "unknown backend '{}', only 'builtin' is available",
            config.env.backend
        );
    }
    // Check the id once so the factory below cannot fail.
    planlib_envs::make(&config.env.env_id)?;

    let env_id = config.env.env_id.clone();
    let serial = Serial::new(
        move || planlib_envs::make(&env_id).expect("env id validated above"),
        config.env.num_envs,
    );
    Ok(if config.env.asynchronous {
        Box::new(AsyncVecEnv::new(serial))
    } else {
        Box::new(serial)
    })
}

/// Console metrics, with TensorBoard event files fanned in when a
/// directory is requested. Tags carry the env id so runs sharing an
/// event directory stay separate in the UI.
#[cfg(feature = "tensorboard")]
fn build_logger(event_dir: Option<&Path>, run_tag: &str) -> Result<Box<dyn MetricLogger>> {
    Ok(match event_dir {
        None => Box::new(ConsoleLogger::new()),
        Some(dir) => Box::new(CompositeLogger::new(vec![
            Box::new(ConsoleLogger::new()),
            Box::new(TensorBoardLogger::new(dir).with_prefix(run_tag)),
        ])),
    })
}

#[cfg(not(feature = "tensorboard"))]
fn build_logger(event_dir: Option<&Path>, _run_tag: &str) -> Result<Box<dyn MetricLogger>> {
    if event_dir.is_some() {
        anyhow::bail!("tensorboard output requires building with the 'tensorboard' feature");
    }
    Ok(Box::new(ConsoleLogger::new()))
}

fn train(config: Config, event_dir: Option<&Path>) -> Result<()> {
    let logger = build_logger(event_dir, &config.env.env_id)?;
    let backend = build_backend(&config)?;
    let obs_dim = backend.observation_space().dim();
    let action_dim = backend.action_space().dim();
    let model = LatentWorldModel::new(&config.world_model, obs_dim, action_dim, config.run.seed);

    tracing::info!(
        env = %config.env.env_id,
        steps = config.run.max_steps,
        num_envs = config.env.num_envs,
        asynchronous = config.env.asynchronous,
        "starting collection"
    );

    let mut orchestrator =
        Orchestrator::new(config, backend, model, NoOpHook)?.with_logger(logger);
    let report = orchestrator.train()?;

    println!(
        "collection finished: {} steps, {} episodes, mean return {:.2}, \
         {} reanalysis cycles ({} skipped), {:.0} steps/s",
        report.steps,
        report.episodes,
        report.mean_return,
        report.reanalyzed_cycles,
        report.skipped_cycles,
        report.steps as f64 / report.elapsed_secs.max(1e-9)
    );
    Ok(())
}

fn eval(config: Config, episodes: u64) -> Result<()> {
    let backend = build_backend(&config)?;
    let obs_dim = backend.observation_space().dim();
    let action_dim = backend.action_space().dim();
    let model = LatentWorldModel::new(&config.world_model, obs_dim, action_dim, config.run.seed);

    tracing::info!(env = %config.env.env_id, episodes, "starting evaluation");

    let mut orchestrator = Orchestrator::new(config, backend, model, NoOpHook)?;
    let report = orchestrator.evaluate(episodes)?;
    println!(
        "evaluation finished: {} episodes, mean return {:.2}, mean length {:.1}",
        report.episodes, report.mean_return, report.mean_length
    );
    Ok(())
}

/// Small planner and model so the demo responds interactively even on a
/// debug build.
fn demo_config() -> Config {
    let mut config = Config::default();
    config.world_model.latent_dim = 64;
    config.world_model.simnorm_dim = 8;
    config.world_model.num_value_nets = 2;
    config.world_model.num_bins = 51;
    config.planner.horizon = 3;
    config.planner.mppi_iterations = 2;
    config.planner.population_size = 64;
    config.planner.policy_prior_samples = 8;
    config.planner.num_elites = 8;
    config
}

fn demo(env_id: &str, steps: usize) -> Result<()> {
    let config = demo_config();
    let mut env = planlib_envs::make(env_id)?;
    let obs_dim = env.observation_space().dim();
    let action_dim = env.action_space().dim();

    let model =
        LatentWorldModel::new(&config.world_model, obs_dim, action_dim, config.run.seed);
    let planner = MppiPlanner::new(&config.planner, action_dim, ActionSelect::EliteSample)?;
    let mut rng = rand::rngs::StdRng::seed_from_u64(config.run.seed);

    println!("demo: {} for {} steps", env_id, steps);
    let (mut obs, _) = env.reset(Some(config.run.seed));
    let mut warm: Option<PlanDistribution> = None;
    let mut total_reward = 0.0f32;

    for step in 1..=steps {
        let latent = model.encode(&obs);
        let plan = planner.plan(&model, &latent, warm.as_ref(), &mut rng)?;
        let result = env.step(&plan.action);
        total_reward += result.reward;

        if let Some(state) = env.render() {
            println!(
                "step {:>4}  reward {:+.3}  plan value {:+.3}  {}",
                step, result.reward, plan.expected_return, state
            );
        }

        if result.done() {
            println!("episode finished, return {:.2}", total_reward);
            total_reward = 0.0;
            let (reset_obs, _) = env.reset(None);
            obs = reset_obs;
            warm = None;
        } else {
            obs = result.observation;
            warm = Some(plan.distribution);
        }
    }
    Ok(())
}

fn list_envs() {
    println!("Available environments:");
    println!("  pendulum     - torque-limited swing-up, 3-dim obs, 1-dim action");
    println!("  point_mass   - 2D reach task with terminal goal, 4-dim obs, 2-dim action");
    println!("  linear_track - 1D diagnostic, reward for positive thrust");
}
