//! chainqueue demo driver.
//!
//! Submits a batch of simulated chain operations, prints every status
//! transition and finishes with the queue metrics.

mod simulated;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chainqueue_core::domain::{
    CreateMarket, FinalizeResolution, PlaceBet, ResearchAndSubmit, SubmitAnswer,
};
use chainqueue_core::{AppBuilder, Engine, EngineConfig, RecentQuery, TaskId, TaskKind, TaskStatus};

use simulated::{SimulatedChain, sample_payload};

#[derive(Parser, Debug)]
#[command(name = "chainqueue", about = "Asynchronous blockchain task engine demo")]
struct Args {
    /// TOML config file; CHAINQUEUE_* variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a batch of simulated operations to completion.
    Run {
        /// Number of tasks to submit (kinds are cycled).
        #[arg(long, default_value_t = 5)]
        tasks: usize,

        /// Worker count; overrides the config file.
        #[arg(long)]
        pool_size: Option<usize>,

        /// Attempts of every task that fail before it succeeds.
        #[arg(long, default_value_t = 1)]
        failing_attempts: u32,

        /// Simulated latency of one attempt.
        #[arg(long, default_value_t = 400)]
        latency_ms: u64,

        /// Base retry delay in seconds; overrides the config file.
        #[arg(long)]
        retry_base_secs: Option<u64>,
    },
    /// Print the effective configuration.
    ShowConfig,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    let base = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    Ok(base.with_env_overrides(std::env::vars())?)
}

fn build_engine(config: EngineConfig, chain: SimulatedChain) -> anyhow::Result<Engine> {
    let engine = AppBuilder::new()
        .config(config)
        .register::<CreateMarket, _>(chain.clone())?
        .register::<PlaceBet, _>(chain.clone())?
        .register::<SubmitAnswer, _>(chain.clone())?
        .register::<ResearchAndSubmit, _>(chain.clone())?
        .register::<FinalizeResolution, _>(chain)?
        .expect_tasks(&TaskKind::ALL)
        .build()?;
    Ok(engine)
}

async fn watch_until_done(engine: &Engine, ids: &[TaskId]) -> anyhow::Result<()> {
    let mut last: HashMap<TaskId, TaskStatus> = HashMap::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        ticker.tick().await;
        let mut open = 0;
        for id in ids {
            let view = engine.status(*id).await?;
            if last.get(id) != Some(&view.status) {
                println!(
                    "{id} {:<20} {:<10} {}",
                    view.task_type.as_str(),
                    view.status.as_str(),
                    view.progress
                );
                last.insert(*id, view.status);
            }
            if !view.status.is_terminal() {
                open += 1;
            }
        }
        if open == 0 {
            return Ok(());
        }
    }
}

/// Flags given on the command line win over the file and the environment.
fn apply_overrides(config: &mut EngineConfig, pool_size: Option<usize>, retry_base_secs: Option<u64>) {
    if let Some(pool_size) = pool_size {
        config.pool_size = pool_size;
    }
    if let Some(base) = retry_base_secs {
        config.retry.base_delay_secs = base;
        config.retry.max_delay_secs = config.retry.max_delay_secs.max(base);
    }
}

async fn run(
    mut config: EngineConfig,
    tasks: usize,
    pool_size: Option<usize>,
    chain: SimulatedChain,
    retry_base_secs: Option<u64>,
) -> anyhow::Result<()> {
    apply_overrides(&mut config, pool_size, retry_base_secs);

    let engine = build_engine(config, chain)?;

    let mut ids = Vec::with_capacity(tasks);
    for n in 0..tasks {
        let kind = TaskKind::ALL[n % TaskKind::ALL.len()];
        let receipt = engine.submit(kind, sample_payload(kind, n)).await?;
        println!("{}", serde_json::to_string(&receipt)?);
        ids.push(receipt.task_id);
    }

    tokio::select! {
        done = watch_until_done(&engine, &ids) => done?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for ctrl-c")?;
            tracing::warn!("interrupted; unfinished tasks are abandoned");
        }
    }

    let failed = engine
        .recent(RecentQuery::new().status(TaskStatus::Failed))
        .await;
    for view in &failed {
        println!("{}", serde_json::to_string_pretty(view)?);
    }
    println!("{}", serde_json::to_string_pretty(&engine.queue_metrics().await)?);

    engine.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = load_config(args.config.as_ref())?;
    match args.command {
        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Run {
            tasks,
            pool_size,
            failing_attempts,
            latency_ms,
            retry_base_secs,
        } => {
            let chain = SimulatedChain {
                latency: Duration::from_millis(latency_ms),
                failing_attempts,
            };
            run(config, tasks, pool_size, chain, retry_base_secs).await
        }
    }
}
