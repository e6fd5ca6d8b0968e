//! shardex - parallel multi-shard statement execution
//!
//! Loads a plan of routed execution units and runs it through the engine
//! against SQLite data sources.

mod cli;
mod display;
mod error;
mod events;
mod plan;
mod sqlite;

use crate::cli::{Cli, Commands, GlobalArgs, RunArgs};
use crate::display::{OutputRenderer, RunReport};
use crate::error::CliError;
use crate::events::EventHandler;
use crate::plan::Plan;
use crate::sqlite::{SqliteExecutor, StatementOutcome};
use clap::Parser;
use shardex_config::{Config, LoggingConfig};
use shardex_engine::{ExecutionResult, ExecutorEngine};
use shardex_events::{ChannelListener, EventBus, EventReceiver, TracingListener};
use std::future::Future;
use std::process;
use std::sync::Arc;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let renderer = OutputRenderer::new(cli.global.json);

    // Configuration precedence: file (or defaults), environment, then flags.
    let config = match load_config(&cli.global).await {
        Ok(config) => config,
        Err(e) => {
            renderer.render_error(&e);
            process::exit(2);
        }
    };

    init_tracing(&cli.global, &config.logging);

    if let Err(e) = run(cli, config, &renderer).await {
        error!("Application error: {}", e);
        renderer.render_error(&e);
        process::exit(1);
    }
}

async fn load_config(global: &GlobalArgs) -> Result<Config, CliError> {
    let mut config = Config::load_or_default(global.config.as_deref()).await?;
    config.merge_env()?;
    Ok(config)
}

/// Main application logic
async fn run(cli: Cli, mut config: Config, renderer: &OutputRenderer) -> Result<(), CliError> {
    info!("Starting shardex v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Config => {
            renderer.render_text(config.to_toml()?.trim_end())?;
            Ok(())
        }
        Commands::Run(args) => {
            apply_cli_config(&mut config, &args);
            run_plan(&args, &config, cli.global.json, renderer).await
        }
    }
}

/// Apply CLI flags on top of file and environment configuration
fn apply_cli_config(config: &mut Config, args: &RunArgs) {
    if let Some(workers) = args.workers {
        config.executor.worker_pool_size = workers;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.executor.timeout_ms = (timeout_ms > 0).then_some(timeout_ms);
    }
}

async fn run_plan(
    args: &RunArgs,
    config: &Config,
    json_mode: bool,
    renderer: &OutputRenderer,
) -> Result<(), CliError> {
    let plan = Plan::load(&args.plan).await?;
    let sql_type = plan.resolve_sql_type(args.sql_type)?;
    let context = plan.context(args.strict_override(), config.executor.strict_mode);
    let strict = context.strict_mode;

    let bus = Arc::new(EventBus::new());
    bus.subscribe(Arc::new(TracingListener));
    let (event_sender, event_receiver) = shardex_events::channel();
    if args.events {
        bus.subscribe(Arc::new(ChannelListener::new(event_sender)));
    }

    let engine = ExecutorEngine::from_config(&config.executor, Arc::clone(&bus));
    let connections = config
        .executor
        .connection_limit()
        .and_then(|limit| u32::try_from(limit).ok())
        .unwrap_or_else(|| u32::try_from(engine.pool().limits().max_workers).unwrap_or(u32::MAX));
    let executor = Arc::new(SqliteExecutor::connect(&plan.data_sources, connections).await?);

    info!(
        plan = %args.plan.display(),
        %sql_type,
        units = plan.units.len(),
        strict,
        "running plan"
    );

    let units = plan.units.clone();
    let operation = async {
        match config.executor.timeout() {
            Some(deadline) => {
                engine
                    .run_all_with_timeout(sql_type, units, context, Arc::clone(&executor), deadline)
                    .await
            }
            None => {
                engine
                    .run_all(sql_type, units, context, Arc::clone(&executor))
                    .await
            }
        }
    };

    let mut event_handler = EventHandler::new(args.events, json_mode);
    let outcome = execute_with_events(operation, event_receiver, &mut event_handler).await;
    executor.close().await;
    let results = outcome?;

    let mut report = RunReport::new(sql_type, strict, &plan.units, results);
    report.events = event_handler.into_collected();
    renderer.render_report(&report)?;

    info!("Plan completed successfully");
    Ok(())
}

/// Drive an operation while handling its events concurrently
async fn execute_with_events<F>(
    operation: F,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<Vec<ExecutionResult<StatementOutcome>>, CliError>
where
    F: Future<Output = Result<Vec<ExecutionResult<StatementOutcome>>, shardex_errors::Error>>,
{
    let mut operation = Box::pin(operation);

    loop {
        select! {
            result = &mut operation => {
                // Drain any remaining events
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result.map_err(CliError::from);
            }

            event = event_receiver.recv() => {
                match event {
                    Some(event) => event_handler.handle_event(event),
                    // No listener feeds the channel; just wait for the operation.
                    None => return (&mut operation).await.map_err(CliError::from),
                }
            }
        }
    }
}

/// Initialize tracing/logging
///
/// Logs go to stderr so stdout carries only results.
fn init_tracing(global: &GlobalArgs, logging: &LoggingConfig) {
    let default_level = if global.debug {
        "debug"
    } else if global.json {
        "warn"
    } else {
        logging.level.as_str()
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
