//! Command line interface definition

use clap::{Args, Parser, Subcommand};
use shardex_types::SqlType;
use std::path::PathBuf;

/// shardex - parallel multi-shard statement execution
#[derive(Parser)]
#[command(name = "shardex")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run sharded SQL operations in parallel")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Execute a plan file across its data sources
    Run(RunArgs),

    /// Show the effective configuration
    Config,
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the plan file (.toml)
    pub plan: PathBuf,

    /// Abort the operation on the first unit failure
    #[arg(long, conflicts_with = "lenient")]
    pub strict: bool,

    /// Report failed units as absent results instead of aborting
    #[arg(long)]
    pub lenient: bool,

    /// Give up waiting after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Override the worker pool size
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Statement type, when it cannot be inferred from the SQL
    #[arg(long, value_enum)]
    pub sql_type: Option<SqlType>,

    /// Print lifecycle events as they happen
    #[arg(long)]
    pub events: bool,
}

impl RunArgs {
    /// Strict mode requested on the command line, if any
    pub fn strict_override(&self) -> Option<bool> {
        if self.strict {
            Some(true)
        } else if self.lenient {
            Some(false)
        } else {
            None
        }
    }
}
