use crate::services::DefaultEngineConfig;
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "task_engine")]
#[command(about = "Run tasks through bounded channels, worker pools, pipelines and selects")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Engine settings shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Configuration preset (default, high_throughput, testing)
    #[arg(short, long, global = true)]
    pub preset: Option<String>,

    /// Number of workers
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    /// Channel capacity (0 makes every send wait for a matching receive)
    #[arg(long, global = true)]
    pub capacity: Option<usize>,

    /// Per-task transform timeout, e.g. "250ms" or "2s"
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit progress as tracing events instead of console lines
    #[arg(long, global = true)]
    pub log_progress: bool,
}

impl EngineArgs {
    /// Build the engine configuration: file or preset first, then flag overrides
    pub fn resolve(&self) -> Result<DefaultEngineConfig> {
        let mut config = match (&self.config, &self.preset) {
            (Some(_), Some(_)) => bail!("--config and --preset cannot be used together"),
            (Some(path), None) => DefaultEngineConfig::from_file(path)?,
            (None, Some(name)) => DefaultEngineConfig::preset(name)?,
            (None, None) => DefaultEngineConfig::default(),
        };

        if let Some(workers) = self.workers {
            config = config.with_worker_count(workers);
        }
        if let Some(capacity) = self.capacity {
            config = config.with_queue_capacity(capacity);
        }
        if self.timeout.is_some() {
            config = config.with_timeout(self.timeout);
        }
        if self.quiet {
            config = config.with_progress_reporting(false);
        }
        if self.log_progress {
            config = config.with_progress_log(true);
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Square numbers 1..=N on the worker pool
    Pool {
        /// Number of tasks
        #[arg(short = 'n', long, default_value = "9")]
        tasks: u64,

        /// Print every result as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Merge several generators into one channel
    FanIn {
        /// Number of generators
        #[arg(short, long, default_value = "2")]
        sources: usize,

        /// Values per generator (1..=length)
        #[arg(short, long, default_value = "5")]
        length: u64,

        /// Square each value on this many competing stages before merging
        #[arg(long)]
        fan_out: Option<usize>,
    },

    /// Wait on several delayed channels with a deadline
    Select {
        /// Delay before each source delivers, one per source
        #[arg(short, long, value_parser = humantime::parse_duration, num_args = 1.., default_values = ["200ms"])]
        delays: Vec<Duration>,

        /// How long to wait before giving up
        #[arg(long, value_parser = humantime::parse_duration, default_value = "100ms")]
        wait: Duration,
    },

    /// Run periodic work until a cancellation signal fires
    Cancel {
        /// Fire the signal after this long
        #[arg(short, long, value_parser = humantime::parse_duration, default_value = "50ms")]
        after: Duration,

        /// Interval between work iterations
        #[arg(short, long, value_parser = humantime::parse_duration, default_value = "10ms")]
        interval: Duration,
    },

    /// Count words of stored posts on the worker pool
    Posts {
        /// JSON file with an array of {"title", "content"} objects
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
