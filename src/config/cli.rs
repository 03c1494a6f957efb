use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the ipsum binary.
#[derive(Debug, Parser)]
#[command(name = "ipsum", version, about = "Blog 'em Ipsum terminal client")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "IPSUM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl CliArgs {
    /// The selected command; `browse` when none was given.
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Browse)
    }
}

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Browse, paginate and edit blog posts (default).
    Browse,
    /// Scroll through the people catalog.
    People,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base URL of the post service.
    #[arg(long = "posts-base-url", value_name = "URL", global = true)]
    pub posts_base_url: Option<String>,

    /// Override the first page URL of the people catalog.
    #[arg(long = "catalog-base-url", value_name = "URL", global = true)]
    pub catalog_base_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override how long fetched data stays fresh.
    #[arg(long = "cache-stale-time-ms", value_name = "MILLISECONDS", global = true)]
    pub cache_stale_time_ms: Option<u64>,

    /// Override the number of retries of a failing query.
    #[arg(long = "cache-retry", value_name = "COUNT", global = true)]
    pub cache_retry: Option<u32>,
}
