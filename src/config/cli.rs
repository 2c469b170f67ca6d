use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};

/// Command-line arguments for the folio binary.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Cached category listings server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and admin HTTP listeners plus the regeneration worker.
    Serve(Box<ServeArgs>),
    /// Ask a running server to drop cached listings or pending jobs.
    Flush(FlushArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Disable or enable the listing cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the number of items per page.
    #[arg(long = "listing-page-size", value_name = "COUNT")]
    pub page_size: Option<u32>,

    /// Override the regeneration debounce window.
    #[arg(long = "scheduler-debounce-seconds", value_name = "SECONDS")]
    pub debounce_seconds: Option<u64>,

    /// Toggle scheduling a rebuild of every category at startup.
    #[arg(
        long = "scheduler-warm-on-startup",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub warm_on_startup: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FlushTarget {
    /// Every cached listing entry.
    Cache,
    /// Every pending regeneration job.
    Jobs,
}

impl FlushTarget {
    pub fn path(self) -> &'static str {
        match self {
            FlushTarget::Cache => "/cache/flush",
            FlushTarget::Jobs => "/jobs/flush",
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct FlushArgs {
    #[arg(value_enum)]
    pub target: FlushTarget,

    /// Base URL of the admin listener.
    #[arg(
        long = "admin-url",
        env = "FOLIO_ADMIN_URL",
        value_name = "URL",
        default_value = "http://127.0.0.1:3001"
    )]
    pub admin_url: String,
}
