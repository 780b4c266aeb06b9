//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "waypoint", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one request through the resilient API client
    Request {
        /// Endpoint path, resolved against http.base_url
        #[arg(long, value_name = "PATH")]
        endpoint: String,

        /// HTTP method
        #[arg(long, value_name = "METHOD", default_value = "GET")]
        method: String,

        /// JSON request body (example: --body='{"name":"Biology"}')
        #[arg(long, value_name = "JSON")]
        body: Option<String>,

        /// Cache the response under this key and serve it stale on failure
        #[arg(long, value_name = "KEY")]
        cache_key: Option<String>,
    },

    /// Run a load test against one or more endpoints
    LoadTest {
        #[command(flatten)]
        load: LoadArgs,

        /// Target aggregate requests per second
        #[arg(long, value_name = "RPS")]
        rps: Option<f64>,
    },

    /// Ramp the request rate until the API breaks, then probe recovery
    StressTest {
        #[command(flatten)]
        load: LoadArgs,

        /// Starting requests per second
        #[arg(long, value_name = "RPS")]
        initial_rps: Option<f64>,

        /// Stop ramping above this rate
        #[arg(long, value_name = "RPS")]
        max_rps: Option<f64>,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

/// Options shared by the load and stress tests; unset values come from config
#[derive(clap::Args, Debug, Clone, Default)]
pub struct LoadArgs {
    /// Endpoint to hit; repeat for rotation
    #[arg(long = "endpoint", value_name = "PATH")]
    pub endpoints: Vec<String>,

    /// Concurrent virtual users
    #[arg(long, value_name = "N")]
    pub users: Option<usize>,

    /// Requests issued by each user
    #[arg(long, value_name = "N")]
    pub requests: Option<usize>,

    /// Print results as JSON instead of a report
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate the file given with --config
    Validate,

    /// Write a sample configuration
    Generate {
        /// Output file path; prints to stdout when omitted
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
