use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use waypoint_config::{LogLevel, WaypointConfig};

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};

/// Initialize logging from configuration with fallback to simple tracing
fn init_logging_with_config(config: &WaypointConfig, log_level: Option<&str>) -> Result<()> {
    let mut logging_config = config.logging.clone();
    if let Some(level_str) = log_level {
        match level_str.parse::<LogLevel>() {
            Ok(level) => logging_config.level = level,
            Err(e) => eprintln!("{}, keeping configured level", e),
        }
    }

    match waypoint_logging::init_logging_from_config(&logging_config) {
        Ok(()) => debug!("Structured logging initialized"),
        Err(e) => {
            eprintln!(
                "Failed to initialize structured logging: {}, falling back to simple tracing",
                e
            );
            waypoint_logging::init_simple_tracing(log_level.unwrap_or("info"))?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let loaded = commands::load_config(config_path);
    match &loaded {
        Ok(config) => init_logging_with_config(config, cli.log_level.as_deref())?,
        Err(_) => waypoint_logging::init_simple_tracing(cli.log_level.as_deref().unwrap_or("info"))?,
    }

    let command = match cli.command {
        Some(command) => command,
        None => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            return Ok(());
        }
    };

    // Config commands report load failures themselves
    if let Commands::Config { config_cmd } = &command {
        return match config_cmd {
            ConfigCommands::Validate => commands::handle_config_validate(config_path, loaded),
            ConfigCommands::Generate { output, force } => {
                commands::handle_config_generate(output.as_deref(), *force)
            }
        };
    }

    let config = loaded?;
    info!("Waypoint CLI starting");

    match command {
        Commands::Request {
            endpoint,
            method,
            body,
            cache_key,
        } => {
            commands::handle_request(
                &config,
                &endpoint,
                &method,
                body.as_deref(),
                cache_key.as_deref(),
            )
            .await
        }
        Commands::LoadTest { load, rps } => commands::handle_load_test(&config, &load, rps).await,
        Commands::StressTest {
            load,
            initial_rps,
            max_rps,
        } => commands::handle_stress_test(&config, &load, initial_rps, max_rps).await,
        Commands::Config { .. } => Ok(()),
    }
}
