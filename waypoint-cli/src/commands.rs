//! Command handlers

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use waypoint_caching::{CacheConfig, ResponseCache};
use waypoint_config::{ConfigLoader, WaypointConfig};
use waypoint_http::{ApiClient, ApiResponse, HttpConfig, HttpMethod, RequestOptions};
use waypoint_loadtest::{LoadTestConfig, LoadTester};

use crate::cli::LoadArgs;

/// Load configuration from file or fall back to environment and defaults
pub fn load_config(config_path: Option<&Path>) -> Result<WaypointConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) if path.exists() => {
            info!("Loading configuration from: {:?}", path);
            loader
                .from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))
        }
        Some(path) => {
            warn!("Configuration file not found: {:?}. Using defaults.", path);
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
        None => loader
            .from_env()
            .context("Failed to load configuration from environment"),
    }
}

pub fn build_client(config: &WaypointConfig) -> Result<ApiClient> {
    let cache = ResponseCache::new(CacheConfig::from(&config.cache));
    ApiClient::builder(HttpConfig::from(config.http.clone()))
        .cache(Arc::new(cache))
        .build()
        .context("Failed to create API client")
}

pub async fn handle_request(
    config: &WaypointConfig,
    endpoint: &str,
    method: &str,
    body: Option<&str>,
    cache_key: Option<&str>,
) -> Result<()> {
    let method: HttpMethod = method.parse()?;
    let mut options = RequestOptions::new(method);
    if let Some(body) = body {
        let body: Value = serde_json::from_str(body).context("--body is not valid JSON")?;
        options = options.with_body(body);
    }

    let client = build_client(config)?;
    info!("{} {}", method, endpoint);
    let response: ApiResponse<Value> = client.request(endpoint, options, None, cache_key).await;

    print_request_summary(method, endpoint, &response);
    if let Some(data) = &response.data {
        println!(
            "{}",
            serde_json::to_string_pretty(data).context("Failed to format response as JSON")?
        );
    }

    match response.error {
        Some(error) if response.data.is_none() => Err(anyhow!(error)),
        _ => Ok(()),
    }
}

fn print_request_summary(method: HttpMethod, endpoint: &str, response: &ApiResponse<Value>) {
    let perf = &response.performance;
    let status = perf
        .status_code
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let outcome = if response.is_success() {
        "ok".green()
    } else if response.is_degraded() {
        "degraded".yellow()
    } else {
        "failed".red()
    };

    eprintln!(
        "{} {} {} [{}] {}ms, {} retr{}{}",
        outcome,
        method,
        endpoint,
        status,
        perf.duration.as_millis(),
        perf.retries,
        if perf.retries == 1 { "y" } else { "ies" },
        if response.cached { ", cached" } else { "" }
    );
    if let Some(error) = &response.error {
        eprintln!("{} {}", "error:".red().bold(), error);
    }
}

/// Merge CLI overrides onto the configured load test defaults
pub fn load_test_config(config: &WaypointConfig, args: &LoadArgs) -> LoadTestConfig {
    let mut load = LoadTestConfig::from(&config.load_test);
    if !args.endpoints.is_empty() {
        load.endpoints = args.endpoints.clone();
    }
    if let Some(users) = args.users {
        load.concurrent_users = users;
    }
    if let Some(requests) = args.requests {
        load.requests_per_user = requests;
    }
    load
}

pub async fn handle_load_test(
    config: &WaypointConfig,
    args: &LoadArgs,
    rps: Option<f64>,
) -> Result<()> {
    let mut load = load_test_config(config, args);
    if let Some(rps) = rps {
        load.target_rps = rps;
    }
    validate_load(&load)?;

    let tester = LoadTester::new(Arc::new(build_client(config)?));
    stop_on_ctrl_c(&tester);

    let results = tester.run_load_test(&load).await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("{}", results);
        let verdict = if results.error_rate == 0.0 {
            "no errors".green()
        } else {
            format!("{:.2}% errors", results.error_rate).red()
        };
        println!("{}", verdict);
    }
    Ok(())
}

pub async fn handle_stress_test(
    config: &WaypointConfig,
    args: &LoadArgs,
    initial_rps: Option<f64>,
    max_rps: Option<f64>,
) -> Result<()> {
    let mut load = load_test_config(config, args);
    if let Some(rps) = initial_rps {
        load.stress.initial_rps = rps;
    }
    if let Some(rps) = max_rps {
        load.stress.max_rps = rps;
    }
    validate_load(&load)?;

    let tester = LoadTester::new(Arc::new(build_client(config)?));
    stop_on_ctrl_c(&tester);

    let results = tester.run_stress_test(&load).await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("{}", results);
        match (results.breaking_point_rps, results.recovered()) {
            (None, _) => println!("{}", "API held up across the whole ramp".green()),
            (Some(rps), true) => println!(
                "{}",
                format!("Broke at {:.1} rps and recovered", rps).yellow()
            ),
            (Some(rps), false) => println!(
                "{}",
                format!("Broke at {:.1} rps without recovering", rps).red()
            ),
        }
    }
    Ok(())
}

fn validate_load(load: &LoadTestConfig) -> Result<()> {
    if load.endpoints.is_empty() {
        return Err(anyhow!("At least one --endpoint is required"));
    }
    if load.concurrent_users == 0 || load.requests_per_user == 0 {
        return Err(anyhow!("--users and --requests must be greater than 0"));
    }
    Ok(())
}

fn stop_on_ctrl_c(tester: &LoadTester) {
    let tester = tester.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Stopping after in-flight requests...".yellow());
            tester.stop();
        }
    });
}

/// Validate configuration from an already attempted load
pub fn handle_config_validate(
    config_path: Option<&Path>,
    loaded: Result<WaypointConfig>,
) -> Result<()> {
    let Some(path) = config_path else {
        return Err(anyhow!("config validate needs --config PATH"));
    };
    if !path.exists() {
        return Err(anyhow!("Configuration file not found: {:?}", path));
    }

    match loaded {
        Ok(_) => {
            println!("{} {}", "✓".green(), "Configuration file is valid".green());
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("{} Configuration validation failed: {:#}", "✗".red(), e);
            Err(e)
        }
    }
}

pub fn handle_config_generate(output: Option<&Path>, force: bool) -> Result<()> {
    let sample = WaypointConfig::generate_sample();

    let Some(output) = output else {
        print!("{}", sample);
        return Ok(());
    };

    if output.exists() && !force {
        return Err(anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create output directory")?;
        }
    }
    fs::write(output, sample).with_context(|| format!("Failed to write {:?}", output))?;

    println!("{} Sample configuration written to {:?}", "✓".green(), output);
    Ok(())
}
