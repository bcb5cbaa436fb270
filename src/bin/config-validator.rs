//! # Warm-up Configuration Validator
//!
//! Command-line tool for validating warm-up configuration and proxy import
//! files before starting the dispatcher.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use warmup_core::config::{ConfigManager, WarmupConfig};
use warmup_core::proxy::{parse_proxy_csv, ProxyPool};

#[derive(Parser)]
#[command(name = "warmup-config-validator")]
#[command(about = "Validate warm-up configuration and proxy files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate configuration and the configured proxy import file
    All,

    /// Validate a proxy CSV file (header plus ip,port,username,password,type rows)
    Proxies {
        /// File to check; defaults to proxy.import_file from configuration
        file: Option<PathBuf>,
    },

    /// Print the effective configuration with secrets masked
    Show,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::All) | None => validate_all(&cli),
        Some(Commands::Proxies { file }) => {
            load_config(&cli).and_then(|manager| validate_proxies(manager.config(), file.clone()))
        }
        Some(Commands::Show) => show_config(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            println!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<std::sync::Arc<ConfigManager>> {
    ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .with_context(|| format!("failed to load configuration for '{}'", cli.environment))
}

fn validate_all(cli: &Cli) -> Result<()> {
    println!("🔧 Validating Warm-up Configuration");
    println!("Environment: {}", cli.environment);

    let manager = load_config(cli)?;
    println!(
        "✅ Configuration loaded from {}",
        manager.config_directory().display()
    );

    let config = manager.config();
    println!("\n🌐 Proxy pool");
    println!("   max_failures: {}", config.proxy.max_failures);
    println!(
        "   response_time_threshold_ms: {}",
        config.proxy.response_time_threshold_ms
    );
    println!(
        "   health_check_interval_seconds: {}",
        config.proxy.health_check_interval_seconds
    );

    println!("\n🔁 Retry");
    println!("   max_retries: {}", config.retry.max_retries);
    println!("   retry_delay_seconds: {}", config.retry.retry_delay_seconds);

    println!("\n🚀 Execution");
    println!(
        "   max_concurrent_tasks: {}",
        config.execution.max_concurrent_tasks
    );
    println!(
        "   time limits: {}s soft / {}s hard",
        config.execution.task_soft_limit_seconds, config.execution.task_hard_limit_seconds
    );

    if config.proxy.import_file.is_some() {
        validate_proxies(config, None)?;
    }

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn validate_proxies(config: &WarmupConfig, file: Option<PathBuf>) -> Result<()> {
    let path = file
        .or_else(|| config.proxy.import_file.clone())
        .context("no proxy file given and proxy.import_file is not configured")?;

    println!("\n📄 Proxy file: {}", path.display());
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let proxies = parse_proxy_csv(&content, &path.display().to_string())?;

    let pool = ProxyPool::new(config.proxy.clone());
    let loaded = pool.load(proxies)?;
    println!("✅ {loaded} proxies valid");
    Ok(())
}

fn show_config(cli: &Cli) -> Result<()> {
    let manager = load_config(cli)?;
    let rendered = serde_json::to_string_pretty(&manager.debug_config())?;
    println!("{rendered}");
    Ok(())
}
