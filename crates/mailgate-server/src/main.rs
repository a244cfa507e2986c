//! mailgate — message-triggered email dispatcher daemon.
//!
//! Reads "send" requests from the host over stdin, filters out rapid
//! repeats, resolves SMTP transport options (provider presets included) and
//! submits each message via SMTP, reporting the outcome back on stdout.
//!
//! # Usage
//!
//! ```bash
//! mailgate-server --config /path/to/mailgate.toml
//! mailgate-server --validate  # Validate config and exit
//! ```

mod config;
mod dispatch;
mod host;
mod idle;
mod protocol;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

fn main() -> Result<()> {
    // Parse CLI args (minimal — no clap dependency needed)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("/config/mailgate.toml");
    let mut validate_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("mailgate-server {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    // Load config
    let mut server_config = config::ServerConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Apply env overrides
    server_config.apply_env_overrides();

    // Validate
    server_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &server_config.server.log_level);
    env_logger::init();

    if validate_only {
        println!("Configuration is valid.");
        println!("  Mode:      {}", server_config.server.mode);
        println!("  Transport: {}", transport_summary(&server_config));
        println!(
            "  Defaults:  from={} to={}",
            server_config.defaults.from.as_deref().unwrap_or("-"),
            server_config.defaults.to.as_deref().unwrap_or("-"),
        );
        return Ok(());
    }

    // Decrypt the transport password exactly once, before any send.
    server_config
        .decrypt_credentials()
        .context("Failed to decrypt transport credentials")?;

    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    let result = rt.block_on(async {
        let stop = Arc::new(Notify::new());
        let (reply_tx, reply_rx) = mpsc::channel(16);
        let dispatcher = dispatch::Dispatcher::new(server_config, reply_tx, Arc::clone(&stop));

        tokio::select! {
            result = host::run(dispatcher.clone(), Arc::clone(&stop), reply_rx) => result,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received shutdown signal. Exiting…");
                dispatcher.shutdown();
                Ok(())
            }
        }
    });

    if let Err(e) = result {
        log::error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn transport_summary(config: &config::ServerConfig) -> String {
    match (&config.transport.host, &config.transport.service) {
        (Some(host), _) => match config.transport.port {
            Some(port) => format!("{}:{}", host, port),
            None => host.clone(),
        },
        (None, Some(service)) => format!("service '{}'", service),
        (None, None) => "unset".to_string(),
    }
}

fn print_help() {
    println!(
        r#"mailgate — message-triggered email dispatcher daemon

USAGE:
    mailgate-server [OPTIONS]

OPTIONS:
    -c, --config <PATH>   Config file path (default: /config/mailgate.toml)
    --validate            Validate config file and exit
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    MAILGATE_MODE         Run mode ("subscribe" exits after 30s idle)
    MAILGATE_LOG_LEVEL    Log level (error/warn/info/debug/trace)
    MAILGATE_SMTP_HOST    SMTP server hostname
    MAILGATE_SMTP_PORT    SMTP server port
    MAILGATE_SMTP_SERVICE Provider name resolved via the preset table

EXAMPLES:
    # Run as daemon with config file
    mailgate-server --config /path/to/mailgate.toml

    # Validate configuration
    mailgate-server --config mailgate.toml --validate
"#
    );
}
