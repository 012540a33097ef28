//! NEXUS Gateway - Entry Point
//!
//! Serves the dashboard API on the local network.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use nexus_gateway::app::options::{AppOptions, DiscoveryOptions, ServerOptions, StorageOptions};
use nexus_gateway::app::run::run;
use nexus_gateway::logs::{init_logging, parse_level, LogOptions};
use nexus_gateway::storage::layout::StorageLayout;
use nexus_gateway::utils::{parse_flag, version_info};

use tracing::{error, info, warn, Level};

/// `--key` from the command line, falling back to the environment variable `env_key`
fn option(cli_args: &HashMap<String, String>, key: &str, env_key: Option<&str>) -> Option<String> {
    cli_args
        .get(key)
        .cloned()
        .or_else(|| env_key.and_then(|k| env::var(k).ok()))
        .filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{json}"),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    // Initialize logging
    let log_level = match option(&cli_args, "log-level", Some("LOG_LEVEL")) {
        Some(level) => parse_level(&level).unwrap_or_else(|e| {
            eprintln!("{e}, using info");
            Level::INFO
        }),
        None => Level::INFO,
    };
    let log_options = LogOptions {
        log_level,
        log_dir: option(&cli_args, "log-dir", Some("LOG_DIR")).map(PathBuf::from),
        json_format: option(&cli_args, "json-logs", Some("JSON_LOGS"))
            .is_some_and(|v| parse_flag(&v)),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    // Storage paths
    let mut layout = StorageLayout::default();
    if let Some(path) = option(&cli_args, "config", Some("CONFIG_PATH")) {
        layout.config_path = PathBuf::from(path);
    }
    if let Some(path) = option(&cli_args, "credentials", Some("CREDENTIALS_PATH")) {
        layout.credentials_path = PathBuf::from(path);
    }

    // Server address
    let mut server = ServerOptions::default();
    if let Some(host) = option(&cli_args, "host", Some("HOST")) {
        server.host = host;
    }
    if let Some(port) = option(&cli_args, "port", Some("PORT")) {
        match port.parse() {
            Ok(port) => server.port = port,
            Err(_) => warn!("Invalid port {:?}, using {}", port, server.port),
        }
    }

    let mut discovery = DiscoveryOptions::default();
    if let Some(subnet) = option(&cli_args, "scan-subnet", Some("SCAN_SUBNET")) {
        discovery.subnet = subnet;
    }

    let options = AppOptions {
        server,
        storage: StorageOptions { layout },
        discovery,
        ..Default::default()
    };

    info!("Running NEXUS gateway with options: {:?}", options);
    let result = run(version.version, options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the gateway: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    warn!("Unable to install signal handlers, falling back to Ctrl+C");
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl+C: {}", e);
                    }
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
