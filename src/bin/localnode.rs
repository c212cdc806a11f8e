//! localnode binary
//!
//! Loads configuration, completes the local node's addressing against the
//! host's devices and prints the resulting addressing summary.

use clap::Parser;
use localnode::{Addressing, AddressingError, Config, DeviceSource, NetlinkDevices};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Local node addressing setup
#[derive(Parser, Debug)]
#[command(name = "localnode", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit without touching the host
    #[arg(long)]
    dry_run: bool,
}

/// Run the addressing bootstrap in daemon order.
///
/// With IPv4 enabled the router IPv4 must come from `addressing.router_ipv4`
/// or a restored node config, otherwise post-init validation fails.
async fn bootstrap<S: DeviceSource>(addressing: &Addressing<S>) -> Result<(), AddressingError> {
    let restored = addressing.restore_host_ips().await?;
    if !restored.is_empty() {
        info!(
            ipv4 = ?restored.ipv4_gateway,
            ipv6 = ?restored.ipv6_router,
            "Router addresses restored"
        );
    }

    addressing.auto_complete().await?;

    if !addressing.config().nodeport.devices.is_empty() {
        addressing.init_nodeport_addrs().await?;
    }
    if !addressing.config().masquerade_devices().is_empty() {
        addressing.init_masquerade_addrs().await?;
    }

    addressing.validate_post_init()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    // Load configuration
    let (config, loaded_paths) = if let Some(config_path) = &args.config {
        // Explicit config file specified - load only that file
        match Config::load_file(config_path) {
            Ok(config) => (config, vec![config_path.clone()]),
            Err(e) => {
                error!("Failed to load configuration from {}: {}", config_path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    if loaded_paths.is_empty() {
        info!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            info!(path = %path.display(), "Loaded config file");
        }
    }

    if args.dry_run {
        match config.to_yaml() {
            Ok(yaml) => print!("{}", yaml),
            Err(e) => {
                error!("Failed to serialize configuration: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    info!(
        node = %config.addressing.node_name(),
        families = ?config.addressing.enabled_families(),
        "Initializing node addressing"
    );
    let addressing = Addressing::from_config(config, NetlinkDevices::new());

    if let Err(e) = bootstrap(&addressing).await {
        error!("Addressing setup failed: {}", e);
        std::process::exit(1);
    }

    for family in addressing.config().addressing.enabled_families() {
        for (device, ip) in addressing.cache().nodeport_addrs_with_devices(family) {
            info!(%family, %device, %ip, "NodePort address");
        }
        for (device, ip) in addressing.cache().masquerade_addrs_with_devices(family) {
            info!(%family, %device, %ip, "Masquerade address");
        }
    }
    if let Ok(key) = addressing.encrypt_key_index() {
        info!(mode = %addressing.encryption_mode(), key, "Encryption key index");
    }

    let summary = match addressing.node_addressing() {
        Ok(summary) => summary,
        Err(e) => {
            error!("Failed to read node addressing: {}", e);
            std::process::exit(1);
        }
    };
    match serde_yaml::to_string(&summary) {
        Ok(yaml) => print!("{}", yaml),
        Err(e) => {
            error!("Failed to serialize node addressing: {}", e);
            std::process::exit(1);
        }
    }

    addressing.store().stop();
}
