//! lora-pkt-server - stream spotter telemetry from a LoRa concentrator
//!
//! Listens on TCP port 2600 (by default) and sends each decoded spotter
//! packet as `#<channel>,<timestamp>,<X>,<Y>,<Z>` to the connected client.
//!
//! - `SIGINT` / `SIGTERM`: stop the concentrator, close the client, exit
//! - `SIGQUIT`: exit immediately

use clap::Parser;
use lora_pkt_server::channel_plan::ChannelPlan;
use lora_pkt_server::config::{AppConfig, ConcentratorConfig};
use lora_pkt_server::devices::create_device;
use lora_pkt_server::lifecycle::{Lifecycle, ShutdownMode};
use lora_pkt_server::pipeline::Pipeline;
use lora_pkt_server::session::RadioSession;
use lora_pkt_server::streaming::ConnectionManager;
use lora_pkt_server::{Result, Server, ServerOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "lora-pkt-server")]
#[command(about = "Stream spotter telemetry from a LoRa concentrator to a TCP client")]
struct Args {
    /// Daemon settings (TOML); defaults to lora-pkt-server.toml if present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Concentrator configuration (JSON); skips the candidate file search
    #[arg(long)]
    conc_config: Option<PathBuf>,

    /// TCP bind address, overrides the settings file
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level, overrides the settings file
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Settings are read before the logger exists, so a failure goes to stderr
    let (mut config, source) = match AppConfig::load(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("ERROR: failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Some(bind) = args.bind.clone() {
        config.server.bind_address = bind;
    }

    log::info!("lora-pkt-server v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using {}", source);

    match run(&args, &config) {
        Ok(ShutdownMode::Graceful) => {
            log::info!("Exiting successfully");
            ExitCode::SUCCESS
        }
        Ok(ShutdownMode::Immediate) => std::process::exit(0),
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, config: &AppConfig) -> Result<ShutdownMode> {
    let conc_config = match &args.conc_config {
        Some(path) => {
            log::info!("Parsing concentrator configuration {}", path.display());
            ConcentratorConfig::load(path)?
        }
        None => ConcentratorConfig::locate_and_load(&config.concentrator.config_files)?.1,
    };

    let plan = ChannelPlan::build(&conc_config.radios, &conc_config.multi_sf)?;
    plan.log_summary();
    let policy = config.filter.to_policy()?;
    log::info!(
        "Accepting LoRa packets with {} Hz bandwidth, {:?}, coding rate {:?}, CRC required: {}",
        policy.bandwidth.hz().unwrap_or(0),
        policy.datarate,
        policy.coderate,
        policy.require_crc
    );
    let pipeline = Pipeline::new(plan, policy, config.payload.layout);

    log::info!("Device: {}", config.concentrator.device);
    let driver = create_device(&config.concentrator, config.payload.layout)?;
    let mut session = RadioSession::new(driver, config.concentrator.max_packets_per_poll);
    session.configure(&conc_config)?;
    session.start()?;

    let connections = ConnectionManager::bind(
        &config.server.bind_address,
        &config.server.greeting,
        config.server.write_timeout(),
    )?;

    let lifecycle = Lifecycle::new();
    lifecycle.install_signal_handlers()?;

    let options = ServerOptions {
        idle_sleep: Duration::from_millis(config.concentrator.idle_sleep_ms),
        stats_interval: (config.concentrator.stats_interval_s > 0)
            .then(|| Duration::from_secs(config.concentrator.stats_interval_s)),
    };
    let mut server = Server::new(session, connections, pipeline, lifecycle, options);

    let mode = server.run()?;
    server.shutdown(mode);
    if mode == ShutdownMode::Immediate {
        // Skip every destructor so the concentrator and sockets stay as they are
        std::mem::forget(server);
    }
    Ok(mode)
}
