//! Emulated ELM327 OBD2 adapter
//!
//! Usage: cargo run -p obdsim-server -- [OPTIONS]
//! Then point a diagnostic app at 127.0.0.1:35000 (or :35001)

use clap::Parser;
use log::{debug, error, info, LevelFilter};
use obdsim_elm327_lib::{ProtocolDispatcher, Simulator};
use obdsim_telemetry::TelemetryEngine;
use std::ffi::OsStr;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

mod config;
mod error;
mod transport;

use config::{Config, ListenerConfig, LogLevel};
use error::ServerError;
use transport::{run_listener, SharedSimulator};

#[derive(Parser, Debug)]
#[command(name = "obdsim")]
#[command(version, about = "Emulate an ELM327 OBD2 adapter attached to a running car")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listener as NAME=ADDRESS; repeat for several transports (replaces configured listeners)
    #[arg(short, long, value_parser = ListenerConfig::parse)]
    listen: Vec<ListenerConfig>,

    /// Telemetry tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Answer ATZ immediately instead of simulating the reset time
    #[arg(long)]
    no_reset_delay: bool,

    /// Debug logging, including every command and response
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<Config, ServerError> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if !args.listen.is_empty() {
        config.listeners.clone_from(&args.listen);
    }
    if let Some(tick_ms) = args.tick_ms {
        config.tick_ms = tick_ms;
    }
    if args.no_reset_delay {
        config.reset_delay_ms = 0;
    }
    if args.verbose {
        config.log_level = LogLevel::Debug;
    }
    config.validate();
    Ok(config)
}

/// Level to apply once the config is loaded; `RUST_LOG` wins when set.
fn configured_level(config: &Config, rust_log: Option<&OsStr>) -> Option<LevelFilter> {
    rust_log
        .is_none()
        .then(|| config.log_level.as_level_filter())
}

/// Poll the simulator on a fixed cadence and dump telemetry periodically.
fn run_ticker(
    simulator: &SharedSimulator,
    tick: Duration,
    status_interval: Option<Duration>,
) -> ! {
    let mut last_status = Instant::now();
    loop {
        std::thread::sleep(tick);
        let now = Instant::now();
        let mut sim = simulator.lock().unwrap();
        sim.poll(now);

        if let Some(interval) = status_interval {
            if now.duration_since(last_status) >= interval {
                last_status = now;
                match serde_json::to_string(sim.telemetry()) {
                    Ok(json) => debug!("Telemetry: {json}"),
                    Err(e) => error!("Failed to serialize telemetry: {e}"),
                }
                debug!("Adapter config: {:?}", sim.config());
            }
        }
    }
}

fn run(config: &Config) -> Result<(), ServerError> {
    let simulator: SharedSimulator = Arc::new(Mutex::new(Simulator::with_parts(
        ProtocolDispatcher::with_reset_delay(config.reset_delay()),
        TelemetryEngine::new(),
    )));
    info!("Initial telemetry: {:?}", simulator.lock().unwrap().telemetry());

    for listener_config in &config.listeners {
        let listener = TcpListener::bind(&listener_config.address)?;
        info!(
            "Mock ELM327 {} ready on {}",
            listener_config.name,
            listener.local_addr()?
        );
        let origin = listener_config.name.clone();
        let simulator = Arc::clone(&simulator);
        std::thread::spawn(move || run_listener(listener, origin, simulator));
    }

    info!("Waiting for connections...");
    run_ticker(&simulator, config.tick_interval(), config.status_interval())
}

fn main() {
    let args = Args::parse();

    // Log config warnings before the configured level is known
    env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .init();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    if let Some(level) = configured_level(&config, std::env::var_os("RUST_LOG").as_deref()) {
        log::set_max_level(level);
        info!("Log level set to {:?}", config.log_level);
    }

    if let Err(e) = run(&config) {
        error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_level() {
        let mut config = Config::default();
        config.log_level = LogLevel::Warn;
        assert_eq!(configured_level(&config, None), Some(LevelFilter::Warn));
        assert_eq!(configured_level(&config, Some(OsStr::new("debug"))), None);
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "obdsim",
            "--listen",
            "garage=127.0.0.1:0",
            "--tick-ms",
            "0",
            "--no-reset-delay",
            "--verbose",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.listeners.len(), 1);
        assert_eq!(config.listeners[0].name, "garage");
        // validate() runs after the overrides
        assert_eq!(config.tick_ms, 100);
        assert_eq!(config.reset_delay_ms, 0);
        assert_eq!(config.log_level, LogLevel::Debug);
    }
}
