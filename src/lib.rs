pub mod config;   // Configuration management
pub mod error;    // Protocol error types
pub mod omnik;    // Omnik TCP protocol implementation
pub mod options;  // Command line options parsing
pub mod prelude;  // Common imports and types

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::omnik::inverter::Inverter;
use serde::Serialize;
use std::io::Write;

/// One line of output: which inverter answered and what it said.
#[derive(Debug, Serialize)]
pub struct Reading<'a> {
    pub host: &'a str,
    pub serial: u32,
    pub information: &'a InformationReply,
}

fn init_logging(level: &str) {
    if let Err(e) = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init()
    {
        eprintln!("Failed to initialise logging: {}", e);
    }
}

/// Queries every enabled inverter once and prints each reply as JSON.
///
/// Inverters are queried concurrently, each over its own connection. Ctrl-C
/// abandons whatever is still outstanding.
pub async fn app(options: Options) -> Result<()> {
    let config = Config::new(options.config_file.clone())?;

    init_logging(options.loglevel.as_deref().unwrap_or(config.loglevel()));

    info!("omnik-tcp {} starting with config file: {}", CARGO_PKG_VERSION, options.config_file);
    config.log_summary();

    let inverters: Vec<Inverter> = config
        .enabled_inverters()
        .iter()
        .map(|inverter| Inverter::new(&config, inverter))
        .collect();

    if inverters.is_empty() {
        warn!("No enabled inverters configured, nothing to do");
        return Ok(());
    }

    let fetches = futures::future::join_all(inverters.iter().map(|inverter| inverter.fetch()));

    let results = tokio::select! {
        results = fetches => results,
        _ = tokio::signal::ctrl_c() => bail!("Interrupted, abandoning outstanding requests"),
    };

    let mut failures = 0;
    for (inverter, result) in inverters.iter().zip(results) {
        match result {
            Ok(information) => {
                let reading = Reading {
                    host: inverter.config().host(),
                    serial: inverter.config().serial(),
                    information: &information,
                };
                println!("{}", serde_json::to_string(&reading)?);
            }
            Err(e) => {
                error!("{:#}", e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} inverters failed", failures, inverters.len());
    }

    Ok(())
}
