use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub inverters: Vec<Inverter>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    /// Fail instead of warning when a reply carries another serial number
    /// than the one requested.
    #[serde(default = "Config::default_strict_serial_check")]
    pub strict_serial_check: bool,
}

// Inverter {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Inverter {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub host: String,
    #[serde(default = "Config::default_port")]
    pub port: u16,
    #[serde(deserialize_with = "de_serial")]
    pub serial: u32,

    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub request_timeout: Option<Duration>,
    pub use_tcp_nodelay: Option<bool>,
}
impl Inverter {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout.unwrap_or(Duration::from_secs(10))
    }

    pub fn use_tcp_nodelay(&self) -> bool {
        self.use_tcp_nodelay.unwrap_or(true)
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("config.rs:error reading {}: {}", file, err))?;

        Self::from_yaml(&content).with_context(|| format!("config.rs:error parsing {}", file))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn enabled_inverters(&self) -> Vec<Inverter> {
        self.inverters.iter().filter(|i| i.enabled()).cloned().collect()
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    pub fn strict_serial_check(&self) -> bool {
        self.strict_serial_check
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!(
            "  Inverters: {} configured, {} enabled",
            self.inverters.len(),
            self.inverters.iter().filter(|i| i.enabled).count()
        );
        for (i, inv) in self.inverters.iter().enumerate() {
            info!("    Inverter[{}]:", i);
            info!("      Enabled: {}", inv.enabled);
            info!("      Host: {}", inv.host);
            info!("      Port: {}", inv.port);
            info!("      Serial: {}", inv.serial);
            info!("      Request Timeout: {}s", inv.request_timeout().as_secs());
            info!("      TCP NoDelay: {}", inv.use_tcp_nodelay());
        }
        info!("  Strict Serial Check: {}", self.strict_serial_check);
        info!("  Log Level: {}", self.loglevel);
    }

    fn validate(&self) -> Result<()> {
        for (i, inv) in self.inverters.iter().enumerate() {
            if inv.enabled {
                if inv.port == 0 {
                    bail!("inverter[{}].port must be between 1 and 65535", i);
                }
                if inv.host.is_empty() {
                    bail!("inverter[{}].host cannot be empty", i);
                }
                if inv.request_timeout().is_zero() {
                    bail!("inverter[{}].request_timeout must be at least 1 second", i);
                }
            }
        }

        Ok(())
    }

    fn default_port() -> u16 {
        8899
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_strict_serial_check() -> bool {
        false
    }
}

// The serial is printed on the inverter as a plain number, but people tend
// to quote it in YAML. Accept both.
fn de_serial<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSerial {
        Number(u32),
        Text(String),
    }

    match RawSerial::deserialize(deserializer)? {
        RawSerial::Number(n) => Ok(n),
        RawSerial::Text(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|e| serde::de::Error::custom(format!("invalid serial `{}`: {}", s, e))),
    }
}
