// Copyright (C) 2026  Braiins Systems s.r.o.
//
// This file is part of Braiins Open-Source Initiative (BOSI).
//
// BOSI is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// Please, keep in mind that we may also license BOSI or any part thereof
// under a proprietary license. For more information on the terms and conditions
// of such proprietary license or if you have any other questions, please
// contact us at opensource@braiins.com.

mod port_file;

pub use port_file::PortAdvertiser;

use failure::Fail;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Network sizes for the ensemble's three-layer network: `(input, h1, h2,
/// output)`. Defaults to `784 -> 128 -> 64 -> 10`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkSizes {
    pub input: usize,
    pub hidden1: usize,
    pub hidden2: usize,
    pub output: usize,
}

impl Default for NetworkSizes {
    fn default() -> Self {
        Self {
            input: 784,
            hidden1: 128,
            hidden2: 64,
            output: 10,
        }
    }
}

fn default_passes() -> u32 {
    21
}

fn default_jitter() -> f64 {
    0.01
}

fn default_discovery_timeout_ms() -> u64 {
    2000
}

fn default_server_log_path() -> String {
    "/var/log/hasher-host.log".to_string()
}

/// The single configuration record passed into `Orchestrator::new` /
/// `Server::new`. Replaces the source's scattered globals -
/// flag-parsed config, a well-known port-file path, an implicit default
/// server address - with one explicit, serializable struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub device_ip: String,
    pub device_password: String,
    /// `0` means auto-bind in `8080..=9090`.
    pub port: u16,
    /// Empty string means discovery is disabled.
    pub discovery_subnet: String,
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,
    pub auto_deploy: bool,
    pub cleanup_on_exit: bool,
    pub force_redeploy: bool,
    pub monitor_server_logs: bool,
    #[serde(default = "default_server_log_path")]
    pub server_log_path: String,
    #[serde(default = "default_passes")]
    pub passes: u32,
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    pub seed_rotation: bool,
    #[serde(default)]
    pub network_sizes: NetworkSizes,
    /// Opt-in per the source's hazardous deployment steps:
    /// forced kernel-module unload and `mknod` of device nodes. Default off.
    #[serde(default)]
    pub allow_kernel_module_unload: bool,
    #[serde(default)]
    pub allow_device_node_creation: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            device_ip: String::new(),
            device_password: String::new(),
            port: 0,
            discovery_subnet: String::new(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            auto_deploy: false,
            cleanup_on_exit: true,
            force_redeploy: false,
            monitor_server_logs: true,
            server_log_path: default_server_log_path(),
            passes: default_passes(),
            jitter: default_jitter(),
            seed_rotation: true,
            network_sizes: NetworkSizes::default(),
            allow_kernel_module_unload: false,
            allow_device_node_creation: false,
        }
    }
}

#[derive(Debug, Fail)]
pub enum ConfigError {
    #[fail(display = "failed to read configuration file {}: {}", path, source)]
    Read { path: String, source: std::io::Error },
    #[fail(display = "failed to parse configuration: {}", _0)]
    Parse(toml::de::Error),
    #[fail(display = "invalid CIDR in discovery_subnet: {}", _0)]
    InvalidSubnet(ipnet::AddrParseError),
    #[fail(display = "jitter must be within [0, 1], got {}", _0)]
    InvalidJitter(f64),
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<ipnet::AddrParseError> for ConfigError {
    fn from(e: ipnet::AddrParseError) -> Self {
        ConfigError::InvalidSubnet(e)
    }
}

impl CoreConfig {
    /// Parse a TOML configuration file, falling back to `CoreConfig::default`
    /// for any field the file omits.
    pub fn from_toml_file(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::InvalidJitter(self.jitter));
        }
        if !self.discovery_subnet.is_empty() {
            self.discovery_subnet.parse::<ipnet::IpNet>()?;
        }
        Ok(())
    }

    pub fn device_addr(&self) -> Option<IpAddr> {
        self.device_ip.parse().ok()
    }
}

/// Command-line overlay. Every field is optional so a CLI invocation can
/// override only what it wants on top of a config file, matching the
/// common "file defaults, flags override" pattern.
#[derive(Debug, clap::Parser)]
#[command(name = "orchestrator", about = "Inference orchestration engine")]
pub struct Cli {
    #[arg(long, default_value = "orchestrator.toml")]
    pub config: String,

    #[arg(long)]
    pub device_ip: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub discovery_subnet: Option<String>,

    #[arg(long)]
    pub auto_deploy: bool,

    #[arg(long)]
    pub passes: Option<u32>,
}

impl Cli {
    pub fn apply(self, mut config: CoreConfig) -> CoreConfig {
        if let Some(v) = self.device_ip {
            config.device_ip = v;
        }
        if let Some(v) = self.port {
            config.port = v;
        }
        if let Some(v) = self.discovery_subnet {
            config.discovery_subnet = v;
        }
        if self.auto_deploy {
            config.auto_deploy = true;
        }
        if let Some(v) = self.passes {
            config.passes = v;
        }
        config
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        CoreConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_jitter_out_of_range() {
        let mut config = CoreConfig::default();
        config.jitter = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidJitter(_))
        ));
    }

    #[test]
    fn rejects_invalid_cidr() {
        let mut config = CoreConfig::default();
        config.discovery_subnet = "not-a-cidr".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSubnet(_))
        ));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let dir = std::env::temp_dir().join(format!(
            "core-config-test-{:?}",
            std::thread::current().id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "device_ip = \"192.168.1.50\"\npasses = 5\n").unwrap();
        let config = CoreConfig::from_toml_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.device_ip, "192.168.1.50");
        assert_eq!(config.passes, 5);
        assert_eq!(config.network_sizes, NetworkSizes::default());
        std::fs::remove_dir_all(&dir).ok();
    }
}
