// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide configuration
//!
//! Loaded once at startup from an optional TOML file. Every field has a
//! default matching the reference deployment: a meter with slave
//! address 1 on a 9600 baud 8N1 line, served on port 80.
//!
//! ```toml
//! [bus]
//! serial_port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! slave = 1
//! response_timeout_ms = 1000
//!
//! [server]
//! port = 8080
//! request_timeout_secs = 5
//! ```

use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
    time::Duration,
};

use log::debug;
use serde::Deserialize;

use crate::{error::ConfigError, slave::Slave};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bus: BusConfig,
    pub server: ServerConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Serial line and meter addressing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    /// 5 to 8
    pub data_bits: u8,
    /// 1 or 2
    pub stop_bits: u8,
    pub parity: Parity,
    pub slave: Slave,
    /// How long the meter may take to answer a single request.
    pub response_timeout_ms: u64,
}

impl BusConfig {
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_owned(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            slave: Slave::min_device(),
            response_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// Deadline for a single bus-backed request.
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 80,
            request_timeout_secs: 5,
        }
    }
}

/// Waiting for the network link before serving.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub wait_for_address: bool,
    pub attempts: u32,
    pub poll_interval_secs: u64,
}

impl NetworkConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wait_for_address: true,
            attempts: 10,
            poll_interval_secs: 1,
        }
    }
}

impl Config {
    /// Read and validate a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// The defaults, unless a file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Self {
            bus,
            server,
            network,
        } = self;
        if !bus.slave.is_single_device() {
            return Err(ConfigError::Invalid(format!(
                "slave address {} is not a single device",
                bus.slave
            )));
        }
        if !(5..=8).contains(&bus.data_bits) {
            return Err(ConfigError::Invalid(format!(
                "unsupported number of data bits: {}",
                bus.data_bits
            )));
        }
        if !matches!(bus.stop_bits, 1 | 2) {
            return Err(ConfigError::Invalid(format!(
                "unsupported number of stop bits: {}",
                bus.stop_bits
            )));
        }
        if bus.response_timeout_ms == 0 {
            return Err(ConfigError::Invalid("response timeout must not be zero".into()));
        }
        if server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request timeout must not be zero".into()));
        }
        if network.wait_for_address && network.attempts == 0 {
            return Err(ConfigError::Invalid(
                "at least one network attempt is required".into(),
            ));
        }
        Ok(())
    }
}
