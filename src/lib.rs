// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serve the readings of a [Modbus](https://en.wikipedia.org/wiki/Modbus)
//! RTU power meter as JSON over HTTP.
//!
//! A single [`BusClient`](bus::BusClient) owns the serial line and
//! serializes all exchanges on it. Every HTTP connection is handled by a
//! [`Dispatcher`](http::Dispatcher) that reads one value under a
//! deadline and answers with a flat JSON object:
//!
//! ```text
//! GET /export HTTP/1.0
//!
//! HTTP/1.0 200 OK
//! Content-Type: application/json
//! Content-Length: 63
//!
//! {"status":"success","export":1234567,"timestamp":1760870000.25}
//! ```
//!
//! ## Example
//!
//! ```no_run
//! # #[cfg(feature = "rtu")]
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use modbus_meter_gateway::prelude::*;
//!
//! let config = Config::default();
//! let master = RtuMaster::open(&config.bus)?;
//! let bus = Arc::new(BusClient::new(Box::new(master), config.bus.slave));
//! let dispatcher = Dispatcher::new(bus, config.server.request_timeout());
//! Server::bind(config.server.socket_addr())?
//!     .serve_forever(dispatcher)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(unreachable_pub)]
#![warn(unsafe_code)]

pub mod prelude;

pub mod bus;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod http;
pub mod network;
pub mod server;

mod error;
pub use self::error::{ConfigError, Error, NetworkError};

mod slave;
pub use self::slave::{Slave, SlaveId};

/// A register address
pub type Address = u16;

/// A single 16-bit register value
pub type Word = u16;

/// Number of registers to read
pub type Quantity = u16;

/// Specialized [`std::result::Result`] type for reading values.
pub type Result<T> = std::result::Result<T, Error>;
