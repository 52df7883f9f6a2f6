// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types and traits

///////////////////////////////////////////////////////////////////
/// Types
///////////////////////////////////////////////////////////////////
pub use crate::bus::{BusClient, TransportError};
pub use crate::catalog::{Endpoint, ReadingDefinition};
pub use crate::config::Config;
pub use crate::http::{Dispatcher, Outcome, Response, StatusCode};
pub use crate::server::{Server, Terminated};
pub use crate::{Address, Error, Quantity, Slave, SlaveId, Word};

#[cfg(feature = "rtu")]
pub use crate::bus::rtu::RtuMaster;

///////////////////////////////////////////////////////////////////
/// Traits
///////////////////////////////////////////////////////////////////
pub use crate::bus::HoldingRegisters;
pub use crate::network::NetworkLink;
