// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meter registers and the HTTP endpoints that expose them

use std::fmt;

use crate::{Address, Quantity};

/// Where and how wide a measurement is on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingDefinition {
    pub name: &'static str,
    pub address: Address,
    pub registers: Quantity,
}

impl ReadingDefinition {
    pub const fn new(name: &'static str, address: Address, registers: Quantity) -> Self {
        Self {
            name,
            address,
            registers,
        }
    }
}

impl fmt::Display for ReadingDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (0x{:04X}, {} registers)",
            self.name, self.address, self.registers
        )
    }
}

pub const HISTORIC_TOTAL_ACTIVE_ENERGY_IMPORT: ReadingDefinition =
    ReadingDefinition::new("Historic Total Active Energy Import", 0x0C83, 4);
pub const HISTORIC_TOTAL_ACTIVE_ENERGY_EXPORT: ReadingDefinition =
    ReadingDefinition::new("Historic Total Active Energy Export", 0x0C87, 4);
pub const NOMINAL_FREQUENCY: ReadingDefinition =
    ReadingDefinition::new("Nominal Frequency", 0x07E0, 1);
pub const LIVE_TOTAL_ACTIVE_POWER: ReadingDefinition =
    ReadingDefinition::new("Live total active power", 0x0BF3, 2);
pub const LIVE_ACTIVE_POWER_L1: ReadingDefinition =
    ReadingDefinition::new("Live active power Phase L1", 0x0BED, 2);
pub const LIVE_ACTIVE_POWER_L2: ReadingDefinition =
    ReadingDefinition::new("Live active power Phase L2", 0x0BEF, 2);
pub const LIVE_ACTIVE_POWER_L3: ReadingDefinition =
    ReadingDefinition::new("Live active power Phase L3", 0x0BF1, 2);

/// A bus-backed HTTP endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub path: &'static str,
    /// Name of the JSON field carrying the value.
    pub field: &'static str,
    pub reading: ReadingDefinition,
}

pub static ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        path: "/frequency",
        field: "frequency",
        reading: NOMINAL_FREQUENCY,
    },
    Endpoint {
        path: "/import",
        field: "import",
        reading: HISTORIC_TOTAL_ACTIVE_ENERGY_IMPORT,
    },
    Endpoint {
        path: "/export",
        field: "export",
        reading: HISTORIC_TOTAL_ACTIVE_ENERGY_EXPORT,
    },
    Endpoint {
        path: "/power",
        field: "power",
        reading: LIVE_TOTAL_ACTIVE_POWER,
    },
    Endpoint {
        path: "/power/l1",
        field: "power_l1",
        reading: LIVE_ACTIVE_POWER_L1,
    },
    Endpoint {
        path: "/power/l2",
        field: "power_l2",
        reading: LIVE_ACTIVE_POWER_L2,
    },
    Endpoint {
        path: "/power/l3",
        field: "power_l3",
        reading: LIVE_ACTIVE_POWER_L3,
    },
];

/// Look up the bus-backed endpoint for a request path.
pub fn find_endpoint(path: &str) -> Option<&'static Endpoint> {
    ENDPOINTS.iter().find(|endpoint| endpoint.path == path)
}
