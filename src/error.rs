// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while serving a reading.
///
/// The request dispatcher is the only place where these are mapped
/// to HTTP status codes.
#[derive(Debug, Error)]
pub enum Error {
    /// Only 1 to 4 registers can be combined into a single value.
    #[error("invalid register count: {0} (must be between 1 and 4)")]
    InvalidRegisterCount(usize),

    /// The field bus exchange failed: no response, a malformed
    /// response or an exception response from the device.
    #[error("bus read failed: {detail}")]
    BusRead { detail: String },

    /// No response from the bus within the deadline.
    #[error("request timed out after {} seconds", whole_seconds(.0))]
    RequestTimeout(Duration),

    /// The HTTP request head could not be parsed.
    #[error("malformed request")]
    MalformedRequest,

    /// No reading is served under the requested path.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// Anything unanticipated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn bus_read(detail: impl ToString) -> Self {
        Self::BusRead {
            detail: detail.to_string(),
        }
    }
}

/// Seconds of a duration, rounded up.
pub(crate) fn whole_seconds(duration: &Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Errors while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The network link did not come up in time.
#[derive(Debug, Error)]
#[error("network connection failed after {attempts} attempt(s)")]
pub struct NetworkError {
    pub attempts: u32,
}
