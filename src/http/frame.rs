// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use serde::{ser::SerializeMap as _, Serialize, Serializer};

/// The part of an HTTP request head that is needed for dispatching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHead {
    /// `None` if the request line could not be parsed.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    NotFound,
    InternalServerError,
    ServiceUnavailable,
}

impl StatusCode {
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
            Self::ServiceUnavailable => 503,
        }
    }

    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NotFound => "Not Found",
            Self::InternalServerError => "Internal Server Error",
            Self::ServiceUnavailable => "Service Unavailable",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// Seconds since the Unix epoch.
#[must_use]
pub fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

/// The result of a single request, serialized as a flat JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `{"status": "success", "time": ..}`
    Alive { time: f64 },

    /// `{"status": "success", <field>: .., "timestamp": ..}`
    Reading {
        field: &'static str,
        value: i64,
        timestamp: f64,
    },

    /// `{"status": "error", "error": .., "detail": .., "timestamp": ..}`
    Failure {
        error: String,
        detail: Option<String>,
        timestamp: Option<f64>,
    },
}

impl Serialize for Outcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Alive { time } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("status", "success")?;
                map.serialize_entry("time", time)?;
                map.end()
            }
            Self::Reading {
                field,
                value,
                timestamp,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("status", "success")?;
                map.serialize_entry(field, value)?;
                map.serialize_entry("timestamp", timestamp)?;
                map.end()
            }
            Self::Failure {
                error,
                detail,
                timestamp,
            } => {
                let len = 2 + usize::from(detail.is_some()) + usize::from(timestamp.is_some());
                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry("status", "error")?;
                map.serialize_entry("error", error)?;
                if let Some(detail) = detail {
                    map.serialize_entry("detail", detail)?;
                }
                if let Some(timestamp) = timestamp {
                    map.serialize_entry("timestamp", timestamp)?;
                }
                map.end()
            }
        }
    }
}

/// A complete HTTP/1.0 response with a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Response {
    pub fn json(status: StatusCode, outcome: &Outcome) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(outcome)?.into();
        Ok(Self { status, body })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn to_value(outcome: &Outcome) -> Value {
        serde_json::to_value(outcome).unwrap()
    }

    #[test]
    fn status_line_text() {
        assert_eq!(StatusCode::Ok.to_string(), "200 OK");
        assert_eq!(
            StatusCode::ServiceUnavailable.to_string(),
            "503 Service Unavailable"
        );
    }

    #[test]
    fn alive() {
        let value = to_value(&Outcome::Alive { time: 1.5 });
        assert_eq!(value, json!({"status": "success", "time": 1.5}));
    }

    #[test]
    fn reading_uses_field_name() {
        let value = to_value(&Outcome::Reading {
            field: "export",
            value: -2,
            timestamp: 10.0,
        });
        assert_eq!(
            value,
            json!({"status": "success", "export": -2, "timestamp": 10.0})
        );
    }

    #[test]
    fn failure_omits_missing_fields() {
        let value = to_value(&Outcome::Failure {
            error: "Invalid endpoint".into(),
            detail: None,
            timestamp: None,
        });
        assert_eq!(value, json!({"status": "error", "error": "Invalid endpoint"}));

        let value = to_value(&Outcome::Failure {
            error: "Modbus communication failed".into(),
            detail: Some("no response".into()),
            timestamp: Some(2.0),
        });
        assert_eq!(
            value,
            json!({
                "status": "error",
                "error": "Modbus communication failed",
                "detail": "no response",
                "timestamp": 2.0,
            })
        );
    }

    #[test]
    fn unix_time_is_after_2020() {
        assert!(unix_time() > 1_577_836_800.0);
    }
}
