// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-connection request handling
//!
//! Every connection passes through the same sequence of states:
//! the request line and the header block are decoded by
//! [`ServerCodec`](codec::ServerCodec), the path is dispatched, a
//! single response is written and the connection is shut down. The
//! last step runs on every path, including decoding, bus and write
//! failures.

mod codec;
mod frame;

use std::{io, sync::Arc, time::Duration};

use futures_util::{SinkExt as _, StreamExt as _};
use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt as _};
use tokio_util::codec::Framed;

pub use self::frame::{unix_time, Outcome, RequestHead, Response, StatusCode};
use self::codec::ServerCodec;
use crate::{
    bus::BusClient,
    catalog::{find_endpoint, Endpoint},
    error::whole_seconds,
    Error, Result,
};

const INVALID_ENDPOINT: &str = "Invalid endpoint";
const MODBUS_FAILED: &str = "Modbus communication failed";
const INTERNAL_ERROR: &str = "Internal server error";

/// Static fallback if a body could not be serialized.
const INTERNAL_ERROR_BODY: &[u8] = br#"{"status":"error","error":"Internal server error"}"#;

/// Maps request paths to readings and readings to responses.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    bus: Arc<BusClient>,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(bus: Arc<BusClient>, request_timeout: Duration) -> Self {
        Self {
            bus,
            request_timeout,
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Serve a single request on `stream` and close it.
    pub async fn handle_connection<T>(&self, stream: T) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(stream, ServerCodec::default());
        let res = self.process(&mut framed).await;
        let closed = framed.get_mut().shutdown().await;
        debug!("Connection closed");
        res.and(closed)
    }

    async fn process<T>(&self, framed: &mut Framed<T, ServerCodec>) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let head = match framed.next().await {
            Some(head) => head?,
            None => {
                debug!("Connection closed before a request was received");
                return Ok(());
            }
        };
        match &head.path {
            Some(path) => info!("Received request for: {path}"),
            None => info!("Received malformed request"),
        }
        let res = self.dispatch(head.path.as_deref()).await;
        let status = res.status;
        framed.send(res).await?;
        info!("Response sent: {status}");
        Ok(())
    }

    /// Produce the response for a request path.
    ///
    /// `None` stands for a request line that could not be parsed.
    pub async fn dispatch(&self, path: Option<&str>) -> Response {
        let (status, outcome) = match path {
            Some("/") => (
                StatusCode::Ok,
                Outcome::Alive { time: unix_time() },
            ),
            Some(path) => match find_endpoint(path) {
                Some(endpoint) => self.read_endpoint(endpoint).await,
                None => failure(&Error::UnknownEndpoint(path.to_owned())),
            },
            None => failure(&Error::MalformedRequest),
        };
        Response::json(status, &outcome).unwrap_or_else(|err| {
            error!("Failed to serialize response: {err}");
            Response {
                status: StatusCode::InternalServerError,
                body: INTERNAL_ERROR_BODY.into(),
            }
        })
    }

    async fn read_endpoint(&self, endpoint: &Endpoint) -> (StatusCode, Outcome) {
        match self.read(endpoint).await {
            Ok(value) => (
                StatusCode::Ok,
                Outcome::Reading {
                    field: endpoint.field,
                    value,
                    timestamp: unix_time(),
                },
            ),
            Err(err) => {
                warn!("Reading {} failed: {err}", endpoint.reading);
                failure(&err)
            }
        }
    }

    /// Read under the deadline.
    ///
    /// On expiry the pending bus operation is dropped, which releases
    /// the bus session.
    async fn read(&self, endpoint: &Endpoint) -> Result<i64> {
        tokio::time::timeout(
            self.request_timeout,
            self.bus.read_definition(&endpoint.reading),
        )
        .await
        .unwrap_or_else(|_elapsed| Err(Error::RequestTimeout(self.request_timeout)))
    }
}

/// The single place where errors are mapped to HTTP.
fn failure(err: &Error) -> (StatusCode, Outcome) {
    match err {
        Error::MalformedRequest | Error::UnknownEndpoint(_) => (
            StatusCode::NotFound,
            Outcome::Failure {
                error: INVALID_ENDPOINT.to_owned(),
                detail: None,
                timestamp: None,
            },
        ),
        Error::RequestTimeout(timeout) => (
            StatusCode::ServiceUnavailable,
            Outcome::Failure {
                error: format!(
                    "Request timed out after {} seconds",
                    whole_seconds(timeout)
                ),
                detail: None,
                timestamp: Some(unix_time()),
            },
        ),
        Error::BusRead { detail } => (
            StatusCode::ServiceUnavailable,
            Outcome::Failure {
                error: MODBUS_FAILED.to_owned(),
                detail: Some(detail.clone()),
                timestamp: Some(unix_time()),
            },
        ),
        Error::InvalidRegisterCount(_) | Error::Internal(_) => (
            StatusCode::InternalServerError,
            Outcome::Failure {
                error: INTERNAL_ERROR.to_owned(),
                detail: Some(err.to_string()),
                timestamp: Some(unix_time()),
            },
        ),
    }
}
