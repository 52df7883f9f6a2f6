// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exclusive access to the field bus

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{debug, trace};
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};

use crate::{
    catalog::ReadingDefinition,
    codec::{self, combine_registers},
    slave::Slave,
    Address, Error, Quantity, Result, Word,
};

#[cfg(feature = "rtu")]
pub mod rtu;

/// Opaque failure of the underlying serial master.
///
/// Transport specific error types never leave the transport binding.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(String);

impl TransportError {
    pub fn new(err: impl fmt::Display) -> Self {
        Self(err.to_string())
    }
}

/// A serial master that is able to read holding registers.
#[async_trait]
pub trait HoldingRegisters: Send + fmt::Debug {
    /// Read multiple holding registers (0x03) as unsigned words.
    async fn read_holding_registers(
        &mut self,
        slave: Slave,
        addr: Address,
        cnt: Quantity,
    ) -> std::result::Result<Vec<Word>, TransportError>;

    /// Release the underlying transport.
    async fn disconnect(&mut self) -> std::result::Result<(), TransportError> {
        Ok(())
    }
}

/// Default bound for a single exchange on the wire.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Owner of the bus session.
///
/// The physical bus is half-duplex, so at most one exchange is on the
/// wire at any time. Concurrent readers are queued on the session lock
/// and resumed in FIFO order.
///
/// Each exchange runs in its own task that keeps the session until the
/// line is quiet again, even if the reader gives up early. A reader that
/// is gone before its turn never reaches the wire.
#[derive(Debug)]
pub struct BusClient {
    session: Arc<Mutex<Box<dyn HoldingRegisters>>>,
    slave: Slave,
    response_timeout: Duration,
}

impl BusClient {
    pub fn new(master: Box<dyn HoldingRegisters>, slave: Slave) -> Self {
        Self {
            session: Arc::new(Mutex::new(master)),
            slave,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Bound a single exchange on the wire.
    ///
    /// After an unanswered request the session is kept for another
    /// `response_timeout` so that a late reply is flushed from the line
    /// before the next request.
    #[must_use]
    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    #[must_use]
    pub fn slave(&self) -> Slave {
        self.slave
    }

    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Read `cnt` consecutive holding registers and combine them.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn read(&self, addr: Address, cnt: Quantity) -> Result<i64> {
        codec::check_count(cnt.into())?;
        let (tx, rx) = oneshot::channel();
        let session = Arc::clone(&self.session);
        let slave = self.slave;
        let response_timeout = self.response_timeout;
        tokio::spawn(async move {
            let mut master = session.lock_owned().await;
            if tx.is_closed() {
                trace!("Skipping read of 0x{addr:04X}, the request is gone");
                return;
            }
            let res = exchange(&mut **master, slave, addr, cnt, response_timeout).await;
            drop(master);
            // The reader may have given up meanwhile
            let _ = tx.send(res);
        });
        let words = rx
            .await
            .map_err(|_| Error::Internal("bus exchange aborted".to_owned()))??;
        if words.len() != usize::from(cnt) {
            return Err(Error::bus_read(format!(
                "malformed response: expected {cnt} register(s), received {}",
                words.len()
            )));
        }
        combine_registers(&words)
    }

    pub async fn read_definition(&self, reading: &ReadingDefinition) -> Result<i64> {
        let value = self.read(reading.address, reading.registers).await?;
        debug!(
            "{} - Address: {} Result: {value}",
            reading.name, reading.address
        );
        Ok(value)
    }

    /// Close the transport, waiting for a pending exchange to finish.
    pub async fn disconnect(&self) -> Result<()> {
        self.session
            .lock()
            .await
            .disconnect()
            .await
            .map_err(Error::bus_read)
    }
}

/// One request and its reply while holding the session.
async fn exchange(
    master: &mut dyn HoldingRegisters,
    slave: Slave,
    addr: Address,
    cnt: Quantity,
    response_timeout: Duration,
) -> Result<Vec<Word>> {
    trace!("Reading {cnt} holding register(s) at 0x{addr:04X} from slave {slave}");
    match tokio::time::timeout(
        response_timeout,
        master.read_holding_registers(slave, addr, cnt),
    )
    .await
    {
        Ok(res) => res.map_err(Error::bus_read),
        Err(_elapsed) => {
            // A reply may still be on its way
            tokio::time::sleep(response_timeout).await;
            Err(Error::bus_read(format!(
                "no response from slave {slave} within {response_timeout:?}"
            )))
        }
    }
}
