// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU serial master

use std::{
    fmt, io,
    pin::Pin,
    task::{Context as TaskContext, Poll},
};

use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_modbus::{
    client::{rtu, Context},
    prelude::{Client as _, Reader as _, SlaveContext as _},
};
use tokio_serial::{DataBits, SerialStream, StopBits};

use crate::{
    config::{BusConfig, Parity},
    slave::Slave,
    Address, Quantity, Word,
};

use super::{HoldingRegisters, TransportError};

/// Serial master on top of a `tokio-modbus` RTU client context.
#[derive(Debug)]
pub struct RtuMaster {
    context: Context,
}

impl RtuMaster {
    /// Attach to an already opened transport.
    pub fn attach<T>(transport: T) -> Self
    where
        T: AsyncRead + AsyncWrite + fmt::Debug + Unpin + Send + 'static,
    {
        Self {
            context: rtu::attach(QuietLine::new(transport)),
        }
    }

    /// Open the configured serial port.
    pub fn open(config: &BusConfig) -> tokio_serial::Result<Self> {
        let builder = tokio_serial::new(&config.serial_port, config.baud_rate)
            .data_bits(data_bits(config.data_bits))
            .stop_bits(stop_bits(config.stop_bits))
            .parity(parity(config.parity));
        let port = SerialStream::open(&builder)?;
        Ok(Self::attach(port))
    }
}

/// Serial line that discards unsolicited input before each request.
///
/// Bytes that are already waiting when a new request is written belong
/// to an earlier, abandoned exchange and must never be decoded as the
/// reply to this one.
#[derive(Debug)]
struct QuietLine<T> {
    inner: T,
    drain_before_write: bool,
}

impl<T> QuietLine<T> {
    fn new(inner: T) -> Self {
        Self {
            inner,
            drain_before_write: true,
        }
    }
}

impl<T: AsyncRead + Unpin> QuietLine<T> {
    fn poll_drain(&mut self, cx: &mut TaskContext<'_>) -> io::Result<usize> {
        let mut scratch = [0; 256];
        let mut discarded = 0;
        loop {
            let mut buf = ReadBuf::new(&mut scratch);
            match Pin::new(&mut self.inner).poll_read(cx, &mut buf) {
                Poll::Ready(Ok(())) if buf.filled().is_empty() => return Ok(discarded),
                Poll::Ready(Ok(())) => discarded += buf.filled().len(),
                Poll::Ready(Err(err)) => return Err(err),
                Poll::Pending => return Ok(discarded),
            }
        }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for QuietLine<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.drain_before_write = true;
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> AsyncWrite for QuietLine<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.drain_before_write {
            let discarded = this.poll_drain(cx)?;
            if discarded > 0 {
                debug!("Discarded {discarded} stale byte(s) from the line");
            }
            this.drain_before_write = false;
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

fn data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn stop_bits(bits: u8) -> StopBits {
    match bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    }
}

fn parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

#[async_trait]
impl HoldingRegisters for RtuMaster {
    async fn read_holding_registers(
        &mut self,
        slave: Slave,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Word>, TransportError> {
        self.context.set_slave(tokio_modbus::Slave(slave.into()));
        match self.context.read_holding_registers(addr, cnt).await {
            Ok(Ok(words)) => Ok(words),
            Ok(Err(exception)) => Err(TransportError::new(format!(
                "exception response from slave {slave}: {exception}"
            ))),
            Err(err) => Err(TransportError::new(err)),
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.context.disconnect().await.map_err(TransportError::new)
    }
}
