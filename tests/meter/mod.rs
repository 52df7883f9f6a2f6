// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

use modbus_meter_gateway::{
    bus::{BusClient, HoldingRegisters, TransportError},
    catalog::ReadingDefinition,
    codec::split_registers,
    http::Dispatcher,
    Address, Quantity, Slave, Word,
};

/// What the transport observed.
#[derive(Debug, Default)]
pub struct Wire {
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Wire {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Marks an exchange as being on the wire until dropped.
struct Exchange<'a>(&'a Wire);

impl<'a> Exchange<'a> {
    fn begin(wire: &'a Wire) -> Self {
        let in_flight = wire.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        wire.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        Self(wire)
    }
}

impl Drop for Exchange<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A simulated power meter behind the serial master seam.
#[derive(Debug, Default)]
pub struct MockMeter {
    registers: HashMap<Address, Word>,
    delay: Duration,
    stalled_reads: usize,
    failure: Option<String>,
    pub wire: Arc<Wire>,
}

impl MockMeter {
    pub fn with_value(mut self, reading: &ReadingDefinition, value: i64) -> Self {
        let words = split_registers(value, reading.registers.into()).unwrap();
        for (addr, word) in (reading.address..).zip(words) {
            self.registers.insert(addr, word);
        }
        self
    }

    /// Every exchange takes `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The next `count` exchanges never complete.
    pub fn with_stalled_reads(mut self, count: usize) -> Self {
        self.stalled_reads = count;
        self
    }

    pub fn failing(mut self, detail: &str) -> Self {
        self.failure = Some(detail.to_owned());
        self
    }
}

#[async_trait]
impl HoldingRegisters for MockMeter {
    async fn read_holding_registers(
        &mut self,
        slave: Slave,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Word>, TransportError> {
        assert_eq!(slave, Slave(1));
        self.wire.calls.fetch_add(1, Ordering::SeqCst);
        let _exchange = Exchange::begin(&self.wire);
        if self.stalled_reads > 0 {
            self.stalled_reads -= 1;
            // Dropped by the deadline before this completes
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        tokio::time::sleep(self.delay).await;
        if let Some(detail) = &self.failure {
            return Err(TransportError::new(detail));
        }
        Ok((addr..addr + cnt)
            .map(|addr| self.registers.get(&addr).copied().unwrap_or_default())
            .collect())
    }
}

pub fn dispatcher(meter: MockMeter) -> (Dispatcher, Arc<Wire>) {
    let wire = Arc::clone(&meter.wire);
    let bus = BusClient::new(Box::new(meter), Slave(1))
        .with_response_timeout(Duration::from_secs(4));
    let bus = Arc::new(bus);
    (Dispatcher::new(bus, Duration::from_secs(5)), wire)
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn parse(raw: &[u8]) -> Self {
        let text = std::str::from_utf8(raw).unwrap();
        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap().to_owned();
        let headers = lines
            .map(|line| {
                let (name, value) = line.split_once(": ").unwrap();
                (name.to_owned(), value.to_owned())
            })
            .collect();
        Self {
            status_line,
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Send `request` over an in-memory connection and collect the raw reply.
pub async fn exchange(dispatcher: &Dispatcher, request: &[u8]) -> Vec<u8> {
    let (mut client, server) = tokio::io::duplex(4096);
    let dispatcher = dispatcher.clone();
    let connection = tokio::spawn(async move { dispatcher.handle_connection(server).await });
    client.write_all(request).await.unwrap();
    client.shutdown().await.unwrap();
    let mut raw = Vec::new();
    client.read_to_end(&mut raw).await.unwrap();
    connection.await.unwrap().unwrap();
    raw
}

pub async fn get(dispatcher: &Dispatcher, path: &str) -> HttpResponse {
    let request = format!("GET {path} HTTP/1.1\r\nHost: meter\r\nAccept: */*\r\n\r\n");
    HttpResponse::parse(&exchange(dispatcher, request.as_bytes()).await)
}
