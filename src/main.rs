// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meter gateway daemon

use std::{net::IpAddr, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use log::{info, warn};

use modbus_meter_gateway::{
    bus::{rtu::RtuMaster, BusClient},
    config::Config,
    http::Dispatcher,
    network::{self, HostLink},
    server::Server,
    Slave,
};

/// Serve Modbus RTU power meter readings as JSON over HTTP
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port of the RS-485 adapter
    #[arg(long)]
    serial_port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Modbus slave address of the meter
    #[arg(long)]
    slave: Option<u8>,

    /// Address to bind the HTTP server to
    #[arg(long)]
    bind: Option<IpAddr>,

    /// HTTP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Start serving without waiting for a network address
    #[arg(long)]
    no_wait_for_network: bool,
}

impl Args {
    fn apply(self, config: &mut Config) {
        let Self {
            config: _,
            serial_port,
            baud_rate,
            slave,
            bind,
            port,
            no_wait_for_network,
        } = self;
        if let Some(serial_port) = serial_port {
            config.bus.serial_port = serial_port;
        }
        if let Some(baud_rate) = baud_rate {
            config.bus.baud_rate = baud_rate;
        }
        if let Some(slave) = slave {
            config.bus.slave = Slave(slave);
        }
        if let Some(bind) = bind {
            config.server.address = bind;
        }
        if let Some(port) = port {
            config.server.port = port;
        }
        if no_wait_for_network {
            config.network.wait_for_address = false;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    if config.network.wait_for_address {
        let ip = network::wait_for_address(&mut HostLink::default(), &config.network)
            .await
            .context("Failed to start")?;
        info!("Ready! Access your server at: http://{ip}:{}/", config.server.port);
    }

    let master = RtuMaster::open(&config.bus)
        .with_context(|| format!("Failed to open serial port {}", config.bus.serial_port))?;
    let bus = BusClient::new(Box::new(master), config.bus.slave)
        .with_response_timeout(config.bus.response_timeout());
    info!(
        "Polling slave {} on {} at {} baud",
        bus.slave(),
        config.bus.serial_port,
        config.bus.baud_rate
    );
    let bus = Arc::new(bus);

    let socket_addr = config.server.socket_addr();
    let server =
        Server::bind(socket_addr).with_context(|| format!("Failed to listen on {socket_addr}"))?;
    let dispatcher = Dispatcher::new(Arc::clone(&bus), config.server.request_timeout());
    let abort_signal = Box::pin(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    });
    let terminated = server.serve_until(dispatcher, abort_signal).await?;
    info!("Server terminated: {terminated:?}");

    if let Err(err) = bus.disconnect().await {
        warn!("Failed to close the serial port: {err}");
    }
    Ok(())
}
