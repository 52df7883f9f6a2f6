// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Waiting for the network link before serving

use std::{
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use async_trait::async_trait;
use log::{debug, info};
use tokio::net::UdpSocket;

use crate::{config::NetworkConfig, error::NetworkError};

/// A network interface that eventually obtains an address.
#[async_trait]
pub trait NetworkLink: Send {
    /// The current address, `None` while the link is not ready.
    async fn local_address(&mut self) -> io::Result<Option<IpAddr>>;
}

/// The address the host would use to reach `probe`.
///
/// Connecting a UDP socket only selects a route, no packets are sent.
#[derive(Debug, Clone)]
pub struct HostLink {
    probe: SocketAddr,
}

impl HostLink {
    pub fn new(probe: SocketAddr) -> Self {
        Self { probe }
    }
}

impl Default for HostLink {
    fn default() -> Self {
        Self::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 80))
    }
}

#[async_trait]
impl NetworkLink for HostLink {
    async fn local_address(&mut self) -> io::Result<Option<IpAddr>> {
        let unspecified = match self.probe {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(unspecified).await?;
        if let Err(err) = socket.connect(self.probe).await {
            // No route yet
            debug!("No route to {}: {err}", self.probe);
            return Ok(None);
        }
        let ip = socket.local_addr()?.ip();
        Ok((!ip.is_unspecified() && !ip.is_loopback()).then_some(ip))
    }
}

/// Poll `link` until it reports an address.
///
/// Gives up after `config.attempts` polls spaced by the poll interval.
pub async fn wait_for_address<L>(link: &mut L, config: &NetworkConfig) -> Result<IpAddr, NetworkError>
where
    L: NetworkLink + ?Sized,
{
    for attempt in 1..=config.attempts {
        match link.local_address().await {
            Ok(Some(ip)) => {
                info!("Connected, IP: {ip}");
                return Ok(ip);
            }
            Ok(None) => {}
            Err(err) => debug!("Network link not ready: {err}"),
        }
        if attempt < config.attempts {
            info!("Waiting for connection...");
            tokio::time::sleep(config.poll_interval()).await;
        }
    }
    Err(NetworkError {
        attempts: config.attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct MockLink {
        ready_after: u32,
        polls: u32,
    }

    #[async_trait]
    impl NetworkLink for MockLink {
        async fn local_address(&mut self) -> io::Result<Option<IpAddr>> {
            self.polls += 1;
            if self.polls == 1 {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "down"));
            }
            Ok((self.polls >= self.ready_after).then(|| "192.168.1.20".parse().unwrap()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn address_within_window() {
        let mut link = MockLink {
            ready_after: 4,
            polls: 0,
        };
        let started = tokio::time::Instant::now();
        let ip = wait_for_address(&mut link, &NetworkConfig::default())
            .await
            .unwrap();
        assert_eq!(ip, "192.168.1.20".parse::<IpAddr>().unwrap());
        assert_eq!(link.polls, 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn no_address_within_window() {
        let mut link = MockLink {
            ready_after: 11,
            polls: 0,
        };
        let err = wait_for_address(&mut link, &NetworkConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 10);
        assert_eq!(link.polls, 10);
    }
}
