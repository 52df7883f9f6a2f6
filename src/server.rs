// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP server skeleton

use std::{future::Future, io, net::SocketAddr, time::Duration};

use futures_util::future;
use log::{debug, info, trace, warn};
use socket2::{Domain, Socket, Type};
use tokio::net::TcpListener;

use crate::http::Dispatcher;

const LISTEN_BACKLOG: i32 = 1024;

const MIN_ACCEPT_BACKOFF: Duration = Duration::from_millis(10);
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Pause after `failures` consecutive accept errors, e.g. when running
/// out of file descriptors.
fn accept_backoff(failures: u32) -> Duration {
    MIN_ACCEPT_BACKOFF
        .saturating_mul(1 << failures.saturating_sub(1).min(16))
        .min(MAX_ACCEPT_BACKOFF)
}

/// Why the server stopped serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminated {
    /// The server has been terminated by the abort signal.
    Aborted,
}

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Attach the server to an already bound listener.
    #[must_use]
    pub fn new(listener: TcpListener) -> Self {
        Self { listener }
    }

    /// Configure and open the listening socket.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;
        let listener = TcpListener::from_std(socket.into())?;
        Ok(Self::new(listener))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until the process is terminated.
    pub async fn serve_forever(self, dispatcher: Dispatcher) -> io::Result<Terminated> {
        self.serve_until(dispatcher, future::pending()).await
    }

    /// Serve until `abort_signal` resolves.
    ///
    /// Every accepted connection is handled by its own task, a failing
    /// connection never stops the server. Connections that are still in
    /// flight when the signal arrives are left to complete.
    pub async fn serve_until<X>(
        self,
        dispatcher: Dispatcher,
        mut abort_signal: X,
    ) -> io::Result<Terminated>
    where
        X: Future<Output = ()> + Unpin,
    {
        let Self { listener } = self;
        info!("Server started on {}", listener.local_addr()?);
        let mut accept_failures: u32 = 0;
        loop {
            let (stream, socket_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => {
                        accept_failures = 0;
                        accepted
                    }
                    Err(err) => {
                        accept_failures = accept_failures.saturating_add(1);
                        let backoff = accept_backoff(accept_failures);
                        warn!("Failed to accept connection: {err}, retrying in {backoff:?}");
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                },
                () = &mut abort_signal => {
                    trace!("Abort signal received");
                    return Ok(Terminated::Aborted);
                }
            };
            debug!("Accepted connection from {socket_addr}");
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                if let Err(err) = dispatcher.handle_connection(stream).await {
                    warn!("Request handling error ({socket_addr}): {err}");
                }
            });
        }
    }
}
