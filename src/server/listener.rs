use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::http::connection::{Connection, ConnectionInfo, ConnectionSettings};
use crate::server::dispatcher::Dispatcher;

const ACCEPT_BACKLOG: usize = 128;
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Stops a running [`Server`]. Cloneable and usable from any task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stops accepting at once. Connections in flight get the grace period.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Accepts connections on every configured port and runs each one on its
/// own task.
pub struct Server {
    listeners: Vec<TcpListener>,
    dispatcher: Arc<Dispatcher>,
    settings: ConnectionSettings,
    grace: Duration,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl Server {
    /// Binds `bind_address` on each configured port.
    pub async fn bind(cfg: &Config, dispatcher: Dispatcher) -> anyhow::Result<Self> {
        let mut listeners = Vec::with_capacity(cfg.ports.len());
        for &port in &cfg.ports {
            let listener = TcpListener::bind((cfg.bind_address.as_str(), port))
                .await
                .with_context(|| format!("failed to bind {}:{}", cfg.bind_address, port))?;
            info!(address = %listener.local_addr()?, "Listening");
            listeners.push(listener);
        }

        let (tx, _rx) = watch::channel(false);
        Ok(Self {
            listeners,
            dispatcher: Arc::new(dispatcher),
            settings: ConnectionSettings::from_config(cfg),
            grace: cfg.shutdown_grace(),
            shutdown_tx: Arc::new(tx),
        })
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|l| l.local_addr().ok())
            .collect()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Serves until shut down, then drains connections for the grace period
    /// and aborts whatever is left.
    pub async fn run(self) -> anyhow::Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let (accepted_tx, mut accepted_rx) = mpsc::channel(ACCEPT_BACKLOG);

        let mut acceptors = JoinSet::new();
        for listener in self.listeners {
            acceptors.spawn(accept_loop(listener, accepted_tx.clone()));
        }
        drop(accepted_tx);

        let mut connections = JoinSet::new();
        let mut next_id: u64 = 0;

        loop {
            tokio::select! {
                _ = shutdown_rx.wait_for(|stop| *stop) => break,

                accepted = accepted_rx.recv() => {
                    let Some((stream, peer)) = accepted else {
                        warn!("All listeners stopped");
                        break;
                    };
                    next_id += 1;
                    let info = ConnectionInfo::new(next_id, Some(peer));
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let settings = self.settings;
                    connections.spawn(serve(stream, info, dispatcher, settings));
                }

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "Connection task panicked");
                        }
                    }
                }
            }
        }

        // Dropping the listeners stops accepting immediately
        acceptors.abort_all();
        while acceptors.join_next().await.is_some() {}
        info!(
            in_flight = connections.len(),
            grace_secs = self.grace.as_secs_f64(),
            "Shutting down"
        );

        let drained = tokio::time::timeout(self.grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(aborted = connections.len(), "Grace period over, aborting connections");
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        }

        info!("Server stopped");
        Ok(())
    }
}

async fn accept_loop(listener: TcpListener, accepted: mpsc::Sender<(TcpStream, SocketAddr)>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(peer = %peer, "Accepted connection");
                if accepted.send((stream, peer)).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "Accept failed");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

async fn serve(
    stream: TcpStream,
    info: ConnectionInfo,
    dispatcher: Arc<Dispatcher>,
    settings: ConnectionSettings,
) {
    let id = info.id;
    let peer = info.peer;
    let mut conn = Connection::new(stream, info, dispatcher, settings);
    if let Err(e) = conn.run().await {
        warn!(conn = id, peer = ?peer, error = %e, "Connection error");
    }
}
