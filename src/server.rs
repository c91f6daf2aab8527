use std::future::Future;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::codec::FrameCodec;
use crate::config::Config;
use crate::connection::Connection;
use crate::coordinator::{Coordinator, CoordinatorHandle};
use crate::handler::handle_connection;
use crate::store::Store;
use crate::Error;

pub struct Server {
    listener: TcpListener,
    config: Config,
}

impl Server {
    /// Binds the listener. A bind failure is fatal and returned to the caller.
    pub async fn bind(config: Config) -> Result<Server, Error> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        Ok(Server { listener, config })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves, then lets the coordinator drain the events
    /// already queued and waits for it to stop.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let Server { listener, config } = self;

        let store = match config.max_keys {
            Some(max_keys) => Store::with_max_keys(max_keys),
            None => Store::new(),
        };
        let (coordinator, handle) = Coordinator::new(store, config.channel_capacity);
        let (stop_coordinator, coordinator_stopped) = oneshot::channel::<()>();
        let coordinator = tokio::spawn(coordinator.run_until(async move {
            let _ = coordinator_stopped.await;
        }));

        info!("Server listening on {}", listener.local_addr()?);

        tokio::pin!(shutdown);
        loop {
            select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &handle, &config);
                }
            }
        }

        let _ = stop_coordinator.send(());
        let coordinator = coordinator.await?;
        info!(
            keys = coordinator.store().len(),
            sessions = coordinator.session_count(),
            "Server stopped"
        );

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<(), Error> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

/// Binds to the configured address and serves until ctrl-c.
pub async fn run(config: Config) -> Result<(), Error> {
    Server::bind(config).await?.run_until_ctrl_c().await
}

fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    coordinator: &CoordinatorHandle,
    config: &Config,
) {
    match result {
        Ok((socket, client_address)) => {
            info!("Accepted connection from {:?}", client_address);
            spawn_connection_handler(socket, coordinator, config);
        }
        // Per-connection failures such as running out of file descriptors are transient.
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(socket: TcpStream, coordinator: &CoordinatorHandle, config: &Config) {
    let coordinator = coordinator.clone();
    let codec = FrameCodec::new(config.max_frame_size);

    tokio::spawn(async move {
        let conn = match Connection::with_codec(socket, codec) {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Dropping connection: {}", e);
                return;
            }
        };

        if let Err(e) = handle_connection(conn, coordinator).await {
            error!("Connection error: {}", e);
        }
    });
}
