//! TCP transport: dialing out and a graceful accept loop that hands
//! inbound connections to the session manager.

use crate::error::Result;
use crate::netron::Netron;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{error, info, instrument};

/// Dial a remote endpoint.
#[instrument]
pub async fn connect(addr: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Listen on `addr`, accepting peers into `netron` until CTRL+C.
#[instrument(skip(netron))]
pub async fn serve(netron: Arc<Netron>, addr: &str) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    serve_with_shutdown(netron, addr, shutdown_rx).await
}

/// Listen on `addr` with an external shutdown channel.
///
/// Each accepted connection becomes a peer session keyed by its socket
/// address. On shutdown every active session is torn down before the
/// listener is dropped.
#[instrument(skip(netron, shutdown_rx))]
pub async fn serve_with_shutdown(
    netron: Arc<Netron>,
    addr: &str,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, "Listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down listener, closing sessions");
                netron.shutdown();
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            error!(peer = %peer_addr, error = %e, "Failed to set nodelay");
                        }
                        info!(peer = %peer_addr, "New connection established");
                        netron.accept_peer(peer_addr.to_string(), stream);
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}
