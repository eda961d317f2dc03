//! Per-connection task
//!
//! Reads text frames with an idle timeout and answers them through the
//! protocol. All outbound traffic, replies and broadcasts alike, goes through
//! a bounded queue drained by a separate writer task. A client that lets the
//! queue fill up is disconnected.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::protocol::Protocol;
use super::registry::{ConnectionRegistry, Outbound, OUTBOUND_CAPACITY};

/// How long the writer may take to flush before it is aborted
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Removes the connection from the registry however the task exits
struct Registration {
    registry: ConnectionRegistry,
    id: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.registry.deregister(&self.id) {
            info!(
                "{} unregistered, {} connection(s) left",
                self.id,
                self.registry.len()
            );
        }
    }
}

/// New connection id for logging
pub fn connection_id() -> String {
    format!("client-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

/// Serve one accepted TCP stream until it closes or idles out
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    protocol: Protocol,
    registry: ConnectionRegistry,
    idle_timeout: Duration,
) -> Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake with {} failed", peer))?;

    let id = connection_id();
    let (outbound, mut rx) = Outbound::channel(OUTBOUND_CAPACITY);
    registry.register(&id, outbound.clone());
    let registration = Registration {
        registry: registry.clone(),
        id: id.clone(),
    };
    info!(
        "{} registered from {}, {} connection(s)",
        id,
        peer,
        registry.len()
    );

    let (mut write, mut read) = ws_stream.split();

    let writer_id = id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = write.send(message).await {
                debug!("{} write failed: {}", writer_id, e);
                break;
            }
        }
        let _ = write.close().await;
    });

    loop {
        let next = tokio::select! {
            next = tokio::time::timeout(idle_timeout, read.next()) => next,
            _ = outbound.evicted() => {
                warn!("{} is not reading its messages, closing", id);
                break;
            }
        };

        let frame = match next {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                warn!("{} transport error: {}", id, e);
                break;
            }
            Ok(None) => {
                debug!("{} stream ended", id);
                break;
            }
            Err(_) => {
                info!("{} idle for {:?}, closing", id, idle_timeout);
                break;
            }
        };

        match frame {
            Message::Text(text) => match protocol.handle(&text) {
                Ok(Some(reply)) => {
                    if !outbound.try_send(Message::Text(reply)) {
                        warn!("{} outbound queue unavailable, closing", id);
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("{} sent a bad message: {}", id, e),
            },
            Message::Close(_) => {
                debug!("{} closed the connection", id);
                break;
            }
            _ => {}
        }
    }

    // Deregister first so the registry lets go of its sender too
    drop(registration);
    drop(outbound);
    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        debug!("{} writer stalled, aborting", id);
        writer.abort();
    }

    Ok(())
}
