//! WebSocket server
//!
//! Clients connect over WebSocket and exchange one JSON object per text
//! frame. They pull ids and posts on demand; after every sync round the
//! server pushes the accumulated changes to all of them.
//!
//! ## Protocol
//!
//! | Client sends                  | Server answers                     |
//! |-------------------------------|------------------------------------|
//! | `{"req": "id_list"}`          | `{"ack": "id_list", "obj": [ids]}` |
//! | `{"req": "post", "id": "7"}`  | `{"ack": "post", "obj": post/null}`|
//! | `{"req": "ack"}`              | nothing                            |
//!
//! Broadcast: `{"new": [...], "deleted": [...], "modified": [...], "clients": n}`

mod connection;
mod message;
mod protocol;
mod registry;

pub use connection::{connection_id, handle_connection};
pub use message::{decode_broadcast, encode_broadcast, ClientRequest, ServerReply};
pub use protocol::Protocol;
pub use registry::{ConnectionRegistry, Outbound};

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::store::{ChangeLedger, PostStore};

/// Pushes ledger flushes to every live connection
///
/// Cheap to clone; used by the sync loop while the server runs elsewhere.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    protocol: Protocol,
    registry: ConnectionRegistry,
}

impl Broadcaster {
    /// Flush the ledger and queue the broadcast on every connection
    ///
    /// Runs even when nothing changed, so clients see the live count.
    pub fn broadcast_changes(&self) -> ChangeLedger {
        let clients = self.registry.len();
        let ledger = self.protocol.flush(clients);
        let reached = match encode_broadcast(&ledger) {
            Ok(message) => self.registry.broadcast(&message),
            Err(e) => {
                warn!("Dropping broadcast: {}", e);
                0
            }
        };
        if !ledger.is_empty() {
            debug!(
                "Broadcast {} new, {} modified, {} deleted to {} client(s)",
                ledger.new.len(),
                ledger.modified.len(),
                ledger.deleted.len(),
                reached
            );
        }
        ledger
    }

    /// Live connection count
    pub fn clients(&self) -> usize {
        self.registry.len()
    }
}

/// Bound WebSocket listener
pub struct Server {
    listener: TcpListener,
    protocol: Protocol,
    registry: ConnectionRegistry,
    idle_timeout: Duration,
}

impl Server {
    /// Bind to the configured address
    pub async fn bind(config: &Config, store: PostStore) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

        Ok(Self {
            listener,
            protocol: Protocol::new(store),
            registry: ConnectionRegistry::new(),
            idle_timeout: config.client_idle_timeout(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Listener has no local address")
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn broadcaster(&self) -> Broadcaster {
        Broadcaster {
            protocol: self.protocol.clone(),
            registry: self.registry.clone(),
        }
    }

    /// Accept connections until the task is dropped
    pub async fn serve(self) -> Result<()> {
        info!("Listening on ws://{}", self.local_addr()?);

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    continue;
                }
            };

            let protocol = self.protocol.clone();
            let registry = self.registry.clone();
            let idle_timeout = self.idle_timeout;
            tokio::spawn(async move {
                if let Err(e) =
                    handle_connection(stream, peer, protocol, registry, idle_timeout).await
                {
                    warn!("Connection from {} failed: {:#}", peer, e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Post;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn test_config(idle_secs: u64) -> Config {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            client_idle_timeout_secs: idle_secs,
            ..Config::default()
        }
    }

    fn post(id: &str) -> Post {
        Post::new(id, "Title", "2024-01-01T10:00:00", "2024-01-01T10:00:00", vec![])
    }

    async fn start(
        store: PostStore,
        idle_secs: u64,
    ) -> (SocketAddr, Broadcaster, ConnectionRegistry) {
        let server = Server::bind(&test_config(idle_secs), store).await.unwrap();
        let addr = server.local_addr().unwrap();
        let broadcaster = server.broadcaster();
        let registry = server.registry().clone();
        tokio::spawn(server.serve());
        (addr, broadcaster, registry)
    }

    async fn connect(addr: SocketAddr, registry: &ConnectionRegistry, expected: usize) -> Client {
        let (client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        wait_for(|| registry.len() == expected).await;
        client
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    async fn next_json(client: &mut Client) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    async fn send(client: &mut Client, value: Value) {
        client.send(Message::Text(value.to_string())).await.unwrap();
    }

    #[tokio::test]
    async fn test_pull_requests() {
        let store = PostStore::new();
        store.upsert(post("1"));
        store.upsert(post("2"));
        let (addr, _, registry) = start(store, 60).await;
        let mut client = connect(addr, &registry, 1).await;

        send(&mut client, json!({"req": "id_list"})).await;
        let reply = next_json(&mut client).await;
        assert_eq!(reply["ack"], "id_list");
        assert_eq!(reply["obj"].as_array().unwrap().len(), 2);

        send(&mut client, json!({"req": "post", "id": "2"})).await;
        let reply = next_json(&mut client).await;
        assert_eq!(reply["obj"]["id"], "2");

        send(&mut client, json!({"req": "post", "id": "99"})).await;
        let reply = next_json(&mut client).await;
        assert_eq!(reply, json!({"ack": "post", "obj": null}));
    }

    #[tokio::test]
    async fn test_bad_message_keeps_connection_open() {
        let store = PostStore::new();
        store.upsert(post("5"));
        let (addr, _, registry) = start(store, 60).await;
        let mut client = connect(addr, &registry, 1).await;

        client
            .send(Message::Text("{definitely not json".to_string()))
            .await
            .unwrap();
        send(&mut client, json!({"req": "unsubscribe"})).await;
        send(&mut client, json!({"req": "ack"})).await;
        send(&mut client, json!({"req": "id_list"})).await;

        // The only reply is the one for id_list
        let reply = next_json(&mut client).await;
        assert_eq!(reply, json!({"ack": "id_list", "obj": ["5"]}));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_clients() {
        let store = PostStore::new();
        let (addr, broadcaster, registry) = start(store.clone(), 60).await;
        let mut first = connect(addr, &registry, 1).await;
        let mut second = connect(addr, &registry, 2).await;

        store.upsert(post("1"));
        store.upsert(post("1"));
        let ledger = broadcaster.broadcast_changes();
        assert_eq!(ledger.clients, 2);

        for client in [&mut first, &mut second] {
            let message = next_json(client).await;
            assert_eq!(
                message,
                json!({"new": ["1"], "deleted": [], "modified": ["1"], "clients": 2})
            );
        }

        // Ledger was flushed
        let ledger = broadcaster.broadcast_changes();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_deregisters() {
        let (addr, broadcaster, registry) = start(PostStore::new(), 60).await;
        let mut client = connect(addr, &registry, 1).await;

        client.close(None).await.unwrap();
        wait_for(|| registry.is_empty()).await;

        assert_eq!(broadcaster.broadcast_changes().clients, 0);
    }

    #[tokio::test]
    async fn test_idle_timeout_closes_connection() {
        let (addr, _, registry) = start(PostStore::new(), 1).await;
        let mut client = connect(addr, &registry, 1).await;

        wait_for(|| registry.is_empty()).await;

        // Server side closed the transport
        let end = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match client.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(end.is_ok());
    }
}
