//! Request handling and broadcast construction
//!
//! Pure functions of the store: answering a client request only reads it,
//! building a broadcast flushes its change ledger.

use tracing::debug;

use super::message::{encode_broadcast, ClientRequest, ServerReply};
use crate::error::ProtocolError;
use crate::store::{ChangeLedger, PostStore};

/// Answers client requests from the shared store
#[derive(Debug, Clone)]
pub struct Protocol {
    store: PostStore,
}

impl Protocol {
    pub fn new(store: PostStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PostStore {
        &self.store
    }

    /// Handle one text frame, returning the reply to send back (if any)
    pub fn handle(&self, text: &str) -> Result<Option<String>, ProtocolError> {
        let request = ClientRequest::decode(text)?;
        self.respond(request).map(|reply| reply.encode()).transpose()
    }

    /// Answer a decoded request
    pub fn respond(&self, request: ClientRequest) -> Option<ServerReply> {
        match request {
            ClientRequest::Ack => None,
            ClientRequest::IdList => {
                let ids = self.store.all_ids().into_iter().collect();
                Some(ServerReply::IdList(ids))
            }
            ClientRequest::Post { id } => {
                let key = id.into_key();
                let post = self.store.get(&key);
                if post.is_none() {
                    debug!("Client asked for unknown post {}", key);
                }
                Some(ServerReply::Post(post))
            }
        }
    }

    /// Flush the ledger, stamped with `clients` live connections
    pub fn flush(&self, clients: usize) -> ChangeLedger {
        self.store.flush_ledger(clients)
    }

    /// Flush the ledger into broadcast text for `clients` live connections
    pub fn broadcast_message(&self, clients: usize) -> Result<String, ProtocolError> {
        encode_broadcast(&self.flush(clients))
    }
}
