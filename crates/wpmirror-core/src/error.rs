//! Error types
//!
//! Typed errors for the two boundaries where things go wrong: fetching pages
//! from the remote feed, and decoding messages from WebSocket clients.
//! Neither kind is fatal. Fetch errors leave the task pending for the next
//! round, protocol errors drop the offending message.

use thiserror::Error;

/// Boxed source error for transport failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while fetching one page of the remote feed
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout, ...
    #[error("Transport error fetching page {page}: {source}")]
    Transport {
        page: u32,
        #[source]
        source: BoxError,
    },

    /// Remote answered with a non-2xx status
    #[error("Remote answered page {page} with HTTP {status}")]
    Response { page: u32, status: u16 },

    /// Body is not a JSON array
    #[error("Malformed JSON in page {page}: {source}")]
    Decode {
        page: u32,
        #[source]
        source: serde_json::Error,
    },

    /// Well-formed response missing a header or an item field
    #[error("Page {page} response is missing {what}")]
    Protocol { page: u32, what: String },
}

impl FetchError {
    /// Create a transport error from any error source
    pub fn transport(page: u32, source: impl Into<BoxError>) -> Self {
        FetchError::Transport {
            page,
            source: source.into(),
        }
    }

    /// Page number of the failed request
    pub fn page(&self) -> u32 {
        match self {
            FetchError::Transport { page, .. }
            | FetchError::Response { page, .. }
            | FetchError::Decode { page, .. }
            | FetchError::Protocol { page, .. } => *page,
        }
    }

    /// Stable label used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport { .. } => "transport",
            FetchError::Response { .. } => "response",
            FetchError::Decode { .. } => "decode",
            FetchError::Protocol { .. } => "protocol",
        }
    }
}

/// Errors handling a client message
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Not valid JSON
    #[error("Malformed client message: {0}")]
    Decode(#[source] serde_json::Error),

    /// Valid JSON that is not a known request
    #[error("Invalid client request: {0}")]
    Request(#[source] serde_json::Error),

    /// A reply or broadcast could not be serialized
    #[error("Failed to encode server message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Result type for page fetches
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_transport_error_keeps_source() {
        let err = FetchError::transport(
            4,
            io::Error::new(io::ErrorKind::TimedOut, "operation timed out"),
        );

        assert_eq!(err.page(), 4);
        assert_eq!(err.kind(), "transport");
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_response_error_display() {
        let err = FetchError::Response {
            page: 2,
            status: 503,
        };

        let msg = err.to_string();
        assert!(msg.contains("page 2"));
        assert!(msg.contains("503"));
        assert_eq!(err.kind(), "response");
    }

    #[test]
    fn test_protocol_error_display() {
        let err = FetchError::Protocol {
            page: 1,
            what: "header X-WP-Total".to_string(),
        };

        assert!(err.to_string().contains("X-WP-Total"));
        assert_eq!(err.kind(), "protocol");
    }

    #[test]
    fn test_encode_error_display() {
        let mut bad = std::collections::BTreeMap::new();
        bad.insert(vec![1u8], 1u8);
        let source = serde_json::to_string(&bad).unwrap_err();

        let err = ProtocolError::Encode(source);
        assert!(err.to_string().starts_with("Failed to encode server message"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_client_decode_error() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = ProtocolError::Decode(source);
        assert!(err.to_string().starts_with("Malformed client message"));
    }
}
