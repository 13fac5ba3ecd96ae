//! Error kinds for the companion-app protocol.
//!
//! Every failure is local to one connection: the orchestrator branches on
//! the kind, logs the outcome, and the accept loop keeps running.

use std::io;

use thiserror::Error;

/// Protocol and transport errors for a single connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Header is not the expected 8 bytes.
    #[error("invalid frame header: expected 8 bytes, got {0}")]
    InvalidFrame(usize),

    /// Client hello payload failed to parse or lacked the device descriptor.
    #[error("malformed handshake: {0}")]
    MalformedHandshake(String),

    /// Metadata payload failed to parse or lacked fileName/fileSize.
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    /// Stream ended before the handshake or metadata arrived.
    #[error("peer closed the connection")]
    PeerClosed,

    /// Stream ended (or went silent) mid-transfer.
    #[error("transfer interrupted: {0}")]
    TransferInterrupted(String),

    /// Destination file could not be opened or written. Local fault, not a
    /// protocol one.
    #[error("destination unavailable: {0}")]
    SinkUnavailable(#[source] io::Error),

    /// A read or write deadline expired.
    #[error("{0} timeout ({1} ms)")]
    Timeout(&'static str, u64),

    /// Transport fault that is neither a clean closure nor a sink fault.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// True when the peer simply went away rather than misbehaving.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ProtocolError::PeerClosed | ProtocolError::TransferInterrupted(_)
        )
    }
}
