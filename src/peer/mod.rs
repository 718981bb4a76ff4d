pub mod client;
pub mod gateway;
pub mod message;

use std::time::Duration;

pub use client::PeerClient;
pub use gateway::PeerGateway;
pub use message::{Envelope, MessageKind};

use crate::blockchain::LedgerError;

/// Default listen port for inbound peer connections.
pub const DEFAULT_PEER_PORT: u16 = 3000;

/// Default cap on inbound connections handled at the same time.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 64;

/// Inbound envelopes larger than this are dropped.
pub const MAX_ENVELOPE_BYTES: u64 = 1024 * 1024;

/// Dial timeout for outbound messages.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// An inbound connection must deliver its whole envelope within this window.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed envelope: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("envelope exceeds {} bytes", MAX_ENVELOPE_BYTES)]
    TooLarge,

    #[error("timed out connecting to {0}")]
    Timeout(String),

    #[error("no complete envelope within {0:?}")]
    ReadTimeout(Duration),

    #[error("ledger rejected message: {0}")]
    Ledger(#[from] LedgerError),

    #[error("ledger task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
