use log::{info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::time::timeout;

use super::{CONNECT_TIMEOUT, Envelope, PeerError};
use crate::blockchain::Block;

/// Connect to `address`, write one envelope, close. No response is read.
pub async fn send_message(address: &str, envelope: &Envelope) -> Result<(), PeerError> {
    let bytes = envelope.encode()?;

    let mut stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
        .await
        .map_err(|_| PeerError::Timeout(address.to_string()))??;
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;

    info!("PEER - message {:?} sent to {}", envelope.kind, address);
    Ok(())
}

/// Outbound side of the gateway for the single configured peer.
#[derive(Debug, Clone)]
pub struct PeerClient {
    address: String,
    runtime: Handle,
}

impl PeerClient {
    pub fn new(address: impl Into<String>, runtime: Handle) -> Self {
        Self {
            address: address.into(),
            runtime,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn send(&self, envelope: &Envelope) -> Result<(), PeerError> {
        send_message(&self.address, envelope).await
    }

    /// Fire-and-forget send; callable from non-async threads.
    pub fn relay(&self, envelope: Envelope) {
        let client = self.clone();
        self.runtime.spawn(async move {
            if let Err(e) = client.send(&envelope).await {
                warn!("PEER - error sending to {}: {}", client.address, e);
            }
        });
    }

    pub fn relay_block(&self, block: &Block) {
        match Envelope::sealed_block(block) {
            Ok(envelope) => self.relay(envelope),
            Err(e) => warn!("PEER - cannot encode block {}: {}", block.hash, e),
        }
    }
}
