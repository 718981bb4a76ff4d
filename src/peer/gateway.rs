use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;
use tokio::time::timeout;

use super::{Envelope, MAX_ENVELOPE_BYTES, MessageKind, PeerError, READ_TIMEOUT};
use crate::blockchain::{Block, Ledger};

/// Inbound side: accepts connections and applies their envelopes to the ledger.
/// At most `max_connections` connections are handled at once; further accepts wait.
/// A connection that has not sent its envelope within `read_timeout` is dropped
/// and its slot released.
pub struct PeerGateway {
    listener: TcpListener,
    ledger: Arc<Ledger>,
    permits: Arc<Semaphore>,
    read_timeout: Duration,
}

impl PeerGateway {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        ledger: Arc<Ledger>,
        max_connections: usize,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            ledger,
            permits: Arc::new(Semaphore::new(max_connections.max(1))),
            read_timeout: READ_TIMEOUT,
        })
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn serve(self) {
        if let Ok(addr) = self.local_addr() {
            info!("PEER - listening for peers on {}", addr);
        }

        loop {
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                break;
            };

            let (stream, remote) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("PEER - unable to accept connection: {}", e);
                    continue;
                }
            };

            let ledger = Arc::clone(&self.ledger);
            let read_timeout = self.read_timeout;
            tokio::spawn(async move {
                let _permit = permit;
                debug!("PEER - connected to {}", remote);
                if let Err(e) = handle_connection(stream, &ledger, read_timeout).await {
                    warn!("PEER - dropping connection from {}: {}", remote, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    ledger: &Arc<Ledger>,
    read_timeout: Duration,
) -> Result<(), PeerError> {
    let mut request = Vec::new();
    let mut reader = stream.take(MAX_ENVELOPE_BYTES + 1);
    timeout(read_timeout, reader.read_to_end(&mut request))
        .await
        .map_err(|_| PeerError::ReadTimeout(read_timeout))??;
    if request.len() as u64 > MAX_ENVELOPE_BYTES {
        return Err(PeerError::TooLarge);
    }

    let envelope = Envelope::decode(&request)?;
    dispatch(ledger, envelope).await
}

/// Apply one inbound envelope. Mining and validation run on the blocking pool.
pub async fn dispatch(ledger: &Arc<Ledger>, envelope: Envelope) -> Result<(), PeerError> {
    let Envelope { kind, payload } = envelope;

    match kind {
        MessageKind::AddBlock => {
            let l = Arc::clone(ledger);
            let block = spawn_blocking(move || l.commit(vec![payload])).await??;
            info!("PEER - added block with data: {:?}", block.records);
        }
        MessageKind::AddData => {
            let pending = ledger.stage(payload);
            debug!("PEER - staged record ({} pending)", pending);
        }
        MessageKind::MineBlock => {
            let l = Arc::clone(ledger);
            let block = spawn_blocking(move || l.mine()).await??;
            info!("PEER - mined block {} on request", block.hash);
        }
        MessageKind::SealedBlock => {
            let block: Block = serde_json::from_str(&payload)?;
            let l = Arc::clone(ledger);
            spawn_blocking(move || l.append(block)).await??;
        }
        MessageKind::NewPeer => {
            info!("PEER - greeting: {}", payload);
        }
        MessageKind::Unknown(other) => {
            warn!("PEER - unknown message type received: {}", other);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::peer::client::send_message;

    async fn start(ledger: Arc<Ledger>, max_connections: usize) -> String {
        let gateway = PeerGateway::bind("127.0.0.1:0", ledger, max_connections)
            .await
            .unwrap();
        spawn_gateway(gateway)
    }

    fn spawn_gateway(gateway: PeerGateway) -> String {
        let addr = gateway.local_addr().unwrap().to_string();
        tokio::spawn(gateway.serve());
        addr
    }

    async fn wait_for(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn add_block_envelope_mines_single_record_block() {
        let ledger = Arc::new(Ledger::new(4).unwrap());
        let addr = start(Arc::clone(&ledger), 8).await;

        send_message(&addr, &Envelope::new(MessageKind::AddBlock, "X"))
            .await
            .unwrap();
        wait_for(|| ledger.len() == 2).await;

        let tip = ledger.last_block();
        assert_eq!(tip.records, vec!["X".to_string()]);
        assert_eq!(tip.prev_hash, ledger.blocks()[0].hash);
    }

    #[tokio::test]
    async fn add_data_then_mine_block() {
        let ledger = Arc::new(Ledger::new(4).unwrap());
        let addr = start(Arc::clone(&ledger), 8).await;

        send_message(&addr, &Envelope::new(MessageKind::AddData, "a"))
            .await
            .unwrap();
        wait_for(|| ledger.pending().len() == 1).await;
        send_message(&addr, &Envelope::new(MessageKind::MineBlock, ""))
            .await
            .unwrap();
        wait_for(|| ledger.len() == 2).await;

        assert_eq!(ledger.last_block().records, vec!["a".to_string()]);
        assert!(ledger.pending().is_empty());
    }

    #[tokio::test]
    async fn malformed_envelope_does_not_stop_the_listener() {
        let ledger = Arc::new(Ledger::new(4).unwrap());
        let addr = start(Arc::clone(&ledger), 8).await;

        let mut raw = TcpStream::connect(&addr).await.unwrap();
        raw.write_all(b"{ not json").await.unwrap();
        raw.shutdown().await.unwrap();
        drop(raw);

        send_message(&addr, &Envelope::new(MessageKind::AddData, "still-alive"))
            .await
            .unwrap();
        wait_for(|| ledger.pending() == vec!["still-alive".to_string()]).await;
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn connection_cap_holds_back_extra_connections() {
        let ledger = Arc::new(Ledger::new(4).unwrap());
        let addr = start(Arc::clone(&ledger), 1).await;

        // occupies the only permit until closed
        let mut idle = TcpStream::connect(&addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let sender = {
            let addr = addr.clone();
            tokio::spawn(async move {
                send_message(&addr, &Envelope::new(MessageKind::AddData, "queued")).await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(ledger.pending().is_empty());

        idle.shutdown().await.unwrap();
        drop(idle);
        sender.await.unwrap().unwrap();
        wait_for(|| ledger.pending() == vec!["queued".to_string()]).await;
    }

    #[tokio::test]
    async fn idle_connection_is_dropped_after_read_timeout() {
        let ledger = Arc::new(Ledger::new(4).unwrap());
        let gateway = PeerGateway::bind("127.0.0.1:0", Arc::clone(&ledger), 1)
            .await
            .unwrap()
            .with_read_timeout(Duration::from_millis(200));
        let addr = spawn_gateway(gateway);

        // never sends EOF; kept open for the whole test
        let _idle = TcpStream::connect(&addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        send_message(&addr, &Envelope::new(MessageKind::AddData, "honest"))
            .await
            .unwrap();
        wait_for(|| ledger.pending() == vec!["honest".to_string()]).await;
    }

    #[tokio::test]
    async fn sealed_block_is_validated_before_append() {
        let source = Ledger::new(4).unwrap();
        source.stage("relayed");
        let good = source.mine().unwrap();

        let ledger = Arc::new(Ledger::new(4).unwrap());

        let mut tampered = good.clone();
        tampered.records = vec!["forged".into()];
        let err = dispatch(&ledger, Envelope::sealed_block(&tampered).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PeerError::Ledger(_)));
        assert_eq!(ledger.len(), 1);

        dispatch(&ledger, Envelope::sealed_block(&good).unwrap())
            .await
            .unwrap();
        assert_eq!(ledger.last_block(), good);
    }

    #[tokio::test]
    async fn unknown_and_greeting_messages_leave_ledger_alone() {
        let ledger = Arc::new(Ledger::new(4).unwrap());
        dispatch(
            &ledger,
            Envelope::new(MessageKind::Unknown("Gossip".into()), "x"),
        )
        .await
        .unwrap();
        dispatch(&ledger, Envelope::new(MessageKind::NewPeer, "Hi"))
            .await
            .unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.pending().is_empty());
    }
}
