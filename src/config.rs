use std::time::Duration;

use clap::Parser;

use crate::blockchain::{DEFAULT_DIFFICULTY, MAX_NONCE_ATTEMPTS, MiningLimits};
use crate::peer::{DEFAULT_MAX_CONNECTIONS, DEFAULT_PEER_PORT, READ_TIMEOUT};

/// Process-start parameters. Every flag falls back to an environment
/// variable, which may come from a `.env` file.
#[derive(Debug, Clone, Parser)]
#[command(name = "pow_ledger", version, about = "Proof-of-work ledger node")]
pub struct NodeConfig {
    /// Address the peer listener and HTTP API bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on for peer envelopes
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PEER_PORT)]
    pub port: u16,

    /// Address of the peer to greet at startup and relay mined blocks to
    #[arg(long = "connect", env = "PEER")]
    pub peer: Option<String>,

    /// Serve the HTTP inspection API on this port
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Leading zero bits required of every block hash
    #[arg(long, env = "DIFFICULTY", default_value_t = DEFAULT_DIFFICULTY,
          value_parser = clap::value_parser!(u32).range(0..=256))]
    pub difficulty: u32,

    /// Inbound peer connections handled at the same time
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub max_connections: u32,

    /// Nonce attempts before a search gives up
    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = MAX_NONCE_ATTEMPTS,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub max_attempts: u64,

    /// Wall-clock budget for one nonce search, in milliseconds
    #[arg(long, env = "MINE_TIMEOUT_MS", default_value_t = 1000)]
    pub mine_timeout_ms: u64,

    /// How long an inbound peer may take to send its envelope, in milliseconds
    #[arg(long, env = "READ_TIMEOUT_MS", default_value_t = READ_TIMEOUT.as_millis() as u64,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout_ms: u64,
}

impl NodeConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn mining_limits(&self) -> MiningLimits {
        MiningLimits {
            max_attempts: self.max_attempts,
            time_budget: Duration::from_millis(self.mine_timeout_ms),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
