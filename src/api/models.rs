use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blockchain::{Block, Ledger};
use crate::peer::PeerClient;

/// Shared application state: the node's ledger handle and its optional peer.
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub peer: Option<PeerClient>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>, peer: Option<PeerClient>) -> Self {
        Self { ledger, peer }
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse {
    pub length: usize,
    pub difficulty: u32,
    pub chain: Vec<Block>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
    pub difficulty: u32,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub height: usize,
    pub hash: String,
    pub nonce: u64,
    pub records: usize,
    pub difficulty: u32,
}

#[derive(Serialize)]
pub struct AppendResponse {
    pub height: usize,
    pub hash: String,
}

#[derive(Serialize)]
pub struct DifficultyResponse {
    pub difficulty: u32,
}

/* ---------- Staging API Models ---------- */

#[derive(Deserialize)]
pub struct StageRequest {
    pub data: String,
}

#[derive(Serialize)]
pub struct StageResponse {
    pub pending: usize,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub height: usize,
    pub difficulty: u32,
    pub pending: usize,
    pub last_interval_secs: Option<i64>,
    pub max_attempts: u64,
    pub time_budget_ms: u128,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
