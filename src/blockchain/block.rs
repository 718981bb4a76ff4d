use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::GENESIS_DATA;

/// A single block in the ledger holding an ordered list of text records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: i64, // Unix timestamp (UTC), informational only
    pub records: Vec<String>,
    pub prev_hash: String, // empty for genesis
    pub hash: String,      // hex SHA-256, set when sealed
    pub nonce: u64,        // Proof-of-Work nonce
}

impl Block {
    /// Create a new, unsealed block. Run it through `ProofOfWork` to seal it.
    pub fn new(records: Vec<String>, prev_hash: String) -> Self {
        Self {
            timestamp: Utc::now().timestamp(),
            records,
            prev_hash,
            hash: String::new(),
            nonce: 0,
        }
    }

    /// Unsealed genesis block: the fixed marker record and no predecessor.
    pub fn genesis() -> Self {
        Self::new(vec![GENESIS_DATA.to_string()], String::new())
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_empty()
    }

    /// Bytes hashed for a candidate nonce:
    /// `prev_hash ++ records... ++ lowercase_hex(nonce)`.
    /// The timestamp is not part of the preimage.
    pub fn preimage(&self, nonce: u64) -> Vec<u8> {
        let records_len: usize = self.records.iter().map(String::len).sum();
        let mut data = Vec::with_capacity(self.prev_hash.len() + records_len + 16);
        data.extend_from_slice(self.prev_hash.as_bytes());
        for record in &self.records {
            data.extend_from_slice(record.as_bytes());
        }
        data.extend_from_slice(format!("{nonce:x}").as_bytes());
        data
    }

    pub fn digest(&self, nonce: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.preimage(nonce));
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        out
    }

    /// Hex digest for the block's stored nonce (excluding the `hash` field itself).
    pub fn compute_hash(&self) -> String {
        hex::encode(self.digest(self.nonce))
    }

    /// Install a seal found by the nonce search.
    pub(crate) fn seal(&mut self, nonce: u64, digest: [u8; 32]) {
        self.nonce = nonce;
        self.hash = hex::encode(digest);
    }
}
