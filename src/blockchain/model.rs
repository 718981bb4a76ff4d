use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use super::error::{LedgerError, LedgerResult};
use super::pow::{MiningLimits, ProofOfWork, seal_block};
use super::{Block, MAX_DIFFICULTY, PowError};

#[derive(Debug)]
struct LedgerState {
    blocks: Vec<Block>,
    pending: Vec<String>,
}

impl LedgerState {
    fn tip(&self) -> &Block {
        // genesis is pushed at construction and blocks are never removed
        &self.blocks[self.blocks.len() - 1]
    }
}

/// In-memory, append-only ledger sealed with Proof-of-Work.
///
/// Two locks: `state` guards blocks and pending records and is only held for short
/// sections; `tip` serializes every operation that extends the chain, so the slow
/// nonce search runs without blocking `stage`.
#[derive(Debug)]
pub struct Ledger {
    state: Mutex<LedgerState>,
    tip: Mutex<()>,
    difficulty: u32,
    limits: MiningLimits,
}

impl Ledger {
    /// Initialize a ledger with a freshly mined genesis block.
    pub fn new(difficulty: u32) -> LedgerResult<Self> {
        Self::with_limits(difficulty, MiningLimits::default())
    }

    pub fn with_limits(difficulty: u32, limits: MiningLimits) -> LedgerResult<Self> {
        if difficulty > MAX_DIFFICULTY {
            return Err(PowError::DifficultyOutOfRange(difficulty).into());
        }
        let genesis = seal_block(Block::genesis(), difficulty, &limits)?;
        info!(
            "LEDGER - genesis sealed (hash={}, nonce={}, difficulty={})",
            genesis.hash, genesis.nonce, difficulty
        );

        Ok(Self {
            state: Mutex::new(LedgerState {
                blocks: vec![genesis],
                pending: Vec::new(),
            }),
            tip: Mutex::new(()),
            difficulty,
            limits,
        })
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tip(&self) -> MutexGuard<'_, ()> {
        self.tip.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer a record for the next mined block. Returns the pending count.
    pub fn stage(&self, record: impl Into<String>) -> usize {
        let mut state = self.state();
        state.pending.push(record.into());
        state.pending.len()
    }

    /// Mine all pending records into a new block, even when there are none.
    ///
    /// The pending buffer is taken atomically. If the search gives up, the taken
    /// records go back to the front of the buffer and the error is returned.
    pub fn mine(&self) -> LedgerResult<Block> {
        let _tip = self.lock_tip();
        let records = std::mem::take(&mut self.state().pending);

        self.seal_on_tip(records).map_err(|(err, mut records)| {
            warn!(
                "LEDGER - mining failed, re-queueing {} records: {}",
                records.len(),
                err
            );
            let mut state = self.state();
            records.append(&mut state.pending);
            state.pending = records;
            err
        })
    }

    /// Mine `records` into a new block right away, bypassing the pending buffer.
    pub fn commit(&self, records: Vec<String>) -> LedgerResult<Block> {
        let _tip = self.lock_tip();
        self.seal_on_tip(records).map_err(|(err, _)| err)
    }

    /// Caller must hold the tip lock.
    fn seal_on_tip(&self, records: Vec<String>) -> Result<Block, (LedgerError, Vec<String>)> {
        let prev_hash = self.state().tip().hash.clone();
        let mut block = Block::new(records, prev_hash);

        let found =
            ProofOfWork::new(&block, self.difficulty).and_then(|pow| pow.run(&self.limits));
        match found {
            Ok((nonce, digest)) => block.seal(nonce, digest),
            Err(err) => return Err((err.into(), block.records)),
        }

        let mut state = self.state();
        state.blocks.push(block.clone());
        info!(
            "LEDGER - sealed block #{} (records={}, hash={}, nonce={})",
            state.blocks.len() - 1,
            block.records.len(),
            block.hash,
            block.nonce
        );
        Ok(block)
    }

    /// Append an externally sealed block after checking continuity and its seal.
    /// On rejection the chain is left untouched.
    pub fn append(&self, block: Block) -> LedgerResult<()> {
        let _tip = self.lock_tip();

        let expected = self.state().tip().hash.clone();
        if block.prev_hash != expected {
            return Err(LedgerError::Discontinuous {
                expected,
                actual: block.prev_hash,
            });
        }
        if !self.seal_is_valid(&block)? {
            return Err(LedgerError::InvalidSeal {
                nonce: block.nonce,
                hash: block.hash,
            });
        }

        let mut state = self.state();
        info!(
            "LEDGER - appended block #{} (hash={})",
            state.blocks.len(),
            block.hash
        );
        state.blocks.push(block);
        Ok(())
    }

    fn seal_is_valid(&self, block: &Block) -> LedgerResult<bool> {
        if block.hash != block.compute_hash() {
            return Ok(false);
        }
        Ok(ProofOfWork::new(block, self.difficulty)?.validate())
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> Block {
        self.state().tip().clone()
    }

    /// Snapshot of the whole chain.
    pub fn blocks(&self) -> Vec<Block> {
        self.state().blocks.clone()
    }

    pub fn pending(&self) -> Vec<String> {
        self.state().pending.clone()
    }

    /// Validate the entire chain: genesis, linkage, hashes and PoW.
    pub fn is_valid_chain(&self) -> bool {
        let state = self.state();

        let genesis = &state.blocks[0];
        if !genesis.is_genesis() || !self.seal_is_valid(genesis).unwrap_or(false) {
            return false;
        }

        state.blocks.windows(2).all(|pair| {
            pair[1].prev_hash == pair[0].hash && self.seal_is_valid(&pair[1]).unwrap_or(false)
        })
    }

    pub fn len(&self) -> usize {
        self.state().blocks.len()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn limits(&self) -> MiningLimits {
        self.limits
    }

    #[cfg(test)]
    pub(crate) fn set_limits(&mut self, limits: MiningLimits) {
        self.limits = limits;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use num_bigint::BigUint;

    use super::*;

    fn ledger(difficulty: u32) -> Ledger {
        Ledger::new(difficulty).expect("genesis")
    }

    #[test]
    fn genesis_is_valid() {
        let l = ledger(8);
        let g = l.last_block();
        assert_eq!(l.len(), 1);
        assert!(g.prev_hash.is_empty());
        assert!(ProofOfWork::new(&g, 8).unwrap().validate());
        assert!(l.is_valid_chain());
    }

    #[test]
    fn out_of_range_difficulty_is_rejected() {
        let err = Ledger::new(300).unwrap_err();
        assert_eq!(err, LedgerError::Pow(PowError::DifficultyOutOfRange(300)));
    }

    #[test]
    fn stage_then_mine_hello_world() {
        let l = ledger(4);
        let genesis = l.last_block();
        l.stage("hello");
        l.stage("world");

        let b = l.mine().unwrap();
        assert_eq!(b.records, vec!["hello".to_string(), "world".to_string()]);
        assert_eq!(b.prev_hash, genesis.hash);
        let as_int = BigUint::from_bytes_be(&hex::decode(&b.hash).unwrap());
        assert!(as_int < (BigUint::from(1u8) << 252u32));
        assert!(l.pending().is_empty());
        assert_eq!(l.last_block(), b);
    }

    #[test]
    fn mining_with_nothing_pending_yields_empty_block() {
        let l = ledger(4);
        let b = l.mine().unwrap();
        assert!(b.records.is_empty());
        assert_eq!(b.prev_hash, l.blocks()[0].hash);
        assert!(ProofOfWork::new(&b, 4).unwrap().validate());
    }

    #[test]
    fn chain_stays_linked() {
        let l = ledger(6);
        for i in 0..5 {
            l.stage(format!("r{i}"));
            l.mine().unwrap();
        }
        let blocks = l.blocks();
        assert_eq!(blocks.len(), 6);
        for i in 1..blocks.len() {
            assert_eq!(blocks[i].prev_hash, blocks[i - 1].hash);
        }
        assert!(l.is_valid_chain());
    }

    #[test]
    fn commit_skips_pending_buffer() {
        let l = ledger(4);
        l.stage("waiting");
        let b = l.commit(vec!["X".into()]).unwrap();
        assert_eq!(b.records, vec!["X".to_string()]);
        assert_eq!(l.pending(), vec!["waiting".to_string()]);
    }

    #[test]
    fn concurrent_staging_loses_nothing() {
        let l = Arc::new(ledger(4));
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let l = Arc::clone(&l);
                thread::spawn(move || {
                    l.stage(format!("rec-{i}"));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let b = l.mine().unwrap();
        let got: HashSet<_> = b.records.iter().cloned().collect();
        let want: HashSet<_> = (0..32).map(|i| format!("rec-{i}")).collect();
        assert_eq!(b.records.len(), 32);
        assert_eq!(got, want);
        assert!(l.pending().is_empty());
    }

    #[test]
    fn concurrent_mines_never_fork_or_duplicate() {
        let l = Arc::new(ledger(6));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let l = Arc::clone(&l);
                thread::spawn(move || {
                    for j in 0..4 {
                        l.stage(format!("t{i}-{j}"));
                    }
                    l.mine().unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let blocks = l.blocks();
        assert_eq!(blocks.len(), 9);
        let prevs: HashSet<_> = blocks.iter().map(|b| b.prev_hash.clone()).collect();
        assert_eq!(prevs.len(), blocks.len());

        let all: Vec<_> = blocks[1..].iter().flat_map(|b| b.records.clone()).collect();
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 32);
        assert_eq!(unique.len(), 32);
        assert!(l.is_valid_chain());
    }

    #[test]
    fn failed_mine_requeues_pending_and_keeps_chain() {
        let mut l = ledger(4);
        l.set_limits(MiningLimits {
            max_attempts: 1,
            time_budget: Duration::ZERO,
        });
        l.stage("a");
        l.stage("b");

        let err = l.mine().unwrap_err();
        assert!(matches!(err, LedgerError::Pow(PowError::TimedOut { .. })));
        assert_eq!(l.len(), 1);

        l.stage("c");
        assert_eq!(l.pending(), vec!["a", "b", "c"]);
    }

    #[test]
    fn append_rejects_discontinuous_block() {
        let l = ledger(4);
        let orphan = seal_block(
            Block::new(vec!["x".into()], "not-the-tip".into()),
            4,
            &MiningLimits::default(),
        )
        .unwrap();

        let err = l.append(orphan).unwrap_err();
        assert!(matches!(err, LedgerError::Discontinuous { .. }));
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn append_rejects_forged_seal() {
        let l = ledger(8);
        let mut forged = Block::new(vec!["x".into()], l.last_block().hash);
        forged.nonce = 0;
        forged.hash = "00".repeat(32);

        let err = l.append(forged).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidSeal { .. }));
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn append_accepts_block_mined_by_another_node() {
        // genesis hashes match because the timestamp is not hashed
        let a = ledger(6);
        let b = ledger(6);
        assert_eq!(a.last_block().hash, b.last_block().hash);

        a.stage("shared");
        let mined = a.mine().unwrap();
        b.append(mined.clone()).unwrap();

        assert_eq!(b.last_block(), mined);
        assert!(b.is_valid_chain());
    }
}
