//! In-memory chains for tests
//!
//! `MockSourceChain` mines every approval and lock into its own block next
//! to a few filler transactions, with a correct `receiptsRoot`, so the proof
//! pipeline can run against it unchanged.

use super::*;
use crate::eth::abi::{self, LOCKED_EVENT};
use crate::eth::{Bytes, Quantity};
use crate::rlp;
use crate::trie::PatriciaTrie;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// What happens to a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    /// Mined successfully in a fresh block
    Success,
    /// Mined with status 0; `get_revert_reason` returns the string
    Revert(String),
    /// Never mined
    Pending,
}

pub const TOKEN: Address = Address([0x7a; 20]);
pub const LOCKER: Address = Address([0x10; 20]);
pub const SENDER: Address = Address([0x5e; 20]);

fn hash_from_counter(tag: u8, n: u64) -> H256 {
    let mut out = [0u8; 32];
    out[0] = tag;
    out[24..].copy_from_slice(&n.to_be_bytes());
    H256(out)
}

/// Receipt with one unrelated log, for padding blocks.
pub fn filler_receipt(n: u64) -> Receipt {
    Receipt {
        transaction_hash: hash_from_counter(0xf0, n),
        transaction_index: 0,
        block_hash: H256::default(),
        block_number: 0,
        status: Some(1),
        root: None,
        cumulative_gas_used: Quantity::from(21_000 * (n + 1)),
        logs_bloom: Bytes(vec![0u8; 256]),
        logs: vec![Log {
            address: Address([0xee; 20]),
            topics: vec![H256([0xee; 32])],
            data: Bytes(n.to_be_bytes().to_vec()),
            log_index: None,
            transaction_hash: None,
            transaction_index: None,
            block_number: None,
            block_hash: None,
        }],
        tx_type: Some(2),
        from: None,
        to: None,
    }
}

/// Assemble a block around `receipts`: assigns transaction indexes and
/// block-wide log indexes, and commits the receipt-trie root in the header.
pub fn build_block(number: BlockHeight, receipts: &mut [Receipt]) -> Block {
    let mut log_index = 0u64;
    for (i, receipt) in receipts.iter_mut().enumerate() {
        receipt.transaction_index = i as u64;
        receipt.block_number = number;
        for log in &mut receipt.logs {
            log.log_index = Some(log_index);
            log.transaction_hash = Some(receipt.transaction_hash);
            log.transaction_index = Some(i as u64);
            log.block_number = Some(number);
            log_index += 1;
        }
    }

    let trie = PatriciaTrie::from_entries(
        receipts
            .iter()
            .map(|r| (rlp::encode_u64(r.transaction_index), r.rlp_bytes())),
    );

    let mut block = Block {
        hash: H256::default(),
        parent_hash: hash_from_counter(0xb0, number.saturating_sub(1)),
        sha3_uncles: H256([0x1d; 32]),
        miner: Address([0xc0; 20]),
        state_root: H256([0x51; 32]),
        transactions_root: H256([0x52; 32]),
        receipts_root: trie.root_hash(),
        logs_bloom: Bytes(vec![0u8; 256]),
        difficulty: Quantity::from(0),
        number,
        gas_limit: Quantity::from(30_000_000),
        gas_used: Quantity::from(21_000 * receipts.len() as u64),
        timestamp: Quantity::from(1_700_000_000 + number * 12),
        extra_data: Bytes(Vec::new()),
        mix_hash: H256([0x3c; 32]),
        nonce: Bytes(vec![0u8; 8]),
        base_fee_per_gas: Some(Quantity::from(7)),
        withdrawals_root: None,
        blob_gas_used: None,
        excess_blob_gas: None,
        parent_beacon_block_root: None,
        requests_hash: None,
        transactions: receipts.iter().map(|r| r.transaction_hash).collect(),
    };
    block.hash = block.computed_hash();

    for receipt in receipts.iter_mut() {
        receipt.block_hash = block.hash;
        for log in &mut receipt.logs {
            log.block_hash = Some(block.hash);
        }
    }
    block
}

#[derive(Default)]
struct Ledger {
    receipts: HashMap<H256, Receipt>,
    blocks: HashMap<BlockHeight, Block>,
    revert_reasons: HashMap<H256, String>,
}

pub struct MockSourceChain {
    ledger: Mutex<Ledger>,
    next_tx: AtomicU64,
    next_height: AtomicU64,
    approve_count: AtomicUsize,
    lock_count: AtomicUsize,
    /// Filler transactions mined ahead of each bridge transaction
    fillers: AtomicUsize,
    approve_outcome: Mutex<TxOutcome>,
    lock_outcome: Mutex<TxOutcome>,
    fail_approve: Mutex<Option<ChainError>>,
    fail_lock: Mutex<Option<ChainError>>,
    hide_events: AtomicBool,
    corrupt_roots: AtomicBool,
    yield_on_receipt: AtomicBool,
}

impl MockSourceChain {
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            next_tx: AtomicU64::new(1),
            next_height: AtomicU64::new(100),
            approve_count: AtomicUsize::new(0),
            lock_count: AtomicUsize::new(0),
            fillers: AtomicUsize::new(2),
            approve_outcome: Mutex::new(TxOutcome::Success),
            lock_outcome: Mutex::new(TxOutcome::Success),
            fail_approve: Mutex::new(None),
            fail_lock: Mutex::new(None),
            hide_events: AtomicBool::new(false),
            corrupt_roots: AtomicBool::new(false),
            yield_on_receipt: AtomicBool::new(false),
        }
    }

    pub fn set_approve_outcome(&self, outcome: TxOutcome) {
        *self.approve_outcome.lock().unwrap() = outcome;
    }

    pub fn set_lock_outcome(&self, outcome: TxOutcome) {
        *self.lock_outcome.lock().unwrap() = outcome;
    }

    pub fn set_fail_approve(&self, error: Option<ChainError>) {
        *self.fail_approve.lock().unwrap() = error;
    }

    pub fn set_fail_lock(&self, error: Option<ChainError>) {
        *self.fail_lock.lock().unwrap() = error;
    }

    pub fn set_fillers(&self, count: usize) {
        self.fillers.store(count, Ordering::SeqCst);
    }

    /// Make `query_events` return nothing.
    pub fn set_hide_events(&self, hide: bool) {
        self.hide_events.store(hide, Ordering::SeqCst);
    }

    /// Serve blocks whose `receiptsRoot` does not match their receipts.
    pub fn set_corrupt_roots(&self, corrupt: bool) {
        self.corrupt_roots.store(corrupt, Ordering::SeqCst);
    }

    /// Yield to the scheduler inside `get_receipt`, like a real RPC round
    /// trip would, so concurrent checks interleave.
    pub fn set_yield_on_receipt(&self, enabled: bool) {
        self.yield_on_receipt.store(enabled, Ordering::SeqCst);
    }

    pub fn approve_count(&self) -> usize {
        self.approve_count.load(Ordering::SeqCst)
    }

    pub fn lock_count(&self) -> usize {
        self.lock_count.load(Ordering::SeqCst)
    }

    pub fn receipt(&self, tx_hash: &H256) -> Option<Receipt> {
        self.ledger.lock().unwrap().receipts.get(tx_hash).cloned()
    }

    /// Store a prepared block and its receipts.
    pub fn insert_block(&self, block: Block, receipts: Vec<Receipt>) {
        let mut ledger = self.ledger.lock().unwrap();
        for receipt in receipts {
            ledger.receipts.insert(receipt.transaction_hash, receipt);
        }
        ledger.blocks.insert(block.number, block);
    }

    /// Mine the pending transaction `tx_hash` behind the configured fillers.
    pub fn mine(&self, tx_hash: H256, status: u64, logs: Vec<Log>) -> BlockHeight {
        let height = self.next_height.fetch_add(1, Ordering::SeqCst);
        let fillers = self.fillers.load(Ordering::SeqCst) as u64;

        let mut receipts: Vec<Receipt> = (0..fillers)
            .map(|i| filler_receipt(height * 100 + i))
            .collect();
        let mut target = filler_receipt(0);
        target.transaction_hash = tx_hash;
        target.status = Some(status);
        target.logs = logs;
        target.from = Some(SENDER);
        receipts.push(target);

        let block = build_block(height, &mut receipts);
        self.insert_block(block, receipts);
        height
    }

    fn next_hash(&self) -> H256 {
        hash_from_counter(0xaa, self.next_tx.fetch_add(1, Ordering::SeqCst))
    }

    fn settle(&self, tx_hash: H256, outcome: TxOutcome, logs: Vec<Log>) {
        match outcome {
            TxOutcome::Success => {
                self.mine(tx_hash, 1, logs);
            }
            TxOutcome::Revert(reason) => {
                self.mine(tx_hash, 0, Vec::new());
                self.ledger
                    .lock()
                    .unwrap()
                    .revert_reasons
                    .insert(tx_hash, reason);
            }
            TxOutcome::Pending => {}
        }
    }
}

impl Default for MockSourceChain {
    fn default() -> Self {
        Self::new()
    }
}

/// `Locked(address indexed token, address indexed sender, uint256 amount,
/// string accountId)` as the locker emits it.
pub fn locked_log(amount: Amount, recipient: &str) -> Log {
    let mut token = [0u8; 32];
    token[12..].copy_from_slice(TOKEN.as_bytes());
    let mut sender = [0u8; 32];
    sender[12..].copy_from_slice(SENDER.as_bytes());

    Log {
        address: LOCKER,
        topics: vec![abi::event_topic(LOCKED_EVENT), H256(token), H256(sender)],
        data: Bytes(abi::encode_lock_token(amount, recipient)[4..].to_vec()),
        log_index: None,
        transaction_hash: None,
        transaction_index: None,
        block_number: None,
        block_hash: None,
    }
}

#[async_trait]
impl SourceChain for MockSourceChain {
    fn name(&self) -> &'static str {
        "mock-source"
    }

    async fn approve(&self, _amount: Amount) -> Result<H256, ChainError> {
        self.approve_count.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_approve.lock().unwrap().clone() {
            return Err(err);
        }
        let hash = self.next_hash();
        let outcome = self.approve_outcome.lock().unwrap().clone();
        self.settle(hash, outcome, Vec::new());
        Ok(hash)
    }

    async fn lock(&self, amount: Amount, recipient: &str) -> Result<H256, ChainError> {
        self.lock_count.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_lock.lock().unwrap().clone() {
            return Err(err);
        }
        let hash = self.next_hash();
        let outcome = self.lock_outcome.lock().unwrap().clone();
        self.settle(hash, outcome, vec![locked_log(amount, recipient)]);
        Ok(hash)
    }

    async fn get_receipt(&self, tx_hash: &H256) -> Result<Option<Receipt>, ChainError> {
        if self.yield_on_receipt.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        Ok(self.receipt(tx_hash))
    }

    async fn get_block(&self, number: BlockHeight) -> Result<Option<Block>, ChainError> {
        let mut block = self.ledger.lock().unwrap().blocks.get(&number).cloned();
        if self.corrupt_roots.load(Ordering::SeqCst) {
            if let Some(block) = block.as_mut() {
                block.receipts_root = H256([0xde; 32]);
            }
        }
        Ok(block)
    }

    async fn get_revert_reason(&self, tx_hash: &H256) -> Result<String, ChainError> {
        Ok(self
            .ledger
            .lock()
            .unwrap()
            .revert_reasons
            .get(tx_hash)
            .cloned()
            .unwrap_or_else(|| "Transaction reverted".to_string()))
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<Log>, ChainError> {
        if self.hide_events.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        let ledger = self.ledger.lock().unwrap();
        let mut logs: Vec<Log> = ledger
            .receipts
            .values()
            .filter(|r| (filter.from_block..=filter.to_block).contains(&r.block_number))
            .filter(|r| filter.transaction_hash.is_none_or(|h| h == r.transaction_hash))
            .flat_map(|r| r.logs.iter().cloned())
            .filter(|l| l.address == filter.address && l.topics.first() == Some(&filter.topic0))
            .collect();
        logs.sort_by_key(|l| (l.block_number, l.log_index));
        Ok(logs)
    }
}

pub struct MockDestinationChain {
    balance: Mutex<Amount>,
    synced_height: AtomicU64,
    safe: AtomicBool,
    /// Credit the amount carried by the proof's log on a successful submit
    credit_on_submit: AtomicBool,
    submit_count: AtomicUsize,
    fail_submit: Mutex<Option<ChainError>>,
    submitted: Mutex<Vec<LockProof>>,
}

impl MockDestinationChain {
    pub fn new() -> Self {
        Self {
            balance: Mutex::new(0),
            synced_height: AtomicU64::new(0),
            safe: AtomicBool::new(true),
            credit_on_submit: AtomicBool::new(true),
            submit_count: AtomicUsize::new(0),
            fail_submit: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn set_synced_height(&self, height: BlockHeight) {
        self.synced_height.store(height, Ordering::SeqCst);
    }

    pub fn set_safe(&self, safe: bool) {
        self.safe.store(safe, Ordering::SeqCst);
    }

    pub fn set_balance(&self, balance: Amount) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_credit_on_submit(&self, credit: bool) {
        self.credit_on_submit.store(credit, Ordering::SeqCst);
    }

    pub fn set_fail_submit(&self, error: Option<ChainError>) {
        *self.fail_submit.lock().unwrap() = error;
    }

    pub fn submit_count(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<LockProof> {
        self.submitted.lock().unwrap().clone()
    }
}

impl Default for MockDestinationChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Amount word of a `Locked` log's data, read back out of the proof.
fn locked_amount(proof: &LockProof) -> Result<Amount, ChainError> {
    let parse = |reason: &str| ChainError::Parse(reason.to_string());
    let item = rlp::decode(&proof.log_entry_data).map_err(|e| parse(&e.to_string()))?;
    let fields = item.as_list().map_err(|e| parse(&e.to_string()))?;
    let data = fields
        .get(2)
        .ok_or_else(|| parse("log has no data"))?
        .as_bytes()
        .map_err(|e| parse(&e.to_string()))?;
    let word = data.get(16..32).ok_or_else(|| parse("short log data"))?;
    let mut buf = [0u8; 16];
    buf.copy_from_slice(word);
    Ok(Amount::from_be_bytes(buf))
}

#[async_trait]
impl DestinationChain for MockDestinationChain {
    async fn get_balance(&self, _account: &str) -> Result<Amount, ChainError> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn get_synced_height(&self) -> Result<BlockHeight, ChainError> {
        Ok(self.synced_height.load(Ordering::SeqCst))
    }

    async fn is_block_safe(&self, _height: BlockHeight) -> Result<bool, ChainError> {
        Ok(self.safe.load(Ordering::SeqCst))
    }

    async fn submit_proof(
        &self,
        proof: &LockProof,
        _deposit: Amount,
        _gas: u64,
    ) -> Result<(), ChainError> {
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_submit.lock().unwrap().clone() {
            return Err(err);
        }
        if self.credit_on_submit.load(Ordering::SeqCst) {
            let amount = locked_amount(proof)?;
            *self.balance.lock().unwrap() += amount;
        }
        self.submitted.lock().unwrap().push(proof.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mined_lock_has_valid_block() {
        let source = MockSourceChain::new();
        let hash = source.lock(5, "alice.near").await.unwrap();

        let receipt = source.get_receipt(&hash).await.unwrap().unwrap();
        assert!(receipt.is_success());
        assert_eq!(receipt.transaction_index, 2);
        // two filler logs precede it in the block
        assert_eq!(receipt.logs[0].log_index, Some(2));

        let block = source.get_block(receipt.block_number).await.unwrap().unwrap();
        assert_eq!(block.transactions.len(), 3);
        assert_eq!(block.hash, receipt.block_hash);
    }

    #[tokio::test]
    async fn test_reverted_approval_reason() {
        let source = MockSourceChain::new();
        source.set_approve_outcome(TxOutcome::Revert("no allowance".to_string()));
        let hash = source.approve(5).await.unwrap();

        let receipt = source.get_receipt(&hash).await.unwrap().unwrap();
        assert!(!receipt.is_success());
        assert_eq!(source.get_revert_reason(&hash).await.unwrap(), "no allowance");
    }

    #[tokio::test]
    async fn test_pending_tx_has_no_receipt() {
        let source = MockSourceChain::new();
        source.set_lock_outcome(TxOutcome::Pending);
        let hash = source.lock(5, "alice.near").await.unwrap();
        assert!(source.get_receipt(&hash).await.unwrap().is_none());
        assert_eq!(source.lock_count(), 1);
    }
}
