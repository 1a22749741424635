//! In-memory ledger with the same observable semantics as the contract.
//!
//! # Responsibilities
//! - Apply the four escrow calls against process-local state
//! - Hand out additional handles bound to other party identities
//! - Inject scripted failures so retry and abort paths can be exercised
//!
//! # Design Decisions
//! - Sequence numbers are assigned under the event-log lock, so the feed is
//!   always ascending without relying on caller timing
//! - Guard rules mirror what the contract enforces: no double initialize, no
//!   payment without a commitment and a claimed endpoint, no reveal before
//!   initialize

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::commitment::Commitment;

use super::types::{LedgerError, LedgerEvent, SequencedEvent};
use super::LedgerClient;

/// The escrow calls, for failure scripting and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    Initialize,
    Claim,
    Accept,
    RevealKey,
}

#[derive(Default)]
struct MemoryState {
    /// Append-only event log; index order is sequence order.
    events: Mutex<Vec<SequencedEvent>>,
    /// Sellers in initialization order.
    roster: Mutex<Vec<Address>>,
    /// Claimed buyer endpoint, last claim wins.
    claim: Mutex<Option<(String, u16)>>,
    commitments: DashMap<Address, (Commitment, U256)>,
    revealed: DashMap<Address, Vec<u8>>,
    /// Scripted failures consumed front-first per op.
    failures: DashMap<LedgerOp, VecDeque<LedgerError>>,
    calls: DashMap<LedgerOp, u64>,
}

/// Ledger sharing one state across any number of party handles.
#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<MemoryState>,
    identity: Address,
}

impl InMemoryLedger {
    /// Fresh ledger state with a first handle for `identity`.
    pub fn new(identity: Address) -> Self {
        Self { state: Arc::new(MemoryState::default()), identity }
    }

    /// Another handle onto the same ledger, signing as a different party.
    pub fn handle_for(&self, identity: Address) -> Self {
        Self { state: Arc::clone(&self.state), identity }
    }

    /// Script the next call to `op` to fail with `error`. Multiple injected
    /// failures are consumed in order.
    pub fn inject_failure(&self, op: LedgerOp, error: LedgerError) {
        self.state.failures.entry(op).or_default().push_back(error);
    }

    /// How many times `op` was attempted, failed attempts included.
    pub fn calls(&self, op: LedgerOp) -> u64 {
        self.state.calls.get(&op).map(|c| *c).unwrap_or(0)
    }

    /// Snapshot of the full event log.
    pub async fn events(&self) -> Vec<SequencedEvent> {
        self.state.events.lock().await.clone()
    }

    /// Count attempt, then surface any scripted failure.
    fn begin(&self, op: LedgerOp) -> Result<(), LedgerError> {
        *self.state.calls.entry(op).or_insert(0) += 1;
        if let Some(mut queue) = self.state.failures.get_mut(&op) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }
        Ok(())
    }

    async fn record(&self, event: LedgerEvent) {
        let mut events = self.state.events.lock().await;
        let sequence = events.len() as u64 + 1;
        events.push(SequencedEvent { sequence, event });
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    fn identity(&self) -> Address {
        self.identity
    }

    async fn initialize(&self, commitment: Commitment, price: U256) -> Result<(), LedgerError> {
        self.begin(LedgerOp::Initialize)?;

        if self.state.commitments.contains_key(&self.identity) {
            return Err(LedgerError::Permanent("initialize: already initialized".to_string()));
        }
        self.state.commitments.insert(self.identity, (commitment, price));

        let mut roster = self.state.roster.lock().await;
        roster.push(self.identity);
        let sellers = roster.clone();
        drop(roster);

        self.record(LedgerEvent::SellerInitialized { sellers, price }).await;
        Ok(())
    }

    async fn claim(&self, ip: &str, port: u16) -> Result<(), LedgerError> {
        self.begin(LedgerOp::Claim)?;
        *self.state.claim.lock().await = Some((ip.to_string(), port));
        Ok(())
    }

    async fn accept(&self, seller: Address, value: U256) -> Result<(), LedgerError> {
        self.begin(LedgerOp::Accept)?;

        let Some(entry) = self.state.commitments.get(&seller) else {
            return Err(LedgerError::Permanent("accept: unknown seller".to_string()));
        };
        let (_, price) = *entry;
        drop(entry);
        if value < price {
            return Err(LedgerError::Permanent(format!(
                "accept: payment {value} below asking price {price}"
            )));
        }

        let Some((buyer_ip, buyer_port)) = self.state.claim.lock().await.clone() else {
            return Err(LedgerError::Permanent("accept: no claimed endpoint".to_string()));
        };

        self.record(LedgerEvent::PaymentMade { seller, buyer_ip, buyer_port }).await;
        Ok(())
    }

    async fn reveal_key(&self, key: &[u8]) -> Result<(), LedgerError> {
        self.begin(LedgerOp::RevealKey)?;

        if !self.state.commitments.contains_key(&self.identity) {
            return Err(LedgerError::Permanent("reveal_key: not initialized".to_string()));
        }
        self.state.revealed.insert(self.identity, key.to_vec());

        self.record(LedgerEvent::KeyRevealed { seller: self.identity, key: key.to_vec() })
            .await;
        Ok(())
    }

    async fn events_since(&self, cursor: u64) -> Result<Vec<SequencedEvent>, LedgerError> {
        let events = self.state.events.lock().await;
        Ok(events.iter().filter(|e| e.sequence >= cursor).cloned().collect())
    }

    async fn commitment_of(&self, seller: Address) -> Result<Option<Commitment>, LedgerError> {
        Ok(self.state.commitments.get(&seller).map(|entry| entry.0))
    }

    async fn claimed_buyer(&self) -> Result<Option<(String, u16)>, LedgerError> {
        Ok(self.state.claim.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    fn commitment() -> Commitment {
        Commitment {
            merkle_root: B256::repeat_byte(0x11),
            key_commitment: B256::repeat_byte(0x22),
        }
    }

    fn seller() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn buyer() -> Address {
        Address::repeat_byte(0xbb)
    }

    #[tokio::test]
    async fn full_call_sequence_produces_ordered_events() {
        let ledger = InMemoryLedger::new(seller());
        let buyer_handle = ledger.handle_for(buyer());

        ledger.initialize(commitment(), U256::from(100)).await.unwrap();
        buyer_handle.claim("127.0.0.1", 9000).await.unwrap();
        buyer_handle.accept(seller(), U256::from(100)).await.unwrap();
        ledger.reveal_key(&[7u8; 32]).await.unwrap();

        let events = ledger.events().await;
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| w[0].sequence < w[1].sequence));
        assert_eq!(events[0].event.kind(), "seller_initialized");
        assert_eq!(events[1].event.kind(), "payment_made");
        assert_eq!(events[2].event.kind(), "key_revealed");
    }

    #[tokio::test]
    async fn cursor_excludes_consumed_events() {
        let ledger = InMemoryLedger::new(seller());
        ledger.initialize(commitment(), U256::from(1)).await.unwrap();
        ledger.reveal_key(&[1u8; 32]).await.unwrap();

        let all = ledger.events_since(0).await.unwrap();
        assert_eq!(all.len(), 2);

        let after_first = ledger.events_since(all[0].sequence + 1).await.unwrap();
        assert_eq!(after_first.len(), 1);
        assert_eq!(after_first[0].sequence, all[1].sequence);

        let none = ledger.events_since(all[1].sequence + 1).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn double_initialize_is_permanent() {
        let ledger = InMemoryLedger::new(seller());
        ledger.initialize(commitment(), U256::from(1)).await.unwrap();
        let err = ledger.initialize(commitment(), U256::from(1)).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn accept_requires_commitment_claim_and_full_price() {
        let ledger = InMemoryLedger::new(seller());
        let buyer_handle = ledger.handle_for(buyer());

        let err = buyer_handle.accept(seller(), U256::from(5)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Permanent(m) if m.contains("unknown seller")));

        ledger.initialize(commitment(), U256::from(100)).await.unwrap();
        let err = buyer_handle.accept(seller(), U256::from(100)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Permanent(m) if m.contains("no claimed endpoint")));

        buyer_handle.claim("127.0.0.1", 9000).await.unwrap();
        let err = buyer_handle.accept(seller(), U256::from(99)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Permanent(m) if m.contains("below asking price")));

        buyer_handle.accept(seller(), U256::from(100)).await.unwrap();
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let ledger = InMemoryLedger::new(seller());
        ledger.inject_failure(LedgerOp::Initialize, LedgerError::Transient("nonce".into()));
        ledger.inject_failure(LedgerOp::Initialize, LedgerError::Transient("nonce".into()));

        assert!(ledger.initialize(commitment(), U256::from(1)).await.is_err());
        assert!(ledger.initialize(commitment(), U256::from(1)).await.is_err());
        ledger.initialize(commitment(), U256::from(1)).await.unwrap();

        assert_eq!(ledger.calls(LedgerOp::Initialize), 3);
    }

    #[tokio::test]
    async fn commitment_query_reflects_initialization() {
        let ledger = InMemoryLedger::new(seller());
        assert_eq!(ledger.commitment_of(seller()).await.unwrap(), None);

        ledger.initialize(commitment(), U256::from(1)).await.unwrap();
        assert_eq!(ledger.commitment_of(seller()).await.unwrap(), Some(commitment()));
    }
}
