//! Per-exchange session records and the seller's live-session registry.
//!
//! # Responsibilities
//! - Hold the state and accumulated artifacts of one exchange.
//! - Enforce the legal transition table on every state change.
//! - Track live seller sessions so operators can see what is in flight.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::commitment::Commitment;
use crate::exchange::types::{BuyerState, ExchangeError, SellerOffer, SellerState};
use crate::observability::metrics;

/// One seller-side exchange, from submission to key reveal.
///
/// The session key deliberately lives outside this struct. It stays an owned
/// local of the task driving the exchange until the moment it is revealed,
/// so no other task can observe it early.
#[derive(Debug)]
pub struct SellerSession {
    id: Uuid,
    pub seller: Address,
    pub price: U256,
    state: SellerState,
    /// Next ledger sequence this session has not yet consumed.
    pub cursor: u64,
    pub ciphertexts: Vec<Vec<u8>>,
    pub commitment: Option<Commitment>,
    pub buyer_endpoint: Option<(String, u16)>,
}

impl SellerSession {
    pub fn new(seller: Address, price: U256) -> Self {
        SellerSession {
            id: Uuid::new_v4(),
            seller,
            price,
            state: SellerState::AwaitingShares,
            cursor: 0,
            ciphertexts: Vec::new(),
            commitment: None,
            buyer_endpoint: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SellerState {
        self.state
    }

    /// Move to `next`, failing on anything outside the transition table.
    pub fn advance(&mut self, next: SellerState) -> Result<(), ExchangeError> {
        if !self.state.can_advance_to(next) {
            return Err(ExchangeError::IllegalTransition {
                from: self.state.name(),
                to: next.name(),
            });
        }
        tracing::debug!(
            session_id = %self.id,
            from = self.state.name(),
            to = next.name(),
            "Seller session advanced"
        );
        self.state = next;
        Ok(())
    }

    /// Record the encrypted payload and its published commitment.
    pub fn stage_payload(&mut self, ciphertexts: Vec<Vec<u8>>, commitment: Commitment) {
        self.ciphertexts = ciphertexts;
        self.commitment = Some(commitment);
    }
}

/// One buyer-side exchange, from claim to decryption.
#[derive(Debug)]
pub struct BuyerSession {
    id: Uuid,
    pub offer: SellerOffer,
    state: BuyerState,
    /// Next ledger sequence this session has not yet consumed.
    pub cursor: u64,
}

impl BuyerSession {
    pub fn new(offer: SellerOffer) -> Self {
        BuyerSession {
            id: Uuid::new_v4(),
            offer,
            state: BuyerState::Claiming,
            cursor: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> BuyerState {
        self.state
    }

    /// Move to `next`, failing on anything outside the transition table.
    pub fn advance(&mut self, next: BuyerState) -> Result<(), ExchangeError> {
        if !self.state.can_advance_to(next) {
            return Err(ExchangeError::IllegalTransition {
                from: self.state.name(),
                to: next.name(),
            });
        }
        tracing::debug!(
            session_id = %self.id,
            from = self.state.name(),
            to = next.name(),
            "Buyer session advanced"
        );
        self.state = next;
        Ok(())
    }
}

/// Concurrent map of live seller sessions, shared across connection tasks.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, Arc<Mutex<SellerSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry { sessions: Arc::new(DashMap::new()) }
    }

    /// Register a session and hand back its shared handle.
    pub fn insert(&self, session: SellerSession) -> Arc<Mutex<SellerSession>> {
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.insert(id, Arc::clone(&handle));
        metrics::set_active_sessions(self.len());
        handle
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Mutex<SellerSession>>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &Uuid) {
        self.sessions.remove(id);
        metrics::set_active_sessions(self.len());
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
