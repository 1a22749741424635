//! Buyer-side exchange coordinator.
//!
//! # Responsibilities
//! - Discover a seller offer from the ledger event feed
//! - Claim a delivery endpoint and receive the ciphertext payload
//! - Verify the payload against the published commitment before paying
//! - Collect the revealed key, check the hash lock and decrypt
//!
//! # Design Decisions
//! - The delivery listener binds before the claim is published, so the
//!   payload can never race the socket
//! - Payment happens only after the recomputed Merkle root matches the
//!   on-ledger commitment; a mismatch terminates with no payment made
//! - Event cursors start just past the offer, so reveals from older
//!   sessions of the same seller can never satisfy this one

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout, Instant};
use uuid::Uuid;

use crate::cipher::SessionKey;
use crate::commitment::merkle_root;
use crate::config::ExchangeConfig;
use crate::ledger::{EventWatcher, LedgerClient, LedgerError, LedgerEvent};
use crate::observability::metrics;
use crate::resilience::{retry_transient, RetryPolicy};
use crate::transport::{read_message, Delivery, TransportError};

use super::session::BuyerSession;
use super::types::{BuyerState, ExchangeError, SellerOffer};

/// Tunables for the buyer flow, flattened out of the config tree.
#[derive(Debug, Clone)]
pub struct BuyerSettings {
    /// Address the delivery listener binds and advertises. Port zero binds
    /// ephemerally; the claim carries the resolved port.
    pub bind_ip: String,
    pub bind_port: u16,
    /// Which seller in the initialization roster to buy from.
    pub seller_index: usize,
    /// Hard cap on the inbound delivery frame.
    pub max_frame_bytes: usize,
    /// How long to wait for the chosen seller's offer to appear.
    pub offer_deadline: Duration,
    /// How long to wait for the payload after claiming.
    pub delivery_deadline: Duration,
    /// How long to wait for the key reveal after paying.
    pub key_deadline: Duration,
    /// Ledger poll cadence.
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl BuyerSettings {
    pub fn from_config(
        config: &ExchangeConfig,
        bind_ip: String,
        bind_port: u16,
        seller_index: usize,
    ) -> Self {
        Self {
            bind_ip,
            bind_port,
            seller_index,
            max_frame_bytes: config.transport.max_frame_bytes,
            offer_deadline: Duration::from_secs(config.deadlines.claim_secs),
            delivery_deadline: Duration::from_secs(config.deadlines.delivery_secs),
            key_deadline: Duration::from_secs(config.deadlines.key_reveal_secs),
            poll_interval: Duration::from_millis(config.ledger.poll_interval_ms),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

impl Default for BuyerSettings {
    fn default() -> Self {
        Self::from_config(&ExchangeConfig::default(), "127.0.0.1".to_string(), 0, 0)
    }
}

/// Everything the buyer walks away with.
#[derive(Debug)]
pub struct Purchase {
    pub session_id: Uuid,
    pub seller: Address,
    pub price: U256,
    /// Decrypted shares in commitment order.
    pub shares: Vec<Vec<u8>>,
}

/// Drives one buyer exchange against the ledger.
pub struct BuyerCoordinator {
    ledger: Arc<dyn LedgerClient>,
    settings: BuyerSettings,
}

impl BuyerCoordinator {
    pub fn new(ledger: Arc<dyn LedgerClient>, settings: BuyerSettings) -> Self {
        Self { ledger, settings }
    }

    /// Run one exchange to completion and return the decrypted shares.
    pub async fn run_exchange(&self) -> Result<Purchase, ExchangeError> {
        let result = self.drive().await;
        let outcome = match &result {
            Ok(_) => "decrypted",
            Err(ExchangeError::VerificationFailed) => "verification_failed",
            Err(_) => "error",
        };
        metrics::record_session_outcome("buyer", outcome);
        result
    }

    async fn drive(&self) -> Result<Purchase, ExchangeError> {
        let (offer, offer_sequence) = self.discover_offer().await?;
        let mut session = BuyerSession::new(offer);
        session.cursor = offer_sequence + 1;
        let session_id = session.id();
        tracing::info!(
            session_id = %session_id,
            seller = %offer.seller,
            price = %offer.price,
            "Offer selected"
        );

        // Bind before claiming so delivery can never beat the listener.
        let listener =
            TcpListener::bind((self.settings.bind_ip.as_str(), self.settings.bind_port))
                .await
                .map_err(TransportError::Io)?;
        let port = listener.local_addr().map_err(TransportError::Io)?.port();

        {
            let ledger = Arc::clone(&self.ledger);
            let ip = self.settings.bind_ip.clone();
            retry_transient(self.settings.retry, "claim", move || {
                let ledger = Arc::clone(&ledger);
                let ip = ip.clone();
                async move { ledger.claim(&ip, port).await }
            })
            .await?;
        }
        session.advance(BuyerState::AwaitingDelivery)?;
        tracing::info!(
            session_id = %session_id,
            bind_ip = %self.settings.bind_ip,
            port = port,
            "Delivery endpoint claimed"
        );

        let delivery: Delivery = timeout(self.settings.delivery_deadline, async {
            let (mut stream, peer) = listener.accept().await.map_err(TransportError::Io)?;
            tracing::debug!(session_id = %session_id, peer = %peer, "Delivery connection accepted");
            read_message(&mut stream, self.settings.max_frame_bytes).await
        })
        .await
        .map_err(|_| ExchangeError::DeadlineExpired("waiting for payload delivery"))?
        .map_err(|e| {
            if e.is_malformed() {
                ExchangeError::MalformedInput(e.to_string())
            } else {
                ExchangeError::from(e)
            }
        })?;
        session.advance(BuyerState::Verifying)?;

        if delivery.seller != offer.seller {
            tracing::warn!(
                session_id = %session_id,
                claimed = %delivery.seller,
                expected = %offer.seller,
                "Delivery names a different seller; verifying against the ledger anyway"
            );
        }
        let blobs = delivery
            .decode_blobs()
            .map_err(|e| ExchangeError::MalformedInput(e.to_string()))?;
        if blobs.is_empty() {
            return Err(ExchangeError::MalformedInput("empty delivery".into()));
        }

        // The ledger commitment is the authority; the delivered bytes either
        // hash to it or the exchange stops before any payment.
        let Some(commitment) = self.ledger.commitment_of(offer.seller).await? else {
            session.advance(BuyerState::VerificationFailed)?;
            return Err(ExchangeError::VerificationFailed);
        };
        let root = merkle_root(&blobs).map_err(|e| ExchangeError::MalformedInput(e.to_string()))?;
        if root != commitment.merkle_root {
            session.advance(BuyerState::VerificationFailed)?;
            tracing::warn!(
                session_id = %session_id,
                seller = %offer.seller,
                "Delivered payload does not match the published commitment"
            );
            return Err(ExchangeError::VerificationFailed);
        }
        tracing::info!(
            session_id = %session_id,
            blobs = blobs.len(),
            "Payload verified against commitment"
        );

        {
            let ledger = Arc::clone(&self.ledger);
            let (seller, price) = (offer.seller, offer.price);
            retry_transient(self.settings.retry, "accept", move || {
                let ledger = Arc::clone(&ledger);
                async move { ledger.accept(seller, price).await }
            })
            .await?;
        }
        session.advance(BuyerState::Paid)?;
        session.advance(BuyerState::AwaitingKey)?;
        tracing::info!(session_id = %session_id, price = %offer.price, "Payment escrowed");

        let mut events = EventWatcher::new(
            Arc::clone(&self.ledger),
            offer.seller,
            session.cursor,
            self.settings.poll_interval,
        )
        .spawn();

        let reveal = timeout(self.settings.key_deadline, async {
            while let Some(sequenced) = events.recv().await {
                if let LedgerEvent::KeyRevealed { key, .. } = sequenced.event {
                    return Some((sequenced.sequence, key));
                }
            }
            None
        })
        .await;
        let (sequence, key_bytes) = match reveal {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                return Err(ExchangeError::Ledger(LedgerError::Transient(
                    "event feed ended before the key reveal".into(),
                )))
            }
            Err(_) => return Err(ExchangeError::DeadlineExpired("waiting for the key reveal")),
        };
        drop(events);
        session.cursor = sequence + 1;
        tracing::info!(session_id = %session_id, sequence = sequence, "Key reveal observed");

        // Hash lock first, then authenticated decryption of every blob.
        if !commitment.matches_key(&key_bytes) {
            return Err(ExchangeError::KeyMismatch);
        }
        let key = SessionKey::from_bytes(&key_bytes)?;
        let mut shares = Vec::with_capacity(blobs.len());
        for blob in &blobs {
            shares.push(key.decrypt(blob)?);
        }
        session.advance(BuyerState::Decrypted)?;
        tracing::info!(session_id = %session_id, shares = shares.len(), "Exchange complete");

        Ok(Purchase {
            session_id,
            seller: offer.seller,
            price: offer.price,
            shares,
        })
    }

    /// Poll the event feed until the configured seller's offer appears.
    ///
    /// The roster event whose length first reaches `seller_index + 1` is the
    /// chosen seller's own initialization, so its price field is theirs.
    async fn discover_offer(&self) -> Result<(SellerOffer, u64), ExchangeError> {
        let wanted_len = self.settings.seller_index + 1;
        let deadline = Instant::now() + self.settings.offer_deadline;
        let mut cursor = 0u64;
        loop {
            match self.ledger.events_since(cursor).await {
                Ok(events) => {
                    for sequenced in &events {
                        if let LedgerEvent::SellerInitialized { sellers, price } = &sequenced.event
                        {
                            if sellers.len() == wanted_len {
                                let offer = SellerOffer {
                                    seller: sellers[self.settings.seller_index],
                                    price: *price,
                                };
                                return Ok((offer, sequenced.sequence));
                            }
                        }
                    }
                    if let Some(last) = events.last() {
                        cursor = last.sequence + 1;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Offer poll failed"),
            }
            if Instant::now() >= deadline {
                return Err(ExchangeError::DeadlineExpired("waiting for a seller offer"));
            }
            sleep(self.settings.poll_interval).await;
        }
    }
}
