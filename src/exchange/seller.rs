//! Seller-side exchange coordinator.
//!
//! # Responsibilities
//! - Drive one inbound share submission through the full protocol: attest,
//!   encrypt, commit, deliver, collect payment, reveal the key
//! - Enforce the phase deadlines and the reveal-after-payment ordering
//! - Keep the session registry and outcome metrics current
//!
//! # Design Decisions
//! - The session key is an owned local of the driving task. Nothing else can
//!   reach it before `reveal_key` publishes it.
//! - Rejections happen before the first ledger write; any failure after that
//!   point aborts and leaves whatever already settled on the ledger alone.
//! - Only the first payment event triggers a reveal. The watcher is dropped
//!   right after, so duplicates never surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use uuid::Uuid;

use crate::attestation::Attestor;
use crate::cipher::SessionKey;
use crate::commitment::Commitment;
use crate::config::ExchangeConfig;
use crate::ledger::{EventWatcher, LedgerClient, LedgerError, LedgerEvent};
use crate::observability::metrics;
use crate::resilience::{retry_transient, RetryPolicy};
use crate::transport::{read_message, send_message, write_message};
use crate::transport::{Delivery, ShareSubmission, SubmissionAck};

use super::session::{SellerSession, SessionRegistry};
use super::types::{ExchangeError, SellerState};

/// Tunables for the seller flow, flattened out of the config tree.
#[derive(Debug, Clone)]
pub struct SellerSettings {
    /// Hard cap on an inbound submission frame.
    pub max_frame_bytes: usize,
    /// Budget for reading one complete submission.
    pub read_timeout: Duration,
    /// Budget for opening the delivery connection.
    pub connect_timeout: Duration,
    /// How long to wait for a buyer to claim an endpoint.
    pub claim_deadline: Duration,
    /// How long to wait for the payment event after delivery.
    pub payment_deadline: Duration,
    /// Ledger poll cadence for claims and events.
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl SellerSettings {
    pub fn from_config(config: &ExchangeConfig) -> Self {
        Self {
            max_frame_bytes: config.transport.max_frame_bytes,
            read_timeout: Duration::from_secs(config.transport.read_timeout_secs),
            connect_timeout: Duration::from_secs(config.transport.connect_timeout_secs),
            claim_deadline: Duration::from_secs(config.deadlines.claim_secs),
            payment_deadline: Duration::from_secs(config.deadlines.payment_secs),
            poll_interval: Duration::from_millis(config.ledger.poll_interval_ms),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

impl Default for SellerSettings {
    fn default() -> Self {
        Self::from_config(&ExchangeConfig::default())
    }
}

/// Drives seller sessions against the ledger and the attestor.
pub struct SellerCoordinator {
    ledger: Arc<dyn LedgerClient>,
    attestor: Arc<dyn Attestor>,
    registry: SessionRegistry,
    settings: SellerSettings,
}

impl SellerCoordinator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        attestor: Arc<dyn Attestor>,
        settings: SellerSettings,
    ) -> Self {
        Self {
            ledger,
            attestor,
            registry: SessionRegistry::new(),
            settings,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Run one full exchange on an accepted submission connection.
    ///
    /// Returns the session ID on completion. The session is registered for
    /// its whole lifetime and its terminal state is recorded either way.
    pub async fn handle_connection(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
    ) -> Result<Uuid, ExchangeError> {
        let submission = match timeout(
            self.settings.read_timeout,
            read_message::<ShareSubmission, _>(&mut stream, self.settings.max_frame_bytes),
        )
        .await
        {
            Ok(Ok(submission)) => submission,
            Ok(Err(e)) if e.is_malformed() => {
                return Err(ExchangeError::MalformedInput(e.to_string()))
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ExchangeError::DeadlineExpired("reading the share submission")),
        };
        if submission.data_shares.is_empty() {
            return Err(ExchangeError::MalformedInput("empty share batch".into()));
        }

        let session = SellerSession::new(self.ledger.identity(), U256::from(submission.price));
        let session_id = session.id();
        let handle = self.registry.insert(session);

        tracing::info!(
            session_id = %session_id,
            peer = %peer,
            shares = submission.data_shares.len(),
            price = submission.price,
            "Seller session opened"
        );

        let result = self.drive(&handle, &mut stream, submission).await;

        let final_state = handle.lock().await.state();
        self.registry.remove(&session_id);
        metrics::record_session_outcome("seller", final_state.name());

        match &result {
            Ok(()) => tracing::info!(session_id = %session_id, "Seller session completed"),
            Err(e) => tracing::warn!(
                session_id = %session_id,
                state = final_state.name(),
                error = %e,
                "Seller session ended without completing"
            ),
        }
        result.map(|()| session_id)
    }

    async fn drive(
        &self,
        session: &Arc<Mutex<SellerSession>>,
        stream: &mut TcpStream,
        submission: ShareSubmission,
    ) -> Result<(), ExchangeError> {
        let (session_id, price) = {
            let guard = session.lock().await;
            (guard.id(), guard.price)
        };
        session.lock().await.advance(SellerState::Attesting)?;

        // Gate on attestation before anything touches the ledger.
        let accepted = match self.attestor.verify(&submission.data_shares).await {
            Ok(accepted) => {
                metrics::record_attestation(accepted);
                accepted
            }
            Err(e) => {
                metrics::record_attestation(false);
                tracing::warn!(session_id = %session_id, error = %e, "Attestor unavailable");
                session.lock().await.advance(SellerState::Rejected)?;
                return Err(e.into());
            }
        };
        if !accepted {
            session.lock().await.advance(SellerState::Rejected)?;
            return Err(ExchangeError::AttestationRejected);
        }

        // Fresh key per session; encrypt each share into its own blob.
        let key = SessionKey::generate();
        let mut ciphertexts = Vec::with_capacity(submission.data_shares.len());
        for envelope in &submission.data_shares {
            match key.encrypt(envelope.share.as_bytes()) {
                Ok(blob) => ciphertexts.push(blob),
                Err(e) => {
                    session.lock().await.advance(SellerState::Rejected)?;
                    return Err(e.into());
                }
            }
        }
        let commitment = match Commitment::over(&ciphertexts, key.as_bytes()) {
            Ok(commitment) => commitment,
            Err(e) => {
                session.lock().await.advance(SellerState::Rejected)?;
                return Err(ExchangeError::MalformedInput(e.to_string()));
            }
        };

        let initialized = {
            let ledger = Arc::clone(&self.ledger);
            retry_transient(self.settings.retry, "initialize", move || {
                let ledger = Arc::clone(&ledger);
                async move { ledger.initialize(commitment, price).await }
            })
            .await
        };
        if let Err(e) = initialized {
            self.abort(session).await;
            return Err(e.into());
        }
        {
            let mut guard = session.lock().await;
            guard.stage_payload(ciphertexts, commitment);
            guard.advance(SellerState::Committed)?;
        }
        tracing::info!(session_id = %session_id, price = %price, "Commitment published");

        // The submitter's part is done. A lost ack cannot unwind the
        // on-ledger commitment, so log it and press on.
        let ack = SubmissionAck { accepted: true, session_id };
        if let Err(e) = write_message(stream, &ack).await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to deliver submission ack");
        }
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(session_id = %session_id, error = %e, "Submission stream close failed");
        }

        // Wait for a buyer to claim a delivery endpoint.
        let Some((buyer_ip, buyer_port)) = self.await_claim().await else {
            self.abort(session).await;
            return Err(ExchangeError::DeadlineExpired("waiting for a buyer claim"));
        };
        tracing::info!(
            session_id = %session_id,
            buyer_ip = %buyer_ip,
            buyer_port = buyer_port,
            "Buyer claim observed"
        );

        let delivery = {
            let mut guard = session.lock().await;
            guard.buyer_endpoint = Some((buyer_ip.clone(), buyer_port));
            Delivery::from_ciphertexts(session_id, guard.seller, &guard.ciphertexts)
        };
        if let Err(e) =
            send_message(&buyer_ip, buyer_port, self.settings.connect_timeout, &delivery).await
        {
            self.abort(session).await;
            return Err(e.into());
        }
        session.lock().await.advance(SellerState::AwaitingPayment)?;
        tracing::info!(
            session_id = %session_id,
            blobs = delivery.blobs.len(),
            "Payload delivered"
        );

        // Watch for payment. The first matching event wins; everything after
        // it is ignored because the queue is dropped below.
        let from_sequence = session.lock().await.cursor;
        let mut events = EventWatcher::new(
            Arc::clone(&self.ledger),
            self.ledger.identity(),
            from_sequence,
            self.settings.poll_interval,
        )
        .spawn();

        let payment = timeout(self.settings.payment_deadline, async {
            while let Some(sequenced) = events.recv().await {
                if matches!(sequenced.event, LedgerEvent::PaymentMade { .. }) {
                    return Some(sequenced);
                }
            }
            None
        })
        .await;

        let payment = match payment {
            Ok(Some(event)) => event,
            Ok(None) => {
                self.abort(session).await;
                return Err(ExchangeError::Ledger(LedgerError::Transient(
                    "event feed ended before payment".into(),
                )));
            }
            Err(_) => {
                self.abort(session).await;
                return Err(ExchangeError::DeadlineExpired("waiting for payment"));
            }
        };
        drop(events);
        session.lock().await.cursor = payment.sequence + 1;
        tracing::info!(
            session_id = %session_id,
            sequence = payment.sequence,
            "Payment observed"
        );

        // Payment is settled; publish the key.
        let revealed = {
            let ledger = Arc::clone(&self.ledger);
            let key_bytes = key.as_bytes().to_vec();
            retry_transient(self.settings.retry, "reveal_key", move || {
                let ledger = Arc::clone(&ledger);
                let key_bytes = key_bytes.clone();
                async move { ledger.reveal_key(&key_bytes).await }
            })
            .await
        };
        if let Err(e) = revealed {
            self.abort(session).await;
            return Err(e.into());
        }
        session.lock().await.advance(SellerState::KeyRevealed)?;
        tracing::info!(session_id = %session_id, "Key revealed");

        session.lock().await.advance(SellerState::Completed)?;
        Ok(())
    }

    /// Poll for a claimed delivery endpoint until the claim deadline.
    ///
    /// Poll failures are logged and absorbed; the next tick retries.
    async fn await_claim(&self) -> Option<(String, u16)> {
        let deadline = Instant::now() + self.settings.claim_deadline;
        loop {
            match self.ledger.claimed_buyer().await {
                Ok(Some(endpoint)) => return Some(endpoint),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Claim poll failed"),
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    /// Mark the session aborted. Transition failures here mean the session
    /// already reached a terminal state, which is fine to keep.
    async fn abort(&self, session: &Arc<Mutex<SellerSession>>) {
        let mut guard = session.lock().await;
        if !guard.state().is_terminal() {
            if let Err(e) = guard.advance(SellerState::Aborted) {
                tracing::error!(session_id = %guard.id(), error = %e, "Abort transition failed");
            }
        }
    }
}
