//! EVM escrow contract binding.
//!
//! # Responsibilities
//! - Connect to JSON-RPC endpoints with failover for reads
//! - Encode and submit the four escrow calls, then wait out confirmations
//! - Decode contract logs into the sequenced event feed
//! - Answer the two contract state queries
//!
//! # Design Decisions
//! - Reads iterate every configured provider before giving up; writes go
//!   through the signing provider only, since replaying a signed transaction
//!   across endpoints risks double submission
//! - Event sequence is `(block_number << 20) | log_index`, so ledger order
//!   survives into a single comparable integer
//! - Only blocks at the configured confirmation depth are scanned, which
//!   keeps reorged events out of the feed

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionReceipt, TransactionRequest};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::commitment::Commitment;
use crate::config::LedgerConfig;
use crate::observability::metrics;

use super::types::{classify_rpc_error, pack_sequence, LedgerError, LedgerEvent, SequencedEvent};
use super::wallet::Wallet;
use super::LedgerClient;

sol! {
    function initialize(bytes32 merkleRoot, bytes32 keyCommitment, uint256 price);
    function buyerClaim(string ip, uint16 port);
    function accept(address seller) payable;
    function revealKey(bytes key);
    function commitmentOf(address seller) external view returns (bytes32 merkleRoot, bytes32 keyCommitment, bool initialized);
    function claimedBuyer() external view returns (string ip, uint16 port, bool claimed);

    /// Emitted when a seller publishes its commitment.
    #[derive(Debug)]
    event SellerInitialized(address[] sellerNodes, uint256 price);

    /// Emitted when a buyer escrows payment for a seller.
    #[derive(Debug)]
    event PaymentMade(address indexed sellerNode, string buyerIp, uint16 buyerPort);

    /// Emitted when a seller publishes its session key.
    #[derive(Debug)]
    event KeyRevealed(address indexed sellerNode, bytes key);
}

/// Ledger client backed by the escrow contract on an EVM chain.
pub struct EvmLedger {
    /// Read providers (primary + failovers).
    providers: Vec<Box<dyn Provider + Send + Sync>>,
    /// Signing provider for submitting transactions.
    sender: Box<dyn Provider + Send + Sync>,
    /// Signing identity and nonce state.
    wallet: Wallet,
    contract: Address,
    config: LedgerConfig,
    timeout_duration: Duration,
}

impl EvmLedger {
    /// Connect to the configured endpoints and verify the chain.
    pub async fn connect(config: LedgerConfig, wallet: Wallet) -> Result<Self, LedgerError> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);

        let contract: Address = config
            .contract_address
            .parse()
            .map_err(|e| LedgerError::Permanent(format!("invalid contract address: {e}")))?;

        let primary_url: url::Url = config
            .rpc_url
            .parse()
            .map_err(|e| LedgerError::Permanent(format!("invalid RPC URL '{}': {e}", config.rpc_url)))?;

        let mut providers: Vec<Box<dyn Provider + Send + Sync>> = Vec::new();
        providers.push(Box::new(ProviderBuilder::new().connect_http(primary_url.clone())));

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Box::new(ProviderBuilder::new().connect_http(url)));
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let sender: Box<dyn Provider + Send + Sync> = Box::new(
            ProviderBuilder::new()
                .wallet(EthereumWallet::from(wallet.signer().clone()))
                .connect_http(primary_url),
        );

        let ledger = Self {
            providers,
            sender,
            wallet,
            contract,
            config: config.clone(),
            timeout_duration,
        };

        // Verify chain ID matches configuration
        match ledger.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    contract = %ledger.contract,
                    "Ledger client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Ledger client initialized but chain verification failed"
                );
                // Don't fail initialization - allow the chain to come up later
            }
        }

        Ok(ledger)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> Result<(), LedgerError> {
        let chain_id = self.get_chain_id().await?;
        if chain_id != self.config.chain_id {
            return Err(LedgerError::Permanent(format!(
                "chain ID mismatch: expected {}, got {}",
                self.config.chain_id, chain_id
            )));
        }
        Ok(())
    }

    async fn get_chain_id(&self) -> Result<u64, LedgerError> {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.get_chain_id();
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout, trying next provider");
                }
            }
        }
        Err(LedgerError::Transient("all RPC providers failed to get chain ID".to_string()))
    }

    async fn get_block_number(&self) -> Result<u64, LedgerError> {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.get_block_number();
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(LedgerError::Transient("all RPC providers failed to get block number".to_string()))
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.get_transaction_count(address);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(LedgerError::Transient("all RPC providers failed to get transaction count".to_string()))
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, LedgerError> {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.get_transaction_receipt(tx_hash);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(LedgerError::Transient("all RPC providers failed to get receipt".to_string()))
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, LedgerError> {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.get_logs(filter);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(LedgerError::Transient("all RPC providers failed to get logs".to_string()))
    }

    async fn call_view(&self, input: Vec<u8>, op: &'static str) -> Result<Vec<u8>, LedgerError> {
        for (i, provider) in self.providers.iter().enumerate() {
            let tx = TransactionRequest::default()
                .with_to(self.contract)
                .with_input(input.clone());
            let fut = provider.call(tx);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result.to_vec()),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, op, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, op, "RPC timeout"),
            }
        }
        Err(LedgerError::Transient(format!("{op}: all RPC providers failed")))
    }

    /// Submit one escrow call and wait for it to confirm.
    async fn submit(
        &self,
        input: Vec<u8>,
        value: Option<U256>,
        op: &'static str,
    ) -> Result<(), LedgerError> {
        // Sync sequencing state with the chain, then take the next slot.
        let chain_nonce = self.get_transaction_count(self.wallet.address()).await?;
        self.wallet.sync_nonce(chain_nonce);
        let nonce = self.wallet.next_nonce();

        let mut tx = TransactionRequest::default()
            .with_to(self.contract)
            .with_input(input)
            .with_nonce(nonce)
            .with_chain_id(self.wallet.chain_id());
        if let Some(value) = value {
            tx = tx.with_value(value);
        }

        let pending = match timeout(self.timeout_duration, self.sender.send_transaction(tx)).await {
            Ok(Ok(pending)) => pending,
            Ok(Err(e)) => {
                metrics::record_ledger_call(op, false);
                return Err(classify_rpc_error(op, &e.to_string()));
            }
            Err(_) => {
                metrics::record_ledger_call(op, false);
                return Err(LedgerError::Transient(format!("{op}: submission timed out")));
            }
        };
        let tx_hash = *pending.tx_hash();

        tracing::debug!(op, tx_hash = %tx_hash, nonce, "Ledger call submitted");

        let result = self.wait_for_confirmation(tx_hash, op).await;
        metrics::record_ledger_call(op, result.is_ok());
        result
    }

    /// Wait until a submitted transaction reaches the configured depth.
    async fn wait_for_confirmation(&self, tx_hash: TxHash, op: &'static str) -> Result<(), LedgerError> {
        let required = self.config.confirmation_blocks;
        let timeout_duration = Duration::from_secs(self.config.confirmation_timeout_secs);
        let poll_interval = Duration::from_secs(2);

        let result = timeout(timeout_duration, async {
            let mut ticker = interval(poll_interval);

            loop {
                ticker.tick().await;

                let receipt = match self.get_transaction_receipt(tx_hash).await? {
                    Some(r) => r,
                    None => {
                        tracing::debug!(op, tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                };

                if !receipt.status() {
                    return Err(LedgerError::Permanent(format!("{op}: transaction reverted")));
                }

                let current_block = self.get_block_number().await?;
                let tx_block = receipt.block_number.unwrap_or(current_block);
                let confirmations = current_block.saturating_sub(tx_block);

                if confirmations >= required {
                    tracing::debug!(op, tx_hash = %tx_hash, block = tx_block, "Ledger call confirmed");
                    return Ok(());
                }

                tracing::debug!(
                    op,
                    tx_hash = %tx_hash,
                    confirmations,
                    required,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        match result {
            Ok(status) => status,
            Err(_) => Err(LedgerError::Transient(format!(
                "{op}: not confirmed within {}s",
                self.config.confirmation_timeout_secs
            ))),
        }
    }

    fn decode_event(log: &Log) -> Option<LedgerEvent> {
        if let Ok(decoded) = log.log_decode::<SellerInitialized>() {
            let event = decoded.inner.data;
            return Some(LedgerEvent::SellerInitialized {
                sellers: event.sellerNodes,
                price: event.price,
            });
        }
        if let Ok(decoded) = log.log_decode::<PaymentMade>() {
            let event = decoded.inner.data;
            return Some(LedgerEvent::PaymentMade {
                seller: event.sellerNode,
                buyer_ip: event.buyerIp,
                buyer_port: event.buyerPort,
            });
        }
        if let Ok(decoded) = log.log_decode::<KeyRevealed>() {
            let event = decoded.inner.data;
            return Some(LedgerEvent::KeyRevealed {
                seller: event.sellerNode,
                key: event.key.to_vec(),
            });
        }
        None
    }
}

#[async_trait]
impl LedgerClient for EvmLedger {
    fn identity(&self) -> Address {
        self.wallet.address()
    }

    async fn initialize(&self, commitment: Commitment, price: U256) -> Result<(), LedgerError> {
        let input = initializeCall {
            merkleRoot: commitment.merkle_root,
            keyCommitment: commitment.key_commitment,
            price,
        }
        .abi_encode();
        self.submit(input, None, "initialize").await
    }

    async fn claim(&self, ip: &str, port: u16) -> Result<(), LedgerError> {
        let input = buyerClaimCall { ip: ip.to_string(), port }.abi_encode();
        self.submit(input, None, "claim").await
    }

    async fn accept(&self, seller: Address, value: U256) -> Result<(), LedgerError> {
        let input = acceptCall { seller }.abi_encode();
        self.submit(input, Some(value), "accept").await
    }

    async fn reveal_key(&self, key: &[u8]) -> Result<(), LedgerError> {
        let input = revealKeyCall { key: key.to_vec().into() }.abi_encode();
        self.submit(input, None, "reveal_key").await
    }

    async fn events_since(&self, cursor: u64) -> Result<Vec<SequencedEvent>, LedgerError> {
        let current_block = self.get_block_number().await?;
        let target_block = current_block.saturating_sub(self.config.confirmation_blocks);
        let from_block = super::types::block_of(cursor);

        if target_block < from_block {
            return Ok(Vec::new());
        }

        let filter = Filter::new()
            .address(self.contract)
            .from_block(from_block)
            .to_block(target_block);

        let logs = self.get_logs(&filter).await?;

        let mut events = Vec::new();
        for log in logs {
            let (Some(block_number), Some(log_index)) = (log.block_number, log.log_index) else {
                continue;
            };
            let sequence = pack_sequence(block_number, log_index);
            if sequence < cursor {
                continue;
            }
            if let Some(event) = Self::decode_event(&log) {
                events.push(SequencedEvent { sequence, event });
            }
        }
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    async fn commitment_of(&self, seller: Address) -> Result<Option<Commitment>, LedgerError> {
        let input = commitmentOfCall { seller }.abi_encode();
        let output = self.call_view(input, "commitment_of").await?;
        let ret = commitmentOfCall::abi_decode_returns(&output)
            .map_err(|e| LedgerError::Permanent(format!("commitment_of: bad return data: {e}")))?;

        if !ret.initialized {
            return Ok(None);
        }
        Ok(Some(Commitment {
            merkle_root: ret.merkleRoot,
            key_commitment: ret.keyCommitment,
        }))
    }

    async fn claimed_buyer(&self) -> Result<Option<(String, u16)>, LedgerError> {
        let input = claimedBuyerCall {}.abi_encode();
        let output = self.call_view(input, "claimed_buyer").await?;
        let ret = claimedBuyerCall::abi_decode_returns(&output)
            .map_err(|e| LedgerError::Permanent(format!("claimed_buyer: bad return data: {e}")))?;

        if !ret.claimed {
            return Ok(None);
        }
        Ok(Some((ret.ip, ret.port)))
    }
}

impl std::fmt::Debug for EvmLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmLedger")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("contract", &self.contract)
            .finish()
    }
}
