//! Low-level chain access.
//!
//! [`ChainRpc`] is the seam between the submission logic in
//! [`LedgerClient`](crate::client::LedgerClient) and the node. [`EthersRpc`]
//! talks JSON-RPC over HTTP; [`memory::MemoryRpc`] is a scripted chain for
//! tests.

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, H256, U256};

use crate::error::{ChainError, RpcResult};
use crate::traits::FeeEstimate;

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainReceipt {
    pub tx_hash: H256,
    pub block_number: u64,
    /// `status == 1`.
    pub success: bool,
}

/// Raw JSON-RPC operations used by the ledger client.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> RpcResult<u64>;

    async fn balance(&self, address: Address) -> RpcResult<U256>;

    /// Nonce including transactions still in the mempool.
    async fn pending_nonce(&self, address: Address) -> RpcResult<U256>;

    async fn fee_estimate(&self) -> RpcResult<FeeEstimate>;

    /// Gas estimate; a node-side revert is reported as `ChainError::Rejected`.
    async fn estimate_gas(&self, tx: &TypedTransaction) -> RpcResult<U256>;

    /// Read-only contract call against the latest block.
    async fn call(&self, tx: &TypedTransaction) -> RpcResult<Bytes>;

    /// Broadcast a signed transaction.
    async fn send_raw_transaction(&self, raw: Bytes) -> RpcResult<H256>;

    /// `None` while the transaction is unknown or not yet mined.
    async fn transaction_receipt(&self, tx_hash: H256) -> RpcResult<Option<ChainReceipt>>;
}

/// [`ChainRpc`] over an ethers HTTP provider.
#[derive(Debug, Clone)]
pub struct EthersRpc {
    provider: Provider<Http>,
}

impl EthersRpc {
    pub fn new(provider: Provider<Http>) -> Self {
        Self { provider }
    }

    /// Connect to a node by URL.
    pub fn connect(rpc_url: &str) -> RpcResult<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ChainError::Transport(format!("invalid rpc url {}: {}", rpc_url, e)))?;
        Ok(Self::new(provider))
    }

    pub fn provider(&self) -> &Provider<Http> {
        &self.provider
    }
}

fn classify(err: ProviderError) -> ChainError {
    match err.as_error_response() {
        Some(rpc) => ChainError::Rejected(rpc.message.clone()),
        None => ChainError::Transport(err.to_string()),
    }
}

#[async_trait]
impl ChainRpc for EthersRpc {
    async fn chain_id(&self) -> RpcResult<u64> {
        let id = self.provider.get_chainid().await.map_err(classify)?;
        Ok(id.low_u64())
    }

    async fn balance(&self, address: Address) -> RpcResult<U256> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(classify)
    }

    async fn pending_nonce(&self, address: Address) -> RpcResult<U256> {
        self.provider
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(classify)
    }

    async fn fee_estimate(&self) -> RpcResult<FeeEstimate> {
        let base_fee = self.provider.get_gas_price().await.map_err(classify)?;
        let priority_fee: U256 = self
            .provider
            .request("eth_maxPriorityFeePerGas", ())
            .await
            .map_err(classify)?;

        Ok(FeeEstimate {
            base_fee,
            priority_fee,
        })
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> RpcResult<U256> {
        self.provider.estimate_gas(tx, None).await.map_err(classify)
    }

    async fn call(&self, tx: &TypedTransaction) -> RpcResult<Bytes> {
        self.provider.call(tx, None).await.map_err(classify)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> RpcResult<H256> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(classify)?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(&self, tx_hash: H256) -> RpcResult<Option<ChainReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(classify)?;

        // A receipt without a block number is still pending.
        Ok(receipt.and_then(|r| {
            r.block_number.map(|block| ChainReceipt {
                tx_hash: r.transaction_hash,
                block_number: block.as_u64(),
                success: r.status.map(|s| s.as_u64() == 1).unwrap_or(false),
            })
        }))
    }
}

/// A scripted in-memory chain for testing.
///
/// Holds one attestation contract. Broadcast transactions are decoded,
/// applied to the contract state and mined on the first receipt poll.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard};
    use std::time::Duration;

    use ethers::utils::{keccak256, rlp::Rlp};

    use crate::abi::AttestationContract;

    /// How broadcast transactions end up.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ReceiptBehavior {
        /// Mined with status 1.
        Success,
        /// Mined with status 0.
        Revert,
        /// Never mined.
        Never,
    }

    struct Pending {
        fingerprint: String,
        locator: String,
    }

    struct State {
        balance: U256,
        /// Number of mined transactions from the signer.
        mined_nonce: u64,
        attestations: HashMap<String, String>,
        pending: HashMap<H256, Pending>,
        receipts: HashMap<H256, ChainReceipt>,
        broadcast_nonces: Vec<U256>,
        broadcast_fee_caps: Vec<U256>,
        fees: FeeEstimate,
        block: u64,
        receipt_behavior: ReceiptBehavior,
        fail_next_broadcast: Option<ChainError>,
        offline: bool,
    }

    impl State {
        /// Mined plus mempool transactions, as `eth_getTransactionCount`
        /// reports for the pending block.
        fn pending_nonce(&self) -> U256 {
            U256::from(self.mined_nonce + self.pending.len() as u64)
        }
    }

    /// In-memory [`ChainRpc`].
    pub struct MemoryRpc {
        chain_id: u64,
        contract: AttestationContract,
        latency: Duration,
        state: Mutex<State>,
    }

    impl MemoryRpc {
        /// A chain with a funded signer and an empty contract.
        pub fn new(chain_id: u64) -> crate::error::Result<Self> {
            Ok(Self {
                chain_id,
                contract: AttestationContract::new()?,
                latency: Duration::ZERO,
                state: Mutex::new(State {
                    balance: U256::exp10(18),
                    mined_nonce: 0,
                    attestations: HashMap::new(),
                    pending: HashMap::new(),
                    receipts: HashMap::new(),
                    broadcast_nonces: Vec::new(),
                    broadcast_fee_caps: Vec::new(),
                    fees: FeeEstimate {
                        base_fee: U256::from(30_000_000_000u64),
                        priority_fee: U256::from(1_500_000_000u64),
                    },
                    block: 1,
                    receipt_behavior: ReceiptBehavior::Success,
                    fail_next_broadcast: None,
                    offline: false,
                }),
            })
        }

        /// Delay every nonce lookup, widening race windows in tests.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        fn state(&self) -> RpcResult<MutexGuard<'_, State>> {
            let state = self
                .state
                .lock()
                .map_err(|e| ChainError::Transport(format!("lock poisoned: {}", e)))?;
            if state.offline {
                return Err(ChainError::Transport("node unreachable".into()));
            }
            Ok(state)
        }

        fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> Option<T> {
            self.state.lock().ok().map(|mut s| f(&mut s))
        }

        pub fn set_balance(&self, balance: U256) {
            self.with_state(|s| s.balance = balance);
        }

        pub fn set_fees(&self, fees: FeeEstimate) {
            self.with_state(|s| s.fees = fees);
        }

        pub fn set_receipt_behavior(&self, behavior: ReceiptBehavior) {
            self.with_state(|s| s.receipt_behavior = behavior);
        }

        /// Make every call fail with a transport error.
        pub fn set_offline(&self, offline: bool) {
            self.with_state(|s| s.offline = offline);
        }

        /// Make the next broadcast fail with `err`.
        pub fn fail_next_broadcast(&self, err: ChainError) {
            self.with_state(|s| s.fail_next_broadcast = Some(err));
        }

        /// Record an attestation directly, as if mined earlier.
        pub fn attest(&self, fingerprint_hex: &str, locator: &str) {
            self.with_state(|s| {
                s.attestations
                    .insert(fingerprint_hex.to_string(), locator.to_string())
            });
        }

        /// Number of transactions broadcast so far.
        pub fn broadcast_count(&self) -> usize {
            self.with_state(|s| s.broadcast_nonces.len())
                .unwrap_or_default()
        }

        /// Nonces of broadcast transactions, in broadcast order.
        pub fn broadcast_nonces(&self) -> Vec<U256> {
            self.with_state(|s| s.broadcast_nonces.clone())
                .unwrap_or_default()
        }

        /// `max_fee_per_gas` of broadcast transactions, in broadcast order.
        pub fn broadcast_fee_caps(&self) -> Vec<U256> {
            self.with_state(|s| s.broadcast_fee_caps.clone())
                .unwrap_or_default()
        }

        /// Evict every unmined transaction from the mempool, as a node does
        /// under fee pressure or on restart.
        pub fn drop_pending(&self) -> usize {
            self.with_state(|s| {
                let dropped = s.pending.len();
                s.pending.clear();
                dropped
            })
            .unwrap_or_default()
        }

        fn data_of(tx: &TypedTransaction) -> RpcResult<Bytes> {
            tx.data()
                .cloned()
                .ok_or_else(|| ChainError::Rejected("missing calldata".into()))
        }
    }

    #[async_trait]
    impl ChainRpc for MemoryRpc {
        async fn chain_id(&self) -> RpcResult<u64> {
            self.state()?;
            Ok(self.chain_id)
        }

        async fn balance(&self, _address: Address) -> RpcResult<U256> {
            Ok(self.state()?.balance)
        }

        async fn pending_nonce(&self, _address: Address) -> RpcResult<U256> {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            Ok(self.state()?.pending_nonce())
        }

        async fn fee_estimate(&self) -> RpcResult<FeeEstimate> {
            Ok(self.state()?.fees)
        }

        async fn estimate_gas(&self, tx: &TypedTransaction) -> RpcResult<U256> {
            let state = self.state()?;
            let data = Self::data_of(tx)?;

            if self.contract.is_store_call(&data) {
                let (fingerprint, _) = self
                    .contract
                    .decode_store_input(&data)
                    .map_err(|e| ChainError::Rejected(e.to_string()))?;
                if state.attestations.contains_key(&fingerprint) {
                    return Err(ChainError::Rejected(
                        "execution reverted: Diploma already exists".into(),
                    ));
                }
            }

            Ok(U256::from(120_000u64))
        }

        async fn call(&self, tx: &TypedTransaction) -> RpcResult<Bytes> {
            let state = self.state()?;
            let data = Self::data_of(tx)?;

            if !self.contract.is_verify_call(&data) {
                return Err(ChainError::Rejected("execution reverted".into()));
            }
            let fingerprint = self
                .contract
                .decode_verify_input(&data)
                .map_err(|e| ChainError::Rejected(e.to_string()))?;

            Ok(match state.attestations.get(&fingerprint) {
                Some(locator) => AttestationContract::encode_verify_output(true, locator),
                None => AttestationContract::encode_verify_output(false, ""),
            })
        }

        async fn send_raw_transaction(&self, raw: Bytes) -> RpcResult<H256> {
            let mut state = self.state()?;

            if let Some(err) = state.fail_next_broadcast.take() {
                return Err(err);
            }

            let (tx, _signature) = TypedTransaction::decode_signed(&Rlp::new(raw.as_ref()))
                .map_err(|e| ChainError::Rejected(format!("malformed transaction: {}", e)))?;
            let tx_hash = H256::from(keccak256(raw.as_ref()));

            if state.pending.contains_key(&tx_hash) || state.receipts.contains_key(&tx_hash) {
                return Err(ChainError::Rejected("already known".into()));
            }

            let nonce = tx.nonce().copied().unwrap_or_default();
            let expected = state.pending_nonce();
            if nonce < expected {
                return Err(ChainError::Rejected("nonce too low".into()));
            }
            if nonce > expected {
                return Err(ChainError::Rejected(format!(
                    "nonce too high: expected {}, got {}",
                    expected, nonce
                )));
            }

            let data = Self::data_of(&tx)?;
            let (fingerprint, locator) = self
                .contract
                .decode_store_input(&data)
                .map_err(|e| ChainError::Rejected(e.to_string()))?;

            state.broadcast_nonces.push(nonce);
            if let TypedTransaction::Eip1559(inner) = &tx {
                state
                    .broadcast_fee_caps
                    .push(inner.max_fee_per_gas.unwrap_or_default());
            }
            state.pending.insert(
                tx_hash,
                Pending {
                    fingerprint,
                    locator,
                },
            );

            Ok(tx_hash)
        }

        async fn transaction_receipt(&self, tx_hash: H256) -> RpcResult<Option<ChainReceipt>> {
            let mut state = self.state()?;

            if let Some(receipt) = state.receipts.get(&tx_hash) {
                return Ok(Some(*receipt));
            }

            if state.receipt_behavior == ReceiptBehavior::Never {
                return Ok(None);
            }

            let Some(pending) = state.pending.remove(&tx_hash) else {
                return Ok(None);
            };

            let success = state.receipt_behavior == ReceiptBehavior::Success
                && !state.attestations.contains_key(&pending.fingerprint);
            if success {
                state
                    .attestations
                    .insert(pending.fingerprint, pending.locator);
            }

            state.block += 1;
            state.mined_nonce += 1;
            let receipt = ChainReceipt {
                tx_hash,
                block_number: state.block,
                success,
            };
            state.receipts.insert(tx_hash, receipt);

            Ok(Some(receipt))
        }
    }
}
