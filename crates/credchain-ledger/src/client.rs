//! LedgerClient: the [`Ledger`] implementation over a [`ChainRpc`].

use std::cmp;
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Eip1559TransactionRequest, TransactionRequest, H256, U256};
use ethers::utils::parse_ether;
use serde::Deserialize;

use credchain_core::{ContentLocator, Fingerprint, LedgerReference};

use crate::abi::AttestationContract;
use crate::account::SignerAccount;
use crate::error::{ChainError, LedgerError, Result};
use crate::rpc::{ChainRpc, EthersRpc};
use crate::traits::{Attestation, FeeEstimate, Ledger, LedgerReceipt};

/// Configuration for [`LedgerClient`].
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the node.
    pub rpc_url: String,
    pub chain_id: u64,
    /// Address of the attestation contract.
    pub contract_address: String,
    /// Hex private key of the signing account. Without it the client is
    /// read-only.
    pub private_key: Option<String>,
    /// Minimum native balance, in ether units, required to submit.
    pub min_balance: String,
    /// Delay between receipt polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Receipt polls before giving up with `ConfirmationTimeout`.
    pub max_poll_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://rpc-amoy.polygon.technology".into(),
            chain_id: 80002,
            contract_address: String::new(),
            private_key: None,
            min_balance: "0.03".into(),
            poll_interval_ms: 1000,
            max_poll_attempts: 60,
        }
    }
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("contract_address", &self.contract_address)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("min_balance", &self.min_balance)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .finish()
    }
}

impl LedgerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Ledger client bound to one contract and, optionally, one signing key.
pub struct LedgerClient<R: ChainRpc> {
    rpc: R,
    contract: AttestationContract,
    contract_address: Address,
    account: Option<SignerAccount>,
    chain_id: u64,
    min_balance: U256,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl LedgerClient<EthersRpc> {
    /// Connect to the configured node over HTTP.
    pub fn connect(config: &LedgerConfig) -> Result<Self> {
        let rpc = EthersRpc::connect(&config.rpc_url)
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        Self::new(rpc, config)
    }
}

impl<R: ChainRpc> LedgerClient<R> {
    pub fn new(rpc: R, config: &LedgerConfig) -> Result<Self> {
        let contract_address: Address = config.contract_address.trim().parse().map_err(|e| {
            LedgerError::Config(format!(
                "invalid contract address {:?}: {}",
                config.contract_address, e
            ))
        })?;

        let min_balance = parse_ether(config.min_balance.trim()).map_err(|e| {
            LedgerError::Config(format!("invalid min_balance {:?}: {}", config.min_balance, e))
        })?;

        let account = config
            .private_key
            .as_deref()
            .map(|key| SignerAccount::from_private_key(key, config.chain_id))
            .transpose()?;

        Ok(Self {
            rpc,
            contract: AttestationContract::new()?,
            contract_address,
            account,
            chain_id: config.chain_id,
            min_balance,
            poll_interval: config.poll_interval(),
            max_poll_attempts: config.max_poll_attempts,
        })
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    /// Address of the signing account, if one is configured.
    pub fn signer_address(&self) -> Option<Address> {
        self.account.as_ref().map(SignerAccount::address)
    }

    /// Check that the node serves the configured chain.
    pub async fn check_chain(&self) -> Result<()> {
        let remote = self.rpc.chain_id().await?;
        if remote != self.chain_id {
            return Err(LedgerError::Transport(format!(
                "node reports chain id {}, expected {}",
                remote, self.chain_id
            )));
        }
        Ok(())
    }

    async fn ensure_balance(&self, from: Address) -> Result<()> {
        let balance = self.rpc.balance(from).await?;

        tracing::info!(
            address = ?from,
            balance = %ethers::utils::format_ether(balance),
            "signer balance"
        );

        if balance < self.min_balance {
            tracing::warn!(
                balance = %balance,
                required = %self.min_balance,
                "insufficient balance for attestation"
            );
            return Err(LedgerError::InsufficientBalance {
                balance,
                required: self.min_balance,
            });
        }
        Ok(())
    }

    /// Nonce selection, gas estimation, signing and broadcast, all under the
    /// account lock.
    async fn broadcast(
        &self,
        account: &SignerAccount,
        fees: FeeEstimate,
        fingerprint: &Fingerprint,
        locator: &ContentLocator,
    ) -> Result<H256> {
        let from = account.address();
        let data = self.contract.encode_store(fingerprint, locator)?;

        let mut session = account.lock().await;

        let pending = self.rpc.pending_nonce(from).await?;
        let nonce = session.next_nonce(pending);

        let mut tx: TypedTransaction = Eip1559TransactionRequest::new()
            .from(from)
            .to(self.contract_address)
            .data(data)
            .value(U256::zero())
            .nonce(nonce)
            .chain_id(self.chain_id)
            .max_fee_per_gas(fees.base_fee)
            .max_priority_fee_per_gas(cmp::min(fees.priority_fee, fees.base_fee))
            .into();

        let gas = self.rpc.estimate_gas(&tx).await.map_err(|e| match e {
            ChainError::Rejected(reason) => LedgerError::TransactionWouldRevert(reason),
            other => other.into(),
        })?;
        tx.set_gas(gas);

        let raw = session.sign(&tx).await?;
        let tx_hash = self
            .rpc
            .send_raw_transaction(raw)
            .await
            .map_err(|e| match e {
                ChainError::Rejected(reason) if reason.contains("insufficient funds") => {
                    LedgerError::InsufficientBalance {
                        balance: U256::zero(),
                        required: self.min_balance,
                    }
                }
                other => other.into(),
            })?;
        session.commit(nonce);

        tracing::info!(tx_hash = ?tx_hash, %nonce, %gas, "attestation broadcast");
        Ok(tx_hash)
    }

    async fn await_receipt(&self, tx_hash: H256) -> Result<LedgerReceipt> {
        let hash_text = format!("{:?}", tx_hash);

        for attempt in 1..=self.max_poll_attempts {
            match self.rpc.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    tracing::info!(
                        tx_hash = %hash_text,
                        block = receipt.block_number,
                        "attestation confirmed"
                    );
                    return LedgerReference::new(&hash_text, receipt.block_number)
                        .map_err(|e| LedgerError::Transport(e.to_string()));
                }
                Ok(Some(_)) => {
                    tracing::warn!(tx_hash = %hash_text, "attestation reverted");
                    return Err(LedgerError::AttestationReverted { tx_hash: hash_text });
                }
                Ok(None) => {
                    tracing::debug!(tx_hash = %hash_text, attempt, "receipt not yet available");
                }
                // The transaction is out; a flaky node must not turn that
                // into a retryable error.
                Err(e) => {
                    tracing::warn!(tx_hash = %hash_text, attempt, error = %e, "receipt poll failed");
                }
            }

            if attempt < self.max_poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(LedgerError::ConfirmationTimeout { tx_hash: hash_text })
    }
}

#[async_trait]
impl<R: ChainRpc> Ledger for LedgerClient<R> {
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<Attestation> {
        let data = self.contract.encode_verify(fingerprint)?;
        let call: TypedTransaction = TransactionRequest::new()
            .to(self.contract_address)
            .data(data)
            .into();

        let output = self.rpc.call(&call).await?;
        let (exists, locator) = self.contract.decode_verify_output(&output)?;

        let attestation = Attestation {
            exists,
            content_locator: if exists {
                ContentLocator::new(locator).ok()
            } else {
                None
            },
        };

        tracing::debug!(%fingerprint, exists, "ledger lookup");
        Ok(attestation)
    }

    async fn fee_estimate(&self) -> Result<FeeEstimate> {
        Ok(self.rpc.fee_estimate().await?)
    }

    async fn submit_attestation(
        &self,
        fingerprint: &Fingerprint,
        locator: &ContentLocator,
    ) -> Result<LedgerReceipt> {
        let account = self.account.as_ref().ok_or_else(|| {
            LedgerError::InvalidCredentials("no signing key configured".into())
        })?;

        self.ensure_balance(account.address()).await?;

        let fees = self.fee_estimate().await?;
        tracing::info!(
            max_fee_gwei = %fees.base_fee_gwei(),
            priority_fee_gwei = %fees.priority_fee_gwei(),
            "using EIP-1559 fees"
        );

        let tx_hash = self.broadcast(account, fees, fingerprint, locator).await?;
        self.await_receipt(tx_hash).await
    }
}
